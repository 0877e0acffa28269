//! Command input: store selection, KPI rows and the reference day.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use enrichment::KpiRow;
use signals_common::{StoreDirectory, StoreInfo};

/// Find a store by numeric id or by display name.
pub fn select_store<'a>(directory: &'a StoreDirectory, selector: &str) -> Result<&'a StoreInfo> {
    let selector = selector.trim();
    let found = match selector.parse::<u64>() {
        Ok(id) => directory.by_id(id),
        Err(_) => directory.by_name(selector),
    };
    found.ok_or_else(|| {
        anyhow!(
            "unknown store '{}'; known stores: {}",
            selector,
            directory.names().join(", ")
        )
    })
}

/// Read KPI rows from a JSON array, or a `{"rows": [...]}` wrapper.
pub fn load_kpi_rows(path: &Path) -> Result<Vec<KpiRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading KPI rows from {}", path.display()))?;
    parse_kpi_rows(&text).with_context(|| format!("parsing KPI rows in {}", path.display()))
}

pub fn parse_kpi_rows(text: &str) -> Result<Vec<KpiRow>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let rows = match value {
        serde_json::Value::Object(mut map) => map
            .remove("rows")
            .ok_or_else(|| anyhow!("expected an array or an object with 'rows'"))?,
        other => other,
    };
    Ok(serde_json::from_value(rows)?)
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("unknown timezone '{}': {}", name, e))
}

/// The reference day: `--date` when given, else today in the stores' timezone.
pub fn reference_day(date: Option<&str>, tz: Tz) -> Result<NaiveDate> {
    match date {
        Some(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            Ok(d) => Ok(d),
            Err(e) => bail!("invalid --date '{}': {}", s, e),
        },
        None => Ok(day_in(Utc::now(), tz)),
    }
}

/// Calendar day of an instant in `tz`.
pub fn day_in(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}
