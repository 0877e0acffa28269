//! Provider payloads shaped like the real services' responses.

use serde_json::{json, Value};

/// Open-data platform responses.
pub mod open_data {
    use super::*;

    pub fn versions(versions: &[&str]) -> Value {
        json!({ "versions": versions.iter().map(|v| json!({ "version": v })).collect::<Vec<_>>() })
    }

    /// Runs listed oldest first, as the platform does.
    pub fn instances(ids: &[&str]) -> Value {
        json!({
            "instances": ids
                .iter()
                .map(|id| json!({ "instanceId": id, "status": "complete" }))
                .collect::<Vec<_>>()
        })
    }

    pub fn files(names: &[&str]) -> Value {
        json!({
            "files": names
                .iter()
                .map(|n| json!({ "filename": n, "size": 1024 }))
                .collect::<Vec<_>>()
        })
    }

    pub fn download_url(url: &str) -> Value {
        json!({ "temporaryDownloadUrl": url, "contentType": "application/octet-stream" })
    }
}

/// Generic weather provider responses.
pub mod openweather {
    use super::*;

    pub fn geocode(lat: f64, lon: f64) -> Value {
        json!({ "zip": "3811", "name": "Amersfoort", "lat": lat, "lon": lon, "country": "NL" })
    }

    /// Forecast list with one entry per (temp, pop, description).
    pub fn forecast(steps: &[(f64, f64, &str)]) -> Value {
        let list: Vec<Value> = steps
            .iter()
            .enumerate()
            .map(|(i, (temp, pop, desc))| {
                json!({
                    "dt": 1_714_521_600 + i as i64 * 10_800,
                    "main": { "temp": temp, "humidity": 80 },
                    "weather": [{ "main": "Clouds", "description": desc }],
                    "wind": { "speed": 2.0 + i as f64 },
                    "pop": pop,
                    "rain": { "3h": 0.5 }
                })
            })
            .collect();
        json!({ "cod": "200", "cnt": list.len(), "list": list })
    }
}

/// Statistics office indicator response.
pub fn confidence(value: Value, period: &str) -> Value {
    json!({
        "odata.metadata": "https://opendata.cbs.nl/ODataApi/odata/83693NED/$metadata",
        "value": [{ "ID": 0, "Periods": period, "ConConfidence": value }]
    })
}

/// RSS 2.0 document; the first title belongs to the channel.
pub fn rss(channel: &str, items: &[&str]) -> String {
    let mut doc = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel>"#);
    doc.push_str(&format!("<title>{}</title>", channel));
    doc.push_str("<link>https://news.example.nl</link>");
    for item in items {
        doc.push_str(&format!(
            "<item><title>{}</title><link>https://news.example.nl/a</link></item>",
            item
        ));
    }
    doc.push_str("</channel></rss>");
    doc
}

/// iCalendar feed with one all-day event per (YYYYMMDD, label).
pub fn ics(events: &[(&str, &str)]) -> String {
    let mut doc = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//NL//\r\n");
    for (date, label) in events {
        doc.push_str("BEGIN:VEVENT\r\n");
        doc.push_str(&format!("DTSTART;VALUE=DATE:{}\r\n", date));
        doc.push_str(&format!("SUMMARY:{}\r\n", label));
        doc.push_str("END:VEVENT\r\n");
    }
    doc.push_str("END:VCALENDAR\r\n");
    doc
}

/// Daily KPI rows for two stores over three days.
pub fn kpi_rows() -> Value {
    json!([
        { "store_id": 29658, "date": "2024-04-28", "count_in": 400.0, "conversion_rate": 20.0, "turnover": 8000.0, "sales_per_visitor": 20.0 },
        { "store_id": 29658, "date": "2024-04-29", "count_in": 500.0, "conversion_rate": 25.0, "turnover": 10000.0, "sales_per_visitor": 20.0 },
        { "store_id": 29658, "date": "2024-04-30", "count_in": 600.0, "conversion_rate": 30.0, "turnover": 15000.0, "sales_per_visitor": 25.0 },
        { "store_id": 29683, "date": "2024-04-29", "count_in": 300.0, "conversion_rate": 10.0, "turnover": 3000.0, "sales_per_visitor": 10.0 },
        { "store_id": 29683, "date": "2024-04-30", "count_in": 200.0, "conversion_rate": 15.0, "turnover": 4000.0, "sales_per_visitor": 20.0 }
    ])
}
