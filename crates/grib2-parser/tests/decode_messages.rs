//! End-to-end decoding of synthetic GRIB2 payloads.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use grib2_parser::{to_grid, Grib2Error, Grib2Reader, Grib2Tables};
use test_utils::{assert_approx_eq, Grib2Builder};

fn payload(messages: &[Vec<u8>]) -> Bytes {
    Bytes::from(messages.concat())
}

#[test]
fn test_single_message_sections() {
    let data = Grib2Builder::new_harmonie().with_forecast_hour(6).build();
    let mut reader = Grib2Reader::new(Bytes::from(data));

    let msg = reader.next_message().unwrap().expect("one message");
    assert_eq!(msg.indicator.edition, 2);
    assert_eq!(msg.grid_definition.dims(), (3, 3));
    assert_eq!(msg.grid_definition.latitudes(), vec![53.0, 52.0, 51.0]);
    assert_eq!(msg.grid_definition.longitudes(), vec![4.0, 5.0, 6.0]);
    assert_eq!(
        msg.valid_time(),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap())
    );

    let name = msg.parameter(&Grib2Tables::standard());
    assert_eq!(name.short_name, "t2m");

    let values = msg.unpack_data().unwrap();
    assert_eq!(values.len(), 9);
    for v in values {
        assert_approx_eq!(v, 288.15, 1e-3);
    }

    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_values_survive_packing() {
    let input: Vec<f64> = (0..9).map(|i| 270.0 + i as f64 * 1.5).collect();
    let data = Grib2Builder::new_harmonie().with_data(input.clone()).build();

    let mut reader = Grib2Reader::new(Bytes::from(data));
    let values = reader.next_message().unwrap().unwrap().unpack_data().unwrap();
    for (got, want) in values.iter().zip(&input) {
        assert_approx_eq!(*got, *want, 1e-3);
    }
}

#[test]
fn test_decimal_scale_and_bitmap() {
    let input = vec![0.1, f64::NAN, 0.3, 0.0, 0.25, 0.5, 1.0, 2.0, f64::NAN];
    let data = Grib2Builder::new_harmonie()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_decimal_scale(2)
        .with_data(input.clone())
        .build();

    let mut reader = Grib2Reader::new(Bytes::from(data));
    let msg = reader.next_message().unwrap().unwrap();
    assert!(msg.bitmap.is_some());

    let values = msg.unpack_data().unwrap();
    for (got, want) in values.iter().zip(&input) {
        if want.is_nan() {
            assert!(got.is_nan());
        } else {
            assert_approx_eq!(*got, *want, 1e-4);
        }
    }
}

#[test]
fn test_grid_stacks_time_steps_per_variable() {
    let tables = Grib2Tables::standard();
    let mut messages = Vec::new();
    for hour in [0u32, 3, 6] {
        messages.push(
            Grib2Builder::new_harmonie()
                .with_forecast_hour(hour)
                .with_constant_value(280.0 + hour as f64)
                .build(),
        );
        messages.push(
            Grib2Builder::new_harmonie()
                .with_parameter(2, 2)
                .with_level(103, 10)
                .with_forecast_hour(hour)
                .with_constant_value(3.0)
                .build(),
        );
    }
    // u10 only at 0h and 3h; v10 only at 6h
    messages.pop();
    messages.push(
        Grib2Builder::new_harmonie()
            .with_parameter(2, 3)
            .with_level(103, 10)
            .with_forecast_hour(6)
            .with_constant_value(4.0)
            .build(),
    );

    let grid = to_grid(payload(&messages), &tables).unwrap();
    assert_eq!(
        grid.coordinate_names(),
        vec!["latitude", "longitude", "time"]
    );
    assert_eq!(grid.data_variable_names(), vec!["t2m", "u10", "v10"]);

    let times = grid.time_values("time").unwrap();
    assert_eq!(times.len(), 3);
    assert_eq!(times[2], Some(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()));

    let t2m = grid.variable("t2m").unwrap();
    assert_eq!(t2m.shape(), &[3, 3, 3]);
    assert_eq!(t2m.units(), Some("K"));
    assert_approx_eq!(t2m.data()[9], 283.0, 1e-3);

    let u10 = grid.variable("u10").unwrap();
    assert!(u10.data()[18].is_nan(), "u10 has no 6h step");
    let v10 = grid.variable("v10").unwrap();
    assert!(v10.data()[0].is_nan(), "v10 only has the 6h step");
    assert_approx_eq!(v10.data()[18], 4.0, 1e-6);
}

#[test]
fn test_accumulation_valid_at_interval_end() {
    let data = Grib2Builder::new_harmonie()
        .with_parameter(1, 8)
        .with_level(1, 0)
        .with_forecast_hour(3)
        .with_accumulation(3)
        .with_constant_value(1.5)
        .build();

    let grid = to_grid(Bytes::from(data), &Grib2Tables::standard()).unwrap();
    let times = grid.time_values("time").unwrap();
    assert_eq!(times, vec![Some(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap())]);
    assert!(grid.contains("tp"));
}

#[test]
fn test_same_parameter_on_other_level_gets_own_name() {
    let messages = vec![
        Grib2Builder::new_harmonie().build(),
        Grib2Builder::new_harmonie().with_level(100, 85000).build(),
    ];
    let grid = to_grid(payload(&messages), &Grib2Tables::standard()).unwrap();
    assert_eq!(grid.data_variable_names(), vec!["t", "t2m"]);
}

#[test]
fn test_mismatched_grid_is_skipped() {
    let messages = vec![
        Grib2Builder::new_harmonie().build(),
        Grib2Builder::new_harmonie()
            .with_grid(2, 2, (53.0, 4.0), (52.0, 5.0))
            .with_parameter(2, 2)
            .with_level(103, 10)
            .build(),
    ];
    let grid = to_grid(payload(&messages), &Grib2Tables::standard()).unwrap();
    assert_eq!(grid.data_variable_names(), vec!["t2m"]);
}

#[test]
fn test_padding_between_messages_is_skipped() {
    let mut data = vec![0u8; 13];
    data.extend(Grib2Builder::new_harmonie().build());
    data.extend([0u8; 7]);
    data.extend(Grib2Builder::new_harmonie().with_forecast_hour(1).build());

    let grid = to_grid(Bytes::from(data), &Grib2Tables::standard()).unwrap();
    assert_eq!(grid.variable("time").unwrap().len(), 2);
}

#[test]
fn test_southern_and_western_hemisphere_coordinates() {
    let data = Grib2Builder::new_harmonie()
        .with_grid(3, 2, (-10.0, -20.0), (-11.0, -18.0))
        .build();
    let grid = to_grid(Bytes::from(data), &Grib2Tables::standard()).unwrap();

    assert_eq!(grid.variable("latitude").unwrap().data(), &[-10.0, -11.0]);
    assert_eq!(grid.variable("longitude").unwrap().data(), &[-20.0, -19.0, -18.0]);
}

#[test]
fn test_column_major_scan_is_reordered() {
    // Columns stored one after another: lon 4 (53, 52, 51), lon 5 (...), lon 6 (...)
    let columns: Vec<f64> = vec![1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0];
    let data = Grib2Builder::new_harmonie()
        .with_scanning_mode(0b0010_0000)
        .with_data(columns)
        .build();
    let grid = to_grid(Bytes::from(data), &Grib2Tables::standard()).unwrap();

    let values = grid.variable("t2m").unwrap().data();
    for (got, want) in values.iter().zip(1..=9) {
        assert_approx_eq!(*got, want as f64, 1e-3);
    }
}

#[test]
fn test_garbage_has_no_messages() {
    let err = to_grid(Bytes::from_static(b"<html>nope</html>"), &Grib2Tables::standard());
    assert!(matches!(err, Err(Grib2Error::NoMessages)));
}

#[test]
fn test_truncated_message_is_an_error() {
    let mut data = Grib2Builder::new_harmonie().build();
    data.truncate(data.len() - 10);
    let err = to_grid(Bytes::from(data), &Grib2Tables::standard());
    assert!(matches!(err, Err(Grib2Error::InvalidFormat(_))));
}
