//! Classic-format payloads from the test builder, decoded end to end.

use chrono::{TimeZone, Utc};
use netcdf_parser::{decode, detect, ClassicFile, Flavour, NetCdfError};
use test_utils::{assert_approx_eq, NcAttr, NcKind, NetCdfBuilder};

fn forecast_file(builder: NetCdfBuilder) -> Vec<u8> {
    builder
        .global_attribute("institution", NcAttr::text("KNMI"))
        .record_dimension("time", 3)
        .coordinate("lat", vec![51.0, 52.0], "degrees_north")
        .coordinate("lon", vec![4.0, 5.0, 6.0], "degrees_east")
        .variable("time", &["time"], NcKind::Double, vec![0.0, 1.0, 2.0])
        .attribute("units", NcAttr::text("hours since 2024-05-01 00:00:00"))
        .variable(
            "t2m",
            &["time", "lat", "lon"],
            NcKind::Float,
            (0..18).map(|v| 280.0 + v as f64).collect(),
        )
        .attribute("units", NcAttr::text("K"))
        .build()
}

#[test]
fn test_all_classic_versions_decode_alike() {
    let files = [
        forecast_file(NetCdfBuilder::new()),
        forecast_file(NetCdfBuilder::offset64()),
        forecast_file(NetCdfBuilder::data64()),
    ];
    let flavours: Vec<_> = files.iter().map(|f| detect(f)).collect();
    assert_eq!(
        flavours,
        vec![
            Some(Flavour::Classic(1)),
            Some(Flavour::Classic(2)),
            Some(Flavour::Classic(5))
        ]
    );

    let grids: Vec<_> = files.iter().map(|f| decode(f).unwrap()).collect();
    for grid in &grids {
        assert_eq!(grid.coordinate_names(), vec!["lat", "lon", "time"]);
        assert_eq!(grid.data_variable_names(), vec!["t2m"]);

        let t2m = grid.variable("t2m").unwrap();
        assert_eq!(t2m.dims(), &["time", "lat", "lon"]);
        assert_eq!(t2m.shape(), &[3, 2, 3]);
        assert_eq!(t2m.units(), Some("K"));
        assert_eq!(t2m.data()[17], 297.0);
    }
}

#[test]
fn test_time_axis_uses_cf_units() {
    let grid = decode(&forecast_file(NetCdfBuilder::new())).unwrap();
    let times = grid.time_values("time").unwrap();
    assert_eq!(
        times[2],
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap())
    );
}

#[test]
fn test_header_parsing() {
    let data = forecast_file(NetCdfBuilder::new());
    let file = ClassicFile::parse(&data).unwrap();

    assert_eq!(file.version, 1);
    assert_eq!(file.numrecs, 3);
    assert_eq!(file.attributes[0].name, "institution");
    assert_eq!(file.attributes[0].value.as_text(), Some("KNMI"));

    let t2m = file.variable("t2m").unwrap();
    assert!(file.is_record_variable(t2m));
    assert!(!file.is_record_variable(file.variable("lat").unwrap()));
}

#[test]
fn test_single_record_variable_is_unpadded() {
    // One Short per record: records are 2 bytes apart, not 4.
    let data = NetCdfBuilder::new()
        .record_dimension("time", 3)
        .variable("flag", &["time"], NcKind::Short, vec![7.0, -8.0, 9.0])
        .build();
    let grid = decode(&data).unwrap();
    assert_eq!(grid.variable("flag").unwrap().data(), &[7.0, -8.0, 9.0]);
}

#[test]
fn test_interleaved_record_variables() {
    let data = NetCdfBuilder::new()
        .record_dimension("time", 2)
        .dimension("station", 3)
        .variable("a", &["time", "station"], NcKind::Short, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .variable("b", &["time"], NcKind::Double, vec![0.5, 1.5])
        .build();
    let grid = decode(&data).unwrap();
    assert_eq!(
        grid.variable("a").unwrap().data(),
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
    assert_eq!(grid.variable("b").unwrap().data(), &[0.5, 1.5]);
}

#[test]
fn test_packing_and_missing_values() {
    let data = NetCdfBuilder::new()
        .dimension("x", 4)
        .variable("tp", &["x"], NcKind::Short, vec![0.0, 150.0, -1.0, 9999.0])
        .attribute("scale_factor", NcAttr::Number(NcKind::Double, 0.01))
        .attribute("add_offset", NcAttr::Number(NcKind::Double, 0.5))
        .attribute("_FillValue", NcAttr::Number(NcKind::Short, -1.0))
        .attribute("missing_value", NcAttr::Number(NcKind::Short, 9999.0))
        .build();

    let grid = decode(&data).unwrap();
    let values = grid.variable("tp").unwrap().data();
    assert_approx_eq!(values[0], 0.5, 1e-12);
    assert_approx_eq!(values[1], 2.0, 1e-12);
    assert!(values[2].is_nan());
    assert!(values[3].is_nan());
}

#[test]
fn test_coordinates_attribute_marks_curvilinear_axes() {
    let data = NetCdfBuilder::new()
        .dimension("y", 1)
        .dimension("x", 2)
        .variable("gridlat", &["y", "x"], NcKind::Float, vec![52.0, 52.0])
        .variable("gridlon", &["y", "x"], NcKind::Float, vec![4.0, 5.0])
        .variable("ws", &["y", "x"], NcKind::Float, vec![3.0, 4.0])
        .attribute("coordinates", NcAttr::text("gridlat gridlon"))
        .build();

    let grid = decode(&data).unwrap();
    assert!(grid.is_coordinate("gridlat"));
    assert!(grid.is_coordinate("gridlon"));
    assert_eq!(grid.data_variable_names(), vec!["ws"]);
}

#[test]
fn test_file_without_variables() {
    let data = NetCdfBuilder::new().global_attribute("title", NcAttr::text("empty")).build();
    assert!(matches!(decode(&data), Err(NetCdfError::MissingData(_))));
}

#[test]
fn test_truncated_data_is_rejected() {
    let mut data = forecast_file(NetCdfBuilder::new());
    data.truncate(data.len() - 16);
    assert!(matches!(decode(&data), Err(NetCdfError::InvalidFormat(_))));
}

#[test]
fn test_unknown_version() {
    assert!(matches!(
        decode(b"CDF\x07\0\0\0\0"),
        Err(NetCdfError::Unsupported(_))
    ));
}

#[test]
fn test_inflated_record_count_is_rejected() {
    let mut data = NetCdfBuilder::new()
        .record_dimension("r", 1)
        .dimension("x", 4)
        .variable("v", &["r", "x"], NcKind::Double, vec![1.0, 2.0, 3.0, 4.0])
        .build();
    assert!(decode(&data).is_ok());

    // numrecs sits right after the magic in CDF-1
    data[4..8].copy_from_slice(&0x7FFF_FFFFu32.to_be_bytes());
    assert!(matches!(decode(&data), Err(NetCdfError::InvalidFormat(_))));
}

/// CDF-1 header with one double variable over two dimensions, no data.
fn header_only(dim_len: u32) -> Vec<u8> {
    let mut out = b"CDF\x01".to_vec();
    let put = |out: &mut Vec<u8>, n: u32| out.extend_from_slice(&n.to_be_bytes());
    put(&mut out, 0); // numrecs
    put(&mut out, 0x0A);
    put(&mut out, 2);
    for name in [b"x", b"y"] {
        put(&mut out, 1);
        out.extend_from_slice(name);
        out.extend_from_slice(&[0, 0, 0]);
        put(&mut out, dim_len);
    }
    put(&mut out, 0); // no global attributes
    put(&mut out, 0);
    put(&mut out, 0x0B);
    put(&mut out, 1);
    put(&mut out, 1);
    out.extend_from_slice(b"v\0\0\0");
    put(&mut out, 2);
    put(&mut out, 0);
    put(&mut out, 1);
    put(&mut out, 0); // no variable attributes
    put(&mut out, 0);
    put(&mut out, 6); // double
    put(&mut out, 0xFFFF_FFFF);
    let begin = out.len() as u32 + 4;
    put(&mut out, begin);
    out
}

#[test]
fn test_oversized_dimensions_are_rejected() {
    // (2^32 - 1)^2 doubles overflows the byte count
    assert!(matches!(
        decode(&header_only(0xFFFF_FFFF)),
        Err(NetCdfError::InvalidFormat(_))
    ));
    assert!(matches!(
        decode(&header_only(1 << 20)),
        Err(NetCdfError::InvalidFormat(_))
    ));
}
