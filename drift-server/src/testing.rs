//! Partition fixtures shared by the server tests.
//!
//! Each fixture partition holds 12 trajectories of 3 observations:
//! trajectories 0..6 start at `(2 + 0.1t, 45)` (France), 6..12 at
//! `(-30 - t, 10)` (open Atlantic), and every observation moves one degree
//! east and one day later. `RI` is 0.5 for even trajectories, 0.05 for odd.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, Float64Array, Int64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use drift_core::{CatalogConfig, Granularity, PartitionCatalog};
use parquet::arrow::ArrowWriter;

pub const TRAJECTORIES: i64 = 12;
pub const OBSERVATIONS: i64 = 3;

#[derive(Debug, Clone)]
pub struct FixtureRow {
    pub trajectory: i64,
    pub obs: i64,
    pub x: f64,
    pub y: f64,
    pub time: DateTime<Utc>,
    pub ri: f64,
}

pub fn fixture_rows(year: i32, month: u32) -> Vec<FixtureRow> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    let mut rows = Vec::new();
    for t in 0..TRAJECTORIES {
        let (x0, y) = if t < 6 {
            (2.0 + 0.1 * t as f64, 45.0)
        } else {
            (-30.0 - t as f64, 10.0)
        };
        for obs in 0..OBSERVATIONS {
            rows.push(FixtureRow {
                trajectory: t,
                obs,
                x: x0 + obs as f64,
                y,
                time: start + Duration::days(obs),
                ri: if t % 2 == 0 { 0.5 } else { 0.05 },
            });
        }
    }
    rows
}

pub fn point_wkb(x: f64, y: f64) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out
}

/// Write the fixture partition for `year-month` with the GeoParquet column set.
pub fn write_partition(path: &Path, year: i32, month: u32) {
    let rows = fixture_rows(year, month);
    let float = |f: &dyn Fn(&FixtureRow) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(rows.iter().map(f)))
    };

    let schema = Arc::new(Schema::new(vec![
        Field::new("trajectory", DataType::Int64, false),
        Field::new("obs", DataType::Int64, false),
        Field::new("CI", DataType::Float64, true),
        Field::new("EEZ", DataType::Float64, true),
        Field::new("MPW", DataType::Float64, true),
        Field::new("RI", DataType::Float64, true),
        Field::new("RI_annual", DataType::Float64, true),
        Field::new("age", DataType::Int64, true),
        Field::new("distcoast", DataType::Float64, true),
        Field::new("time", DataType::Timestamp(TimeUnit::Microsecond, None), false),
        Field::new("travelled_distance", DataType::Float64, true),
        Field::new("z", DataType::Float64, true),
        Field::new("geometry", DataType::Binary, false),
    ]));
    let wkb: Vec<Vec<u8>> = rows.iter().map(|r| point_wkb(r.x, r.y)).collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.trajectory))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.obs))),
        float(&|_| 0.25),
        float(&|_| 1.0),
        float(&|_| 0.0),
        float(&|r| r.ri),
        float(&|r| r.ri / 12.0),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.obs * 86_400))),
        float(&|r| 100.0 - r.obs as f64),
        Arc::new(TimestampMicrosecondArray::from_iter_values(
            rows.iter().map(|r| r.time.timestamp_micros()),
        )),
        float(&|r| r.obs as f64 * 80.0),
        float(&|_| 0.0),
        Arc::new(BinaryArray::from_iter_values(wkb.iter())),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// Monthly catalog over 2010 rooted in `dir`; only January and February
/// files are written.
pub fn fixture_catalog(dir: &Path) -> PartitionCatalog {
    for month in [1, 2] {
        write_partition(&partition_path(dir, month), 2010, month);
    }
    PartitionCatalog::build(&CatalogConfig {
        years: vec![2010],
        months: (1..=12).collect(),
        days: vec![],
        granularity: Granularity::Month,
        template: format!("{}/drift_{{year}}-{{month0}}.parquet", dir.display()),
        default_key: None,
    })
    .unwrap()
}

pub fn partition_path(dir: &Path, month: u32) -> PathBuf {
    dir.join(format!("drift_2010-{:02}.parquet", month))
}
