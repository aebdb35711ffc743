//! Fixed-shape rows decoded from partition query results.

use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMillisecondType};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use drift_query::Column;

/// One observation as returned by the shared projection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub trajectory: i64,
    pub obs: i64,
    pub ci: Option<f64>,
    pub eez: Option<f64>,
    pub mpw: Option<f64>,
    pub ri: Option<f64>,
    pub ri_annual: Option<f64>,
    pub age: Option<i64>,
    pub distcoast: Option<f64>,
    pub time: DateTime<Utc>,
    pub travelled_distance: Option<f64>,
    pub z: Option<f64>,
    /// GeoJSON geometry text.
    pub geometry: String,
}

/// Decode every batch of a partition result, preserving row order.
pub fn decode_batches(batches: &[RecordBatch]) -> Result<Vec<RawRow>> {
    let total = batches.iter().map(|b| b.num_rows()).sum();
    let mut rows = Vec::with_capacity(total);
    for batch in batches {
        decode_batch(batch, &mut rows)?;
    }
    Ok(rows)
}

fn decode_batch(batch: &RecordBatch, out: &mut Vec<RawRow>) -> Result<()> {
    let int = |c: Column| column(batch, c, &DataType::Int64);
    let float = |c: Column| column(batch, c, &DataType::Float64);

    let trajectory = int(Column::Trajectory)?;
    let obs = int(Column::Obs)?;
    let age = int(Column::Age)?;
    let ci = float(Column::Ci)?;
    let eez = float(Column::Eez)?;
    let mpw = float(Column::Mpw)?;
    let ri = float(Column::Ri)?;
    let ri_annual = float(Column::RiAnnual)?;
    let distcoast = float(Column::Distcoast)?;
    let travelled_distance = float(Column::TravelledDistance)?;
    let z = float(Column::Z)?;
    let time = column(
        batch,
        Column::Time,
        &DataType::Timestamp(TimeUnit::Millisecond, None),
    )?;
    let geometry = column(batch, Column::Geometry, &DataType::Utf8)?;

    let trajectory = trajectory.as_primitive::<Int64Type>();
    let obs = obs.as_primitive::<Int64Type>();
    let age = age.as_primitive::<Int64Type>();
    let time = time.as_primitive::<TimestampMillisecondType>();
    let geometry = geometry.as_string::<i32>();
    let floats = |a: &ArrayRef, i: usize| {
        let a = a.as_primitive::<Float64Type>();
        a.is_valid(i).then(|| a.value(i))
    };

    for i in 0..batch.num_rows() {
        if trajectory.is_null(i) || obs.is_null(i) {
            bail!("row {} has a null trajectory or obs", i);
        }
        if time.is_null(i) || geometry.is_null(i) {
            bail!(
                "trajectory {} obs {} has a null time or geometry",
                trajectory.value(i),
                obs.value(i)
            );
        }
        let at = DateTime::from_timestamp_millis(time.value(i))
            .ok_or_else(|| anyhow!("timestamp out of range: {}", time.value(i)))?;

        out.push(RawRow {
            trajectory: trajectory.value(i),
            obs: obs.value(i),
            ci: floats(&ci, i),
            eez: floats(&eez, i),
            mpw: floats(&mpw, i),
            ri: floats(&ri, i),
            ri_annual: floats(&ri_annual, i),
            age: age.is_valid(i).then(|| age.value(i)),
            distcoast: floats(&distcoast, i),
            time: at,
            travelled_distance: floats(&travelled_distance, i),
            z: floats(&z, i),
            geometry: geometry.value(i).to_string(),
        });
    }
    Ok(())
}

fn column(batch: &RecordBatch, column: Column, ty: &DataType) -> Result<ArrayRef> {
    let array = batch
        .column_by_name(column.name())
        .with_context(|| format!("result is missing column '{}'", column))?;
    if array.data_type() == ty {
        return Ok(array.clone());
    }
    cast(array, ty).with_context(|| format!("column '{}' is not {}", column, ty))
}
