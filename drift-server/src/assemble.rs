//! Turns per-partition rows into one GeoJSON FeatureCollection.

use chrono::SecondsFormat;
use drift_core::ContinentRegistry;
use drift_core::UNKNOWN_REGION;
use drift_query::{Column, QueryIntent};
use geojson::{feature, Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use serde_json::json;

use crate::error::ApiError;
use crate::executor::{Execution, PartitionRows};
use crate::rows::RawRow;

/// `RI` above which a release is flagged as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.1;

const LOCATED_IN: &str = "locatedIn";
const PLASTIC_CODE: &str = "plasticCode";

/// Per-request assembly settings.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub intent: QueryIntent,
    pub limit: Option<u64>,
    pub minimalist: bool,
}

/// Build the response body. Partitions are emitted in plan order, rows in
/// engine order.
pub fn assemble(
    execution: &Execution,
    options: AssemblyOptions,
    geocoder: &ContinentRegistry,
    processing_ms: f64,
) -> Result<JsonValue, ApiError> {
    let mut features = Vec::new();
    for partition in &execution.partitions {
        append_partition(&mut features, partition, options, geocoder)?;
    }
    if options.intent.is_multi_partition() {
        if let Some(limit) = options.limit {
            features.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
    }

    let mut foreign = JsonObject::new();
    foreign.insert("links".into(), links(&execution.partitions));
    foreign.insert(
        "context".into(),
        json!({
            "returned": features.len(),
            "limit": options.limit.map_or(json!(-1), |l| json!(l)),
            "query": { "processingTime": processing_ms },
        }),
    );
    if !execution.warnings.is_empty() {
        foreign.insert("warnings".into(), json!(execution.warnings));
    }

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign),
    };
    serde_json::to_value(&collection).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Replace `context.query.processingTime` of a cached body.
pub fn with_processing_time(mut body: JsonValue, processing_ms: f64) -> JsonValue {
    if let Some(query) = body.pointer_mut("/context/query") {
        query["processingTime"] = json!(processing_ms);
    }
    body
}

fn append_partition(
    features: &mut Vec<Feature>,
    partition: &PartitionRows,
    options: AssemblyOptions,
    geocoder: &ContinentRegistry,
) -> Result<(), ApiError> {
    let multi = options.intent.is_multi_partition();
    // Tag of the partition, from the release date of its first row.
    let iso_time = partition
        .rows
        .first()
        .map(|row| row.time.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    for row in &partition.rows {
        let geometry: Geometry = serde_json::from_str(&row.geometry).map_err(|e| {
            ApiError::EngineQueryFailure(format!(
                "trajectory {} obs {} in {}: invalid geometry: {}",
                row.trajectory, row.obs, partition.location, e
            ))
        })?;

        let mut properties = properties(row, options.minimalist);
        let located_in = representative_coord(&geometry.value)
            .map(|(lon, lat)| geocoder.locate(lon, lat))
            .unwrap_or(UNKNOWN_REGION);
        properties.insert(LOCATED_IN.into(), json!(located_in));

        let id = if multi {
            properties.insert(
                Column::Trajectory.name().into(),
                json!(format!("{}_{}", iso_time, row.trajectory)),
            );
            properties.insert(PLASTIC_CODE.into(), json!(plastic_code(row.ri)));
            format!("{}_{}_{}", iso_time, row.trajectory, row.obs)
        } else {
            format!("{}_{}", row.trajectory, row.obs)
        };

        features.push(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: Some(feature::Id::String(id)),
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(())
}

fn properties(row: &RawRow, minimalist: bool) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert(Column::Trajectory.name().into(), json!(row.trajectory.to_string()));
    props.insert(Column::Obs.name().into(), json!(row.obs.to_string()));
    props.insert(
        Column::Time.name().into(),
        json!(row.time.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    if minimalist {
        return props;
    }

    for (column, value) in [
        (Column::Ci, row.ci),
        (Column::Eez, row.eez),
        (Column::Mpw, row.mpw),
        (Column::Ri, row.ri),
        (Column::RiAnnual, row.ri_annual),
        (Column::Distcoast, row.distcoast),
        (Column::TravelledDistance, row.travelled_distance),
        (Column::Z, row.z),
    ] {
        props.insert(column.name().into(), number(value));
    }
    props.insert(
        Column::Age.name().into(),
        row.age.map(|a| json!(a.to_string())).unwrap_or(JsonValue::Null),
    );
    props
}

/// Non-finite and missing values serialize as `null`.
fn number(value: Option<f64>) -> JsonValue {
    match value {
        Some(v) if v.is_finite() => json!(v),
        _ => JsonValue::Null,
    }
}

pub fn plastic_code(ri: Option<f64>) -> &'static str {
    match ri {
        Some(ri) if ri > HIGH_RISK_THRESHOLD => "HIGH_RISK",
        _ => "LOW_RISK",
    }
}

/// First coordinate of a geometry, `None` when it has none.
fn representative_coord(value: &geojson::Value) -> Option<(f64, f64)> {
    use geojson::Value;

    let position = match value {
        Value::Point(p) => Some(p),
        Value::MultiPoint(points) | Value::LineString(points) => points.first(),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            lines.iter().flat_map(|l| l.first()).next()
        }
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .flat_map(|p| p.iter())
            .flat_map(|ring| ring.first())
            .next(),
        Value::GeometryCollection(geometries) => {
            return geometries
                .iter()
                .find_map(|g| representative_coord(&g.value));
        }
    }?;
    match position.as_slice() {
        [lon, lat, ..] => Some((*lon, *lat)),
        _ => None,
    }
}

fn links(partitions: &[PartitionRows]) -> JsonValue {
    JsonValue::Array(
        partitions
            .iter()
            .map(|p| {
                json!({
                    "href": p.location.to_string(),
                    "rel": "data",
                    "title": "GeoParquet file",
                    "type": "application/vnd.apache.parquet",
                })
            })
            .collect(),
    )
}
