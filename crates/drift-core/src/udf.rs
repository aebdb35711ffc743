//! Spatial User-Defined Functions for trajectory queries
//!
//! DataFusion has no geometry type, so partition geometries stay WKB binary
//! and these functions decode them on the fly:
//!
//! - `st_intersects(geometry, wkt)` exact intersection test
//! - `st_intersects_extent(geometry, wkt)` bounding-box intersection test
//! - `st_asgeojson(geometry)` GeoJSON geometry text

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, StringArray};
use arrow::datatypes::DataType;
use datafusion::common::ScalarValue;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::logical_expr::{ColumnarValue, ScalarUDF, ScalarUDFImpl, Signature, Volatility};
use datafusion::prelude::SessionContext;
use geo::{BoundingRect, Geometry, Intersects, Rect};
use geozero::wkb::Wkb;
use geozero::wkt::Wkt;
use geozero::{ToGeo, ToJson};
use std::sync::Arc;

/// Register all spatial UDFs with the session context
pub fn register_spatial_udfs(ctx: &SessionContext) {
    ctx.register_udf(st_intersects_udf());
    ctx.register_udf(st_intersects_extent_udf());
    ctx.register_udf(st_asgeojson_udf());
}

/// st_intersects(geometry, wkt) -> bool
pub fn st_intersects_udf() -> ScalarUDF {
    ScalarUDF::new_from_impl(StIntersects::new(IntersectMode::Exact))
}

/// st_intersects_extent(geometry, wkt) -> bool
///
/// True when the geometry's bounding box intersects the WKT's bounding box.
pub fn st_intersects_extent_udf() -> ScalarUDF {
    ScalarUDF::new_from_impl(StIntersects::new(IntersectMode::Extent))
}

/// st_asgeojson(geometry) -> utf8
pub fn st_asgeojson_udf() -> ScalarUDF {
    ScalarUDF::new_from_impl(StAsGeoJson::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntersectMode {
    Exact,
    Extent,
}

#[derive(Debug)]
struct StIntersects {
    mode: IntersectMode,
    signature: Signature,
}

impl StIntersects {
    fn new(mode: IntersectMode) -> Self {
        Self {
            mode,
            signature: Signature::any(2, Volatility::Immutable),
        }
    }
}

impl ScalarUDFImpl for StIntersects {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn name(&self) -> &str {
        match self.mode {
            IntersectMode::Exact => "st_intersects",
            IntersectMode::Extent => "st_intersects_extent",
        }
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> DFResult<DataType> {
        Ok(DataType::Boolean)
    }

    fn invoke_batch(&self, args: &[ColumnarValue], num_rows: usize) -> DFResult<ColumnarValue> {
        let geometries = to_array(&args[0], num_rows)?;
        let area = wkt_constant(self.name(), &args[1])?;
        let area_rect = area.bounding_rect();

        let result: BooleanArray = wkb_values(&geometries)?
            .into_iter()
            .map(|value| match value {
                None => Ok(None),
                Some(bytes) => {
                    let geom = decode_wkb(bytes)?;
                    let hit = match self.mode {
                        IntersectMode::Exact => geom.intersects(&area),
                        IntersectMode::Extent => extents_intersect(geom.bounding_rect(), area_rect),
                    };
                    Ok(Some(hit))
                }
            })
            .collect::<DFResult<_>>()?;

        Ok(ColumnarValue::Array(Arc::new(result) as ArrayRef))
    }
}

#[derive(Debug)]
struct StAsGeoJson {
    signature: Signature,
}

impl StAsGeoJson {
    fn new() -> Self {
        Self {
            signature: Signature::any(1, Volatility::Immutable),
        }
    }
}

impl ScalarUDFImpl for StAsGeoJson {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn name(&self) -> &str {
        "st_asgeojson"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _arg_types: &[DataType]) -> DFResult<DataType> {
        Ok(DataType::Utf8)
    }

    fn invoke_batch(&self, args: &[ColumnarValue], num_rows: usize) -> DFResult<ColumnarValue> {
        let geometries = to_array(&args[0], num_rows)?;
        let result: StringArray = wkb_values(&geometries)?
            .into_iter()
            .map(|value| {
                value
                    .map(|bytes| {
                        Wkb(bytes).to_json().map_err(|e| {
                            DataFusionError::Execution(format!("st_asgeojson: {}", e))
                        })
                    })
                    .transpose()
            })
            .collect::<DFResult<_>>()?;

        Ok(ColumnarValue::Array(Arc::new(result) as ArrayRef))
    }
}

fn to_array(arg: &ColumnarValue, num_rows: usize) -> DFResult<ArrayRef> {
    match arg {
        ColumnarValue::Array(arr) => Ok(arr.clone()),
        ColumnarValue::Scalar(s) => s.to_array_of_size(num_rows),
    }
}

/// Borrow the WKB payloads of any binary array flavour.
fn wkb_values(array: &ArrayRef) -> DFResult<Vec<Option<&[u8]>>> {
    match array.data_type() {
        DataType::Binary => Ok(array.as_binary::<i32>().iter().collect()),
        DataType::LargeBinary => Ok(array.as_binary::<i64>().iter().collect()),
        DataType::BinaryView => Ok(array.as_binary_view().iter().collect()),
        DataType::Null => Ok(vec![None; array.len()]),
        other => Err(DataFusionError::Execution(format!(
            "expected WKB geometry (binary), got {}",
            other
        ))),
    }
}

fn wkt_constant(function: &str, arg: &ColumnarValue) -> DFResult<Geometry<f64>> {
    match arg {
        ColumnarValue::Scalar(
            ScalarValue::Utf8(Some(text))
            | ScalarValue::LargeUtf8(Some(text))
            | ScalarValue::Utf8View(Some(text)),
        ) => parse_wkt(text),
        _ => Err(DataFusionError::Execution(format!(
            "{} expects a constant WKT string as second argument",
            function
        ))),
    }
}

/// Parse WKT text into a geometry.
pub fn parse_wkt(text: &str) -> DFResult<Geometry<f64>> {
    Wkt(text)
        .to_geo()
        .map_err(|e| DataFusionError::Execution(format!("invalid WKT '{}': {}", text, e)))
}

fn decode_wkb(bytes: &[u8]) -> DFResult<Geometry<f64>> {
    Wkb(bytes)
        .to_geo()
        .map_err(|e| DataFusionError::Execution(format!("invalid WKB geometry: {}", e)))
}

fn extents_intersect(a: Option<Rect<f64>>, b: Option<Rect<f64>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}
