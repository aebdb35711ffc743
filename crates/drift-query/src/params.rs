//! Query-string validation.
//!
//! Every endpoint shares the same parameter set:
//!
//! - `limit`      : non-negative integer
//! - `bbox`       : `lonMin,latMin,lonMax,latMax`
//! - `intersects` : WKT polygon, wins over `bbox` when both are given
//! - `datetime`   : `YYYY-MM[-DD]...`, first element of a `/` range; `month` is an alias
//! - `traj`, `minimalist` : boolean-ish flags
//! - `orderBy`    : projected column name, optionally followed by `asc`/`desc`;
//!   only `/tracks` and `/tracks/{id}` accept it, Origin and Destination
//!   always order by `(trajectory, obs)`

use chrono::NaiveDate;
use drift_core::catalog::next_month_start;
use drift_core::PartitionKey;
use serde::Deserialize;

use crate::columns::Column;
use crate::error::QueryError;

/// Raw query string, exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParams {
    pub limit: Option<String>,
    pub bbox: Option<String>,
    pub intersects: Option<String>,
    pub datetime: Option<String>,
    pub month: Option<String>,
    pub traj: Option<String>,
    pub minimalist: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
}

/// Validated request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub limit: Option<u64>,
    /// Area of interest as WKT.
    pub polygon: Option<String>,
    pub time_selector: Option<TimeSelector>,
    pub include_trajectory: bool,
    pub order_by: Option<OrderBy>,
    pub minimalist: bool,
}

/// Calendar selector taken from `datetime` / `month`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSelector {
    raw: String,
    month: PartitionKey,
    day: Option<PartitionKey>,
}

impl TimeSelector {
    /// Parse the leading `YYYY-MM[-DD]` of the first range element.
    pub fn parse(param: &'static str, raw: &str) -> Result<Self, QueryError> {
        let invalid = || QueryError::invalid(param, "Should start with YYYY-MM");
        let first = raw.split('/').next().unwrap_or_default();
        let bytes = first.as_bytes();
        let digits = |range: std::ops::Range<usize>| {
            bytes.get(range).is_some_and(|b| b.iter().all(u8::is_ascii_digit))
        };

        if !(digits(0..4) && bytes.get(4) == Some(&b'-') && digits(5..7)) {
            return Err(invalid());
        }
        let year: i32 = first[0..4].parse().map_err(|_| invalid())?;
        let month_of_year: u32 = first[5..7].parse().map_err(|_| invalid())?;
        let month = PartitionKey::month(year, month_of_year).map_err(|_| invalid())?;

        let day = if bytes.get(7) == Some(&b'-') && digits(8..10) {
            let day_of_month: u32 = first[8..10].parse().map_err(|_| invalid())?;
            Some(PartitionKey::day(year, month_of_year, day_of_month).map_err(|_| invalid())?)
        } else {
            None
        };

        Ok(Self {
            raw: raw.to_string(),
            month,
            day,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Month-level key of the selector.
    pub fn month_key(&self) -> PartitionKey {
        self.month
    }

    /// Day-level key, when the selector names a day.
    pub fn day_key(&self) -> Option<PartitionKey> {
        self.day
    }

    /// Half-open `[start, end)` window: the selected day, or the whole month.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        match self.day {
            Some(day) => {
                let start = day.start_date();
                (start, start.succ_opt().unwrap_or(start))
            }
            None => {
                let start = self.month.start_date();
                (start, next_month_start(start).unwrap_or(start))
            }
        }
    }
}

/// Validated `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: Column,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let invalid = || {
            QueryError::invalid("orderBy", "Should be a column name optionally followed by asc or desc")
        };
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let (name, descending) = match parts.as_slice() {
            [name] => (*name, false),
            [name, dir] if dir.eq_ignore_ascii_case("asc") => (*name, false),
            [name, dir] if dir.eq_ignore_ascii_case("desc") => (*name, true),
            _ => return Err(invalid()),
        };
        let column = Column::from_name(name)
            .filter(|c| c.is_sortable())
            .ok_or_else(invalid)?;
        Ok(Self { column, descending })
    }

    /// `ORDER BY` term against table alias `alias`.
    pub fn to_sql(&self, alias: &str) -> String {
        let dir = if self.descending { "DESC" } else { "ASC" };
        format!("{} {}", self.column.qualified(alias), dir)
    }
}

/// Validate a raw query string.
pub fn parse_params(raw: &RawParams) -> Result<QuerySpec, QueryError> {
    let limit = raw.limit.as_deref().map(parse_limit).transpose()?;

    let mut polygon = raw.bbox.as_deref().map(bbox_to_wkt).transpose()?;
    if let Some(ref intersects) = raw.intersects {
        polygon = Some(intersects.clone());
    }

    let time_selector = match (&raw.datetime, &raw.month) {
        (Some(datetime), _) => Some(TimeSelector::parse("datetime", datetime)?),
        (None, Some(month)) => Some(TimeSelector::parse("month", month)?),
        (None, None) => None,
    };

    let order_by = raw.order_by.as_deref().map(OrderBy::parse).transpose()?;

    Ok(QuerySpec {
        limit,
        polygon,
        time_selector,
        include_trajectory: parse_bool(raw.traj.as_deref()),
        order_by,
        minimalist: parse_bool(raw.minimalist.as_deref()),
    })
}

fn parse_limit(raw: &str) -> Result<u64, QueryError> {
    let invalid = || QueryError::invalid("limit", "Should be an integer greater than 0");
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // The engine plans LIMIT as a signed 64-bit value.
    match raw.parse::<u64>() {
        Ok(limit) if i64::try_from(limit).is_ok() => Ok(limit),
        _ => Err(invalid()),
    }
}

/// Expand `lonMin,latMin,lonMax,latMax` into a closed rectangle WKT.
///
/// The caller's number text is kept as-is; reversed boxes are not reordered.
pub fn bbox_to_wkt(raw: &str) -> Result<String, QueryError> {
    let invalid = || QueryError::invalid("bbox", "Should be lonMin,latMin,lonMax,latMax");
    let coords: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [a, b, c, d] = coords.as_slice() else {
        return Err(invalid());
    };
    for n in [a, b, c, d] {
        match n.parse::<f64>() {
            Ok(v) if v.is_finite() => {}
            _ => return Err(invalid()),
        }
    }
    Ok(format!(
        "POLYGON(({a} {b}, {a} {d}, {c} {d}, {c} {b}, {a} {b}))"
    ))
}

/// `"false"`, `"0"`, `""` and absent are false; anything else is true.
pub fn parse_bool(raw: Option<&str>) -> bool {
    !matches!(raw, None | Some("false") | Some("0") | Some(""))
}

/// Track id path segment: an optionally negative decimal integer.
pub fn parse_track_id(raw: &str) -> Result<i64, QueryError> {
    let invalid = || QueryError::invalid("id", "Should be an integer");
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawParams {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn test_limit() {
        assert_eq!(parse_params(&raw(&[("limit", "10")])).unwrap().limit, Some(10));
        assert_eq!(parse_params(&raw(&[])).unwrap().limit, None);
        for bad in ["-1", "1.5", "ten", "", " 10"] {
            let err = parse_params(&raw(&[("limit", bad)])).unwrap_err();
            assert_eq!(err.param(), Some("limit"), "input {:?}", bad);
        }
    }

    #[test]
    fn test_limit_must_fit_a_signed_64_bit_value() {
        let max = i64::MAX.to_string();
        assert_eq!(
            parse_params(&raw(&[("limit", max.as_str())])).unwrap().limit,
            Some(i64::MAX as u64)
        );
        for bad in ["9223372036854775808", "10000000000000000000", "99999999999999999999999"] {
            let err = parse_params(&raw(&[("limit", bad)])).unwrap_err();
            assert_eq!(err.to_string(), "Invalid limit. Should be an integer greater than 0");
        }
    }

    #[test]
    fn test_bbox_expands_to_closed_rectangle() {
        for (a, b, c, d) in [("-10", "30", "10", "50"), ("1.5", "-2", "3.25", "4"), ("10", "50", "-10", "30")] {
            let wkt = bbox_to_wkt(&format!("{},{},{},{}", a, b, c, d)).unwrap();
            let expected = format!(
                "POLYGON(({a} {b}, {a} {d}, {c} {d}, {c} {b}, {a} {b}))"
            );
            assert_eq!(wkt, expected);

            let inner = wkt.trim_start_matches("POLYGON((").trim_end_matches("))");
            let vertices: Vec<&str> = inner.split(", ").collect();
            assert_eq!(vertices.len(), 5);
            assert_eq!(vertices.first(), vertices.last());
        }
    }

    #[test]
    fn test_bbox_rejects_malformed() {
        for bad in ["1,2,3", "1,2,3,4,5", "a,b,c,d", "1,2,3,NaN", "1,2,3,4)) OR 1=1 --"] {
            let err = bbox_to_wkt(bad).unwrap_err();
            assert_eq!(err.param(), Some("bbox"), "input {:?}", bad);
        }
    }

    #[test]
    fn test_intersects_wins_over_bbox() {
        let spec = parse_params(&raw(&[
            ("bbox", "0,0,1,1"),
            ("intersects", "POINT(5 5)"),
        ]))
        .unwrap();
        assert_eq!(spec.polygon.as_deref(), Some("POINT(5 5)"));
    }

    #[test]
    fn test_time_selector_forms() {
        let month = TimeSelector::parse("month", "2010-03").unwrap();
        assert_eq!(month.month_key().to_string(), "2010-03");
        assert_eq!(month.day_key(), None);
        assert_eq!(
            month.window(),
            (
                NaiveDate::from_ymd_opt(2010, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2010, 4, 1).unwrap()
            )
        );

        let day = TimeSelector::parse("datetime", "2010-12-08T00:00:00Z/2010-12-31T00:00:00Z").unwrap();
        assert_eq!(day.day_key().map(|k| k.to_string()).as_deref(), Some("2010-12-08"));
        assert_eq!(day.month_key().to_string(), "2010-12");
        assert_eq!(day.window().1, NaiveDate::from_ymd_opt(2010, 12, 9).unwrap());
    }

    #[test]
    fn test_time_selector_errors_name_the_parameter() {
        let err = parse_params(&raw(&[("month", "2010")])).unwrap_err();
        assert_eq!(err.param(), Some("month"));

        let err = parse_params(&raw(&[("datetime", "10-01-2010")])).unwrap_err();
        assert_eq!(err.param(), Some("datetime"));

        assert!(TimeSelector::parse("month", "2010-13").is_err());
        assert!(TimeSelector::parse("month", "2010-02-30").is_err());
    }

    #[test]
    fn test_datetime_takes_precedence_over_month() {
        let spec = parse_params(&raw(&[("datetime", "2010-05"), ("month", "2011-01")])).unwrap();
        assert_eq!(spec.time_selector.unwrap().month_key().to_string(), "2010-05");
    }

    #[test]
    fn test_parse_bool() {
        assert!(!parse_bool(None));
        for falsy in ["false", "0", ""] {
            assert!(!parse_bool(Some(falsy)));
        }
        for truthy in ["true", "1", "yes", "False"] {
            assert!(parse_bool(Some(truthy)));
        }
    }

    #[test]
    fn test_order_by_allow_list() {
        let order = OrderBy::parse("RI desc").unwrap();
        assert_eq!(order.column, Column::Ri);
        assert!(order.descending);
        assert_eq!(order.to_sql("p"), "p.\"RI\" DESC");

        assert_eq!(OrderBy::parse("obs").unwrap().to_sql("p"), "p.\"obs\" ASC");

        for bad in ["ri", "obs sideways", "geometry", "obs; DROP TABLE t", "", "obs asc extra"] {
            let err = OrderBy::parse(bad).unwrap_err();
            assert_eq!(err.param(), Some("orderBy"), "input {:?}", bad);
        }
    }

    #[test]
    fn test_parse_track_id() {
        assert_eq!(parse_track_id("42").unwrap(), 42);
        assert_eq!(parse_track_id("-7").unwrap(), -7);
        for bad in ["", "-", "4x", "1 OR 1=1", "99999999999999999999"] {
            assert!(parse_track_id(bad).is_err(), "input {:?}", bad);
        }
    }
}
