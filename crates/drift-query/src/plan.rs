//! Per-partition query planning.
//!
//! An intent plus a validated [`QuerySpec`] resolves to a [`QueryPlan`]: the
//! relevant partitions (in processing order) and one SQL statement for each,
//! all reading the table registered as [`PARTITION_TABLE`].
//!
//! - Tracks / TrackById read the catalog's default partition.
//! - Destination keeps trajectories whose observation 0 lies inside the area
//!   (exact test) and returns them whole.
//! - Origin keeps trajectories whose extent touches the area during the
//!   requested window (coarse test, any observation) and returns their
//!   observation 0, walking back over five years of releases.

use std::fmt;

use chrono::NaiveDate;
use drift_core::catalog::shift_months;
use drift_core::{Granularity, PartitionCatalog, PartitionKey, PartitionLocation, PARTITION_TABLE};
use tracing::debug;

use crate::columns::{projection, Column};
use crate::error::QueryError;
use crate::params::{QuerySpec, TimeSelector};

/// Row limit for `/tracks` when none is supplied.
pub const DEFAULT_TRACKS_LIMIT: u64 = 100_000;

/// How far back Origin looks for releases still drifting.
pub const ORIGIN_LOOKBACK_YEARS: i64 = 5;

const ALIAS: &str = "p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Tracks,
    TrackById(i64),
    Origin,
    Destination,
}

impl QueryIntent {
    /// Stable label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            QueryIntent::Tracks => "tracks",
            QueryIntent::TrackById(_) => "track_by_id",
            QueryIntent::Origin => "origin",
            QueryIntent::Destination => "destination",
        }
    }

    /// Origin and Destination merge several partitions and tag their features
    /// with the partition date.
    pub fn is_multi_partition(&self) -> bool {
        matches!(self, QueryIntent::Origin | QueryIntent::Destination)
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryIntent::TrackById(id) => write!(f, "track_by_id({})", id),
            other => f.write_str(other.name()),
        }
    }
}

/// One partition's executable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionQuery {
    pub key: PartitionKey,
    pub location: PartitionLocation,
    pub sql: String,
}

/// How the partitions of a plan were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A single, explicitly named partition: a missing file is an error.
    Explicit,
    /// Partitions enumerated from a range: missing files are skipped.
    Enumerated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub intent: QueryIntent,
    pub selection: Selection,
    /// Limit as supplied by the caller; `None` is reported as `-1`.
    pub limit: Option<u64>,
    pub queries: Vec<PartitionQuery>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Canonical text of the resolved query, the input of the cache key.
    pub fn cache_text(&self) -> String {
        let mut text = format!(
            "{}\nlimit={}\n",
            self.intent,
            self.limit.map(|l| l.to_string()).unwrap_or_else(|| "-1".into())
        );
        for q in &self.queries {
            text.push_str(&q.location.to_string());
            text.push('\n');
            text.push_str(&q.sql);
            text.push('\n');
        }
        text
    }

    /// Keep only the queries whose partition passed the existence check.
    pub fn retain_existing(&mut self, exists: &[bool]) {
        let mut flags = exists.iter();
        self.queries.retain(|_| flags.next().copied().unwrap_or(false));
    }
}

/// Resolve `intent` + `spec` against the catalog.
pub fn build_plan(
    intent: QueryIntent,
    spec: &QuerySpec,
    catalog: &PartitionCatalog,
) -> Result<QueryPlan, QueryError> {
    let plan = match intent {
        QueryIntent::Tracks | QueryIntent::TrackById(_) => plan_tracks(intent, spec, catalog)?,
        QueryIntent::Destination => {
            reject_order_by(spec)?;
            let (polygon, selector) = require_area_and_time(spec)?;
            let (selection, keys) = destination_keys(selector, catalog)?;
            let sql = destination_sql(polygon, spec.limit);
            with_locations(intent, selection, spec.limit, &keys, catalog, |_| sql.clone())
        }
        QueryIntent::Origin => {
            reject_order_by(spec)?;
            let (polygon, selector) = require_area_and_time(spec)?;
            let keys = origin_keys(selector, catalog)?;
            let sql = origin_sql(polygon, selector.window(), spec.include_trajectory, spec.limit);
            with_locations(intent, Selection::Enumerated, spec.limit, &keys, catalog, |_| {
                sql.clone()
            })
        }
    };

    debug!(
        intent = %plan.intent,
        partitions = plan.queries.len(),
        "built query plan"
    );
    Ok(plan)
}

fn plan_tracks(
    intent: QueryIntent,
    spec: &QuerySpec,
    catalog: &PartitionCatalog,
) -> Result<QueryPlan, QueryError> {
    let key = catalog.default_key();
    let location = catalog
        .get(&key)
        .cloned()
        .ok_or_else(|| QueryError::NoDataForSelector(key.to_string()))?;

    let mut sql = format!("SELECT {} FROM {} {}", projection(ALIAS), PARTITION_TABLE, ALIAS);
    let order = match intent {
        QueryIntent::TrackById(id) => {
            sql.push_str(&format!(" WHERE {} = {}", Column::Trajectory.qualified(ALIAS), id));
            Some(
                spec.order_by
                    .map(|o| o.to_sql(ALIAS))
                    .unwrap_or_else(|| Column::Obs.qualified(ALIAS)),
            )
        }
        _ => spec.order_by.map(|o| o.to_sql(ALIAS)),
    };
    if let Some(order) = order {
        sql.push_str(&format!(" ORDER BY {}", order));
    }
    let limit = match intent {
        QueryIntent::Tracks => Some(spec.limit.unwrap_or(DEFAULT_TRACKS_LIMIT)),
        _ => spec.limit,
    };
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok(QueryPlan {
        intent,
        selection: Selection::Explicit,
        limit: spec.limit,
        queries: vec![PartitionQuery { key, location, sql }],
    })
}

/// Origin and Destination have a fixed `(trajectory, obs)` order.
fn reject_order_by(spec: &QuerySpec) -> Result<(), QueryError> {
    match spec.order_by {
        Some(_) => Err(QueryError::invalid(
            "orderBy",
            "Only supported on /tracks and /tracks/{id}",
        )),
        None => Ok(()),
    }
}

fn require_area_and_time(spec: &QuerySpec) -> Result<(&str, &TimeSelector), QueryError> {
    let polygon = spec
        .polygon
        .as_deref()
        .ok_or(QueryError::MissingRequiredParameter("bbox or intersects"))?;
    let selector = spec
        .time_selector
        .as_ref()
        .ok_or(QueryError::MissingRequiredParameter("datetime"))?;
    Ok((polygon, selector))
}

fn destination_keys(
    selector: &TimeSelector,
    catalog: &PartitionCatalog,
) -> Result<(Selection, Vec<PartitionKey>), QueryError> {
    let no_data = || QueryError::NoDataForSelector(selector.raw().to_string());
    let month = selector.month_key();
    match (catalog.granularity(), selector.day_key()) {
        (Granularity::Day, Some(day)) if catalog.contains(&day) => {
            Ok((Selection::Explicit, vec![day]))
        }
        (Granularity::Day, Some(_)) => Err(no_data()),
        (Granularity::Day, None) => {
            let keys = catalog.keys_in_month(month.year(), month.month_of_year());
            if keys.is_empty() {
                Err(no_data())
            } else {
                Ok((Selection::Enumerated, keys.to_vec()))
            }
        }
        (Granularity::Month, _) if catalog.contains(&month) => {
            Ok((Selection::Explicit, vec![month]))
        }
        (Granularity::Month, _) => Err(no_data()),
    }
}

fn origin_keys(
    selector: &TimeSelector,
    catalog: &PartitionCatalog,
) -> Result<Vec<PartitionKey>, QueryError> {
    let to = selector.month_key();
    let from = shift_months(to, -ORIGIN_LOOKBACK_YEARS * 12).unwrap_or(to);
    let keys = catalog.months_between(from, to);
    if keys.is_empty() {
        return Err(QueryError::NoDataForSelector(selector.raw().to_string()));
    }
    Ok(keys.to_vec())
}

fn with_locations(
    intent: QueryIntent,
    selection: Selection,
    limit: Option<u64>,
    keys: &[PartitionKey],
    catalog: &PartitionCatalog,
    sql_for: impl Fn(&PartitionKey) -> String,
) -> QueryPlan {
    let queries = keys
        .iter()
        .filter_map(|key| {
            catalog.get(key).map(|location| PartitionQuery {
                key: *key,
                location: location.clone(),
                sql: sql_for(key),
            })
        })
        .collect();
    QueryPlan {
        intent,
        selection,
        limit,
        queries,
    }
}

fn destination_sql(polygon: &str, limit: Option<u64>) -> String {
    let traj = Column::Trajectory.name();
    let mut sql = format!(
        "WITH cte AS (\
         SELECT \"{traj}\" FROM {table} \
         WHERE \"obs\" = 0 AND st_intersects(\"geometry\", {wkt})\
         ) \
         SELECT {cols} FROM {table} {p} \
         JOIN cte c ON c.\"{traj}\" = {p}.\"{traj}\" \
         ORDER BY {p}.\"{traj}\", {p}.\"obs\"",
        traj = traj,
        table = PARTITION_TABLE,
        wkt = sql_string(polygon),
        cols = projection(ALIAS),
        p = ALIAS,
    );
    push_limit(&mut sql, limit);
    sql
}

fn origin_sql(
    polygon: &str,
    (start, end): (NaiveDate, NaiveDate),
    include_trajectory: bool,
    limit: Option<u64>,
) -> String {
    let traj = Column::Trajectory.name();
    let obs_filter = if include_trajectory {
        String::new()
    } else {
        format!("WHERE {}.\"obs\" = 0 ", ALIAS)
    };
    let mut sql = format!(
        "WITH cte AS (\
         SELECT DISTINCT \"{traj}\" FROM {table} \
         WHERE st_intersects_extent(\"geometry\", {wkt}) \
         AND CAST(\"time\" AS TIMESTAMP) >= {start} \
         AND CAST(\"time\" AS TIMESTAMP) < {end}\
         ) \
         SELECT {cols} FROM {table} {p} \
         JOIN cte c ON c.\"{traj}\" = {p}.\"{traj}\" \
         {obs_filter}\
         ORDER BY {p}.\"{traj}\", {p}.\"obs\"",
        traj = traj,
        table = PARTITION_TABLE,
        wkt = sql_string(polygon),
        start = timestamp_literal(start),
        end = timestamp_literal(end),
        cols = projection(ALIAS),
        p = ALIAS,
        obs_filter = obs_filter,
    );
    push_limit(&mut sql, limit);
    sql
}

fn push_limit(sql: &mut String, limit: Option<u64>) {
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
fn sql_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn timestamp_literal(date: NaiveDate) -> String {
    format!("TIMESTAMP '{} 00:00:00'", date.format("%Y-%m-%d"))
}
