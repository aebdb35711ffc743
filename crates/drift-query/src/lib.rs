//! Drift Query - From raw request parameters to partition queries
//!
//! `params` validates the query string into a [`QuerySpec`]; `plan` turns a
//! [`QuerySpec`] plus an intent into one SQL statement per relevant partition.

pub mod columns;
pub mod error;
pub mod params;
pub mod plan;

pub use columns::Column;
pub use error::QueryError;
pub use params::{parse_bool, parse_params, parse_track_id, OrderBy, QuerySpec, RawParams, TimeSelector};
pub use plan::{
    build_plan, PartitionQuery, QueryIntent, QueryPlan, Selection, DEFAULT_TRACKS_LIMIT,
    ORIGIN_LOOKBACK_YEARS,
};
