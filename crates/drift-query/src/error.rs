//! Request validation and planning errors

use thiserror::Error;

/// Errors detected before any partition query is dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid {param}. {reason}")]
    InvalidParameter {
        param: &'static str,
        reason: &'static str,
    },

    #[error("Mandatory {0} is missing")]
    MissingRequiredParameter(&'static str),

    /// The selector resolved to no configured (or existing) partition.
    #[error("No data associated with datetime")]
    NoDataForSelector(String),
}

impl QueryError {
    pub(crate) fn invalid(param: &'static str, reason: &'static str) -> Self {
        Self::InvalidParameter { param, reason }
    }

    /// Name of the offending parameter, when there is one.
    pub fn param(&self) -> Option<&'static str> {
        match self {
            Self::InvalidParameter { param, .. } => Some(*param),
            Self::MissingRequiredParameter(param) => Some(*param),
            Self::NoDataForSelector(_) => None,
        }
    }
}
