//! Partition catalog: maps calendar keys to the GeoParquet file that holds
//! the trajectories released on that date.
//!
//! The catalog is built once at startup from a cartesian product of
//! configured years × months (× days) and a location template. Building it
//! never touches the network or the filesystem; whether a file actually
//! exists is decided later by the connectors' probe.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("month {0} is outside 1..=12")]
    InvalidMonth(u32),

    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    InvalidDay { year: i32, month: u32, day: u32 },

    #[error("invalid partition key '{0}', expected YYYY-MM or YYYY-MM-DD")]
    InvalidKey(String),

    #[error("invalid partition location '{0}': {1}")]
    InvalidLocation(String, String),

    #[error("default partition {0} is not part of the catalog")]
    UnknownDefault(PartitionKey),

    #[error("catalog configuration yields no partitions")]
    Empty,
}

/// Time resolution of the dataset's partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Month,
    Day,
}

/// Calendar identifier of one partition.
///
/// Ordering is chronological: (year, month, day), with a month-level key
/// sorting before every day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    year: i32,
    month: u32,
    day: Option<u32>,
}

impl PartitionKey {
    pub fn month(year: i32, month: u32) -> Result<Self, CatalogError> {
        if !(1..=12).contains(&month) {
            return Err(CatalogError::InvalidMonth(month));
        }
        Ok(Self {
            year,
            month,
            day: None,
        })
    }

    pub fn day(year: i32, month: u32, day: u32) -> Result<Self, CatalogError> {
        if !(1..=12).contains(&month) {
            return Err(CatalogError::InvalidMonth(month));
        }
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(CatalogError::InvalidDay { year, month, day });
        }
        Ok(Self {
            year,
            month,
            day: Some(day),
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month_of_year(&self) -> u32 {
        self.month
    }

    pub fn day_of_month(&self) -> Option<u32> {
        self.day
    }

    pub fn granularity(&self) -> Granularity {
        if self.day.is_some() {
            Granularity::Day
        } else {
            Granularity::Month
        }
    }

    /// Months elapsed since year 0, used for month-window arithmetic.
    pub fn month_index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    /// First calendar day covered by this key.
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day.unwrap_or(1))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.day {
            Some(day) => write!(f, "{:04}-{:02}-{:02}", self.year, self.month, day),
            None => write!(f, "{:04}-{:02}", self.year, self.month),
        }
    }
}

impl FromStr for PartitionKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CatalogError::InvalidKey(s.to_string());
        let parts: Vec<&str> = s.split('-').collect();
        let digits = |p: &str, len: usize| p.len() == len && p.bytes().all(|b| b.is_ascii_digit());
        match parts.as_slice() {
            [y, m] if digits(y, 4) && digits(m, 2) => {
                Self::month(y.parse().map_err(|_| invalid())?, m.parse().map_err(|_| invalid())?)
            }
            [y, m, d] if digits(y, 4) && digits(m, 2) && digits(d, 2) => Self::day(
                y.parse().map_err(|_| invalid())?,
                m.parse().map_err(|_| invalid())?,
                d.parse().map_err(|_| invalid())?,
            ),
            _ => Err(invalid()),
        }
    }
}

/// Physical location of a partition file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionLocation {
    Local(PathBuf),
    Http(Url),
    S3(Url),
}

impl PartitionLocation {
    /// Classify a rendered location: `http(s)://` and `s3://` are remote,
    /// anything else (including `file://`) is a local path.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let invalid = |e: url::ParseError| CatalogError::InvalidLocation(raw.to_string(), e.to_string());
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Ok(Self::Http(Url::parse(raw).map_err(invalid)?))
        } else if raw.starts_with("s3://") {
            Ok(Self::S3(Url::parse(raw).map_err(invalid)?))
        } else if let Some(path) = raw.strip_prefix("file://") {
            Ok(Self::Local(PathBuf::from(path)))
        } else {
            Ok(Self::Local(PathBuf::from(raw)))
        }
    }

    /// Location string as DataFusion expects it when registering the table.
    pub fn table_uri(&self) -> String {
        match self {
            Self::Local(path) => path.to_string_lossy().into_owned(),
            Self::Http(url) | Self::S3(url) => url.to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local(_))
    }
}

impl fmt::Display for PartitionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_uri())
    }
}

/// Inputs for [`PartitionCatalog::build`].
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    /// Days of month to enumerate; ignored for monthly datasets.
    pub days: Vec<u32>,
    pub granularity: Granularity,
    /// Location template with `{year}`, `{month}`, `{month0}`, `{day}` and
    /// `{day0}` placeholders (`0` suffix = zero-padded).
    pub template: String,
    /// Partition served by `/tracks`; defaults to the earliest key.
    pub default_key: Option<PartitionKey>,
}

/// Immutable key → location mapping.
#[derive(Debug, Clone)]
pub struct PartitionCatalog {
    granularity: Granularity,
    locations: HashMap<PartitionKey, PartitionLocation>,
    /// Keys in chronological order, for range lookups.
    ordered: Vec<PartitionKey>,
    default_key: PartitionKey,
}

impl PartitionCatalog {
    pub fn build(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut locations = HashMap::new();
        for &year in &config.years {
            for &month in &config.months {
                match config.granularity {
                    Granularity::Month => {
                        let key = PartitionKey::month(year, month)?;
                        let raw = render_template(&config.template, year, month, None);
                        locations.insert(key, PartitionLocation::parse(&raw)?);
                    }
                    Granularity::Day => {
                        for &day in &config.days {
                            let key = PartitionKey::day(year, month, day)?;
                            let raw = render_template(&config.template, year, month, Some(day));
                            locations.insert(key, PartitionLocation::parse(&raw)?);
                        }
                    }
                }
            }
        }

        let mut ordered: Vec<PartitionKey> = locations.keys().copied().collect();
        ordered.sort();
        let first = *ordered.first().ok_or(CatalogError::Empty)?;

        let default_key = match config.default_key {
            Some(key) if locations.contains_key(&key) => key,
            Some(key) => return Err(CatalogError::UnknownDefault(key)),
            None => first,
        };

        Ok(Self {
            granularity: config.granularity,
            locations,
            ordered,
            default_key,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn get(&self, key: &PartitionKey) -> Option<&PartitionLocation> {
        self.locations.get(key)
    }

    pub fn contains(&self, key: &PartitionKey) -> bool {
        self.locations.contains_key(key)
    }

    /// All keys, chronologically.
    pub fn keys(&self) -> &[PartitionKey] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn min_year(&self) -> i32 {
        self.ordered.first().map(|k| k.year).unwrap_or_default()
    }

    pub fn default_key(&self) -> PartitionKey {
        self.default_key
    }

    /// Keys whose month lies in `[from, to]` (month granularity, inclusive),
    /// chronologically. Days inside the bounding months are all included.
    pub fn months_between(&self, from: PartitionKey, to: PartitionKey) -> &[PartitionKey] {
        let (lo, hi) = (from.month_index(), to.month_index());
        if lo > hi {
            return &[];
        }
        let start = self.ordered.partition_point(|k| k.month_index() < lo);
        let end = self.ordered.partition_point(|k| k.month_index() <= hi);
        &self.ordered[start..end]
    }

    /// Keys falling in one calendar month.
    pub fn keys_in_month(&self, year: i32, month: u32) -> &[PartitionKey] {
        match PartitionKey::month(year, month) {
            Ok(key) => self.months_between(key, key),
            Err(_) => &[],
        }
    }

    /// (key, location) pairs in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &PartitionLocation)> {
        self.ordered
            .iter()
            .filter_map(move |k| self.locations.get(k).map(|loc| (k, loc)))
    }
}

fn render_template(template: &str, year: i32, month: u32, day: Option<u32>) -> String {
    let mut out = template
        .replace("{year}", &year.to_string())
        .replace("{month0}", &format!("{:02}", month))
        .replace("{month}", &month.to_string());
    if let Some(day) = day {
        out = out
            .replace("{day0}", &format!("{:02}", day))
            .replace("{day}", &day.to_string());
    }
    out
}

/// Shift a month-level key by a signed number of months.
pub fn shift_months(key: PartitionKey, months: i64) -> Option<PartitionKey> {
    let index = key.month_index() + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12) + 1).ok()?;
    PartitionKey::month(year, month).ok()
}

/// First day of the month following `date`'s month.
pub fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}
