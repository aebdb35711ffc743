//! Fixed column set of a trajectory partition and the shared projection.

use std::fmt;

/// Columns every partition query returns, spelled as in the GeoParquet files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Trajectory,
    Obs,
    Ci,
    Eez,
    Mpw,
    Ri,
    RiAnnual,
    Age,
    Distcoast,
    Time,
    TravelledDistance,
    Z,
    Geometry,
}

impl Column {
    /// Projection order.
    pub const ALL: [Column; 13] = [
        Column::Trajectory,
        Column::Obs,
        Column::Ci,
        Column::Eez,
        Column::Mpw,
        Column::Ri,
        Column::RiAnnual,
        Column::Age,
        Column::Distcoast,
        Column::Time,
        Column::TravelledDistance,
        Column::Z,
        Column::Geometry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Trajectory => "trajectory",
            Column::Obs => "obs",
            Column::Ci => "CI",
            Column::Eez => "EEZ",
            Column::Mpw => "MPW",
            Column::Ri => "RI",
            Column::RiAnnual => "RI_annual",
            Column::Age => "age",
            Column::Distcoast => "distcoast",
            Column::Time => "time",
            Column::TravelledDistance => "travelled_distance",
            Column::Z => "z",
            Column::Geometry => "geometry",
        }
    }

    /// Exact, case-sensitive lookup by file spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Geometry is the only column that cannot be sorted on.
    pub fn is_sortable(self) -> bool {
        self != Column::Geometry
    }

    fn sql_type(self) -> Option<&'static str> {
        match self {
            Column::Trajectory | Column::Obs | Column::Age => Some("BIGINT"),
            Column::Time => Some("TIMESTAMP"),
            Column::Geometry => None,
            _ => Some("DOUBLE"),
        }
    }

    /// `alias."name"`
    pub fn qualified(self, alias: &str) -> String {
        format!("{}.{}", alias, quote_ident(self.name()))
    }

    fn select_expr(self, alias: &str) -> String {
        let name = quote_ident(self.name());
        match self.sql_type() {
            Some(ty) => format!("CAST({} AS {}) AS {}", self.qualified(alias), ty, name),
            None => format!("st_asgeojson({}) AS {}", self.qualified(alias), name),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Select list shared by every intent, reading from table alias `alias`.
pub fn projection(alias: &str) -> String {
    Column::ALL
        .iter()
        .map(|c| c.select_expr(alias))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
