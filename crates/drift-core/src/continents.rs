//! Coarse continent lookup for feature classification.
//!
//! Each region is a set of independent closed rings (landmasses, islands).
//! Rings are not polygons with holes: a point inside any ring belongs to the
//! region, so enclosed seas covered by a ring are classified as land.

use geo::{Coord, LineString};

/// Region name returned when no ring matches.
pub const UNKNOWN_REGION: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct ContinentRegion {
    pub name: &'static str,
    pub rings: Vec<LineString<f64>>,
}

/// Immutable registry of named regions, built once at startup.
#[derive(Debug, Clone)]
pub struct ContinentRegistry {
    regions: Vec<ContinentRegion>,
}

impl ContinentRegistry {
    pub fn new(regions: Vec<ContinentRegion>) -> Self {
        Self { regions }
    }

    /// The five built-in regions, in registration order.
    pub fn builtin() -> Self {
        Self::new(vec![
            region("Africa", &[AFRICA, MADAGASCAR]),
            region("America", &[NORTH_AMERICA, SOUTH_AMERICA, GREENLAND]),
            region("Asia", &[ASIA, JAPAN, SUMATRA, BORNEO]),
            region(
                "Europe",
                &[EUROPE, IBERIA, ITALY_BALKANS, SCANDINAVIA, EASTERN_EUROPE, ICELAND],
            ),
            region(
                "Oceania",
                &[AUSTRALIA, TASMANIA, NZ_NORTH, NZ_SOUTH, NEW_GUINEA],
            ),
        ])
    }

    pub fn regions(&self) -> &[ContinentRegion] {
        &self.regions
    }

    /// Name of the region containing `(lon, lat)`.
    ///
    /// Regions are tested in reverse registration order; the first ring that
    /// strictly contains the point wins.
    pub fn locate(&self, lon: f64, lat: f64) -> &'static str {
        self.regions
            .iter()
            .rev()
            .find(|r| r.rings.iter().any(|ring| point_in_ring(ring, lon, lat)))
            .map(|r| r.name)
            .unwrap_or(UNKNOWN_REGION)
    }
}

impl Default for ContinentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Even-odd ray casting. Points on the ring boundary are outside.
pub fn point_in_ring(ring: &LineString<f64>, x: f64, y: f64) -> bool {
    let coords = &ring.0;
    if coords.len() < 3 {
        return false;
    }
    if coords.windows(2).any(|w| on_segment(w[0], w[1], x, y))
        || on_segment(coords[coords.len() - 1], coords[0], x, y)
    {
        return false;
    }

    let mut inside = false;
    let mut j = coords.len() - 1;
    for i in 0..coords.len() {
        let (xi, yi) = (coords[i].x, coords[i].y);
        let (xj, yj) = (coords[j].x, coords[j].y);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance to the edge within `ON_EDGE_TOLERANCE` degrees counts as on it.
const ON_EDGE_TOLERANCE: f64 = 1e-9;

fn on_segment(a: Coord<f64>, b: Coord<f64>, x: f64, y: f64) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let cross = dx * (y - a.y) - dy * (x - a.x);
    // |cross| is the distance to the line scaled by the edge length.
    if cross.abs() > ON_EDGE_TOLERANCE * dx.hypot(dy) {
        return false;
    }
    x >= a.x.min(b.x) && x <= a.x.max(b.x) && y >= a.y.min(b.y) && y <= a.y.max(b.y)
}

fn region(name: &'static str, rings: &[&[(f64, f64)]]) -> ContinentRegion {
    ContinentRegion {
        name,
        rings: rings
            .iter()
            .map(|ring| LineString::from(ring.to_vec()))
            .collect(),
    }
}

// (lon, lat) rings, closed.

const AFRICA: &[(f64, f64)] = &[
    (-17.5, 14.7), (-16.5, 19.5), (-17.1, 21.0), (-13.0, 27.6), (-9.8, 30.5), (-5.9, 35.9),
    (-1.0, 35.5), (10.3, 37.3), (11.1, 33.2), (20.0, 30.9), (32.3, 31.3), (34.2, 27.7),
    (37.2, 21.0), (43.4, 12.6), (51.3, 11.8), (48.0, 4.0), (39.7, -4.5), (40.5, -15.0),
    (35.5, -24.0), (32.9, -26.0), (27.0, -33.9), (20.0, -34.8), (18.4, -33.9), (11.8, -17.3),
    (13.8, -10.5), (9.2, -1.0), (9.6, 4.0), (5.0, 5.8), (-4.0, 5.2), (-7.5, 4.4),
    (-12.3, 7.3), (-15.0, 11.0), (-17.5, 14.7),
];

const MADAGASCAR: &[(f64, f64)] = &[
    (43.2, -11.9), (49.3, -12.0), (50.5, -15.5), (47.1, -25.0), (45.2, -25.6), (43.6, -23.5),
    (44.0, -17.0), (43.2, -11.9),
];

const NORTH_AMERICA: &[(f64, f64)] = &[
    (-168.0, 65.6), (-162.0, 70.3), (-141.0, 69.6), (-125.0, 70.0), (-95.0, 72.0),
    (-80.0, 73.5), (-62.0, 67.0), (-55.0, 52.0), (-66.0, 44.5), (-70.0, 41.5), (-75.5, 35.2),
    (-81.0, 31.0), (-80.0, 25.2), (-82.5, 27.5), (-84.0, 30.0), (-90.0, 29.0), (-97.3, 27.5),
    (-97.5, 21.5), (-87.5, 21.5), (-88.0, 15.9), (-83.2, 15.0), (-83.5, 10.9), (-77.5, 8.6),
    (-79.5, 7.2), (-83.0, 8.3), (-86.0, 11.0), (-91.5, 14.0), (-96.0, 15.7), (-105.5, 20.0),
    (-105.0, 23.0), (-109.5, 23.2), (-112.2, 29.0), (-114.5, 31.5), (-117.1, 32.5),
    (-120.6, 34.6), (-124.4, 40.4), (-124.0, 46.3), (-123.0, 49.0), (-130.0, 55.0),
    (-135.5, 57.5), (-141.0, 60.0), (-152.0, 59.0), (-158.0, 56.6), (-165.0, 54.5),
    (-166.0, 60.0), (-168.0, 65.6),
];

const SOUTH_AMERICA: &[(f64, f64)] = &[
    (-77.5, 8.6), (-71.5, 12.4), (-62.0, 10.7), (-52.0, 5.0), (-50.0, 0.0), (-44.0, -2.5),
    (-35.0, -5.3), (-39.0, -13.0), (-41.0, -22.0), (-48.5, -26.0), (-53.0, -33.7),
    (-58.0, -38.5), (-65.0, -41.0), (-65.5, -47.5), (-68.5, -52.5), (-70.0, -55.0),
    (-74.5, -52.5), (-75.5, -46.0), (-73.5, -37.0), (-71.5, -30.0), (-70.3, -18.3),
    (-76.3, -13.9), (-81.3, -5.0), (-80.0, -0.5), (-77.5, 8.6),
];

const GREENLAND: &[(f64, f64)] = &[
    (-73.0, 78.0), (-60.0, 82.0), (-30.0, 83.5), (-20.0, 81.5), (-18.0, 76.0), (-22.0, 70.0),
    (-32.0, 68.0), (-43.0, 60.0), (-50.0, 64.0), (-54.0, 69.0), (-58.0, 75.5), (-73.0, 78.0),
];

const ASIA: &[(f64, f64)] = &[
    (26.2, 40.0), (36.0, 36.2), (34.5, 31.5), (34.9, 29.5), (39.0, 21.5), (43.4, 12.7),
    (52.0, 16.5), (57.8, 19.0), (59.8, 22.5), (56.5, 26.2), (51.5, 24.5), (48.5, 28.5),
    (50.0, 30.0), (57.0, 25.5), (66.5, 25.4), (72.8, 21.0), (77.5, 8.0), (80.3, 13.0),
    (80.2, 15.8), (86.9, 21.5), (91.8, 22.3), (94.3, 16.0), (97.7, 8.0), (100.5, 3.5),
    (103.5, 1.3), (104.3, 10.4), (109.3, 11.8), (108.0, 21.5), (113.5, 22.2), (119.5, 26.0),
    (122.0, 30.9), (119.2, 34.9), (121.5, 39.0), (126.5, 37.7), (129.4, 35.2), (129.7, 42.4),
    (135.5, 43.9), (140.5, 48.4), (141.4, 53.3), (135.0, 54.8), (143.0, 59.3), (155.0, 59.3),
    (163.0, 62.5), (180.0, 65.0), (180.0, 71.0), (140.0, 72.8), (113.0, 74.0), (104.0, 77.7),
    (80.0, 73.5), (68.9, 73.0), (60.0, 69.0), (50.0, 68.0), (60.0, 60.0), (59.0, 50.0),
    (53.0, 47.0), (49.5, 46.5), (47.0, 43.0), (49.5, 40.5), (41.5, 41.5), (28.0, 41.5),
    (26.2, 40.0),
];

const JAPAN: &[(f64, f64)] = &[
    (129.5, 33.0), (131.0, 31.0), (135.5, 33.5), (140.0, 35.0), (141.5, 38.5), (141.5, 41.5),
    (145.5, 43.5), (145.0, 44.5), (141.7, 45.5), (139.8, 42.0), (139.5, 38.5), (136.5, 37.0),
    (132.0, 35.5), (129.5, 33.0),
];

const SUMATRA: &[(f64, f64)] = &[
    (95.3, 5.6), (98.5, 4.0), (104.0, -1.0), (106.0, -5.9), (102.3, -4.0), (95.3, 5.6),
];

const BORNEO: &[(f64, f64)] = &[
    (109.0, 1.5), (117.0, 7.0), (119.2, 5.3), (118.0, 1.0), (116.5, -3.9), (110.3, -3.0),
    (109.0, 1.5),
];

const EUROPE: &[(f64, f64)] = &[
    (-11.25, 43.33), (-11.25, 59.36), (27.07, 59.36), (27.07, 43.33), (-11.25, 43.33),
];

const IBERIA: &[(f64, f64)] = &[
    (-9.5, 43.3), (-9.0, 38.7), (-8.9, 37.0), (-6.2, 36.2), (-2.0, 36.7), (0.2, 38.7),
    (3.2, 41.9), (3.2, 43.3), (-9.5, 43.3),
];

const ITALY_BALKANS: &[(f64, f64)] = &[
    (7.0, 43.33), (10.2, 42.9), (12.3, 41.7), (15.7, 38.0), (16.6, 38.4), (18.5, 40.1),
    (16.0, 41.4), (19.4, 41.8), (21.0, 40.0), (23.5, 37.9), (22.4, 36.4), (24.0, 38.2),
    (23.8, 40.5), (26.0, 40.8), (27.07, 42.0), (27.07, 43.33), (7.0, 43.33),
];

const SCANDINAVIA: &[(f64, f64)] = &[
    (5.0, 59.36), (5.0, 62.0), (10.5, 64.5), (14.5, 68.5), (20.0, 70.0), (28.0, 71.2),
    (31.0, 70.0), (30.0, 59.36), (5.0, 59.36),
];

const EASTERN_EUROPE: &[(f64, f64)] = &[
    (27.07, 43.33), (28.6, 43.5), (30.0, 45.8), (33.5, 44.5), (36.6, 45.4), (39.5, 47.0),
    (44.0, 47.5), (48.0, 50.0), (58.0, 51.0), (60.0, 60.0), (50.0, 68.0), (40.0, 67.5),
    (32.0, 70.0), (31.0, 70.0), (30.0, 59.36), (27.07, 59.36), (27.07, 43.33),
];

const ICELAND: &[(f64, f64)] = &[
    (-24.5, 65.5), (-22.0, 66.5), (-15.0, 66.5), (-13.5, 65.0), (-18.0, 63.4), (-22.5, 63.8),
    (-24.5, 65.5),
];

const AUSTRALIA: &[(f64, f64)] = &[
    (113.5, -22.0), (114.2, -26.0), (115.0, -34.3), (118.0, -35.0), (123.5, -33.9),
    (129.0, -31.7), (131.5, -31.5), (135.5, -34.8), (138.0, -35.6), (140.5, -38.0),
    (146.3, -39.1), (150.0, -37.5), (153.6, -28.2), (153.0, -25.0), (146.3, -19.0),
    (145.3, -15.0), (142.5, -10.7), (141.5, -16.5), (140.0, -17.7), (136.7, -12.2),
    (132.5, -11.5), (129.5, -15.0), (125.0, -14.5), (122.0, -18.0), (119.0, -20.0),
    (113.5, -22.0),
];

const TASMANIA: &[(f64, f64)] = &[
    (144.6, -40.7), (148.3, -40.9), (148.0, -43.2), (146.0, -43.6), (144.6, -40.7),
];

const NZ_NORTH: &[(f64, f64)] = &[
    (172.6, -34.4), (178.5, -37.7), (177.0, -39.5), (174.8, -41.3), (173.8, -39.3),
    (174.5, -36.5), (172.6, -34.4),
];

const NZ_SOUTH: &[(f64, f64)] = &[
    (172.7, -40.5), (174.3, -41.7), (171.0, -44.5), (169.0, -46.6), (166.5, -46.0),
    (168.0, -44.0), (172.7, -40.5),
];

const NEW_GUINEA: &[(f64, f64)] = &[
    (131.0, -1.0), (138.0, -1.5), (145.0, -4.5), (150.5, -10.5), (147.0, -10.2), (143.0, -9.0),
    (141.0, -9.2), (137.5, -5.0), (132.5, -4.0), (131.0, -1.0),
];
