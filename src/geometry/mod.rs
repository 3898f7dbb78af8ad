use num_traits::Float;
use serde::{Deserialize, Serialize};


/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Euclidean distance
pub fn euclidean<T>(x1: T, y1: T, x2: T, y2: T) -> T
where
    T: Float,
    {
    ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
}

/// Great-circle distance in meters between two lat/lon pairs given in degrees
/// https://en.wikipedia.org/wiki/Haversine_formula
pub fn haversine<T>(lat1: T, lon1: T, lat2: T, lon2: T) -> T
where
    T: Float,
    {
    let two = T::one() + T::one();
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / two).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / two).sin().powi(2);

    // clamp guards against rounding pushing `a` past 1 for antipodal points
    let c = two * a.sqrt().min(T::one()).asin();
    c * <T as num_traits::NumCast>::from(EARTH_RADIUS_M).unwrap_or_else(T::one)
}


/// Distance metric used for edge costs and the heuristic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Great-circle meters
    #[default]
    Haversine,
    /// Planar distance in coordinate units (degrees)
    Euclidean,
}

impl Metric {
    pub fn distance(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        match self {
            Metric::Haversine => haversine(lat1, lon1, lat2, lon2),
            Metric::Euclidean => euclidean(lat1, lon1, lat2, lon2),
        }
    }
}


/// Closed numeric range [from, to]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub from: f64,
    pub to: f64,
}

/// Split [low, high] into `count` contiguous sub-intervals
/// Neighbouring intervals share their boundary value exactly, so there are no gaps.
/// Returns nothing for a zero count or an empty range.
pub fn partition_interval(low: f64, high: f64, count: usize) -> Vec<Interval> {
    if count == 0 || !(high > low) {
        return Vec::new();
    }

    let step = (high - low) / count as f64;
    let boundary = |i: usize| if i == count { high } else { low + step * i as f64 };

    (0..count)
        .map(|i| Interval { from: boundary(i), to: boundary(i + 1) })
        .collect()
}


/// Axis aligned lat/lon rectangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {

    /// Whole lat/lon coordinate domain
    pub const WORLD: BoundingBox = BoundingBox { lat_min: -90.0, lat_max: 90.0, lon_min: -180.0, lon_max: 180.0 };

    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self { lat_min, lat_max, lon_min, lon_max }
    }

    /// Square box of +/- half_width around a point
    pub fn around(lat: f64, lon: f64, half_width: f64) -> Self {
        Self::new(lat - half_width, lat + half_width, lon - half_width, lon + half_width)
    }

    /// A box with no positive span covers nothing
    pub fn is_empty(&self) -> bool {
        !(self.lat_max > self.lat_min && self.lon_max > self.lon_min)
    }

    /// Strict containment, matches the store's region query
    pub fn contains_strict(&self, lat: f64, lon: f64) -> bool {
        lat > self.lat_min && lat < self.lat_max && lon > self.lon_min && lon < self.lon_max
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    /// True if `other` lies entirely within this box, edges included
    pub fn covers(&self, other: &BoundingBox) -> bool {
        self.contains(other.lat_min, other.lon_min) && self.contains(other.lat_max, other.lon_max)
    }

    /// Grow the box by `margin` on every side
    pub fn padded(&self, margin: f64) -> Self {
        Self::new(
            self.lat_min - margin,
            self.lat_max + margin,
            self.lon_min - margin,
            self.lon_max + margin,
        )
    }

    /// Cut the box into lat_count x lon_count tiles, row by row
    pub fn tiles(&self, lat_count: usize, lon_count: usize) -> Vec<BoundingBox> {
        let latitudes = partition_interval(self.lat_min, self.lat_max, lat_count);
        let longitudes = partition_interval(self.lon_min, self.lon_max, lon_count);

        let mut tiles = Vec::with_capacity(latitudes.len() * longitudes.len());
        for lat in &latitudes {
            for lon in &longitudes {
                tiles.push(BoundingBox::new(lat.from, lat.to, lon.from, lon.to));
            }
        }
        tiles
    }

    /// Bit-exact key, used to remember which tiles were already fetched
    pub fn key(&self) -> [u64; 4] {
        [
            self.lat_min.to_bits(),
            self.lat_max.to_bits(),
            self.lon_min.to_bits(),
            self.lon_max.to_bits(),
        ]
    }
}
