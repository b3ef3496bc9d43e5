//! Coordinate Reference System types and utilities.
//!
//! A [`Crs`] is either a single horizontal system identified by an EPSG code,
//! a one-dimensional temporal axis, or a compound of those. Only the
//! identification and the dimension layout live here; the operations between
//! systems are resolved by the `projection` crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GeoError, GeoResult};

/// Well-known horizontal CRS codes.
///
/// Coordinates are always handled in (x, y) order, longitude first for
/// geographic systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Albers Equal Area (CONUS)
    Epsg5070,
    /// Polar Stereographic North
    Epsg3413,
    /// Polar Stereographic South
    Epsg3031,
}

impl CrsCode {
    /// Parse a CRS identifier such as "EPSG:4326" or "CRS:84".
    pub fn from_wms_string(s: &str) -> GeoResult<Self> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:5070" => Ok(CrsCode::Epsg5070),
            "EPSG:3413" => Ok(CrsCode::Epsg3413),
            "EPSG:3031" => Ok(CrsCode::Epsg3031),
            _ => Err(GeoError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg4269 => "EPSG:4269",
            CrsCode::Epsg5070 => "EPSG:5070",
            CrsCode::Epsg3413 => "EPSG:3413",
            CrsCode::Epsg3031 => "EPSG:3031",
        };
        write!(f, "{}", code)
    }
}

/// Unit of a temporal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> GeoResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "s" | "second" | "seconds" => Ok(TimeUnit::Seconds),
            "min" | "minute" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            _ => Err(GeoError::InvalidTime(format!("unknown time unit '{}'", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

/// A one-dimensional time axis: values are counted in `unit` since `epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalCrs {
    pub epoch: DateTime<Utc>,
    pub unit: TimeUnit,
}

impl TemporalCrs {
    pub fn new(epoch: DateTime<Utc>, unit: TimeUnit) -> Self {
        Self { epoch, unit }
    }

    /// Convert an instant to a coordinate value on this axis.
    pub fn value_of(&self, time: &DateTime<Utc>) -> f64 {
        let millis = (*time - self.epoch).num_milliseconds() as f64;
        millis / 1000.0 / self.unit.seconds()
    }

    /// Convert a coordinate value back to an instant (millisecond precision).
    pub fn instant_of(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let millis = (value * self.unit.seconds() * 1000.0).round();
        if millis.abs() >= i64::MAX as f64 / 2.0 {
            return None;
        }
        self.epoch
            .checked_add_signed(Duration::milliseconds(millis as i64))
    }
}

impl fmt::Display for TemporalCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TIME[{}]:{}", self.unit.as_str(), self.epoch.to_rfc3339())
    }
}

/// Coordinate reference system of a grid geometry, an envelope or a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Two-dimensional horizontal system.
    Horizontal(CrsCode),
    /// One-dimensional time axis.
    Temporal(TemporalCrs),
    /// Ordered list of single components, never nested.
    Compound(Vec<Crs>),
}

impl Crs {
    /// Build a compound CRS, flattening nested compounds.
    ///
    /// A single component is returned as-is.
    pub fn compound(parts: Vec<Crs>) -> Crs {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Crs::Compound(inner) => flat.extend(inner),
                single => flat.push(single),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Crs::Compound(flat)
        }
    }

    /// Number of coordinates of a position in this CRS.
    pub fn dimension(&self) -> usize {
        match self {
            Crs::Horizontal(_) => 2,
            Crs::Temporal(_) => 1,
            Crs::Compound(parts) => parts.iter().map(Crs::dimension).sum(),
        }
    }

    /// Single (non-compound) components in axis order.
    pub fn components(&self) -> Vec<&Crs> {
        match self {
            Crs::Compound(parts) => parts.iter().collect(),
            single => vec![single],
        }
    }

    /// The CRS restricted to the given dimensions.
    ///
    /// Dimensions must be strictly increasing and cover whole components;
    /// returns `None` when a component would be split or an index is out of range.
    pub fn select_dimensions(&self, dimensions: &[usize]) -> Option<Crs> {
        if dimensions.is_empty() || dimensions.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        let mut selected = Vec::new();
        let mut consumed = 0;
        let mut offset = 0;
        for component in self.components() {
            let dim = component.dimension();
            let count = dimensions
                .iter()
                .filter(|&&d| d >= offset && d < offset + dim)
                .count();
            if count == dim {
                selected.push(component.clone());
            } else if count != 0 {
                return None;
            }
            consumed += count;
            offset += dim;
        }
        if consumed != dimensions.len() {
            return None;
        }
        Some(Crs::compound(selected))
    }
}

impl From<CrsCode> for Crs {
    fn from(code: CrsCode) -> Self {
        Crs::Horizontal(code)
    }
}

impl From<TemporalCrs> for Crs {
    fn from(temporal: TemporalCrs) -> Self {
        Crs::Temporal(temporal)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Horizontal(code) => write!(f, "{}", code),
            Crs::Temporal(temporal) => write!(f, "{}", temporal),
            Crs::Compound(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "+")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Crs {
    type Err = GeoError;

    /// Parse "EPSG:4326", "TIME[hours]:2024-01-01T00:00:00Z" or a
    /// `+`-separated combination of those.
    fn from_str(s: &str) -> GeoResult<Self> {
        let mut parts = Vec::new();
        for part in s.split('+') {
            let part = part.trim();
            if part.get(..4).map_or(false, |p| p.eq_ignore_ascii_case("TIME")) {
                parts.push(Crs::Temporal(parse_temporal(&part[4..])?));
            } else {
                parts.push(Crs::Horizontal(CrsCode::from_wms_string(part)?));
            }
        }
        Ok(Crs::compound(parts))
    }
}

/// Parse the "[unit]:epoch" tail of a temporal CRS string. Unit defaults to hours.
fn parse_temporal(rest: &str) -> GeoResult<TemporalCrs> {
    let (unit, rest) = match rest.strip_prefix('[') {
        Some(tail) => {
            let end = tail
                .find(']')
                .ok_or_else(|| GeoError::InvalidTime(format!("unclosed unit in '{}'", rest)))?;
            (TimeUnit::from_str(&tail[..end])?, &tail[end + 1..])
        }
        None => (TimeUnit::Hours, rest),
    };
    let epoch = rest
        .strip_prefix(':')
        .ok_or_else(|| GeoError::InvalidTime(format!("missing epoch in '{}'", rest)))?;
    let epoch = DateTime::parse_from_rfc3339(epoch.trim())
        .map_err(|e| GeoError::InvalidTime(format!("{}: {}", epoch, e)))?
        .with_timezone(&Utc);
    Ok(TemporalCrs::new(epoch, unit))
}
