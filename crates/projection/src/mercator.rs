//! Spherical (Web) Mercator projection.
//!
//! Maps geographic (longitude, latitude) in degrees to EPSG:3857 easting and
//! northing in meters on a sphere of radius 6378137 m.

use std::f64::consts::PI;
use std::sync::Arc;

use crate::error::{TransformError, TransformResult};
use crate::matrix::Matrix;
use crate::transform::{check_point, MathTransform, TransformRef};

/// WGS84 semi-major axis used by Web Mercator (meters).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Geographic degrees to Web Mercator meters, or the reverse when `inverse` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    radius: f64,
    inverse: bool,
}

impl Mercator {
    /// Forward projection (lon/lat degrees → x/y meters).
    pub fn web() -> Self {
        Self {
            radius: EARTH_RADIUS,
            inverse: false,
        }
    }

    pub fn into_ref(self) -> TransformRef {
        Arc::new(self)
    }

    fn project(&self, lon_deg: f64, lat_deg: f64) -> TransformResult<(f64, f64)> {
        if lat_deg.abs() > 90.0 {
            return Err(TransformError::OutsideDomain(vec![lon_deg, lat_deg]));
        }
        let to_rad = PI / 180.0;
        let x = self.radius * lon_deg * to_rad;
        let y = self.radius * (PI / 4.0 + lat_deg * to_rad / 2.0).tan().ln();
        Ok((x, y))
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let lon = x / self.radius * to_deg;
        let lat = (2.0 * (y / self.radius).exp().atan() - PI / 2.0) * to_deg;
        (lon, lat)
    }
}

impl MathTransform for Mercator {
    fn source_dimensions(&self) -> usize {
        2
    }

    fn target_dimensions(&self) -> usize {
        2
    }

    fn transform(&self, point: &[f64]) -> TransformResult<Vec<f64>> {
        check_point(2, point)?;
        let (a, b) = if self.inverse {
            self.unproject(point[0], point[1])
        } else {
            self.project(point[0], point[1])?
        };
        Ok(vec![a, b])
    }

    fn derivative(&self, point: &[f64]) -> TransformResult<Matrix> {
        check_point(2, point)?;
        let to_rad = PI / 180.0;
        let m = if self.inverse {
            // dlat/dy = 1 / (R cosh(y/R)), in degrees.
            let dlon = 1.0 / (self.radius * to_rad);
            let dlat = 1.0 / (self.radius * (point[1] / self.radius).cosh() * to_rad);
            Matrix::from_row_slice(2, 2, &[dlon, 0.0, 0.0, dlat])
        } else {
            let lat = point[1] * to_rad;
            let cos = lat.cos();
            if cos == 0.0 {
                return Err(TransformError::OutsideDomain(point.to_vec()));
            }
            let dx = self.radius * to_rad;
            Matrix::from_row_slice(2, 2, &[dx, 0.0, 0.0, dx / cos])
        };
        Ok(m)
    }

    fn inverse(&self) -> TransformResult<TransformRef> {
        Ok(Arc::new(Self {
            radius: self.radius,
            inverse: !self.inverse,
        }))
    }
}
