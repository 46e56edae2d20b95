//! Mercator projections: ellipsoidal (standard parallel) and Web Mercator.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::ellipsoid::{Ellipsoid, WGS84};
use crate::error::TransformError;
use crate::proj::common::{msfn, phi_from_ts, tsfn};
use crate::proj::Projection;

/// Ellipsoidal Mercator projection with a standard parallel.
pub struct Mercator {
    ellipsoid: Ellipsoid,
    lon0: f64,
    k0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl Mercator {
    pub fn new(
        ellipsoid: Ellipsoid,
        lon0: f64,
        lat_ts: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        // Scale factor from standard parallel
        let k0 = msfn(lat_ts, ellipsoid.e2);
        Self {
            ellipsoid,
            lon0,
            k0,
            false_easting,
            false_northing,
        }
    }
}

impl Projection for Mercator {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), TransformError> {
        if lat.abs() >= FRAC_PI_2 {
            return Err(TransformError::OutsideDomain);
        }
        let e = self.ellipsoid.eccentricity();
        let x = self.ellipsoid.a * self.k0 * (lon - self.lon0) + self.false_easting;
        // y = a·k0·(-ln tsfn(φ, e)); tsfn < 1 for positive latitudes
        let y = self.ellipsoid.a * self.k0 * (-tsfn(lat, e).ln()) + self.false_northing;
        Ok((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let e = self.ellipsoid.eccentricity();
        let lon = self.lon0 + (x - self.false_easting) / (self.ellipsoid.a * self.k0);
        let ts = (-(y - self.false_northing) / (self.ellipsoid.a * self.k0)).exp();
        let lat = phi_from_ts(ts, e)?;
        Ok((lon, lat))
    }

    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
}

/// Web Mercator (spherical formulas on the WGS84 semi-major axis).
pub struct WebMercator {
    ellipsoid: Ellipsoid,
    lon0: f64,
}

/// Latitude bound (≈85.0511°) where the projected world becomes square.
const MAX_LAT_WEBMERC: f64 = 1.4844222297453324; // atan(sinh(π))

impl WebMercator {
    pub fn new() -> Self {
        Self {
            ellipsoid: WGS84,
            lon0: 0.0,
        }
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new()
    }
}

impl Projection for WebMercator {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), TransformError> {
        let lat = lat.clamp(-MAX_LAT_WEBMERC, MAX_LAT_WEBMERC);
        let x = self.ellipsoid.a * (lon - self.lon0);
        let y = self.ellipsoid.a * (FRAC_PI_4 + lat / 2.0).tan().ln();
        Ok((x, y))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let lon = self.lon0 + x / self.ellipsoid.a;
        let lat = 2.0 * (y / self.ellipsoid.a).exp().atan() - FRAC_PI_2;
        Ok((lon, lat))
    }

    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_web_mercator_roundtrip() {
        let proj = WebMercator::new();
        let cases: &[(f64, f64)] = &[
            (0.0, 0.0),
            (10.0, 45.0),
            (-73.9857, 40.7484),
            (139.6917, 35.6895),
            (-180.0, 0.0),
            (180.0, 0.0),
        ];
        for &(lon_deg, lat_deg) in cases {
            let lon = lon_deg.to_radians();
            let lat = lat_deg.to_radians();
            let (x, y) = proj.forward(lon, lat).unwrap();
            let (lon2, lat2) = proj.inverse(x, y).unwrap();
            assert_relative_eq!(lon2, lon, epsilon = 1e-10);
            assert_relative_eq!(lat2, lat, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_web_mercator_reference() {
        // (180°, 0°) → (20037508.34, 0)
        let proj = WebMercator::new();
        let (x, _) = proj.forward(PI, 0.0).unwrap();
        assert_relative_eq!(x, 20_037_508.342_789_244, epsilon = 0.01);
    }

    #[test]
    fn test_web_mercator_polar_clamp() {
        let proj = WebMercator::new();
        let (_, y) = proj.forward(0.0, FRAC_PI_2).unwrap();
        assert!(y.is_finite(), "y should be finite at pole, got {y}");
    }

    #[test]
    fn test_ellipsoidal_mercator_roundtrip() {
        let proj = Mercator::new(WGS84, 0.0, 0.0, 0.0, 0.0);
        for &(lon_deg, lat_deg) in &[(0.0, 0.0), (10.0, 45.0), (-73.9857, 40.7484)] {
            let lon = (lon_deg as f64).to_radians();
            let lat = (lat_deg as f64).to_radians();
            let (x, y) = proj.forward(lon, lat).unwrap();
            let (lon2, lat2) = proj.inverse(x, y).unwrap();
            assert_relative_eq!(lon2, lon, epsilon = 1e-10);
            assert_relative_eq!(lat2, lat, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_ellipsoidal_mercator_pole_rejected() {
        let proj = Mercator::new(WGS84, 0.0, 0.0, 0.0, 0.0);
        assert!(proj.forward(0.0, FRAC_PI_2).is_err());
    }
}
