//! Geodetic ↔ geocentric cartesian conversion.
//!
//! The geocentric→geodetic direction uses the iterative scheme of the
//! Institut für Erdmessung (University of Hannover, 1988): latitude is
//! iterated through its sine/cosine to 1e-12 rad.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::ellipsoid::Ellipsoid;
use crate::error::TransformError;

const GENAU: f64 = 1e-12;
const GENAU2: f64 = GENAU * GENAU;
const MAXITER: usize = 30;

/// Convert geodetic (lon, lat, height) to geocentric (X, Y, Z).
///
/// Latitudes up to 0.1% beyond ±π/2 are clamped to the pole; anything
/// farther out is rejected.
pub fn geodetic_to_geocentric(
    ell: &Ellipsoid,
    lon: f64,
    lat: f64,
    height: f64,
) -> Result<(f64, f64, f64), TransformError> {
    let mut lat = lat;
    let mut lon = lon;

    if lat < -FRAC_PI_2 && lat > -1.001 * FRAC_PI_2 {
        lat = -FRAC_PI_2;
    } else if lat > FRAC_PI_2 && lat < 1.001 * FRAC_PI_2 {
        lat = FRAC_PI_2;
    } else if !(-FRAC_PI_2..=FRAC_PI_2).contains(&lat) {
        return Err(TransformError::LatLonOutOfRange);
    }

    if lon > PI {
        lon -= 2.0 * PI;
    }

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let sin2 = sin_lat * sin_lat;
    // Earth radius at location
    let rn = ell.a / (1.0 - ell.e2 * sin2).sqrt();

    let x = (rn + height) * cos_lat * lon.cos();
    let y = (rn + height) * cos_lat * lon.sin();
    let z = (rn * (1.0 - ell.e2) + height) * sin_lat;

    Ok((x, y, z))
}

/// Convert geocentric (X, Y, Z) to geodetic (lon, lat, height).
///
/// Always succeeds for finite input; degenerate points (earth center, polar
/// axis) resolve to the conventional special values.
pub fn geocentric_to_geodetic(ell: &Ellipsoid, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let p = (x * x + y * y).sqrt();
    let rr = (x * x + y * y + z * z).sqrt();

    let lon;
    if p / ell.a < GENAU {
        // On the polar axis
        lon = 0.0;
        if rr / ell.a < GENAU {
            // At the center of mass: height becomes -b
            return (lon, FRAC_PI_2, -ell.b);
        }
    } else {
        lon = y.atan2(x);
    }

    let ct = z / rr;
    let st = p / rr;

    let denom = 1.0 - ell.e2 * (2.0 - ell.e2) * st * st;
    if denom <= 0.0 {
        return (f64::INFINITY, f64::INFINITY, f64::INFINITY);
    }
    let mut rx = 1.0 / denom.sqrt();
    let mut cphi0 = st * (1.0 - ell.e2) * rx;
    let mut sphi0 = ct * rx;

    let mut sphi = sphi0;
    let mut cphi = cphi0;
    let mut height = 0.0;

    for _ in 0..MAXITER {
        let rn = ell.a / (1.0 - ell.e2 * sphi0 * sphi0).sqrt();
        height = p * cphi0 + z * sphi0 - rn * (1.0 - ell.e2 * sphi0 * sphi0);

        if rn + height == 0.0 {
            return (lon, 0.0, height);
        }

        let rk = ell.e2 * rn / (rn + height);
        let denom = 1.0 - rk * (2.0 - rk) * st * st;
        if denom <= 0.0 {
            return (f64::INFINITY, f64::INFINITY, f64::INFINITY);
        }
        rx = 1.0 / denom.sqrt();
        cphi = st * (1.0 - rk) * rx;
        sphi = ct * rx;

        let sdphi = sphi * cphi0 - cphi * sphi0;
        cphi0 = cphi;
        sphi0 = sphi;
        if sdphi * sdphi <= GENAU2 {
            break;
        }
    }

    let lat = sphi.atan2(cphi.abs());
    (lon, lat, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipsoid::WGS84;
    use approx::assert_relative_eq;

    #[test]
    fn test_equator_prime_meridian() {
        let (x, y, z) = geodetic_to_geocentric(&WGS84, 0.0, 0.0, 0.0).unwrap();
        assert_relative_eq!(x, WGS84.a, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_north_pole() {
        let (x, y, z) = geodetic_to_geocentric(&WGS84, 0.0, FRAC_PI_2, 0.0).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(z, WGS84.b, epsilon = 1e-6);
    }

    #[test]
    fn test_roundtrip() {
        let cases: &[(f64, f64, f64)] = &[
            (0.2, 0.9, 100.0),
            (-1.3, -0.5, 2000.0),
            (3.0, 0.0, 0.0),
            (0.0, 1.2, -50.0),
        ];
        for &(lon, lat, h) in cases {
            let (x, y, z) = geodetic_to_geocentric(&WGS84, lon, lat, h).unwrap();
            let (lon2, lat2, h2) = geocentric_to_geodetic(&WGS84, x, y, z);
            assert_relative_eq!(lon2, lon, epsilon = 1e-11);
            assert_relative_eq!(lat2, lat, epsilon = 1e-11);
            assert_relative_eq!(h2, h, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_known_point() {
        // Copenhagen-ish, matches independent geodetic calculators
        let lon = 12.0_f64.to_radians();
        let lat = 55.0_f64.to_radians();
        let (x, y, z) = geodetic_to_geocentric(&WGS84, lon, lat, 0.0).unwrap();
        assert_relative_eq!(x, 3586469.6568, epsilon = 0.01);
        assert_relative_eq!(y, 762327.6588, epsilon = 0.01);
        assert_relative_eq!(z, 5201383.5232, epsilon = 0.5);
    }

    #[test]
    fn test_latitude_beyond_limit_rejected() {
        assert!(geodetic_to_geocentric(&WGS84, 0.0, 2.0, 0.0).is_err());
        // Within 0.1% of the pole: clamped, not rejected
        assert!(geodetic_to_geocentric(&WGS84, 0.0, FRAC_PI_2 * 1.0005, 0.0).is_ok());
    }

    #[test]
    fn test_center_of_mass() {
        let (_, lat, h) = geocentric_to_geodetic(&WGS84, 0.0, 0.0, 0.0);
        assert_relative_eq!(lat, FRAC_PI_2);
        assert_relative_eq!(h, -WGS84.b);
    }
}
