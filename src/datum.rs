//! Datum descriptors and the datum-shift engine.
//!
//! A datum shift is chosen per pair of endpoint descriptors: a no-op when
//! either datum is uncharacterized or both compare equal, a parametric shift
//! routed through geocentric coordinates, a grid-based correction applied
//! directly to geodetic coordinates, or a combination. Grid-shifted
//! coordinates are referenced to WGS84, so the fixed WGS84 ellipsoid
//! replaces the endpoint's own ellipsoid for any subsequent geocentric leg.

use crate::context::Context;
use crate::coord::Coord;
use crate::ellipsoid::{Ellipsoid, WGS84};
use crate::error::TransformError;
use crate::geocent;
use crate::grid::shift;
use crate::transform::per_point;

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / 180.0 / 3600.0;

/// How an endpoint's datum is anchored to the earth.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    /// Not characterized; conservatively never shifted
    Unknown,
    /// Anchored to WGS84 with no offset
    Wgs84,
    /// Geocentric translation to WGS84, metres
    ThreeParam([f64; 3]),
    /// dx, dy, dz (m), rx, ry, rz (rad), scale (multiplier)
    SevenParam([f64; 7]),
    /// Comma-separated correction grid list
    Grids(String),
    /// Region/date indexed grid catalog
    Catalog { name: String, date: f64 },
}

impl Datum {
    /// Build a seven-parameter datum from published values: translations in
    /// metres, rotations in arc-seconds, scale in parts-per-million.
    pub fn seven_param(
        dx: f64,
        dy: f64,
        dz: f64,
        rx_sec: f64,
        ry_sec: f64,
        rz_sec: f64,
        s_ppm: f64,
    ) -> Self {
        Datum::SevenParam([
            dx,
            dy,
            dz,
            rx_sec * ARCSEC_TO_RAD,
            ry_sec * ARCSEC_TO_RAD,
            rz_sec * ARCSEC_TO_RAD,
            1.0 + s_ppm * 1e-6,
        ])
    }

    pub fn is_parametric(&self) -> bool {
        matches!(self, Datum::ThreeParam(_) | Datum::SevenParam(_))
    }

    pub fn is_grid_based(&self) -> bool {
        matches!(self, Datum::Grids(_) | Datum::Catalog { .. })
    }
}

/// Whether two endpoint datums describe the same anchoring.
///
/// Requires matching kind, matching ellipsoid shape (GRS80 and WGS84 count
/// as identical), and identical parameters or grid names.
pub fn datums_equal(a: &Datum, ell_a: &Ellipsoid, b: &Datum, ell_b: &Ellipsoid) -> bool {
    if !ell_a.shape_matches(ell_b) {
        return false;
    }
    match (a, b) {
        (Datum::Unknown, Datum::Unknown) => true,
        (Datum::Wgs84, Datum::Wgs84) => true,
        (Datum::ThreeParam(p), Datum::ThreeParam(q)) => p == q,
        (Datum::SevenParam(p), Datum::SevenParam(q)) => p == q,
        (Datum::Grids(p), Datum::Grids(q)) => p == q,
        (
            Datum::Catalog { name: n1, date: d1 },
            Datum::Catalog { name: n2, date: d2 },
        ) => n1 == n2 && d1 == d2,
        _ => false,
    }
}

/// Apply a parametric shift taking geocentric coordinates into WGS84.
fn to_wgs84(datum: &Datum, c: Coord) -> Coord {
    match datum {
        Datum::ThreeParam([dx, dy, dz]) => Coord::new(c.x + dx, c.y + dy, c.z + dz, c.t),
        Datum::SevenParam([dx, dy, dz, rx, ry, rz, m]) => Coord::new(
            m * (c.x - rz * c.y + ry * c.z) + dx,
            m * (rz * c.x + c.y - rx * c.z) + dy,
            m * (-ry * c.x + rx * c.y + c.z) + dz,
            c.t,
        ),
        _ => c,
    }
}

/// The algebraic inverse of [`to_wgs84`].
fn from_wgs84(datum: &Datum, c: Coord) -> Coord {
    match datum {
        Datum::ThreeParam([dx, dy, dz]) => Coord::new(c.x - dx, c.y - dy, c.z - dz, c.t),
        Datum::SevenParam([dx, dy, dz, rx, ry, rz, m]) => {
            let x = (c.x - dx) / m;
            let y = (c.y - dy) / m;
            let z = (c.z - dz) / m;
            Coord::new(
                x + rz * y - ry * z,
                -rz * x + y + rx * z,
                ry * x - rx * y + z,
                c.t,
            )
        }
        _ => c,
    }
}

/// Apply a grid-based datum's correction to a batch of geodetic points.
fn apply_grid_datum(
    ctx: &mut Context,
    datum: &Datum,
    inverse: bool,
    points: &mut [Coord],
) -> Result<(), TransformError> {
    match datum {
        Datum::Grids(list) => {
            let grids = ctx.grid_list(list).map_err(|e| match e {
                // Without a single usable grid there is no path between
                // these datums at all
                TransformError::NoUsableGrid => {
                    TransformError::DatumPath(format!("no usable grid in '{list}'"))
                }
                other => other,
            })?;
            per_point(points, |p| {
                let (lon, lat) = shift::shift_point(&grids, p.x, p.y, inverse)?;
                Ok(Coord::new(lon, lat, p.z, p.t))
            })
        }
        Datum::Catalog { name, date } => per_point(points, |p| {
            let (lon, lat) = shift::catalog_shift_point(ctx, name, *date, p.x, p.y, inverse)?;
            Ok(Coord::new(lon, lat, p.z, p.t))
        }),
        _ => Ok(()),
    }
}

/// Mutate geodetic coordinates from the source datum to the destination
/// datum.
///
/// Input and output are (lon, lat, ellipsoidal height) in radians/metres on
/// the respective endpoint ellipsoids.
pub fn datum_transform(
    ctx: &mut Context,
    src_datum: &Datum,
    src_ell: &Ellipsoid,
    dst_datum: &Datum,
    dst_ell: &Ellipsoid,
    points: &mut [Coord],
) -> Result<(), TransformError> {
    // No meaningful shift exists for an uncharacterized datum
    if matches!(src_datum, Datum::Unknown) || matches!(dst_datum, Datum::Unknown) {
        return Ok(());
    }

    if datums_equal(src_datum, src_ell, dst_datum, dst_ell) {
        return Ok(());
    }

    let mut src_ell = *src_ell;
    let mut dst_ell = *dst_ell;

    // Grid corrections act on geodetic coordinates and land in WGS84
    if src_datum.is_grid_based() {
        apply_grid_datum(ctx, src_datum, false, points)?;
        src_ell = WGS84;
    }
    if dst_datum.is_grid_based() {
        dst_ell = WGS84;
    }

    if !src_ell.shape_matches(&dst_ell)
        || src_datum.is_parametric()
        || dst_datum.is_parametric()
    {
        per_point(points, |p| {
            let (x, y, z) = geocent::geodetic_to_geocentric(&src_ell, p.x, p.y, p.z)?;
            let mut c = Coord::new(x, y, z, p.t);
            c = to_wgs84(src_datum, c);
            c = from_wgs84(dst_datum, c);
            let (lon, lat, h) = geocent::geocentric_to_geodetic(&dst_ell, c.x, c.y, c.z);
            Ok(Coord::new(lon, lat, h, p.t))
        })?;
    }

    if dst_datum.is_grid_based() {
        apply_grid_datum(ctx, dst_datum, true, points)?;
    }

    Ok(())
}
