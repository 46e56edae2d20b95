//! The transform orchestrator.
//!
//! Drives a batch of coordinates from a source endpoint to a destination
//! endpoint through the canonical intermediate form (longitude, latitude,
//! ellipsoidal height; radians and metres). The stages run in a fixed order
//! on the way in and mirrored on the way out, with the datum shift at the
//! center:
//!
//! axes → geocentric → projection inverse → prime meridian → height units →
//! geoid → **datum shift** → geoid → height units → prime meridian →
//! geocentric → projection forward → longitude wrap → axes

use std::f64::consts::PI;

use log::error;

use crate::context::Context;
use crate::coord::Coord;
use crate::datum::{self, Datum};
use crate::ellipsoid::Ellipsoid;
use crate::error::TransformError;
use crate::geocent;
use crate::grid::shift;
use crate::op::Operation;

/// What the endpoint's native coordinates are.
pub enum CrsKind {
    /// Geodetic lon/lat in radians
    Geographic,
    /// Cartesian XYZ
    Geocentric,
    /// Any projected or composed operation taking geodetic radians to the
    /// endpoint's native plane
    Projected(Box<dyn Operation>),
}

/// Axis direction for one slot of an endpoint's axis order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    East,
    West,
    North,
    South,
    Up,
    Down,
}

const ENU: [Axis; 3] = [Axis::East, Axis::North, Axis::Up];

fn parse_axes(s: &str) -> Result<[Axis; 3], TransformError> {
    let mut out = [Axis::East, Axis::North, Axis::Up];
    let bytes = s.as_bytes();
    if bytes.len() != 3 {
        return Err(TransformError::InvalidParameter(format!(
            "axis order must have exactly three characters, got '{s}'"
        )));
    }
    for (i, &b) in bytes.iter().enumerate() {
        out[i] = match b {
            b'e' => Axis::East,
            b'w' => Axis::West,
            b'n' => Axis::North,
            b's' => Axis::South,
            b'u' => Axis::Up,
            b'd' => Axis::Down,
            _ => {
                return Err(TransformError::InvalidParameter(format!(
                    "unknown axis direction '{}'",
                    b as char
                )))
            }
        };
    }
    Ok(out)
}

/// A transform endpoint: the native coordinate form plus everything needed
/// to normalize it into (and out of) the canonical geodetic form.
pub struct Crs {
    kind: CrsKind,
    pub ellipsoid: Ellipsoid,
    pub datum: Datum,
    axes: [Axis; 3],
    /// Offset of the endpoint's prime meridian east of Greenwich, radians
    prime_meridian: f64,
    /// Unit factor for geocentric coordinates
    to_meter: f64,
    /// Unit factor for heights
    vto_meter: f64,
    /// Geoid model grid list for orthometric heights
    geoid_grids: Option<String>,
    /// Re-wrap output longitudes around this center
    long_wrap: Option<f64>,
}

impl Crs {
    pub fn new(kind: CrsKind, ellipsoid: Ellipsoid, datum: Datum) -> Self {
        Self {
            kind,
            ellipsoid,
            datum,
            axes: ENU,
            prime_meridian: 0.0,
            to_meter: 1.0,
            vto_meter: 1.0,
            geoid_grids: None,
            long_wrap: None,
        }
    }

    pub fn geographic(ellipsoid: Ellipsoid, datum: Datum) -> Self {
        Self::new(CrsKind::Geographic, ellipsoid, datum)
    }

    pub fn geocentric(ellipsoid: Ellipsoid, datum: Datum) -> Self {
        Self::new(CrsKind::Geocentric, ellipsoid, datum)
    }

    pub fn projected(op: Box<dyn Operation>, ellipsoid: Ellipsoid, datum: Datum) -> Self {
        Self::new(CrsKind::Projected(op), ellipsoid, datum)
    }

    /// Set the axis order, e.g. `"enu"`, `"neu"`, `"wsd"`.
    pub fn with_axes(mut self, axes: &str) -> Result<Self, TransformError> {
        self.axes = parse_axes(axes)?;
        Ok(self)
    }

    pub fn with_prime_meridian(mut self, rad: f64) -> Self {
        self.prime_meridian = rad;
        self
    }

    pub fn with_to_meter(mut self, factor: f64) -> Self {
        self.to_meter = factor;
        self
    }

    pub fn with_vertical_to_meter(mut self, factor: f64) -> Self {
        self.vto_meter = factor;
        self
    }

    pub fn with_geoid_grids(mut self, grids: &str) -> Self {
        self.geoid_grids = Some(grids.to_string());
        self
    }

    pub fn with_long_wrap(mut self, center: f64) -> Self {
        self.long_wrap = Some(center);
        self
    }

    fn is_latlong(&self) -> bool {
        matches!(self.kind, CrsKind::Geographic)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Dir {
    /// Source → canonical
    In,
    /// Canonical → destination
    Out,
}

/// Run a per-point closure under the batch failure policy.
///
/// Sentinel points pass through untouched. A transient error poisons only
/// the offending point when the batch holds more than one point; a batch of
/// exactly one surfaces it as a hard failure. Fatal errors abort
/// immediately.
pub(crate) fn per_point<F>(points: &mut [Coord], mut f: F) -> Result<(), TransformError>
where
    F: FnMut(Coord) -> Result<Coord, TransformError>,
{
    let n = points.len();
    for p in points.iter_mut() {
        if p.is_unprojectable() {
            continue;
        }
        match f(*p) {
            Ok(out) => *p = out,
            Err(e) if e.is_transient() && n > 1 => p.poison(),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Transform a batch of coordinates from `src` to `dst` in place.
///
/// Each point is processed independently; points already carrying the
/// unprojectable sentinel are propagated as-is.
pub fn transform(
    ctx: &mut Context,
    src: &Crs,
    dst: &Crs,
    points: &mut [Coord],
) -> Result<(), TransformError> {
    // Bring the input to canonical form
    adjust_axes(src, Dir::In, points);
    cartesian_stage(src, Dir::In, points)?;
    projected_to_geodetic(src, points)?;
    prime_meridian_stage(src, Dir::In, points);
    height_unit_stage(src, Dir::In, points);
    geoid_stage(ctx, src, Dir::In, points)?;

    // At the center of the process: the datum shift
    datum::datum_transform(
        ctx,
        &src.datum,
        &src.ellipsoid,
        &dst.datum,
        &dst.ellipsoid,
        points,
    )?;

    // Out on the other side, in mirror order
    geoid_stage(ctx, dst, Dir::Out, points)?;
    height_unit_stage(dst, Dir::Out, points);
    prime_meridian_stage(dst, Dir::Out, points);
    cartesian_stage(dst, Dir::Out, points)?;
    geodetic_to_projected(dst, points)?;
    long_wrap_stage(dst, points);
    adjust_axes(dst, Dir::Out, points);

    Ok(())
}

/// Permute/negate components between the endpoint's axis order and the
/// canonical east-north-up ordering.
fn adjust_axes(crs: &Crs, dir: Dir, points: &mut [Coord]) {
    if crs.axes == ENU {
        return;
    }

    for p in points.iter_mut() {
        if p.is_unprojectable() {
            continue;
        }
        let input = [p.x, p.y, p.z];

        if dir == Dir::In {
            // Normalize: slot i of the input feeds the axis it names
            for (i, axis) in crs.axes.iter().enumerate() {
                let value = input[i];
                match axis {
                    Axis::East => p.x = value,
                    Axis::West => p.x = -value,
                    Axis::North => p.y = value,
                    Axis::South => p.y = -value,
                    Axis::Up => p.z = value,
                    Axis::Down => p.z = -value,
                }
            }
        } else {
            // Denormalize: slot i of the output is read from the axis it
            // names
            for (i, axis) in crs.axes.iter().enumerate() {
                let value = match axis {
                    Axis::East => input[0],
                    Axis::West => -input[0],
                    Axis::North => input[1],
                    Axis::South => -input[1],
                    Axis::Up => input[2],
                    Axis::Down => -input[2],
                };
                match i {
                    0 => p.x = value,
                    1 => p.y = value,
                    _ => p.z = value,
                }
            }
        }
    }
}

/// Convert a geocentric endpoint between cartesian XYZ and geodetic form.
fn cartesian_stage(crs: &Crs, dir: Dir, points: &mut [Coord]) -> Result<(), TransformError> {
    if !matches!(crs.kind, CrsKind::Geocentric) {
        return Ok(());
    }

    let ell = crs.ellipsoid;

    if dir == Dir::In {
        if crs.to_meter != 1.0 {
            for p in points.iter_mut().filter(|p| !p.is_unprojectable()) {
                p.x *= crs.to_meter;
                p.y *= crs.to_meter;
                p.z *= crs.to_meter;
            }
        }
        per_point(points, |p| {
            let (lon, lat, h) = geocent::geocentric_to_geodetic(&ell, p.x, p.y, p.z);
            Ok(Coord::new(lon, lat, h, p.t))
        })
    } else {
        per_point(points, |p| {
            let (x, y, z) = geocent::geodetic_to_geocentric(&ell, p.x, p.y, p.z)?;
            Ok(Coord::new(x, y, z, p.t))
        })?;
        if crs.to_meter != 1.0 {
            for p in points.iter_mut().filter(|p| !p.is_unprojectable()) {
                p.x /= crs.to_meter;
                p.y /= crs.to_meter;
                p.z /= crs.to_meter;
            }
        }
        Ok(())
    }
}

/// Invert the source endpoint's operation to obtain geodetic coordinates.
fn projected_to_geodetic(crs: &Crs, points: &mut [Coord]) -> Result<(), TransformError> {
    let CrsKind::Projected(op) = &crs.kind else {
        return Ok(());
    };

    if !op.has_inverse() {
        error!("transform: source operation '{}' is not invertible", op.name());
        return Err(TransformError::NoInverse(op.name()));
    }

    per_point(points, |p| op.inverse(p))
}

/// Apply the destination endpoint's operation forward.
fn geodetic_to_projected(crs: &Crs, points: &mut [Coord]) -> Result<(), TransformError> {
    let CrsKind::Projected(op) = &crs.kind else {
        return Ok(());
    };
    per_point(points, |p| op.forward(p))
}

fn prime_meridian_stage(crs: &Crs, dir: Dir, points: &mut [Coord]) {
    let mut pm = crs.prime_meridian;
    if pm == 0.0 {
        return;
    }
    if dir == Dir::Out {
        pm = -pm;
    }
    for p in points.iter_mut().filter(|p| !p.is_unprojectable()) {
        p.x += pm;
    }
}

fn height_unit_stage(crs: &Crs, dir: Dir, points: &mut [Coord]) {
    let fac = match dir {
        Dir::In => crs.vto_meter,
        Dir::Out => 1.0 / crs.vto_meter,
    };
    if fac == 1.0 {
        return;
    }
    for p in points.iter_mut().filter(|p| !p.is_unprojectable()) {
        p.z *= fac;
    }
}

/// Convert between orthometric and ellipsoidal heights through the
/// endpoint's geoid model.
fn geoid_stage(
    ctx: &mut Context,
    crs: &Crs,
    dir: Dir,
    points: &mut [Coord],
) -> Result<(), TransformError> {
    let Some(names) = &crs.geoid_grids else {
        return Ok(());
    };
    let grids = ctx.grid_list(names)?;

    per_point(points, |p| {
        let undulation = shift::vertical_value(&grids, p.x, p.y)?;
        let z = match dir {
            Dir::In => p.z + undulation,
            Dir::Out => p.z - undulation,
        };
        Ok(Coord::new(p.x, p.y, z, p.t))
    })
}

/// Re-wrap output longitudes around the destination's wrap center.
fn long_wrap_stage(crs: &Crs, points: &mut [Coord]) {
    let Some(center) = crs.long_wrap else {
        return;
    };
    if !crs.is_latlong() {
        return;
    }
    for p in points.iter_mut().filter(|p| !p.is_unprojectable()) {
        let mut val = p.x % (2.0 * PI);
        while val < center - PI {
            val += 2.0 * PI;
        }
        while val > center + PI {
            val -= 2.0 * PI;
        }
        p.x = val;
    }
}
