//! Geodetic ↔ geocentric cartesian conversion as a pipeline step.

use crate::coord::Coord;
use crate::ellipsoid::Ellipsoid;
use crate::error::TransformError;
use crate::geocent;
use crate::op::{Operation, UnitKind};

/// Forward: (lon, lat, h) → (X, Y, Z). Inverse: the iterative reverse.
pub struct Cart {
    ellipsoid: Ellipsoid,
}

impl Cart {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }
}

impl Operation for Cart {
    fn name(&self) -> &'static str {
        "cart"
    }

    fn forward(&self, point: Coord) -> Result<Coord, TransformError> {
        let (x, y, z) = geocent::geodetic_to_geocentric(&self.ellipsoid, point.x, point.y, point.z)?;
        Ok(Coord::new(x, y, z, point.t))
    }

    fn inverse(&self, point: Coord) -> Result<Coord, TransformError> {
        let (lon, lat, h) = geocent::geocentric_to_geodetic(&self.ellipsoid, point.x, point.y, point.z);
        Ok(Coord::new(lon, lat, h, point.t))
    }

    fn input_units(&self) -> UnitKind {
        UnitKind::Angular
    }

    fn output_units(&self) -> UnitKind {
        UnitKind::Cartesian
    }
}
