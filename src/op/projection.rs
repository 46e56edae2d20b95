//! Adapters exposing projection leaves as operations.

use crate::coord::Coord;
use crate::error::TransformError;
use crate::op::{Operation, UnitKind};
use crate::proj::Projection;

/// Wraps a projection leaf; height and time pass through untouched.
pub struct ProjectionOp<P: Projection> {
    name: &'static str,
    proj: P,
}

impl<P: Projection> ProjectionOp<P> {
    pub fn new(name: &'static str, proj: P) -> Self {
        Self { name, proj }
    }
}

impl<P: Projection> Operation for ProjectionOp<P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn forward(&self, point: Coord) -> Result<Coord, TransformError> {
        let (x, y) = self.proj.forward(point.x, point.y)?;
        Ok(Coord::new(x, y, point.z, point.t))
    }

    fn inverse(&self, point: Coord) -> Result<Coord, TransformError> {
        let (lon, lat) = self.proj.inverse(point.x, point.y)?;
        Ok(Coord::new(lon, lat, point.z, point.t))
    }

    fn input_units(&self) -> UnitKind {
        UnitKind::Angular
    }

    fn output_units(&self) -> UnitKind {
        UnitKind::Linear
    }
}

/// The identity operation on geodetic coordinates.
pub struct LongLat;

impl Operation for LongLat {
    fn name(&self) -> &'static str {
        "longlat"
    }

    fn forward(&self, point: Coord) -> Result<Coord, TransformError> {
        Ok(point)
    }

    fn inverse(&self, point: Coord) -> Result<Coord, TransformError> {
        Ok(point)
    }

    fn input_units(&self) -> UnitKind {
        UnitKind::Angular
    }

    fn output_units(&self) -> UnitKind {
        UnitKind::Angular
    }
}
