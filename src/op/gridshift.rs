//! Horizontal grid-based datum correction as a pipeline step.

use std::sync::Arc;

use crate::context::Context;
use crate::coord::Coord;
use crate::error::TransformError;
use crate::grid::{shift, Grid};
use crate::op::{Operation, UnitKind};

/// Applies the best covering grid from an owned, already-loaded grid list.
///
/// Construction resolves and loads the named grids eagerly, so an instance
/// never exists with an empty or unloadable grid list.
pub struct GridShift {
    grids: Vec<Arc<Grid>>,
}

impl GridShift {
    pub fn new(ctx: &mut Context, grid_list: &str) -> Result<Self, TransformError> {
        Ok(Self {
            grids: ctx.grid_list(grid_list)?,
        })
    }
}

impl Operation for GridShift {
    fn name(&self) -> &'static str {
        "hgridshift"
    }

    fn forward(&self, point: Coord) -> Result<Coord, TransformError> {
        let (lon, lat) = shift::shift_point(&self.grids, point.x, point.y, false)?;
        Ok(Coord::new(lon, lat, point.z, point.t))
    }

    fn inverse(&self, point: Coord) -> Result<Coord, TransformError> {
        let (lon, lat) = shift::shift_point(&self.grids, point.x, point.y, true)?;
        Ok(Coord::new(lon, lat, point.z, point.t))
    }

    fn input_units(&self) -> UnitKind {
        UnitKind::Angular
    }

    fn output_units(&self) -> UnitKind {
        UnitKind::Angular
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::testgrid;
    use approx::assert_relative_eq;

    #[test]
    fn test_construction_requires_loadable_grids() {
        let mut ctx = Context::new();
        assert!(GridShift::new(&mut ctx, "absent").is_err());
        assert!(matches!(
            GridShift::new(&mut ctx, "@absent"),
            Err(TransformError::NoUsableGrid)
        ));
    }

    #[test]
    fn test_shift_roundtrip() {
        let mut ctx = Context::new();
        ctx.insert_grid(
            "local",
            testgrid::constant("local", 0.0, 0.0, 0.01, 20, 20, 4e-6, -2e-6),
        );
        let op = GridShift::new(&mut ctx, "local").unwrap();

        let p = Coord::xy(0.1, 0.1);
        let out = op.forward(p).unwrap();
        assert_relative_eq!(out.x, 0.1 - 4e-6, epsilon = 1e-12);
        assert_relative_eq!(out.y, 0.1 - 2e-6, epsilon = 1e-12);

        let back = op.inverse(out).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-11);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-11);
    }

    #[test]
    fn test_outside_coverage_is_transient() {
        let mut ctx = Context::new();
        ctx.insert_grid(
            "local",
            testgrid::constant("local", 0.0, 0.0, 0.01, 20, 20, 0.0, 0.0),
        );
        let op = GridShift::new(&mut ctx, "local").unwrap();
        let err = op.forward(Coord::xy(1.5, 1.5)).unwrap_err();
        assert!(err.is_transient());
    }
}
