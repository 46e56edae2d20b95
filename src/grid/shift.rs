//! Applying correction grids to geodetic coordinates.
//!
//! Longitude shifts follow the NAD convention (stored positive west), so the
//! forward direction subtracts the interpolated longitude shift and adds the
//! latitude shift. The inverse has no closed form and is solved by fixed
//! point iteration.

use std::f64::consts::PI;
use std::sync::Arc;

use log::debug;

use crate::context::{CachedPick, Context};
use crate::coord::adjlon;
use crate::error::TransformError;
use crate::grid::catalog::DateSide;
use crate::grid::Grid;

const MAX_ITERATIONS: usize = 10;
const TOL: f64 = 1e-12;

/// First grid in the list covering the point.
pub fn find_grid<'a>(grids: &'a [Arc<Grid>], lon: f64, lat: f64) -> Option<&'a Arc<Grid>> {
    grids.iter().find(|g| g.contains(lon, lat))
}

/// Offset of a geodetic point from the grid origin, longitude wrapped into
/// the origin-relative [0, 2π] range.
fn to_grid_frame(grid: &Grid, lon: f64, lat: f64) -> (f64, f64) {
    (adjlon(lon - grid.ll_lon - PI) + PI, lat - grid.ll_lat)
}

/// Apply one grid's shift to a geodetic point.
pub fn apply(
    grid: &Grid,
    lon: f64,
    lat: f64,
    inverse: bool,
) -> Result<(f64, f64), TransformError> {
    let (tb_lon, tb_lat) = to_grid_frame(grid, lon, lat);
    let (t_lon, t_lat) = grid
        .interpolate(tb_lon, tb_lat)
        .ok_or(TransformError::OutsideGridArea)?;

    if !inverse {
        return Ok((lon - t_lon, lat + t_lat));
    }

    // First-order guess, then iterate the forward shift to a fixed point
    let mut cur = (tb_lon + t_lon, tb_lat - t_lat);
    let mut converged = false;

    for _ in 0..MAX_ITERATIONS {
        let Some((del_lon, del_lat)) = grid.interpolate(cur.0, cur.1) else {
            // Stepped outside the grid mid-iteration, typically at the edge
            // when the shift into this grid came from a neighbouring grid;
            // keep the first-order approximation.
            debug!(
                "inverse shift left grid {} during iteration; keeping first approximation",
                grid.id
            );
            converged = true;
            break;
        };

        let dif = (cur.0 - del_lon - tb_lon, cur.1 + del_lat - tb_lat);
        cur.0 -= dif.0;
        cur.1 -= dif.1;

        if dif.0 * dif.0 + dif.1 * dif.1 <= TOL * TOL {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(TransformError::NonConvergent("inverse grid shift"));
    }

    Ok((adjlon(cur.0 + grid.ll_lon), cur.1 + grid.ll_lat))
}

/// Shift one point using the first covering grid of a list.
pub fn shift_point(
    grids: &[Arc<Grid>],
    lon: f64,
    lat: f64,
    inverse: bool,
) -> Result<(f64, f64), TransformError> {
    let grid = find_grid(grids, lon, lat).ok_or(TransformError::OutsideGridArea)?;
    apply(grid, lon, lat, inverse)
}

/// Interpolate a vertical (geoid undulation) value from a grid list, metres.
pub fn vertical_value(grids: &[Arc<Grid>], lon: f64, lat: f64) -> Result<f64, TransformError> {
    let grid = find_grid(grids, lon, lat).ok_or(TransformError::OutsideGridArea)?;
    let (off_lon, off_lat) = to_grid_frame(grid, lon, lat);
    let (value, _) = grid
        .interpolate(off_lon, off_lat)
        .ok_or(TransformError::OutsideGridArea)?;
    Ok(value)
}

/// Shift one point through a catalog, optionally blending between the best
/// grids on either side of the query date.
pub fn catalog_shift_point(
    ctx: &mut Context,
    catalog_name: &str,
    query_date: f64,
    lon: f64,
    lat: f64,
    inverse: bool,
) -> Result<(f64, f64), TransformError> {
    let after = pick(ctx, catalog_name, query_date, lon, lat, DateSide::NotBefore)?;
    let out_after = apply(&after.grid, lon, lat, inverse)?;

    if query_date == 0.0 {
        return Ok(out_after);
    }

    let before = pick(ctx, catalog_name, query_date, lon, lat, DateSide::NotAfter)?;
    if before.date == after.date {
        return Ok(out_after);
    }
    let out_before = apply(&before.grid, lon, lat, inverse)?;

    let mix = (query_date - before.date) / (after.date - before.date);
    Ok((
        mix * out_after.0 + (1.0 - mix) * out_before.0,
        mix * out_after.1 + (1.0 - mix) * out_before.1,
    ))
}

/// Select (or re-use from the context cache) the best catalog entry for the
/// point and load its grid.
fn pick(
    ctx: &mut Context,
    catalog_name: &str,
    query_date: f64,
    lon: f64,
    lat: f64,
    side: DateSide,
) -> Result<CachedPick, TransformError> {
    if let Some(cached) = ctx.selection.get(side, lon, lat) {
        return Ok(cached.clone());
    }

    let catalog = ctx.catalog(catalog_name)?;
    let entry = catalog
        .select(lon, lat, query_date, side)
        .ok_or(TransformError::OutsideGridArea)?;

    let grids = ctx.grid_list(&entry.definition)?;
    let picked = CachedPick {
        region: entry.region,
        date: entry.date,
        grid: grids[0].clone(),
    };
    ctx.selection.put(side, picked.clone());
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::catalog::Catalog;
    use crate::grid::testgrid;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_shift_signs() {
        // Constant shift: 2e-6 rad west in longitude, 1e-6 rad north
        let g = testgrid::constant("c", 0.0, 0.0, 0.01, 10, 10, 2e-6, 1e-6);
        let (lon, lat) = apply(&g, 0.05, 0.05, false).unwrap();
        assert_relative_eq!(lon, 0.05 - 2e-6, epsilon = 1e-12);
        assert_relative_eq!(lat, 0.05 + 1e-6, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_recovers_forward() {
        let g = testgrid::gradient("g", 0.0, 0.0, 0.01, 20, 20);
        let (lon0, lat0) = (0.095, 0.123);
        let (lon1, lat1) = apply(&g, lon0, lat0, false).unwrap();
        let (lon2, lat2) = apply(&g, lon1, lat1, true).unwrap();
        assert_relative_eq!(lon2, lon0, epsilon = 1e-11);
        assert_relative_eq!(lat2, lat0, epsilon = 1e-11);
    }

    #[test]
    fn test_outside_grid_area() {
        let g = Arc::new(testgrid::constant("c", 0.0, 0.0, 0.01, 10, 10, 0.0, 0.0));
        assert!(matches!(
            apply(&g, 1.0, 1.0, false),
            Err(TransformError::OutsideGridArea)
        ));
        assert!(matches!(
            shift_point(&[g], 1.0, 1.0, false),
            Err(TransformError::OutsideGridArea)
        ));
    }

    #[test]
    fn test_find_grid_prefers_first_covering() {
        let a = Arc::new(testgrid::constant("a", 0.0, 0.0, 0.01, 10, 10, 0.0, 0.0));
        let b = Arc::new(testgrid::constant("b", 0.05, 0.05, 0.01, 10, 10, 0.0, 0.0));
        let grids = [a.clone(), b];
        let found = find_grid(&grids, 0.07, 0.07).unwrap();
        assert_eq!(found.id, "a");
        assert!(find_grid(&[a], 0.5, 0.5).is_none());
    }

    #[test]
    fn test_vertical_value() {
        let g = Arc::new(testgrid::constant("v", 0.0, 0.0, 0.01, 10, 10, 12.5, 0.0));
        let v = vertical_value(&[g], 0.05, 0.05).unwrap();
        assert_relative_eq!(v, 12.5, epsilon = 1e-6);
    }

    fn catalog_ctx() -> Context {
        let mut ctx = Context::new();
        // Two epochs of the same area with different constant shifts
        ctx.insert_grid(
            "area_1990",
            testgrid::constant("area_1990", -0.1, -0.1, 0.01, 40, 40, 1e-5, 0.0),
        );
        ctx.insert_grid(
            "area_2000",
            testgrid::constant("area_2000", -0.1, -0.1, 0.01, 40, 40, 3e-5, 0.0),
        );
        let text = "\
title
area_1990,-12,-12,12,12,1,1990.0
area_2000,-12,-12,12,12,1,2000.0
";
        ctx.insert_catalog(Catalog::parse("cat.csv", text.as_bytes()).unwrap());
        ctx
    }

    #[test]
    fn test_catalog_shift_blends_between_epochs() {
        let mut ctx = catalog_ctx();
        // Halfway between the two epochs: shift is the mean of both grids
        let (lon, _) = catalog_shift_point(&mut ctx, "cat.csv", 1995.0, 0.1, 0.1, false).unwrap();
        assert_relative_eq!(lon, 0.1 - 2e-5, epsilon = 1e-10);
    }

    #[test]
    fn test_catalog_shift_without_date_uses_single_grid() {
        let mut ctx = catalog_ctx();
        let (lon, _) = catalog_shift_point(&mut ctx, "cat.csv", 0.0, 0.1, 0.1, false).unwrap();
        assert_relative_eq!(lon, 0.1 - 1e-5, epsilon = 1e-10);
    }

    #[test]
    fn test_catalog_point_outside_all_regions() {
        let mut ctx = catalog_ctx();
        assert!(matches!(
            catalog_shift_point(&mut ctx, "cat.csv", 1995.0, 2.0, 2.0, false),
            Err(TransformError::OutsideGridArea)
        ));
    }

    #[test]
    fn test_catalog_selection_cache_reused_across_nearby_queries() {
        let mut ctx = catalog_ctx();
        catalog_shift_point(&mut ctx, "cat.csv", 1995.0, 0.1, 0.1, false).unwrap();
        assert!(ctx.selection.get(DateSide::NotBefore, 0.11, 0.11).is_some());
        // Small date change does not invalidate the cached pick
        catalog_shift_point(&mut ctx, "cat.csv", 1996.0, 0.11, 0.11, false).unwrap();
        assert!(ctx.selection.get(DateSide::NotAfter, 0.11, 0.11).is_some());
    }
}
