//! Coordinate operation composition and datum-shift engine.
//!
//! Converts coordinates between geodetic, geocentric and projected reference
//! frames by composing elementary operations (map projections, Helmert
//! shifts, grid-based corrections, unit conversions) into executable
//! chains. The [`transform::transform`] orchestrator routes batches through
//! a canonical geodetic form with the datum shift at the center;
//! [`op::pipeline::Pipeline`] composes ordered step lists with per-step
//! direction and omission control.
//!
//! ```no_run
//! use redatum::{transform, Context, Coord, Crs, Datum};
//! use redatum::ellipsoid::WGS84;
//! use redatum::op::{create, Params};
//!
//! let mut ctx = Context::new();
//! let utm = create(&mut ctx, "utm", &Params::new().number("zone", 33.0))?;
//!
//! let src = Crs::geographic(WGS84, Datum::Wgs84);
//! let dst = Crs::projected(utm, WGS84, Datum::Wgs84);
//!
//! let mut points = [Coord::xy(15.0_f64.to_radians(), 52.0_f64.to_radians())];
//! transform(&mut ctx, &src, &dst, &mut points)?;
//! # Ok::<(), redatum::TransformError>(())
//! ```

pub mod context;
pub mod coord;
pub mod datum;
pub mod ellipsoid;
pub mod error;
pub mod geocent;
pub mod grid;
pub mod op;
pub mod proj;
pub mod transform;

pub use context::Context;
pub use coord::Coord;
pub use datum::Datum;
pub use ellipsoid::Ellipsoid;
pub use error::{GridError, TransformError};
pub use transform::{transform, Crs, CrsKind};
