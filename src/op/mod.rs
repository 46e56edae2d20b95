//! The uniform operation abstraction and the operation factory.
//!
//! Every elementary transform (projection, Helmert shift, grid shift, unit
//! conversion, pipeline) implements [`Operation`]. Coordinates flow through
//! as 4-component [`Coord`] values; 2D/3D entry points are provided on top.

pub mod cart;
pub mod gridshift;
pub mod helmert;
pub mod pipeline;
pub mod projection;
pub mod unitconvert;

use std::collections::HashMap;

use crate::context::Context;
use crate::coord::Coord;
use crate::ellipsoid::{self, Ellipsoid};
use crate::error::TransformError;
use crate::proj::mercator::{Mercator, WebMercator};
use crate::proj::transverse_mercator::TransverseMercator;

/// Coordinate unit class on either side of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    /// Radians
    Angular,
    /// Metres (projected plane)
    Linear,
    /// Metres (geocentric XYZ)
    Cartesian,
    /// Unit-agnostic (raw bit mover)
    Whatever,
}

/// A single coordinate-transforming step.
pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Forward transform of one 4D point.
    fn forward(&self, point: Coord) -> Result<Coord, TransformError>;

    /// Inverse transform of one 4D point.
    ///
    /// Only meaningful when `has_inverse()` returns true; callers query the
    /// capability before use.
    fn inverse(&self, point: Coord) -> Result<Coord, TransformError>;

    fn has_inverse(&self) -> bool {
        true
    }

    fn input_units(&self) -> UnitKind;
    fn output_units(&self) -> UnitKind;

    fn forward_2d(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let out = self.forward(Coord::xy(x, y))?;
        Ok((out.x, out.y))
    }

    fn inverse_2d(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let out = self.inverse(Coord::xy(x, y))?;
        Ok((out.x, out.y))
    }

    fn forward_3d(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError> {
        let out = self.forward(Coord::xyz(x, y, z))?;
        Ok((out.x, out.y, out.z))
    }

    fn inverse_3d(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError> {
        let out = self.inverse(Coord::xyz(x, y, z))?;
        Ok((out.x, out.y, out.z))
    }
}

/// An already-typed operation parameter value.
///
/// The text parameter parser is an external collaborator; the engine only
/// consumes these typed values.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Flag,
    Number(f64),
    Text(String),
}

/// A flat `name -> value` parameter set for one operation.
#[derive(Clone, Debug, Default)]
pub struct Params(HashMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, name: &str) -> Self {
        self.0.insert(name.into(), ParamValue::Flag);
        self
    }

    pub fn number(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.into(), ParamValue::Number(value));
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.into(), ParamValue::Text(value.into()));
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(ParamValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.get_number(name).unwrap_or(default)
    }

    pub fn require_number(&self, op: &str, name: &str) -> Result<f64, TransformError> {
        self.get_number(name).ok_or_else(|| {
            TransformError::InvalidParameter(format!("{op}: missing required parameter '{name}'"))
        })
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn require_text(&self, op: &str, name: &str) -> Result<&str, TransformError> {
        self.get_text(name).ok_or_else(|| {
            TransformError::InvalidParameter(format!("{op}: missing required parameter '{name}'"))
        })
    }
}

/// Resolve an `ellps` parameter to a known ellipsoid; WGS84 when absent.
pub fn ellipsoid_from_params(op: &str, params: &Params) -> Result<Ellipsoid, TransformError> {
    match params.get_text("ellps") {
        None => Ok(ellipsoid::WGS84),
        Some("WGS84") | Some("wgs84") => Ok(ellipsoid::WGS84),
        Some("GRS80") | Some("grs80") => Ok(ellipsoid::GRS80),
        Some("intl") => Ok(ellipsoid::INTL),
        Some("clrk66") => Ok(ellipsoid::CLARKE66),
        Some(other) => Err(TransformError::InvalidParameter(format!(
            "{op}: unknown ellipsoid '{other}'"
        ))),
    }
}

/// Construct an operation by name from typed parameters.
///
/// The closed set of recognized names. `pipeline` is deliberately absent:
/// pipelines are built from step lists and must not nest, so the name is
/// rejected here before any recursion can happen.
pub fn create(
    ctx: &mut Context,
    name: &str,
    params: &Params,
) -> Result<Box<dyn Operation>, TransformError> {
    match name {
        "longlat" => Ok(Box::new(projection::LongLat)),
        "utm" => {
            let zone = params.require_number("utm", "zone")?;
            if zone.fract() != 0.0 {
                return Err(TransformError::InvalidParameter(format!(
                    "utm: zone must be an integer, got {zone}"
                )));
            }
            let tm = TransverseMercator::utm_zone(zone as u8, !params.has("south"))?;
            Ok(Box::new(projection::ProjectionOp::new("utm", tm)))
        }
        "tmerc" => {
            let ell = ellipsoid_from_params("tmerc", params)?;
            let tm = TransverseMercator::new(
                ell,
                params.number_or("lon_0", 0.0),
                params.number_or("lat_0", 0.0),
                params.number_or("k_0", 1.0),
                params.number_or("x_0", 0.0),
                params.number_or("y_0", 0.0),
            )?;
            Ok(Box::new(projection::ProjectionOp::new("tmerc", tm)))
        }
        "merc" => {
            let ell = ellipsoid_from_params("merc", params)?;
            let m = Mercator::new(
                ell,
                params.number_or("lon_0", 0.0),
                params.number_or("lat_ts", 0.0),
                params.number_or("x_0", 0.0),
                params.number_or("y_0", 0.0),
            );
            Ok(Box::new(projection::ProjectionOp::new("merc", m)))
        }
        "webmerc" => Ok(Box::new(projection::ProjectionOp::new(
            "webmerc",
            WebMercator::new(),
        ))),
        "cart" => {
            let ell = ellipsoid_from_params("cart", params)?;
            Ok(Box::new(cart::Cart::new(ell)))
        }
        "helmert" => Ok(Box::new(helmert::Helmert::from_params(params)?)),
        "hgridshift" => {
            let grids = params.require_text("hgridshift", "grids")?;
            Ok(Box::new(gridshift::GridShift::new(ctx, grids)?))
        }
        "unitconvert" => Ok(Box::new(unitconvert::UnitConvert::from_params(params)?)),
        "pipeline" => Err(TransformError::MalformedPipeline(
            "a pipeline cannot appear as a sub-operation".into(),
        )),
        other => Err(TransformError::UnknownOperation(other.into())),
    }
}
