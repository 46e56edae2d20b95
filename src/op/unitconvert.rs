//! Horizontal and vertical unit conversion step.

use std::f64::consts::PI;

use crate::coord::Coord;
use crate::error::TransformError;
use crate::op::{Operation, Params, UnitKind};

/// Factor to the canonical unit (metres or radians) per recognized name.
const UNITS: &[(&str, f64, UnitKind)] = &[
    ("m", 1.0, UnitKind::Linear),
    ("mm", 0.001, UnitKind::Linear),
    ("cm", 0.01, UnitKind::Linear),
    ("km", 1000.0, UnitKind::Linear),
    ("ft", 0.3048, UnitKind::Linear),
    ("us-ft", 1200.0 / 3937.0, UnitKind::Linear),
    ("rad", 1.0, UnitKind::Angular),
    ("deg", PI / 180.0, UnitKind::Angular),
    ("grad", PI / 200.0, UnitKind::Angular),
];

fn lookup(op: &str, name: &str) -> Result<(f64, UnitKind), TransformError> {
    UNITS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|&(_, f, k)| (f, k))
        .ok_or_else(|| TransformError::InvalidParameter(format!("{op}: unknown unit '{name}'")))
}

/// Scales the planar pair and/or the height by fixed unit ratios.
pub struct UnitConvert {
    xy_factor: f64,
    z_factor: f64,
    input: UnitKind,
    output: UnitKind,
}

impl UnitConvert {
    pub fn from_params(params: &Params) -> Result<Self, TransformError> {
        let mut xy_factor = 1.0;
        let mut z_factor = 1.0;
        let mut input = UnitKind::Whatever;
        let mut output = UnitKind::Whatever;

        if params.has("xy_in") || params.has("xy_out") {
            let (f_in, k_in) = lookup(
                "unitconvert",
                params.get_text("xy_in").unwrap_or("m"),
            )?;
            let (f_out, k_out) = lookup(
                "unitconvert",
                params.get_text("xy_out").unwrap_or("m"),
            )?;
            if k_in != k_out {
                return Err(TransformError::InvalidParameter(
                    "unitconvert: cannot convert between angular and linear units".into(),
                ));
            }
            xy_factor = f_in / f_out;
            input = k_in;
            output = k_out;
        }

        if params.has("z_in") || params.has("z_out") {
            let (f_in, k_in) = lookup("unitconvert", params.get_text("z_in").unwrap_or("m"))?;
            let (f_out, k_out) = lookup("unitconvert", params.get_text("z_out").unwrap_or("m"))?;
            if k_in != UnitKind::Linear || k_out != UnitKind::Linear {
                return Err(TransformError::InvalidParameter(
                    "unitconvert: height units must be linear".into(),
                ));
            }
            z_factor = f_in / f_out;
        }

        Ok(Self {
            xy_factor,
            z_factor,
            input,
            output,
        })
    }
}

impl Operation for UnitConvert {
    fn name(&self) -> &'static str {
        "unitconvert"
    }

    fn forward(&self, point: Coord) -> Result<Coord, TransformError> {
        Ok(Coord::new(
            point.x * self.xy_factor,
            point.y * self.xy_factor,
            point.z * self.z_factor,
            point.t,
        ))
    }

    fn inverse(&self, point: Coord) -> Result<Coord, TransformError> {
        Ok(Coord::new(
            point.x / self.xy_factor,
            point.y / self.xy_factor,
            point.z / self.z_factor,
            point.t,
        ))
    }

    fn input_units(&self) -> UnitKind {
        self.input
    }

    fn output_units(&self) -> UnitKind {
        self.output
    }
}
