//! 3-, 7- and 14-parameter Helmert transformations on geocentric coordinates.
//!
//! Forward: `out = scale · R · in + T`. Inverse: unscale and de-offset, then
//! multiply by Rᵗ (valid because R is orthogonal).
//!
//! Two rotation-matrix conventions are supported, selected at construction:
//! the exact trigonometric Euler z-y′-x″ construction, and the first-order
//! small-angle approximation used by historically published parameter sets.
//! The small-angle form is the default, since most published shift parameters
//! are least-squares fits to the linearized rotation. A `transpose` flag
//! swaps R for Rᵗ to reconcile the "rotate the frame" vs "rotate the
//! position vector" sign conventions; this is a data-provenance property and
//! is never inferred from the numbers.
//!
//! The 14-parameter form propagates each parameter to the observation epoch:
//! `P(t) = P(epoch) + rate · (t − epoch)`. The effective parameter set is
//! recomputed from the immutable base and rate fields whenever the epoch
//! differs, so a shared instance is safe to call from multiple threads.

use log::trace;

use crate::coord::Coord;
use crate::error::TransformError;
use crate::op::{Operation, Params, UnitKind};

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / 180.0 / 3600.0;

/// Parameter set evaluated at a single observation epoch.
#[derive(Clone, Copy, Debug)]
struct Effective {
    t: [f64; 3],
    /// 1 + s·1e-6
    scale: f64,
    r: [[f64; 3]; 3],
    /// False for pure-translation sets; scale and rotation are skipped.
    rotation: bool,
}

pub struct Helmert {
    t0: [f64; 3],
    dt: [f64; 3],
    /// Rotations at the reference epoch, radians
    r0: [f64; 3],
    dr: [f64; 3],
    /// Scale in parts-per-million
    s0: f64,
    ds: f64,
    epoch: f64,
    dynamic: bool,
    exact: bool,
    transpose: bool,
    base: Effective,
}

impl Helmert {
    pub fn new(
        translation: [f64; 3],
        rotation_arcsec: [f64; 3],
        scale_ppm: f64,
        exact: bool,
        transpose: bool,
    ) -> Self {
        Self::build(
            translation,
            rotation_arcsec.map(|v| v * ARCSEC_TO_RAD),
            scale_ppm,
            [0.0; 3],
            [0.0; 3],
            0.0,
            0.0,
            exact,
            transpose,
        )
    }

    pub fn from_params(params: &Params) -> Result<Self, TransformError> {
        let get = |name: &str| params.number_or(name, 0.0);
        Ok(Self::build(
            [get("x"), get("y"), get("z")],
            [
                get("rx") * ARCSEC_TO_RAD,
                get("ry") * ARCSEC_TO_RAD,
                get("rz") * ARCSEC_TO_RAD,
            ],
            get("s"),
            [get("dx"), get("dy"), get("dz")],
            [
                get("drx") * ARCSEC_TO_RAD,
                get("dry") * ARCSEC_TO_RAD,
                get("drz") * ARCSEC_TO_RAD,
            ],
            get("ds"),
            get("t_epoch"),
            params.has("exact"),
            params.has("transpose"),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        t0: [f64; 3],
        r0: [f64; 3],
        s0: f64,
        dt: [f64; 3],
        dr: [f64; 3],
        ds: f64,
        epoch: f64,
        exact: bool,
        transpose: bool,
    ) -> Self {
        let dynamic = dt != [0.0; 3] || dr != [0.0; 3] || ds != 0.0;
        let base = evaluate(t0, r0, s0, exact, transpose);
        Self {
            t0,
            dt,
            r0,
            dr,
            s0,
            ds,
            epoch,
            dynamic,
            exact,
            transpose,
            base,
        }
    }

    /// Parameters propagated to the observation epoch `t_obs`.
    ///
    /// `t_obs == 0.0` means the point carries no epoch; the reference-epoch
    /// parameters apply.
    fn effective(&self, t_obs: f64) -> Effective {
        if !self.dynamic || t_obs == 0.0 || t_obs == self.epoch {
            return self.base;
        }
        let dt = t_obs - self.epoch;
        trace!(
            "helmert: propagating parameters to t_obs={t_obs} (t_epoch={})",
            self.epoch
        );
        evaluate(
            [
                self.t0[0] + self.dt[0] * dt,
                self.t0[1] + self.dt[1] * dt,
                self.t0[2] + self.dt[2] * dt,
            ],
            [
                self.r0[0] + self.dr[0] * dt,
                self.r0[1] + self.dr[1] * dt,
                self.r0[2] + self.dr[2] * dt,
            ],
            self.s0 + self.ds * dt,
            self.exact,
            self.transpose,
        )
    }
}

/// Build the effective offsets and rotation matrix for one parameter set.
fn evaluate(t: [f64; 3], r: [f64; 3], s_ppm: f64, exact: bool, transpose: bool) -> Effective {
    let rotation = r != [0.0; 3] || s_ppm != 0.0;
    let scale = 1.0 + s_ppm * 1e-6;

    let [f, th, p] = r; // rx, ry, rz

    let mut m = if exact {
        let (sf, cf) = f.sin_cos();
        let (st, ct) = th.sin_cos();
        let (sp, cp) = p.sin_cos();
        [
            [ct * cp, cf * sp + sf * st * cp, sf * sp - cf * st * cp],
            [-ct * sp, cf * cp - sf * st * sp, sf * cp + cf * st * sp],
            [st, -sf * ct, cf * ct],
        ]
    } else {
        // First-order expansion: cos x = 1, sin x = x, second-order products
        // discarded
        [[1.0, p, -th], [-p, 1.0, f], [th, -f, 1.0]]
    };

    if transpose {
        m = [
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ];
    }

    Effective {
        t,
        scale,
        r: m,
        rotation,
    }
}

impl Operation for Helmert {
    fn name(&self) -> &'static str {
        "helmert"
    }

    fn forward(&self, point: Coord) -> Result<Coord, TransformError> {
        let e = self.effective(point.t);
        let [x, y, z] = [point.x, point.y, point.z];

        if !e.rotation {
            return Ok(Coord::new(x + e.t[0], y + e.t[1], z + e.t[2], point.t));
        }

        let r = &e.r;
        Ok(Coord::new(
            e.scale * (r[0][0] * x + r[0][1] * y + r[0][2] * z) + e.t[0],
            e.scale * (r[1][0] * x + r[1][1] * y + r[1][2] * z) + e.t[1],
            e.scale * (r[2][0] * x + r[2][1] * y + r[2][2] * z) + e.t[2],
            point.t,
        ))
    }

    fn inverse(&self, point: Coord) -> Result<Coord, TransformError> {
        let e = self.effective(point.t);

        if !e.rotation {
            return Ok(Coord::new(
                point.x - e.t[0],
                point.y - e.t[1],
                point.z - e.t[2],
                point.t,
            ));
        }

        // Unscale and de-offset, then rotate back through the transpose
        let x = (point.x - e.t[0]) / e.scale;
        let y = (point.y - e.t[1]) / e.scale;
        let z = (point.z - e.t[2]) / e.scale;

        let r = &e.r;
        Ok(Coord::new(
            r[0][0] * x + r[1][0] * y + r[2][0] * z,
            r[0][1] * x + r[1][1] * y + r[2][1] * z,
            r[0][2] * x + r[1][2] * y + r[2][2] * z,
            point.t,
        ))
    }

    fn input_units(&self) -> UnitKind {
        UnitKind::Cartesian
    }

    fn output_units(&self) -> UnitKind {
        UnitKind::Cartesian
    }
}
