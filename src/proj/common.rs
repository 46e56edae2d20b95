//! Common helpers for projection math (isometric latitude, scale factors).

use crate::error::TransformError;

const PHI_ITERATIONS: usize = 15;
const PHI_TOL: f64 = 1e-12;

/// tsfn(φ, e) = tan(π/4 - φ/2) / ((1 - e·sinφ)/(1 + e·sinφ))^(e/2)
///
/// The "t" of the isometric latitude; < 1 for positive latitudes.
pub fn tsfn(phi: f64, e: f64) -> f64 {
    let sinphi = phi.sin();
    let con = e * sinphi;
    (std::f64::consts::FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - con) / (1.0 + con)).powf(e / 2.0)
}

/// Scale factor along the parallel at latitude φ.
pub fn msfn(phi: f64, e2: f64) -> f64 {
    let sinphi = phi.sin();
    phi.cos() / (1.0 - e2 * sinphi * sinphi).sqrt()
}

/// Recover latitude from ts = tsfn(φ, e) by fixed-point iteration.
pub fn phi_from_ts(ts: f64, e: f64) -> Result<f64, TransformError> {
    let half_e = e / 2.0;
    let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * ts.atan();

    for _ in 0..PHI_ITERATIONS {
        let con = e * phi.sin();
        let next = std::f64::consts::FRAC_PI_2
            - 2.0 * (ts * ((1.0 - con) / (1.0 + con)).powf(half_e)).atan();
        if (next - phi).abs() <= PHI_TOL {
            return Ok(next);
        }
        phi = next;
    }
    Err(TransformError::NonConvergent("phi_from_ts"))
}
