//! Explicit Runge-Kutta integrators for small autonomous systems.
//!
//! - [`integrate_rk45`] -- adaptive Dormand-Prince 5(4) with mixed
//!   absolute/relative error control and a step budget.
//! - [`integrate_rk4`] -- classic fixed-step fourth order.
//!
//! Both take the derivative as `f(t, y) -> dy/dt` and return the state at
//! the end time or a [`SolverError`]. A failed integration never returns a
//! partial state.

use crate::error::SolverError;

/// Error-control settings for [`integrate_rk45`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdeOptions {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Maximum attempted steps, accepted or rejected.
    pub max_steps: u32,
    /// Smallest step before giving up.
    pub min_step: f64,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            rtol: 1.0e-6,
            atol: 1.0e-9,
            max_steps: 10_000,
            min_step: 1.0e-12,
        }
    }
}

// Dormand-Prince tableau.
const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A: [&[f64]; 6] = [
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
    &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
    &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];
const B: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
// Fifth-order minus embedded fourth-order weights.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339_200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// `y + h·Σ coefs[i]·ks[i]`.
fn combine(y: &[f64], h: f64, coefs: &[f64], ks: &[Vec<f64>]) -> Vec<f64> {
    let mut out = y.to_vec();
    for (coef, k) in coefs.iter().zip(ks) {
        for (o, ki) in out.iter_mut().zip(k) {
            *o += h * coef * ki;
        }
    }
    out
}

fn all_finite(y: &[f64]) -> bool {
    y.iter().all(|v| v.is_finite())
}

fn check_interval(t0: f64, t1: f64) -> Result<(), SolverError> {
    if t0.is_finite() && t1.is_finite() && t1 >= t0 {
        Ok(())
    } else {
        Err(SolverError::InvalidInterval { t0, t1 })
    }
}

/// Root-mean-square of the scaled error estimate.
fn error_norm(error: &[f64], y: &[f64], y_new: &[f64], options: &OdeOptions) -> f64 {
    let (sum, n) = error
        .iter()
        .zip(y.iter().zip(y_new))
        .map(|(e, (a, b))| {
            let scale = options.rtol.mul_add(a.abs().max(b.abs()), options.atol);
            (e / scale).powi(2)
        })
        .fold((0.0, 0_u32), |(s, n), v| (s + v, n.saturating_add(1)));
    if n == 0 {
        0.0
    } else {
        (sum / f64::from(n)).sqrt()
    }
}

/// Integrate `y' = f(t, y)` from `t0` to `t1` with adaptive step control.
pub fn integrate_rk45<F>(f: F, t0: f64, t1: f64, y0: &[f64], options: &OdeOptions) -> Result<Vec<f64>, SolverError>
where
    F: Fn(f64, &[f64]) -> Vec<f64>,
{
    check_interval(t0, t1)?;
    if !all_finite(y0) {
        return Err(SolverError::NonFinite { t: t0 });
    }
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(y0.to_vec());
    }

    let mut t = t0;
    let mut y = y0.to_vec();
    let mut h = span / 10.0;
    let mut attempts = 0_u32;

    while t < t1 {
        if attempts >= options.max_steps {
            return Err(SolverError::StepBudgetExceeded {
                max_steps: options.max_steps,
                t,
            });
        }
        attempts = attempts.saturating_add(1);

        let remaining = t1 - t;
        h = h.min(remaining);
        if h < options.min_step && h < remaining {
            return Err(SolverError::StepUnderflow { t, step: h });
        }

        let mut ks = Vec::with_capacity(7);
        ks.push(f(t, &y));
        for (c, row) in C.iter().zip(A) {
            let stage = combine(&y, h, row, &ks);
            ks.push(f(c.mul_add(h, t), &stage));
        }
        let y_new = combine(&y, h, &B, &ks);
        if !all_finite(&y_new) || !ks.iter().all(|k| all_finite(k)) {
            return Err(SolverError::NonFinite { t });
        }
        let zero = vec![0.0; y.len()];
        let error = combine(&zero, h, &E, &ks);
        let norm = error_norm(&error, &y, &y_new, options);

        if norm <= 1.0 {
            t = if h >= remaining { t1 } else { t + h };
            y = y_new;
        }
        let factor = if norm <= f64::MIN_POSITIVE {
            5.0
        } else {
            (0.9 * norm.powf(-0.2)).clamp(0.2, 5.0)
        };
        h *= factor;
    }
    Ok(y)
}

/// Integrate `y' = f(t, y)` from `t0` to `t1` in `steps` equal RK4 steps.
pub fn integrate_rk4<F>(f: F, t0: f64, t1: f64, y0: &[f64], steps: u32) -> Result<Vec<f64>, SolverError>
where
    F: Fn(f64, &[f64]) -> Vec<f64>,
{
    check_interval(t0, t1)?;
    if steps == 0 {
        return Err(SolverError::InvalidInterval { t0, t1 });
    }
    let h = (t1 - t0) / f64::from(steps);
    let mut y = y0.to_vec();
    for step in 0..steps {
        let t = h.mul_add(f64::from(step), t0);
        let mut ks = Vec::with_capacity(4);
        ks.push(f(t, &y));
        ks.push(f(0.5_f64.mul_add(h, t), &combine(&y, h, &[0.5], &ks)));
        ks.push(f(0.5_f64.mul_add(h, t), &combine(&y, h, &[0.0, 0.5], &ks)));
        ks.push(f(t + h, &combine(&y, h, &[0.0, 0.0, 1.0], &ks)));
        y = combine(&y, h, &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0], &ks);
        if !all_finite(&y) {
            return Err(SolverError::NonFinite { t: t + h });
        }
    }
    Ok(y)
}
