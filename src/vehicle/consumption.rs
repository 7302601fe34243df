//! VT-micro style estimate of fuel consumption and emissions.
//!
//! The instantaneous rate is `exp(P(a, v))`, where `P` is a bivariate cubic in
//! acceleration and speed with tabulated coefficients.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The quantity being estimated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConsumptionKind {
    Fuel,
    Emissions,
}

/// Polynomial coefficients, indexed by the power of acceleration then the power of speed.
const FUEL_COEFFS: [[f64; 4]; 4] = [
    [-0.679439, 0.029665, -0.000276, 0.0000015],
    [0.135273, 0.004808, -0.000020, 5.5409E-8],
    [0.015946, 0.000083, 0.0000009, -2.47964E-8],
    [-0.001189, -0.000061, 0.0000003, -4.467234E-9],
];

const EMISSION_COEFFS: [[f64; 4]; 4] = [
    [0.887447, 0.070994, -0.000786, 0.0000046],
    [0.148841, 0.003870, 0.0000932, -0.0000007],
    [0.030550, -0.000926, 0.0000491, -0.0000003],
    [-0.001348, 0.0000461, -0.00000141, 8.1724E-9],
];

/// Speeds are divided by this before entering the polynomial.
const SPEED_SCALE: f64 = 1.08;

/// Accelerations larger than this in magnitude are integrated in steps.
const MAX_DIRECT_ACC: f64 = 10.0;

/// The acceleration step used when integrating large speed changes.
const ACC_STEP: f64 = 2.0;

/// Log-rates above this are treated as numerical blow-up and yield zero.
const MAX_LOG_RATE: f64 = 20.0;

impl ConsumptionKind {
    fn coeffs(self) -> &'static [[f64; 4]; 4] {
        match self {
            ConsumptionKind::Fuel => &FUEL_COEFFS,
            ConsumptionKind::Emissions => &EMISSION_COEFFS,
        }
    }

    fn scale(self) -> f64 {
        match self {
            ConsumptionKind::Fuel => 400.0,
            ConsumptionKind::Emissions => 0.0036,
        }
    }
}

/// Evaluates the log-rate polynomial.
fn log_rate(speed: f64, acc: f64, kind: ConsumptionKind) -> f64 {
    let v = speed / SPEED_SCALE;
    let mut acc_pow = 1.0;
    let mut total = 0.0;
    for row in kind.coeffs() {
        let mut speed_pow = 1.0;
        for coeff in row {
            total += coeff * acc_pow * speed_pow;
            speed_pow *= v;
        }
        acc_pow *= acc;
    }
    total
}

/// Estimates the consumption of a vehicle changing speed from `prev_speed`
/// to `new_speed` over `dt`. The result is never negative.
pub fn consumption(prev_speed: f64, new_speed: f64, dt: f64, kind: ConsumptionKind) -> f64 {
    let acc = (new_speed - prev_speed) / dt;
    let mut speed = new_speed;
    let raw = if acc.abs() > MAX_DIRECT_ACC {
        let step = ACC_STEP.copysign(acc);
        let steps = (acc / step).abs() as usize;
        let mut raw = 0.0;
        for _ in 0..steps {
            raw += log_rate(speed, step, kind);
            speed += step;
        }
        raw
    } else {
        log_rate(speed, acc, kind)
    };

    if raw > MAX_LOG_RATE || speed + 1.0 <= 0.0 {
        return 0.0;
    }
    raw.exp() * kind.scale() / (speed + 1.0)
}
