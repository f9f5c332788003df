use crate::StrError;
use serde::{Deserialize, Serialize};

/// Defines a time-dependent multiplier for boundary values and loads
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum LoadCurve {
    /// Always one
    Constant,

    /// Equal to the time
    Ramp,

    /// Piecewise-linear interpolation of (time, value) points; constant beyond the ends
    Table(Vec<(f64, f64)>),
}

impl LoadCurve {
    /// Allocates a piecewise-linear curve
    pub fn table(points: &[(f64, f64)]) -> Result<Self, StrError> {
        if points.is_empty() {
            return Err("load curve table must have at least one point");
        }
        for i in 1..points.len() {
            if points[i].0 <= points[i - 1].0 {
                return Err("load curve times must be strictly increasing");
            }
        }
        Ok(LoadCurve::Table(points.to_vec()))
    }

    /// Evaluates the multiplier at time t
    pub fn value(&self, t: f64) -> f64 {
        match self {
            LoadCurve::Constant => 1.0,
            LoadCurve::Ramp => t,
            LoadCurve::Table(points) => {
                let n = points.len();
                if n == 0 {
                    return 0.0;
                }
                if t <= points[0].0 {
                    return points[0].1;
                }
                if t >= points[n - 1].0 {
                    return points[n - 1].1;
                }
                let i = points.partition_point(|p| p.0 <= t);
                let (t0, v0) = points[i - 1];
                let (t1, v1) = points[i];
                v0 + (v1 - v0) * (t - t0) / (t1 - t0)
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
