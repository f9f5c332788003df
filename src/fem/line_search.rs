use super::StepFailure;
use crate::base::Config;

/// Performs a line search along the current search direction
///
/// The callback moves the state to `s × direction` (measured from the start of the iteration),
/// recomputes the residual R₁, and returns the energy `direction · R₁`.
///
/// `r0` is the energy at the start of the iteration (`direction · R₀`). The step is refined with
/// a quadratic interpolation of the energy until `|r₁/r₀| ≤ ls_tol`. If the step falls below
/// `ls_min`, the state is moved to `s = 0.5` and the search gives up. If `ls_iter` iterations are
/// exhausted, the step with the smallest energy is taken. A zero `ls_tol` disables the search
/// and the full step is taken.
///
/// Returns the accepted step. On return, the state corresponds to this step.
pub fn line_search<F>(config: &Config, r0: f64, mut eval: F) -> Result<f64, StepFailure>
where
    F: FnMut(f64) -> Result<f64, StepFailure>,
{
    let mut s = 1.0;
    if config.ls_tol <= 0.0 {
        eval(s)?;
        return Ok(s);
    }
    let mut smin = s;
    let mut rmin = f64::abs(r0);
    let mut n = 0;
    loop {
        let r1 = eval(s)?;
        if s < config.ls_min {
            s = 0.5;
            eval(s)?;
            return Ok(s);
        }
        if n == 0 || f64::abs(r1) < rmin {
            smin = s;
            rmin = f64::abs(r1);
        }
        let r = if f64::abs(r1) < 1e-20 || r0 == 0.0 {
            0.0
        } else {
            f64::abs(r1 / r0)
        };
        if r <= config.ls_tol {
            return Ok(s);
        }
        // quadratic interpolation
        let a = r0 / r1;
        let aa = 1.0 + a * (s - 1.0);
        let bb = a * s * s;
        let dd = bb * bb - 4.0 * aa * bb;
        s = if dd >= 0.0 {
            let mut x = (bb + f64::sqrt(dd)) / (2.0 * aa);
            if x < 0.0 {
                x = (bb - f64::sqrt(dd)) / (2.0 * aa);
            }
            f64::max(x, 0.0)
        } else {
            0.5 * bb / aa
        };
        n += 1;
        if n >= config.ls_iter {
            eval(smin)?;
            return Ok(smin);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::line_search;
    use crate::base::Config;
    use crate::fem::StepFailure;
    use russell_lab::approx_eq;

    #[test]
    fn full_step_is_accepted_for_linear_problems() {
        // R(s) = R₀ (1 - s) ⇒ the energy vanishes at s = 1
        let config = Config::new();
        let mut calls = Vec::new();
        let s = line_search(&config, 2.0, |s| {
            calls.push(s);
            Ok(2.0 * (1.0 - s))
        })
        .unwrap();
        assert_eq!(s, 1.0);
        assert_eq!(calls, &[1.0]);
    }

    #[test]
    fn overshoot_is_reduced() {
        // energy along the line: e(s) = 1 - 4 s
        let config = Config::new();
        let mut last = 0.0;
        let s = line_search(&config, 1.0, |s| {
            last = s;
            Ok(1.0 - 4.0 * s)
        })
        .unwrap();
        // one quadratic interpolation: s = (√13 - 1) / 6 gives |r₁/r₀| ≈ 0.74 < 0.9
        approx_eq(s, (f64::sqrt(13.0) - 1.0) / 6.0, 1e-15);
        assert_eq!(last, s);
    }

    #[test]
    fn zero_tolerance_disables_the_search() {
        let mut config = Config::new();
        config.set_line_search(0.0, 0.01, 5).unwrap();
        let mut calls = Vec::new();
        let s = line_search(&config, 1.0, |s| {
            calls.push(s);
            Ok(1.0 - 4.0 * s)
        })
        .unwrap();
        assert_eq!(s, 1.0);
        assert_eq!(calls, &[1.0]);
    }

    #[test]
    fn tiny_steps_fall_back_to_one_half() {
        // energy that keeps pushing the step towards zero
        let mut config = Config::new();
        config.set_line_search(0.9, 0.01, 50).unwrap();
        let mut last = 0.0;
        let s = line_search(&config, 1.0, |s| {
            last = s;
            Ok(-1000.0 * s.powi(2) - 1.0)
        })
        .unwrap();
        assert_eq!(s, 0.5);
        assert_eq!(last, 0.5);
    }

    #[test]
    fn failures_are_propagated() {
        let config = Config::new();
        let res = line_search(&config, 1.0, |_| {
            Err(StepFailure::NegativeJacobian {
                element: 0,
                point: 0,
                volume: -1.0,
            })
        });
        assert!(matches!(res, Err(StepFailure::NegativeJacobian { .. })));
    }
}
