use super::StepFailure;
use russell_lab::{vec_add, vec_copy, vec_copy_scaled, vec_inner, vec_update, Vector};

/// Implements the BFGS update of the inverse stiffness (Matthies and Strang)
///
/// The inverse of the factorized stiffness is modified by a sequence of rank-two updates:
///
/// ```text
/// K⁻¹ₖ = (I + wₖ vₖᵀ) K⁻¹ₖ₋₁ (I + vₖ wₖᵀ)
/// ```
///
/// where, with `δ = s u` (line-search step times the search direction) and `γ = R₀ - R₁`,
///
/// ```text
/// c = sqrt((δ·γ) / (δ·(s R₀)))
/// v = -c s R₀ - γ
/// w = δ / (δ·γ)
/// ```
pub struct Bfgs {
    /// Holds the maximum condition number of an update
    cmax: f64,

    /// Holds the number of stored updates
    nups: usize,

    /// Holds the update vectors v
    vv: Vec<Vector>,

    /// Holds the update vectors w
    ww: Vec<Vector>,

    /// Holds the search direction (solution of the last solve)
    pub ui: Vector,

    /// Auxiliary vector
    tmp: Vector,
}

impl Bfgs {
    /// Allocates a new instance
    pub fn new(n_equation: usize, cmax: f64) -> Self {
        Bfgs {
            cmax,
            nups: 0,
            vv: Vec::new(),
            ww: Vec::new(),
            ui: Vector::new(n_equation),
            tmp: Vector::new(n_equation),
        }
    }

    /// Returns the number of stored updates
    pub fn n_updates(&self) -> usize {
        self.nups
    }

    /// Discards all updates (after a reformation)
    pub fn reset(&mut self) {
        self.nups = 0;
    }

    /// Performs an update given the line-search step and the residuals before and after the step
    ///
    /// Returns `Ok(false)` if the update was rejected (non-positive curvature or too large
    /// condition number); in this case the stiffness must be reformed.
    pub fn update(&mut self, s: f64, r0: &Vector, r1: &Vector) -> Result<bool, StepFailure> {
        let n = self.ui.dim();
        let dr = &mut self.tmp;
        vec_add(dr, 1.0, r0, -1.0, r1)?;
        let dg = s * vec_inner(&self.ui, dr);
        let dh = s * s * vec_inner(&self.ui, r0);
        if dh == 0.0 {
            return Ok(false);
        }
        let r = dg / dh;
        if r <= 0.0 || !r.is_finite() {
            return Ok(false);
        }
        let c = f64::sqrt(r);
        if c > self.cmax {
            return Ok(false);
        }
        if self.vv.len() <= self.nups {
            self.vv.push(Vector::new(n));
            self.ww.push(Vector::new(n));
        }
        vec_add(&mut self.vv[self.nups], -c * s, r0, -1.0, dr)?;
        vec_copy_scaled(&mut self.ww[self.nups], s / dg, &self.ui)?;
        self.nups += 1;
        Ok(true)
    }

    /// Solves for the search direction using the updated inverse
    ///
    /// The callback solves `K x = rhs` with the factorized stiffness. The result is written into `ui`.
    pub fn solve<F>(&mut self, rhs: &Vector, mut solve_k: F) -> Result<(), StepFailure>
    where
        F: FnMut(&mut Vector, &Vector) -> Result<(), StepFailure>,
    {
        vec_copy(&mut self.tmp, rhs)?;
        for k in (0..self.nups).rev() {
            let wr = vec_inner(&self.ww[k], &self.tmp);
            vec_update(&mut self.tmp, wr, &self.vv[k])?;
        }
        solve_k(&mut self.ui, &self.tmp)?;
        for k in 0..self.nups {
            let vr = vec_inner(&self.vv[k], &self.ui);
            vec_update(&mut self.ui, vr, &self.ww[k])?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Bfgs;
    use crate::fem::StepFailure;
    use russell_lab::{approx_eq, Vector};

    // diagonal "factorization" used by the tests
    fn diagonal(d: &[f64]) -> impl FnMut(&mut Vector, &Vector) -> Result<(), StepFailure> + '_ {
        move |x: &mut Vector, rhs: &Vector| {
            for i in 0..d.len() {
                x[i] = rhs[i] / d[i];
            }
            Ok(())
        }
    }

    #[test]
    fn solve_without_updates_uses_the_stiffness() {
        let mut bfgs = Bfgs::new(2, 1e5);
        let rhs = Vector::from(&[2.0, 9.0]);
        bfgs.solve(&rhs, diagonal(&[2.0, 3.0])).unwrap();
        approx_eq(bfgs.ui[0], 1.0, 1e-15);
        approx_eq(bfgs.ui[1], 3.0, 1e-15);
        assert_eq!(bfgs.n_updates(), 0);
    }

    #[test]
    fn update_satisfies_the_secant_condition() {
        // true (unknown) stiffness diag(4, 6); approximate stiffness diag(2, 3)
        let mut bfgs = Bfgs::new(2, 1e5);
        let r0 = Vector::from(&[2.0, 3.0]);
        bfgs.solve(&r0, diagonal(&[2.0, 3.0])).unwrap();
        // δ = ui = (1, 1); the true residual after the step is R₁ = R₀ - K δ
        let r1 = Vector::from(&[2.0 - 4.0, 3.0 - 6.0]);
        assert!(bfgs.update(1.0, &r0, &r1).unwrap());
        assert_eq!(bfgs.n_updates(), 1);

        // the updated inverse maps γ = R₀ - R₁ onto δ
        let gamma = Vector::from(&[4.0, 6.0]);
        bfgs.solve(&gamma, diagonal(&[2.0, 3.0])).unwrap();
        approx_eq(bfgs.ui[0], 1.0, 1e-14);
        approx_eq(bfgs.ui[1], 1.0, 1e-14);

        bfgs.reset();
        assert_eq!(bfgs.n_updates(), 0);
    }

    #[test]
    fn update_rejects_bad_pairs() {
        let mut bfgs = Bfgs::new(2, 1e5);
        let r0 = Vector::from(&[1.0, 0.0]);
        bfgs.solve(&r0, diagonal(&[1.0, 1.0])).unwrap();
        // residual increased along the step: negative curvature
        let r1 = Vector::from(&[2.0, 0.0]);
        assert!(!bfgs.update(1.0, &r0, &r1).unwrap());

        // too large condition number
        let mut bfgs = Bfgs::new(2, 1.5);
        bfgs.solve(&r0, diagonal(&[1.0, 1.0])).unwrap();
        let r1 = Vector::from(&[-3.0, 0.0]); // c = sqrt(4) = 2
        assert!(!bfgs.update(1.0, &r0, &r1).unwrap());
        assert_eq!(bfgs.n_updates(), 0);
    }
}
