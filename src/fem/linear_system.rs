use super::StepFailure;
use crate::base::{Config, GlobalMatrix, StiffnessProfile};
use crate::StrError;
use russell_lab::{vec_all_finite, Vector};
use russell_sparse::LinSolver;

/// Holds variables to solve the global linear system
///
/// The stiffness matrix is assembled into a [GlobalMatrix] with a fixed profile and the
/// storage required by the linear solver (only one triangle when the solver works with a
/// triangular symmetric storage).
pub struct LinearSystem<'a> {
    /// Total number of free equations
    pub n_equation: usize,

    /// Holds the number of nonzero values allocated for the sparse solver
    pub nnz: usize,

    /// Holds the global stiffness matrix K
    pub kk: GlobalMatrix,

    /// Holds the linear solver
    solver: LinSolver<'a>,

    /// Indicates that the matrix has been factorized
    factorized: bool,
}

impl<'a> LinearSystem<'a> {
    /// Allocates a new instance
    pub fn new(config: &Config, profile: StiffnessProfile, symmetric: bool) -> Result<Self, StrError> {
        let n_equation = profile.neq();
        if n_equation == 0 {
            return Err("there are no free equations");
        }
        let sym = config.lin_sol_genie.get_sym(symmetric && config.symmetric_stiffness);
        let kk = GlobalMatrix::new(profile, sym)?;
        Ok(LinearSystem {
            n_equation,
            nnz: kk.nnz(),
            kk,
            solver: LinSolver::new(config.lin_sol_genie)?,
            factorized: false,
        })
    }

    /// Factorizes the global matrix
    pub fn factorize(&mut self, config: &Config) -> Result<(), StepFailure> {
        self.solver
            .actual
            .factorize(self.kk.as_coo(), Some(config.lin_sol_params))
            .map_err(StepFailure::LinearSolver)?;
        self.factorized = true;
        Ok(())
    }

    /// Solves K x = rhs using the current factorization
    pub fn solve(&mut self, x: &mut Vector, rhs: &Vector, verbose: bool) -> Result<(), StepFailure> {
        if !self.factorized {
            return Err(StepFailure::LinearSolver("the matrix must be factorized first"));
        }
        self.solver
            .actual
            .solve(x, rhs, verbose)
            .map_err(StepFailure::LinearSolver)?;
        vec_all_finite(x, verbose).map_err(|_| StepFailure::LinearSolver("found NaN or Inf in the solution"))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
