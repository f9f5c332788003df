use super::StepFailure;
use crate::base::{Assembler, GlobalMatrix, GlobalResidual, Mesh, StiffnessProfile};
use crate::StrError;
use russell_lab::Vector;

/// Defines the trait for constraints enforced with a penalty, optionally augmented with
/// Lagrange multipliers
///
/// Contact interfaces and nodal constraints are driven by the solver through this trait:
/// `update` is called after every change of the nodal positions, the assembly methods add the
/// constraint forces and stiffness to the global system, and `augment` is called once the
/// quasi-Newton iterations have converged.
pub trait Constraint {
    /// Updates the state that depends on the nodal positions (projections, gaps)
    ///
    /// The iteration number allows periodic global searches.
    fn update(&mut self, mesh: &Mesh, iteration: usize) -> Result<(), StrError>;

    /// Returns the topology generation; the stiffness profile is rebuilt when it changes
    fn generation(&self) -> usize;

    /// Returns whether the stiffness contribution is symmetric
    fn symmetric(&self) -> bool;

    /// Adds the equations coupled by the constraint to the stiffness profile
    fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError>;

    /// Assembles the constraint forces into the global residual
    fn assemble_residual(&self, assembler: &Assembler, out: &mut GlobalResidual) -> Result<(), StrError>;

    /// Assembles the constraint stiffness into the global matrix
    fn assemble_stiffness(
        &self,
        assembler: &Assembler,
        kk: &mut GlobalMatrix,
        fd: &mut Vector,
        dup: &Vector,
    ) -> Result<(), StrError>;

    /// Returns whether the constraint uses augmented Lagrangian multipliers
    fn augmented(&self) -> bool;

    /// Performs an augmentation
    ///
    /// Returns true if converged; the multipliers are updated only if not converged. Returns
    /// [StepFailure::AugmentationLimit] if not converged after the maximum number of augmentations.
    fn augment(&mut self, naug: usize) -> Result<bool, StepFailure>;

    /// Accepts the current state as the start of the next time step
    fn commit(&mut self);
}
