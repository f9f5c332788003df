use super::StepFailure;
use crate::base::{Dof, Mesh};
use russell_lab::{Matrix, Vector};

/// Defines the trait for local (element) equations
///
/// The internal force is the element contribution to `F_int` such that the global residual
/// reads `R = F_ext - F_int`. The stiffness is the derivative of the internal force with
/// respect to the element DOFs.
pub trait ElementTrait: Send + Sync {
    /// Returns the node indices (local order)
    fn nodes(&self) -> &[usize];

    /// Returns the DOFs of each node (the local vector is node-major)
    fn dofs(&self) -> &[Dof];

    /// Returns whether the local stiffness matrix is symmetric or not
    fn symmetric_stiffness(&self) -> bool;

    /// Updates secondary values such as stresses
    ///
    /// Note that the nodal state in the mesh has been updated already
    fn update_stresses(&mut self, mesh: &Mesh) -> Result<(), StepFailure>;

    /// Calculates the internal force vector
    fn calc_internal_force(&self, f_int: &mut Vector, mesh: &Mesh) -> Result<(), StepFailure>;

    /// Calculates the stiffness matrix
    fn calc_stiffness(&self, kk: &mut Matrix, mesh: &Mesh) -> Result<(), StepFailure>;

    /// Returns the effective modulus of the material (zero if not a solid)
    fn effective_modulus(&self) -> f64 {
        0.0
    }

    /// Returns the current volume (as of the last call to `update_stresses`)
    fn volume(&self) -> f64;
}
