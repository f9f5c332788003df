//! Nonlinear finite element solver core for solid, biphasic, and multiphasic tissue models
//!
//! The crate drives a quasi-Newton (BFGS) equilibrium iteration over a global sparse system
//! assembled from element kernels, rigid bodies, and contact interfaces enforced with penalty
//! or augmented Lagrangian multipliers.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod contact;
pub mod fem;
pub mod prelude;
