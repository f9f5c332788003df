//! Implements the finite element method

mod bfgs;
mod constraint_trait;
mod constraints;
mod convergence;
mod element_diffusion;
mod element_solid;
mod element_spring;
mod element_trait;
mod elements;
mod failure;
mod fem_model;
mod fem_state;
mod line_search;
mod linear_system;
mod material;
mod solver_implicit;
mod time_stepper;
pub use crate::fem::bfgs::*;
pub use crate::fem::constraint_trait::*;
pub use crate::fem::constraints::*;
pub use crate::fem::convergence::*;
pub use crate::fem::element_diffusion::*;
pub use crate::fem::element_solid::*;
pub use crate::fem::element_spring::*;
pub use crate::fem::element_trait::*;
pub use crate::fem::elements::*;
pub use crate::fem::failure::*;
pub use crate::fem::fem_model::*;
pub use crate::fem::fem_state::*;
pub use crate::fem::line_search::*;
pub use crate::fem::linear_system::*;
pub use crate::fem::material::*;
pub use crate::fem::solver_implicit::*;
pub use crate::fem::time_stepper::*;
