//! Implements the base structures for a finite element simulation

mod assembly;
mod config;
mod dof_config;
mod enums;
mod equation_id;
mod equations;
mod essential;
mod global_matrix;
mod load_curve;
mod mesh;
mod natural;
mod parameters;
mod rigid_body;
mod sample_meshes;
pub use crate::base::assembly::*;
pub use crate::base::config::*;
pub use crate::base::dof_config::*;
pub use crate::base::enums::*;
pub use crate::base::equation_id::*;
pub use crate::base::equations::*;
pub use crate::base::essential::*;
pub use crate::base::global_matrix::*;
pub use crate::base::load_curve::*;
pub use crate::base::mesh::*;
pub use crate::base::natural::*;
pub use crate::base::parameters::*;
pub use crate::base::rigid_body::*;
pub use crate::base::sample_meshes::*;
