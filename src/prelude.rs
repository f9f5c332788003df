//! Makes available common structures needed to run a simulation
//!
//! You may write `use tissuefem::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{Config, Dof, DofConfig, Essential, Etype, LoadCurve, Mesh, Natural, RigidDof};
pub use crate::base::{ParamConstraint, ParamContact, ParamDiffusion, ParamMaterial, ParamRigid, ParamSolid, ParamSpring, SampleMeshes};
pub use crate::contact::{ContactInterface, ContactSurface, RigidWall, SlidingInterface, TiedInterface};
pub use crate::fem::{Constraint, LinearConstraint, NodalConstraint, PointConstraint};
pub use crate::fem::{FemModel, SolverImplicit, SolverState, StepFailure, StepSummary, TimeStepper};
pub use gemlab::shapes::GeoKind;
