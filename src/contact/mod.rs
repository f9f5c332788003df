//! Implements contact constraints enforced with penalty or augmented Lagrangian multipliers
//!
//! Slave nodes are projected onto the opposing surface (closest-point projection) and the
//! normal gap `g = (x_s - y)·ν` is negative for penetration. The normal traction reads
//! `tₙ = max(0, λ - ε g)`.

mod facet;
mod interface;
mod projection;
mod rigid_wall;
mod sliding;
mod surface;
mod tied;
pub use crate::contact::facet::*;
pub use crate::contact::interface::*;
pub use crate::contact::projection::*;
pub use crate::contact::rigid_wall::*;
pub use crate::contact::sliding::*;
pub use crate::contact::surface::*;
pub use crate::contact::tied::*;
