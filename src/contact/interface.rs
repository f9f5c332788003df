use super::{assemble_residual, assemble_stiffness, ContactSurface, RigidWall, SlidingInterface, TiedInterface};
use crate::base::{Assembler, GlobalMatrix, GlobalResidual, Mesh, StiffnessProfile};
use crate::fem::{Constraint, Elements, StepFailure};
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Defines the contact interfaces
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ContactInterface {
    /// Sliding contact between two surfaces (optionally with friction)
    Sliding(SlidingInterface),

    /// Surfaces glued together
    Tied(TiedInterface),

    /// Contact between a surface and a rigid plane
    RigidWall(RigidWall),
}

impl ContactInterface {
    /// Computes the penalty factors and the initial projections
    pub fn initialize(&mut self, mesh: &Mesh, elements: &Elements) -> Result<(), StrError> {
        match self {
            ContactInterface::Sliding(c) => c.initialize(mesh, elements),
            ContactInterface::Tied(c) => c.initialize(mesh, elements),
            ContactInterface::RigidWall(c) => c.initialize(mesh, elements),
        }
    }

    /// Sets the time of the new step
    pub fn set_time(&mut self, t: f64) {
        if let ContactInterface::RigidWall(c) = self {
            c.set_time(t);
        }
    }

    /// Returns the slave surface
    pub fn slave(&self) -> &ContactSurface {
        match self {
            ContactInterface::Sliding(c) => &c.slave,
            ContactInterface::Tied(c) => &c.slave,
            ContactInterface::RigidWall(c) => &c.slave,
        }
    }

    /// Returns the resultant contact force acting on the slave surface
    pub fn force(&self) -> [f64; 3] {
        match self {
            ContactInterface::Sliding(c) => c.force(),
            ContactInterface::Tied(c) => c.force(),
            ContactInterface::RigidWall(c) => c.force(),
        }
    }
}

impl Constraint for ContactInterface {
    fn update(&mut self, mesh: &Mesh, iteration: usize) -> Result<(), StrError> {
        match self {
            ContactInterface::Sliding(c) => c.update(mesh, iteration),
            ContactInterface::Tied(c) => c.update(mesh),
            ContactInterface::RigidWall(c) => c.update(mesh),
        }
    }

    fn generation(&self) -> usize {
        match self {
            ContactInterface::Sliding(c) => c.generation,
            ContactInterface::Tied(..) => 0,
            ContactInterface::RigidWall(c) => c.generation,
        }
    }

    fn symmetric(&self) -> bool {
        false
    }

    fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError> {
        match self {
            ContactInterface::Sliding(c) => c.profile(assembler, profile),
            ContactInterface::Tied(c) => c.profile(assembler, profile),
            ContactInterface::RigidWall(c) => c.profile(assembler, profile),
        }
    }

    fn assemble_residual(&self, assembler: &Assembler, out: &mut GlobalResidual) -> Result<(), StrError> {
        let local = match self {
            ContactInterface::Sliding(c) => c.local_contributions(assembler.mesh, false)?,
            ContactInterface::Tied(c) => c.local_contributions(false)?,
            ContactInterface::RigidWall(c) => c.local_contributions(false)?,
        };
        assemble_residual(&local, assembler, out)
    }

    fn assemble_stiffness(
        &self,
        assembler: &Assembler,
        kk: &mut GlobalMatrix,
        fd: &mut Vector,
        dup: &Vector,
    ) -> Result<(), StrError> {
        let local = match self {
            ContactInterface::Sliding(c) => c.local_contributions(assembler.mesh, true)?,
            ContactInterface::Tied(c) => c.local_contributions(true)?,
            ContactInterface::RigidWall(c) => c.local_contributions(true)?,
        };
        assemble_stiffness(&local, assembler, kk, fd, dup)
    }

    fn augmented(&self) -> bool {
        match self {
            ContactInterface::Sliding(c) => c.param.augmented,
            ContactInterface::Tied(c) => c.param.augmented,
            ContactInterface::RigidWall(c) => c.param.augmented,
        }
    }

    fn augment(&mut self, naug: usize) -> Result<bool, StepFailure> {
        match self {
            ContactInterface::Sliding(c) => c.augment(naug),
            ContactInterface::Tied(c) => c.augment(naug),
            ContactInterface::RigidWall(c) => c.augment(naug),
        }
    }

    fn commit(&mut self) {
        match self {
            ContactInterface::Sliding(c) => c.commit(),
            ContactInterface::Tied(..) => (),
            ContactInterface::RigidWall(c) => c.slave.commit(0.0, 0.0),
        }
    }
}
