use super::{Dof, LoadCurve};
use std::fmt;

/// Holds a concentrated load (force or flux) applied to a nodal DOF
#[derive(Clone, Debug, PartialEq)]
pub struct NodalLoad {
    /// Node index
    pub node: usize,

    /// Loaded DOF
    pub dof: Dof,

    /// Magnitude (multiplied by the load curve)
    pub value: f64,

    /// Time multiplier
    pub curve: LoadCurve,
}

impl NodalLoad {
    /// Returns the load at time t
    pub fn value(&self, t: f64) -> f64 {
        self.value * self.curve.value(t)
    }
}

/// Holds natural boundary conditions
pub struct Natural {
    /// Concentrated loads
    pub concentrated: Vec<NodalLoad>,
}

impl Natural {
    /// Allocates a new instance
    pub fn new() -> Self {
        Natural {
            concentrated: Vec::new(),
        }
    }

    /// Sets a concentrated load at nodes
    pub fn at(&mut self, nodes: &[usize], dof: Dof, value: f64, curve: LoadCurve) -> &mut Self {
        for node in nodes {
            self.concentrated.push(NodalLoad {
                node: *node,
                dof,
                value,
                curve: curve.clone(),
            });
        }
        self
    }
}

impl fmt::Display for Natural {
    /// Prints a formatted summary of Boundary Conditions
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Concentrated boundary conditions\n").unwrap();
        write!(f, "================================\n").unwrap();
        for load in &self.concentrated {
            write!(f, "{:?} : {} : {:?} × {:?}\n", load.node, load.dof, load.value, load.curve).unwrap();
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
