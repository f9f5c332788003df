use super::{Dof, LoadCurve, RigidDof};
use std::collections::HashMap;
use std::fmt;

/// Defines an essential boundary condition
#[derive(Clone, Debug, PartialEq)]
pub enum Ebc {
    /// The DOF keeps its current value (zero increment)
    Fixed,

    /// The DOF value is `value × curve(t)`
    Prescribed { value: f64, curve: LoadCurve },
}

impl Ebc {
    /// Returns the prescribed value at time t (zero for Fixed)
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Ebc::Fixed => 0.0,
            Ebc::Prescribed { value, curve } => value * curve.value(t),
        }
    }
}

impl fmt::Display for Ebc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ebc::Fixed => write!(f, "fixed"),
            Ebc::Prescribed { value, curve } => write!(f, "{:?} × {:?}", value, curve),
        }
    }
}

/// Holds essential boundary conditions
pub struct Essential {
    /// Conditions at nodes
    pub all: HashMap<(usize, Dof), Ebc>,

    /// Conditions on rigid bodies
    pub rigid: HashMap<(usize, RigidDof), Ebc>,
}

impl Essential {
    /// Allocates a new instance
    pub fn new() -> Self {
        Essential {
            all: HashMap::new(),
            rigid: HashMap::new(),
        }
    }

    /// Fixes DOFs at nodes
    pub fn fix(&mut self, nodes: &[usize], dofs: &[Dof]) -> &mut Self {
        for node in nodes {
            for dof in dofs {
                self.all.insert((*node, *dof), Ebc::Fixed);
            }
        }
        self
    }

    /// Prescribes the value of a DOF at nodes
    pub fn prescribe(&mut self, nodes: &[usize], dof: Dof, value: f64, curve: LoadCurve) -> &mut Self {
        for node in nodes {
            self.all.insert(
                (*node, dof),
                Ebc::Prescribed {
                    value,
                    curve: curve.clone(),
                },
            );
        }
        self
    }

    /// Fixes DOFs of a rigid body
    pub fn fix_rigid(&mut self, body: usize, dofs: &[RigidDof]) -> &mut Self {
        for dof in dofs {
            self.rigid.insert((body, *dof), Ebc::Fixed);
        }
        self
    }

    /// Prescribes a DOF of a rigid body
    pub fn prescribe_rigid(&mut self, body: usize, dof: RigidDof, value: f64, curve: LoadCurve) -> &mut Self {
        self.rigid.insert((body, dof), Ebc::Prescribed { value, curve });
        self
    }
}

impl fmt::Display for Essential {
    /// Prints a formatted summary of Boundary Conditions
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Essential boundary conditions\n").unwrap();
        write!(f, "=============================\n").unwrap();
        let mut keys: Vec<_> = self.all.keys().collect();
        keys.sort();
        for key in keys {
            write!(f, "{:?} : {} : {}\n", key.0, key.1, self.all[key]).unwrap();
        }
        let mut keys: Vec<_> = self.rigid.keys().collect();
        keys.sort();
        for key in keys {
            write!(f, "body {:?} : {:?} : {}\n", key.0, key.1, self.rigid[key]).unwrap();
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
