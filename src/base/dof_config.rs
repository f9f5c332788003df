use super::Dof;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Holds the configuration of nodal degrees of freedom
///
/// Every node carries the three displacements followed by the optional fluid pressure and
/// the solute concentrations. The configuration is built once together with the mesh and
/// is shared by reference with the assembler and the element kernels.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DofConfig {
    /// Nodes carry the fluid pressure
    pub pressure: bool,

    /// Number of solutes (concentration DOFs)
    pub n_solute: usize,
}

impl DofConfig {
    /// Allocates a configuration with displacements only
    pub fn solid() -> Self {
        DofConfig {
            pressure: false,
            n_solute: 0,
        }
    }

    /// Allocates a configuration with displacements and pressure
    pub fn biphasic() -> Self {
        DofConfig {
            pressure: true,
            n_solute: 0,
        }
    }

    /// Allocates a configuration with displacements, pressure, and concentrations
    pub fn multiphasic(n_solute: usize) -> Self {
        DofConfig {
            pressure: true,
            n_solute,
        }
    }

    /// Returns the number of DOFs per node
    pub fn ndof(&self) -> usize {
        3 + if self.pressure { 1 } else { 0 } + self.n_solute
    }

    /// Returns all DOFs at a node in their storage order
    pub fn all(&self) -> Vec<Dof> {
        let mut dofs = vec![Dof::Ux, Dof::Uy, Dof::Uz];
        if self.pressure {
            dofs.push(Dof::P);
        }
        for i in 0..self.n_solute {
            dofs.push(Dof::C(i));
        }
        dofs
    }

    /// Returns the storage index of a DOF
    pub fn index(&self, dof: Dof) -> Result<usize, StrError> {
        match dof {
            Dof::Ux => Ok(0),
            Dof::Uy => Ok(1),
            Dof::Uz => Ok(2),
            Dof::P => {
                if self.pressure {
                    Ok(3)
                } else {
                    Err("pressure DOF is not active")
                }
            }
            Dof::C(i) => {
                if i < self.n_solute {
                    Ok(3 + if self.pressure { 1 } else { 0 } + i)
                } else {
                    Err("solute index is out of range")
                }
            }
        }
    }
}

impl fmt::Display for DofConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.all().iter().map(|d| format!("{}", d)).collect();
        write!(f, "{} DOFs per node: {}", self.ndof(), names.join(", "))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
