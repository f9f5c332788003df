use super::{ParamDiffusion, ParamRigid, ParamSolid, ParamSpring};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines degrees-of-freedom (DOF) types
///
/// Note: The declaration order assists in sorting the DOFs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Dof {
    /// Displacement along the first dimension
    Ux,

    /// Displacement along the second dimension
    Uy,

    /// Displacement along the third dimension
    Uz,

    /// Fluid pressure
    P,

    /// Concentration of the i-th solute
    C(usize),
}

impl Dof {
    /// Returns the displacement component (0, 1, or 2) or None if this is not a displacement DOF
    pub fn displacement_index(&self) -> Option<usize> {
        match self {
            Dof::Ux => Some(0),
            Dof::Uy => Some(1),
            Dof::Uz => Some(2),
            _ => None,
        }
    }

    /// Returns the displacement DOF corresponding to the component index
    pub fn displacement(index: usize) -> Result<Self, StrError> {
        match index {
            0 => Ok(Dof::Ux),
            1 => Ok(Dof::Uy),
            2 => Ok(Dof::Uz),
            _ => Err("displacement index must be 0, 1, or 2"),
        }
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dof::C(i) => write!(f, "C{}", i),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Holds element type and parameters
///
/// The type tag selects the element kernel allocated by the element registry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Etype {
    /// Large-deformation solid
    Solid(ParamSolid),

    /// Linear diffusion of pressure or solute
    Diffusion(ParamDiffusion),

    /// Linear spring connecting two nodes
    Spring(ParamSpring),

    /// Cells whose nodes move as a rigid body
    Rigid(ParamRigid),
}

impl Etype {
    /// Returns the name of the element type
    pub fn name(&self) -> &'static str {
        match self {
            Etype::Solid(..) => "Solid",
            Etype::Diffusion(..) => "Diffusion",
            Etype::Spring(..) => "Spring",
            Etype::Rigid(..) => "Rigid",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Dof, Etype};
    use crate::base::{ParamRigid, ParamSpring};
    use std::collections::HashSet;

    #[test]
    fn dof_derive_works() {
        let dof = Dof::C(1);
        let clone = dof.clone();
        assert_eq!(dof, clone);
        assert_eq!(format!("{:?}", dof), "C(1)");
        assert_eq!(format!("{}", dof), "C1");
        assert_eq!(format!("{}", Dof::P), "P");

        let mut set = HashSet::new();
        set.insert(Dof::Ux);
        set.insert(Dof::Ux);
        assert_eq!(set.len(), 1);

        let mut dofs = vec![Dof::C(1), Dof::P, Dof::Uz, Dof::C(0), Dof::Ux];
        dofs.sort();
        assert_eq!(dofs, &[Dof::Ux, Dof::Uz, Dof::P, Dof::C(0), Dof::C(1)]);
    }

    #[test]
    fn displacement_index_works() {
        assert_eq!(Dof::Ux.displacement_index(), Some(0));
        assert_eq!(Dof::Uy.displacement_index(), Some(1));
        assert_eq!(Dof::Uz.displacement_index(), Some(2));
        assert_eq!(Dof::P.displacement_index(), None);
        assert_eq!(Dof::C(3).displacement_index(), None);
        assert_eq!(Dof::displacement(2), Ok(Dof::Uz));
        assert_eq!(Dof::displacement(3).err(), Some("displacement index must be 0, 1, or 2"));
    }

    #[test]
    fn etype_works() {
        assert_eq!(Etype::Spring(ParamSpring { stiffness: 1.0 }).name(), "Spring");
        assert_eq!(Etype::Rigid(ParamRigid { density: 1.0 }).name(), "Rigid");
    }
}
