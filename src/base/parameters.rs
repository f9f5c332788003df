use super::Dof;
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds parameters for the hyperelastic material tree
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum ParamMaterial {
    /// Compressible neo-Hookean model
    NeoHookean {
        /// Young's modulus
        young: f64,

        /// Poisson's coefficient
        poisson: f64,
    },

    /// Sum of the stresses and tangents of the components
    Mixture(Vec<ParamMaterial>),
}

/// Holds parameters for solid media mechanics simulations
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParamSolid {
    /// Intrinsic (real) density
    pub density: f64,

    /// Material model
    pub material: ParamMaterial,
}

/// Holds parameters for diffusion-type problems (pressure or solute transport)
///
/// The balance equation is `∇·(k ∇φ) + s = 0` with φ being the pressure or the concentration.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParamDiffusion {
    /// Field solved by the element (Dof::P or Dof::C(i))
    pub dof: Dof,

    /// Isotropic conductivity (permeability or diffusivity)
    pub conductivity: f64,

    /// Volumetric source term
    pub source: f64,
}

/// Holds parameters for a linear spring
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParamSpring {
    /// Spring stiffness
    pub stiffness: f64,
}

/// Holds parameters for rigid bodies
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParamRigid {
    /// Density
    pub density: f64,
}

impl ParamSolid {
    /// Returns a sample of parameters
    pub fn sample_neo_hookean() -> Self {
        ParamSolid {
            density: 1.0,
            material: ParamMaterial::NeoHookean {
                young: 1000.0,
                poisson: 0.3,
            },
        }
    }
}

impl ParamDiffusion {
    /// Returns a sample of parameters for the pressure field
    pub fn sample_pressure() -> Self {
        ParamDiffusion {
            dof: Dof::P,
            conductivity: 1.0,
            source: 0.0,
        }
    }
}

impl ParamMaterial {
    /// Returns the Lamé parameters (λ, μ) of a neo-Hookean component
    pub fn lame(young: f64, poisson: f64) -> (f64, f64) {
        let lambda = young * poisson / ((1.0 + poisson) * (1.0 - 2.0 * poisson));
        let mu = young / (2.0 * (1.0 + poisson));
        (lambda, mu)
    }
}

/// Holds parameters for contact interfaces (sliding surfaces and rigid walls)
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParamContact {
    /// Penalty factor (scaled by E·A/V when `auto_penalty` is set)
    pub penalty: f64,

    /// Scale the penalty with the modulus, area, and volume of the elements under the surface
    pub auto_penalty: bool,

    /// Run a second pass with slave and master swapped
    pub two_pass: bool,

    /// Use augmented Lagrangian multipliers (pure penalty otherwise)
    pub augmented: bool,

    /// Relative tolerance on the norm of the multipliers (≤ 0 disables the check)
    pub atol: f64,

    /// Tolerance on the maximum penetration (≤ 0 disables the check)
    pub gtol: f64,

    /// Minimum number of augmentations
    pub naugmin: usize,

    /// Maximum number of augmentations
    pub naugmax: usize,

    /// Projections with a gap below `-search_radius` are rejected
    pub search_radius: f64,

    /// Tolerance on the natural coordinates when projecting onto a facet
    pub stol: f64,

    /// Number of iterations between global searches (zero means only when needed)
    pub segment_update_period: usize,

    /// Gap offset (shell thickness or initial separation)
    pub offset: f64,

    /// Coulomb friction coefficient μ (zero means frictionless)
    pub friction: f64,

    /// Penalty on the tangential slip (≤ 0 means the same as the normal penalty)
    pub friction_penalty: f64,
}

impl ParamContact {
    /// Allocates parameters with default values
    pub fn new(penalty: f64) -> Self {
        ParamContact {
            penalty,
            auto_penalty: false,
            two_pass: false,
            augmented: false,
            atol: 0.1,
            gtol: 0.0,
            naugmin: 0,
            naugmax: 10,
            search_radius: 1.0,
            stol: 0.01,
            segment_update_period: 0,
            offset: 0.0,
            friction: 0.0,
            friction_penalty: 0.0,
        }
    }

    /// Validates the parameters
    pub fn validate(&self) -> Result<(), StrError> {
        if self.penalty <= 0.0 {
            return Err("penalty must be > 0.0");
        }
        if self.search_radius <= 0.0 {
            return Err("search radius must be > 0.0");
        }
        if self.stol < 0.0 {
            return Err("stol must be ≥ 0.0");
        }
        if self.naugmax < self.naugmin {
            return Err("naugmax must be ≥ naugmin");
        }
        if self.friction < 0.0 {
            return Err("friction coefficient must be ≥ 0.0");
        }
        Ok(())
    }
}

/// Holds parameters for linear and point constraints
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParamConstraint {
    /// Penalty factor
    pub penalty: f64,

    /// Use augmented Lagrangian multipliers (pure penalty otherwise)
    pub augmented: bool,

    /// Relative tolerance on the norm of the multipliers
    pub tol: f64,

    /// Maximum number of augmentations
    pub naugmax: usize,
}

impl ParamConstraint {
    /// Allocates parameters with default values
    pub fn new(penalty: f64) -> Self {
        ParamConstraint {
            penalty,
            augmented: false,
            tol: 0.01,
            naugmax: 50,
        }
    }

    /// Validates the parameters
    pub fn validate(&self) -> Result<(), StrError> {
        if self.penalty <= 0.0 {
            return Err("penalty must be > 0.0");
        }
        if self.tol <= 0.0 {
            return Err("augmentation tolerance must be > 0.0");
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
