use crate::base::ParamMaterial;
use crate::StrError;
use russell_lab::{mat_mat_mul, vec_update, Matrix};
use russell_tensor::{Mandel, Tensor2, Tensor4};

/// Holds a node of the hyperelastic material tree
///
/// Stresses are Cauchy stresses and tangents are spatial elasticity tensors, both stored
/// with symmetric Mandel components (xx, yy, zz, √2 xy, √2 yz, √2 zx).
#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    /// Compressible neo-Hookean model
    ///
    /// ```text
    /// σ = μ/J (b - I) + λ ln(J)/J I
    /// ```
    NeoHookean { lambda: f64, mu: f64, young: f64 },

    /// Sum of the components
    Mixture(Vec<Material>),
}

impl Material {
    /// Allocates a new material tree from parameters
    pub fn new(param: &ParamMaterial) -> Result<Self, StrError> {
        match param {
            ParamMaterial::NeoHookean { young, poisson } => {
                if *young <= 0.0 {
                    return Err("Young's modulus must be > 0.0");
                }
                if *poisson <= -1.0 || *poisson >= 0.5 {
                    return Err("Poisson's coefficient must be in (-1.0, 0.5)");
                }
                let (lambda, mu) = ParamMaterial::lame(*young, *poisson);
                Ok(Material::NeoHookean {
                    lambda,
                    mu,
                    young: *young,
                })
            }
            ParamMaterial::Mixture(components) => {
                if components.is_empty() {
                    return Err("mixture must have at least one component");
                }
                let all: Result<Vec<_>, _> = components.iter().map(|p| Material::new(p)).collect();
                Ok(Material::Mixture(all?))
            }
        }
    }

    /// Visits all elastic leaves of the tree
    pub fn for_each_elastic_component<F>(&self, visitor: &mut F)
    where
        F: FnMut(&Material),
    {
        match self {
            Material::Mixture(components) => {
                for c in components {
                    c.for_each_elastic_component(visitor);
                }
            }
            _ => visitor(self),
        }
    }

    /// Computes the Cauchy stress
    ///
    /// # Input
    ///
    /// * `bb` -- left Cauchy-Green tensor b = F Fᵀ (see [left_cauchy_green])
    /// * `jj` -- J = det(F) > 0
    pub fn stress(&self, sigma: &mut Tensor2, bb: &Tensor2, jj: f64) -> Result<(), StrError> {
        sigma.vector_mut().fill(0.0);
        let mut result = Ok(());
        self.for_each_elastic_component(&mut |m: &Material| {
            if let Material::NeoHookean { lambda, mu, .. } = m {
                let a = mu / jj;
                let c = lambda * f64::ln(jj) / jj;
                if let Err(e) = vec_update(sigma.vector_mut(), a, bb.vector()) {
                    result = Err(e);
                }
                for i in 0..3 {
                    sigma.vector_mut()[i] += c - a;
                }
            }
        });
        result
    }

    /// Computes the spatial elasticity tangent given J = det(F)
    ///
    /// ```text
    /// D = λ' I ⊗ I + 2 μ' 𝕀    λ' = λ/J    μ' = (μ - λ ln J)/J
    /// ```
    pub fn tangent(&self, dd: &mut Tensor4, jj: f64) {
        let mat = dd.matrix_mut();
        mat.fill(0.0);
        self.for_each_elastic_component(&mut |m: &Material| {
            if let Material::NeoHookean { lambda, mu, .. } = m {
                let lam = lambda / jj;
                let mu_ = (mu - lambda * f64::ln(jj)) / jj;
                for i in 0..3 {
                    for j in 0..3 {
                        mat.add(i, j, lam);
                    }
                }
                for i in 0..6 {
                    mat.add(i, i, 2.0 * mu_);
                }
            }
        });
    }

    /// Returns the Young's modulus of the undeformed material (sum over components)
    pub fn effective_modulus(&self) -> f64 {
        let mut modulus = 0.0;
        self.for_each_elastic_component(&mut |m: &Material| {
            if let Material::NeoHookean { young, .. } = m {
                modulus += young;
            }
        });
        modulus
    }
}

/// Computes the left Cauchy-Green tensor b = F Fᵀ given the deformation gradient (3×3)
pub fn left_cauchy_green(bb: &mut Tensor2, ff: &Matrix) -> Result<(), StrError> {
    let mut b = Matrix::new(3, 3);
    mat_mat_mul(&mut b, 1.0, ff, &ff.transposed(), 0.0)?;
    for i in 0..3 {
        for j in i..3 {
            bb.sym_set(i, j, b.get(i, j));
        }
    }
    Ok(())
}

/// Allocates a symmetric second-order tensor (stress or strain)
pub(crate) fn new_tensor2() -> Tensor2 {
    Tensor2::new(Mandel::Symmetric)
}

/// Allocates a fourth-order tensor with minor symmetry (elasticity tangent)
pub(crate) fn new_tensor4() -> Tensor4 {
    Tensor4::new(Mandel::Symmetric)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
