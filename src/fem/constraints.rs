use super::element_solid::set_coordinates;
use super::{Constraint, StepFailure};
use crate::base::{assemble_matrix, assemble_vector, local_to_global, Assembler, Dof, EqId, GlobalMatrix};
use crate::base::{GlobalResidual, Mesh, ParamConstraint, RigidBody, StiffnessProfile};
use crate::StrError;
use gemlab::shapes::{GeoKind, Scratchpad};
use russell_lab::{mat_inverse, mat_mat_mul, mat_t_mat_mul, mat_vec_mul, vec_add, vec_mat_mul, vec_norm};
use russell_lab::{vec_outer, vec_update, Matrix, Norm, Vector};
use serde::{Deserialize, Serialize};

/// Maximum number of Newton iterations to find the natural coordinates of a point
const NIT_MAX: usize = 20;

/// Tolerance on the natural coordinates of a point inside a cell
const KSI_TOL: f64 = 1e-8;

/// Decides whether the augmentations of a constraint have converged
///
/// `norm0` and `norm1` are the norms of the multipliers before and after the update.
fn augmentation_converged(param: &ParamConstraint, norm0: f64, norm1: f64, naug: usize) -> Result<bool, StepFailure> {
    let pctn = if norm1 > 0.0 { f64::abs((norm1 - norm0) / norm1) } else { 0.0 };
    let converged = pctn < param.tol;
    log::debug!("constraint augmentation {}: multipliers {:.3e} → {:.3e}", naug, norm0, norm1);
    if !converged && naug >= param.naugmax {
        return Err(StepFailure::AugmentationLimit { augmentations: naug });
    }
    Ok(converged)
}

/// Enforces a linear relation between nodal DOFs
///
/// ```text
/// h = Σ cᵢ uᵢ = 0
/// f_int = (λ + ε h) c      K = ε c cᵀ      λ ← λ + ε h
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LinearConstraint {
    /// Parameters
    pub param: ParamConstraint,

    /// Terms (node, dof, coefficient)
    pub terms: Vec<(usize, Dof, f64)>,

    /// Lagrange multiplier
    pub lm: f64,

    /// Current value of h
    value: f64,
}

impl LinearConstraint {
    /// Allocates a new instance
    pub fn new(param: ParamConstraint, terms: &[(usize, Dof, f64)]) -> Result<Self, StrError> {
        param.validate()?;
        if terms.is_empty() {
            return Err("linear constraint must have at least one term");
        }
        if terms.iter().all(|(_, _, c)| *c == 0.0) {
            return Err("linear constraint coefficients must not be all zero");
        }
        Ok(LinearConstraint {
            param,
            terms: terms.to_vec(),
            lm: 0.0,
            value: 0.0,
        })
    }

    /// Returns the current value of h = Σ cᵢ uᵢ
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the equation ids of the terms
    fn equations(&self, mesh: &Mesh) -> Result<Vec<EqId>, StrError> {
        self.terms.iter().map(|(node, dof, _)| mesh.equation(*node, *dof)).collect()
    }

    /// Returns the vector of coefficients
    fn coefficients(&self) -> Vector {
        Vector::from(&self.terms.iter().map(|(_, _, c)| *c).collect::<Vec<_>>())
    }
}

impl Constraint for LinearConstraint {
    fn update(&mut self, mesh: &Mesh, _iteration: usize) -> Result<(), StrError> {
        let mut value = 0.0;
        for (node, dof, c) in &self.terms {
            let n = mesh.nodes.get(*node).ok_or("node index is out of range")?;
            value += c * n.value(*dof);
        }
        self.value = value;
        Ok(())
    }

    fn generation(&self) -> usize {
        0
    }

    fn symmetric(&self) -> bool {
        true
    }

    fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError> {
        let equations: Vec<usize> = self.equations(assembler.mesh)?.iter().filter_map(|id| id.free()).collect();
        profile.add(&equations);
        Ok(())
    }

    fn assemble_residual(&self, assembler: &Assembler, out: &mut GlobalResidual) -> Result<(), StrError> {
        let lm = self.equations(assembler.mesh)?;
        let c = self.coefficients();
        let mut f_int = Vector::new(c.dim());
        vec_update(&mut f_int, self.lm + self.param.penalty * self.value, &c)?;
        assemble_vector(&mut out.rr, &mut out.rr_prescribed, &f_int, &lm, -1.0);
        Ok(())
    }

    fn assemble_stiffness(
        &self,
        assembler: &Assembler,
        kk: &mut GlobalMatrix,
        fd: &mut Vector,
        dup: &Vector,
    ) -> Result<(), StrError> {
        let lm = self.equations(assembler.mesh)?;
        let c = self.coefficients();
        let mut kk_local = Matrix::new(c.dim(), c.dim());
        vec_outer(&mut kk_local, self.param.penalty, &c, &c)?;
        assemble_matrix(kk, fd, &kk_local, &lm, dup)
    }

    fn augmented(&self) -> bool {
        self.param.augmented
    }

    fn augment(&mut self, naug: usize) -> Result<bool, StepFailure> {
        if !self.param.augmented {
            return Ok(true);
        }
        let lm = self.lm + self.param.penalty * self.value;
        let converged = augmentation_converged(&self.param, f64::abs(self.lm), f64::abs(lm), naug)?;
        if !converged {
            self.lm = lm;
        }
        Ok(converged)
    }

    fn commit(&mut self) {}
}

/// Ties a node to the material point of a Hex8 cell that coincides with it initially
///
/// With N_b the shape functions of the cell at the natural coordinates ξ of the point:
///
/// ```text
/// g = x - Σ N_b x_b      G = [I, -N_b I]
/// f_int = Gᵀ (λ + ε g)   K = ε Gᵀ G      λ ← λ + ε g
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PointConstraint {
    /// Parameters
    pub param: ParamConstraint,

    /// Constrained node
    pub node: usize,

    /// Cell containing the node
    pub cell: usize,

    /// Natural coordinates of the node in the cell
    pub ksi: [f64; 3],

    /// Lagrange multipliers
    pub lm: [f64; 3],

    /// The constrained node followed by the nodes of the cell
    nodes: Vec<usize>,

    /// Shape functions at ξ
    nn: Vec<f64>,

    /// Current gap
    gap: [f64; 3],
}

impl PointConstraint {
    /// Allocates a new instance
    ///
    /// The natural coordinates are found from the reference configuration.
    pub fn new(param: ParamConstraint, mesh: &Mesh, node: usize, cell: usize) -> Result<Self, StrError> {
        param.validate()?;
        let cell_ref = mesh.cells.get(cell).ok_or("cell index is out of range")?;
        if cell_ref.kind != GeoKind::Hex8 {
            return Err("point constraint requires a Hex8 cell");
        }
        let x = Vector::from(&mesh.nodes.get(node).ok_or("node index is out of range")?.r0);
        if cell_ref.points.contains(&node) {
            return Err("constrained node must not belong to the cell");
        }
        let mut pad = Scratchpad::new(3, GeoKind::Hex8)?;
        set_coordinates(&mut pad, mesh, &cell_ref.points, true);
        let ksi = natural_coordinates(&mut pad, &x, mesh.size())?;
        if ksi.iter().any(|k| f64::abs(*k) > 1.0 + KSI_TOL) {
            return Err("constrained node is outside the cell");
        }
        (pad.fn_interp)(&mut pad.interp, &ksi);
        let mut nodes = vec![node];
        nodes.extend_from_slice(&cell_ref.points);
        Ok(PointConstraint {
            param,
            node,
            cell,
            ksi,
            lm: [0.0; 3],
            nodes,
            nn: pad.interp.as_data().clone(),
            gap: [0.0; 3],
        })
    }

    /// Returns the current gap between the node and the material point
    pub fn gap(&self) -> [f64; 3] {
        self.gap
    }

    /// Returns the local internal force and stiffness (27 entries)
    pub fn local_contribution(&self) -> Result<(Vector, Matrix), StrError> {
        let n = 3 * self.nodes.len();
        let mut gg = Matrix::new(3, n);
        for i in 0..3 {
            gg.set(i, i, 1.0);
            for (b, nb) in self.nn.iter().enumerate() {
                gg.set(i, 3 + 3 * b + i, -nb);
            }
        }
        let eps = self.param.penalty;
        let traction = Vector::from(&[
            self.lm[0] + eps * self.gap[0],
            self.lm[1] + eps * self.gap[1],
            self.lm[2] + eps * self.gap[2],
        ]);
        let mut f_int = Vector::new(n);
        vec_mat_mul(&mut f_int, 1.0, &traction, &gg)?;
        let mut kk = Matrix::new(n, n);
        mat_t_mat_mul(&mut kk, eps, &gg, &gg, 0.0)?;
        Ok((f_int, kk))
    }
}

impl Constraint for PointConstraint {
    fn update(&mut self, mesh: &Mesh, _iteration: usize) -> Result<(), StrError> {
        let mut gap = mesh.nodes[self.node].rt;
        for (b, nb) in self.nn.iter().enumerate() {
            let x = &mesh.nodes[self.nodes[1 + b]].rt;
            for i in 0..3 {
                gap[i] -= nb * x[i];
            }
        }
        self.gap = gap;
        Ok(())
    }

    fn generation(&self) -> usize {
        0
    }

    fn symmetric(&self) -> bool {
        true
    }

    fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError> {
        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        let lm = local_to_global(assembler.mesh, &self.nodes, &dofs)?;
        assembler.profile(profile, &self.nodes, &dofs, &lm);
        Ok(())
    }

    fn assemble_residual(&self, assembler: &Assembler, out: &mut GlobalResidual) -> Result<(), StrError> {
        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        let lm = local_to_global(assembler.mesh, &self.nodes, &dofs)?;
        let (f_int, _) = self.local_contribution()?;
        assembler.vector(out, &self.nodes, &dofs, &lm, &f_int, -1.0)
    }

    fn assemble_stiffness(
        &self,
        assembler: &Assembler,
        kk: &mut GlobalMatrix,
        fd: &mut Vector,
        dup: &Vector,
    ) -> Result<(), StrError> {
        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        let lm = local_to_global(assembler.mesh, &self.nodes, &dofs)?;
        let (_, kk_local) = self.local_contribution()?;
        assembler.matrix(kk, fd, &self.nodes, &dofs, &lm, &kk_local, dup)
    }

    fn augmented(&self) -> bool {
        self.param.augmented
    }

    fn augment(&mut self, naug: usize) -> Result<bool, StepFailure> {
        if !self.param.augmented {
            return Ok(true);
        }
        let mut lm = self.lm;
        for i in 0..3 {
            lm[i] += self.param.penalty * self.gap[i];
        }
        let norm0 = vec_norm(&Vector::from(&self.lm), Norm::Euc);
        let norm1 = vec_norm(&Vector::from(&lm), Norm::Euc);
        let converged = augmentation_converged(&self.param, norm0, norm1, naug)?;
        if !converged {
            self.lm = lm;
        }
        Ok(converged)
    }

    fn commit(&mut self) {}
}

/// Finds the natural coordinates ξ such that x(ξ) = x by Newton iterations
fn natural_coordinates(pad: &mut Scratchpad, x: &Vector, size: f64) -> Result<[f64; 3], StrError> {
    let tol = 1e-12 * f64::max(1.0, size);
    let mut ksi = Vector::new(3);
    let mut y = Vector::new(3);
    let mut r = Vector::new(3);
    let mut jj = Matrix::new(3, 3);
    let mut ji = Matrix::new(3, 3);
    let mut dk = Vector::new(3);
    for _ in 0..NIT_MAX {
        (pad.fn_interp)(&mut pad.interp, ksi.as_data());
        mat_vec_mul(&mut y, 1.0, &pad.xxt, &pad.interp)?;
        vec_add(&mut r, 1.0, x, -1.0, &y)?;
        if vec_norm(&r, Norm::Euc) < tol {
            return Ok([ksi[0], ksi[1], ksi[2]]);
        }
        (pad.fn_deriv)(&mut pad.deriv, ksi.as_data());
        mat_mat_mul(&mut jj, 1.0, &pad.xxt, &pad.deriv, 0.0)?;
        mat_inverse(&mut ji, &jj)?;
        mat_vec_mul(&mut dk, 1.0, &ji, &r)?;
        vec_update(&mut ksi, 1.0, &dk)?;
    }
    Err("cannot find the natural coordinates of the constrained node")
}

/// Defines the nodal constraints
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum NodalConstraint {
    /// Linear relation between nodal DOFs
    Linear(LinearConstraint),

    /// Node tied to a material point of a cell
    Point(PointConstraint),
}

impl NodalConstraint {
    /// Checks the constraint against the numbered mesh
    ///
    /// Linear constraints must refer to active DOFs of deformable nodes.
    pub fn validate(&self, mesh: &Mesh, bodies: &[RigidBody]) -> Result<(), StrError> {
        if let NodalConstraint::Linear(c) = self {
            for (node, dof, _) in &c.terms {
                mesh.equation(*node, *dof)?;
                if bodies.iter().any(|b| b.nodes.contains(node)) {
                    return Err("linear constraint cannot act on the nodes of a rigid body");
                }
            }
        }
        Ok(())
    }

    /// Returns the constraint as a trait object
    pub fn actual(&self) -> &dyn Constraint {
        match self {
            NodalConstraint::Linear(c) => c,
            NodalConstraint::Point(c) => c,
        }
    }

    /// Returns the constraint as a mutable trait object
    pub fn actual_mut(&mut self) -> &mut dyn Constraint {
        match self {
            NodalConstraint::Linear(c) => c,
            NodalConstraint::Point(c) => c,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
