use super::material::{left_cauchy_green, new_tensor2, new_tensor4};
use super::{ElementTrait, Material, StepFailure};
use crate::base::{Dof, Mesh, ParamSolid};
use crate::StrError;
use gemlab::integ::Gauss;
use gemlab::mesh::Cell;
use gemlab::shapes::Scratchpad;
use russell_lab::{mat_copy, mat_mat_mul, mat_t_mat_mul, vec_mat_mul, vec_update, Matrix, Vector};
use russell_tensor::{Tensor2, Tensor4};
use std::f64::consts::SQRT_2;

/// Implements a solid element with updated-Lagrangian kinematics
///
/// ```text
/// f   = ∫ Bᵀ σ dv
/// K   = ∫ (Bᵀ D B + (∇N_a · σ · ∇N_b) I) dv
/// ```
///
/// B is the strain-displacement matrix in Mandel components, built from the spatial gradients.
/// The kinematics are computed by `update_stresses` and stored for the force and stiffness.
pub struct ElementSolid {
    /// Cell index
    cell: usize,

    /// Node indices
    nodes: Vec<usize>,

    /// DOFs of each node
    dofs: Vec<Dof>,

    /// Material tree
    material: Material,

    /// Scratchpad holding the current coordinates
    pad: Scratchpad,

    /// Integration points
    gauss: Gauss,

    /// Reference gradients of the shape functions (nnode × 3) at each integration point
    grad0: Vec<Matrix>,

    /// Determinant of the reference Jacobian at each integration point
    det0: Vec<f64>,

    /// Spatial gradients of the shape functions (nnode × 3) at each integration point
    grad: Vec<Matrix>,

    /// Current volume element (det(J) × weight) at each integration point
    dv: Vec<f64>,

    /// Volume ratio J = det(F) at each integration point
    jj: Vec<f64>,

    /// Cauchy stress at each integration point
    pub stresses: Vec<Tensor2>,

    /// Current volume
    volume: f64,
}

impl ElementSolid {
    /// Allocates a new instance
    pub fn new(mesh: &Mesh, cell: &Cell, param: &ParamSolid) -> Result<Self, StrError> {
        if cell.kind.ndim() != 3 {
            return Err("solid element requires a three-dimensional cell");
        }
        let material = Material::new(&param.material)?;
        let mut pad = Scratchpad::new(3, cell.kind)?;
        set_coordinates(&mut pad, mesh, &cell.points, true);
        let gauss = Gauss::new(cell.kind);
        let ngauss = gauss.npoint();
        let mut grad0 = Vec::with_capacity(ngauss);
        let mut det0 = Vec::with_capacity(ngauss);
        let mut volume = 0.0;
        for p in 0..ngauss {
            let det = pad.calc_gradient(gauss.coords(p))?;
            if det <= 0.0 {
                return Err("reference element is inverted");
            }
            grad0.push(pad.gradient.clone());
            det0.push(det);
            volume += det * gauss.weight(p);
        }
        Ok(ElementSolid {
            cell: cell.id,
            nodes: cell.points.clone(),
            dofs: vec![Dof::Ux, Dof::Uy, Dof::Uz],
            material,
            pad,
            grad: grad0.clone(),
            dv: (0..ngauss).map(|p| det0[p] * gauss.weight(p)).collect(),
            jj: vec![1.0; ngauss],
            gauss,
            grad0,
            det0,
            stresses: (0..ngauss).map(|_| new_tensor2()).collect(),
            volume,
        })
    }
}

impl ElementTrait for ElementSolid {
    fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    fn dofs(&self) -> &[Dof] {
        &self.dofs
    }

    fn symmetric_stiffness(&self) -> bool {
        true
    }

    fn update_stresses(&mut self, mesh: &Mesh) -> Result<(), StepFailure> {
        set_coordinates(&mut self.pad, mesh, &self.nodes, false);
        let mut ff = Matrix::new(3, 3);
        let mut bb = new_tensor2();
        self.volume = 0.0;
        for p in 0..self.gauss.npoint() {
            let det = self.pad.calc_gradient(self.gauss.coords(p)).unwrap_or(0.0);
            if det <= 0.0 {
                return Err(StepFailure::NegativeJacobian {
                    element: self.cell,
                    point: p,
                    volume: det,
                });
            }
            mat_copy(&mut self.grad[p], &self.pad.gradient)?;
            mat_mat_mul(&mut ff, 1.0, &self.pad.xxt, &self.grad0[p], 0.0)?;
            left_cauchy_green(&mut bb, &ff)?;
            self.jj[p] = det / self.det0[p];
            self.material.stress(&mut self.stresses[p], &bb, self.jj[p])?;
            self.dv[p] = det * self.gauss.weight(p);
            self.volume += self.dv[p];
        }
        Ok(())
    }

    fn calc_internal_force(&self, f_int: &mut Vector, _mesh: &Mesh) -> Result<(), StepFailure> {
        f_int.fill(0.0);
        let n = f_int.dim();
        let mut bmat = Matrix::new(6, n);
        let mut fp = Vector::new(n);
        for p in 0..self.gauss.npoint() {
            strain_displacement(&mut bmat, &self.grad[p]);
            vec_mat_mul(&mut fp, self.dv[p], self.stresses[p].vector(), &bmat)?;
            vec_update(f_int, 1.0, &fp)?;
        }
        Ok(())
    }

    fn calc_stiffness(&self, kk: &mut Matrix, _mesh: &Mesh) -> Result<(), StepFailure> {
        kk.fill(0.0);
        let (n, _) = kk.dims();
        let nnode = self.nodes.len();
        let mut bmat = Matrix::new(6, n);
        let mut db = Matrix::new(6, n);
        let mut dd: Tensor4 = new_tensor4();
        let mut gs = Matrix::new(nnode, 3);
        let mut gsg = Matrix::new(nnode, nnode);
        for p in 0..self.gauss.npoint() {
            let dv = self.dv[p];

            // material stiffness
            self.material.tangent(&mut dd, self.jj[p]);
            strain_displacement(&mut bmat, &self.grad[p]);
            mat_mat_mul(&mut db, 1.0, dd.matrix(), &bmat, 0.0)?;
            mat_t_mat_mul(kk, dv, &bmat, &db, 1.0)?;

            // geometric stiffness
            let sig = self.stresses[p].as_matrix();
            mat_mat_mul(&mut gs, 1.0, &self.grad[p], &sig, 0.0)?;
            mat_mat_mul(&mut gsg, 1.0, &gs, &self.grad[p].transposed(), 0.0)?;
            for a in 0..nnode {
                for b in 0..nnode {
                    for i in 0..3 {
                        kk.add(3 * a + i, 3 * b + i, gsg.get(a, b) * dv);
                    }
                }
            }
        }
        Ok(())
    }

    fn effective_modulus(&self) -> f64 {
        self.material.effective_modulus()
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Copies the nodal coordinates (reference or current) into the scratchpad
pub(crate) fn set_coordinates(pad: &mut Scratchpad, mesh: &Mesh, nodes: &[usize], reference: bool) {
    for (m, n) in nodes.iter().enumerate() {
        let x = if reference { &mesh.nodes[*n].r0 } else { &mesh.nodes[*n].rt };
        for j in 0..3 {
            pad.set_xx(m, j, x[j]);
        }
    }
}

/// Computes the strain-displacement matrix B (6 × 3·nnode) in Mandel components
fn strain_displacement(bmat: &mut Matrix, grad: &Matrix) {
    let s = 1.0 / SQRT_2;
    for a in 0..grad.nrow() {
        let (g0, g1, g2) = (grad.get(a, 0), grad.get(a, 1), grad.get(a, 2));
        let c = 3 * a;
        bmat.set(0, c, g0);
        bmat.set(1, c + 1, g1);
        bmat.set(2, c + 2, g2);
        bmat.set(3, c, s * g1);
        bmat.set(3, c + 1, s * g0);
        bmat.set(4, c + 1, s * g2);
        bmat.set(4, c + 2, s * g1);
        bmat.set(5, c, s * g2);
        bmat.set(5, c + 2, s * g0);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
