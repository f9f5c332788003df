use super::element_solid::set_coordinates;
use super::{ElementTrait, StepFailure};
use crate::base::{Dof, Mesh, ParamDiffusion};
use crate::StrError;
use gemlab::integ::Gauss;
use gemlab::mesh::Cell;
use gemlab::shapes::Scratchpad;
use russell_lab::{mat_mat_mul, mat_vec_mul, vec_mat_mul, vec_update, Matrix, Vector};

/// Implements an element for the linear diffusion of pressure or solute
///
/// The equations are written in the reference configuration:
///
/// ```text
/// f_a  = ∫ (k ∇N_a · ∇φ - s N_a) dV
/// K_ab = ∫ k ∇N_a · ∇N_b dV
/// ```
pub struct ElementDiffusion {
    nodes: Vec<usize>,
    dofs: Vec<Dof>,
    param: ParamDiffusion,

    /// Shape functions at each integration point
    nn: Vec<Vector>,

    /// Reference gradients of the shape functions (nnode × 3) at each integration point
    gg: Vec<Matrix>,

    /// Reference volume element (det(J₀) × weight) at each integration point
    dv: Vec<f64>,
}

impl ElementDiffusion {
    /// Allocates a new instance
    pub fn new(mesh: &Mesh, cell: &Cell, param: &ParamDiffusion) -> Result<Self, StrError> {
        if cell.kind.ndim() != 3 {
            return Err("diffusion element requires a three-dimensional cell");
        }
        if param.conductivity < 0.0 {
            return Err("conductivity must be ≥ 0.0");
        }
        if param.dof.displacement_index().is_some() {
            return Err("diffusion element requires the P or C(i) DOF");
        }
        mesh.dofs.index(param.dof)?;
        let mut pad = Scratchpad::new(3, cell.kind)?;
        set_coordinates(&mut pad, mesh, &cell.points, true);
        let gauss = Gauss::new(cell.kind);
        let ngauss = gauss.npoint();
        let mut nn = Vec::with_capacity(ngauss);
        let mut gg = Vec::with_capacity(ngauss);
        let mut dv = Vec::with_capacity(ngauss);
        for p in 0..ngauss {
            let ksi = gauss.coords(p);
            let det = pad.calc_gradient(ksi)?;
            if det <= 0.0 {
                return Err("reference element is inverted");
            }
            (pad.fn_interp)(&mut pad.interp, ksi);
            nn.push(pad.interp.clone());
            gg.push(pad.gradient.clone());
            dv.push(det * gauss.weight(p));
        }
        Ok(ElementDiffusion {
            nodes: cell.points.clone(),
            dofs: vec![param.dof],
            param: *param,
            nn,
            gg,
            dv,
        })
    }
}

impl ElementTrait for ElementDiffusion {
    fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    fn dofs(&self) -> &[Dof] {
        &self.dofs
    }

    fn symmetric_stiffness(&self) -> bool {
        true
    }

    fn update_stresses(&mut self, _mesh: &Mesh) -> Result<(), StepFailure> {
        Ok(())
    }

    fn calc_internal_force(&self, f_int: &mut Vector, mesh: &Mesh) -> Result<(), StepFailure> {
        f_int.fill(0.0);
        let nnode = self.nodes.len();
        let phi = Vector::from(&self.nodes.iter().map(|n| mesh.nodes[*n].value(self.param.dof)).collect::<Vec<_>>());
        let (k, s) = (self.param.conductivity, self.param.source);
        let mut grad = Vector::new(3);
        let mut flux = Vector::new(nnode);
        for p in 0..self.dv.len() {
            vec_mat_mul(&mut grad, 1.0, &phi, &self.gg[p])?; // ∇φ = Gᵀ φ
            mat_vec_mul(&mut flux, 1.0, &self.gg[p], &grad)?;
            vec_update(f_int, k * self.dv[p], &flux)?;
            vec_update(f_int, -s * self.dv[p], &self.nn[p])?;
        }
        Ok(())
    }

    fn calc_stiffness(&self, kk: &mut Matrix, _mesh: &Mesh) -> Result<(), StepFailure> {
        kk.fill(0.0);
        let k = self.param.conductivity;
        for p in 0..self.dv.len() {
            mat_mat_mul(kk, k * self.dv[p], &self.gg[p], &self.gg[p].transposed(), 1.0)?;
        }
        Ok(())
    }

    fn volume(&self) -> f64 {
        self.dv.iter().sum()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
