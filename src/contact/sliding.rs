use super::{project_surface, AugmentationNorms, ContactPoint, ContactSurface, FacetShape, PointStatus};
use crate::base::{local_to_global, Assembler, Dof, GlobalMatrix, GlobalResidual, Mesh, ParamContact};
use crate::base::StiffnessProfile;
use crate::fem::{Elements, StepFailure};
use crate::StrError;
use rayon::prelude::*;
use russell_lab::{mat_add, mat_inverse, mat_mat_mul, mat_t_mat_mul, mat_update, vec_add, vec_inner};
use russell_lab::{vec_mat_mul, vec_outer, vec_outer_update, vec_update, Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Holds the local contribution of a contact point
pub(crate) struct LocalContact {
    /// Nodes: the slave node followed by the master nodes (if any)
    pub nodes: Vec<usize>,

    /// Internal force (the negative of the contact force)
    pub f_int: Vector,

    /// Stiffness
    pub kk: Matrix,
}

/// Computes the gradient N and the Hessian H of the gap with respect to the DOFs of
/// the slave node and the four master nodes (15 entries)
///
/// With ν the unit normal, τ_α the tangents, N_b the shape functions at the projection, and
/// g the geometric gap:
///
/// ```text
/// N   = [ν; -N_b ν]
/// T_α = [τ_α; -N_b τ_α]      N_α = [0; N_b,α ν]
/// m_αβ = τ_α·τ_β             κ_αβ = ν·y,αβ         A = m - g κ
/// D_γ = A⁻¹_γβ (T_β + g N_β)
/// H = -m^αβ T_β N_αᵀ - m^αβ κ_αγ T_β D_γᵀ - N_α D_αᵀ
/// ```
pub(crate) fn gap_derivatives(
    shape: &mut FacetShape,
    xs: &Vector,
    xf: &[[f64; 3]; 4],
    rs: [f64; 2],
) -> Result<(Vector, Matrix), StrError> {
    shape.set_coordinates(xf);
    let y = shape.calc_position(rs)?;
    let nn = shape.calc_interp(rs).clone();
    shape.calc_tangents(rs)?;
    let tau = [shape.tangent(0), shape.tangent(1)];
    let (nu, _) = shape.normal()?;
    let y_rs = shape.twist()?;
    let dnn = shape.deriv();
    let mut d = Vector::new(3);
    vec_add(&mut d, 1.0, xs, -1.0, &y)?;
    let g = vec_inner(&d, &nu);

    let mut nvec = Vector::new(15);
    let mut tt = [Vector::new(15), Vector::new(15)];
    let mut na = [Vector::new(15), Vector::new(15)];
    for i in 0..3 {
        nvec[i] = nu[i];
        tt[0][i] = tau[0][i];
        tt[1][i] = tau[1][i];
        for b in 0..4 {
            let k = 3 + 3 * b + i;
            nvec[k] = -nn[b] * nu[i];
            for a in 0..2 {
                tt[a][k] = -nn[b] * tau[a][i];
                na[a][k] = dnn.get(b, a) * nu[i];
            }
        }
    }

    let mut m = Matrix::new(2, 2);
    for a in 0..2 {
        for b in 0..2 {
            m.set(a, b, vec_inner(&tau[a], &tau[b]));
        }
    }
    let k12 = vec_inner(&nu, &y_rs);
    let kappa = Matrix::from(&[[0.0, k12], [k12, 0.0]]);
    let mut mi = Matrix::new(2, 2);
    mat_inverse(&mut mi, &m)?;
    let mut aa = Matrix::new(2, 2);
    mat_add(&mut aa, 1.0, &m, -g, &kappa)?;
    let mut ai = Matrix::new(2, 2);
    mat_inverse(&mut ai, &aa)?;
    let mut dd = [Vector::new(15), Vector::new(15)];
    let mut tmp = Vector::new(15);
    for b in 0..2 {
        vec_add(&mut tmp, 1.0, &tt[b], g, &na[b])?;
        for c in 0..2 {
            vec_update(&mut dd[c], ai.get(c, b), &tmp)?;
        }
    }

    let mut hh = Matrix::new(15, 15);
    for a in 0..2 {
        vec_outer_update(&mut hh, -1.0, &na[a], &dd[a])?;
        for b in 0..2 {
            vec_outer_update(&mut hh, -mi.get(a, b), &tt[b], &na[a])?;
            for c in 0..2 {
                let coef = mi.get(a, b) * kappa.get(a, c);
                if coef != 0.0 {
                    vec_outer_update(&mut hh, -coef, &tt[b], &dd[c])?;
                }
            }
        }
    }
    Ok((nvec, hh))
}

/// Computes the local contribution of a closed point with positive traction
///
/// ```text
/// f_int = -w tₙ N        K = w ε N Nᵀ - w tₙ H
/// ```
pub(crate) fn local_contact(
    weight: f64,
    eps: f64,
    traction: f64,
    nvec: &Vector,
    hh: Option<&Matrix>,
) -> Result<(Vector, Matrix), StrError> {
    let n = nvec.dim();
    let mut f_int = Vector::new(n);
    let mut kk = Matrix::new(n, n);
    vec_update(&mut f_int, -weight * traction, nvec)?;
    vec_outer(&mut kk, weight * eps, nvec, nvec)?;
    if let Some(h) = hh {
        mat_update(&mut kk, -weight * traction, h)?;
    }
    Ok((f_int, kk))
}

/// Adds the friction contribution of a closed point
///
/// With G = [I, -N₀ I, …, -N₃ I] (3 × 15) mapping the nodal motions to the relative motion of
/// the slave node, and P = I - ν ⊗ ν:
///
/// ```text
/// f_int += -w Gᵀ tₜ        K += w εf r Gᵀ P G
/// ```
///
/// where r is one when sticking and μ tₙ/|t*| when slipping (see [ContactPoint::friction_traction]).
/// The variation of the shape functions and of the normal is neglected in the stiffness.
pub(crate) fn local_friction(
    point: &ContactPoint,
    nn: &Vector,
    mu: f64,
    epsf: f64,
    f_int: &mut Vector,
    kk: Option<&mut Matrix>,
) -> Result<(), StrError> {
    let eps = if epsf > 0.0 { epsf } else { point.eps };
    let (tt, ratio) = point.friction_traction(mu, eps);
    if ratio <= 0.0 {
        return Ok(());
    }
    let n = f_int.dim();
    let mut gg = Matrix::new(3, n);
    for i in 0..3 {
        gg.set(i, i, 1.0);
        for b in 0..nn.dim() {
            gg.set(i, 3 + 3 * b + i, -nn[b]);
        }
    }
    let mut ft = Vector::new(n);
    vec_mat_mul(&mut ft, -point.weight, &Vector::from(&tt), &gg)?;
    vec_update(f_int, 1.0, &ft)?;
    if let Some(kk) = kk {
        let nu = Vector::from(&point.normal);
        let mut pp = Matrix::identity(3);
        vec_outer_update(&mut pp, -1.0, &nu, &nu)?;
        let mut pg = Matrix::new(3, n);
        mat_mat_mul(&mut pg, 1.0, &pp, &gg, 0.0)?;
        mat_t_mat_mul(kk, point.weight * eps * ratio, &gg, &pg, 1.0)?;
    }
    Ok(())
}

/// Implements a sliding interface between two deformable (or rigid) surfaces
///
/// Slave nodes are projected onto the master facets and the non-penetration constraint is
/// enforced with a penalty, optionally augmented with Lagrange multipliers. With `two_pass`,
/// the roles of the surfaces are also swapped and both contributions are added. With
/// `friction > 0`, Coulomb friction is enforced with a penalty on the slip.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SlidingInterface {
    /// Parameters
    pub param: ParamContact,

    /// Slave surface
    pub slave: ContactSurface,

    /// Master surface
    pub master: ContactSurface,

    /// Incremented whenever a contact pair is created, removed, or moved to another facet
    pub generation: usize,
}

impl SlidingInterface {
    /// Allocates a new instance
    pub fn new(param: ParamContact, slave: ContactSurface, master: ContactSurface) -> Result<Self, StrError> {
        param.validate()?;
        Ok(SlidingInterface {
            param,
            slave,
            master,
            generation: 0,
        })
    }

    /// Computes the penalty factors and the initial projections
    pub fn initialize(&mut self, mesh: &Mesh, elements: &Elements) -> Result<(), StrError> {
        self.slave.set_penalty(&self.param, mesh, elements)?;
        self.master.set_penalty(&self.param, mesh, elements)?;
        self.update(mesh, 0)
    }

    /// Returns whether the projections must be searched globally at the given iteration
    pub fn global_search(&self, iteration: usize) -> bool {
        let period = self.param.segment_update_period;
        period > 0 && iteration % period == 0
    }

    /// Updates the projections (after the nodal positions have changed)
    pub fn update(&mut self, mesh: &Mesh, iteration: usize) -> Result<(), StrError> {
        let global = self.global_search(iteration);
        let mut changed = project_surface(&mut self.slave, &self.master, mesh, &self.param, global)?;
        if self.param.two_pass {
            changed |= project_surface(&mut self.master, &self.slave, mesh, &self.param, global)?;
        }
        if changed {
            self.generation += 1;
        }
        Ok(())
    }

    /// Returns the (slave, master) pairs of each pass
    fn passes(&self) -> Vec<(&ContactSurface, &ContactSurface)> {
        if self.param.two_pass {
            vec![(&self.slave, &self.master), (&self.master, &self.slave)]
        } else {
            vec![(&self.slave, &self.master)]
        }
    }

    /// Computes the local contributions of all closed points (in parallel)
    pub(crate) fn local_contributions(&self, mesh: &Mesh, with_stiffness: bool) -> Result<Vec<LocalContact>, StrError> {
        let (mu, epsf) = (self.param.friction, self.param.friction_penalty);
        let mut all = Vec::new();
        for (slave, master) in self.passes() {
            let local: Vec<LocalContact> = slave
                .points
                .par_iter()
                .map_init(FacetShape::new, |shape, point| -> Result<Option<LocalContact>, StrError> {
                    let shape = shape.as_mut().map_err(|e| *e)?;
                    let traction = point.traction();
                    if traction <= 0.0 {
                        return Ok(None);
                    }
                    let facet = match point.master.and_then(|r| master.resolve(r)) {
                        Some(f) => f,
                        None => return Ok(None),
                    };
                    let xf = master.coordinates(mesh, facet);
                    let xs = Vector::from(&mesh.nodes[point.node].rt);
                    let (nvec, hh) = gap_derivatives(shape, &xs, &xf, point.rs)?;
                    let hh = if with_stiffness { Some(&hh) } else { None };
                    let (mut f_int, mut kk) = local_contact(point.weight, point.eps, traction, &nvec, hh)?;
                    if mu > 0.0 {
                        let nn = shape.calc_interp(point.rs);
                        let kk = if with_stiffness { Some(&mut kk) } else { None };
                        local_friction(point, nn, mu, epsf, &mut f_int, kk)?;
                    }
                    let mut nodes = vec![point.node];
                    nodes.extend_from_slice(&master.facets[facet]);
                    Ok(Some(LocalContact { nodes, f_int, kk }))
                })
                .filter_map(|r| r.transpose())
                .collect::<Result<_, StrError>>()?;
            all.extend(local);
        }
        Ok(all)
    }

    /// Adds the equations of all contact pairs to the stiffness profile
    pub fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError> {
        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        for (slave, master) in self.passes() {
            for point in &slave.points {
                if point.status != PointStatus::Closed {
                    continue;
                }
                if let Some(facet) = point.master.and_then(|r| master.resolve(r)) {
                    let mut nodes = vec![point.node];
                    nodes.extend_from_slice(&master.facets[facet]);
                    let lm = local_to_global(assembler.mesh, &nodes, &dofs)?;
                    assembler.profile(profile, &nodes, &dofs, &lm);
                }
            }
        }
        Ok(())
    }

    /// Performs an augmentation
    ///
    /// Returns true if the augmentations have converged. The multipliers are updated only if
    /// not converged.
    pub fn augment(&mut self, naug: usize) -> Result<bool, StepFailure> {
        if !self.param.augmented {
            return Ok(true);
        }
        let mut norms = AugmentationNorms::default();
        self.slave.augmentation_norms(&mut norms);
        if self.param.two_pass {
            self.master.augmentation_norms(&mut norms);
        }
        let converged = norms.converged(&self.param, naug)?;
        if !converged {
            self.slave.update_multipliers();
            if self.param.two_pass {
                self.master.update_multipliers();
            }
        }
        Ok(converged)
    }

    /// Returns the resultant contact force (normal and friction) acting on the slave surface
    pub fn force(&self) -> [f64; 3] {
        let mut total = [0.0; 3];
        for point in &self.slave.points {
            let tn = point.traction();
            let epsf = if self.param.friction_penalty > 0.0 {
                self.param.friction_penalty
            } else {
                point.eps
            };
            let (tt, _) = point.friction_traction(self.param.friction, epsf);
            for i in 0..3 {
                total[i] += point.weight * (tn * point.normal[i] + tt[i]);
            }
        }
        total
    }

    /// Stores the current projections and friction tractions as the start of the next time step
    pub fn commit(&mut self) {
        let (mu, epsf) = (self.param.friction, self.param.friction_penalty);
        self.slave.commit(mu, epsf);
        self.master.commit(mu, epsf);
    }
}

/// Assembles local contact contributions into the global residual
pub(crate) fn assemble_residual(
    local: &[LocalContact],
    assembler: &Assembler,
    out: &mut GlobalResidual,
) -> Result<(), StrError> {
    let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
    for c in local {
        let lm = local_to_global(assembler.mesh, &c.nodes, &dofs)?;
        assembler.vector(out, &c.nodes, &dofs, &lm, &c.f_int, -1.0)?;
    }
    Ok(())
}

/// Assembles local contact stiffness matrices into the global matrix
pub(crate) fn assemble_stiffness(
    local: &[LocalContact],
    assembler: &Assembler,
    kk: &mut GlobalMatrix,
    fd: &mut Vector,
    dup: &Vector,
) -> Result<(), StrError> {
    let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
    for c in local {
        let lm = local_to_global(assembler.mesh, &c.nodes, &dofs)?;
        assembler.matrix(kk, fd, &c.nodes, &dofs, &lm, &c.kk, dup)?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
