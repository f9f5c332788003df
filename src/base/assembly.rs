use super::{Dof, EqId, GlobalMatrix, Mesh, RigidBody, StiffnessProfile};
use crate::StrError;
use russell_lab::{mat_mat_mul, mat_t_mat_mul, vec_mat_mul, Matrix, Vector};

/// Computes the local-to-global map of an element (node-major, then `dofs` order)
pub fn local_to_global(mesh: &Mesh, nodes: &[usize], dofs: &[Dof]) -> Result<Vec<EqId>, StrError> {
    let mut lm = Vec::with_capacity(nodes.len() * dofs.len());
    for node in nodes {
        for dof in dofs {
            lm.push(mesh.equation(*node, *dof)?);
        }
    }
    Ok(lm)
}

/// Assembles local vector into global vector
///
/// # Output
///
/// * `rr` -- is the global residual R with length = `n_equation`
/// * `rr_prescribed` -- receives the contributions to prescribed DOFs (length = `n_prescribed`)
///
/// # Input
///
/// * `f_local` -- is the local vector with length = `lm.len()`
/// * `lm` -- holds the equation ids of the local entries
/// * `alpha` -- multiplies the local vector
///
/// # Panics
///
/// This function will panic if the indices are out-of-bounds
#[inline]
pub fn assemble_vector(rr: &mut Vector, rr_prescribed: &mut Vector, f_local: &Vector, lm: &[EqId], alpha: f64) {
    for l in 0..f_local.dim() {
        match lm[l] {
            EqId::Free(i) => rr[i] += alpha * f_local[l],
            EqId::Prescribed(k) => rr_prescribed[k] += alpha * f_local[l],
            EqId::Fixed => (),
        }
    }
}

/// Assembles local matrix into global matrix
///
/// Columns of prescribed DOFs are not stored; instead, their coupling with the current
/// prescribed increment is moved to the right-hand side:
///
/// ```text
/// fd[i] -= K[l][ll] · dup[k]   with   lm[l] = Free(i) and lm[ll] = Prescribed(k)
/// ```
///
/// # Output
///
/// * `kk` -- is the global matrix K with dims = (`n_equation`,`n_equation`)
/// * `fd` -- is the right-hand side correction due to prescribed increments
///
/// # Input
///
/// * `kk_local` -- is the local square matrix with dims = (`lm.len()`,`lm.len()`)
/// * `lm` -- holds the equation ids of the local entries
/// * `dup` -- holds the increments of the prescribed values in the current iteration
pub fn assemble_matrix(
    kk: &mut GlobalMatrix,
    fd: &mut Vector,
    kk_local: &Matrix,
    lm: &[EqId],
    dup: &Vector,
) -> Result<(), StrError> {
    let n = kk_local.dims().0;
    for l in 0..n {
        if let EqId::Free(i) = lm[l] {
            for ll in 0..n {
                match lm[ll] {
                    EqId::Free(j) => kk.add(i, j, kk_local.get(l, ll))?,
                    EqId::Prescribed(k) => fd[i] -= kk_local.get(l, ll) * dup[k],
                    EqId::Fixed => (),
                }
            }
        }
    }
    Ok(())
}

/// Holds the global residual with its side channels
pub struct GlobalResidual {
    /// Residual of the free equations (external minus internal forces)
    pub rr: Vector,

    /// Residual at prescribed DOFs (the reactions are the negated values)
    pub rr_prescribed: Vector,

    /// Generalized forces acting on each rigid body (force and moment about the center)
    pub rigid: Vec<[f64; 6]>,
}

impl GlobalResidual {
    /// Allocates a new instance
    pub fn new(n_equation: usize, n_prescribed: usize, n_body: usize) -> Self {
        GlobalResidual {
            rr: Vector::new(n_equation),
            rr_prescribed: Vector::new(n_prescribed),
            rigid: vec![[0.0; 6]; n_body],
        }
    }

    /// Sets all values to zero
    pub fn zero(&mut self) {
        self.rr.fill(0.0);
        self.rr_prescribed.fill(0.0);
        self.rigid.iter_mut().for_each(|r| *r = [0.0; 6]);
    }
}

/// Maps local element systems onto generalized DOFs when nodes are attached to rigid bodies
///
/// The displacement DOFs of rigid nodes are replaced by the six DOFs of their body:
///
/// ```text
/// f_gen = Tᵀ f     K_gen = Tᵀ K T
/// ```
pub struct RigidExpansion {
    /// Equation ids of the generalized DOFs
    pub lm: Vec<EqId>,

    /// Transformation matrix with dims = (n_local, n_gen)
    pub tt: Matrix,

    /// Holds (body index, first column) of each body involved
    pub bodies: Vec<(usize, usize)>,
}

impl RigidExpansion {
    /// Returns the expansion or None if no node of the element is attached to a rigid body
    pub fn new(mesh: &Mesh, bodies: &[RigidBody], nodes: &[usize], dofs: &[Dof], lm: &[EqId]) -> Option<Self> {
        if nodes.iter().all(|n| mesh.nodes[*n].rigid_body.is_none()) {
            return None;
        }
        let ndof = dofs.len();
        let mut gen_lm = Vec::new();
        let mut kept = Vec::new(); // (local, generalized)
        let mut involved: Vec<(usize, usize)> = Vec::new();
        for (m, node) in nodes.iter().enumerate() {
            let rigid = mesh.nodes[*node].rigid_body;
            for (d, dof) in dofs.iter().enumerate() {
                let l = m * ndof + d;
                match (rigid, dof.displacement_index()) {
                    (Some(b), Some(_)) => {
                        if !involved.iter().any(|(body, _)| *body == b) {
                            involved.push((b, usize::MAX));
                        }
                    }
                    _ => {
                        kept.push((l, gen_lm.len()));
                        gen_lm.push(lm[l]);
                    }
                }
            }
        }
        for entry in involved.iter_mut() {
            entry.1 = gen_lm.len();
            gen_lm.extend_from_slice(&bodies[entry.0].id);
        }
        let mut tt = Matrix::new(lm.len(), gen_lm.len());
        for (l, g) in kept {
            tt.set(l, g, 1.0);
        }
        for (m, node) in nodes.iter().enumerate() {
            if let Some(b) = mesh.nodes[*node].rigid_body {
                let start = involved.iter().find(|(body, _)| *body == b).map(|(_, s)| *s).unwrap_or(0);
                let gg = bodies[b].transformation(&mesh.nodes[*node].rt);
                for (d, dof) in dofs.iter().enumerate() {
                    if let Some(i) = dof.displacement_index() {
                        for k in 0..6 {
                            tt.set(m * ndof + d, start + k, gg[i][k]);
                        }
                    }
                }
            }
        }
        Some(RigidExpansion {
            lm: gen_lm,
            tt,
            bodies: involved,
        })
    }

    /// Computes Tᵀ f
    pub fn vector(&self, f: &Vector) -> Result<Vector, StrError> {
        let mut out = Vector::new(self.tt.ncol());
        vec_mat_mul(&mut out, 1.0, f, &self.tt)?;
        Ok(out)
    }

    /// Computes Tᵀ K T
    pub fn matrix(&self, kk: &Matrix) -> Result<Matrix, StrError> {
        let (nl, ng) = self.tt.dims();
        let mut kt = Matrix::new(nl, ng);
        let mut out = Matrix::new(ng, ng);
        mat_mat_mul(&mut kt, 1.0, kk, &self.tt, 0.0)?;
        mat_t_mat_mul(&mut out, 1.0, &self.tt, &kt, 0.0)?;
        Ok(out)
    }
}

/// Assembles element contributions into the global system, accounting for rigid bodies
pub struct Assembler<'a> {
    pub mesh: &'a Mesh,
    pub bodies: &'a [RigidBody],
}

impl<'a> Assembler<'a> {
    /// Allocates a new instance
    pub fn new(mesh: &'a Mesh, bodies: &'a [RigidBody]) -> Self {
        Assembler { mesh, bodies }
    }

    /// Adds the free equations of an element to the stiffness profile
    pub fn profile(&self, profile: &mut StiffnessProfile, nodes: &[usize], dofs: &[Dof], lm: &[EqId]) {
        let equations: Vec<usize> = match RigidExpansion::new(self.mesh, self.bodies, nodes, dofs, lm) {
            Some(exp) => exp.lm.iter().filter_map(|id| id.free()).collect(),
            None => lm.iter().filter_map(|id| id.free()).collect(),
        };
        profile.add(&equations);
    }

    /// Assembles a local residual contribution scaled by `alpha`
    pub fn vector(
        &self,
        out: &mut GlobalResidual,
        nodes: &[usize],
        dofs: &[Dof],
        lm: &[EqId],
        f_local: &Vector,
        alpha: f64,
    ) -> Result<(), StrError> {
        match RigidExpansion::new(self.mesh, self.bodies, nodes, dofs, lm) {
            Some(exp) => {
                let f_gen = exp.vector(f_local)?;
                assemble_vector(&mut out.rr, &mut out.rr_prescribed, &f_gen, &exp.lm, alpha);
                for (b, start) in &exp.bodies {
                    for k in 0..6 {
                        out.rigid[*b][k] += alpha * f_gen[start + k];
                    }
                }
            }
            None => assemble_vector(&mut out.rr, &mut out.rr_prescribed, f_local, lm, alpha),
        }
        Ok(())
    }

    /// Assembles a local stiffness contribution
    pub fn matrix(
        &self,
        kk: &mut GlobalMatrix,
        fd: &mut Vector,
        nodes: &[usize],
        dofs: &[Dof],
        lm: &[EqId],
        kk_local: &Matrix,
        dup: &Vector,
    ) -> Result<(), StrError> {
        match RigidExpansion::new(self.mesh, self.bodies, nodes, dofs, lm) {
            Some(exp) => assemble_matrix(kk, fd, &exp.matrix(kk_local)?, &exp.lm, dup),
            None => assemble_matrix(kk, fd, kk_local, lm, dup),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{assemble_matrix, assemble_vector, local_to_global, Assembler, GlobalResidual, RigidExpansion};
    use crate::base::{Dof, DofConfig, EqId, Essential, Etype, Mesh, ParamRigid, ParamSpring, RigidBody};
    use crate::base::{Equations, GlobalMatrix, RigidDof, StiffnessProfile};
    use gemlab::shapes::GeoKind;
    use russell_lab::{approx_eq, mat_approx_eq, Matrix, Vector};
    use russell_sparse::Sym;
    use std::collections::HashMap;

    #[test]
    fn local_to_global_works() {
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let mut mesh = Mesh::new(DofConfig::solid(), &xx, &[(1, GeoKind::Lin2, &[0, 1])]).unwrap();
        let att = HashMap::from([(1, Etype::Spring(ParamSpring { stiffness: 1.0 }))]);
        let mut essential = Essential::new();
        essential.fix(&[0], &[Dof::Ux, Dof::Uy, Dof::Uz]);
        Equations::build(&mut mesh, &att, &mut [], &essential).unwrap();
        let lm = local_to_global(&mesh, &[0, 1], &[Dof::Ux, Dof::Uy, Dof::Uz]).unwrap();
        assert_eq!(
            lm,
            &[EqId::Fixed, EqId::Fixed, EqId::Fixed, EqId::Free(0), EqId::Free(1), EqId::Free(2)]
        );
        assert_eq!(
            local_to_global(&mesh, &[0, 3], &[Dof::Ux]).err(),
            Some("node index is out of range")
        );
    }

    #[test]
    fn assemble_vector_works() {
        //       {4} 4---.__
        //          / \     `--.___3 {3}  [#] indicates id
        //         /   \          / \     {#} indicates equation id
        //        /     \  [1]   /   \    {p#} indicates prescribed index
        //       /  [0]  \      / [2] \
        //      /         \    /       \
        // {0} 0---.__     \  /      ___2 {p0}
        //            `--.__\/__.---'
        //               {1} 1
        let f = EqId::Free;
        let lm = vec![
            vec![f(0), f(1), f(4)],
            vec![f(1), f(3), f(4)],
            vec![f(1), EqId::Prescribed(0), f(3)],
        ];
        let mut rr = Vector::new(5);
        let mut rr_prescribed = Vector::new(1);
        let f0 = Vector::from(&[/*    */ 10.0, /*    */ 11.0, /*    */ 14.0]);
        let f1 = Vector::from(&[/*  */ 2100.0, /*  */ 2300.0, /*  */ 2400.0]);
        let f2 = Vector::from(&[/**/ 310000.0, /**/ 320000.0, /**/ 330000.0]);
        assemble_vector(&mut rr, &mut rr_prescribed, &f0, &lm[0], 1.0);
        assemble_vector(&mut rr, &mut rr_prescribed, &f1, &lm[1], 1.0);
        assemble_vector(&mut rr, &mut rr_prescribed, &f2, &lm[2], 1.0);
        assert_eq!(rr.as_data(), &[10.0, 312111.0, 0.0, 332300.0, 2414.0]);
        assert_eq!(rr_prescribed.as_data(), &[320000.0]);

        // scaled contribution
        assemble_vector(&mut rr, &mut rr_prescribed, &f0, &lm[0], -1.0);
        assert_eq!(rr.as_data(), &[0.0, 312100.0, 0.0, 332300.0, 2400.0]);
    }

    #[test]
    fn assemble_matrix_works() {
        // same mesh as above; equation 2 is now prescribed (index 0) and fixed entries are skipped
        let f = EqId::Free;
        let lm = vec![
            vec![f(0), f(1), f(3)],
            vec![f(1), f(2), f(3)],
            vec![f(1), EqId::Prescribed(0), EqId::Fixed],
        ];
        let mut profile = StiffnessProfile::new(4);
        for l in &lm {
            let eqs: Vec<_> = l.iter().filter_map(|id| id.free()).collect();
            profile.add(&eqs);
        }
        let mut kk = GlobalMatrix::new(profile, Sym::No).unwrap();
        let mut fd = Vector::new(4);
        let dup = Vector::from(&[0.5]);
        #[rustfmt::skip]
        let k0 = Matrix::from(&[
            [10.0, 11.0, 14.0],
            [10.0, 11.0, 14.0],
            [10.0, 11.0, 14.0],
        ]);
        #[rustfmt::skip]
        let k1 = Matrix::from(&[
            [2100.0, 2300.0, 2400.0],
            [2100.0, 2300.0, 2400.0],
            [2100.0, 2300.0, 2400.0],
        ]);
        #[rustfmt::skip]
        let k2 = Matrix::from(&[
            [310000.0, 320000.0, 330000.0],
            [310000.0, 320000.0, 330000.0],
            [310000.0, 320000.0, 330000.0],
        ]);
        assemble_matrix(&mut kk, &mut fd, &k0, &lm[0], &dup).unwrap();
        assemble_matrix(&mut kk, &mut fd, &k1, &lm[1], &dup).unwrap();
        assemble_matrix(&mut kk, &mut fd, &k2, &lm[2], &dup).unwrap();
        #[rustfmt::skip]
        let correct = Matrix::from(&[
            [10.0,     11.0,    0.0,   14.0], // 0
            [10.0, 312111.0, 2300.0, 2414.0], // 1
            [ 0.0,   2100.0, 2300.0, 2400.0], // 2
            [10.0,   2111.0, 2300.0, 2414.0], // 3
        ]);
        mat_approx_eq(&kk.to_dense(), &correct, 1e-15);
        assert_eq!(fd.as_data(), &[0.0, -160000.0, 0.0, 0.0]);

        // entries outside the profile are rejected
        let mut small = GlobalMatrix::new(StiffnessProfile::new(4), Sym::No).unwrap();
        assert_eq!(
            assemble_matrix(&mut small, &mut fd, &k0, &lm[0], &dup).err(),
            Some("entry is outside the stiffness profile")
        );
    }

    #[test]
    fn rigid_expansion_works() {
        // spring from a free node 0 to node 1 attached to a rigid body {1, 2}
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 2.0, 0.0]];
        let mut mesh = Mesh::new(
            DofConfig::solid(),
            &xx,
            &[(1, GeoKind::Lin2, &[0, 1]), (2, GeoKind::Lin2, &[1, 2])],
        )
        .unwrap();
        let att = HashMap::from([
            (1, Etype::Spring(ParamSpring { stiffness: 1.0 })),
            (2, Etype::Rigid(ParamRigid { density: 1.0 })),
        ]);
        let mut bodies = vec![RigidBody::new(2, vec![1, 2], &mesh).unwrap()];
        let mut essential = Essential::new();
        essential
            .fix(&[0], &[Dof::Ux, Dof::Uy, Dof::Uz])
            .fix_rigid(0, &[RigidDof::Rx, RigidDof::Ry]);
        let eqs = Equations::build(&mut mesh, &att, &mut bodies, &essential).unwrap();
        assert_eq!(eqs.n_equation, 4); // Tx, Ty, Tz, Rz

        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        let lm = local_to_global(&mesh, &[0, 1], &dofs).unwrap();
        assert!(RigidExpansion::new(&mesh, &bodies, &[0], &dofs, &lm[0..3]).is_none());
        let exp = RigidExpansion::new(&mesh, &bodies, &[0, 1], &dofs, &lm).unwrap();
        assert_eq!(exp.lm.len(), 9);
        assert_eq!(exp.bodies, &[(0, 3)]);

        // force along x on node 1; the center is at (1,1,0), thus a = (0,-1,0) and M = a × F = (0,0,2)
        let f = Vector::from(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let f_gen = exp.vector(&f).unwrap();
        approx_eq(f_gen[3], 2.0, 1e-15); // Tx
        approx_eq(f_gen[8], 2.0, 1e-15); // Rz

        let mut rr = GlobalResidual::new(eqs.n_equation, eqs.n_prescribed(), 1);
        let assembler = Assembler::new(&mesh, &bodies);
        assembler.vector(&mut rr, &[0, 1], &dofs, &lm, &f, 1.0).unwrap();
        assert_eq!(rr.rr.as_data(), &[2.0, 0.0, 0.0, 2.0]);
        assert_eq!(rr.rigid[0], [2.0, 0.0, 0.0, 0.0, 0.0, 2.0]);
        rr.zero();
        assert_eq!(rr.rigid[0], [0.0; 6]);

        // spring stiffness along x
        let mut kl = Matrix::new(6, 6);
        kl.set(0, 0, 1.0);
        kl.set(0, 3, -1.0);
        kl.set(3, 0, -1.0);
        kl.set(3, 3, 1.0);
        let mut profile = StiffnessProfile::new(eqs.n_equation);
        assembler.profile(&mut profile, &[0, 1], &dofs, &lm);
        let mut kk = GlobalMatrix::new(profile, Sym::No).unwrap();
        let mut fd = Vector::new(eqs.n_equation);
        let dup = Vector::new(0);
        assembler.matrix(&mut kk, &mut fd, &[0, 1], &dofs, &lm, &kl, &dup).unwrap();
        approx_eq(kk.get(0, 0), 1.0, 1e-15);
        approx_eq(kk.get(0, 3), 1.0, 1e-15); // Tx-Rz coupling: G[0][5] = -a_y = 1
        approx_eq(kk.get(3, 3), 1.0, 1e-15);
        approx_eq(kk.get(1, 1), 0.0, 1e-15);
    }
}
