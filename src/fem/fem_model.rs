use super::{Constraint, Elements, NodalConstraint, StepFailure};
use crate::base::{Assembler, Dof, DofTarget, EqId, Equations, Essential, Etype, GlobalMatrix, GlobalResidual};
use crate::base::{Mesh, Natural, RigidBody, StiffnessProfile};
use crate::contact::ContactInterface;
use crate::StrError;
use russell_lab::Vector;
use std::collections::HashMap;

/// Holds everything that defines the discrete problem
///
/// The model owns the mesh (nodal state), the rigid bodies, the element kernels, the contact
/// interfaces, and the nodal constraints. The solver drives it through [FemModel::residual], [FemModel::stiffness],
/// and [FemModel::update_kinematics].
pub struct FemModel {
    /// Holds the mesh with the nodal state
    pub mesh: Mesh,

    /// Maps cell attributes to element types
    pub attributes: HashMap<usize, Etype>,

    /// Holds the rigid bodies (one per Rigid attribute, sorted by attribute)
    pub bodies: Vec<RigidBody>,

    /// Holds the equation numbers and the table of prescribed values
    pub equations: Equations,

    /// Holds the element kernels
    pub elements: Elements,

    /// Holds the concentrated loads
    pub natural: Natural,

    /// Holds the contact interfaces
    pub contacts: Vec<ContactInterface>,

    /// Holds the nodal constraints
    pub constraints: Vec<NodalConstraint>,
}

impl FemModel {
    /// Allocates a new instance
    ///
    /// Builds the rigid bodies, numbers the equations, allocates the elements, and activates
    /// the contact interfaces (penalty factors and initial projections).
    pub fn new(
        mut mesh: Mesh,
        attributes: HashMap<usize, Etype>,
        essential: &Essential,
        natural: Natural,
        contacts: Vec<ContactInterface>,
    ) -> Result<Self, StrError> {
        if mesh.cells.is_empty() {
            return Err("there are no cells in the mesh");
        }

        // rigid bodies
        let mut rigid: Vec<usize> = attributes
            .iter()
            .filter_map(|(attr, etype)| match etype {
                Etype::Rigid(..) => Some(*attr),
                _ => None,
            })
            .collect();
        rigid.sort_unstable();
        let mut bodies = Vec::with_capacity(rigid.len());
        for attr in rigid {
            let mut nodes: Vec<usize> = mesh
                .cells
                .iter()
                .filter(|cell| cell.attribute == attr)
                .flat_map(|cell| cell.points.iter().copied())
                .collect();
            nodes.sort_unstable();
            nodes.dedup();
            if nodes.is_empty() {
                continue;
            }
            bodies.push(RigidBody::new(attr, nodes, &mesh)?);
        }

        // equations and elements
        let equations = Equations::build(&mut mesh, &attributes, &mut bodies, essential)?;
        let mut elements = Elements::new(&mesh, &attributes)?;
        elements.set_equations(&mesh)?;

        // loads
        for load in &natural.concentrated {
            mesh.equation(load.node, load.dof)?;
        }

        // contact
        let mut contacts = contacts;
        for contact in &mut contacts {
            contact.initialize(&mesh, &elements)?;
        }
        Ok(FemModel {
            mesh,
            attributes,
            bodies,
            equations,
            elements,
            natural,
            contacts,
            constraints: Vec::new(),
        })
    }

    /// Adds a nodal constraint
    pub fn add_constraint(&mut self, constraint: NodalConstraint) -> Result<(), StrError> {
        constraint.validate(&self.mesh, &self.bodies)?;
        self.constraints.push(constraint);
        Ok(())
    }

    /// Returns all constraints: the contact interfaces followed by the nodal constraints
    pub fn all_constraints(&self) -> impl Iterator<Item = &dyn Constraint> {
        let contacts = self.contacts.iter().map(|c| c as &dyn Constraint);
        contacts.chain(self.constraints.iter().map(|c| c.actual()))
    }

    /// Returns all constraints as mutable references
    pub fn all_constraints_mut(&mut self) -> impl Iterator<Item = &mut dyn Constraint> {
        let contacts = self.contacts.iter_mut().map(|c| c as &mut dyn Constraint);
        contacts.chain(self.constraints.iter_mut().map(|c| c.actual_mut()))
    }

    /// Returns the number of free equations
    pub fn n_equation(&self) -> usize {
        self.equations.n_equation
    }

    /// Returns an assembler borrowing the mesh and the rigid bodies
    pub fn assembler(&self) -> Assembler {
        Assembler::new(&self.mesh, &self.bodies)
    }

    /// Returns whether the global stiffness is symmetric or not
    ///
    /// The contact stiffness is unsymmetric in general.
    pub fn symmetric(&self) -> bool {
        self.elements.all_symmetric() && self.all_constraints().all(|c| c.symmetric())
    }

    /// Returns the sum of the topology generations of all constraints
    pub fn contact_generation(&self) -> usize {
        self.all_constraints().map(|c| c.generation()).sum()
    }

    /// Computes the nonzero profile of the global stiffness matrix
    pub fn profile(&self) -> Result<StiffnessProfile, StrError> {
        let mut profile = StiffnessProfile::new(self.equations.n_equation);
        let assembler = self.assembler();
        self.elements.profile(&assembler, &mut profile);
        for constraint in self.all_constraints() {
            constraint.profile(&assembler, &mut profile)?;
        }
        for body in &self.bodies {
            let eqs: Vec<usize> = body.id.iter().filter_map(|id| id.free()).collect();
            profile.add(&eqs);
        }
        Ok(profile)
    }

    /// Returns the current value of a prescribed DOF
    pub fn prescribed_current(&self, k: usize) -> f64 {
        match self.equations.prescribed[k].target {
            DofTarget::Node(n, dof) => self.mesh.nodes[n].value(dof),
            DofTarget::Rigid(b, dof) => self.bodies[b].value(dof),
        }
    }

    /// Calculates the global residual R = F_ext - F_int at time t
    ///
    /// Also stores the generalized reactions of the rigid bodies.
    pub fn residual(&mut self, out: &mut GlobalResidual, t: f64) -> Result<(), StepFailure> {
        out.zero();
        self.elements.calc_internal_forces(&self.mesh)?;
        {
            let assembler = Assembler::new(&self.mesh, &self.bodies);
            for load in &self.natural.concentrated {
                let lm = [self.mesh.equation(load.node, load.dof)?];
                let f = Vector::from(&[load.value(t)]);
                assembler.vector(out, &[load.node], &[load.dof], &lm, &f, 1.0)?;
            }
            self.elements.assemble_internal_forces(&assembler, out)?;
            for constraint in self.all_constraints() {
                constraint.assemble_residual(&assembler, out)?;
            }
        }
        for (b, body) in self.bodies.iter_mut().enumerate() {
            for k in 0..6 {
                body.reaction[k] = -out.rigid[b][k];
            }
        }
        Ok(())
    }

    /// Calculates the global stiffness and the residual correction due to prescribed increments
    pub fn stiffness(&mut self, kk: &mut GlobalMatrix, fd: &mut Vector, dup: &Vector) -> Result<(), StepFailure> {
        kk.zero();
        fd.fill(0.0);
        self.elements.calc_stiffnesses(&self.mesh)?;
        let assembler = Assembler::new(&self.mesh, &self.bodies);
        self.elements.assemble_stiffnesses(&assembler, kk, fd, dup)?;
        for constraint in self.all_constraints() {
            constraint.assemble_stiffness(&assembler, kk, fd, dup)?;
        }
        Ok(())
    }

    /// Updates the nodal state given the increment of the step and the prescribed targets
    ///
    /// The update is not cumulative: free DOFs become `previous + u[eq]`, prescribed DOFs
    /// become their targets, and fixed DOFs are untouched. Concentrations are clamped at zero.
    /// The element stresses are recomputed afterwards.
    pub fn update_kinematics(&mut self, u: &Vector, targets: &[f64]) -> Result<(), StepFailure> {
        let dofs = self.mesh.dofs.all();
        for node in &mut self.mesh.nodes {
            for (index, dof) in dofs.iter().enumerate() {
                let value = match node.id[index] {
                    EqId::Free(eq) => node.previous_value(*dof) + u[eq],
                    EqId::Prescribed(k) => targets[k],
                    EqId::Fixed => continue,
                };
                let value = match dof {
                    Dof::C(_) => f64::max(0.0, value),
                    _ => value,
                };
                node.set_value(*dof, value);
            }
        }
        for body in &mut self.bodies {
            let mut du = [0.0; 6];
            for k in 0..6 {
                du[k] = match body.id[k] {
                    EqId::Free(eq) => u[eq],
                    EqId::Prescribed(j) => targets[j] - body.up[k],
                    EqId::Fixed => 0.0,
                };
            }
            body.set_increment(du);
            for n in &body.nodes {
                let node = &mut self.mesh.nodes[*n];
                node.rt = body.node_position(&node.r0);
            }
        }
        self.elements.update_stresses(&self.mesh)
    }

    /// Moves the rigid walls to time t
    pub fn set_time(&mut self, t: f64) {
        for contact in &mut self.contacts {
            contact.set_time(t);
        }
    }

    /// Updates the projections and gaps of all constraints
    pub fn update_constraints(&mut self, iteration: usize) -> Result<(), StrError> {
        let mesh = &self.mesh;
        let contacts = self.contacts.iter_mut().map(|c| c as &mut dyn Constraint);
        for constraint in contacts.chain(self.constraints.iter_mut().map(|c| c.actual_mut())) {
            constraint.update(mesh, iteration)?;
        }
        Ok(())
    }

    /// Accepts the current state as the start of the next step
    pub fn commit(&mut self, dt: f64) {
        self.mesh.update_rates(dt);
        self.mesh.store_previous();
        for body in &mut self.bodies {
            body.store_previous();
        }
        for constraint in self.all_constraints_mut() {
            constraint.commit();
        }
    }

    /// Returns the reactions at the prescribed DOFs
    pub fn reactions(&self, out: &GlobalResidual) -> Vec<(DofTarget, f64)> {
        self.equations
            .prescribed
            .iter()
            .enumerate()
            .map(|(k, p)| (p.target, -out.rr_prescribed[k]))
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::FemModel;
    use crate::base::{Dof, DofConfig, DofTarget, Essential, Etype, GlobalResidual, LoadCurve, Mesh};
    use crate::base::{Natural, ParamRigid, ParamSolid, ParamSpring, SampleMeshes};
    use gemlab::shapes::GeoKind;
    use russell_lab::{approx_eq, Vector};
    use std::collections::HashMap;

    fn springs() -> (Mesh, HashMap<usize, Etype>) {
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let mesh = Mesh::new(
            DofConfig::solid(),
            &xx,
            &[(1, GeoKind::Lin2, &[0, 1]), (1, GeoKind::Lin2, &[1, 2])],
        )
        .unwrap();
        let att = HashMap::from([(1, Etype::Spring(ParamSpring { stiffness: 10.0 }))]);
        (mesh, att)
    }

    #[test]
    fn new_captures_errors() {
        let (mesh, att) = springs();
        let mut natural = Natural::new();
        natural.at(&[5], Dof::Ux, 1.0, LoadCurve::Constant);
        assert_eq!(
            FemModel::new(mesh, att, &Essential::new(), natural, Vec::new()).err(),
            Some("node index is out of range")
        );
        let (mesh, att) = springs();
        let mut natural = Natural::new();
        natural.at(&[1], Dof::P, 1.0, LoadCurve::Constant);
        assert_eq!(
            FemModel::new(mesh, att, &Essential::new(), natural, Vec::new()).err(),
            Some("pressure DOF is not active")
        );
    }

    #[test]
    fn residual_and_reactions_work() {
        let (mesh, att) = springs();
        let mut essential = Essential::new();
        essential.fix(&[0], &[Dof::Uy, Dof::Uz]);
        essential.prescribe(&[0], Dof::Ux, 0.0, LoadCurve::Constant);
        essential.fix(&[1, 2], &[Dof::Uy, Dof::Uz]);
        let mut natural = Natural::new();
        natural.at(&[2], Dof::Ux, 2.0, LoadCurve::Ramp);
        let mut model = FemModel::new(mesh, att, &essential, natural, Vec::new()).unwrap();
        assert_eq!(model.n_equation(), 2);
        assert!(model.symmetric());

        // stretch: u1 = 0.2, u2 = 0.4 (exact solution for the load at t = 1)
        let u = Vector::from(&[0.2, 0.4]);
        model.update_kinematics(&u, &[0.0]).unwrap();
        let mut out = GlobalResidual::new(2, 1, 0);
        model.residual(&mut out, 1.0).unwrap();
        approx_eq(out.rr[0], 0.0, 1e-14);
        approx_eq(out.rr[1], 0.0, 1e-14);
        let reactions = model.reactions(&out);
        assert_eq!(reactions[0].0, DofTarget::Node(0, Dof::Ux));
        approx_eq(reactions[0].1, -2.0, 1e-14);

        // half the load at t = 0.5
        model.residual(&mut out, 0.5).unwrap();
        approx_eq(out.rr[1], -1.0, 1e-14);
    }

    #[test]
    fn rigid_bodies_follow_their_dofs() {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), 0.0).unwrap();
        let att = HashMap::from([
            (1, Etype::Solid(ParamSolid::sample_neo_hookean())),
            (2, Etype::Rigid(ParamRigid { density: 1.0 })),
        ]);
        let mut essential = Essential::new();
        essential.fix(&[0, 1, 2, 3], &[Dof::Ux, Dof::Uy, Dof::Uz]);
        let mut model = FemModel::new(mesh, att, &essential, Natural::new(), Vec::new()).unwrap();
        assert_eq!(model.bodies.len(), 1);
        assert_eq!(model.bodies[0].nodes, (8..16).collect::<Vec<_>>());
        let neq = model.n_equation();
        assert_eq!(neq, 4 * 3 + 6);

        // translate the body along z
        let mut u = Vector::new(neq);
        u[neq - 4] = -0.01;
        model.update_kinematics(&u, &[]).unwrap();
        for n in 8..16 {
            let node = &model.mesh.nodes[n];
            approx_eq(node.rt[2] - node.r0[2], -0.01, 1e-15);
        }
        model.commit(1.0);
        approx_eq(model.bodies[0].up[2], -0.01, 1e-15);
        approx_eq(model.mesh.nodes[8].vt[2], -0.01, 1e-15);
    }
}
