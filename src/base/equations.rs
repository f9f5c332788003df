use super::{Dof, Ebc, EqId, Essential, Etype, LoadCurve, Mesh, RigidBody, RigidDof};
use crate::StrError;
use std::collections::HashMap;
use std::fmt;

/// Identifies the target of a prescribed value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DofTarget {
    /// DOF of a node
    Node(usize, Dof),

    /// DOF of a rigid body
    Rigid(usize, RigidDof),
}

/// Holds a prescribed value with its target
#[derive(Clone, Debug, PartialEq)]
pub struct PrescribedValue {
    /// Target DOF
    pub target: DofTarget,

    /// Magnitude
    pub value: f64,

    /// Time multiplier
    pub curve: LoadCurve,
}

impl PrescribedValue {
    /// Returns the prescribed value at time t
    pub fn value(&self, t: f64) -> f64 {
        self.value * self.curve.value(t)
    }
}

/// Holds the free equations of each physics field
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldEquations {
    /// Displacements and rigid-body DOFs
    pub displacement: Vec<usize>,

    /// Fluid pressure
    pub pressure: Vec<usize>,

    /// Concentrations (one array per solute)
    pub solutes: Vec<Vec<usize>>,
}

/// Holds equation numbers (DOF numbers)
///
/// The nodes are scanned in order and their DOFs in `DofConfig` order. Free DOFs receive
/// consecutive equation numbers; fixed DOFs and DOFs not used by any element are marked
/// `Fixed`; prescribed DOFs receive an index into the table of prescribed values. The six
/// DOFs of each rigid body are numbered after all nodes. The displacements of nodes attached
/// to rigid bodies are `Fixed` since they are governed by the rigid-body equations.
///
/// # Example
///
/// ```text
///   {Ux →  3}            {Ux → 5}
///   {Uy →  4}            {Uy → 6}
///   {Uz → -3 (pres 1)}   {Uz → 7}
///        2 ------------------ 3
///                (spring)     |
///                          (spring)
///                (spring)     |
///        0 ------------------ 1
///   {Ux → -1 (fixed)}    {Ux → 0}
///   {Uy → -1 (fixed)}    {Uy → 1}
///   {Uz → -2 (pres 0)}   {Uz → 2}
/// ```
pub struct Equations {
    /// Holds the total number of free equations
    pub n_equation: usize,

    /// Holds the table of prescribed values (indexed by EqId::Prescribed)
    pub prescribed: Vec<PrescribedValue>,

    /// Holds the free equations of each physics field
    pub fields: FieldEquations,
}

impl Equations {
    /// Assigns equation numbers to all nodes and rigid bodies
    pub fn build(
        mesh: &mut Mesh,
        attributes: &HashMap<usize, Etype>,
        bodies: &mut [RigidBody],
        essential: &Essential,
    ) -> Result<Self, StrError> {
        let all_dofs = mesh.dofs.all();
        let ndof = all_dofs.len();
        let nnode = mesh.nodes.len();

        // check the boundary conditions
        for (node, dof) in essential.all.keys() {
            if *node >= nnode {
                return Err("essential boundary condition refers to a non-existent node");
            }
            mesh.dofs.index(*dof)?;
        }
        for (body, _) in essential.rigid.keys() {
            if *body >= bodies.len() {
                return Err("essential boundary condition refers to a non-existent rigid body");
            }
        }

        // find the DOFs used by the elements
        let mut active = vec![vec![false; ndof]; nnode];
        for cell in &mesh.cells {
            let etype = attributes
                .get(&cell.attribute)
                .ok_or("cannot find element type corresponding to the cell attribute")?;
            let dofs: Vec<Dof> = match etype {
                Etype::Solid(..) | Etype::Spring(..) => vec![Dof::Ux, Dof::Uy, Dof::Uz],
                Etype::Diffusion(p) => vec![p.dof],
                Etype::Rigid(..) => Vec::new(),
            };
            for dof in dofs {
                let index = mesh.dofs.index(dof)?;
                for n in &cell.points {
                    active[*n][index] = true;
                }
            }
        }
        for (b, body) in bodies.iter().enumerate() {
            for n in &body.nodes {
                if *n >= nnode {
                    return Err("rigid body refers to a non-existent node");
                }
                mesh.nodes[*n].rigid_body = Some(b);
            }
        }

        // number the nodal DOFs
        let mut n_equation = 0;
        let mut prescribed = Vec::new();
        let mut fields = FieldEquations {
            solutes: vec![Vec::new(); mesh.dofs.n_solute],
            ..Default::default()
        };
        for n in 0..nnode {
            let rigid = mesh.nodes[n].rigid_body.is_some();
            for (index, dof) in all_dofs.iter().enumerate() {
                let ebc = essential.all.get(&(n, *dof));
                let id = if rigid && dof.displacement_index().is_some() {
                    if ebc.is_some() {
                        return Err("displacements of rigid-body nodes cannot have essential boundary conditions");
                    }
                    EqId::Fixed
                } else if !active[n][index] {
                    if ebc.is_some() {
                        return Err("essential boundary condition refers to a DOF not used by any element");
                    }
                    EqId::Fixed
                } else {
                    match ebc {
                        Some(Ebc::Fixed) => EqId::Fixed,
                        Some(Ebc::Prescribed { value, curve }) => {
                            prescribed.push(PrescribedValue {
                                target: DofTarget::Node(n, *dof),
                                value: *value,
                                curve: curve.clone(),
                            });
                            EqId::Prescribed(prescribed.len() - 1)
                        }
                        None => {
                            match dof {
                                Dof::P => fields.pressure.push(n_equation),
                                Dof::C(i) => fields.solutes[*i].push(n_equation),
                                _ => fields.displacement.push(n_equation),
                            }
                            n_equation += 1;
                            EqId::Free(n_equation - 1)
                        }
                    }
                };
                mesh.nodes[n].id[index] = id;
            }
        }

        // number the rigid-body DOFs
        for (b, body) in bodies.iter_mut().enumerate() {
            for dof in RigidDof::ALL {
                body.id[dof.index()] = match essential.rigid.get(&(b, dof)) {
                    Some(Ebc::Fixed) => EqId::Fixed,
                    Some(Ebc::Prescribed { value, curve }) => {
                        prescribed.push(PrescribedValue {
                            target: DofTarget::Rigid(b, dof),
                            value: *value,
                            curve: curve.clone(),
                        });
                        EqId::Prescribed(prescribed.len() - 1)
                    }
                    None => {
                        fields.displacement.push(n_equation);
                        n_equation += 1;
                        EqId::Free(n_equation - 1)
                    }
                };
            }
        }

        Ok(Equations {
            n_equation,
            prescribed,
            fields,
        })
    }

    /// Returns the number of prescribed values
    pub fn n_prescribed(&self) -> usize {
        self.prescribed.len()
    }
}

/// Formats the equation codes of nodes and rigid bodies
pub struct EquationsTable<'a> {
    pub mesh: &'a Mesh,
    pub bodies: &'a [RigidBody],
    pub equations: &'a Equations,
}

impl<'a> fmt::Display for EquationsTable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dofs = self.mesh.dofs.all();
        write!(f, "Nodes: DOFs and equation codes\n")?;
        write!(f, "==============================\n")?;
        for (n, node) in self.mesh.nodes.iter().enumerate() {
            let pairs: Vec<_> = dofs.iter().zip(&node.id).map(|(d, id)| format!("({}, {})", d, id.code())).collect();
            write!(f, "{}: [{}]\n", n, pairs.join(", "))?;
        }
        if !self.bodies.is_empty() {
            write!(f, "\nRigid bodies: DOFs and equation codes\n")?;
            write!(f, "=====================================\n")?;
            for (b, body) in self.bodies.iter().enumerate() {
                let pairs: Vec<_> = RigidDof::ALL
                    .iter()
                    .map(|d| format!("({:?}, {})", d, body.id[d.index()].code()))
                    .collect();
                write!(f, "{}: [{}]\n", b, pairs.join(", "))?;
            }
        }
        write!(f, "\nInformation\n")?;
        write!(f, "===========\n")?;
        write!(f, "number of equations = {}\n", self.equations.n_equation)?;
        write!(f, "number of prescribed values = {}\n", self.equations.n_prescribed())?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{DofTarget, Equations, EquationsTable};
    use crate::base::{Dof, DofConfig, EqId, Essential, Etype, LoadCurve, Mesh, RigidBody, RigidDof};
    use crate::base::{ParamDiffusion, ParamRigid, ParamSpring};
    use gemlab::shapes::GeoKind;
    use std::collections::HashMap;

    fn springs() -> (Mesh, HashMap<usize, Etype>) {
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        let mesh = Mesh::new(
            DofConfig::solid(),
            &xx,
            &[(1, GeoKind::Lin2, &[0, 1]), (1, GeoKind::Lin2, &[2, 3]), (1, GeoKind::Lin2, &[1, 3])],
        )
        .unwrap();
        let att = HashMap::from([(1, Etype::Spring(ParamSpring { stiffness: 1.0 }))]);
        (mesh, att)
    }

    #[test]
    fn build_captures_errors() {
        let (mut mesh, att) = springs();
        let mut essential = Essential::new();
        essential.fix(&[4], &[Dof::Ux]);
        assert_eq!(
            Equations::build(&mut mesh, &att, &mut [], &essential).err(),
            Some("essential boundary condition refers to a non-existent node")
        );

        let mut essential = Essential::new();
        essential.fix(&[0], &[Dof::P]);
        assert_eq!(
            Equations::build(&mut mesh, &att, &mut [], &essential).err(),
            Some("pressure DOF is not active")
        );

        let mut essential = Essential::new();
        essential.fix_rigid(0, &[RigidDof::Tx]);
        assert_eq!(
            Equations::build(&mut mesh, &att, &mut [], &essential).err(),
            Some("essential boundary condition refers to a non-existent rigid body")
        );

        let essential = Essential::new();
        let empty = HashMap::new();
        assert_eq!(
            Equations::build(&mut mesh, &empty, &mut [], &essential).err(),
            Some("cannot find element type corresponding to the cell attribute")
        );
    }

    #[test]
    fn build_works() {
        let (mut mesh, att) = springs();
        let mut essential = Essential::new();
        essential
            .fix(&[0], &[Dof::Ux, Dof::Uy])
            .prescribe(&[0, 2], Dof::Uz, 0.5, LoadCurve::Ramp);
        let eqs = Equations::build(&mut mesh, &att, &mut [], &essential).unwrap();
        assert_eq!(eqs.n_equation, 8);
        assert_eq!(eqs.n_prescribed(), 2);
        assert_eq!(eqs.prescribed[1].target, DofTarget::Node(2, Dof::Uz));
        assert_eq!(eqs.prescribed[1].value(0.5), 0.25);
        assert_eq!(mesh.nodes[0].id, &[EqId::Fixed, EqId::Fixed, EqId::Prescribed(0)]);
        assert_eq!(mesh.nodes[3].id, &[EqId::Free(5), EqId::Free(6), EqId::Free(7)]);
        assert_eq!(eqs.fields.displacement, &[0, 1, 2, 3, 4, 5, 6, 7]);
        let table = EquationsTable {
            mesh: &mesh,
            bodies: &[],
            equations: &eqs,
        };
        assert_eq!(
            format!("{}", table),
            "Nodes: DOFs and equation codes\n\
             ==============================\n\
             0: [(Ux, -1), (Uy, -1), (Uz, -2)]\n\
             1: [(Ux, 0), (Uy, 1), (Uz, 2)]\n\
             2: [(Ux, 3), (Uy, 4), (Uz, -3)]\n\
             3: [(Ux, 5), (Uy, 6), (Uz, 7)]\n\
             \n\
             Information\n\
             ===========\n\
             number of equations = 8\n\
             number of prescribed values = 2\n"
        );
    }

    #[test]
    fn unused_dofs_are_fixed() {
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let mut mesh = Mesh::new(
            DofConfig::biphasic(),
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
        essential.fix_rigid(0, &[RigidDof::Rx, RigidDof::Ry, RigidDof::Rz]);
        let eqs = Equations::build(&mut mesh, &att, &mut bodies, &essential).unwrap();
        // node 0: Ux,Uy,Uz free; P unused; nodes 1 and 2 are rigid
        assert_eq!(mesh.nodes[0].id, &[EqId::Free(0), EqId::Free(1), EqId::Free(2), EqId::Fixed]);
        assert_eq!(mesh.nodes[1].id, &[EqId::Fixed; 4]);
        assert_eq!(mesh.nodes[1].rigid_body, Some(0));
        assert_eq!(
            bodies[0].id,
            [EqId::Free(3), EqId::Free(4), EqId::Free(5), EqId::Fixed, EqId::Fixed, EqId::Fixed]
        );
        assert_eq!(eqs.n_equation, 6);

        let mut essential = Essential::new();
        essential.fix(&[1], &[Dof::Ux]);
        assert_eq!(
            Equations::build(&mut mesh, &att, &mut bodies, &essential).err(),
            Some("displacements of rigid-body nodes cannot have essential boundary conditions")
        );
        let mut essential = Essential::new();
        essential.fix(&[0], &[Dof::P]);
        assert_eq!(
            Equations::build(&mut mesh, &att, &mut bodies, &essential).err(),
            Some("essential boundary condition refers to a DOF not used by any element")
        );
    }

    #[test]
    fn diffusion_fields_work() {
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let mut mesh = Mesh::new(
            DofConfig::multiphasic(1),
            &xx,
            &[(1, GeoKind::Lin2, &[0, 1]), (2, GeoKind::Lin2, &[0, 1])],
        )
        .unwrap();
        let att = HashMap::from([
            (1, Etype::Diffusion(ParamDiffusion::sample_pressure())),
            (
                2,
                Etype::Diffusion(ParamDiffusion {
                    dof: Dof::C(0),
                    conductivity: 1.0,
                    source: 0.0,
                }),
            ),
        ]);
        let eqs = Equations::build(&mut mesh, &att, &mut [], &Essential::new()).unwrap();
        assert_eq!(eqs.n_equation, 4);
        assert_eq!(eqs.fields.pressure, &[0, 2]);
        assert_eq!(eqs.fields.solutes, &[vec![1, 3]]);
        assert_eq!(eqs.fields.displacement.len(), 0);
    }
}
