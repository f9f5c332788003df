use super::{ElementDiffusion, ElementSolid, ElementSpring, ElementTrait, StepFailure};
use crate::base::{local_to_global, Assembler, EqId, Etype, GlobalMatrix, GlobalResidual, Mesh, StiffnessProfile};
use crate::StrError;
use gemlab::mesh::Cell;
use rayon::prelude::*;
use russell_lab::{Matrix, Vector};
use std::collections::HashMap;

/// Defines a generic finite element, wrapping an "actual" implementation
pub struct GenericElement {
    /// Holds the index of the cell
    pub cell: usize,

    /// Connects to the "actual" implementation of local equations
    pub actual: Box<dyn ElementTrait>,

    /// Holds the local-to-global map (equation ids of the local entries)
    pub lm: Vec<EqId>,

    /// Holds the local internal force vector
    pub f_int: Vector,

    /// Holds the local stiffness matrix
    pub kk: Matrix,
}

/// Holds a collection of (generic) finite elements
pub struct Elements {
    /// All elements
    pub all: Vec<GenericElement>,

    /// Maps cell index to element index (rigid cells have no element)
    index: Vec<Option<usize>>,
}

impl GenericElement {
    /// Allocates a new instance
    ///
    /// Returns None for cells without local equations (rigid cells).
    pub fn new(mesh: &Mesh, cell: &Cell, etype: &Etype) -> Result<Option<Self>, StrError> {
        let actual: Box<dyn ElementTrait> = match etype {
            Etype::Solid(p) => Box::new(ElementSolid::new(mesh, cell, p)?),
            Etype::Diffusion(p) => Box::new(ElementDiffusion::new(mesh, cell, p)?),
            Etype::Spring(p) => Box::new(ElementSpring::new(cell, p)?),
            Etype::Rigid(..) => return Ok(None),
        };
        let neq = actual.nodes().len() * actual.dofs().len();
        Ok(Some(GenericElement {
            cell: cell.id,
            actual,
            lm: Vec::new(),
            f_int: Vector::new(neq),
            kk: Matrix::new(neq, neq),
        }))
    }

    /// Sets the local-to-global map (after the equation numbers have been assigned)
    pub fn set_equations(&mut self, mesh: &Mesh) -> Result<(), StrError> {
        self.lm = local_to_global(mesh, self.actual.nodes(), self.actual.dofs())?;
        Ok(())
    }
}

impl Elements {
    /// Allocates new instance
    pub fn new(mesh: &Mesh, attributes: &HashMap<usize, Etype>) -> Result<Self, StrError> {
        let mut all = Vec::new();
        let mut index = vec![None; mesh.cells.len()];
        for cell in &mesh.cells {
            let etype = attributes
                .get(&cell.attribute)
                .ok_or("cannot find element type corresponding to the cell attribute")?;
            if let Some(element) = GenericElement::new(mesh, cell, etype)? {
                index[cell.id] = Some(all.len());
                all.push(element);
            }
        }
        Ok(Elements { all, index })
    }

    /// Sets the local-to-global maps of all elements
    pub fn set_equations(&mut self, mesh: &Mesh) -> Result<(), StrError> {
        self.all.iter_mut().map(|e| e.set_equations(mesh)).collect()
    }

    /// Returns the element corresponding to a cell
    pub fn find(&self, cell: usize) -> Option<&GenericElement> {
        match self.index.get(cell) {
            Some(Some(e)) => self.all.get(*e),
            _ => None,
        }
    }

    /// Returns whether all local stiffness matrices are symmetric or not
    pub fn all_symmetric(&self) -> bool {
        self.all.iter().all(|e| e.actual.symmetric_stiffness())
    }

    /// Updates secondary values such as stresses (in parallel)
    ///
    /// Note that the nodal state in the mesh has been updated already
    pub fn update_stresses(&mut self, mesh: &Mesh) -> Result<(), StepFailure> {
        self.all.par_iter_mut().map(|e| e.actual.update_stresses(mesh)).collect()
    }

    /// Computes the internal force vectors (in parallel)
    pub fn calc_internal_forces(&mut self, mesh: &Mesh) -> Result<(), StepFailure> {
        self.all
            .par_iter_mut()
            .map(|e| e.actual.calc_internal_force(&mut e.f_int, mesh))
            .collect()
    }

    /// Computes the stiffness matrices (in parallel)
    pub fn calc_stiffnesses(&mut self, mesh: &Mesh) -> Result<(), StepFailure> {
        self.all
            .par_iter_mut()
            .map(|e| e.actual.calc_stiffness(&mut e.kk, mesh))
            .collect()
    }

    /// Adds the free equations of all elements to the stiffness profile
    pub fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) {
        for e in &self.all {
            assembler.profile(profile, e.actual.nodes(), e.actual.dofs(), &e.lm);
        }
    }

    /// Assembles the internal forces into the global residual (R = F_ext - F_int)
    ///
    /// **Note:** You must call calc_internal_forces first
    pub fn assemble_internal_forces(&self, assembler: &Assembler, out: &mut GlobalResidual) -> Result<(), StrError> {
        for e in &self.all {
            assembler.vector(out, e.actual.nodes(), e.actual.dofs(), &e.lm, &e.f_int, -1.0)?;
        }
        Ok(())
    }

    /// Assembles the stiffness matrices into the global matrix
    ///
    /// **Note:** You must call calc_stiffnesses first
    pub fn assemble_stiffnesses(
        &self,
        assembler: &Assembler,
        kk: &mut GlobalMatrix,
        fd: &mut Vector,
        dup: &Vector,
    ) -> Result<(), StrError> {
        for e in &self.all {
            assembler.matrix(kk, fd, e.actual.nodes(), e.actual.dofs(), &e.lm, &e.kk, dup)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Elements;
    use crate::base::{Assembler, Dof, DofConfig, Equations, Essential, Etype, GlobalResidual, Mesh};
    use crate::base::{GlobalMatrix, ParamRigid, ParamSolid, ParamSpring, SampleMeshes, StiffnessProfile};
    use gemlab::shapes::GeoKind;
    use russell_lab::{approx_eq, Vector};
    use russell_sparse::Sym;
    use std::collections::HashMap;

    #[test]
    fn new_captures_errors() {
        let mesh = SampleMeshes::block(DofConfig::solid(), [0.0; 3], [1.0; 3], [1, 1, 1], 1).unwrap();
        let att = HashMap::from([(1, Etype::Spring(ParamSpring { stiffness: 1.0 }))]);
        assert_eq!(Elements::new(&mesh, &att).err(), Some("spring element requires a Lin2 cell"));
        let att = HashMap::from([(2, Etype::Spring(ParamSpring { stiffness: 1.0 }))]);
        assert_eq!(
            Elements::new(&mesh, &att).err(),
            Some("cannot find element type corresponding to the cell attribute")
        );
    }

    #[test]
    fn rigid_cells_are_skipped() {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), 0.0).unwrap();
        let att = HashMap::from([
            (1, Etype::Solid(ParamSolid::sample_neo_hookean())),
            (2, Etype::Rigid(ParamRigid { density: 1.0 })),
        ]);
        let elements = Elements::new(&mesh, &att).unwrap();
        assert_eq!(elements.all.len(), 1);
        assert_eq!(elements.find(0).map(|e| e.cell), Some(0));
        assert!(elements.find(1).is_none());
        assert!(elements.find(7).is_none());
        assert!(elements.all_symmetric());
    }

    #[test]
    fn assembly_of_springs_works() {
        // 0 ---- 1 ---- 2  (node 0 fixed, node 1 moved by 0.1 along x)
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let mut mesh = Mesh::new(
            DofConfig::solid(),
            &xx,
            &[(1, GeoKind::Lin2, &[0, 1]), (1, GeoKind::Lin2, &[1, 2])],
        )
        .unwrap();
        let att = HashMap::from([(1, Etype::Spring(ParamSpring { stiffness: 10.0 }))]);
        let mut essential = Essential::new();
        essential.fix(&[0], &[Dof::Ux, Dof::Uy, Dof::Uz]);
        let eqs = Equations::build(&mut mesh, &att, &mut [], &essential).unwrap();
        let mut elements = Elements::new(&mesh, &att).unwrap();
        elements.set_equations(&mesh).unwrap();
        mesh.nodes[1].set_value(Dof::Ux, 0.1);

        let assembler = Assembler::new(&mesh, &[]);
        elements.calc_internal_forces(&mesh).unwrap();
        let mut out = GlobalResidual::new(eqs.n_equation, 0, 0);
        elements.assemble_internal_forces(&assembler, &mut out).unwrap();
        // R = -F_int: node 1 is pulled back by the first spring and forward by the second
        approx_eq(out.rr[0], -1.0 - 1.0, 1e-15);
        approx_eq(out.rr[3], 1.0, 1e-15);

        let mut profile = StiffnessProfile::new(eqs.n_equation);
        elements.profile(&assembler, &mut profile);
        let mut kk = GlobalMatrix::new(profile, Sym::No).unwrap();
        let mut fd = Vector::new(eqs.n_equation);
        elements.calc_stiffnesses(&mesh).unwrap();
        elements
            .assemble_stiffnesses(&assembler, &mut kk, &mut fd, &Vector::new(0))
            .unwrap();
        approx_eq(kk.get(0, 0), 20.0, 1e-15);
        approx_eq(kk.get(0, 3), -10.0, 1e-15);
        approx_eq(kk.get(3, 3), 10.0, 1e-15);
    }
}
