use super::{ElementTrait, StepFailure};
use crate::base::{Dof, Mesh, ParamSpring};
use crate::StrError;
use gemlab::mesh::Cell;
use gemlab::shapes::GeoKind;
use russell_lab::{Matrix, Vector};

/// Implements a linear spring connecting two nodes
///
/// ```text
/// f_a = k (u_a - u_b)    f_b = -f_a
/// ```
pub struct ElementSpring {
    nodes: Vec<usize>,
    dofs: Vec<Dof>,
    stiffness: f64,
}

impl ElementSpring {
    /// Allocates a new instance
    pub fn new(cell: &Cell, param: &ParamSpring) -> Result<Self, StrError> {
        if cell.kind != GeoKind::Lin2 {
            return Err("spring element requires a Lin2 cell");
        }
        if param.stiffness <= 0.0 {
            return Err("spring stiffness must be > 0.0");
        }
        Ok(ElementSpring {
            nodes: cell.points.clone(),
            dofs: vec![Dof::Ux, Dof::Uy, Dof::Uz],
            stiffness: param.stiffness,
        })
    }
}

impl ElementTrait for ElementSpring {
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
        let ua = mesh.nodes[self.nodes[0]].displacement();
        let ub = mesh.nodes[self.nodes[1]].displacement();
        for i in 0..3 {
            let f = self.stiffness * (ua[i] - ub[i]);
            f_int[i] = f;
            f_int[3 + i] = -f;
        }
        Ok(())
    }

    fn calc_stiffness(&self, kk: &mut Matrix, _mesh: &Mesh) -> Result<(), StepFailure> {
        kk.fill(0.0);
        for i in 0..3 {
            kk.set(i, i, self.stiffness);
            kk.set(3 + i, 3 + i, self.stiffness);
            kk.set(i, 3 + i, -self.stiffness);
            kk.set(3 + i, i, -self.stiffness);
        }
        Ok(())
    }

    fn volume(&self) -> f64 {
        0.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ElementSpring;
    use crate::base::{Dof, DofConfig, Mesh, ParamSpring};
    use crate::fem::ElementTrait;
    use gemlab::shapes::GeoKind;
    use russell_lab::{approx_eq, Matrix, Vector};

    #[test]
    fn spring_works() {
        let xx = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let mut mesh = Mesh::new(DofConfig::solid(), &xx, &[(1, GeoKind::Lin2, &[0, 1])]).unwrap();
        assert_eq!(
            ElementSpring::new(&mesh.cells[0], &ParamSpring { stiffness: 0.0 }).err(),
            Some("spring stiffness must be > 0.0")
        );
        let spring = ElementSpring::new(&mesh.cells[0], &ParamSpring { stiffness: 10.0 }).unwrap();
        mesh.nodes[1].set_value(Dof::Ux, 0.2);
        mesh.nodes[1].set_value(Dof::Uz, -0.1);
        let mut f = Vector::new(6);
        spring.calc_internal_force(&mut f, &mesh).unwrap();
        let correct = [-2.0, 0.0, 1.0, 2.0, 0.0, -1.0];
        for i in 0..6 {
            approx_eq(f[i], correct[i], 1e-15);
        }

        // K u = f_int for a linear spring
        let mut kk = Matrix::new(6, 6);
        spring.calc_stiffness(&mut kk, &mesh).unwrap();
        let u = [0.0, 0.0, 0.0, 0.2, 0.0, -0.1];
        for i in 0..6 {
            let ku: f64 = (0..6).map(|j| kk.get(i, j) * u[j]).sum();
            approx_eq(ku, f[i], 1e-15);
        }
    }
}
