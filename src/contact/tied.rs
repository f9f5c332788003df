use super::{closest_point, AugmentationNorms, ContactSurface, FacetShape, LocalContact, PointStatus};
use crate::base::{local_to_global, Assembler, Dof, Mesh, ParamContact, StiffnessProfile};
use crate::fem::{Elements, StepFailure};
use crate::StrError;
use rayon::prelude::*;
use russell_lab::{mat_t_mat_mul, vec_mat_mul, Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Holds the tie of a slave point to a master facet
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tie {
    /// Index of the point in the slave surface
    pub point: usize,

    /// Master facet
    pub facet: usize,

    /// Natural coordinates of the tied point on the facet
    pub rs: [f64; 2],

    /// Initial gap vector x_s - y (kept constant)
    pub gap0: [f64; 3],

    /// Current gap vector relative to the initial one
    pub gap: [f64; 3],

    /// Lagrange multipliers (vector)
    pub lm: [f64; 3],
}

impl Tie {
    /// Returns the traction t = λ - ε (g - g₀) acting on the slave point
    pub fn traction(&self, eps: f64) -> [f64; 3] {
        [
            self.lm[0] - eps * self.gap[0],
            self.lm[1] - eps * self.gap[1],
            self.lm[2] - eps * self.gap[2],
        ]
    }
}

/// Implements a tied interface gluing a slave surface to a master surface
///
/// Each slave point is tied to the material point of the master surface closest to it in the
/// initial configuration. The relative motion is penalized in all directions:
///
/// ```text
/// t = λ - ε (x_s - y(r,s) - g₀)      G = [I, -N_b I]
/// f_int = -w Gᵀ t                      K = w ε Gᵀ G
/// ```
///
/// Points farther than `search_radius` from the master surface are left free. The ties never
/// change, hence the topology generation is constant.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TiedInterface {
    /// Parameters
    pub param: ParamContact,

    /// Slave surface
    pub slave: ContactSurface,

    /// Master surface
    pub master: ContactSurface,

    /// Ties of the slave points
    pub ties: Vec<Tie>,
}

impl TiedInterface {
    /// Allocates a new instance
    pub fn new(param: ParamContact, slave: ContactSurface, master: ContactSurface) -> Result<Self, StrError> {
        param.validate()?;
        Ok(TiedInterface {
            param,
            slave,
            master,
            ties: Vec::new(),
        })
    }

    /// Computes the penalty factors and ties the slave points to the master surface
    pub fn initialize(&mut self, mesh: &Mesh, elements: &Elements) -> Result<(), StrError> {
        self.slave.set_penalty(&self.param, mesh, elements)?;
        let mut shape = FacetShape::new()?;
        let candidates: Vec<usize> = (0..self.master.facets.len()).collect();
        self.ties.clear();
        for (p, point) in self.slave.points.iter_mut().enumerate() {
            let found = closest_point(
                &mut shape,
                mesh,
                point.node,
                &self.master,
                &candidates,
                [0.0, 0.0],
                self.param.stol,
            )?;
            let projection = match found {
                Some(projection) => projection,
                None => continue,
            };
            let x = &mesh.nodes[point.node].rt;
            let gap0 = [
                x[0] - projection.point[0],
                x[1] - projection.point[1],
                x[2] - projection.point[2],
            ];
            let distance = f64::sqrt(gap0.iter().map(|g| g * g).sum::<f64>());
            if distance > self.param.search_radius {
                continue;
            }
            point.status = PointStatus::Closed;
            point.master = Some(self.master.reference(projection.facet));
            point.rs = projection.rs;
            point.normal = projection.normal;
            point.gap = projection.gap;
            self.ties.push(Tie {
                point: p,
                facet: projection.facet,
                rs: projection.rs,
                gap0,
                gap: [0.0; 3],
                lm: [0.0; 3],
            });
        }
        log::debug!("{} of {} slave points tied", self.ties.len(), self.slave.points.len());
        Ok(())
    }

    /// Updates the gap vectors (after the nodal positions have changed)
    pub fn update(&mut self, mesh: &Mesh) -> Result<(), StrError> {
        let (slave, master) = (&self.slave, &self.master);
        self.ties
            .par_iter_mut()
            .map_init(FacetShape::new, |shape, tie| -> Result<(), StrError> {
                let shape = shape.as_mut().map_err(|e| *e)?;
                shape.set_coordinates(&master.coordinates(mesh, tie.facet));
                let y = shape.calc_position(tie.rs)?;
                let x = &mesh.nodes[slave.points[tie.point].node].rt;
                for i in 0..3 {
                    tie.gap[i] = x[i] - y[i] - tie.gap0[i];
                }
                Ok(())
            })
            .collect::<Result<(), StrError>>()
    }

    /// Returns the nodes of a tie: the slave node followed by the facet nodes
    fn nodes(&self, tie: &Tie) -> Vec<usize> {
        let mut nodes = vec![self.slave.points[tie.point].node];
        nodes.extend_from_slice(&self.master.facets[tie.facet]);
        nodes
    }

    /// Computes the local contributions of all ties (in parallel)
    pub(crate) fn local_contributions(&self, with_stiffness: bool) -> Result<Vec<LocalContact>, StrError> {
        self.ties
            .par_iter()
            .map_init(FacetShape::new, |shape, tie| -> Result<LocalContact, StrError> {
                let shape = shape.as_mut().map_err(|e| *e)?;
                let point = &self.slave.points[tie.point];
                let nn = shape.calc_interp(tie.rs);
                let mut gg = Matrix::new(3, 15);
                for i in 0..3 {
                    gg.set(i, i, 1.0);
                    for b in 0..4 {
                        gg.set(i, 3 + 3 * b + i, -nn[b]);
                    }
                }
                let traction = Vector::from(&tie.traction(point.eps));
                let mut f_int = Vector::new(15);
                vec_mat_mul(&mut f_int, -point.weight, &traction, &gg)?;
                let mut kk = Matrix::new(15, 15);
                if with_stiffness {
                    mat_t_mat_mul(&mut kk, point.weight * point.eps, &gg, &gg, 0.0)?;
                }
                Ok(LocalContact {
                    nodes: self.nodes(tie),
                    f_int,
                    kk,
                })
            })
            .collect()
    }

    /// Adds the equations of all ties to the stiffness profile
    pub fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError> {
        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        for tie in &self.ties {
            let nodes = self.nodes(tie);
            let lm = local_to_global(assembler.mesh, &nodes, &dofs)?;
            assembler.profile(profile, &nodes, &dofs, &lm);
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
        for tie in &self.ties {
            let eps = self.slave.points[tie.point].eps;
            let t = tie.traction(eps);
            for i in 0..3 {
                norms.old += tie.lm[i] * tie.lm[i];
                norms.new += t[i] * t[i];
            }
            let g = f64::sqrt(tie.gap.iter().map(|g| g * g).sum::<f64>());
            norms.max_gap = f64::max(norms.max_gap, g);
        }
        let converged = norms.converged(&self.param, naug)?;
        if !converged {
            for tie in &mut self.ties {
                tie.lm = tie.traction(self.slave.points[tie.point].eps);
            }
        }
        Ok(converged)
    }

    /// Returns the resultant force acting on the slave surface
    pub fn force(&self) -> [f64; 3] {
        let mut total = [0.0; 3];
        for tie in &self.ties {
            let point = &self.slave.points[tie.point];
            let t = tie.traction(point.eps);
            for i in 0..3 {
                total[i] += point.weight * t[i];
            }
        }
        total
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::TiedInterface;
    use crate::base::{DofConfig, Etype, Mesh, ParamContact, ParamSolid, SampleMeshes};
    use crate::contact::{ContactSurface, PointStatus};
    use crate::fem::{Elements, StepFailure};
    use russell_lab::approx_eq;
    use std::collections::HashMap;

    fn cubes(gap: f64, param: ParamContact) -> (Mesh, TiedInterface) {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), gap).unwrap();
        let slave = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
        let master = ContactSurface::new(&mesh, &[(1, 4)]).unwrap();
        let interface = TiedInterface::new(param, slave, master).unwrap();
        (mesh, interface)
    }

    fn initialize(mesh: &Mesh, interface: &mut TiedInterface) {
        let att = HashMap::from([
            (1, Etype::Solid(ParamSolid::sample_neo_hookean())),
            (2, Etype::Solid(ParamSolid::sample_neo_hookean())),
        ]);
        let elements = Elements::new(mesh, &att).unwrap();
        interface.initialize(mesh, &elements).unwrap();
    }

    #[test]
    fn initialize_ties_the_close_points() {
        let (mesh, mut interface) = cubes(0.02, ParamContact::new(1e4));
        initialize(&mesh, &mut interface);
        assert_eq!(interface.ties.len(), 4);
        for tie in &interface.ties {
            approx_eq(tie.gap0[2], -0.02, 1e-14);
            assert_eq!(interface.slave.points[tie.point].status, PointStatus::Closed);
        }

        // too far
        let mut param = ParamContact::new(1e4);
        param.search_radius = 0.01;
        let (mesh, mut interface) = cubes(0.02, param);
        initialize(&mesh, &mut interface);
        assert_eq!(interface.ties.len(), 0);
    }

    #[test]
    fn separation_is_resisted() {
        let mut param = ParamContact::new(1e4);
        param.augmented = true;
        param.naugmax = 1;
        let (mut mesh, mut interface) = cubes(0.0, param);
        initialize(&mesh, &mut interface);
        interface.update(&mesh).unwrap();
        assert_eq!(interface.force(), [0.0, 0.0, 0.0]);

        // pull the upper cube up
        for n in 8..16 {
            mesh.nodes[n].rt[2] += 0.01;
        }
        interface.update(&mesh).unwrap();
        for tie in &interface.ties {
            approx_eq(tie.gap[2], -0.01, 1e-15);
        }
        let force = interface.force();
        approx_eq(force[2], 100.0, 1e-10);

        let local = interface.local_contributions(true).unwrap();
        assert_eq!(local.len(), 4);
        let mut sum = 0.0;
        for c in &local {
            approx_eq(c.f_int[2], -25.0, 1e-10);
            sum += c.f_int[2];
            for k in 0..4 {
                sum += c.f_int[3 + 3 * k + 2];
            }
            approx_eq(c.kk.get(2, 2), 0.25 * 1e4, 1e-10);
        }
        approx_eq(sum, 0.0, 1e-10);

        // λ = 100 after the first augmentation, then the limit is reached
        assert_eq!(interface.augment(0), Ok(false));
        approx_eq(interface.ties[0].lm[2], 100.0, 1e-10);
        assert_eq!(interface.augment(1), Err(StepFailure::AugmentationLimit { augmentations: 1 }));
    }
}
