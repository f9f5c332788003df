use super::{AugmentationNorms, ContactSurface, LocalContact, PointStatus};
use crate::base::{local_to_global, Assembler, Dof, LoadCurve, Mesh, ParamContact, StiffnessProfile};
use crate::fem::{Elements, StepFailure};
use crate::StrError;
use rayon::prelude::*;
use russell_lab::{vec_add, vec_inner, vec_norm, vec_outer, vec_update, Matrix, Norm, Vector};
use serde::{Deserialize, Serialize};

/// Implements the contact between a surface and a rigid plane
///
/// The plane passes through `origin + d(t) n`, where `n` is the unit normal pointing towards
/// the free side and `d(t) = motion × curve(t)`. The gap of a slave node at x is:
///
/// ```text
/// g = (x - origin - d(t) n)·n - offset
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RigidWall {
    /// Parameters
    pub param: ParamContact,

    /// Slave surface
    pub slave: ContactSurface,

    /// A point on the plane (reference configuration)
    pub origin: [f64; 3],

    /// Unit normal of the plane
    pub normal: [f64; 3],

    /// Magnitude of the motion along the normal
    pub motion: f64,

    /// Time multiplier of the motion
    pub curve: LoadCurve,

    /// Current displacement of the plane along the normal
    pub displacement: f64,

    /// Incremented whenever a slave point changes status
    pub generation: usize,
}

impl RigidWall {
    /// Allocates a new instance
    pub fn new(
        param: ParamContact,
        slave: ContactSurface,
        origin: [f64; 3],
        normal: [f64; 3],
        motion: f64,
        curve: LoadCurve,
    ) -> Result<Self, StrError> {
        param.validate()?;
        let len = vec_norm(&Vector::from(&normal), Norm::Euc);
        if len <= 0.0 {
            return Err("wall normal must not be zero");
        }
        Ok(RigidWall {
            param,
            slave,
            origin,
            normal: [normal[0] / len, normal[1] / len, normal[2] / len],
            motion,
            curve,
            displacement: 0.0,
            generation: 0,
        })
    }

    /// Computes the penalty factors and the initial gaps
    pub fn initialize(&mut self, mesh: &Mesh, elements: &Elements) -> Result<(), StrError> {
        self.slave.set_penalty(&self.param, mesh, elements)?;
        self.update(mesh)
    }

    /// Moves the plane to its position at time t
    pub fn set_time(&mut self, t: f64) {
        self.displacement = self.motion * self.curve.value(t);
    }

    /// Updates the gaps
    pub fn update(&mut self, mesh: &Mesh) -> Result<(), StrError> {
        let n = Vector::from(&self.normal);
        let mut p = Vector::from(&self.origin);
        vec_update(&mut p, self.displacement, &n)?;
        let param = &self.param;
        let normal = self.normal;
        let changes: Vec<bool> = self
            .slave
            .points
            .par_iter_mut()
            .map(|point| -> Result<bool, StrError> {
                let before = point.status;
                let mut d = Vector::new(3);
                vec_add(&mut d, 1.0, &Vector::from(&mesh.nodes[point.node].rt), -1.0, &p)?;
                let gap = vec_inner(&d, &n) - param.offset;
                if gap > -param.search_radius {
                    point.status = PointStatus::Closed;
                    point.gap = gap;
                    point.normal = normal;
                } else {
                    point.open();
                }
                Ok(point.status != before)
            })
            .collect::<Result<_, StrError>>()?;
        if changes.into_iter().any(|c| c) {
            self.generation += 1;
        }
        Ok(())
    }

    /// Computes the local contributions of all points with positive traction
    pub(crate) fn local_contributions(&self, with_stiffness: bool) -> Result<Vec<LocalContact>, StrError> {
        let n = Vector::from(&self.normal);
        self.slave
            .points
            .par_iter()
            .filter(|point| point.traction() > 0.0)
            .map(|point| -> Result<LocalContact, StrError> {
                let w = point.weight;
                let mut f_int = Vector::new(3);
                let mut kk = Matrix::new(3, 3);
                vec_update(&mut f_int, -w * point.traction(), &n)?;
                if with_stiffness {
                    vec_outer(&mut kk, w * point.eps, &n, &n)?;
                }
                Ok(LocalContact {
                    nodes: vec![point.node],
                    f_int,
                    kk,
                })
            })
            .collect()
    }

    /// Adds the equations of the closed points to the stiffness profile
    pub fn profile(&self, assembler: &Assembler, profile: &mut StiffnessProfile) -> Result<(), StrError> {
        let dofs = [Dof::Ux, Dof::Uy, Dof::Uz];
        for point in &self.slave.points {
            if point.status == PointStatus::Closed {
                let lm = local_to_global(assembler.mesh, &[point.node], &dofs)?;
                assembler.profile(profile, &[point.node], &dofs, &lm);
            }
        }
        Ok(())
    }

    /// Performs an augmentation (see [super::SlidingInterface::augment])
    pub fn augment(&mut self, naug: usize) -> Result<bool, StepFailure> {
        if !self.param.augmented {
            return Ok(true);
        }
        let mut norms = AugmentationNorms::default();
        self.slave.augmentation_norms(&mut norms);
        let converged = norms.converged(&self.param, naug)?;
        if !converged {
            self.slave.update_multipliers();
        }
        Ok(converged)
    }

    /// Returns the resultant contact force acting on the slave surface
    pub fn force(&self) -> [f64; 3] {
        let mut total = [0.0; 3];
        for point in &self.slave.points {
            let tn = point.traction();
            for i in 0..3 {
                total[i] += point.weight * tn * self.normal[i];
            }
        }
        total
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
