use super::FacetShape;
use crate::base::{Mesh, ParamContact};
use crate::fem::{Elements, StepFailure};
use crate::StrError;
use gemlab::shapes::GeoKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// References a facet of the opposing surface
///
/// The reference is valid only while `generation` matches the generation of the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ElementRef {
    /// Facet index
    pub index: usize,

    /// Generation of the surface when the reference was taken
    pub generation: usize,
}

/// Defines the contact status of a slave point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum PointStatus {
    /// No valid projection
    Open,

    /// Projected onto the opposing surface
    Closed,
}

/// Holds the contact data of a slave point (nodal integration)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContactPoint {
    /// Node index
    pub node: usize,

    /// Integration weight (reference area of the point)
    pub weight: f64,

    /// Penalty factor
    pub eps: f64,

    /// Contact status
    pub status: PointStatus,

    /// Projected facet of the opposing surface
    pub master: Option<ElementRef>,

    /// Natural coordinates of the projection
    pub rs: [f64; 2],

    /// Natural coordinates of the projection at the end of the previous time step
    pub rs_prev: [f64; 2],

    /// Normal gap (negative means penetration)
    pub gap: f64,

    /// Unit normal of the opposing surface at the projection
    pub normal: [f64; 3],

    /// Lagrange multiplier
    pub lm: f64,

    /// Projected facet at the end of the previous time step
    pub master_prev: Option<ElementRef>,

    /// Tangential slip since the previous time step (spatial vector)
    pub slip: [f64; 3],

    /// Tangential traction at the end of the previous time step
    pub lt: [f64; 3],
}

impl ContactPoint {
    /// Allocates an open point
    pub fn new(node: usize, weight: f64) -> Self {
        ContactPoint {
            node,
            weight,
            eps: 0.0,
            status: PointStatus::Open,
            master: None,
            rs: [0.0; 2],
            rs_prev: [0.0; 2],
            gap: 0.0,
            normal: [0.0; 3],
            lm: 0.0,
            master_prev: None,
            slip: [0.0; 3],
            lt: [0.0; 3],
        }
    }

    /// Returns the normal traction `max(0, lm - eps·g)` (zero if open)
    pub fn traction(&self) -> f64 {
        match self.status {
            PointStatus::Open => 0.0,
            PointStatus::Closed => f64::max(0.0, self.lm - self.eps * self.gap),
        }
    }

    /// Returns the increment of the natural coordinates since the previous time step
    ///
    /// The increment is zero if the point was projected onto another facet.
    pub fn natural_slip(&self) -> [f64; 2] {
        if self.master.is_none() || self.master != self.master_prev {
            return [0.0; 2];
        }
        [self.rs[0] - self.rs_prev[0], self.rs[1] - self.rs_prev[1]]
    }

    /// Returns the tangential (friction) traction and its ratio to the stick trial traction
    ///
    /// ```text
    /// t* = P (Lt - εf s)          P = I - ν ⊗ ν
    /// tₜ = t*                     if |t*| ≤ μ tₙ  (stick)
    /// tₜ = μ tₙ t*/|t*|           otherwise       (slip)
    /// ```
    ///
    /// `Lt` is the traction at the end of the previous step and `s` is the slip since then.
    pub fn friction_traction(&self, mu: f64, epsf: f64) -> ([f64; 3], f64) {
        let tn = self.traction();
        if mu <= 0.0 || tn <= 0.0 {
            return ([0.0; 3], 0.0);
        }
        let nu = &self.normal;
        let mut trial = [0.0; 3];
        for i in 0..3 {
            trial[i] = self.lt[i] - epsf * self.slip[i];
        }
        let tn_trial: f64 = (0..3).map(|i| trial[i] * nu[i]).sum();
        for i in 0..3 {
            trial[i] -= tn_trial * nu[i];
        }
        let len = f64::sqrt((0..3).map(|i| trial[i] * trial[i]).sum());
        let limit = mu * tn;
        if len <= limit {
            (trial, 1.0)
        } else {
            let ratio = limit / len;
            ([ratio * trial[0], ratio * trial[1], ratio * trial[2]], ratio)
        }
    }

    /// Marks the point as open and clears its multipliers
    pub fn open(&mut self) {
        self.status = PointStatus::Open;
        self.master = None;
        self.gap = 0.0;
        self.lm = 0.0;
        self.slip = [0.0; 3];
        self.lt = [0.0; 3];
    }
}

/// Accumulates the data needed to check the augmentations
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct AugmentationNorms {
    /// Sum of squares of the current multipliers
    pub old: f64,

    /// Sum of squares of the updated multipliers
    pub new: f64,

    /// Maximum penetration
    pub max_gap: f64,
}

impl AugmentationNorms {
    /// Decides whether the augmentations have converged
    ///
    /// Returns an error if the maximum number of augmentations has been reached.
    pub fn converged(&self, param: &ParamContact, naug: usize) -> Result<bool, StepFailure> {
        let norm0 = f64::sqrt(self.old);
        let norm1 = f64::sqrt(self.new);
        let pctn = if norm1 > 0.0 { f64::abs((norm1 - norm0) / norm1) } else { 0.0 };
        let mut converged = true;
        if param.atol > 0.0 && pctn >= param.atol {
            converged = false;
        }
        if param.gtol > 0.0 && self.max_gap >= param.gtol {
            converged = false;
        }
        if naug < param.naugmin {
            converged = false;
        }
        log::debug!(
            "augmentation {}: multipliers {:.3e} → {:.3e} ({:.3e}), max penetration {:.3e}",
            naug,
            norm0,
            norm1,
            pctn,
            self.max_gap
        );
        if !converged && naug >= param.naugmax {
            return Err(StepFailure::AugmentationLimit { augmentations: naug });
        }
        Ok(converged)
    }
}

/// Holds a contact surface made of Qua4 facets (faces of Hex8 cells)
///
/// Each node of the surface is a contact point with a weight equal to a quarter of the
/// reference area of each adjacent facet.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContactSurface {
    /// Node indices of the facets (counterclockwise when seen from outside)
    pub facets: Vec<[usize; 4]>,

    /// Cell under each facet
    pub cells: Vec<usize>,

    /// Contact points (one per surface node)
    pub points: Vec<ContactPoint>,

    /// Incremented whenever the facets change; invalidates references to this surface
    pub generation: usize,

    /// Point indices of the facet nodes
    local: Vec<[usize; 4]>,

    /// Facets adjacent to each point
    point_facets: Vec<Vec<usize>>,
}

impl ContactSurface {
    /// Allocates a new surface given (cell, face) pairs
    ///
    /// The cells must be Hex8 and the face index follows the local numbering of gemlab:
    ///
    /// ```text
    /// 0: x-    1: x+    2: y-    3: y+    4: z- (bottom)    5: z+ (top)
    /// ```
    ///
    /// The facet nodes are counterclockwise when seen from outside the cell.
    pub fn new(mesh: &Mesh, faces: &[(usize, usize)]) -> Result<Self, StrError> {
        if faces.is_empty() {
            return Err("contact surface must have at least one facet");
        }
        let mut facets = Vec::with_capacity(faces.len());
        let mut cells = Vec::with_capacity(faces.len());
        for (c, f) in faces {
            let cell = mesh.cells.get(*c).ok_or("contact surface refers to a non-existent cell")?;
            if cell.kind != GeoKind::Hex8 {
                return Err("contact surface requires Hex8 cells");
            }
            if *f >= cell.kind.nface() {
                return Err("face index must be < 6");
            }
            let mut facet = [0; 4];
            for (m, n) in facet.iter_mut().enumerate() {
                *n = cell.points[cell.kind.face_node(*f, m)];
            }
            facets.push(facet);
            cells.push(*c);
        }

        let mut index_of: HashMap<usize, usize> = HashMap::new();
        let mut nodes: Vec<usize> = facets.iter().flatten().copied().collect();
        nodes.sort();
        nodes.dedup();
        for (p, n) in nodes.iter().enumerate() {
            index_of.insert(*n, p);
        }
        let mut local = Vec::with_capacity(facets.len());
        let mut point_facets = vec![Vec::new(); nodes.len()];
        let mut weights = vec![0.0; nodes.len()];
        let mut shape = FacetShape::new()?;
        for (f, facet) in facets.iter().enumerate() {
            let mut ids = [0; 4];
            for m in 0..4 {
                ids[m] = index_of[&facet[m]];
                point_facets[ids[m]].push(f);
            }
            shape.set_coordinates(&reference_coordinates(mesh, facet));
            let area = shape.calc_area()?;
            for m in 0..4 {
                weights[ids[m]] += 0.25 * area;
            }
            local.push(ids);
        }
        let points = nodes
            .iter()
            .zip(weights)
            .map(|(n, w)| ContactPoint::new(*n, w))
            .collect();
        Ok(ContactSurface {
            facets,
            cells,
            points,
            generation: 0,
            local,
            point_facets,
        })
    }

    /// Returns the facet index of a reference, or None if the reference is stale
    pub fn resolve(&self, reference: ElementRef) -> Option<usize> {
        if reference.generation == self.generation && reference.index < self.facets.len() {
            Some(reference.index)
        } else {
            None
        }
    }

    /// Returns a reference to a facet
    pub fn reference(&self, facet: usize) -> ElementRef {
        ElementRef {
            index: facet,
            generation: self.generation,
        }
    }

    /// Returns the current coordinates of the nodes of a facet
    pub fn coordinates(&self, mesh: &Mesh, facet: usize) -> [[f64; 3]; 4] {
        let nodes = &self.facets[facet];
        [
            mesh.nodes[nodes[0]].rt,
            mesh.nodes[nodes[1]].rt,
            mesh.nodes[nodes[2]].rt,
            mesh.nodes[nodes[3]].rt,
        ]
    }

    /// Returns the facets adjacent to a point
    pub fn facets_of_point(&self, point: usize) -> &[usize] {
        &self.point_facets[point]
    }

    /// Returns a facet and the facets sharing at least one node with it
    pub fn neighbors(&self, facet: usize) -> Vec<usize> {
        let mut all = vec![facet];
        for p in &self.local[facet] {
            for f in &self.point_facets[*p] {
                if !all.contains(f) {
                    all.push(*f);
                }
            }
        }
        all
    }

    /// Sets the penalty factor of all points
    ///
    /// With `auto_penalty`, the factor of each point is the average of `eps·E·A/V` over the
    /// adjacent facets, where E is the effective modulus and V the volume of the element under
    /// the facet and A is the area of the facet. Facets without an element (e.g., on rigid
    /// bodies) are skipped; if no adjacent facet has an element, the plain penalty is used.
    pub fn set_penalty(&mut self, param: &ParamContact, mesh: &Mesh, elements: &Elements) -> Result<(), StrError> {
        if !param.auto_penalty {
            self.points.iter_mut().for_each(|p| p.eps = param.penalty);
            return Ok(());
        }
        let mut shape = FacetShape::new()?;
        let mut facet_eps = vec![None; self.facets.len()];
        for f in 0..self.facets.len() {
            let element = match elements.find(self.cells[f]) {
                Some(e) => e,
                None => continue,
            };
            let modulus = element.actual.effective_modulus();
            let volume = element.actual.volume();
            if modulus <= 0.0 || volume <= 0.0 {
                continue;
            }
            shape.set_coordinates(&self.coordinates(mesh, f));
            facet_eps[f] = Some(param.penalty * modulus * shape.calc_area()? / volume);
        }
        for (p, point) in self.points.iter_mut().enumerate() {
            let values: Vec<f64> = self.point_facets[p].iter().filter_map(|f| facet_eps[*f]).collect();
            point.eps = if values.is_empty() {
                param.penalty
            } else {
                values.iter().sum::<f64>() / (values.len() as f64)
            };
        }
        Ok(())
    }

    /// Accumulates the norms of the multipliers before and after an augmentation
    pub(crate) fn augmentation_norms(&self, norms: &mut AugmentationNorms) {
        for point in &self.points {
            if point.status == PointStatus::Closed {
                norms.old += point.lm * point.lm;
                let lm = f64::max(0.0, point.lm - point.eps * point.gap);
                norms.new += lm * lm;
                norms.max_gap = f64::max(norms.max_gap, -point.gap);
            }
        }
    }

    /// Updates the multipliers of the closed points
    pub(crate) fn update_multipliers(&mut self) {
        for point in &mut self.points {
            if point.status == PointStatus::Closed {
                point.lm = f64::max(0.0, point.lm - point.eps * point.gap);
            }
        }
    }

    /// Stores the current projections and friction tractions as the start of the next time step
    pub fn commit(&mut self, mu: f64, epsf: f64) {
        for point in &mut self.points {
            let eps = if epsf > 0.0 { epsf } else { point.eps };
            let (tt, _) = point.friction_traction(mu, eps);
            point.lt = tt;
            point.slip = [0.0; 3];
            point.rs_prev = point.rs;
            point.master_prev = point.master;
        }
    }
}

/// Returns the reference coordinates of the nodes of a facet
fn reference_coordinates(mesh: &Mesh, facet: &[usize; 4]) -> [[f64; 3]; 4] {
    [
        mesh.nodes[facet[0]].r0,
        mesh.nodes[facet[1]].r0,
        mesh.nodes[facet[2]].r0,
        mesh.nodes[facet[3]].r0,
    ]
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{AugmentationNorms, ContactPoint, ContactSurface, ElementRef, PointStatus};
    use crate::base::{DofConfig, Etype, ParamContact, ParamSolid, SampleMeshes};
    use crate::fem::{Elements, StepFailure};
    use russell_lab::approx_eq;
    use std::collections::HashMap;

    #[test]
    fn new_captures_errors() {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), 0.0).unwrap();
        assert_eq!(
            ContactSurface::new(&mesh, &[]).err(),
            Some("contact surface must have at least one facet")
        );
        assert_eq!(
            ContactSurface::new(&mesh, &[(2, 0)]).err(),
            Some("contact surface refers to a non-existent cell")
        );
        assert_eq!(ContactSurface::new(&mesh, &[(0, 6)]).err(), Some("face index must be < 6"));
    }

    #[test]
    fn new_works() {
        // 2×2 block: the top faces (face 5) form a 3×3 grid of nodes
        let mesh = SampleMeshes::block(DofConfig::solid(), [0.0; 3], [2.0, 2.0, 1.0], [2, 2, 1], 1).unwrap();
        let surface = ContactSurface::new(&mesh, &[(0, 5), (1, 5), (2, 5), (3, 5)]).unwrap();
        assert_eq!(surface.facets.len(), 4);
        assert_eq!(surface.points.len(), 9);
        assert_eq!(surface.facets[0], [9, 10, 13, 12]);
        let bottom = ContactSurface::new(&mesh, &[(0, 4), (0, 2)]).unwrap();
        assert_eq!(bottom.facets[0], [0, 3, 4, 1]);
        assert_eq!(bottom.facets[1], [0, 1, 10, 9]);
        let total: f64 = surface.points.iter().map(|p| p.weight).sum();
        approx_eq(total, 4.0, 1e-14);
        // center node (13) is shared by the four facets
        let center = surface.points.iter().position(|p| p.node == 13).unwrap();
        approx_eq(surface.points[center].weight, 1.0, 1e-14);
        assert_eq!(surface.facets_of_point(center).len(), 4);
        assert_eq!(surface.neighbors(0).len(), 4);
    }

    #[test]
    fn friction_traction_works() {
        let mut point = ContactPoint::new(0, 1.0);
        point.status = PointStatus::Closed;
        point.eps = 1e4;
        point.gap = -0.01; // tₙ = 100
        point.normal = [0.0, 0.0, 1.0];
        point.slip = [0.001, 0.0, 0.0];
        point.lt = [0.0, 0.0, 3.0]; // the normal component is discarded
        assert_eq!(point.friction_traction(0.0, 1e4), ([0.0; 3], 0.0));

        // stick
        let (tt, ratio) = point.friction_traction(0.5, 1e4);
        approx_eq(tt[0], -10.0, 1e-12);
        approx_eq(tt[2], 0.0, 1e-15);
        assert_eq!(ratio, 1.0);

        // slip: the traction is limited by μ tₙ
        let (tt, ratio) = point.friction_traction(0.05, 1e4);
        approx_eq(tt[0], -5.0, 1e-12);
        approx_eq(ratio, 0.5, 1e-15);

        // commit stores the traction and clears the slip
        let mesh = SampleMeshes::column(DofConfig::solid(), 1.0, 1, 1).unwrap();
        let mut surface = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
        surface.points[0] = point;
        surface.commit(0.05, 1e4);
        approx_eq(surface.points[0].lt[0], -5.0, 1e-12);
        assert_eq!(surface.points[0].slip, [0.0; 3]);
    }

    #[test]
    fn references_become_stale() {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), 0.0).unwrap();
        let mut surface = ContactSurface::new(&mesh, &[(1, 4)]).unwrap();
        let reference = surface.reference(0);
        assert_eq!(reference, ElementRef { index: 0, generation: 0 });
        assert_eq!(surface.resolve(reference), Some(0));
        surface.generation += 1;
        assert_eq!(surface.resolve(reference), None);
        assert_eq!(surface.resolve(surface.reference(0)), Some(0));
        assert_eq!(surface.resolve(surface.reference(1)), None);
    }

    #[test]
    fn auto_penalty_works() {
        let mesh = SampleMeshes::block(DofConfig::solid(), [0.0; 3], [1.0, 1.0, 2.0], [1, 1, 1], 1).unwrap();
        let att = HashMap::from([(1, Etype::Solid(ParamSolid::sample_neo_hookean()))]);
        let elements = Elements::new(&mesh, &att).unwrap();
        let mut surface = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
        let mut param = ParamContact::new(2.0);
        surface.set_penalty(&param, &mesh, &elements).unwrap();
        approx_eq(surface.points[0].eps, 2.0, 1e-15);
        param.auto_penalty = true;
        surface.set_penalty(&param, &mesh, &elements).unwrap();
        // eps·E·A/V = 2 × E × 1 / 2
        let modulus = elements.all[0].actual.effective_modulus();
        assert!(modulus > 0.0);
        for point in &surface.points {
            approx_eq(point.eps, modulus, 1e-10);
        }
    }

    #[test]
    fn traction_and_augmentation_work() {
        let mut point = ContactPoint::new(0, 1.0);
        point.eps = 1e4;
        point.gap = -0.01;
        assert_eq!(point.traction(), 0.0); // open
        point.status = PointStatus::Closed;
        approx_eq(point.traction(), 100.0, 1e-12);
        point.gap = 0.01;
        assert_eq!(point.traction(), 0.0);
        point.rs = [0.5, -0.25];
        assert_eq!(point.natural_slip(), [0.0, 0.0]); // no previous facet
        point.master = Some(ElementRef { index: 2, generation: 0 });
        point.master_prev = point.master;
        assert_eq!(point.natural_slip(), [0.5, -0.25]);
        point.open();
        assert_eq!(point.status, PointStatus::Open);
        assert_eq!(point.master, None);

        let mut param = ParamContact::new(1e4);
        param.atol = 1e-3;
        param.naugmax = 3;
        let norms = AugmentationNorms {
            old: 0.0,
            new: 100.0 * 100.0,
            max_gap: 0.01,
        };
        assert_eq!(norms.converged(&param, 0), Ok(false));
        assert_eq!(
            norms.converged(&param, 3),
            Err(StepFailure::AugmentationLimit { augmentations: 3 })
        );
        let norms = AugmentationNorms {
            old: 100.0 * 100.0,
            new: 100.01 * 100.01,
            max_gap: 1e-6,
        };
        assert_eq!(norms.converged(&param, 1), Ok(true));
        param.naugmin = 2;
        assert_eq!(norms.converged(&param, 1), Ok(false));
        param.gtol = 1e-7;
        param.naugmin = 0;
        assert_eq!(norms.converged(&param, 1), Ok(false));
    }
}
