use super::{to_array, ContactSurface, FacetShape, PointStatus};
use crate::base::{Mesh, ParamContact};
use crate::StrError;
use rayon::prelude::*;
use russell_lab::{mat_inverse, vec_add, vec_inner, vec_norm, Matrix, Norm, Vector};

/// Maximum number of Newton iterations of the closest-point projection
const MAX_ITERATIONS: usize = 30;

/// Tolerance on the increment of the natural coordinates
const TOLERANCE: f64 = 1e-13;

/// Holds the result of a closest-point projection
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    /// Facet index
    pub facet: usize,

    /// Natural coordinates
    pub rs: [f64; 2],

    /// Projected point
    pub point: [f64; 3],

    /// Outward unit normal at the projected point
    pub normal: [f64; 3],

    /// Tangents at the projected point
    pub tangents: [[f64; 3]; 2],

    /// Normal gap (without offset)
    pub gap: f64,
}

/// Projects a point onto a facet by solving `(x - y(r,s))·y,α = 0` with Newton's method
///
/// The facet coordinates must have been set in `shape`. Returns None if the iterations do not
/// converge or if the projection falls outside the facet by more than `stol`. Otherwise, the
/// natural coordinates are clipped to [-1, 1].
pub fn project_to_facet(
    shape: &mut FacetShape,
    x: &Vector,
    rs0: [f64; 2],
    stol: f64,
) -> Result<Option<[f64; 2]>, StrError> {
    let y_rs = shape.twist()?;
    let mut d = Vector::new(3);
    let mut aa = Matrix::new(2, 2);
    let mut ai = Matrix::new(2, 2);
    let (mut r, mut s) = (rs0[0], rs0[1]);
    let mut converged = false;
    for _ in 0..MAX_ITERATIONS {
        let y = shape.calc_position([r, s])?;
        shape.calc_tangents([r, s])?;
        let (g1, g2) = (shape.tangent(0), shape.tangent(1));
        vec_add(&mut d, 1.0, x, -1.0, &y)?;
        let f = [vec_inner(&d, &g1), vec_inner(&d, &g2)];
        let a12 = vec_inner(&g1, &g2) - vec_inner(&d, &y_rs);
        aa.set(0, 0, vec_inner(&g1, &g1));
        aa.set(0, 1, a12);
        aa.set(1, 0, a12);
        aa.set(1, 1, vec_inner(&g2, &g2));
        match mat_inverse(&mut ai, &aa) {
            Ok(det) if f64::abs(det) >= 1e-30 => (),
            _ => return Ok(None),
        }
        let dr = ai.get(0, 0) * f[0] + ai.get(0, 1) * f[1];
        let ds = ai.get(1, 0) * f[0] + ai.get(1, 1) * f[1];
        r += dr;
        s += ds;
        if !r.is_finite() || !s.is_finite() {
            return Ok(None);
        }
        if f64::sqrt(dr * dr + ds * ds) < TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Ok(None);
    }
    let lim = 1.0 + stol;
    if r.abs() > lim || s.abs() > lim {
        return Ok(None);
    }
    Ok(Some([f64::max(-1.0, f64::min(1.0, r)), f64::max(-1.0, f64::min(1.0, s))]))
}

/// Finds the closest projection onto a set of candidate facets
///
/// Facets containing the node itself are skipped. The first candidate starts at `rs0`;
/// the others start at the center of the facet.
pub fn closest_point(
    shape: &mut FacetShape,
    mesh: &Mesh,
    node: usize,
    master: &ContactSurface,
    candidates: &[usize],
    rs0: [f64; 2],
    stol: f64,
) -> Result<Option<Projection>, StrError> {
    let x = Vector::from(&mesh.nodes[node].rt);
    let mut d = Vector::new(3);
    let mut best: Option<(f64, Projection)> = None;
    for (k, facet) in candidates.iter().enumerate() {
        if master.facets[*facet].contains(&node) {
            continue;
        }
        shape.set_coordinates(&master.coordinates(mesh, *facet));
        let start = if k == 0 { rs0 } else { [0.0, 0.0] };
        if let Some(rs) = project_to_facet(shape, &x, start, stol)? {
            let y = shape.calc_position(rs)?;
            shape.calc_tangents(rs)?;
            let (normal, _) = shape.normal()?;
            vec_add(&mut d, 1.0, &x, -1.0, &y)?;
            let distance = vec_norm(&d, Norm::Euc);
            if best.as_ref().map_or(true, |(dist, _)| distance < *dist) {
                let projection = Projection {
                    facet: *facet,
                    rs,
                    point: to_array(&y),
                    normal: to_array(&normal),
                    tangents: [to_array(&shape.tangent(0)), to_array(&shape.tangent(1))],
                    gap: vec_inner(&d, &normal),
                };
                best = Some((distance, projection));
            }
        }
    }
    Ok(best.map(|(_, p)| p))
}

/// Returns the facets adjacent to the master point closest to x
fn nearest_facets(mesh: &Mesh, master: &ContactSurface, x: &Vector) -> Result<Vec<usize>, StrError> {
    let mut d = Vector::new(3);
    let mut nearest = None;
    let mut min = f64::MAX;
    for (p, point) in master.points.iter().enumerate() {
        vec_add(&mut d, 1.0, x, -1.0, &Vector::from(&mesh.nodes[point.node].rt))?;
        let dist = vec_norm(&d, Norm::Euc);
        if dist < min {
            min = dist;
            nearest = Some(p);
        }
    }
    Ok(match nearest {
        Some(p) => master.facets_of_point(p).to_vec(),
        None => Vec::new(),
    })
}

/// Projects all points of the slave surface onto the master surface (in parallel)
///
/// The search starts at the previous projection and its neighboring facets. A global
/// nearest-node search is performed if there is no valid previous projection, if `global`
/// is set, or if the local search fails. Projections with `gap ≤ -search_radius` are rejected
/// and the corresponding points become open. The tangential slip of the closed points is
/// updated from the increment of the natural coordinates.
///
/// Returns true if the status or the projected facet of any point changed.
pub fn project_surface(
    slave: &mut ContactSurface,
    master: &ContactSurface,
    mesh: &Mesh,
    param: &ParamContact,
    global: bool,
) -> Result<bool, StrError> {
    let changes: Vec<bool> = slave
        .points
        .par_iter_mut()
        .map_init(FacetShape::new, |shape, point| -> Result<bool, StrError> {
            let shape = shape.as_mut().map_err(|e| *e)?;
            let before = (point.status, point.master);
            let previous = if global { None } else { point.master.and_then(|r| master.resolve(r)) };
            let mut found = match previous {
                Some(f) => closest_point(shape, mesh, point.node, master, &master.neighbors(f), point.rs, param.stol)?,
                None => None,
            };
            if found.is_none() {
                let x = Vector::from(&mesh.nodes[point.node].rt);
                let candidates = nearest_facets(mesh, master, &x)?;
                found = closest_point(shape, mesh, point.node, master, &candidates, [0.0, 0.0], param.stol)?;
            }
            match found {
                Some(p) if p.gap - param.offset > -param.search_radius => {
                    point.status = PointStatus::Closed;
                    point.master = Some(master.reference(p.facet));
                    point.rs = p.rs;
                    point.normal = p.normal;
                    point.gap = p.gap - param.offset;
                    let [dr, ds] = point.natural_slip();
                    for i in 0..3 {
                        point.slip[i] = p.tangents[0][i] * dr + p.tangents[1][i] * ds;
                    }
                }
                _ => point.open(),
            }
            Ok((point.status, point.master) != before)
        })
        .collect::<Result<_, StrError>>()?;
    Ok(changes.into_iter().any(|c| c))
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{project_surface, project_to_facet};
    use crate::base::{DofConfig, Mesh, ParamContact, SampleMeshes};
    use crate::contact::{ContactSurface, ElementRef, FacetShape, PointStatus};
    use russell_lab::{approx_eq, Vector};

    #[test]
    fn project_to_facet_works() {
        // distorted facet
        let xf = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.1], [2.2, 2.0, 0.0], [0.0, 1.8, -0.1]];
        let mut shape = FacetShape::new().unwrap();
        shape.set_coordinates(&xf);
        let y = shape.calc_position([0.3, -0.4]).unwrap();
        shape.calc_tangents([0.3, -0.4]).unwrap();
        let (nu, _) = shape.normal().unwrap();
        let x = Vector::from(&[y[0] + 0.5 * nu[0], y[1] + 0.5 * nu[1], y[2] + 0.5 * nu[2]]);
        let rs = project_to_facet(&mut shape, &x, [0.0, 0.0], 0.01).unwrap().unwrap();
        approx_eq(rs[0], 0.3, 1e-10);
        approx_eq(rs[1], -0.4, 1e-10);

        // outside the facet
        let x = Vector::from(&[5.0, 1.0, 1.0]);
        assert_eq!(project_to_facet(&mut shape, &x, [0.0, 0.0], 0.01).unwrap(), None);
    }

    #[test]
    fn gap_sign_works() {
        // slave: top face of the lower cube; master: bottom face of the upper cube
        for gap in [0.1, -0.01] {
            let mesh = SampleMeshes::two_cubes(DofConfig::solid(), gap).unwrap();
            let mut slave = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
            let master = ContactSurface::new(&mesh, &[(1, 4)]).unwrap();
            let param = ParamContact::new(1.0);
            let changed = project_surface(&mut slave, &master, &mesh, &param, false).unwrap();
            assert!(changed);
            for point in &slave.points {
                assert_eq!(point.status, PointStatus::Closed);
                approx_eq(point.gap, gap, 1e-14);
                approx_eq(point.normal[2], -1.0, 1e-14);
            }
            // nothing changes in a second pass
            assert!(!project_surface(&mut slave, &master, &mesh, &param, true).unwrap());
        }
    }

    #[test]
    fn deep_penetration_is_rejected() {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), -0.5).unwrap();
        let mut slave = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
        let master = ContactSurface::new(&mesh, &[(1, 4)]).unwrap();
        let mut param = ParamContact::new(1.0);
        param.search_radius = 0.2;
        project_surface(&mut slave, &master, &mesh, &param, false).unwrap();
        assert!(slave.points.iter().all(|p| p.status == PointStatus::Open));
    }

    #[test]
    fn stale_projections_are_searched_again() {
        let mesh = SampleMeshes::two_cubes(DofConfig::solid(), -0.01).unwrap();
        let mut slave = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
        let mut master = ContactSurface::new(&mesh, &[(1, 4)]).unwrap();
        let param = ParamContact::new(1.0);
        project_surface(&mut slave, &master, &mesh, &param, false).unwrap();
        let stale = ElementRef { index: 0, generation: 0 };
        assert!(slave.points.iter().all(|p| p.master == Some(stale)));

        // the facets of the master surface have changed: all references become stale
        master.generation += 1;
        assert_eq!(master.resolve(stale), None);
        assert!(project_surface(&mut slave, &master, &mesh, &param, false).unwrap());
        for point in &slave.points {
            assert_eq!(point.status, PointStatus::Closed);
            assert_eq!(point.master, Some(ElementRef { index: 0, generation: 1 }));
            approx_eq(point.gap, -0.01, 1e-14);
        }
    }

    #[test]
    fn slip_follows_the_tangential_motion() {
        // unit cube under a 3 × 3 plate
        let mut geometry = gemlab::mesh::Mesh {
            ndim: 3,
            points: Vec::new(),
            cells: Vec::new(),
        };
        SampleMeshes::append_block(&mut geometry, [0.0; 3], [1.0; 3], [1, 1, 1], 1).unwrap();
        SampleMeshes::append_block(&mut geometry, [-1.0, -1.0, 1.0], [3.0, 3.0, 1.0], [1, 1, 1], 2).unwrap();
        let mut mesh = Mesh::from_geometry(DofConfig::solid(), &geometry).unwrap();
        let mut slave = ContactSurface::new(&mesh, &[(0, 5)]).unwrap();
        let master = ContactSurface::new(&mesh, &[(1, 4)]).unwrap();
        let param = ParamContact::new(1.0);
        project_surface(&mut slave, &master, &mesh, &param, false).unwrap();
        slave.commit(0.0, 0.0);
        // move the top of the cube along x (the projections stay on the same facet)
        for n in 4..8 {
            mesh.nodes[n].rt[0] += 0.1;
        }
        assert!(!project_surface(&mut slave, &master, &mesh, &param, false).unwrap());
        for point in &slave.points {
            approx_eq(point.slip[0], 0.1, 1e-12);
            approx_eq(point.slip[1], 0.0, 1e-12);
            approx_eq(point.slip[2], 0.0, 1e-12);
        }
    }
}
