use super::{DofConfig, Mesh};
use crate::StrError;
use gemlab::mesh::{Cell, Point};
use gemlab::shapes::GeoKind;

/// Generates structured meshes for tests and examples
pub struct SampleMeshes {}

impl SampleMeshes {
    /// Appends a structured block of Hex8 cells to a gemlab mesh
    ///
    /// Points are numbered with x varying fastest, then y, then z, after the existing points.
    pub fn append_block(
        geometry: &mut gemlab::mesh::Mesh,
        origin: [f64; 3],
        size: [f64; 3],
        ndiv: [usize; 3],
        attribute: usize,
    ) -> Result<(), StrError> {
        if geometry.ndim != 3 {
            return Err("mesh must be three-dimensional");
        }
        if ndiv.iter().any(|n| *n == 0) {
            return Err("number of divisions must be ≥ 1");
        }
        let [nx, ny, nz] = ndiv;
        let first = geometry.points.len();
        for k in 0..(nz + 1) {
            for j in 0..(ny + 1) {
                for i in 0..(nx + 1) {
                    geometry.points.push(Point {
                        id: geometry.points.len(),
                        marker: 0,
                        coords: vec![
                            origin[0] + size[0] * (i as f64) / (nx as f64),
                            origin[1] + size[1] * (j as f64) / (ny as f64),
                            origin[2] + size[2] * (k as f64) / (nz as f64),
                        ],
                    });
                }
            }
        }
        let id = |i: usize, j: usize, k: usize| first + i + (nx + 1) * (j + (ny + 1) * k);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    geometry.cells.push(Cell {
                        id: geometry.cells.len(),
                        attribute,
                        kind: GeoKind::Hex8,
                        points: vec![
                            id(i, j, k),
                            id(i + 1, j, k),
                            id(i + 1, j + 1, k),
                            id(i, j + 1, k),
                            id(i, j, k + 1),
                            id(i + 1, j, k + 1),
                            id(i + 1, j + 1, k + 1),
                            id(i, j + 1, k + 1),
                        ],
                    });
                }
            }
        }
        Ok(())
    }

    /// Generates a structured block of Hex8 cells
    pub fn block(
        dofs: DofConfig,
        origin: [f64; 3],
        size: [f64; 3],
        ndiv: [usize; 3],
        attribute: usize,
    ) -> Result<Mesh, StrError> {
        let mut geometry = empty();
        SampleMeshes::append_block(&mut geometry, origin, size, ndiv, attribute)?;
        Mesh::from_geometry(dofs, &geometry)
    }

    /// Generates a column of `nz` unit-area Hex8 cells with height `height`
    pub fn column(dofs: DofConfig, height: f64, nz: usize, attribute: usize) -> Result<Mesh, StrError> {
        SampleMeshes::block(dofs, [0.0, 0.0, 0.0], [1.0, 1.0, height], [1, 1, nz], attribute)
    }

    /// Generates two unit cubes stacked along z without shared nodes
    ///
    /// ```text
    ///   12--------13   z = 2 + gap
    ///    |  [1]    |   attribute 2 (nodes 8 to 15)
    ///    8---------9   z = 1 + gap
    ///
    ///    4---------5   z = 1
    ///    |  [0]    |   attribute 1 (nodes 0 to 7)
    ///    0---------1   z = 0 (front view, y = 0)
    /// ```
    ///
    /// A negative `gap` makes the cubes interpenetrate.
    pub fn two_cubes(dofs: DofConfig, gap: f64) -> Result<Mesh, StrError> {
        let mut geometry = empty();
        SampleMeshes::append_block(&mut geometry, [0.0; 3], [1.0; 3], [1, 1, 1], 1)?;
        SampleMeshes::append_block(&mut geometry, [0.0, 0.0, 1.0 + gap], [1.0; 3], [1, 1, 1], 2)?;
        Mesh::from_geometry(dofs, &geometry)
    }
}

fn empty() -> gemlab::mesh::Mesh {
    gemlab::mesh::Mesh {
        ndim: 3,
        points: Vec::new(),
        cells: Vec::new(),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
