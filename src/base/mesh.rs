use super::{Dof, DofConfig, EqId};
use crate::StrError;
use gemlab::mesh::{Cell, Point};
use gemlab::shapes::GeoKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Holds the state of a mesh node
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Node {
    /// Reference position
    pub r0: [f64; 3],

    /// Current position
    pub rt: [f64; 3],

    /// Position at the end of the previous time step
    pub rp: [f64; 3],

    /// Velocity
    pub vt: [f64; 3],

    /// Acceleration
    pub at: [f64; 3],

    /// Current fluid pressure
    pub pt: f64,

    /// Fluid pressure at the end of the previous time step
    pub pp: f64,

    /// Current solute concentrations
    pub ct: Vec<f64>,

    /// Solute concentrations at the end of the previous time step
    pub cp: Vec<f64>,

    /// Equation numbers of each DOF (in DofConfig order)
    pub id: Vec<EqId>,

    /// Index of the rigid body this node is attached to
    pub rigid_body: Option<usize>,
}

impl Node {
    /// Allocates a new node at rest
    pub fn new(x: [f64; 3], dofs: &DofConfig) -> Self {
        Node {
            r0: x,
            rt: x,
            rp: x,
            vt: [0.0; 3],
            at: [0.0; 3],
            pt: 0.0,
            pp: 0.0,
            ct: vec![0.0; dofs.n_solute],
            cp: vec![0.0; dofs.n_solute],
            id: vec![EqId::Fixed; dofs.ndof()],
            rigid_body: None,
        }
    }

    /// Returns the current displacement
    pub fn displacement(&self) -> [f64; 3] {
        [
            self.rt[0] - self.r0[0],
            self.rt[1] - self.r0[1],
            self.rt[2] - self.r0[2],
        ]
    }

    /// Returns the current value of a DOF (displacement, pressure, or concentration)
    pub fn value(&self, dof: Dof) -> f64 {
        match dof {
            Dof::Ux => self.rt[0] - self.r0[0],
            Dof::Uy => self.rt[1] - self.r0[1],
            Dof::Uz => self.rt[2] - self.r0[2],
            Dof::P => self.pt,
            Dof::C(i) => self.ct.get(i).copied().unwrap_or(0.0),
        }
    }

    /// Sets the current value of a DOF
    pub fn set_value(&mut self, dof: Dof, value: f64) {
        match dof {
            Dof::Ux => self.rt[0] = self.r0[0] + value,
            Dof::Uy => self.rt[1] = self.r0[1] + value,
            Dof::Uz => self.rt[2] = self.r0[2] + value,
            Dof::P => self.pt = value,
            Dof::C(i) => {
                if let Some(c) = self.ct.get_mut(i) {
                    *c = value;
                }
            }
        }
    }

    /// Returns the value of a DOF at the end of the previous time step
    pub fn previous_value(&self, dof: Dof) -> f64 {
        match dof {
            Dof::Ux => self.rp[0] - self.r0[0],
            Dof::Uy => self.rp[1] - self.r0[1],
            Dof::Uz => self.rp[2] - self.r0[2],
            Dof::P => self.pp,
            Dof::C(i) => self.cp.get(i).copied().unwrap_or(0.0),
        }
    }
}

/// Holds nodes and cells
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Mesh {
    /// DOF configuration shared by all nodes
    pub dofs: DofConfig,

    /// All nodes
    pub nodes: Vec<Node>,

    /// All cells
    pub cells: Vec<Cell>,
}

impl Mesh {
    /// Allocates a new mesh from a (three-dimensional) gemlab mesh
    ///
    /// The points become the nodes (in the same order) and the cells are copied. Cells with
    /// Hex8 kind follow the gemlab ordering: bottom face 0-1-2-3 counterclockwise, then top face 4-5-6-7.
    pub fn from_geometry(dofs: DofConfig, geometry: &gemlab::mesh::Mesh) -> Result<Self, StrError> {
        if geometry.ndim != 3 {
            return Err("mesh must be three-dimensional");
        }
        let mut nodes = Vec::with_capacity(geometry.points.len());
        for point in &geometry.points {
            if point.coords.len() != 3 {
                return Err("point must have three coordinates");
            }
            nodes.push(Node::new([point.coords[0], point.coords[1], point.coords[2]], &dofs));
        }
        for cell in &geometry.cells {
            if cell.points.len() != cell.kind.nnode() {
                return Err("number of cell nodes does not match the cell kind");
            }
            if cell.points.iter().any(|n| *n >= nodes.len()) {
                return Err("cell refers to a non-existent node");
            }
        }
        Ok(Mesh {
            dofs,
            nodes,
            cells: geometry.cells.clone(),
        })
    }

    /// Allocates a new mesh given the coordinates and the cells
    ///
    /// Each cell is given by `(attribute, kind, points)`.
    pub fn new(dofs: DofConfig, coordinates: &[[f64; 3]], cells: &[(usize, GeoKind, &[usize])]) -> Result<Self, StrError> {
        let geometry = gemlab::mesh::Mesh {
            ndim: 3,
            points: coordinates
                .iter()
                .enumerate()
                .map(|(id, x)| Point {
                    id,
                    marker: 0,
                    coords: x.to_vec(),
                })
                .collect(),
            cells: cells
                .iter()
                .enumerate()
                .map(|(id, (attribute, kind, points))| Cell {
                    id,
                    attribute: *attribute,
                    kind: *kind,
                    points: points.to_vec(),
                })
                .collect(),
        };
        Mesh::from_geometry(dofs, &geometry)
    }

    /// Returns the equation status of a nodal DOF
    pub fn equation(&self, node: usize, dof: Dof) -> Result<EqId, StrError> {
        let index = self.dofs.index(dof)?;
        match self.nodes.get(node) {
            Some(n) => Ok(n.id[index]),
            None => Err("node index is out of range"),
        }
    }

    /// Returns the diagonal of the bounding box of the reference configuration
    pub fn size(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let mut min = self.nodes[0].r0;
        let mut max = self.nodes[0].r0;
        for node in &self.nodes {
            for i in 0..3 {
                min[i] = f64::min(min[i], node.r0[i]);
                max[i] = f64::max(max[i], node.r0[i]);
            }
        }
        f64::sqrt((0..3).map(|i| (max[i] - min[i]) * (max[i] - min[i])).sum())
    }

    /// Stores the current state as the previous (start-of-step) state
    pub fn store_previous(&mut self) {
        for node in &mut self.nodes {
            node.rp = node.rt;
            node.pp = node.pt;
            node.cp.clone_from(&node.ct);
        }
    }

    /// Updates velocities and accelerations from the positions at the end of a step
    pub fn update_rates(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        for node in &mut self.nodes {
            for i in 0..3 {
                let v = (node.rt[i] - node.rp[i]) / dt;
                node.at[i] = (v - node.vt[i]) / dt;
                node.vt[i] = v;
            }
        }
    }
}

impl fmt::Display for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mesh\n").unwrap();
        write!(f, "====\n").unwrap();
        write!(f, "{}\n", self.dofs).unwrap();
        write!(f, "{} nodes, {} cells\n", self.nodes.len(), self.cells.len()).unwrap();
        for cell in &self.cells {
            write!(f, "{}: ({}) {:?} {:?}\n", cell.id, cell.attribute, cell.kind, cell.points).unwrap();
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
