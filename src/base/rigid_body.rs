use super::{EqId, Mesh};
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Defines the degrees of freedom of a rigid body
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum RigidDof {
    /// Translation along x
    Tx,

    /// Translation along y
    Ty,

    /// Translation along z
    Tz,

    /// Rotation about x
    Rx,

    /// Rotation about y
    Ry,

    /// Rotation about z
    Rz,
}

impl RigidDof {
    /// Holds all rigid-body DOFs in storage order
    pub const ALL: [RigidDof; 6] = [
        RigidDof::Tx,
        RigidDof::Ty,
        RigidDof::Tz,
        RigidDof::Rx,
        RigidDof::Ry,
        RigidDof::Rz,
    ];

    /// Returns the storage index
    pub fn index(&self) -> usize {
        match self {
            RigidDof::Tx => 0,
            RigidDof::Ty => 1,
            RigidDof::Tz => 2,
            RigidDof::Rx => 3,
            RigidDof::Ry => 4,
            RigidDof::Rz => 5,
        }
    }
}

/// Holds the state of a rigid body
///
/// The position of an attached node with reference position `X` is:
///
/// ```text
/// x = c₀ + u + Q (X - c₀)
/// ```
///
/// where `c₀` is the reference center, `u` the translation, and `Q` the rotation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RigidBody {
    /// Attribute of the cells forming this body
    pub attribute: usize,

    /// Attached nodes
    pub nodes: Vec<usize>,

    /// Reference center
    pub rc0: [f64; 3],

    /// Total translation and rotation-vector components at the start of the step
    pub up: [f64; 6],

    /// Increment in the current step
    pub du: [f64; 6],

    /// Rotation at the start of the step
    pub rot_p: [[f64; 3]; 3],

    /// Current rotation
    pub rot: [[f64; 3]; 3],

    /// Equation numbers of the six DOFs
    pub id: [EqId; 6],

    /// Resultant force and moment (about the current center) of the assembled nodal forces
    pub reaction: [f64; 6],
}

impl RigidBody {
    /// Allocates a new rigid body centered at the centroid of its nodes
    pub fn new(attribute: usize, nodes: Vec<usize>, mesh: &Mesh) -> Result<Self, StrError> {
        if nodes.is_empty() {
            return Err("rigid body must have at least one node");
        }
        let mut rc0 = [0.0; 3];
        for n in &nodes {
            let node = mesh.nodes.get(*n).ok_or("rigid body refers to a non-existent node")?;
            for i in 0..3 {
                rc0[i] += node.r0[i];
            }
        }
        for i in 0..3 {
            rc0[i] /= nodes.len() as f64;
        }
        Ok(RigidBody {
            attribute,
            nodes,
            rc0,
            up: [0.0; 6],
            du: [0.0; 6],
            rot_p: IDENTITY,
            rot: IDENTITY,
            id: [EqId::Fixed; 6],
            reaction: [0.0; 6],
        })
    }

    /// Returns the current center
    pub fn center(&self) -> [f64; 3] {
        [
            self.rc0[0] + self.up[0] + self.du[0],
            self.rc0[1] + self.up[1] + self.du[1],
            self.rc0[2] + self.up[2] + self.du[2],
        ]
    }

    /// Returns the current total value of a DOF
    pub fn value(&self, dof: RigidDof) -> f64 {
        let i = dof.index();
        self.up[i] + self.du[i]
    }

    /// Sets the increment of the current step and updates the rotation
    pub fn set_increment(&mut self, du: [f64; 6]) {
        self.du = du;
        let q = rotation_matrix(&[du[3], du[4], du[5]]);
        self.rot = mat_mul(&q, &self.rot_p);
    }

    /// Returns the current position of an attached node given its reference position
    pub fn node_position(&self, x0: &[f64; 3]) -> [f64; 3] {
        let c = self.center();
        let a = [x0[0] - self.rc0[0], x0[1] - self.rc0[1], x0[2] - self.rc0[2]];
        let mut x = c;
        for i in 0..3 {
            for j in 0..3 {
                x[i] += self.rot[i][j] * a[j];
            }
        }
        x
    }

    /// Returns the matrix G mapping the rigid DOFs onto the displacement of a point at x
    ///
    /// ```text
    /// δu = G δq = [I | -[a]×] δq   with   a = x - c
    /// ```
    pub fn transformation(&self, x: &[f64; 3]) -> [[f64; 6]; 3] {
        let c = self.center();
        let a = [x[0] - c[0], x[1] - c[1], x[2] - c[2]];
        [
            [1.0, 0.0, 0.0, 0.0, a[2], -a[1]],
            [0.0, 1.0, 0.0, -a[2], 0.0, a[0]],
            [0.0, 0.0, 1.0, a[1], -a[0], 0.0],
        ]
    }

    /// Accepts the current state as the start of the next step
    pub fn store_previous(&mut self) {
        for i in 0..6 {
            self.up[i] += self.du[i];
        }
        self.du = [0.0; 6];
        self.rot_p = self.rot;
    }
}

const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Computes the rotation matrix of a rotation vector (Rodrigues formula)
pub fn rotation_matrix(theta: &[f64; 3]) -> [[f64; 3]; 3] {
    let angle = f64::sqrt(theta[0] * theta[0] + theta[1] * theta[1] + theta[2] * theta[2]);
    if angle < 1e-14 {
        return IDENTITY;
    }
    let k = [theta[0] / angle, theta[1] / angle, theta[2] / angle];
    let kx = [[0.0, -k[2], k[1]], [k[2], 0.0, -k[0]], [-k[1], k[0], 0.0]];
    let (s, c) = (f64::sin(angle), 1.0 - f64::cos(angle));
    let mut q = IDENTITY;
    for i in 0..3 {
        for j in 0..3 {
            let mut kk = 0.0;
            for m in 0..3 {
                kk += kx[i][m] * kx[m][j];
            }
            q[i][j] += s * kx[i][j] + c * kk;
        }
    }
    q
}

fn mat_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut c = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            for m in 0..3 {
                c[i][j] += a[i][m] * b[m][j];
            }
        }
    }
    c
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
