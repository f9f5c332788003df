use super::NodalConstraint;
use crate::base::{Node, RigidBody};
use crate::contact::ContactInterface;
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the state of a simulation at the end of a converged time step
///
/// The state is everything that changes during the analysis: the nodal kinematics (including
/// the equation ids), the rigid bodies, the contact interfaces with all their point data, and
/// the nodal constraints. Restoring a state into a model built from the same input reproduces
/// the residual and the stiffness bit by bit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverState {
    /// Time
    pub t: f64,

    /// Number of converged time steps
    pub n_step: usize,

    /// Total solution {Ut} (sum of the converged increments of the free equations)
    ///
    /// (n_equation)
    pub ut: Vector,

    /// Nodal state
    pub nodes: Vec<Node>,

    /// Rigid bodies
    pub bodies: Vec<RigidBody>,

    /// Contact interfaces
    pub contacts: Vec<ContactInterface>,

    /// Nodal constraints (with their multipliers)
    pub constraints: Vec<NodalConstraint>,
}

impl SolverState {
    /// Reads a JSON file containing the state data
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let state = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(state)
    }

    /// Writes a JSON file with the state data
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SolverState;
    use crate::base::{DofConfig, Node};
    use russell_lab::Vector;

    #[test]
    fn read_json_captures_errors() {
        assert_eq!(
            SolverState::read_json("/tmp/tissuefem/__not_found__.json").err(),
            Some("cannot open file")
        );
    }

    #[test]
    fn write_and_read_json_work() {
        let mut node = Node::new([0.1, 0.2, 0.3], &DofConfig::multiphasic(1));
        node.rt[2] = 0.3 + 1.0 / 3.0;
        node.ct[0] = 0.7;
        let state = SolverState {
            t: 0.25,
            n_step: 3,
            ut: Vector::from(&[1.0 / 3.0, -2.0 / 7.0]),
            nodes: vec![node],
            bodies: Vec::new(),
            contacts: Vec::new(),
            constraints: Vec::new(),
        };
        let path = "/tmp/tissuefem/test_write_and_read_json_work.json";
        state.write_json(path).unwrap();
        let read = SolverState::read_json(path).unwrap();
        assert_eq!(read.t, 0.25);
        assert_eq!(read.n_step, 3);
        assert_eq!(read.ut.as_data(), state.ut.as_data());
        assert_eq!(read.nodes[0].rt, state.nodes[0].rt);
        assert_eq!(read.nodes[0].ct, vec![0.7]);
        assert_eq!(read.nodes[0].id, state.nodes[0].id);
    }
}
