use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::{CooMatrix, CsrMatrix, Sym};

/// Collects the nonzero pattern (profile) of the global stiffness matrix
///
/// Each call to `add` couples all the given equations with each other. The diagonal
/// is always part of the profile.
pub struct StiffnessProfile {
    neq: usize,
    rows: Vec<Vec<usize>>,
}

impl StiffnessProfile {
    /// Allocates a new instance
    pub fn new(neq: usize) -> Self {
        StiffnessProfile {
            neq,
            rows: (0..neq).map(|i| vec![i]).collect(),
        }
    }

    /// Couples all free equations in the list
    pub fn add(&mut self, equations: &[usize]) {
        for i in equations {
            if *i >= self.neq {
                continue;
            }
            for j in equations {
                if *j < self.neq {
                    self.rows[*i].push(*j);
                }
            }
        }
    }

    /// Returns the number of equations
    pub fn neq(&self) -> usize {
        self.neq
    }
}

/// Holds the global stiffness matrix with a fixed profile
///
/// The values live in a CSR matrix whose structure is frozen at allocation; assembly may only
/// touch entries of the profile. With a triangular symmetry (e.g., `Sym::YesLower`), only one
/// triangle is stored and contributions to the other one are discarded after checking that
/// the mirrored entry belongs to the profile.
///
/// The COO matrix consumed by the linear solver holds the same entries in the same order,
/// hence it is refreshed by copying the values array.
pub struct GlobalMatrix {
    sym: Sym,
    csr: CsrMatrix,
    coo: CooMatrix,
}

impl GlobalMatrix {
    /// Allocates a new matrix with the given profile (all values are zero)
    pub fn new(profile: StiffnessProfile, sym: Sym) -> Result<Self, StrError> {
        let neq = profile.neq;
        if neq == 0 {
            return Err("there are no free equations");
        }
        let mut row_pointers = Vec::with_capacity(neq + 1);
        let mut col_indices = Vec::new();
        row_pointers.push(0);
        for (i, mut row) in profile.rows.into_iter().enumerate() {
            row.retain(|j| stored(sym, i, *j));
            row.sort_unstable();
            row.dedup();
            col_indices.extend(row.iter().map(|j| *j as i32));
            row_pointers.push(col_indices.len() as i32);
        }
        let nnz = col_indices.len();
        let mut coo = CooMatrix::new(neq, neq, nnz, sym)?;
        for i in 0..neq {
            for p in row_pointers[i]..row_pointers[i + 1] {
                coo.put(i, col_indices[p as usize] as usize, 0.0)?;
            }
        }
        let csr = CsrMatrix::new(neq, neq, row_pointers, col_indices, vec![0.0; nnz], sym)?;
        Ok(GlobalMatrix { sym, csr, coo })
    }

    /// Returns the dimension (number of free equations)
    pub fn dim(&self) -> usize {
        self.csr.get_info().0
    }

    /// Returns the number of stored entries
    pub fn nnz(&self) -> usize {
        self.csr.get_info().2
    }

    /// Returns the symmetry (storage) type
    pub fn sym(&self) -> Sym {
        self.sym
    }

    /// Sets all values to zero (keeps the profile)
    pub fn zero(&mut self) {
        self.csr.get_values_mut().fill(0.0);
    }

    fn position(&self, i: usize, j: usize) -> Option<usize> {
        let (nrow, ..) = self.csr.get_info();
        if i >= nrow {
            return None;
        }
        let pp = self.csr.get_row_pointers();
        let (start, end) = (pp[i] as usize, pp[i + 1] as usize);
        self.csr.get_col_indices()[start..end]
            .binary_search(&(j as i32))
            .ok()
            .map(|k| start + k)
    }

    /// Adds a value to the (i,j) entry
    pub fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        if !stored(self.sym, i, j) {
            // mirrored by the stored triangle
            return match self.position(j, i) {
                Some(_) => Ok(()),
                None => Err("entry is outside the stiffness profile"),
            };
        }
        match self.position(i, j) {
            Some(k) => {
                self.csr.get_values_mut()[k] += value;
                Ok(())
            }
            None => Err("entry is outside the stiffness profile"),
        }
    }

    /// Returns the (i,j) entry (zero outside the profile)
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (i, j) = if stored(self.sym, i, j) { (i, j) } else { (j, i) };
        match self.position(i, j) {
            Some(k) => self.csr.get_values()[k],
            None => 0.0,
        }
    }

    /// Computes v = K u
    pub fn mat_vec_mul(&self, v: &mut Vector, u: &Vector) -> Result<(), StrError> {
        self.csr.mat_vec_mul(v, 1.0, u)
    }

    /// Returns the dense version of this matrix (both triangles)
    pub fn to_dense(&self) -> Matrix {
        self.csr.as_dense()
    }

    /// Returns the matrix in the format required by the linear solver
    pub fn as_coo(&mut self) -> &CooMatrix {
        self.coo.get_values_mut().copy_from_slice(self.csr.get_values());
        &self.coo
    }
}

/// Tells whether the (i,j) entry is stored with the given symmetry type
fn stored(sym: Sym, i: usize, j: usize) -> bool {
    match sym {
        Sym::YesLower => i >= j,
        Sym::YesUpper => i <= j,
        _ => true,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
