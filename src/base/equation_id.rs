use serde::{Deserialize, Serialize};

/// Holds the equation number status of a degree of freedom
///
/// The integer encoding is:
///
/// ```text
/// code ≥  0 → free equation number
/// code = -1 → fixed (zero increment, no equation)
/// code < -1 → prescribed; the index into the table of prescribed values is -code-2
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum EqId {
    /// Unknown with its global equation number
    Free(usize),

    /// Fixed value
    Fixed,

    /// Prescribed value with the index into the table of prescribed values
    Prescribed(usize),
}

impl EqId {
    /// Returns the integer code
    pub fn code(&self) -> i64 {
        match self {
            EqId::Free(eq) => *eq as i64,
            EqId::Fixed => -1,
            EqId::Prescribed(k) => -(*k as i64) - 2,
        }
    }

    /// Converts an integer code
    pub fn from_code(code: i64) -> Self {
        if code >= 0 {
            EqId::Free(code as usize)
        } else if code == -1 {
            EqId::Fixed
        } else {
            EqId::Prescribed((-code - 2) as usize)
        }
    }

    /// Returns the equation number if free
    #[inline]
    pub fn free(&self) -> Option<usize> {
        match self {
            EqId::Free(eq) => Some(*eq),
            _ => None,
        }
    }

    /// Returns the index of the prescribed value if prescribed
    #[inline]
    pub fn prescribed(&self) -> Option<usize> {
        match self {
            EqId::Prescribed(k) => Some(*k),
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
