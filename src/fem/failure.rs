use crate::StrError;
use thiserror::Error;

/// Defines the reasons why a time step may fail
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StepFailure {
    #[error("quasi-Newton iterations did not converge after {iterations} iterations and {reformations} reformations")]
    NotConverged { iterations: usize, reformations: usize },

    #[error("negative Jacobian detected in element {element} at integration point {point} (volume = {volume:?})")]
    NegativeJacobian { element: usize, point: usize, volume: f64 },

    #[error("linear solver failed: {0}")]
    LinearSolver(StrError),

    #[error("augmentations did not converge after {augmentations} passes")]
    AugmentationLimit { augmentations: usize },

    #[error("{0}")]
    Fatal(StrError),
}

impl StepFailure {
    /// Returns true if the step may be retried (e.g., with a smaller time increment)
    pub fn is_recoverable(&self) -> bool {
        match self {
            StepFailure::NotConverged { .. } => true,
            StepFailure::NegativeJacobian { .. } => true,
            StepFailure::AugmentationLimit { .. } => true,
            StepFailure::LinearSolver(..) => false,
            StepFailure::Fatal(..) => false,
        }
    }
}

impl From<StrError> for StepFailure {
    fn from(error: StrError) -> Self {
        StepFailure::Fatal(error)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::StepFailure;
    use crate::StrError;

    fn failing() -> Result<(), StrError> {
        Err("cannot do it")
    }

    fn wrapper() -> Result<(), StepFailure> {
        failing()?;
        Ok(())
    }

    #[test]
    fn conversion_and_display_work() {
        assert_eq!(wrapper().err(), Some(StepFailure::Fatal("cannot do it")));
        let failure = StepFailure::NegativeJacobian {
            element: 3,
            point: 1,
            volume: -0.5,
        };
        assert_eq!(
            format!("{}", failure),
            "negative Jacobian detected in element 3 at integration point 1 (volume = -0.5)"
        );
        assert!(failure.is_recoverable());
        assert_eq!(
            format!(
                "{}",
                StepFailure::NotConverged {
                    iterations: 5,
                    reformations: 2
                }
            ),
            "quasi-Newton iterations did not converge after 5 iterations and 2 reformations"
        );
        assert!(!StepFailure::LinearSolver("singular matrix").is_recoverable());
        assert!(!StepFailure::Fatal("bad").is_recoverable());
        assert!(StepFailure::AugmentationLimit { augmentations: 10 }.is_recoverable());
        assert_eq!(format!("{}", StepFailure::Fatal("bad")), "bad");
    }
}
