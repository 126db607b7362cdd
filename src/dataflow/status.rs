use crate::linalg::aasen::AasenError;
use std::sync::OnceLock;

/// Failure status shared by all the tasks of one or more operations.
///
/// The first recorded failure wins; later failures are ignored. Tasks consult the status before
/// running and are skipped once it holds a failure.
#[derive(Debug, Default)]
pub struct Sequence {
    error: OnceLock<AasenError>,
}

impl Sequence {
    /// Returns a new sequence with a successful status.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no failure has been recorded.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.get().is_none()
    }

    /// Records `error` if no failure has been recorded yet.
    ///
    /// Returns `true` if `error` became the status of the sequence.
    #[inline]
    pub fn fail(&self, error: AasenError) -> bool {
        self.error.set(error).is_ok()
    }

    /// Returns the recorded failure, if any.
    #[inline]
    pub fn error(&self) -> Option<AasenError> {
        self.error.get().copied()
    }

    /// Returns the status as a `Result`.
    #[inline]
    pub fn status(&self) -> Result<(), AasenError> {
        match self.error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
