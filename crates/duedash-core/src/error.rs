//! Domain errors raised by the calendar and task layers.

/// Errors returned by the pure dashboard operations.
///
/// Command handlers wrap these in `anyhow::Error` through `?`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DashError {
  /// An argument was outside the range the operation accepts.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// No task carries the requested id.
  #[error("task not found: {0}")]
  TaskNotFound(u64)
}

impl DashError {
  pub fn invalid(
    message: impl Into<String>
  ) -> Self {
    DashError::InvalidArgument(
      message.into()
    )
  }
}
