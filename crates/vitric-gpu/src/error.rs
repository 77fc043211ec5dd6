//! Error taxonomy of the submission core.
//!
//! Validation failures are raised synchronously at the violating call and
//! name the offending value. Device loss is fatal: the core never retries it,
//! the caller recreates the device. Everything else leaves the device and
//! unrelated resources in their prior state.

use vitric_driver::DriverError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A descriptor or argument violates a creation/usage contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The hardware tier is below what the requested feature needs.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The device was removed or reset. Fatal; recreate the device.
    #[error("device removed or reset")]
    NoSuchDevice,

    /// The call is legal in general but not in this state or from this
    /// thread (wrong-thread present, duplicate draw order, ...).
    #[error("operation not permitted: {0}")]
    OperationNotPermitted(String),

    /// Failure passed through from a collaborator (shader front end, driver
    /// allocation).
    #[error("io error: {0}")]
    Io(String),

    /// Transient condition; retry after the blocking state clears (surface
    /// minimized, scratch space exhausted this frame).
    #[error("resource unavailable, try again: {0}")]
    TryAgain(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

impl From<DriverError> for RenderError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::DeviceLost => RenderError::NoSuchDevice,
            DriverError::OutOfMemory(msg) => RenderError::Io(msg),
            // A driver InvalidCall below a validated core call means the
            // caller handed us an argument the core could not vet itself.
            DriverError::InvalidCall(msg) => RenderError::InvalidArgument(msg),
            DriverError::Unsupported(msg) => RenderError::NotSupported(msg),
            DriverError::DebugLayerUnavailable => {
                RenderError::NotSupported("driver debug layer unavailable".into())
            }
        }
    }
}
