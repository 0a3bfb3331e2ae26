/// GPU resource creation and submission failures.
///
/// Raised by a render backend; fatal during renderer construction or resize,
/// scoped to a single object during steady-state draw assembly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("zero-sized resource requested ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
    #[error("out of GPU memory: {0}")]
    OutOfMemory(String),
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error("unknown handle: {0}")]
    UnknownHandle(String),
    #[error("surface texture unavailable: {0}")]
    SurfaceUnavailable(String),
}
