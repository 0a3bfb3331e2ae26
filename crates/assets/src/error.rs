use descent_common::DeviceError;

/// Why raw attribute data could not be turned into vertices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing vertex attribute {0}")]
    MissingAttribute(&'static str),
    #[error("attribute {attribute} has {len} values, not a multiple of {components}")]
    Misaligned {
        attribute: &'static str,
        len: usize,
        components: usize,
    },
    #[error("attribute {attribute} covers {found} vertices, expected {expected}")]
    CountMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("malformed model: {0}")]
    Malformed(String),
}

/// Errors from mesh asset operations.
///
/// `Clone` so a single in-flight load can hand the same failure to every
/// caller awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
    #[error("GPU upload failed: {0}")]
    Device(#[from] DeviceError),
    #[error("surface detached before {url} finished uploading")]
    Detached { url: String },
}
