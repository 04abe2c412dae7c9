use thiserror::Error;

/// Everything that can go wrong between the kernel and the tablet.
///
/// The variants mirror the POSIX codes the filesystem boundary has to
/// speak; [`RemfsError::errno`] is the single place that translation
/// happens.
#[derive(Error, Debug)]
pub enum RemfsError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("operation not permitted")]
    NotPermitted,

    #[error("operation not supported")]
    NotSupported,

    #[error("resource busy")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("malformed metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("malformed lines data: {0}")]
    Lines(String),

    #[error("parent not found: {0}")]
    ParentMissing(String),
}

impl RemfsError {
    /// POSIX code reported to the kernel for this error.
    pub fn errno(&self) -> i32 {
        match self {
            RemfsError::NotFound(_) => libc::ENOENT,
            RemfsError::AlreadyExists(_) => libc::EEXIST,
            RemfsError::NotADirectory(_) => libc::ENOTDIR,
            RemfsError::IsADirectory(_) => libc::EISDIR,
            RemfsError::NotEmpty(_) => libc::ENOTEMPTY,
            RemfsError::NotPermitted => libc::EPERM,
            RemfsError::NotSupported => libc::ENOTSUP,
            RemfsError::Busy => libc::EBUSY,
            RemfsError::Io(_) => libc::EIO,
            RemfsError::Conversion(_) => libc::EIO,
            RemfsError::Metadata(_) => libc::EIO,
            RemfsError::Lines(_) => libc::EIO,
            RemfsError::ParentMissing(_) => libc::ENOENT,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_matches_posix() {
        assert_eq!(RemfsError::NotFound("x".into()).errno(), libc::ENOENT);
        assert_eq!(RemfsError::AlreadyExists("x".into()).errno(), libc::EEXIST);
        assert_eq!(RemfsError::NotPermitted.errno(), libc::EPERM);
        assert_eq!(RemfsError::Busy.errno(), libc::EBUSY);
        assert_eq!(RemfsError::Conversion("bad".into()).errno(), libc::EIO);
    }
}
