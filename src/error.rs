//! Error kinds surfaced by the remote client and the filesystem layer

use libc::c_int;
use thiserror::Error;

/// Failures talking to the FileJump REST API
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("cannot read upload source: {0}")]
    Source(#[source] std::io::Error),
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Protocol(e.to_string())
    }
}

/// Result kinds of the path-addressed filesystem operations
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("entry already exists")]
    AlreadyExists,

    #[error("not a directory")]
    NotDirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("local staging I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown file handle {0}")]
    BadHandle(u64),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl FsError {
    /// errno reported back to the kernel
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NotDirectory => libc::ENOTDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::Io(_) => libc::EIO,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::Remote(_) => libc::EIO,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::AlreadyExists.errno(), libc::EEXIST);
        assert_eq!(FsError::NotDirectory.errno(), libc::ENOTDIR);
        assert_eq!(FsError::NotEmpty.errno(), libc::ENOTEMPTY);
        assert_eq!(FsError::BadHandle(7).errno(), libc::EBADF);
        assert_eq!(FsError::Remote(RemoteError::Timeout).errno(), libc::EIO);
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: FsError = io.into();
        assert_eq!(err.errno(), libc::EIO);
    }

    #[test]
    fn test_status_error_message_carries_body() {
        let err = RemoteError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected status 500: boom");
        assert!(!err.is_timeout());
    }
}
