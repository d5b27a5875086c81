//! FUSE filesystem for a FileJump account
//!
//! `operations` answers path based requests against the directory index
//! and the staging area; `filesystem` adapts them to the kernel interface.

pub mod attributes;
pub mod file_handles;
pub mod filesystem;
pub mod inodes;
pub mod operations;
pub mod utils;

pub use filesystem::{mount_filesystem, FileJumpFuse};
pub use operations::FileJumpOperations;
