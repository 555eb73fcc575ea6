//! Filesystem Subsystem
//!
//! Collaborator traits for the file system and per-process descriptor tables.

pub mod vfs;
pub mod fd_table;

pub use fd_table::{Fd, FdAllocator, FileTable, STDIN_FD, STDOUT_FD};
pub use vfs::{ExecutableFile, FileHandle, FileOps, FileSystem};
