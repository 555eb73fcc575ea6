//! Lifecycle Kernel - Host-Based Test Harness
//!
//! Runs the real kernel crate on the host machine. Kernel threads become
//! std threads, page tables and frames live in hash maps, and files live
//! in memory. User programs are Rust closures that trap into the kernel
//! through the same `syscall` entry point a trap handler would use.


// Re-exports for convenience
pub use elf_image::ElfImage;
pub use fs::HostFs;
pub use machine::{console_output, Gate, Machine, UserContext};
pub use platform::{HostMmu, HostScheduler};
