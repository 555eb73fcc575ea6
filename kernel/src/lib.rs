//! ╔═══════════════════════════════════════════════════════════════════════════╗
//! ║                   LIFECYCLE KERNEL - LIBRARY ROOT                         ║
//! ║            Processes, Threads, and the Road to User Mode                  ║
//! ╚═══════════════════════════════════════════════════════════════════════════╝
//!
//! The process and thread lifecycle core of a small 32-bit teaching kernel:
//! loading ELF executables, building the initial user stack, parent/child
//! wait and exit, user threads with join, and user-level locks and
//! semaphores. The scheduler, the MMU, and the file system are supplied by
//! the embedding kernel (or a host test harness) through traits.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod drivers;
pub mod fs;
pub mod kernel;

pub use kernel::{Kernel, Platform};

// ═══════════════════════════════════════════════════════════════════════════════
// MACROS
// ═══════════════════════════════════════════════════════════════════════════════

#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::drivers::console::print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! kprintln {
    () => { $crate::kprint!("\n") };
    ($($arg:tt)*) => {
        $crate::kprint!("{}\n", format_args!($($arg)*))
    };
}

/// Lifecycle tracing, compiled in with the `debug` feature
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {
        if cfg!(feature = "debug") {
            $crate::kprintln!($($arg)*)
        }
    };
}
