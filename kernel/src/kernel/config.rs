//! Kernel Limits
//!
//! Compile-time ceilings. Exceeding one is an error for the caller,
//! never a silent truncation.

use crate::kernel::memory::PAGE_SIZE;

/// Most whitespace-separated tokens a command line may carry
pub const MAX_ARGC: usize = 32;

/// Most threads a process may spawn over its lifetime, main thread excluded.
/// Slot `n` takes the two pages `2n` pages below the main stack.
pub const MAX_THREADS: usize = 127;

/// Process names are truncated to this many bytes
pub const PROCESS_NAME_LEN: usize = 16;

/// First descriptor handed out; 0 and 1 are the console
pub const FIRST_FD: i32 = 5;

/// Largest program-header table the loader accepts
pub const MAX_PROGRAM_HEADERS: usize = 1024;

/// Command lines must fit, with their terminator, in one page
pub const COMMAND_LINE_MAX: usize = PAGE_SIZE;
