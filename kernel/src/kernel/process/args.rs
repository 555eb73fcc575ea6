//! Initial stack frame for a new process
//!
//! Layout, from the stack top downward, in 32-bit words:
//!
//! ```text
//! PHYS_BASE  ┬ argv[argc-1] .. argv[0] strings, NUL-terminated
//!            ├ zero padding (whole frame is a multiple of 16 bytes)
//!            ├ NULL                      argv[argc]
//!            ├ &argv[argc-1] .. &argv[0]
//!            ├ argv                      points at the &argv[0] slot
//!            ├ argc
//! esp ──────▶┴ 0                         fake return address
//! ```

use alloc::vec::Vec;

use super::ProcessError;
use crate::kernel::config::MAX_ARGC;
use crate::kernel::memory::{UserAddr, UserMemory, PAGE_SIZE};

const WORD: usize = 4;

/// Split a command line on ASCII whitespace. Tokens are raw bytes.
pub fn tokenize(command: &[u8]) -> Result<Vec<&[u8]>, ProcessError> {
    let mut argv = Vec::new();
    let tokens = command
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty());
    for token in tokens {
        if argv.len() == MAX_ARGC {
            return Err(ProcessError::TooManyArguments);
        }
        argv.push(token);
    }
    if argv.is_empty() {
        return Err(ProcessError::EmptyCommand);
    }
    Ok(argv)
}

/// Zero bytes inserted between the strings and the argv array
fn padding<A: AsRef<[u8]>>(argv: &[A]) -> usize {
    let unpadded = string_bytes(argv) + fixed_words(argv.len()) * WORD;
    (16 - unpadded % 16) % 16
}

fn string_bytes<A: AsRef<[u8]>>(argv: &[A]) -> usize {
    argv.iter().map(|a| a.as_ref().len() + 1).sum()
}

/// argv[0..=argc], the argv pointer, argc, and the return slot
fn fixed_words(argc: usize) -> usize {
    (argc + 1) + 3
}

/// Bytes the frame for `argv` occupies below the stack top
pub fn frame_size<A: AsRef<[u8]>>(argv: &[A]) -> usize {
    string_bytes(argv) + padding(argv) + fixed_words(argv.len()) * WORD
}

/// Write the frame below `top` and return the initial stack pointer.
pub fn marshal<A: AsRef<[u8]>>(mem: &UserMemory<'_>, top: UserAddr, argv: &[A]) -> Result<UserAddr, ProcessError> {
    if frame_size(argv) > PAGE_SIZE {
        return Err(ProcessError::ArgumentsTooLong);
    }

    let mut sp = top;
    let mut addrs: Vec<UserAddr> = Vec::with_capacity(argv.len());

    for arg in argv.iter().rev() {
        let arg = arg.as_ref();
        sp -= (arg.len() + 1) as UserAddr;
        mem.write(sp, arg)?;
        mem.write(sp + arg.len() as UserAddr, &[0])?;
        addrs.push(sp);
    }
    addrs.reverse();

    let pad = padding(argv);
    sp -= pad as UserAddr;
    mem.write(sp, &[0u8; 16][..pad])?;

    sp -= WORD as UserAddr;
    mem.write_u32(sp, 0)?;
    for addr in addrs.iter().rev() {
        sp -= WORD as UserAddr;
        mem.write_u32(sp, *addr)?;
    }

    let argv_ptr = sp;
    sp -= WORD as UserAddr;
    mem.write_u32(sp, argv_ptr)?;
    sp -= WORD as UserAddr;
    mem.write_u32(sp, argv.len() as u32)?;
    sp -= WORD as UserAddr;
    mem.write_u32(sp, 0)?;

    debug_assert_eq!((top - sp) as usize, frame_size(argv));
    Ok(sp)
}
