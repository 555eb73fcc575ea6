//! Console Output
//!
//! Text output for `kprint!` and for user writes to fd 1. The actual device
//! is installed once at boot; output before that is dropped.

use alloc::string::String;
use core::fmt::{self, Write};

use spin::Once;

use crate::kernel::sync::SpinLock;

/// Something that can show bytes to a human
pub trait ConsoleSink: Send + Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

static SINK: Once<&'static dyn ConsoleSink> = Once::new();

/// Keeps one caller's output contiguous
static CONSOLE_LOCK: SpinLock<()> = SpinLock::new(());

/// Install the console device. Only the first call has any effect.
pub fn install(sink: &'static dyn ConsoleSink) -> bool {
    let mut installed = false;
    SINK.call_once(|| {
        installed = true;
        sink
    });
    installed
}

pub fn is_installed() -> bool {
    SINK.get().is_some()
}

/// Write raw bytes in one piece
pub fn put_bytes(bytes: &[u8]) {
    if let Some(sink) = SINK.get() {
        let _guard = CONSOLE_LOCK.lock();
        sink.write_bytes(bytes);
    }
}

/// Print formatted text
pub fn print(args: fmt::Arguments) {
    if SINK.get().is_none() {
        return;
    }
    let mut line = String::new();
    let _ = line.write_fmt(args);
    put_bytes(line.as_bytes());
}
