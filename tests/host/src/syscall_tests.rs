//! System Call Tests
//!
//! The trap-level interface: argument decoding, user pointer checks and
//! the file calls.

use lifecycle_kernel::kernel::memory::PHYS_BASE;
use lifecycle_kernel::kernel::syscall::{SyscallNumber, SYSCALL_ERROR};
use lifecycle_kernel_tests::elf_image::TEXT_BASE;
use lifecycle_kernel_tests::*;

const EXIT: u32 = SyscallNumber::Exit as u32;
const EXEC: u32 = SyscallNumber::Exec as u32;
const CREATE: u32 = SyscallNumber::Create as u32;
const REMOVE: u32 = SyscallNumber::Remove as u32;
const OPEN: u32 = SyscallNumber::Open as u32;
const FILESIZE: u32 = SyscallNumber::Filesize as u32;
const READ: u32 = SyscallNumber::Read as u32;
const WRITE: u32 = SyscallNumber::Write as u32;
const SEEK: u32 = SyscallNumber::Seek as u32;
const TELL: u32 = SyscallNumber::Tell as u32;
const CLOSE: u32 = SyscallNumber::Close as u32;
const PRACTICE: u32 = SyscallNumber::Practice as u32;

// ═══════════════════════════════════════════════════════════════════════════════
// BASIC CALLS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_practice_increments() {
    let m = Machine::boot_adopted();
    let status = m.run("practice", |ctx| ctx.syscall(&[PRACTICE, 41]) as i32);
    assert_eq!(status, 42);
}

#[test]
fn test_exit_call_prints_and_reports() {
    let m = Machine::boot_adopted();
    let status = m.run("sysexit", |ctx| {
        ctx.syscall(&[EXIT, 3]);
        unreachable!("exit returned")
    });
    assert_eq!(status, 3);
    assert_eq!(console_output().matches("sysexit: exit(").count(), 1);
    assert!(console_output().contains("sysexit: exit(3)\n"));
    m.assert_clean();
}

#[test]
fn test_write_to_stdout() {
    let m = Machine::boot_adopted();
    let status = m.run("printer", |ctx| {
        let msg = b"stdout from printer\n";
        let buf = ctx.push_bytes(msg);
        ctx.syscall(&[WRITE, 1, buf, msg.len() as u32]) as i32
    });
    assert_eq!(status, 20);
    assert!(console_output().contains("stdout from printer\n"));
}

#[test]
fn test_read_from_stdin_fails() {
    let m = Machine::boot_adopted();
    let status = m.run("stdin", |ctx| {
        let buf = ctx.push_zeroed(8);
        ctx.syscall(&[READ, 0, buf, 8]) as i32
    });
    assert_eq!(status, -1);
}

#[test]
fn test_unknown_call_returns_error() {
    let m = Machine::boot_adopted();
    let status = m.run("unknown", |ctx| {
        assert_eq!(ctx.syscall(&[99]), SYSCALL_ERROR);
        assert_eq!(ctx.syscall(&[14]), SYSCALL_ERROR);
        0
    });
    assert_eq!(status, 0);
    assert!(console_output().contains("Unknown syscall: 99\n"));
}

#[test]
fn test_exec_missing_program_returns_error() {
    let m = Machine::boot_adopted();
    let status = m.run("exec-missing", |ctx| {
        let cmd = ctx.push_str("does-not-exist arg");
        (ctx.syscall(&[EXEC, cmd]) == SYSCALL_ERROR) as i32
    });
    assert_eq!(status, 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BAD POINTERS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_bad_stack_pointer_kills() {
    let m = Machine::boot_adopted();
    let status = m.run("bad-esp", |ctx| {
        ctx.kernel().syscall(0);
        0
    });
    assert_eq!(status, -1);
    assert!(console_output().contains("bad-esp: exit(-1)\n"));
    m.assert_clean();
}

#[test]
fn test_arguments_straddling_phys_base_kill() {
    let m = Machine::boot_adopted();
    let status = m.run("straddle", |ctx| {
        // Call number readable, argument words beyond user space.
        assert!(ctx.try_write(PHYS_BASE - 4, &WRITE.to_le_bytes()));
        ctx.kernel().syscall(PHYS_BASE - 4);
        0
    });
    assert_eq!(status, -1);
}

#[test]
fn test_kernel_buffer_kills() {
    let m = Machine::boot_adopted();
    let status = m.run("kbuf", |ctx| {
        ctx.syscall(&[WRITE, 1, PHYS_BASE, 4]);
        0
    });
    assert_eq!(status, -1);
}

#[test]
fn test_unmapped_buffer_kills() {
    let m = Machine::boot_adopted();
    let status = m.run("unmapped", |ctx| {
        ctx.syscall(&[WRITE, 1, 0x1000_0000, 4]);
        0
    });
    assert_eq!(status, -1);
}

#[test]
fn test_null_path_kills() {
    let m = Machine::boot_adopted();
    let status = m.run("nullpath", |ctx| {
        ctx.syscall(&[OPEN, 0]);
        0
    });
    assert_eq!(status, -1);
}

#[test]
fn test_read_into_code_kills() {
    let m = Machine::boot_adopted();
    m.install_raw("src", vec![9; 16]);
    let status = m.run("rcode", |ctx| {
        let path = ctx.push_str("src");
        let fd = ctx.syscall(&[OPEN, path]);
        ctx.syscall(&[READ, fd, TEXT_BASE, 4]);
        0
    });
    assert_eq!(status, -1);
    assert_eq!(m.fs.open_handles(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_file_round_trip() {
    let m = Machine::boot_adopted();
    let status = m.run("files", |ctx| {
        let path = ctx.push_str("notes");
        assert_eq!(ctx.syscall(&[CREATE, path, 16]), 1);
        assert_eq!(ctx.syscall(&[CREATE, path, 16]), 0);

        let fd = ctx.syscall(&[OPEN, path]);
        assert_ne!(fd, SYSCALL_ERROR);
        assert_eq!(ctx.syscall(&[FILESIZE, fd]), 16);

        let data = ctx.push_bytes(b"abcdef");
        assert_eq!(ctx.syscall(&[WRITE, fd, data, 6]), 6);
        assert_eq!(ctx.syscall(&[TELL, fd]), 6);

        ctx.syscall(&[SEEK, fd, 2]);
        let buf = ctx.push_zeroed(4);
        assert_eq!(ctx.syscall(&[READ, fd, buf, 4]), 4);
        assert_eq!(ctx.read_bytes(buf, 4), b"cdef");

        ctx.syscall(&[SEEK, fd, 14]);
        assert_eq!(ctx.syscall(&[READ, fd, buf, 4]), 2);

        assert_eq!(ctx.syscall(&[CLOSE, fd]), 0);
        assert_eq!(ctx.syscall(&[REMOVE, path]), 1);
        assert_eq!(ctx.syscall(&[REMOVE, path]), 0);
        assert_eq!(ctx.syscall(&[OPEN, path]), SYSCALL_ERROR);
        0
    });
    assert_eq!(status, 0);
    assert_eq!(m.fs.contents("notes"), None);
    m.assert_clean();
}

#[test]
fn test_non_utf8_path_names_no_file() {
    let m = Machine::boot_adopted();
    m.install_raw("data", vec![0; 4]);
    let status = m.run("rawpath", |ctx| {
        let path = ctx.push_bytes(b"\xffdata\0");
        assert_eq!(ctx.syscall(&[OPEN, path]), SYSCALL_ERROR);
        assert_eq!(ctx.syscall(&[CREATE, path, 8]), 0);
        assert_eq!(ctx.syscall(&[REMOVE, path]), 0);
        0
    });
    assert_eq!(status, 0);
    assert!(m.fs.contents("data").is_some());
}

#[test]
fn test_calls_on_unopened_fd_fail() {
    let m = Machine::boot_adopted();
    let status = m.run("nofd", |ctx| {
        let buf = ctx.push_zeroed(4);
        assert_eq!(ctx.syscall(&[READ, 7, buf, 4]), SYSCALL_ERROR);
        assert_eq!(ctx.syscall(&[WRITE, 7, buf, 4]), SYSCALL_ERROR);
        assert_eq!(ctx.syscall(&[FILESIZE, 7]), SYSCALL_ERROR);
        assert_eq!(ctx.syscall(&[TELL, 7]), SYSCALL_ERROR);
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_running_executable_is_write_protected() {
    let m = Machine::boot_adopted();
    let status = m.run("rox", |ctx| {
        let path = ctx.push_str("rox");
        let fd = ctx.syscall(&[OPEN, path]);
        let data = ctx.push_bytes(b"XXXX");
        ctx.syscall(&[WRITE, fd, data, 4]) as i32
    });
    assert_eq!(status, 0);
    assert_eq!(m.fs.deny_count("rox"), 0);
    assert_ne!(&m.fs.contents("rox").unwrap()[..4], b"XXXX");

    // Once the process is gone, writers are let back in.
    let writer = m.run("rox-writer", |ctx| {
        let path = ctx.push_str("rox");
        let fd = ctx.syscall(&[OPEN, path]);
        let data = ctx.push_bytes(b"XXXX");
        ctx.syscall(&[WRITE, fd, data, 4]) as i32
    });
    assert_eq!(writer, 4);
    assert_eq!(&m.fs.contents("rox").unwrap()[..4], b"XXXX");
}
