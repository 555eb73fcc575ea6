//! Process Lifecycle Tests
//!
//! Spawn, wait and exit with real kernel threads, address spaces and
//! executables.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lifecycle_kernel::kernel::scheduler::Tid;
use lifecycle_kernel::kernel::syscall::SyscallNumber;
use lifecycle_kernel::kernel::ProcessError;
use lifecycle_kernel_tests::machine::STUB;
use lifecycle_kernel_tests::*;

const EXEC: u32 = SyscallNumber::Exec as u32;
const WAIT: u32 = SyscallNumber::Wait as u32;
const PT_CREATE: u32 = SyscallNumber::PtCreate as u32;

// ═══════════════════════════════════════════════════════════════════════════════
// WAIT AND EXIT STATUS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_wait_returns_exit_status() {
    let m = Machine::boot_adopted();
    assert_eq!(m.run("forty-two", |_| 42), 42);
    assert_eq!(m.run("negative", |_| -5), -5);
    m.assert_clean();
}

#[test]
fn test_wait_blocks_until_child_exits() {
    let m = Machine::boot_adopted();
    let gate = Gate::new();
    let released = Arc::new(AtomicBool::new(false));

    let g = gate.clone();
    m.install_program("slow", move |_| {
        g.wait();
        7
    });
    let pid = m.kernel.spawn_process("slow").unwrap();

    let (g, r) = (gate.clone(), released.clone());
    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        r.store(true, Ordering::SeqCst);
        g.open();
    });

    assert_eq!(m.kernel.wait(pid), Ok(7));
    assert!(released.load(Ordering::SeqCst));
    opener.join().unwrap();
    m.assert_clean();
}

#[test]
fn test_status_survives_until_waited() {
    let m = Machine::boot_adopted();
    m.install_program("quick", |_| 13);
    let pid = m.kernel.spawn_process("quick").unwrap();

    assert!(m.wait_thread_exit(pid));
    assert_eq!(m.kernel.pending_children(), 1);
    assert_eq!(m.kernel.wait(pid), Ok(13));
    assert_eq!(m.kernel.pending_children(), 0);
}

#[test]
fn test_second_wait_fails() {
    let m = Machine::boot_adopted();
    m.install_program("once", |_| 0);
    let pid = m.kernel.spawn_process("once").unwrap();

    assert_eq!(m.kernel.wait(pid), Ok(0));
    assert_eq!(m.kernel.wait(pid), Err(ProcessError::NotFound));
}

#[test]
fn test_wait_on_unknown_pid_fails() {
    let m = Machine::boot_adopted();
    assert_eq!(m.kernel.wait(Tid(999_999)), Err(ProcessError::NotFound));
}

#[test]
fn test_wait_without_process_fails() {
    let m = Machine::boot();
    assert_eq!(m.kernel.wait(Tid(1)), Err(ProcessError::NoProcess));
    assert_eq!(m.kernel.spawn_process("anything").err(), Some(ProcessError::NoProcess));
}

#[test]
fn test_wait_on_grandchild_fails() {
    let m = Machine::boot_adopted();
    m.install_program("leaf", |_| 3);
    m.install_program("middle", |ctx| {
        let cmd = ctx.push_str("leaf");
        ctx.syscall(&[EXEC, cmd]) as i32
    });

    let middle = m.kernel.spawn_process("middle").unwrap();
    let leaf = m.kernel.wait(middle).unwrap();
    assert!(leaf > 0);
    assert_eq!(m.kernel.wait(Tid(leaf as u32)), Err(ProcessError::NotFound));
    assert!(m.wait_thread_exit(Tid(leaf as u32)));
    m.assert_clean();
}

#[test]
fn test_parent_waits_inside_user_program() {
    let m = Machine::boot_adopted();
    m.install_program("child", |_| 11);
    let status = m.run("parent", |ctx| {
        let cmd = ctx.push_str("child");
        let pid = ctx.syscall(&[EXEC, cmd]);
        let status = ctx.syscall(&[WAIT, pid]) as i32;
        let again = ctx.syscall(&[WAIT, pid]) as i32;
        assert_eq!(again, -1);
        status + 1
    });
    assert_eq!(status, 12);
    m.assert_clean();
}

#[test]
fn test_concurrent_children() {
    let m = Machine::boot_adopted();
    let mut pids = Vec::new();
    for i in 0..8 {
        let name = format!("kid{}", i);
        m.install_program(&name, move |_| i * 10);
        pids.push(m.kernel.spawn_process(&name).unwrap());
    }
    for (i, pid) in pids.iter().enumerate().rev() {
        assert_eq!(m.kernel.wait(*pid), Ok(i as i32 * 10));
    }
    assert_eq!(m.kernel.pending_children(), 0);
    m.assert_clean();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORPHANS AND CLEANUP
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_orphan_exit_does_not_leak() {
    let m = Machine::boot_adopted();
    let gate = Gate::new();
    let g = gate.clone();
    m.install_program("sleeper", move |_| {
        g.wait();
        1
    });
    m.install_program("abandoner", |ctx| {
        let cmd = ctx.push_str("sleeper");
        ctx.syscall(&[EXEC, cmd]) as i32
    });

    let parent = m.kernel.spawn_process("abandoner").unwrap();
    let sleeper = Tid(m.kernel.wait(parent).unwrap() as u32);

    // The parent's exit discarded the record for its still-running child.
    assert_eq!(m.kernel.pending_children(), 0);
    assert!(!m.sched.has_exited(sleeper));

    gate.open();
    assert!(m.wait_thread_exit(sleeper));
    assert_eq!(m.kernel.pending_children(), 0);
    assert_eq!(m.mmu.live_spaces(), 0);
    assert_eq!(m.mmu.live_frames(), 0);
    m.assert_clean();
}

#[test]
fn test_spawn_from_exited_process_leaves_no_record() {
    let m = Machine::boot_adopted();
    m.install_program("late-kid", |_| 0);

    let started = Gate::new();
    let go = Gate::new();
    let spawned = Arc::new(Mutex::new(None));
    let (s, g, out) = (started.clone(), go.clone(), spawned.clone());
    let spawner = m.register_thread_fn(move |ctx, _| {
        s.open();
        g.wait();
        *out.lock().unwrap() = Some(ctx.kernel().spawn_process("late-kid"));
    });

    let side = Arc::new(AtomicU32::new(0));
    let (s, t) = (started.clone(), side.clone());
    m.install_program("early-exit", move |ctx| {
        t.store(ctx.syscall(&[PT_CREATE, STUB, spawner, 0]), Ordering::SeqCst);
        assert!(s.wait());
        0
    });

    let pid = m.kernel.spawn_process("early-exit").unwrap();
    assert_eq!(m.kernel.wait(pid), Ok(0));
    assert!(m.wait_thread_exit(pid));

    // The main thread's teardown is done; the side thread spawns now.
    go.open();
    assert!(m.wait_thread_exit(Tid(side.load(Ordering::SeqCst))));
    let kid = spawned.lock().unwrap().take().expect("spawn attempted").unwrap();

    assert!(m.wait_thread_exit(kid));
    assert!(console_output().contains("late-kid: exit(0)\n"));
    assert_eq!(m.kernel.pending_children(), 0);
    assert_eq!(m.mmu.live_spaces(), 0);
    m.assert_clean();
}

#[test]
fn test_exit_releases_everything() {
    let m = Machine::boot_adopted();
    let gate = Gate::new();
    let g = gate.clone();
    m.install_program("holder", move |_| {
        g.wait();
        0
    });
    let pid = m.kernel.spawn_process("holder").unwrap();

    assert_eq!(m.mmu.live_spaces(), 1);
    assert!(m.mmu.live_frames() >= 3);
    assert_eq!(m.fs.deny_count("holder"), 1);

    gate.open();
    assert_eq!(m.kernel.wait(pid), Ok(0));
    assert!(m.wait_thread_exit(pid));
    assert_eq!(m.mmu.live_spaces(), 0);
    assert_eq!(m.mmu.live_frames(), 0);
    assert_eq!(m.fs.deny_count("holder"), 0);
    assert_eq!(m.fs.open_handles(), 0);
    assert!(m.kernel.process_of(pid).is_none());
    // Only the harness is left attached.
    assert_eq!(m.kernel.attached_threads(), 1);
    m.assert_clean();
}

#[test]
fn test_many_sequential_processes() {
    let m = Machine::boot_adopted();
    m.install_program("repeat", |ctx| ctx.argc() as i32);
    for _ in 0..40 {
        let pid = m.kernel.spawn_process("repeat a b").unwrap();
        assert_eq!(m.kernel.wait(pid), Ok(3));
    }
    assert_eq!(m.kernel.pending_children(), 0);
    assert_eq!(m.mmu.live_spaces(), 0);
    m.assert_clean();
}

#[test]
fn test_crashing_program_exits_minus_one() {
    let m = Machine::boot_adopted();
    let status = m.run("crasher", |ctx| {
        // Reading page 0 faults.
        ctx.read_u32(0) as i32
    });
    assert_eq!(status, -1);
    assert_eq!(m.sched.panics().len(), 1);
    assert_eq!(m.mmu.live_spaces(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXIT MESSAGE AND NAMES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_exit_line_printed() {
    let m = Machine::boot_adopted();
    m.run("exitline", |_| 9);
    assert!(console_output().contains("exitline: exit(9)\n"));
}

#[test]
fn test_process_named_after_first_token() {
    let m = Machine::boot_adopted();
    m.install_program("named-prog", |ctx| {
        assert_eq!(ctx.kernel().current_process().unwrap().name(), "named-prog");
        0
    });
    let pid = m.kernel.spawn_process("  named-prog   alpha beta").unwrap();
    assert_eq!(m.kernel.wait(pid), Ok(0));
    assert!(console_output().contains("named-prog: exit(0)\n"));
}

#[test]
fn test_long_name_truncated_in_exit_line() {
    let m = Machine::boot_adopted();
    m.run("a-very-long-program-name", |_| 2);
    assert!(console_output().contains("a-very-long-prog: exit(2)\n"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPAWN FAILURES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_spawn_missing_file() {
    let m = Machine::boot_adopted();
    assert_eq!(m.kernel.spawn_process("no-such-prog x"), Err(ProcessError::SpawnFailed));
    assert!(console_output().contains("load: no-such-prog: open failed\n"));
    assert_eq!(m.kernel.pending_children(), 0);
    assert_eq!(m.mmu.live_spaces(), 0);
}

#[test]
fn test_spawn_empty_command() {
    let m = Machine::boot_adopted();
    assert_eq!(m.kernel.spawn_process("  \t "), Err(ProcessError::SpawnFailed));
    assert_eq!(m.kernel.pending_children(), 0);
}

#[test]
fn test_spawn_refused_by_scheduler() {
    let m = Machine::boot_adopted();
    m.install_program("never", |_| 0);
    m.sched.refuse_spawns(true);
    assert_eq!(m.kernel.spawn_process("never"), Err(ProcessError::SpawnFailed));
    m.sched.refuse_spawns(false);
    assert_eq!(m.run("never", |_| 5), 5);
}

#[test]
fn test_spawn_out_of_memory_cleans_up() {
    let m = Machine::boot_adopted();
    m.install_program("hungry", |_| 0);
    m.mmu.set_frame_limit(Some(1));
    assert_eq!(m.kernel.spawn_process("hungry"), Err(ProcessError::SpawnFailed));
    assert_eq!(m.mmu.live_spaces(), 0);
    assert_eq!(m.mmu.live_frames(), 0);
    assert_eq!(m.fs.open_handles(), 0);

    m.mmu.set_frame_limit(None);
    let pid = m.kernel.spawn_process("hungry").unwrap();
    assert_eq!(m.kernel.wait(pid), Ok(0));
}

#[test]
fn test_command_line_too_long() {
    let m = Machine::boot_adopted();
    let line = format!("prog {}", "x".repeat(4096));
    assert_eq!(m.kernel.spawn_process(&line), Err(ProcessError::ArgumentsTooLong));
}

#[test]
fn test_argument_frame_too_big() {
    let m = Machine::boot_adopted();
    m.install_program("big", |_| 0);
    // Under a page of text, but NULs and pointers push the frame past it.
    let mut line = String::from("big");
    for _ in 0..31 {
        line.push(' ');
        line.push_str(&"y".repeat(128));
    }
    assert!(line.len() < 4096);
    assert_eq!(m.kernel.spawn_process(&line), Err(ProcessError::SpawnFailed));
    assert_eq!(m.mmu.live_spaces(), 0);
    assert_eq!(m.fs.deny_count("big"), 0);
}

#[test]
fn test_too_many_arguments() {
    let m = Machine::boot_adopted();
    m.install_program("many", |ctx| ctx.argc() as i32);

    let ok = format!("many{}", " a".repeat(31));
    let pid = m.kernel.spawn_process(&ok).unwrap();
    assert_eq!(m.kernel.wait(pid), Ok(32));

    let too_many = format!("many{}", " a".repeat(32));
    assert_eq!(m.kernel.spawn_process(&too_many), Err(ProcessError::SpawnFailed));
}
