//! Process creation and teardown

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::str;

use super::args;
use super::{ChildRecord, LaunchHandshake, Process, ProcessError};
use crate::kernel::config::COMMAND_LINE_MAX;
use crate::kernel::loader::{self, LoadError};
use crate::kernel::scheduler::{Pid, UserFrame};
use crate::kernel::Kernel;
use crate::{kdebug, kprintln};

/// Shared between a parent in `spawn_process` and the child's bootstrap
struct Launch {
    command: Vec<u8>,
    parent: Pid,
    handshake: LaunchHandshake,
}

impl Kernel {
    /// Start a new process running `command_line`.
    ///
    /// Returns once the child has loaded and its child record is in place,
    /// so the caller can `wait` on the pid immediately. The command line is
    /// taken as raw bytes and reaches the child's argv unchanged.
    pub fn spawn_process(&'static self, command_line: impl AsRef<[u8]>) -> Result<Pid, ProcessError> {
        let command_line = command_line.as_ref();
        if command_line.len() >= COMMAND_LINE_MAX {
            return Err(ProcessError::ArgumentsTooLong);
        }
        let sched = self.scheduler();
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let parent = process.pid();

        let launch = Arc::new(Launch {
            command: command_line.to_vec(),
            parent,
            handshake: LaunchHandshake::new(),
        });
        let name = match args::tokenize(command_line) {
            Ok(argv) => String::from_utf8_lossy(argv[0]).into_owned(),
            Err(_) => String::new(),
        };

        let child = launch.clone();
        let tid = sched
            .spawn(&name, Box::new(move || {
                self.start_process(child);
            }))
            .ok_or(ProcessError::SpawnFailed)?;

        if !launch.handshake.wait_loaded(sched) {
            return Err(ProcessError::SpawnFailed);
        }

        {
            let mut children = self.children.lock(sched);
            // An exiting parent has already dropped its records; the child runs orphaned.
            if !process.is_exiting() {
                children.push(Arc::new(ChildRecord::new(tid, parent)));
            }
        }
        launch.handshake.register(sched);

        kdebug!("[PROC] {} spawned pid {} ({})", parent, tid, name);
        Ok(tid)
    }

    /// First code run by a new process's kernel thread.
    fn start_process(&self, launch: Arc<Launch>) -> ! {
        let sched = self.scheduler();
        match self.prepare_process(&launch) {
            Ok(frame) => {
                launch.handshake.report_loaded(sched, true);
                launch.handshake.wait_registered(sched);
                drop(launch);
                sched.jump_to_user(frame)
            }
            Err(err) => {
                kdebug!("[PROC] {}: start failed: {}", String::from_utf8_lossy(&launch.command), err);
                launch.handshake.report_loaded(sched, false);
                drop(launch);
                sched.exit_current()
            }
        }
    }

    fn prepare_process(&self, launch: &Launch) -> Result<UserFrame, ProcessError> {
        let argv = args::tokenize(&launch.command)?;
        let tid = self.scheduler().current();

        let name = String::from_utf8_lossy(argv[0]);
        let process = Arc::new(Process::new(tid, &name, Some(launch.parent)));
        self.attach(tid, process.clone());

        let result = self.load_into(&process, &argv);
        if result.is_err() {
            // Nobody may reach the block through this thread once it starts dying.
            self.detach(tid);
        }
        result
    }

    fn load_into(&self, process: &Process, argv: &[&[u8]]) -> Result<UserFrame, ProcessError> {
        let path = match str::from_utf8(argv[0]) {
            Ok(path) => path,
            Err(_) => {
                // No file system entry can carry this name.
                kprintln!("load: {}: open failed", String::from_utf8_lossy(argv[0]));
                return Err(ProcessError::LoadFailed(LoadError::NotFound));
            }
        };
        let image = {
            let _fs = self.filesys.lock(self.scheduler());
            loader::load(self.mmu(), self.fs(), path)?
        };

        let esp = args::marshal(&image.space.memory(), image.stack_top, argv)?;
        let eip = image.entry;

        process.install_image(image.space, image.file);
        process.activate(&**self.mmu());
        Ok(UserFrame { eip, esp })
    }

    /// Terminate the calling thread's process with `status`.
    pub fn exit(&self, status: i32) -> ! {
        self.exit_process(status, false)
    }

    /// Print the exit line for the current process and exit.
    ///
    /// Only the thread that wins the teardown prints, so the line appears
    /// once however many threads exit together.
    pub fn exit_with_message(&self, status: i32) -> ! {
        self.exit_process(status, true)
    }

    fn exit_process(&self, status: i32, announce: bool) -> ! {
        let sched = self.scheduler();
        let tid = sched.current();
        let process = match self.current_process() {
            Some(process) => process,
            None => sched.exit_current(),
        };
        let pid = process.pid();
        if !process.begin_exit() {
            // Another thread is already tearing this process down.
            self.release_joiner(&process, tid);
            self.detach(tid);
            drop(process);
            sched.exit_current()
        }
        if announce {
            kprintln!("{}: exit({})", process.name(), status);
        }
        kdebug!("[PROC] {} ({}) exiting with {}", pid, process.name(), status);

        process.release_address_space(&**self.mmu());
        self.publish_exit(pid, status);
        process.close_executable();
        process.close_all_files();

        self.release_joiner(&process, tid);
        self.detach(tid);
        drop(process);
        sched.exit_current()
    }

    /// Give the calling kernel thread a control block with no address space,
    /// so it can spawn and wait on processes.
    pub fn adopt_current_thread(&self, name: &str) -> Pid {
        let tid = self.scheduler().current();
        self.attach(tid, Arc::new(Process::new(tid, name, None)));
        tid
    }
}
