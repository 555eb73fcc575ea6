//! System Call Interface
//!
//! Handles requests from user mode. The trap stub hands over the user
//! stack pointer; the call number and up to three arguments are the words
//! at `esp`, `esp+4`, `esp+8`, `esp+12`. Every user pointer is checked
//! against the current address space before the kernel touches it, and a
//! bad one kills the process with status -1.

use alloc::vec;

use crate::drivers::console;
use crate::fs::{Fd, STDIN_FD, STDOUT_FD};
use crate::kernel::config::COMMAND_LINE_MAX;
use crate::kernel::memory::{MemoryFault, UserAddr, UserMemory, PAGE_SIZE};
use crate::kernel::scheduler::Tid;
use crate::kernel::user_sync::SyncHandle;
use crate::kernel::Kernel;
use crate::{kdebug, kprintln};

/// System Call Numbers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Create = 4,
    Remove = 5,
    Open = 6,
    Filesize = 7,
    Read = 8,
    Write = 9,
    Seek = 10,
    Tell = 11,
    Close = 12,
    Practice = 13,
    PtCreate = 15,
    PtExit = 16,
    PtJoin = 17,
    LockInit = 18,
    LockAcquire = 19,
    LockRelease = 20,
    SemaInit = 21,
    SemaDown = 22,
    SemaUp = 23,
    GetTid = 24,
    Unknown,
}

impl From<u32> for SyscallNumber {
    fn from(n: u32) -> Self {
        match n {
            1 => SyscallNumber::Exit,
            2 => SyscallNumber::Exec,
            3 => SyscallNumber::Wait,
            4 => SyscallNumber::Create,
            5 => SyscallNumber::Remove,
            6 => SyscallNumber::Open,
            7 => SyscallNumber::Filesize,
            8 => SyscallNumber::Read,
            9 => SyscallNumber::Write,
            10 => SyscallNumber::Seek,
            11 => SyscallNumber::Tell,
            12 => SyscallNumber::Close,
            13 => SyscallNumber::Practice,
            15 => SyscallNumber::PtCreate,
            16 => SyscallNumber::PtExit,
            17 => SyscallNumber::PtJoin,
            18 => SyscallNumber::LockInit,
            19 => SyscallNumber::LockAcquire,
            20 => SyscallNumber::LockRelease,
            21 => SyscallNumber::SemaInit,
            22 => SyscallNumber::SemaDown,
            23 => SyscallNumber::SemaUp,
            24 => SyscallNumber::GetTid,
            _ => SyscallNumber::Unknown,
        }
    }
}

/// Returned for every failed call
pub const SYSCALL_ERROR: u32 = u32::MAX;

/// Longest path a file call will read from user memory
const PATH_MAX: usize = PAGE_SIZE;

fn flag(ok: bool) -> u32 {
    ok as u32
}

/// The words above the trap frame's stack pointer
struct Args<'a> {
    mem: UserMemory<'a>,
    esp: UserAddr,
}

impl<'a> Args<'a> {
    fn word(&self, index: u32) -> Result<u32, MemoryFault> {
        let addr = self
            .esp
            .checked_add(4 * index)
            .ok_or(MemoryFault::NotUser(self.esp))?;
        self.mem.read_u32(addr)
    }

    /// The file name at the pointer in argument `index`. `None` if the
    /// bytes are not UTF-8, which no file name is.
    fn path(&self, index: u32) -> Result<Option<alloc::string::String>, MemoryFault> {
        let ptr = self.word(index)?;
        let bytes = self.mem.read_cstr(ptr, PATH_MAX)?;
        Ok(alloc::string::String::from_utf8(bytes).ok())
    }
}

impl Kernel {
    /// Handle a system call. The return value goes back to user mode in eax.
    pub fn syscall(&'static self, esp: UserAddr) -> u32 {
        match self.dispatch(esp) {
            Ok(ret) => ret,
            Err(fault) => {
                kdebug!("[SYSCALL] killed: {}", fault);
                self.exit_with_message(-1)
            }
        }
    }

    fn dispatch(&'static self, esp: UserAddr) -> Result<u32, MemoryFault> {
        let mem = self.user_memory().ok_or(MemoryFault::NotUser(esp))?;
        let args = Args { mem, esp };
        let num = args.word(0)?;

        let ret = match SyscallNumber::from(num) {
            SyscallNumber::Exit => {
                let status = args.word(1)? as i32;
                self.exit_with_message(status)
            }
            SyscallNumber::Practice => args.word(1)?.wrapping_add(1),
            SyscallNumber::Exec => {
                let ptr = args.word(1)?;
                let command = args.mem.read_cstr(ptr, COMMAND_LINE_MAX)?;
                self.spawn_process(command).map(|pid| pid.0).unwrap_or(SYSCALL_ERROR)
            }
            SyscallNumber::Wait => {
                let child = Tid(args.word(1)?);
                self.wait(child).map(|status| status as u32).unwrap_or(SYSCALL_ERROR)
            }

            SyscallNumber::Create => {
                let path = args.path(1)?;
                let size = args.word(2)?;
                match path {
                    Some(path) => {
                        let _fs = self.filesys.lock(self.scheduler());
                        flag(self.fs().create(&path, size as u64).is_ok())
                    }
                    None => flag(false),
                }
            }
            SyscallNumber::Remove => {
                match args.path(1)? {
                    Some(path) => {
                        let _fs = self.filesys.lock(self.scheduler());
                        flag(self.fs().remove(&path).is_ok())
                    }
                    None => flag(false),
                }
            }
            SyscallNumber::Open => {
                let opened = args.path(1)?.and_then(|path| {
                    let _fs = self.filesys.lock(self.scheduler());
                    self.fs().open(&path).ok()
                });
                match opened.and_then(|file| self.open_file(file).ok()) {
                    Some(fd) => fd as u32,
                    None => SYSCALL_ERROR,
                }
            }
            SyscallNumber::Filesize => {
                let fd = args.word(1)? as Fd;
                match self.find_file(fd) {
                    Some(file) => {
                        let _fs = self.filesys.lock(self.scheduler());
                        let len = file.lock().length();
                        len as u32
                    }
                    None => SYSCALL_ERROR,
                }
            }
            SyscallNumber::Read => {
                let fd = args.word(1)? as Fd;
                let buf = args.word(2)?;
                let size = args.word(3)? as usize;
                args.mem.check(buf, size)?;
                self.sys_read(&args.mem, fd, buf, size)?
            }
            SyscallNumber::Write => {
                let fd = args.word(1)? as Fd;
                let buf = args.word(2)?;
                let size = args.word(3)? as usize;
                args.mem.check(buf, size)?;
                let mut data = vec![0u8; size];
                args.mem.read(buf, &mut data)?;
                self.sys_write(fd, &data)
            }
            SyscallNumber::Seek => {
                let fd = args.word(1)? as Fd;
                let pos = args.word(2)?;
                if let Some(file) = self.find_file(fd) {
                    let _fs = self.filesys.lock(self.scheduler());
                    file.lock().seek(pos as u64);
                }
                0
            }
            SyscallNumber::Tell => {
                let fd = args.word(1)? as Fd;
                match self.find_file(fd) {
                    Some(file) => {
                        let _fs = self.filesys.lock(self.scheduler());
                        let pos = file.lock().tell();
                        pos as u32
                    }
                    None => SYSCALL_ERROR,
                }
            }
            SyscallNumber::Close => {
                let fd = args.word(1)? as Fd;
                match self.close_file(fd) {
                    Some(file) => {
                        let _fs = self.filesys.lock(self.scheduler());
                        file.lock().close();
                        0
                    }
                    None => SYSCALL_ERROR,
                }
            }

            SyscallNumber::PtCreate => {
                let stub = args.word(1)?;
                let entry = args.word(2)?;
                let arg = args.word(3)?;
                self.spawn_thread(stub, entry, arg).map(|tid| tid.0).unwrap_or(SYSCALL_ERROR)
            }
            SyscallNumber::PtExit => self.thread_exit(),
            SyscallNumber::PtJoin => {
                let tid = Tid(args.word(1)?);
                self.join(tid).map(|tid| tid.0).unwrap_or(SYSCALL_ERROR)
            }
            SyscallNumber::GetTid => self.scheduler().current().0,

            SyscallNumber::LockInit => {
                let slot = args.word(1)?;
                if slot == 0 {
                    return Ok(flag(false));
                }
                args.mem.check(slot, 4)?;
                match self.lock_init() {
                    Ok(handle) => {
                        args.mem.write_u32(slot, handle.0)?;
                        flag(true)
                    }
                    Err(_) => flag(false),
                }
            }
            SyscallNumber::LockAcquire => match Self::handle_at(&args)? {
                Some(handle) => flag(self.lock_acquire(handle).is_ok()),
                None => flag(false),
            },
            SyscallNumber::LockRelease => match Self::handle_at(&args)? {
                Some(handle) => flag(self.lock_release(handle).is_ok()),
                None => flag(false),
            },
            SyscallNumber::SemaInit => {
                let slot = args.word(1)?;
                let value = args.word(2)? as i32;
                if slot == 0 {
                    return Ok(flag(false));
                }
                args.mem.check(slot, 4)?;
                match self.sema_init(value) {
                    Ok(handle) => {
                        args.mem.write_u32(slot, handle.0)?;
                        flag(true)
                    }
                    Err(_) => flag(false),
                }
            }
            SyscallNumber::SemaDown => match Self::handle_at(&args)? {
                Some(handle) => flag(self.sema_down(handle).is_ok()),
                None => flag(false),
            },
            SyscallNumber::SemaUp => match Self::handle_at(&args)? {
                Some(handle) => flag(self.sema_up(handle).is_ok()),
                None => flag(false),
            },

            SyscallNumber::Unknown => {
                kprintln!("Unknown syscall: {}", num);
                SYSCALL_ERROR
            }
        };
        Ok(ret)
    }

    /// The sync handle stored at the pointer in argument 1; `None` for NULL.
    fn handle_at(args: &Args<'_>) -> Result<Option<SyncHandle>, MemoryFault> {
        let slot = args.word(1)?;
        if slot == 0 {
            return Ok(None);
        }
        Ok(Some(SyncHandle(args.mem.read_u32(slot)?)))
    }

    fn sys_read(&self, mem: &UserMemory<'_>, fd: Fd, buf: UserAddr, size: usize) -> Result<u32, MemoryFault> {
        if fd == STDIN_FD {
            return Ok(SYSCALL_ERROR);
        }
        let file = match self.find_file(fd) {
            Some(file) => file,
            None => return Ok(SYSCALL_ERROR),
        };

        let mut data = vec![0u8; size];
        let read = {
            let _fs = self.filesys.lock(self.scheduler());
            let result = file.lock().read(&mut data);
            result
        };
        match read {
            Ok(n) => {
                mem.write(buf, &data[..n])?;
                Ok(n as u32)
            }
            Err(_) => Ok(SYSCALL_ERROR),
        }
    }

    fn sys_write(&self, fd: Fd, data: &[u8]) -> u32 {
        if fd == STDOUT_FD {
            console::put_bytes(data);
            return data.len() as u32;
        }
        match self.find_file(fd) {
            Some(file) => {
                let _fs = self.filesys.lock(self.scheduler());
                let result = file.lock().write(data);
                result.map(|n| n as u32).unwrap_or(SYSCALL_ERROR)
            }
            None => SYSCALL_ERROR,
        }
    }
}
