//! Checked access to user memory
//!
//! Every byte is translated through the owning space's page tables, so a
//! bad user pointer becomes a [`MemoryFault`] instead of a kernel fault.

use alloc::vec::Vec;
use core::fmt;

use super::mmu::{Mmu, SpaceId};
use super::{is_user_vaddr, pg_ofs, UserAddr, PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    /// Address at or above PHYS_BASE, or a range that wraps
    NotUser(UserAddr),
    /// No page mapped at this address
    Unmapped(UserAddr),
    /// Write to a read-only page
    ReadOnly(UserAddr),
    /// String not terminated within the allowed length
    Unterminated(UserAddr),
}

impl fmt::Display for MemoryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryFault::NotUser(a) => write!(f, "{:#010x} is not a user address", a),
            MemoryFault::Unmapped(a) => write!(f, "{:#010x} is unmapped", a),
            MemoryFault::ReadOnly(a) => write!(f, "{:#010x} is read-only", a),
            MemoryFault::Unterminated(a) => write!(f, "string at {:#010x} is unterminated", a),
        }
    }
}

pub struct UserMemory<'a> {
    mmu: &'a dyn Mmu,
    space: SpaceId,
}

impl<'a> UserMemory<'a> {
    pub fn new(mmu: &'a dyn Mmu, space: SpaceId) -> Self {
        Self { mmu, space }
    }

    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// Check that `[addr, addr + len)` is user space and mapped.
    pub fn check(&self, addr: UserAddr, len: usize) -> Result<(), MemoryFault> {
        self.walk(addr, len, false, |_, _, _| {})
    }

    pub fn read(&self, addr: UserAddr, buf: &mut [u8]) -> Result<(), MemoryFault> {
        self.walk(addr, buf.len(), false, |mapping, ofs, range| {
            self.mmu.read_frame(mapping, ofs, &mut buf[range]);
        })
    }

    /// Copy `bytes` into user pages. Every touched page must be writable.
    pub fn write(&self, addr: UserAddr, bytes: &[u8]) -> Result<(), MemoryFault> {
        self.walk(addr, bytes.len(), true, |mapping, ofs, range| {
            self.mmu.write_frame(mapping, ofs, &bytes[range]);
        })
    }

    pub fn read_u32(&self, addr: UserAddr) -> Result<u32, MemoryFault> {
        let mut word = [0u8; 4];
        self.read(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_u32(&self, addr: UserAddr, value: u32) -> Result<(), MemoryFault> {
        self.write(addr, &value.to_le_bytes())
    }

    /// Read a NUL-terminated string of at most `max` bytes (terminator excluded).
    /// The bytes come back as written; no encoding is assumed.
    pub fn read_cstr(&self, addr: UserAddr, max: usize) -> Result<Vec<u8>, MemoryFault> {
        let mut bytes = Vec::new();
        let mut cursor = addr;
        loop {
            if !is_user_vaddr(cursor) {
                return Err(MemoryFault::NotUser(cursor));
            }
            let mut byte = [0u8; 1];
            self.read(cursor, &mut byte)?;
            if byte[0] == 0 {
                return Ok(bytes);
            }
            if bytes.len() == max {
                return Err(MemoryFault::Unterminated(addr));
            }
            bytes.push(byte[0]);
            cursor = cursor.checked_add(1).ok_or(MemoryFault::NotUser(cursor))?;
        }
    }

    /// Visit each page-sized piece of `[addr, addr + len)` as
    /// (frame, offset in frame, range in the caller's buffer).
    fn walk<F>(&self, addr: UserAddr, len: usize, write: bool, mut visit: F) -> Result<(), MemoryFault>
    where
        F: FnMut(super::Frame, usize, core::ops::Range<usize>),
    {
        if len == 0 {
            return Ok(());
        }
        let end = addr as u64 + len as u64;
        if !is_user_vaddr(addr) || end > super::PHYS_BASE as u64 {
            return Err(MemoryFault::NotUser(addr));
        }

        let mut done = 0usize;
        while done < len {
            let va = addr + done as UserAddr;
            let mapping = self
                .mmu
                .translate(self.space, va)
                .ok_or(MemoryFault::Unmapped(va))?;
            if write && !mapping.writable {
                return Err(MemoryFault::ReadOnly(va));
            }
            let ofs = pg_ofs(va);
            let chunk = (PAGE_SIZE - ofs).min(len - done);
            visit(mapping.frame, ofs, done..done + chunk);
            done += chunk;
        }
        Ok(())
    }
}
