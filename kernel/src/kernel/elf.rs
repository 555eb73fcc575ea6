//! ELF32 Format
//!
//! Header and program-header parsing plus the checks that decide whether a
//! segment may be mapped. Mapping itself lives in [`crate::kernel::loader`].

use crate::kernel::config::MAX_PROGRAM_HEADERS;
use crate::kernel::loader::LoadError;
use crate::kernel::memory::{is_user_vaddr, pg_ofs, pg_round_down, UserAddr, PAGE_SIZE};

// ═══════════════════════════════════════════════════════════════════════════════
// ELF STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an ELF32 file header on disk
pub const EHDR_SIZE: usize = 52;

/// Size of an ELF32 program header on disk
pub const PHDR_SIZE: usize = 32;

/// 0x7F 'E' 'L' 'F', 32-bit class, little endian, version 1
const IDENT_PREFIX: [u8; 7] = [0x7F, b'E', b'L', b'F', 1, 1, 1];

const ET_EXEC: u16 = 2;
const EM_386: u16 = 3;
const EV_CURRENT: u32 = 1;

/// ELF Header (32-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Header {
    pub ident: [u8; 16],
    pub type_: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u32,
    pub ph_off: u32,
    pub sh_off: u32,
    pub flags: u32,
    pub eh_size: u16,
    pub ph_ent_size: u16,
    pub ph_num: u16,
    pub sh_ent_size: u16,
    pub sh_num: u16,
    pub sh_str_ndx: u16,
}

/// Program Header (32-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32ProgramHeader {
    pub type_: u32,
    pub offset: u32,
    pub vaddr: u32,
    pub paddr: u32,
    pub file_size: u32,
    pub mem_size: u32,
    pub flags: u32,
    pub align: u32,
}

// Program Header Types
pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_INTERP: u32 = 3;
pub const PT_NOTE: u32 = 4;
pub const PT_SHLIB: u32 = 5;
pub const PT_PHDR: u32 = 6;
pub const PT_STACK: u32 = 0x6474_e551;

// Program Header Flags
pub const PF_X: u32 = 1; // Execute
pub const PF_W: u32 = 2; // Write
pub const PF_R: u32 = 4; // Read

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

impl Elf32Header {
    pub fn parse(b: &[u8; EHDR_SIZE]) -> Self {
        let mut ident = [0u8; 16];
        ident.copy_from_slice(&b[..16]);
        Self {
            ident,
            type_: u16_at(b, 16),
            machine: u16_at(b, 18),
            version: u32_at(b, 20),
            entry: u32_at(b, 24),
            ph_off: u32_at(b, 28),
            sh_off: u32_at(b, 32),
            flags: u32_at(b, 36),
            eh_size: u16_at(b, 40),
            ph_ent_size: u16_at(b, 42),
            ph_num: u16_at(b, 44),
            sh_ent_size: u16_at(b, 46),
            sh_num: u16_at(b, 48),
            sh_str_ndx: u16_at(b, 50),
        }
    }

    /// Accept only 32-bit little-endian x86 executables.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.ident[..7] != IDENT_PREFIX
            || self.type_ != ET_EXEC
            || self.machine != EM_386
            || self.version != EV_CURRENT
            || self.ph_ent_size as usize != PHDR_SIZE
            || self.ph_num as usize > MAX_PROGRAM_HEADERS
        {
            return Err(LoadError::BadFormat);
        }
        Ok(())
    }
}

impl Elf32ProgramHeader {
    pub fn parse(b: &[u8; PHDR_SIZE]) -> Self {
        Self {
            type_: u32_at(b, 0),
            offset: u32_at(b, 4),
            vaddr: u32_at(b, 8),
            paddr: u32_at(b, 12),
            file_size: u32_at(b, 16),
            mem_size: u32_at(b, 20),
            flags: u32_at(b, 24),
            align: u32_at(b, 28),
        }
    }

    pub fn writable(&self) -> bool {
        self.flags & PF_W != 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEGMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// What the loader does with a program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAction {
    Skip,
    Load,
    Reject,
}

pub fn classify(type_: u32) -> SegmentAction {
    match type_ {
        PT_LOAD => SegmentAction::Load,
        PT_DYNAMIC | PT_INTERP | PT_SHLIB => SegmentAction::Reject,
        // PT_NULL, PT_NOTE, PT_PHDR, PT_STACK and anything unknown
        _ => SegmentAction::Skip,
    }
}

/// Whether a PT_LOAD header describes a segment this loader can map.
pub fn validate_segment(ph: &Elf32ProgramHeader, file_len: u64) -> bool {
    if pg_ofs(ph.offset) != pg_ofs(ph.vaddr) {
        return false;
    }
    if ph.offset as u64 > file_len {
        return false;
    }
    if ph.mem_size < ph.file_size || ph.mem_size == 0 {
        return false;
    }
    let end = match ph.vaddr.checked_add(ph.mem_size) {
        Some(end) => end,
        None => return false,
    };
    if !is_user_vaddr(ph.vaddr) || !is_user_vaddr(end) {
        return false;
    }
    // Page 0 stays unmapped so null pointers fault.
    ph.vaddr as usize >= PAGE_SIZE
}

/// Page-level layout of one validated segment.
///
/// Starting at `mem_page`, `read_bytes` come from the file at `file_page`
/// and the following `zero_bytes` are zero. Together they cover whole pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    pub file_page: u32,
    pub mem_page: UserAddr,
    pub read_bytes: usize,
    pub zero_bytes: usize,
    pub writable: bool,
}

impl SegmentPlan {
    pub fn new(ph: &Elf32ProgramHeader) -> Self {
        let page_offset = pg_ofs(ph.vaddr);
        let span = page_offset + ph.mem_size as usize;
        let total = (span + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE;
        let read_bytes = if ph.file_size > 0 {
            page_offset + ph.file_size as usize
        } else {
            0
        };
        Self {
            file_page: pg_round_down(ph.offset),
            mem_page: pg_round_down(ph.vaddr),
            read_bytes,
            zero_bytes: total - read_bytes,
            writable: ph.writable(),
        }
    }

    pub fn pages(&self) -> usize {
        (self.read_bytes + self.zero_bytes) / PAGE_SIZE
    }
}
