//! Executable Loader
//!
//! Builds a fresh address space from an ELF32 file: every PT_LOAD segment
//! is mapped eagerly and one zeroed stack page is placed just below
//! PHYS_BASE. Partial work is released by ownership when any step fails.

use alloc::sync::Arc;
use alloc::vec;
use core::fmt;

use crate::fs::{ExecutableFile, FileSystem};
use crate::kernel::elf::{
    classify, validate_segment, Elf32Header, Elf32ProgramHeader, SegmentAction, SegmentPlan,
    EHDR_SIZE, PHDR_SIZE,
};
use crate::kernel::memory::{AddressSpace, MapError, Mmu, UserAddr, PAGE_SIZE, PHYS_BASE};
use crate::{kdebug, kprintln};

/// Why an executable could not be loaded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// No address space or frame available
    OutOfMemory,
    /// The file could not be opened
    NotFound,
    /// Not an ELF32 i386 executable
    BadFormat,
    /// Dynamic linking is not supported
    UnsupportedSegment,
    /// A PT_LOAD header failed validation
    InvalidSegment,
    /// Two segments claim the same page
    AlreadyMapped,
    /// The file ended before a segment's bytes did
    ReadFailed,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LoadError::OutOfMemory => "out of memory",
            LoadError::NotFound => "open failed",
            LoadError::BadFormat => "bad executable header",
            LoadError::UnsupportedSegment => "unsupported segment type",
            LoadError::InvalidSegment => "invalid segment",
            LoadError::AlreadyMapped => "overlapping segments",
            LoadError::ReadFailed => "short read",
        };
        f.write_str(msg)
    }
}

impl From<MapError> for LoadError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::OutOfMemory => LoadError::OutOfMemory,
            MapError::AlreadyMapped => LoadError::AlreadyMapped,
            MapError::BadAddress => LoadError::InvalidSegment,
        }
    }
}

/// A mapped executable, ready for argument marshalling
#[derive(Debug)]
pub struct LoadedImage {
    pub entry: UserAddr,
    /// Initial stack pointer before any arguments are pushed
    pub stack_top: UserAddr,
    pub space: AddressSpace,
    pub file: ExecutableFile,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADER
// ═══════════════════════════════════════════════════════════════════════════════

/// Load the executable at `path` into a new address space.
///
/// Callers serialize file-system access; the loader takes no locks.
pub fn load(mmu: &Arc<dyn Mmu>, fs: &dyn FileSystem, path: &str) -> Result<LoadedImage, LoadError> {
    let result = load_image(mmu, fs, path);
    match &result {
        Ok(image) => kdebug!("[LOAD] {} entry={:#010x}", path, image.entry),
        Err(LoadError::NotFound) => kprintln!("load: {}: open failed", path),
        Err(err) => {
            kdebug!("[LOAD] {}: {}", path, err);
            kprintln!("load: {}: error loading executable", path);
        }
    }
    result
}

fn load_image(mmu: &Arc<dyn Mmu>, fs: &dyn FileSystem, path: &str) -> Result<LoadedImage, LoadError> {
    let space = AddressSpace::new(mmu.clone()).ok_or(LoadError::OutOfMemory)?;
    let file = ExecutableFile::open(fs, path).map_err(|_| LoadError::NotFound)?;

    let mut raw = [0u8; EHDR_SIZE];
    if !file.read_exact_at(0, &mut raw) {
        return Err(LoadError::BadFormat);
    }
    let header = Elf32Header::parse(&raw);
    header.validate()?;

    let file_len = file.length();
    let mut ph_ofs = header.ph_off as u64;
    for _ in 0..header.ph_num {
        if ph_ofs > file_len {
            return Err(LoadError::BadFormat);
        }
        let mut raw = [0u8; PHDR_SIZE];
        if !file.read_exact_at(ph_ofs, &mut raw) {
            return Err(LoadError::BadFormat);
        }
        ph_ofs += PHDR_SIZE as u64;

        let ph = Elf32ProgramHeader::parse(&raw);
        match classify(ph.type_) {
            SegmentAction::Skip => {}
            SegmentAction::Reject => return Err(LoadError::UnsupportedSegment),
            SegmentAction::Load => {
                if !validate_segment(&ph, file_len) {
                    return Err(LoadError::InvalidSegment);
                }
                load_segment(&space, &file, &SegmentPlan::new(&ph))?;
            }
        }
    }

    space.install_page(PHYS_BASE - PAGE_SIZE as UserAddr, true)?;

    Ok(LoadedImage {
        entry: header.entry,
        stack_top: PHYS_BASE,
        space,
        file,
    })
}

/// Map one segment page by page: file bytes first, zeros after.
fn load_segment(space: &AddressSpace, file: &ExecutableFile, plan: &SegmentPlan) -> Result<(), LoadError> {
    kdebug!(
        "[LOAD] segment {:#010x} read={:#x} zero={:#x} {}",
        plan.mem_page,
        plan.read_bytes,
        plan.zero_bytes,
        if plan.writable { "RW" } else { "R-" }
    );

    let mut buf = vec![0u8; PAGE_SIZE];
    let mut remaining = plan.read_bytes;
    let mut file_ofs = plan.file_page as u64;

    for page in 0..plan.pages() {
        let upage = plan.mem_page + (page * PAGE_SIZE) as UserAddr;
        let frame = space.install_page(upage, plan.writable)?;

        let page_read = remaining.min(PAGE_SIZE);
        if page_read > 0 {
            if !file.read_exact_at(file_ofs, &mut buf[..page_read]) {
                return Err(LoadError::ReadFailed);
            }
            space.fill_frame(frame, 0, &buf[..page_read]);
            remaining -= page_read;
            file_ofs += page_read as u64;
        }
    }
    Ok(())
}
