//! Address-Space Ownership

use alloc::sync::Arc;
use core::fmt;

use super::mmu::{Frame, Mmu, SpaceId};
use super::user::UserMemory;
use super::{is_user_vaddr, pg_ofs, UserAddr};

/// Why a page could not be installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// No free frame
    OutOfMemory,
    /// The page is already mapped
    AlreadyMapped,
    /// Not a page-aligned user address
    BadAddress,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::OutOfMemory => write!(f, "out of frames"),
            MapError::AlreadyMapped => write!(f, "page already mapped"),
            MapError::BadAddress => write!(f, "not a page-aligned user address"),
        }
    }
}

/// Exclusive owner of one user address space.
///
/// Dropping it destroys the space and every frame mapped into it. It must
/// not be the active space at that point; [`crate::kernel::process::Process::release_address_space`]
/// switches away first.
pub struct AddressSpace {
    id: SpaceId,
    mmu: Arc<dyn Mmu>,
}

impl AddressSpace {
    pub fn new(mmu: Arc<dyn Mmu>) -> Option<Self> {
        let id = mmu.create_address_space()?;
        Some(Self { id, mmu })
    }

    pub fn id(&self) -> SpaceId {
        self.id
    }

    /// Byte access to this space's user pages
    pub fn memory(&self) -> UserMemory<'_> {
        UserMemory::new(&*self.mmu, self.id)
    }

    /// Map a fresh zeroed frame at `upage`.
    pub fn install_page(&self, upage: UserAddr, writable: bool) -> Result<Frame, MapError> {
        if pg_ofs(upage) != 0 || !is_user_vaddr(upage) {
            return Err(MapError::BadAddress);
        }
        if self.mmu.translate(self.id, upage).is_some() {
            return Err(MapError::AlreadyMapped);
        }
        let frame = self.mmu.alloc_frame().ok_or(MapError::OutOfMemory)?;
        if !self.mmu.map_page(self.id, upage, frame, writable) {
            self.mmu.free_frame(frame);
            return Err(MapError::AlreadyMapped);
        }
        Ok(frame)
    }

    /// Fill part of a frame that belongs to this space
    pub fn fill_frame(&self, frame: Frame, offset: usize, bytes: &[u8]) {
        self.mmu.write_frame(frame, offset, bytes);
    }

    pub fn activate(&self) {
        self.mmu.activate(Some(self.id));
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        self.mmu.destroy_address_space(self.id);
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddressSpace").field(&self.id).finish()
    }
}
