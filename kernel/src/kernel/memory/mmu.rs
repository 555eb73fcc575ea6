//! Paging Collaborator
//!
//! Page directories, frame allocation, and the hardware switch between
//! address spaces are provided by the platform through [`Mmu`].

use super::UserAddr;

/// Handle to a page directory owned by the MMU
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpaceId(pub u32);

/// A physical page frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame(pub u32);

/// Where a user page is backed, and whether user code may write it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub frame: Frame,
    pub writable: bool,
}

pub trait Mmu: Send + Sync {
    /// Create an empty user address space (kernel mappings only)
    fn create_address_space(&self) -> Option<SpaceId>;

    /// Tear down a space, freeing every frame mapped into it.
    ///
    /// The space must not be the active one.
    fn destroy_address_space(&self, space: SpaceId);

    /// Allocate one zero-filled frame
    fn alloc_frame(&self) -> Option<Frame>;

    fn free_frame(&self, frame: Frame);

    /// Map the page at `upage` to `frame`. Returns false, leaving the frame
    /// untouched, if `upage` is already mapped.
    fn map_page(&self, space: SpaceId, upage: UserAddr, frame: Frame, writable: bool) -> bool;

    /// Look up the page containing `uaddr`
    fn translate(&self, space: SpaceId, uaddr: UserAddr) -> Option<Mapping>;

    /// Load `space` into the hardware, or the kernel-only mapping for `None`
    fn activate(&self, space: Option<SpaceId>);

    /// Copy `bytes` into `frame` starting at byte `offset`
    fn write_frame(&self, frame: Frame, offset: usize, bytes: &[u8]);

    /// Copy out of `frame` starting at byte `offset`
    fn read_frame(&self, frame: Frame, offset: usize, buf: &mut [u8]);
}
