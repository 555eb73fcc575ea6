//! User Memory Geometry
//!
//! 32-bit user address spaces: user pages live below [`PHYS_BASE`], the
//! kernel above it. Page tables themselves belong to the [`Mmu`]
//! collaborator; this module only owns the arithmetic and the RAII handles.

pub mod mmu;
pub mod space;
pub mod user;

pub use mmu::{Frame, Mapping, Mmu, SpaceId};
pub use space::{AddressSpace, MapError};
pub use user::{MemoryFault, UserMemory};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A user virtual address
pub type UserAddr = u32;

/// Page size
pub const PAGE_SIZE: usize = 4096;

/// First kernel virtual address. Every user address is strictly below it.
pub const PHYS_BASE: UserAddr = 0xC000_0000;

const PAGE_MASK: UserAddr = (PAGE_SIZE as UserAddr) - 1;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

#[inline]
pub const fn is_user_vaddr(addr: UserAddr) -> bool {
    addr < PHYS_BASE
}

/// Offset of `addr` within its page
#[inline]
pub const fn pg_ofs(addr: UserAddr) -> usize {
    (addr & PAGE_MASK) as usize
}

#[inline]
pub const fn pg_round_down(addr: UserAddr) -> UserAddr {
    addr & !PAGE_MASK
}

/// Round up to a page boundary. `None` if that would wrap past 4 GiB.
#[inline]
pub fn pg_round_up(addr: UserAddr) -> Option<UserAddr> {
    addr.checked_add(PAGE_MASK).map(pg_round_down)
}
