//! Physical memory access during boot services.

use firmware_acpi::{PhysMap, PhysicalAddress};

/// [`PhysMap`] over identity-mapped memory: physical address = pointer.
///
/// UEFI keeps all memory identity-mapped until the OS loader takes over, so
/// firmware tables can be read and written in place.
pub struct IdentityMap {
    _private: (),
}

impl IdentityMap {
    /// # Safety
    /// The caller guarantees that every address reachable from the firmware
    /// tables is identity-mapped, readable and writable, and that nothing else
    /// accesses that memory while the map is in use.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Pointer to `paddr` if the range `paddr..paddr + len` is addressable.
    fn pointer(paddr: PhysicalAddress, len: usize) -> Option<*mut u8> {
        if paddr.is_null() {
            return None;
        }
        paddr.checked_add(u64::try_from(len).ok()?)?;
        let addr = usize::try_from(paddr.as_u64()).ok()?;
        addr.checked_add(len)?;
        Some(core::ptr::with_exposed_provenance_mut(addr))
    }
}

impl PhysMap for IdentityMap {
    fn map_ro(&self, paddr: PhysicalAddress, len: usize) -> Option<&[u8]> {
        let ptr = Self::pointer(paddr, len)?;
        // SAFETY: Non-null and in range per `pointer`; identity mapping and
        // exclusivity are guaranteed by the caller of `new`.
        Some(unsafe { core::slice::from_raw_parts(ptr.cast_const(), len) })
    }

    fn map_rw(&mut self, paddr: PhysicalAddress, len: usize) -> Option<&mut [u8]> {
        let ptr = Self::pointer(paddr, len)?;
        // SAFETY: See `map_ro`; `&mut self` prevents overlapping slices.
        Some(unsafe { core::slice::from_raw_parts_mut(ptr, len) })
    }
}
