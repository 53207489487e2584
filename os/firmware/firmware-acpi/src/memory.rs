use crate::PhysicalAddress;

/// Map a physical region and return its contents as a byte slice.
///
/// You provide the implementation (identity map, dumped image, ...). Returning
/// `None` means the range cannot be accessed; callers treat that like a
/// structurally invalid table and move on.
pub trait PhysMap {
    /// Maps `len` bytes starting at `paddr` for reading.
    fn map_ro(&self, paddr: PhysicalAddress, len: usize) -> Option<&[u8]>;

    /// Maps `len` bytes starting at `paddr` for reading and writing.
    fn map_rw(&mut self, paddr: PhysicalAddress, len: usize) -> Option<&mut [u8]>;
}

/// A [`PhysMap`] over a caller-owned byte image placed at `base`.
///
/// Any range that is not fully inside `[base, base + image.len())` is
/// reported as unmapped.
pub struct PhysBuffer<'a> {
    base: PhysicalAddress,
    image: &'a mut [u8],
}

impl<'a> PhysBuffer<'a> {
    #[must_use]
    pub const fn new(base: PhysicalAddress, image: &'a mut [u8]) -> Self {
        Self { base, image }
    }

    /// The whole backing image.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        self.image
    }

    fn range(&self, paddr: PhysicalAddress, len: usize) -> Option<core::ops::Range<usize>> {
        if paddr.is_null() {
            return None;
        }

        let start = usize::try_from(paddr.offset_from(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.image.len()).then_some(start..end)
    }
}

impl PhysMap for PhysBuffer<'_> {
    fn map_ro(&self, paddr: PhysicalAddress, len: usize) -> Option<&[u8]> {
        let range = self.range(paddr, len)?;
        self.image.get(range)
    }

    fn map_rw(&mut self, paddr: PhysicalAddress, len: usize) -> Option<&mut [u8]> {
        let range = self.range(paddr, len)?;
        self.image.get_mut(range)
    }
}
