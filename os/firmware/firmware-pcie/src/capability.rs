//! Configuration-space view and capability list walk.

use crate::PcieError;
use core::iter::FusedIterator;

const HEADER_SIZE: usize = 0x40;
const STATUS_OFFSET: usize = 0x06;
const STATUS_CAPABILITY_LIST: u16 = 1 << 4;
const CAPABILITIES_POINTER_OFFSET: usize = 0x34;

/// Upper bound on list entries; 192 bytes of capability space at four bytes minimum each.
const MAX_CAPABILITIES: usize = 48;

/// A borrowed image of a device's configuration space.
#[derive(Debug, Copy, Clone)]
pub struct ConfigSpace<'a> {
    bytes: &'a [u8],
}

impl<'a> ConfigSpace<'a> {
    /// Wraps `bytes`, which must hold at least the 64-byte standard header.
    ///
    /// # Errors
    /// Returns [`PcieError::Truncated`] for shorter images.
    pub const fn new(bytes: &'a [u8]) -> Result<Self, PcieError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PcieError::Truncated {
                len: bytes.len(),
                needed: HEADER_SIZE,
            });
        }
        Ok(Self { bytes })
    }

    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.read_u16(0x00).unwrap_or_default()
    }

    #[must_use]
    pub fn device_id(&self) -> u16 {
        self.read_u16(0x02).unwrap_or_default()
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.read_u16(STATUS_OFFSET).unwrap_or_default()
    }

    #[must_use]
    pub fn has_capability_list(&self) -> bool {
        self.status() & STATUS_CAPABILITY_LIST != 0
    }

    /// Reads one byte.
    ///
    /// # Errors
    /// Returns [`PcieError::Truncated`] if `offset` lies past the image.
    pub fn read_u8(&self, offset: usize) -> Result<u8, PcieError> {
        self.read::<1>(offset).map(|[b]| b)
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    /// Returns [`PcieError::Truncated`] if the value lies past the image.
    pub fn read_u16(&self, offset: usize) -> Result<u16, PcieError> {
        self.read(offset).map(u16::from_le_bytes)
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    /// Returns [`PcieError::Truncated`] if the value lies past the image.
    pub fn read_u32(&self, offset: usize) -> Result<u32, PcieError> {
        self.read(offset).map(u32::from_le_bytes)
    }

    fn read<const N: usize>(&self, offset: usize) -> Result<[u8; N], PcieError> {
        let end = offset.saturating_add(N);
        self.bytes
            .get(offset..end)
            .and_then(|b| b.try_into().ok())
            .ok_or(PcieError::Truncated {
                len: self.bytes.len(),
                needed: end,
            })
    }

    /// Walks the capability list.
    ///
    /// # Errors
    /// Returns [`PcieError::NoCapabilityList`] if the status register says
    /// there is none.
    pub fn capabilities(&self) -> Result<Capabilities<'a>, PcieError> {
        if !self.has_capability_list() {
            return Err(PcieError::NoCapabilityList);
        }
        Ok(Capabilities {
            space: *self,
            next: self.read_u8(CAPABILITIES_POINTER_OFFSET)?,
            visited: 0,
            done: false,
        })
    }

    /// Returns the first capability with the given ID.
    ///
    /// # Errors
    /// Fails if there is no capability list, the list is malformed, or no
    /// entry matches. A missing entry is reported as
    /// [`PcieError::PcieCapabilityNotFound`].
    pub fn find_capability(&self, id: u8) -> Result<Capability, PcieError> {
        for cap in self.capabilities()? {
            let cap = cap?;
            if cap.id == id {
                return Ok(cap);
            }
        }
        Err(PcieError::PcieCapabilityNotFound)
    }
}

/// One entry of the capability list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capability {
    pub id: u8,
    /// Configuration-space offset of the entry.
    pub offset: u8,
}

/// Iterator over the capability list; see [`ConfigSpace::capabilities`].
#[derive(Debug, Clone)]
pub struct Capabilities<'a> {
    space: ConfigSpace<'a>,
    next: u8,
    visited: usize,
    done: bool,
}

impl Iterator for Capabilities<'_> {
    type Item = Result<Capability, PcieError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // The low two bits are reserved; offsets inside the header end the list.
        let offset = self.next & !0x3;
        if usize::from(offset) < HEADER_SIZE {
            self.done = true;
            return None;
        }

        if self.visited == MAX_CAPABILITIES {
            self.done = true;
            return Some(Err(PcieError::CapabilityLoop));
        }
        self.visited += 1;

        let [id, next] = match self.space.read::<2>(usize::from(offset)) {
            Ok(header) => header,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        self.next = next;
        Some(Ok(Capability { id, offset }))
    }
}

impl FusedIterator for Capabilities<'_> {}
