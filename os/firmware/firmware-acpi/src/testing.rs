//! Synthetic table images for unit tests.

use crate::checksum::{checksum, corrective};

/// Builds a table with a valid header and checksum around `body`.
pub fn sdt(signature: [u8; 4], revision: u8, body: &[u8]) -> Vec<u8> {
    let length = u32::try_from(36 + body.len()).unwrap();

    let mut t = Vec::with_capacity(36 + body.len());
    t.extend_from_slice(&signature);
    t.extend_from_slice(&length.to_le_bytes());
    t.push(revision);
    t.push(0);
    t.extend_from_slice(b"TESTOE");
    t.extend_from_slice(b"TESTTABL");
    t.extend_from_slice(&1u32.to_le_bytes());
    t.extend_from_slice(b"RUST");
    t.extend_from_slice(&0x2025_0101u32.to_le_bytes());
    t.extend_from_slice(body);

    t[9] = corrective(0, checksum(&t));
    t
}

/// Builds a 36-byte RSDP with valid checksums.
pub fn rsdp(revision: u8, rsdt: u32, xsdt: u64) -> Vec<u8> {
    let mut r = Vec::with_capacity(36);
    r.extend_from_slice(b"RSD PTR ");
    r.push(0);
    r.extend_from_slice(b"TESTOE");
    r.push(revision);
    r.extend_from_slice(&rsdt.to_le_bytes());
    r.extend_from_slice(&36u32.to_le_bytes());
    r.extend_from_slice(&xsdt.to_le_bytes());
    r.extend_from_slice(&[0; 4]);

    r[8] = corrective(0, checksum(&r[..20]));
    r[32] = corrective(0, checksum(&r));
    r
}

/// Builds an XSDT pointing at `entries`.
pub fn xsdt(entries: &[u64]) -> Vec<u8> {
    let body: Vec<u8> = entries.iter().flat_map(|e| e.to_le_bytes()).collect();
    sdt(*b"XSDT", 1, &body)
}

/// Builds a 276-byte revision 6 FADT with the given boot architecture flags.
pub fn fadt(boot_arch: u16) -> Vec<u8> {
    let mut body = vec![0u8; 276 - 36];
    let at = crate::fadt::BOOT_ARCH_FLAGS_OFFSET - 36;
    body[at..at + 2].copy_from_slice(&boot_arch.to_le_bytes());
    // Some non-zero content around the field.
    body[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    body[at + 3] = 0xA5;
    sdt(*b"FACP", 6, &body)
}
