use firmware_acpi::checksum::{checksum, verify};
use firmware_acpi::fadt::BOOT_ARCH_FLAGS_OFFSET;
use firmware_acpi::rsdp::{ACPI_GUID, ACPI2_GUID, ConfigEntry};
use firmware_acpi::{AspmError, AspmStatus, PhysBuffer, PhysicalAddress, aspm::enable_aspm};
use uefi::{Guid, guid};

const BASE: u64 = 0x7F00_0000;
const RSDP_AT: u64 = BASE;
const XSDT_AT: u64 = BASE + 0x100;
const TABLES_AT: u64 = BASE + 0x1000;
const TABLE_STRIDE: u64 = 0x200;

const SMBIOS_GUID: Guid = guid!("eb9d2d31-2d88-11d3-9a16-0090273fc14d");

/// A firmware memory image with an RSDP, an XSDT and a list of tables.
struct Firmware {
    image: Vec<u8>,
}

impl Firmware {
    fn new(rsdp_revision: u8, tables: &[Vec<u8>]) -> Self {
        let mut image = vec![0u8; 0x1000 + tables.len() * 0x200];

        let entries: Vec<u64> = (0..tables.len() as u64)
            .map(|i| TABLES_AT + i * TABLE_STRIDE)
            .collect();
        Self::place(&mut image, RSDP_AT, &rsdp(rsdp_revision, XSDT_AT));
        Self::place(&mut image, XSDT_AT, &xsdt(&entries));
        for (table, at) in tables.iter().zip(entries) {
            Self::place(&mut image, at, table);
        }

        Self { image }
    }

    fn place(image: &mut [u8], at: u64, bytes: &[u8]) {
        let start = usize::try_from(at - BASE).unwrap();
        image[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn table(&self, index: usize) -> &[u8] {
        let start = 0x1000 + index * 0x200;
        let len = u32::from_le_bytes(self.image[start + 4..start + 8].try_into().unwrap());
        &self.image[start..start + len as usize]
    }

    fn map(&mut self) -> PhysBuffer<'_> {
        PhysBuffer::new(PhysicalAddress::new(BASE), &mut self.image)
    }
}

fn sdt(signature: &[u8; 4], revision: u8, body: &[u8]) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(signature);
    t.extend_from_slice(&u32::try_from(36 + body.len()).unwrap().to_le_bytes());
    t.push(revision);
    t.push(0);
    t.extend_from_slice(b"ALASKA");
    t.extend_from_slice(b"A M I   ");
    t.extend_from_slice(&0x0107_2009u32.to_le_bytes());
    t.extend_from_slice(b"AMI ");
    t.extend_from_slice(&0x0001_0013u32.to_le_bytes());
    t.extend_from_slice(body);
    t[9] = 0u8.wrapping_sub(checksum(&t));
    t
}

fn rsdp(revision: u8, xsdt: u64) -> Vec<u8> {
    let mut r = Vec::new();
    r.extend_from_slice(b"RSD PTR ");
    r.push(0);
    r.extend_from_slice(b"ALASKA");
    r.push(revision);
    r.extend_from_slice(&0u32.to_le_bytes());
    r.extend_from_slice(&36u32.to_le_bytes());
    r.extend_from_slice(&xsdt.to_le_bytes());
    r.extend_from_slice(&[0; 4]);
    r[8] = 0u8.wrapping_sub(checksum(&r[..20]));
    r[32] = 0u8.wrapping_sub(checksum(&r));
    r
}

fn xsdt(entries: &[u64]) -> Vec<u8> {
    let body: Vec<u8> = entries.iter().flat_map(|e| e.to_le_bytes()).collect();
    sdt(b"XSDT", 1, &body)
}

fn fadt(boot_arch: u16) -> Vec<u8> {
    let mut body = vec![0x5Au8; 276 - 36];
    let at = BOOT_ARCH_FLAGS_OFFSET - 36;
    body[at..at + 2].copy_from_slice(&boot_arch.to_le_bytes());
    sdt(b"FACP", 6, &body)
}

fn boot_arch(table: &[u8]) -> u16 {
    u16::from_le_bytes([table[BOOT_ARCH_FLAGS_OFFSET], table[BOOT_ARCH_FLAGS_OFFSET + 1]])
}

fn acpi2_entry() -> ConfigEntry {
    ConfigEntry::new(ACPI2_GUID, PhysicalAddress::new(RSDP_AT))
}

#[test]
fn scenario_a_patches_the_fadt() {
    let mut fw = Firmware::new(2, &[fadt(0x0013)]);

    let report = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(report.status(), AspmStatus::Success);
    assert!(report.rsdp_found && report.fadt_found && report.patch_successful());

    let table = fw.table(0);
    assert_eq!(boot_arch(table), 0x0003);
    assert!(verify(table));
}

#[test]
fn scenario_b_corrupt_fadt_is_left_alone() {
    let mut table = fadt(0x0010);
    table[150] = table[150].wrapping_add(1);
    let mut fw = Firmware::new(2, &[table.clone()]);

    let report = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(report.status(), AspmStatus::Unsupported);
    assert_eq!(report.result(), Err(AspmError::PrecheckChecksumMismatch));
    assert!(report.fadt_found);
    assert_eq!(fw.table(0), table.as_slice());
}

#[test]
fn scenario_c_no_acpi_guid() {
    let mut fw = Firmware::new(2, &[fadt(0x0010)]);
    let entries = [ConfigEntry::new(SMBIOS_GUID, PhysicalAddress::new(RSDP_AT))];

    let report = enable_aspm(&mut fw.map(), entries);
    assert_eq!(report.status(), AspmStatus::Unsupported);
    assert_eq!(report.result(), Err(AspmError::RootPointerNotFound));
    assert_eq!(boot_arch(fw.table(0)), 0x0010);
}

#[test]
fn scenario_d_no_fadt_in_xsdt() {
    let mut fw = Firmware::new(2, &[sdt(b"APIC", 5, &[0; 64]), sdt(b"HPET", 1, &[0; 20])]);

    let report = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(report.status(), AspmStatus::Unsupported);
    assert_eq!(report.result(), Err(AspmError::TargetTableNotFound));
    assert!(report.rsdp_found);
    assert!(!report.fadt_found);
}

#[test]
fn scenario_e_legacy_rsdp_is_unsupported() {
    let mut fw = Firmware::new(1, &[fadt(0x0010)]);
    let entries = [ConfigEntry::new(ACPI_GUID, PhysicalAddress::new(RSDP_AT))];

    let report = enable_aspm(&mut fw.map(), entries);
    assert_eq!(report.status(), AspmStatus::Unsupported);
    assert_eq!(report.result(), Err(AspmError::RootPointerNotFound));
    assert_eq!(boot_arch(fw.table(0)), 0x0010);
}

#[test]
fn invalid_xsdt_is_reported() {
    let mut fw = Firmware::new(2, &[fadt(0x0010)]);
    let xsdt_offset = usize::try_from(XSDT_AT - BASE).unwrap();
    fw.image[xsdt_offset..xsdt_offset + 4].copy_from_slice(b"RSDT");

    let report = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(report.result(), Err(AspmError::InvalidExtendedTable));
    assert_eq!(report.status(), AspmStatus::Unsupported);
}

#[test]
fn later_invalid_xsdt_does_not_mask_corrupt_fadt() {
    let mut table = fadt(0x0010);
    table[150] = table[150].wrapping_add(1);
    let mut fw = Firmware::new(2, &[table]);
    let dangling = RSDP_AT + 0x80;
    Firmware::place(&mut fw.image, dangling, &rsdp(2, 0xDEAD_0000));

    let entries = [
        acpi2_entry(),
        ConfigEntry::new(ACPI_GUID, PhysicalAddress::new(dangling)),
    ];
    let report = enable_aspm(&mut fw.map(), entries);
    assert!(report.fadt_found);
    assert_eq!(report.result(), Err(AspmError::PrecheckChecksumMismatch));
    assert_eq!(report.status(), AspmStatus::Unsupported);
}

#[test]
fn fadt_after_other_tables_is_found() {
    let mut fw = Firmware::new(
        2,
        &[sdt(b"APIC", 5, &[1; 32]), sdt(b"MCFG", 1, &[2; 16]), fadt(0x0017)],
    );

    let report = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(report.status(), AspmStatus::Success);
    assert_eq!(boot_arch(fw.table(2)), 0x0007);
    assert!(verify(fw.table(0)) && verify(fw.table(1)) && verify(fw.table(2)));
}

#[test]
fn only_the_first_fadt_is_considered() {
    let mut corrupt = fadt(0x0010);
    corrupt[200] ^= 0xFF;
    let mut fw = Firmware::new(2, &[corrupt, fadt(0x0010)]);

    let report = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(report.result(), Err(AspmError::PrecheckChecksumMismatch));
    assert_eq!(boot_arch(fw.table(1)), 0x0010);
}

#[test]
fn scanning_stops_after_success() {
    let mut fw = Firmware::new(2, &[fadt(0x0010)]);
    let entries = [
        ConfigEntry::new(SMBIOS_GUID, PhysicalAddress::new(0x10)),
        ConfigEntry::new(ACPI_GUID, PhysicalAddress::new(RSDP_AT)),
        ConfigEntry::new(ACPI2_GUID, PhysicalAddress::new(RSDP_AT)),
    ];

    let report = enable_aspm(&mut fw.map(), entries);
    let patch = report.result().unwrap();
    assert!(patch.changed());
    assert!(!patch.flags_after.no_aspm());
}

#[test]
fn entry_without_rsdp_signature_is_skipped() {
    let mut fw = Firmware::new(2, &[fadt(0x0010)]);
    let entries = [
        ConfigEntry::new(ACPI_GUID, PhysicalAddress::new(XSDT_AT)),
        acpi2_entry(),
    ];

    let report = enable_aspm(&mut fw.map(), entries);
    assert_eq!(report.status(), AspmStatus::Success);
}

#[test]
fn second_run_is_a_no_op() {
    let mut fw = Firmware::new(2, &[fadt(0x0030)]);
    assert_eq!(enable_aspm(&mut fw.map(), [acpi2_entry()]).status(), AspmStatus::Success);
    let once = fw.image.clone();

    let again = enable_aspm(&mut fw.map(), [acpi2_entry()]);
    assert_eq!(again.status(), AspmStatus::Success);
    assert!(!again.result().unwrap().changed());
    assert_eq!(fw.image, once);
    assert_eq!(boot_arch(fw.table(0)), 0x0020);
}
