//! # RSDT/XSDT enumeration (C2, part 2)
//!
//! Walks the root table's pointer array, maps and checksum-validates each
//! descendant table, and resolves the DSDT address out of the FADT.

use alloc::collections::BTreeMap;

use crate::rsdp::{AcpiError, RsdpLocation};
use crate::{PhysMapRo, sum};

const HEADER_LEN: usize = 36;
const FACP_SIGNATURE: [u8; 4] = *b"FACP";

/// Fixed 36-byte ACPI table header, read by value once a table is mapped.
#[derive(Debug, Copy, Clone)]
struct TableHeader {
    signature: [u8; 4],
    length: u32,
    revision: u8,
}

fn read_header(bytes: &[u8]) -> Option<TableHeader> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    Some(TableHeader {
        signature: [bytes[0], bytes[1], bytes[2], bytes[3]],
        length: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        revision: bytes[8],
    })
}

/// A discovered ACPI table: its physical address, declared length, and
/// revision, keyed by the map's 4-byte signature.
#[derive(Debug, Copy, Clone)]
pub struct TableEntry {
    pub address: u64,
    pub length: u32,
    pub revision: u8,
}

/// Signature -> table entry map produced by [`enumerate_tables`], plus the
/// DSDT address resolved from the FADT, if one was found.
#[derive(Debug, Clone, Default)]
pub struct TableMap {
    tables: BTreeMap<[u8; 4], TableEntry>,
    pub dsdt: Option<TableEntry>,
}

impl TableMap {
    #[must_use]
    pub fn get(&self, signature: &[u8; 4]) -> Option<TableEntry> {
        self.tables.get(signature).copied()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &[u8; 4]> {
        self.tables.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Map and checksum-validate a table's header, then its full body.
/// Returns `None` (logged) on any mapping or checksum failure.
unsafe fn map_and_validate(map: &impl PhysMapRo, addr: u64) -> Option<(TableHeader, u64)> {
    let head = unsafe { map.map_ro(addr, HEADER_LEN) };
    let hdr = read_header(head)?;
    let full = unsafe { map.map_ro(addr, hdr.length as usize) };
    if full.len() < hdr.length as usize || sum(full) != 0 {
        log::warn!(
            "table {:?} at {:#x} failed checksum validation, skipping",
            core::str::from_utf8(&hdr.signature).unwrap_or("????"),
            addr
        );
        return None;
    }
    Some((hdr, addr))
}

/// Read the DSDT physical address out of a mapped, checksum-valid FADT.
fn fadt_dsdt_address(full: &[u8], revision: u8) -> Option<u64> {
    const DSDT_OFFSET: usize = 40;
    const X_DSDT_OFFSET: usize = 140;
    if revision >= 2 && full.len() >= X_DSDT_OFFSET + 8 {
        let addr = u64::from_le_bytes(full[X_DSDT_OFFSET..X_DSDT_OFFSET + 8].try_into().unwrap());
        if addr != 0 {
            return Some(addr);
        }
    }
    if full.len() >= DSDT_OFFSET + 4 {
        let addr = u32::from_le_bytes(full[DSDT_OFFSET..DSDT_OFFSET + 4].try_into().unwrap());
        return Some(u64::from(addr));
    }
    None
}

/// `enumerate_tables(driver)`: map the root table, read its pointer array
/// (4-byte entries for RSDT, 8-byte for XSDT), and map+validate each
/// descendant. A table that fails checksum validation is logged and
/// omitted, not fatal. If a `"FACP"` table is found, its DSDT pointer is
/// resolved and mapped as well.
///
/// # Safety
/// `map` must return slices valid for the requested physical ranges.
///
/// # Errors
/// Returns [`AcpiError::RootTableChecksumInvalid`] if the root table itself
/// fails validation, or [`AcpiError::UnmappedDsdt`] if a FADT was found but
/// its DSDT pointer cannot be mapped and validated.
pub unsafe fn enumerate_tables(map: &impl PhysMapRo, root: &RsdpLocation) -> Result<TableMap, AcpiError> {
    let (root_hdr, root_addr) = unsafe { map_and_validate(map, root.root_table_addr) }
        .ok_or(AcpiError::RootTableChecksumInvalid)?;
    let root_full = unsafe { map.map_ro(root_addr, root_hdr.length as usize) };

    let pointer_width = if root.use_xsdt { 8 } else { 4 };
    let payload = &root_full[HEADER_LEN..];

    let mut out = TableMap::default();
    for chunk in payload.chunks_exact(pointer_width) {
        let addr = if root.use_xsdt {
            u64::from_le_bytes(chunk.try_into().unwrap())
        } else {
            u64::from(u32::from_le_bytes(chunk.try_into().unwrap()))
        };
        if addr == 0 {
            continue;
        }
        let Some((hdr, table_addr)) = (unsafe { map_and_validate(map, addr) }) else {
            continue;
        };
        let entry = TableEntry {
            address: table_addr,
            length: hdr.length,
            revision: hdr.revision,
        };
        out.tables.insert(hdr.signature, entry);

        if hdr.signature == FACP_SIGNATURE {
            let full = unsafe { map.map_ro(table_addr, hdr.length as usize) };
            let dsdt_addr = fadt_dsdt_address(full, hdr.revision).ok_or(AcpiError::UnmappedFadt)?;
            let (dsdt_hdr, dsdt_addr) =
                unsafe { map_and_validate(map, dsdt_addr) }.ok_or(AcpiError::UnmappedDsdt)?;
            out.dsdt = Some(TableEntry {
                address: dsdt_addr,
                length: dsdt_hdr.length,
                revision: dsdt_hdr.revision,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeMap {
        backing: Vec<u8>,
    }

    impl PhysMapRo for FakeMap {
        unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
            let start = paddr as usize;
            let slice = &self.backing[start..start + len];
            unsafe { core::slice::from_raw_parts(slice.as_ptr(), slice.len()) }
        }
    }

    fn write_header(buf: &mut [u8], addr: usize, signature: &[u8; 4], length: u32, revision: u8) {
        buf[addr..addr + 4].copy_from_slice(signature);
        buf[addr + 4..addr + 8].copy_from_slice(&length.to_le_bytes());
        buf[addr + 8] = revision;
    }

    fn fixup_checksum(buf: &mut [u8], addr: usize, length: usize) {
        buf[addr + 9] = 0;
        let s = sum(&buf[addr..addr + length]);
        buf[addr + 9] = (0u8).wrapping_sub(s);
    }

    #[test]
    fn enumerates_rsdt_and_resolves_dsdt() {
        let mut backing = vec![0u8; 4096];

        // DSDT at 0x800, 40 bytes.
        write_header(&mut backing, 0x800, b"DSDT", 40, 1);
        fixup_checksum(&mut backing, 0x800, 40);

        // FADT at 0x400, with Dsdt field (offset 40) pointing at 0x800.
        let fadt_len = 148;
        write_header(&mut backing, 0x400, b"FACP", fadt_len as u32, 1);
        backing[0x400 + 40..0x400 + 44].copy_from_slice(&0x800u32.to_le_bytes());
        fixup_checksum(&mut backing, 0x400, fadt_len);

        // RSDT at 0, header (36) + one 4-byte pointer to the FADT.
        let rsdt_len = HEADER_LEN + 4;
        write_header(&mut backing, 0, b"RSDT", rsdt_len as u32, 1);
        backing[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&0x400u32.to_le_bytes());
        fixup_checksum(&mut backing, 0, rsdt_len);

        let map = FakeMap { backing };
        let root = RsdpLocation { root_table_addr: 0, use_xsdt: false };
        let result = unsafe { enumerate_tables(&map, &root) }.unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.get(b"FACP").is_some());
        assert_eq!(result.dsdt.unwrap().address, 0x800);
    }

    #[test]
    fn enumerates_xsdt_with_8_byte_pointers() {
        let mut backing = vec![0u8; 4096];

        // DSDT at 0x800, 40 bytes.
        write_header(&mut backing, 0x800, b"DSDT", 40, 2);
        fixup_checksum(&mut backing, 0x800, 40);

        // FADT at 0x400, revision 2, with the 64-bit XDsdt field (offset 140)
        // pointing at 0x800. The legacy 32-bit Dsdt field is left zero so
        // resolution is forced through the X_DSDT_OFFSET path.
        let fadt_len = 148;
        write_header(&mut backing, 0x400, b"FACP", fadt_len as u32, 2);
        backing[0x400 + 140..0x400 + 148].copy_from_slice(&0x800u64.to_le_bytes());
        fixup_checksum(&mut backing, 0x400, fadt_len);

        // XSDT at 0, header (36) + one 8-byte pointer to the FADT.
        let xsdt_len = HEADER_LEN + 8;
        write_header(&mut backing, 0, b"XSDT", xsdt_len as u32, 2);
        backing[HEADER_LEN..HEADER_LEN + 8].copy_from_slice(&0x400u64.to_le_bytes());
        fixup_checksum(&mut backing, 0, xsdt_len);

        let map = FakeMap { backing };
        let root = RsdpLocation { root_table_addr: 0, use_xsdt: true };
        let result = unsafe { enumerate_tables(&map, &root) }.unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.get(b"FACP").is_some());
        assert_eq!(result.dsdt.unwrap().address, 0x800);
        assert_eq!(result.dsdt.unwrap().revision, 2);
    }

    #[test]
    fn bad_table_checksum_is_skipped_not_fatal() {
        let mut backing = vec![0u8; 4096];

        // A table with a deliberately wrong checksum.
        write_header(&mut backing, 0x400, b"SSDT", 40, 1);
        // no fixup_checksum call -> checksum is wrong

        let rsdt_len = HEADER_LEN + 4;
        write_header(&mut backing, 0, b"RSDT", rsdt_len as u32, 1);
        backing[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&0x400u32.to_le_bytes());
        fixup_checksum(&mut backing, 0, rsdt_len);

        let map = FakeMap { backing };
        let root = RsdpLocation { root_table_addr: 0, use_xsdt: false };
        let result = unsafe { enumerate_tables(&map, &root) }.unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn root_checksum_failure_is_fatal() {
        let mut backing = vec![0u8; 4096];
        write_header(&mut backing, 0, b"RSDT", HEADER_LEN as u32, 1);
        // checksum deliberately left wrong.

        let map = FakeMap { backing };
        let root = RsdpLocation { root_table_addr: 0, use_xsdt: false };
        assert_eq!(
            unsafe { enumerate_tables(&map, &root) },
            Err(AcpiError::RootTableChecksumInvalid)
        );
    }
}
