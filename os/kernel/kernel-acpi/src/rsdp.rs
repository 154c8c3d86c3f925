//! # RSDP/XSDP discovery (C2, part 1)
//!
//! Scans the fixed legacy BIOS area for the Root System Description Pointer,
//! validates it, and reports which root table (RSDT or XSDT) the platform
//! wants used. [`crate::tables`] takes it from there.

use crate::{PhysMapRo, limits, sum};

/// Errors from table discovery (C2). Per-table checksum mismatches below the
/// root are logged and skipped, never returned — see [`crate::tables`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcpiError {
    #[error("no RSD PTR signature found in [{:#x}, {:#x}]", limits::RSDP_SCAN_START, limits::RSDP_SCAN_END)]
    MissingRsdp,
    #[error("RSDT/XSDT root table checksum is invalid")]
    RootTableChecksumInvalid,
    #[error("no FACP (FADT) table present in the discovered table map")]
    UnmappedFadt,
    #[error("DSDT pointer from the FADT could not be mapped or validated")]
    UnmappedDsdt,
    #[error("DSDT parse failed: {0}")]
    DsdtParseFailed(#[from] crate::parser::ParseError),
}

/// ACPI 1.0 Root System Description Pointer (RSDP).
#[derive(Clone)]
#[repr(C, packed)]
struct Rsdp {
    signature: [u8; 8], // "RSD PTR "
    checksum: u8,
    oem_id: [u8; 6],
    revision: u8, // 0 for ACPI 1.0
    rsdt_addr: u32,
}

/// ACPI 2.0+ Extended System Description Pointer (XSDP).
#[derive(Clone)]
#[repr(C, packed)]
struct Xsdp {
    signature: [u8; 8],
    checksum: u8,
    oem_id: [u8; 6],
    revision: u8, // 2 for ACPI 2.0+
    _deprecated: u32,
    length: u32,
    xsdt_addr: u64,
    _ext_checksum: u8,
    _reserved: [u8; 3],
}

const RSDP_SIGNATURE: [u8; 8] = *b"RSD PTR ";

/// Which root table was found, and where.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RsdpLocation {
    pub root_table_addr: u64,
    pub use_xsdt: bool,
}

/// `locate_rsdt()`: scan `[0xE0000, 0xFFFFF]` at 16-byte alignment for the
/// RSDP signature, validate its checksum, and report the RSDT or XSDT
/// physical address depending on revision.
///
/// # Safety
/// `map` must return a slice valid for the requested length; the scanned
/// range is assumed to be identity-mappable low physical memory.
///
/// # Errors
/// Returns [`AcpiError::MissingRsdp`] if no valid signature+checksum is found.
pub unsafe fn locate_rsdt(map: &impl PhysMapRo) -> Result<RsdpLocation, AcpiError> {
    let scan_len = (limits::RSDP_SCAN_END - limits::RSDP_SCAN_START + 1) as usize;
    let window = unsafe { map.map_ro(limits::RSDP_SCAN_START, scan_len) };

    let mut offset = 0usize;
    while offset + 20 <= window.len() {
        if window[offset..offset + 8] == RSDP_SIGNATURE {
            if let Some(loc) = unsafe { try_validate(map, limits::RSDP_SCAN_START + offset as u64, &window[offset..]) } {
                return Ok(loc);
            }
            log::warn!("RSD PTR signature at {:#x} failed checksum validation", limits::RSDP_SCAN_START + offset as u64);
        }
        offset += limits::RSDP_SCAN_ALIGNMENT as usize;
    }
    Err(AcpiError::MissingRsdp)
}

unsafe fn try_validate(map: &impl PhysMapRo, addr: u64, local: &[u8]) -> Option<RsdpLocation> {
    if local.len() < 20 || sum(&local[0..20]) != 0 {
        return None;
    }
    let v1p = unsafe { &*local.as_ptr().cast::<Rsdp>() };
    let rsdt_addr = u64::from(v1p.rsdt_addr);

    if v1p.revision >= 2 {
        let min_v2 = size_of::<Xsdp>();
        let v2 = unsafe { map.map_ro(addr, min_v2) };
        if v2.len() < min_v2 {
            return None;
        }
        let v2p = unsafe { &*v2.as_ptr().cast::<Xsdp>() };
        let len = v2p.length as usize;
        let full = unsafe { map.map_ro(addr, len) };
        if full.len() < len || sum(full) != 0 {
            return None;
        }
        return Some(RsdpLocation {
            root_table_addr: v2p.xsdt_addr,
            use_xsdt: true,
        });
    }

    Some(RsdpLocation {
        root_table_addr: rsdt_addr,
        use_xsdt: false,
    })
}

/// `probe_for_acpi()`: wrap [`locate_rsdt`] and produce a driver handle
/// suitable for [`crate::tables::enumerate_tables`].
///
/// # Safety
/// Same requirements as [`locate_rsdt`].
///
/// # Errors
/// Propagates [`AcpiError::MissingRsdp`].
pub unsafe fn probe_for_acpi(map: &impl PhysMapRo) -> Result<RsdpLocation, AcpiError> {
    unsafe { locate_rsdt(map) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    struct FakeMap {
        backing: Vec<u8>,
        base: u64,
        calls: RefCell<u32>,
    }

    impl PhysMapRo for FakeMap {
        unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
            *self.calls.borrow_mut() += 1;
            let start = (paddr - self.base) as usize;
            let slice = &self.backing[start..start + len];
            unsafe { core::slice::from_raw_parts(slice.as_ptr(), slice.len()) }
        }
    }

    fn fixup_checksum(buf: &mut [u8], len: usize) {
        buf[8] = 0;
        let s = sum(&buf[0..len]);
        buf[8] = (0u8).wrapping_sub(s);
    }

    #[test]
    fn locates_acpi1_rsdp() {
        let base = limits::RSDP_SCAN_START;
        let scan_len = (limits::RSDP_SCAN_END - limits::RSDP_SCAN_START + 1) as usize;
        let mut backing = vec![0u8; scan_len];
        let off = 32;
        backing[off..off + 8].copy_from_slice(&RSDP_SIGNATURE);
        backing[off + 14] = 0; // revision 0
        backing[off + 15..off + 19].copy_from_slice(&0x00BADF00u32.to_le_bytes());
        fixup_checksum(&mut backing[off..], 20);

        let map = FakeMap { backing, base, calls: RefCell::new(0) };
        let loc = unsafe { locate_rsdt(&map) }.unwrap();
        assert_eq!(loc.root_table_addr, 0x00BADF00);
        assert!(!loc.use_xsdt);
    }

    #[test]
    fn locates_acpi2_xsdp_via_xsdt() {
        let base = limits::RSDP_SCAN_START;
        let scan_len = (limits::RSDP_SCAN_END - limits::RSDP_SCAN_START + 1) as usize;
        let mut backing = vec![0u8; scan_len];
        let off = 64;
        let len = size_of::<Xsdp>();
        backing[off..off + 8].copy_from_slice(&RSDP_SIGNATURE);
        backing[off + 14] = 2; // revision 2
        backing[off + 20..off + 24].copy_from_slice(&(len as u32).to_le_bytes());
        backing[off + 24..off + 32].copy_from_slice(&0x00C0FFEEu64.to_le_bytes());
        fixup_checksum(&mut backing[off..], 20);
        // extended checksum covers the whole structure, byte 8 already set above
        let ext_sum = sum(&backing[off..off + len]);
        backing[off + 32] = (0u8).wrapping_sub(ext_sum);

        let map = FakeMap { backing, base, calls: RefCell::new(0) };
        let loc = unsafe { locate_rsdt(&map) }.unwrap();
        assert_eq!(loc.root_table_addr, 0x00C0FFEE);
        assert!(loc.use_xsdt);
    }

    #[test]
    fn missing_signature_is_error() {
        let base = limits::RSDP_SCAN_START;
        let scan_len = (limits::RSDP_SCAN_END - limits::RSDP_SCAN_START + 1) as usize;
        let backing = vec![0u8; scan_len];
        let map = FakeMap { backing, base, calls: RefCell::new(0) };
        assert_eq!(unsafe { locate_rsdt(&map) }, Err(AcpiError::MissingRsdp));
    }
}
