//! # ACPI / AML subsystem
//!
//! Discovers ACPI tables from firmware, parses the DSDT/SSDTs' AML byte
//! code into a namespace tree, and runs a tree-walking virtual machine over
//! it so control methods (`_STA`, `_INI`, `_PRT`, ...) can actually be
//! invoked. [`AcpiSubsystem::init`] is the single entry point that sequences
//! all of it.
//!
//! ## Architecture
//!
//! ```text
//! UEFI/BIOS Firmware
//!     ↓
//! RSDP/XSDP (Root System Description Pointer)           -- rsdp
//!     ↓
//! RSDT/XSDT (Root/Extended System Description Table)    -- tables
//!     ↓
//! FADT → DSDT, plus every SSDT                          -- tables, parser
//!     ↓
//! Object/namespace tree                                 -- object
//!     ↓
//! Virtual machine (Lookup / Visit / call_method)         -- vm
//! ```
//!
//! ## Key components
//!
//! * [`PhysMapRo`] — the physical-memory mapping collaborator every stage
//!   above reads firmware bytes through; the caller supplies identity
//!   mapping, HHDM, or whatever else the kernel's memory manager provides.
//! * [`rsdp`] — locates and validates the RSDP/XSDP (ACPI 1.0 vs 2.0+,
//!   checksum verification).
//! * [`tables`] — walks the RSDT/XSDT to build a signature → table map,
//!   resolving the FADT's DSDT pointer.
//! * [`parser`] — the multi-pass AML parser that turns a table's byte
//!   stream into the [`object`] tree.
//! * [`vm`] — the virtual machine that evaluates `TermArg`s and executes
//!   method bodies against that tree, through the [`region`] collaborator
//!   for field unit I/O.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_acpi::{AcpiSubsystem, PhysMapRo, region::NullRegionBackend};
//!
//! struct MyMapper;
//! impl PhysMapRo for MyMapper {
//!     unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
//!         // Implementation-specific mapping
//!         # unimplemented!()
//!     }
//! }
//!
//! let mapper = MyMapper;
//! let backend = NullRegionBackend;
//! let subsystem = unsafe { AcpiSubsystem::init(&mapper, &backend) }.expect("ACPI init failed");
//! let sta = subsystem.vm.lookup("\\_SB.PCI0._STA");
//! ```
//!
//! ## Safety considerations
//!
//! ACPI parsing involves extensive unsafe operations because firmware data
//! is untrusted: addresses and lengths come from the platform, structures
//! are `#[repr(C, packed)]` overlays onto raw bytes, and every header is
//! validated (signature, checksum, declared length) before its payload is
//! touched.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod limits;
pub mod object;
pub mod opcode;
pub mod parser;
pub mod path;
pub mod reader;
pub mod region;
pub mod rsdp;
pub mod tables;
pub mod value;
pub mod vm;

use object::ObjectPool;
use rsdp::AcpiError;
use vm::Vm;

/// Map a physical region and return a *read-only* byte slice for its contents.
/// You provide the implementation (identity map, kmap, etc.).
pub trait PhysMapRo {
    /// # Safety
    /// The implementor must ensure the returned slice is valid for `len` bytes.
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8];
}

fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}

/// C9 driver facade: the one call a kernel driver-registry init path needs
/// to get from "RSDP physical address unknown yet" to a [`Vm`] ready for
/// [`Vm::lookup`]/[`Vm::visit`]. Owns no policy beyond sequencing
/// discovery (C2), parsing (C5), and VM construction (C6).
pub struct AcpiSubsystem<'a> {
    pub tables: tables::TableMap,
    pub vm: Vm<'a>,
}

impl<'a> AcpiSubsystem<'a> {
    /// Discover tables, parse the DSDT and every SSDT into a single object
    /// tree, and construct a VM ready to evaluate control methods.
    ///
    /// # Safety
    /// `map` must return slices valid for the physical ranges ACPI tables
    /// report; the caller is trusted to supply a sound [`PhysMapRo`].
    ///
    /// # Errors
    /// Returns [`AcpiError`] if no RSDP can be located, the root table is
    /// invalid, (when a FADT is present) its DSDT cannot be resolved, or the
    /// DSDT fails to parse ([`AcpiError::DsdtParseFailed`]) — the DSDT is
    /// mandatory. A single malformed SSDT is logged and skipped instead,
    /// since it does not prevent the rest of the namespace from working.
    pub unsafe fn init(
        map: &impl PhysMapRo,
        region_backend: &'a dyn region::RegionBackend,
    ) -> Result<Self, AcpiError> {
        let root = unsafe { rsdp::probe_for_acpi(map) }?;
        let table_map = unsafe { tables::enumerate_tables(map, &root) }?;

        let mut pool = ObjectPool::new();
        pool.create_default_scopes(0);

        let mut next_handle: u8 = 0;
        let mut integer_width = limits::INTEGER_WIDTH_32;

        if let Some(dsdt) = table_map.dsdt {
            let bytes = unsafe { map.map_ro(dsdt.address, dsdt.length as usize) };
            let aml = &bytes[36..]; // skip the table header; parser sees only the AML payload
            integer_width = if dsdt.revision < 2 {
                limits::INTEGER_WIDTH_32
            } else {
                limits::INTEGER_WIDTH_64
            };
            parser::parse_table(&mut pool, aml, next_handle)?;
            next_handle += 1;
        }

        for sig in table_map.signatures().copied().collect::<alloc::vec::Vec<_>>() {
            if sig == *b"SSDT" {
                let entry = table_map.get(&sig).expect("signature came from this map");
                let bytes = unsafe { map.map_ro(entry.address, entry.length as usize) };
                let aml = &bytes[36..];
                if let Err(e) = parser::parse_table(&mut pool, aml, next_handle) {
                    log::warn!("SSDT parse failed, skipping: {e}");
                }
                next_handle += 1;
            }
        }

        let vm = Vm::new(pool, integer_width, region_backend);
        Ok(Self { tables: table_map, vm })
    }
}
