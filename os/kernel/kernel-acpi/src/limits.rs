//! Compile-time tunables for ACPI table discovery and AML parsing.

/// Physical address range scanned for the RSDP signature (inclusive).
pub const RSDP_SCAN_START: u64 = 0xE_0000;
pub const RSDP_SCAN_END: u64 = 0xF_FFFF;

/// Alignment, in bytes, at which the RSDP signature may appear within the scan range.
pub const RSDP_SCAN_ALIGNMENT: u64 = 16;

/// Upper bound on alternating scope-merge / named-object-relocation passes
/// (`spec.md` §4.5 Pass 2) before an unresolved reference is treated as fatal.
pub const MAX_RESOLVE_PASSES: u32 = 5;

/// Maximum number of local variable slots (`Local0`..`Local7`) per execution context.
pub const NUM_LOCALS: usize = 8;

/// Maximum number of argument slots (`Arg0`..`Arg6`) per execution context.
pub const NUM_ARGS: usize = 7;

/// Integer width, in bits, used when the originating DSDT has revision < 2.
pub const INTEGER_WIDTH_32: u32 = 32;

/// Integer width, in bits, used when the originating DSDT has revision >= 2.
pub const INTEGER_WIDTH_64: u32 = 64;
