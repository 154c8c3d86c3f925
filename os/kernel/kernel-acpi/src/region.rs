//! # Region-access collaborator (ambient, §4.9)
//!
//! The VM's field-unit store/load handlers never touch hardware directly;
//! they call through a [`RegionBackend`] keyed by the operation region's
//! address-space id. No backend is implemented in this crate — the kernel
//! wires one up and hands it to [`crate::AcpiSubsystem::init`].

/// Operation-region address-space identifiers (`spec.md` §3).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressSpace {
    SystemMemory,
    SystemIo,
    PciConfig,
    EmbeddedController,
    SmBus,
    CmosRtc,
    PciBarTarget,
    Ipmi,
    GeneralPurposeIo,
    GenericSerialBus,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("no backend wired up for address space {0:?}")]
    Unimplemented(AddressSpace),
    #[error("address space {0:?} access at offset {1:#x} width {2} is out of range")]
    OutOfRange(AddressSpace, u64, u8),
}

/// One read/write pair per access width, dispatched by address space and
/// byte offset within the region.
pub trait RegionBackend {
    /// # Errors
    /// Returns [`RegionError`] if the address space has no backend or the
    /// access falls outside what the backend can service.
    fn read(&self, space: AddressSpace, offset: u64, width_bytes: u8) -> Result<u64, RegionError>;

    /// # Errors
    /// Returns [`RegionError`] if the address space has no backend or the
    /// access falls outside what the backend can service.
    fn write(&self, space: AddressSpace, offset: u64, width_bytes: u8, value: u64) -> Result<(), RegionError>;
}

/// A backend that answers every access with [`RegionError::Unimplemented`].
/// Used in tests and by hosts that have not wired up a real backend yet.
#[derive(Debug, Default, Copy, Clone)]
pub struct NullRegionBackend;

impl RegionBackend for NullRegionBackend {
    fn read(&self, space: AddressSpace, _offset: u64, _width_bytes: u8) -> Result<u64, RegionError> {
        Err(RegionError::Unimplemented(space))
    }

    fn write(&self, space: AddressSpace, _offset: u64, _width_bytes: u8, _value: u64) -> Result<(), RegionError> {
        Err(RegionError::Unimplemented(space))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_rejects_every_access() {
        let backend = NullRegionBackend;
        assert!(matches!(
            backend.read(AddressSpace::SystemIo, 0, 1),
            Err(RegionError::Unimplemented(AddressSpace::SystemIo))
        ));
        assert!(matches!(
            backend.write(AddressSpace::PciConfig, 0, 4, 0),
            Err(RegionError::Unimplemented(AddressSpace::PciConfig))
        ));
    }
}
