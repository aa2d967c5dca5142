//! # Legacy Boot Path
//!
//! The non-UEFI bring-up: a multiboot2-style loader hands the entry stub a
//! magic number and a pointer to its information block. Both are validated
//! before anything else happens; a mismatch is fatal with a distinguishable
//! reason code. After that the firmware-table components are replaced by
//! the CPU capability probe, feeding a simpler record into the same
//! builder as the firmware path.

use crate::cpu::{self, CpuidPort};
use crate::halt::{HaltReason, halt};
use crate::handoff::{BootHandoffBuilder, enter_kernel};
use kernel_info::boot::{BootHandoffRecord, KernelEntryFn};

/// The magic value a compliant legacy loader leaves in the register the
/// entry stub captures.
pub const BOOTLOADER_MAGIC: u32 = 0x36d7_6289;

/// Required alignment of the loader information block.
pub const INFO_ALIGN: u64 = 8;

/// Why a legacy hand-off was rejected.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum LegacyBootError {
    #[error("loader magic {0:#x} is not the multiboot2 hand-off value")]
    BadMagic(u32),

    #[error("loader information block at {0:#x} is not 8-byte aligned")]
    MisalignedInfo(u64),
}

impl LegacyBootError {
    /// The halt code this rejection maps to.
    #[must_use]
    pub const fn halt_reason(&self) -> HaltReason {
        match self {
            Self::BadMagic(_) => HaltReason::NotMultiboot,
            Self::MisalignedInfo(_) => HaltReason::MisalignedBootInfo,
        }
    }
}

/// Validate the two scalars the legacy loader passed, before any CPU
/// probing.
///
/// # Errors
/// Returns which of the two checks failed; the caller halts with the
/// matching reason code.
pub fn validate_handoff(magic: u32, info_addr: u64) -> Result<(), LegacyBootError> {
    if magic != BOOTLOADER_MAGIC {
        return Err(LegacyBootError::BadMagic(magic));
    }
    if info_addr % INFO_ALIGN != 0 {
        return Err(LegacyBootError::MisalignedInfo(info_addr));
    }
    Ok(())
}

/// Resolve the legacy path into a hand-off record: validate the loader
/// scalars, probe the processor, compose.
///
/// The record has no memory map and, with no firmware configuration table
/// to scan, no platform pointers either; the kernel falls back to its own
/// discovery for those.
#[must_use]
pub fn resolve(magic: u32, info_addr: u64, port: &impl CpuidPort) -> BootHandoffRecord {
    if let Err(err) = validate_handoff(magic, info_addr) {
        halt(err.halt_reason());
    }
    let caps = cpu::probe(port);
    BootHandoffBuilder::legacy().with_cpu(caps).build()
}

/// The whole legacy path in one call: validate, probe, compose, enter.
///
/// This frame never pops, so handing the kernel a reference into it is
/// sound for the kernel's whole run.
pub fn legacy_boot(magic: u32, info_addr: u64, port: &impl CpuidPort, entry: KernelEntryFn) -> ! {
    let record = resolve(magic, info_addr, port);
    enter_kernel(entry, &record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_handoff_passes() {
        assert_eq!(validate_handoff(BOOTLOADER_MAGIC, 0x0010_0000), Ok(()));
    }

    #[test]
    fn wrong_magic_is_distinguished() {
        let err = validate_handoff(0x2BAD_B002, 0x0010_0000).unwrap_err();
        assert_eq!(err, LegacyBootError::BadMagic(0x2BAD_B002));
        assert_eq!(err.halt_reason(), HaltReason::NotMultiboot);
    }

    #[test]
    fn misaligned_info_is_distinguished() {
        let err = validate_handoff(BOOTLOADER_MAGIC, 0x0010_0004).unwrap_err();
        assert_eq!(err, LegacyBootError::MisalignedInfo(0x0010_0004));
        assert_eq!(err.halt_reason(), HaltReason::MisalignedBootInfo);
    }

    #[test]
    fn resolve_builds_a_legacy_record() {
        use crate::cpu::CpuidResult;
        use kernel_info::boot::{CpuCapabilities, LoaderClass};

        struct NoCpuid;
        impl CpuidPort for NoCpuid {
            fn has_cpuid(&self) -> bool {
                false
            }
            fn cpuid(&self, _leaf: u32, _subleaf: u32) -> CpuidResult {
                unreachable!("probed a CPU that reported no CPUID")
            }
        }

        let record = resolve(BOOTLOADER_MAGIC, 0x0010_0000, &NoCpuid);
        assert_eq!(record.loader, LoaderClass::Legacy);
        assert_eq!(record.cpu, CpuCapabilities::NONE);
        assert_eq!(record.mmap.mmap_ptr, 0);
    }

    #[test]
    fn magic_is_checked_before_alignment() {
        // Both wrong: the magic failure wins, matching the validation
        // order a loader bug would hit first.
        let err = validate_handoff(0, 3).unwrap_err();
        assert!(matches!(err, LegacyBootError::BadMagic(0)));
    }
}
