//! # Hand-off Record Assembly
//!
//! Pure composition of the validated outputs of the boot sequence into one
//! immutable [`BootHandoffRecord`], and the one-way transfer of control
//! into the kernel entry point.

use crate::halt::{HaltReason, halt};
use crate::mmap::CapturedMemoryMap;
use crate::platform::Located;
use kernel_info::boot::{
    BootHandoffRecord, CpuCapabilities, KernelEntryFn, LoaderClass, MemoryMapInfo, PlatformTables,
};
use log::info;

/// Builds the record one validated piece at a time. Both boot paths feed
/// the same builder, so their validation rigor cannot drift apart.
pub struct BootHandoffBuilder {
    loader: LoaderClass,
    platform: PlatformTables,
    mmap: MemoryMapInfo,
    cpu: CpuCapabilities,
}

impl BootHandoffBuilder {
    /// Start a record for the firmware-services boot path.
    #[must_use]
    pub fn firmware_services() -> Self {
        Self::new(LoaderClass::FirmwareServices)
    }

    /// Start a record for the legacy boot path.
    #[must_use]
    pub fn legacy() -> Self {
        Self::new(LoaderClass::Legacy)
    }

    fn new(loader: LoaderClass) -> Self {
        Self {
            loader,
            platform: PlatformTables::default(),
            mmap: MemoryMapInfo::default(),
            cpu: CpuCapabilities::NONE,
        }
    }

    /// Attach the resolved platform description pointers.
    #[must_use]
    pub fn with_platform(mut self, located: &Located) -> Self {
        self.platform = located.to_tables();
        self
    }

    /// Attach the captured memory map (firmware-services path).
    #[must_use]
    pub fn with_memory_map(mut self, captured: &CapturedMemoryMap) -> Self {
        self.mmap = captured.to_info();
        self
    }

    /// Attach the probed processor capabilities (legacy path).
    #[must_use]
    pub const fn with_cpu(mut self, cpu: CpuCapabilities) -> Self {
        self.cpu = cpu;
        self
    }

    /// Assemble the terminal artifact. Created once per boot, immutable
    /// thereafter.
    #[must_use]
    pub fn build(self) -> BootHandoffRecord {
        BootHandoffRecord {
            loader: self.loader,
            platform: self.platform,
            mmap: self.mmap,
            cpu: self.cpu,
        }
    }
}

/// The one-way call into the kernel.
///
/// The record must stay alive for the kernel's whole run; since this call
/// never returns, neither a leaked allocation nor the caller's own frame
/// ever goes away underneath it.
///
/// If the entry point returns, which its contract forbids, the processor is
/// halted rather than falling through into undefined behavior.
pub fn enter_kernel(entry: KernelEntryFn, record: &BootHandoffRecord) -> ! {
    info!("handing control to the kernel entry point");
    entry(core::ptr::from_ref(record));
    halt(HaltReason::KernelReturned)
}
