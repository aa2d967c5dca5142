//! # Boot Hand-off Record
//!
//! The terminal artifact of the boot hand-off layer. Exactly one record is
//! built per boot; it is immutable once the kernel entry point has been
//! called and is never destroyed, since the boot layer does not return.

/// Size of a physical page as used by the firmware page allocator and the
/// memory map descriptors.
pub const PAGE_SIZE_4K: usize = 4096;

/// Kernel function pointer.
///
/// # ABI
/// Plain C ABI; both boot paths call this with a pointer to a fully
/// resolved [`BootHandoffRecord`].
///
/// Deliberately *not* declared `-> !`: the hand-off layer treats a return
/// from the kernel entry as a contract violation and halts the processor
/// instead of falling through into undefined behavior.
pub type KernelEntryFn = extern "C" fn(*const BootHandoffRecord);

/// Which loading environment produced the record.
///
/// We avoid Rust enums with payloads across the ABI boundary; the class tag
/// selects which of the record's payload groups is meaningful.
#[repr(u32)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LoaderClass {
    /// Booted through firmware boot services (UEFI). The record carries a
    /// captured memory map; the CPU capability group is zeroed.
    FirmwareServices = 0,
    /// Booted through a legacy (BIOS/multiboot) loader. The record carries
    /// probed CPU capabilities; the memory map group is zeroed.
    Legacy = 1,
}

/// Information the kernel needs right after the firmware environment ends.
#[repr(C)]
#[derive(Clone)]
pub struct BootHandoffRecord {
    /// Which boot path produced this record.
    pub loader: LoaderClass,

    /// Resolved platform description pointers; zero fields mean "absent".
    pub platform: PlatformTables,

    /// Captured firmware memory map. All-zero on the legacy path.
    pub mmap: MemoryMapInfo,

    /// Probed processor capabilities. All-zero on the firmware path.
    pub cpu: CpuCapabilities,
}

/// Physical addresses of the platform description tables, resolved and
/// checksum-validated before boot services ended.
#[repr(C)]
#[derive(Clone, Default)]
pub struct PlatformTables {
    /// RSDP physical address, or 0 if ACPI was not found.
    pub rsdp_addr: u64,

    /// Root System Description Table address (32-bit pointer widened), or 0.
    pub rsdt_addr: u64,

    /// Extended System Description Table address (ACPI 2.0+ only), or 0.
    pub xsdt_addr: u64,

    /// RSDP revision (0/1 for ACPI 1.0, >= 2 for ACPI 2.0+). Only
    /// meaningful when `rsdp_addr` is non-zero.
    pub acpi_revision: u32,

    /// SMBIOS entry point address (the 64-bit entry is preferred when both
    /// flavors are present), or 0.
    pub smbios_addr: u64,
}

impl PlatformTables {
    /// Whether an ACPI root pointer was resolved.
    #[must_use]
    pub const fn has_acpi(&self) -> bool {
        self.rsdp_addr != 0
    }
}

/// The captured firmware memory map.
///
/// The buffer holds raw descriptor bytes exactly as the firmware returned
/// them; consumers must step by `mmap_desc_size`, never by the size of any
/// descriptor structure they declare themselves.
#[repr(C)]
#[derive(Clone, Default)]
pub struct MemoryMapInfo {
    /// Pointer to the raw descriptor buffer.
    pub mmap_ptr: u64,

    /// Length of the populated part of the buffer in **bytes**.
    pub mmap_len: u64,

    /// Firmware-chosen stride of a single descriptor in bytes.
    pub mmap_desc_size: u64,

    /// Descriptor version as reported by the firmware.
    pub mmap_desc_version: u32,
}

impl MemoryMapInfo {
    /// Number of whole descriptors in the buffer.
    #[must_use]
    pub const fn entry_count(&self) -> u64 {
        if self.mmap_desc_size == 0 {
            0
        } else {
            self.mmap_len / self.mmap_desc_size
        }
    }
}

/// Processor capability flags probed on the legacy boot path.
///
/// Each flag is only meaningful once its prerequisite is confirmed present;
/// a zeroed flag whose prerequisite is zero was never probed at all. Written
/// exactly once, early in the legacy path. Fields are `u8` (0 or 1) to keep
/// the ABI free of `bool` layout assumptions.
#[repr(C)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Debug)]
pub struct CpuCapabilities {
    /// The capability-query (CPUID) instruction is available.
    pub has_cpuid: u8,
    /// Physical Address Extension.
    pub has_pae: u8,
    /// 64-bit long mode.
    pub has_long_mode: u8,
    /// 5-level paging (57-bit linear addresses).
    pub has_la57: u8,
}

impl CpuCapabilities {
    /// A record with every flag absent, the expected shape when the
    /// capability-query instruction itself is missing.
    pub const NONE: Self = Self {
        has_cpuid: 0,
        has_pae: 0,
        has_long_mode: 0,
        has_la57: 0,
    };
}
