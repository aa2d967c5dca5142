//! # Platform Description Table Discovery
//!
//! Scans the firmware's configuration-table list for the platform
//! description tables the kernel will need later: the ACPI root pointer
//! (RSDP) and the SMBIOS entry points. Must run before the firmware service
//! environment is exited; the configuration-table list becomes unreliable
//! afterwards.
//!
//! ACPI candidates are validated against the byte-sum-zero invariant before
//! they are trusted, and a revision-2+ structure is preferred outright over
//! a revision-1 one when both are present (it is a superset). Finding
//! nothing is not an error: the kernel boots with generic-capability
//! assumptions rather than a synthesized fake table.

use crate::guid::{ACPI_GUID, ACPI2_GUID, Guid, SMBIOS_GUID, SMBIOS3_GUID};
use kernel_info::boot::PlatformTables;
use log::{debug, info, warn};

/// Byte length of the revision-1 RSDP form.
pub const RSDP_V1_LEN: usize = 20;

/// Byte length of the revision-2+ RSDP form.
pub const RSDP_V2_LEN: usize = 36;

/// Stride of one configuration-table entry: 16 identifier bytes plus an
/// opaque pointer.
pub const CONFIG_ENTRY_LEN: usize = 24;

/// Upper bound on a declared RSDP length worth mapping. A candidate
/// claiming more than a page is treated like one whose length field does
/// not cover the revision-2 form.
pub const RSDP_MAX_LEN: usize = 4096;

const RSDP_SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Read-only access to physical memory while the firmware still maps it.
///
/// The real boot path uses [`IdentityMap`]; tests substitute synthetic
/// buffers so table discovery can run on a host.
pub trait PhysMapRo {
    /// View `len` bytes of physical memory at `addr`.
    ///
    /// # Safety
    /// The caller asserts the range is mapped and readable for the lifetime
    /// of the returned slice.
    unsafe fn map_ro(&self, addr: u64, len: usize) -> &[u8];
}

/// The pre-exit environment: physical addresses are identity-mapped by the
/// firmware.
#[derive(Copy, Clone, Default)]
pub struct IdentityMap;

impl PhysMapRo for IdentityMap {
    unsafe fn map_ro(&self, addr: u64, len: usize) -> &[u8] {
        unsafe { core::slice::from_raw_parts(addr as usize as *const u8, len) }
    }
}

/// Which standard revision an RSDP candidate conforms to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AcpiRevision {
    /// Revision-1 form: 32-bit root table pointer only.
    V1,
    /// Revision-2+ form: adds the 64-bit extended root table pointer.
    V2,
}

/// A validated ACPI root pointer.
#[derive(Copy, Clone, Debug)]
pub struct AcpiRoot {
    pub rsdp_addr: u64,
    pub revision: AcpiRevision,
    /// 32-bit root table pointer, widened.
    pub rsdt_addr: u64,
    /// Extended root table pointer, revision-2+ only.
    pub xsdt_addr: Option<u64>,
}

/// Everything the locator resolved. Absent fields are degraded-continue,
/// never fatal.
#[derive(Clone, Debug, Default)]
pub struct Located {
    pub acpi: Option<AcpiRoot>,
    /// Legacy (32-bit) SMBIOS entry point.
    pub smbios: Option<u64>,
    /// SMBIOS 3 (64-bit) entry point.
    pub smbios3: Option<u64>,
}

impl Located {
    /// ABI form for the hand-off record. The 64-bit SMBIOS entry wins when
    /// both flavors exist.
    #[must_use]
    pub fn to_tables(&self) -> PlatformTables {
        let mut tables = PlatformTables::default();
        if let Some(acpi) = &self.acpi {
            tables.rsdp_addr = acpi.rsdp_addr;
            tables.rsdt_addr = acpi.rsdt_addr;
            tables.xsdt_addr = acpi.xsdt_addr.unwrap_or(0);
            tables.acpi_revision = match acpi.revision {
                AcpiRevision::V1 => 1,
                AcpiRevision::V2 => 2,
            };
        }
        tables.smbios_addr = self.smbios3.or(self.smbios).unwrap_or(0);
        tables
    }
}

fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Check an alleged RSDP against the byte-sum-zero invariant and resolve
/// which revision it conforms to.
///
/// The first 20 bytes must sum to zero modulo 256 for any RSDP. A
/// candidate declaring revision 2 or later must additionally sum to zero
/// over its full declared length; one that fails only the extended sum
/// degrades to a valid revision-1 structure, since the revision-1 prefix
/// already proved itself.
#[must_use]
pub fn validate_rsdp(bytes: &[u8]) -> Option<AcpiRevision> {
    if bytes.len() < RSDP_V1_LEN || &bytes[0..8] != RSDP_SIGNATURE {
        return None;
    }
    if sum(&bytes[..RSDP_V1_LEN]) != 0 {
        return None;
    }

    let revision = bytes[15];
    if revision < 2 {
        return Some(AcpiRevision::V1);
    }

    let length = u32::from_le_bytes(bytes[20..24].try_into().unwrap_or([0; 4])) as usize;
    if length < RSDP_V2_LEN || length > bytes.len() {
        return Some(AcpiRevision::V1);
    }
    if sum(&bytes[..length]) != 0 {
        return Some(AcpiRevision::V1);
    }
    Some(AcpiRevision::V2)
}

/// Read-only view of one RSDP, offsets per the revision forms.
struct RsdpView<'a> {
    bytes: &'a [u8],
}

impl RsdpView<'_> {
    fn rsdt_addr(&self) -> u64 {
        u64::from(u32::from_le_bytes(
            self.bytes[16..20].try_into().unwrap_or([0; 4]),
        ))
    }

    fn xsdt_addr(&self) -> u64 {
        u64::from_le_bytes(self.bytes[24..32].try_into().unwrap_or([0; 8]))
    }
}

/// One configuration-table entry: a 128-bit class identifier and an opaque
/// pointer.
#[derive(Copy, Clone, Debug)]
pub struct ConfigEntry {
    pub class: Guid,
    pub address: u64,
}

/// Iterate the firmware's configuration-table list from its raw base
/// address.
///
/// # Safety
/// `base` must point to `count` entries of [`CONFIG_ENTRY_LEN`] bytes each,
/// mapped for the duration of the iteration.
pub unsafe fn config_entries<'a, M: PhysMapRo>(
    map: &'a M,
    base: u64,
    count: usize,
) -> impl Iterator<Item = ConfigEntry> + 'a {
    let bytes = unsafe { map.map_ro(base, count * CONFIG_ENTRY_LEN) };
    bytes.chunks_exact(CONFIG_ENTRY_LEN).map(|entry| {
        let class = Guid::from_bytes(entry[0..16].try_into().unwrap_or([0; 16]));
        let address = u64::from_le_bytes(entry[16..24].try_into().unwrap_or([0; 8]));
        ConfigEntry { class, address }
    })
}

/// Scan every configuration-table entry exactly once and resolve the known
/// platform description tables.
///
/// Entries whose class matches neither ACPI nor SMBIOS identifier are
/// ignored. Of two valid ACPI candidates, the revision-2+ one wins
/// regardless of list order.
pub fn locate<M: PhysMapRo>(
    map: &M,
    entries: impl Iterator<Item = ConfigEntry>,
) -> Located {
    let mut old_candidate = None;
    let mut new_candidate = None;
    let mut located = Located::default();

    for entry in entries {
        if entry.class == ACPI2_GUID {
            new_candidate = Some(entry.address);
        } else if entry.class == ACPI_GUID {
            old_candidate = Some(entry.address);
        } else if entry.class == SMBIOS3_GUID {
            located.smbios3 = Some(entry.address);
        } else if entry.class == SMBIOS_GUID {
            located.smbios = Some(entry.address);
        }
    }

    // The revision-2+ structure is a superset; try it first and only fall
    // back to the revision-1 entry when it fails validation.
    for candidate in [new_candidate, old_candidate].into_iter().flatten() {
        if let Some(acpi) = check_candidate(map, candidate) {
            located.acpi = Some(acpi);
            break;
        }
    }

    match &located.acpi {
        Some(acpi) => info!(
            "found revision {:?} ACPI root pointer at {:#x}",
            acpi.revision, acpi.rsdp_addr
        ),
        None => warn!(
            "no valid ACPI root pointer in the configuration table; \
             continuing with generic capability assumptions"
        ),
    }
    if located.smbios.is_none() && located.smbios3.is_none() {
        debug!("no SMBIOS entry point in the configuration table");
    }

    located
}

/// How many bytes of a candidate the extended sum has to cover: the
/// declared length for a revision-2+ structure (it may exceed the base
/// form), the base form otherwise.
fn candidate_len(bytes: &[u8]) -> usize {
    if bytes.len() < RSDP_V2_LEN || bytes[15] < 2 {
        return RSDP_V2_LEN;
    }
    let length = u32::from_le_bytes(bytes[20..24].try_into().unwrap_or([0; 4])) as usize;
    length.clamp(RSDP_V2_LEN, RSDP_MAX_LEN)
}

fn check_candidate<M: PhysMapRo>(map: &M, addr: u64) -> Option<AcpiRoot> {
    if addr == 0 {
        return None;
    }
    let bytes = unsafe { map.map_ro(addr, RSDP_V2_LEN) };
    // The declared length may exceed the base revision-2 form; the
    // extended sum must cover all of it, so re-map when it does.
    let len = candidate_len(bytes);
    let bytes = if len > RSDP_V2_LEN {
        unsafe { map.map_ro(addr, len) }
    } else {
        bytes
    };
    let revision = validate_rsdp(bytes)?;
    let view = RsdpView { bytes };
    Some(AcpiRoot {
        rsdp_addr: addr,
        revision,
        rsdt_addr: view.rsdt_addr(),
        xsdt_addr: (revision == AcpiRevision::V2).then(|| view.xsdt_addr()),
    })
}
