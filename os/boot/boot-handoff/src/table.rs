//! # Firmware Table Views and Validation
//!
//! The firmware's table structures are foreign, fixed-layout binary data
//! reached through raw offsets. They are exposed here as read-only,
//! explicitly sized byte views with accessor functions rather than native
//! aggregate types, so a layout mismatch becomes a validation failure
//! instead of undefined behavior.
//!
//! Nothing in a table is trusted before [`validate_table`] has certified its
//! header: the stored checksum must equal the CRC-32 of the first
//! `header_size` bytes computed with the checksum field read as zero.

use crate::crc32::Crc32;

/// Byte length of the common table header.
pub const TABLE_HEADER_LEN: usize = 24;

/// Byte length of the system table on 64-bit platforms.
pub const SYSTEM_TABLE_LEN: usize = 120;

/// Offset of the stored checksum within the header.
const CHECKSUM_OFFSET: usize = 16;

/// Signature of the top-level system table (`"IBI SYST"`).
pub const SYSTEM_TABLE_SIGNATURE: u64 = 0x5453_5953_2049_4249;

/// Signature of the boot services table (`"BOOTSERV"`).
pub const BOOT_SERVICES_SIGNATURE: u64 = 0x5652_4553_544f_4f42;

/// Signature of the runtime services table (`"RUNTSERV"`).
pub const RUNTIME_SERVICES_SIGNATURE: u64 = 0x5652_4553_544e_5552;

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_or([0; 4]))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap_or([0; 8]))
}

/// Read-only view of the common header every firmware table begins with.
#[derive(Copy, Clone)]
pub struct TableHeaderView<'a> {
    bytes: &'a [u8],
}

impl<'a> TableHeaderView<'a> {
    /// Wrap a byte view. Returns `None` when the view cannot even hold the
    /// header, which is the caller's minimum mapping guarantee.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < TABLE_HEADER_LEN {
            None
        } else {
            Some(Self { bytes })
        }
    }

    /// Wrap the table at a physical address.
    ///
    /// # Safety
    /// `addr` must point to at least `max_len >= TABLE_HEADER_LEN` readable
    /// bytes; the boot layer trusts the firmware to exactly that extent.
    #[must_use]
    pub const unsafe fn from_addr(addr: u64, max_len: usize) -> Option<Self> {
        let bytes = unsafe { core::slice::from_raw_parts(addr as usize as *const u8, max_len) };
        Self::new(bytes)
    }

    /// 64-bit tag identifying the table kind.
    #[must_use]
    pub fn signature(&self) -> u64 {
        read_u64(self.bytes, 0)
    }

    /// Table revision.
    #[must_use]
    pub fn revision(&self) -> u32 {
        read_u32(self.bytes, 8)
    }

    /// Declared size of the full table in bytes, checksummed range included.
    #[must_use]
    pub fn header_size(&self) -> u32 {
        read_u32(self.bytes, 12)
    }

    /// Stored CRC-32 over `[0, header_size)` with this field zeroed.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        read_u32(self.bytes, CHECKSUM_OFFSET)
    }

    pub(crate) const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Wrap the table at a physical address, sized by its own declared header
/// size so the whole checksummed range lands inside the view.
///
/// Returns `None` for a null address or a declared size shorter than the
/// common header.
///
/// # Safety
/// `addr` must point to a mapped table header whose declared size is
/// readable in full.
#[must_use]
pub unsafe fn table_at(addr: u64) -> Option<TableHeaderView<'static>> {
    if addr == 0 {
        return None;
    }
    let header = unsafe { TableHeaderView::from_addr(addr, TABLE_HEADER_LEN)? };
    let size = header.header_size() as usize;
    if size < TABLE_HEADER_LEN {
        return None;
    }
    unsafe { TableHeaderView::from_addr(addr, size) }
}

/// Decide whether a firmware table is self-consistent.
///
/// Recomputes the CRC-32 over the first `header_size` bytes with the
/// checksum field substituted by zeroes and compares it against the stored
/// value. Never mutates the table; the substitution happens in the hasher,
/// not in firmware memory.
///
/// Returns `false` when the declared size is shorter than the header itself
/// or longer than the mapped view, both of which mean the header cannot be
/// what it claims.
#[must_use]
pub fn validate_table(table: TableHeaderView<'_>) -> bool {
    let bytes = table.bytes();
    let size = table.header_size() as usize;
    if size < TABLE_HEADER_LEN || size > bytes.len() {
        return false;
    }

    let mut hasher = Crc32::new();
    hasher.update(&bytes[..CHECKSUM_OFFSET]);
    hasher.update(&[0u8; 4]);
    hasher.update(&bytes[CHECKSUM_OFFSET + 4..size]);
    hasher.finalize() == table.checksum()
}

/// Read-only view of the firmware system table (64-bit layout).
///
/// Field offsets:
///
/// ```text
///   0  header (24 bytes)
///  24  firmware vendor pointer
///  32  firmware revision
///  40  console-in handle      48  con_in
///  56  console-out handle     64  con_out
///  72  stderr handle          80  std_err
///  88  runtime services       96  boot services
/// 104  configuration entry count
/// 112  configuration table pointer
/// ```
#[derive(Copy, Clone)]
pub struct SystemTableView<'a> {
    bytes: &'a [u8],
}

impl<'a> SystemTableView<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < SYSTEM_TABLE_LEN {
            None
        } else {
            Some(Self { bytes })
        }
    }

    /// Wrap the system table the firmware passed to the entry point.
    ///
    /// # Safety
    /// `addr` must point to at least [`SYSTEM_TABLE_LEN`] readable bytes.
    #[must_use]
    pub const unsafe fn from_addr(addr: u64) -> Option<Self> {
        let bytes =
            unsafe { core::slice::from_raw_parts(addr as usize as *const u8, SYSTEM_TABLE_LEN) };
        Self::new(bytes)
    }

    /// The common header, for [`validate_table`].
    #[must_use]
    pub fn header(&self) -> TableHeaderView<'a> {
        // Length was checked in the constructor.
        TableHeaderView { bytes: self.bytes }
    }

    #[must_use]
    pub fn firmware_vendor_addr(&self) -> u64 {
        read_u64(self.bytes, 24)
    }

    #[must_use]
    pub fn firmware_revision(&self) -> u32 {
        read_u32(self.bytes, 32)
    }

    /// Address of the runtime services table, or 0.
    #[must_use]
    pub fn runtime_services_addr(&self) -> u64 {
        read_u64(self.bytes, 88)
    }

    /// Address of the boot services table, or 0.
    #[must_use]
    pub fn boot_services_addr(&self) -> u64 {
        read_u64(self.bytes, 96)
    }

    /// Number of configuration-table entries.
    #[must_use]
    pub fn config_entry_count(&self) -> usize {
        read_u64(self.bytes, 104) as usize
    }

    /// Address of the first configuration-table entry.
    #[must_use]
    pub fn config_table_addr(&self) -> u64 {
        read_u64(self.bytes, 112)
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use crate::crc32::crc32;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Build a table of `len` bytes with the given signature and a correct
    /// header checksum.
    pub(crate) fn synthetic_table(signature: u64, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[0..8].copy_from_slice(&signature.to_le_bytes());
        bytes[8..12].copy_from_slice(&2u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&(len as u32).to_le_bytes());
        // Body noise so the checksum covers more than zeroes.
        for (i, byte) in bytes.iter_mut().enumerate().skip(TABLE_HEADER_LEN) {
            *byte = (i * 7) as u8;
        }
        let sum = crc32(&bytes[..len]);
        bytes[16..20].copy_from_slice(&sum.to_le_bytes());
        bytes
    }

    #[test]
    fn valid_table_passes() {
        let bytes = synthetic_table(SYSTEM_TABLE_SIGNATURE, SYSTEM_TABLE_LEN);
        let view = TableHeaderView::new(&bytes).unwrap();
        assert_eq!(view.signature(), SYSTEM_TABLE_SIGNATURE);
        assert!(validate_table(view));
    }

    #[test]
    fn any_single_byte_mutation_fails() {
        let bytes = synthetic_table(BOOT_SERVICES_SIGNATURE, 64);
        for i in 0..64 {
            let mut mutated = bytes.clone();
            mutated[i] = mutated[i].wrapping_add(1);
            let view = TableHeaderView::new(&mutated).unwrap();
            assert!(!validate_table(view), "mutation at byte {i} went unnoticed");
        }
    }

    #[test]
    fn undersized_declared_length_fails() {
        let mut bytes = synthetic_table(SYSTEM_TABLE_SIGNATURE, 64);
        bytes[12..16].copy_from_slice(&8u32.to_le_bytes());
        assert!(!validate_table(TableHeaderView::new(&bytes).unwrap()));
    }

    #[test]
    fn oversized_declared_length_fails() {
        let mut bytes = synthetic_table(SYSTEM_TABLE_SIGNATURE, 64);
        bytes[12..16].copy_from_slice(&4096u32.to_le_bytes());
        assert!(!validate_table(TableHeaderView::new(&bytes).unwrap()));
    }

    #[test]
    fn short_view_is_rejected() {
        assert!(TableHeaderView::new(&[0u8; 16]).is_none());
        assert!(SystemTableView::new(&[0u8; 100]).is_none());
    }

    #[test]
    fn table_at_sizes_itself_from_the_header() {
        let bytes = synthetic_table(BOOT_SERVICES_SIGNATURE, 376);
        let view = unsafe { table_at(bytes.as_ptr() as u64) }.unwrap();
        assert_eq!(view.header_size(), 376);
        assert!(validate_table(view));
        assert!(unsafe { table_at(0) }.is_none());
    }

    #[test]
    fn system_table_accessors() {
        let mut bytes = synthetic_table(SYSTEM_TABLE_SIGNATURE, SYSTEM_TABLE_LEN);
        bytes[88..96].copy_from_slice(&0x1000u64.to_le_bytes());
        bytes[96..104].copy_from_slice(&0x2000u64.to_le_bytes());
        bytes[104..112].copy_from_slice(&3u64.to_le_bytes());
        bytes[112..120].copy_from_slice(&0x3000u64.to_le_bytes());

        let view = SystemTableView::new(&bytes).unwrap();
        assert_eq!(view.runtime_services_addr(), 0x1000);
        assert_eq!(view.boot_services_addr(), 0x2000);
        assert_eq!(view.config_entry_count(), 3);
        assert_eq!(view.config_table_addr(), 0x3000);
        // The checksum no longer matches after poking the body.
        assert!(!validate_table(view.header()));
    }
}
