//! # Firmware Service Boundary
//!
//! The firmware is an external collaborator; this layer consumes exactly
//! four capabilities from it: allocating a region of a given page count,
//! querying the current memory map into a caller buffer, ending the service
//! environment given the most recent map generation key, and the
//! configuration-table list. [`FirmwareServices`] is that boundary, so the
//! collection protocol can be driven against the real firmware and against
//! test doubles alike.

use core::fmt;
use core::ptr::NonNull;

/// Raw status word as returned by firmware services. Bit 63 set means
/// error, per the firmware's convention.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct FirmwareStatus(pub usize);

impl FirmwareStatus {
    pub const SUCCESS: Self = Self(0);
    pub const INVALID_PARAMETER: Self = Self(Self::ERROR_BIT | 2);
    pub const BUFFER_TOO_SMALL: Self = Self(Self::ERROR_BIT | 5);
    pub const OUT_OF_RESOURCES: Self = Self(Self::ERROR_BIT | 9);
    pub const ABORTED: Self = Self(Self::ERROR_BIT | 21);

    const ERROR_BIT: usize = 1 << (usize::BITS - 1);

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 & Self::ERROR_BIT != 0
    }
}

impl fmt::Display for FirmwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for FirmwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FirmwareStatus({:#x})", self.0)
    }
}

/// Opaque memory-map generation key. Must be retained verbatim and match
/// the firmware's internal state at the moment the service environment is
/// torn down, or the teardown is refused.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MapKey(pub usize);

/// Metadata accompanying a memory-map query.
#[derive(Copy, Clone, Debug)]
pub struct MapMeta {
    /// Bytes the firmware wrote into the buffer.
    pub map_size: usize,
    /// Generation key of this snapshot.
    pub map_key: MapKey,
    /// Firmware-chosen descriptor stride. Callers must step by this value,
    /// never by the size of a descriptor structure they declare themselves.
    pub desc_size: usize,
    /// Descriptor layout version.
    pub desc_version: u32,
}

/// Outcome of a memory-map query that did not produce a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum MapQueryError {
    /// The caller's buffer cannot hold the map; `required` is the size the
    /// firmware would have needed. This is the expected response to the
    /// zero-length size probe, not a failure.
    #[error("memory map buffer too small, {required} bytes required")]
    BufferTooSmall { required: usize },

    /// Any other firmware failure, status carried verbatim.
    #[error("memory map query failed with firmware status {0}")]
    Firmware(FirmwareStatus),
}

/// The boot-services capabilities this layer consumes.
///
/// Implementations own whatever identifies the calling image to the
/// firmware; the exit call only needs the latest map key from this side.
pub trait FirmwareServices {
    /// Query the current physical memory map into `buf`. A zero-length
    /// buffer is the size-discovery probe and must come back as
    /// [`MapQueryError::BufferTooSmall`].
    fn query_memory_map(&mut self, buf: &mut [u8]) -> Result<MapMeta, MapQueryError>;

    /// Allocate `count` fresh 4096-byte pages from firmware-managed memory.
    ///
    /// # Errors
    /// Returns the raw firmware status when the allocation is refused.
    fn allocate_pages(&mut self, count: usize) -> Result<NonNull<u8>, FirmwareStatus>;

    /// End the firmware service environment. Refused (typically with
    /// `INVALID_PARAMETER`) when `key` does not match the current map
    /// generation.
    ///
    /// # Errors
    /// Returns the raw firmware status when the teardown is refused; the
    /// service environment is then still alive and the map must be
    /// re-queried before trying again.
    fn exit_boot_services(&mut self, key: MapKey) -> Result<(), FirmwareStatus>;
}
