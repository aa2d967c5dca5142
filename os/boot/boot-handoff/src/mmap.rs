//! # Memory Map Collection
//!
//! Runs the two-phase "ask size, allocate, retrieve" protocol against the
//! firmware's memory-query service and exits the service environment using
//! the map's opaque generation key.
//!
//! State machine: `Unqueried → SizeKnown → Captured → Exited`. The size
//! probe uses a zero-length buffer and the only valid outcome is the
//! firmware reporting how large the map would have been; the capture query
//! fills a freshly allocated buffer; and immediately before exiting, the
//! map is queried once more, because the allocation call itself perturbs
//! memory state. A refused exit (stale key) retries the capture, bounded by
//! [`MAX_EXIT_ATTEMPTS`].
//!
//! After the exit succeeds, the buffer is read-only historical data and no
//! firmware call of any kind is permitted; [`MemoryMapCollector::run`]
//! consumes the [`FirmwareServices`] value so that none is expressible.

use crate::firmware::{FirmwareServices, FirmwareStatus, MapKey, MapMeta, MapQueryError};
use bitfield_struct::bitfield;
use core::fmt;
use core::ptr::NonNull;
use kernel_info::boot::{MemoryMapInfo, PAGE_SIZE_4K};
use log::debug;

/// Bound on stale-key exit retries before the sequence is a fatal protocol
/// error.
pub const MAX_EXIT_ATTEMPTS: usize = 4;

/// Natural byte length of one descriptor. The firmware may use any stride
/// at least this large; iteration always steps by the reported stride.
pub const DESCRIPTOR_MIN_LEN: usize = 40;

/// Memory region class, a closed enumeration owned by the firmware.
///
/// Kept as a newtype over the raw word so that a value outside the known
/// set stays representable and reportable instead of becoming undefined
/// behavior in an enum.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MemoryType(pub u32);

impl MemoryType {
    pub const RESERVED: Self = Self(0);
    pub const LOADER_CODE: Self = Self(1);
    pub const LOADER_DATA: Self = Self(2);
    pub const BOOT_SERVICES_CODE: Self = Self(3);
    pub const BOOT_SERVICES_DATA: Self = Self(4);
    pub const RUNTIME_SERVICES_CODE: Self = Self(5);
    pub const RUNTIME_SERVICES_DATA: Self = Self(6);
    pub const CONVENTIONAL: Self = Self(7);
    pub const UNUSABLE: Self = Self(8);
    pub const ACPI_RECLAIM: Self = Self(9);
    pub const ACPI_NON_VOLATILE: Self = Self(10);
    pub const MMIO: Self = Self(11);
    pub const MMIO_PORT_SPACE: Self = Self(12);
    pub const PAL_CODE: Self = Self(13);
    pub const PERSISTENT: Self = Self(14);
    pub const UNACCEPTED: Self = Self(15);

    /// Human-readable class name for boot reporting.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RESERVED => "reserved",
            Self::LOADER_CODE => "loader code",
            Self::LOADER_DATA => "loader data",
            Self::BOOT_SERVICES_CODE => "boot services code",
            Self::BOOT_SERVICES_DATA => "boot services data",
            Self::RUNTIME_SERVICES_CODE => "runtime services code",
            Self::RUNTIME_SERVICES_DATA => "runtime services data",
            Self::CONVENTIONAL => "conventional",
            Self::UNUSABLE => "unusable",
            Self::ACPI_RECLAIM => "ACPI reclaim",
            Self::ACPI_NON_VOLATILE => "ACPI persistent",
            Self::MMIO => "MMIO",
            Self::MMIO_PORT_SPACE => "MMIO port space",
            Self::PAL_CODE => "PAL code",
            Self::PERSISTENT => "persistent",
            Self::UNACCEPTED => "unaccepted",
            _ => "unknown",
        }
    }
}

/// Attribute bit-field of a memory region.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct MemoryAttributes {
    pub uncacheable: bool,
    pub write_combining: bool,
    pub write_through: bool,
    pub write_back: bool,
    pub uncacheable_exported: bool,
    #[bits(7)]
    _pad0: u8,
    pub write_protected: bool,
    pub read_protected: bool,
    pub execute_protected: bool,
    pub non_volatile: bool,
    pub more_reliable: bool,
    pub read_only: bool,
    pub specific_purpose: bool,
    pub cpu_crypto: bool,
    #[bits(43)]
    _pad1: u64,
    /// Region stays visible to runtime services after the hand-off.
    pub runtime: bool,
}

/// One flag letter per attribute, dash when clear, in the order the boot
/// report prints them.
impl fmt::Display for MemoryAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use core::fmt::Write;
        let flags = [
            (self.uncacheable(), 'U'),
            (self.write_combining(), 'C'),
            (self.write_through(), 'T'),
            (self.write_back(), 'B'),
            (self.uncacheable_exported(), 'E'),
            (self.write_protected(), 'w'),
            (self.read_protected(), 'R'),
            (self.specific_purpose(), 'S'),
            (self.execute_protected(), 'X'),
            (self.non_volatile(), 'N'),
            (self.more_reliable(), 'M'),
            (self.read_only(), 'r'),
            (self.runtime(), 't'),
        ];
        for (set, letter) in flags {
            f.write_char(if set { letter } else { '-' })?;
        }
        Ok(())
    }
}

/// Read-only view of one descriptor, reached through raw offsets.
#[derive(Copy, Clone)]
pub struct DescriptorView<'a> {
    bytes: &'a [u8],
}

impl DescriptorView<'_> {
    fn read_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.bytes[offset..offset + 8].try_into().unwrap_or([0; 8]))
    }

    /// Region class.
    #[must_use]
    pub fn region_type(&self) -> MemoryType {
        MemoryType(u32::from_le_bytes(
            self.bytes[0..4].try_into().unwrap_or([0; 4]),
        ))
    }

    /// Physical start address of the region.
    #[must_use]
    pub fn phys_start(&self) -> u64 {
        self.read_u64(8)
    }

    /// Region length in 4096-byte pages.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        self.read_u64(24)
    }

    /// First byte past the region. Saturates on nonsense descriptor values
    /// so a corrupt map can still be reported instead of panicking.
    #[must_use]
    pub fn phys_end(&self) -> u64 {
        self.phys_start()
            .saturating_add(self.page_count().saturating_mul(PAGE_SIZE_4K as u64))
    }

    /// Cacheability/protection/runtime attribute bits.
    #[must_use]
    pub fn attributes(&self) -> MemoryAttributes {
        MemoryAttributes::from_bits(self.read_u64(32))
    }
}

/// Stride-aware view over a raw descriptor buffer.
///
/// The stride is opaque and firmware-chosen; it must never be assumed equal
/// to [`DESCRIPTOR_MIN_LEN`].
#[derive(Copy, Clone)]
pub struct MemoryMapView<'a> {
    bytes: &'a [u8],
    desc_size: usize,
}

impl<'a> MemoryMapView<'a> {
    /// Wrap a buffer of descriptors. Returns `None` when the stride cannot
    /// hold even the natural descriptor layout.
    #[must_use]
    pub const fn new(bytes: &'a [u8], desc_size: usize) -> Option<Self> {
        if desc_size < DESCRIPTOR_MIN_LEN {
            None
        } else {
            Some(Self { bytes, desc_size })
        }
    }

    /// Number of whole descriptors in the buffer.
    #[must_use]
    pub const fn entry_count(&self) -> usize {
        self.bytes.len() / self.desc_size
    }

    /// Iterate the descriptors, stepping by the firmware-chosen stride.
    #[must_use]
    pub const fn entries(&self) -> Descriptors<'a> {
        Descriptors {
            bytes: self.bytes,
            desc_size: self.desc_size,
        }
    }
}

pub struct Descriptors<'a> {
    bytes: &'a [u8],
    desc_size: usize,
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = DescriptorView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.len() < self.desc_size {
            return None;
        }
        let (entry, rest) = self.bytes.split_at(self.desc_size);
        self.bytes = rest;
        Some(DescriptorView { bytes: entry })
    }
}

/// Log every entry of the map at `debug!`, iterating exactly the computed
/// entry count. Must run before the service environment is exited, while
/// console output is still defined.
pub fn report(view: &MemoryMapView<'_>) {
    debug!("memory map has {} entries", view.entry_count());
    for (i, entry) in view.entries().enumerate() {
        debug!(
            "entry {i}: {} {:#012x}..{:#012x} [{}]",
            entry.region_type().name(),
            entry.phys_start(),
            entry.phys_end(),
            entry.attributes(),
        );
    }
}

/// Why the collection protocol failed. Every variant is fatal to the boot
/// sequence; the expected-non-error outcomes never surface here.
#[derive(Debug, thiserror::Error)]
pub enum MapProtocolError {
    /// The zero-length size probe came back as anything other than "buffer
    /// too small".
    #[error("size probe returned firmware status {0} instead of a size report")]
    SizeProbe(FirmwareStatus),

    /// The size probe claimed the zero-length buffer was sufficient.
    #[error("size probe unexpectedly succeeded with an empty buffer")]
    SizeProbeSucceeded,

    /// The firmware page allocator refused the buffer.
    #[error("allocating {pages} pages for the memory map failed with status {status}")]
    Allocation {
        pages: usize,
        status: FirmwareStatus,
    },

    /// A capture query failed outright.
    #[error("memory map capture failed")]
    Capture(#[source] MapQueryError),

    /// The firmware kept refusing the exit call.
    #[error("exit from boot services refused after {attempts} attempts, last status {status}")]
    ExitRefused {
        attempts: usize,
        status: FirmwareStatus,
    },
}

/// The memory map as captured at the instant the service environment ended,
/// together with the buffer the firmware filled. Read-only historical data
/// from that point on.
#[derive(Debug)]
pub struct CapturedMemoryMap {
    buffer: NonNull<u8>,
    len: usize,
    desc_size: usize,
    desc_version: u32,
    key: MapKey,
}

impl CapturedMemoryMap {
    /// Stride-aware view over the captured descriptors.
    #[must_use]
    pub fn view(&self) -> MemoryMapView<'_> {
        // The buffer stays valid forever: it was allocated from
        // firmware-managed memory and nothing reclaims it before the kernel
        // owns the machine.
        let bytes = unsafe { core::slice::from_raw_parts(self.buffer.as_ptr(), self.len) };
        MemoryMapView {
            bytes,
            desc_size: self.desc_size,
        }
    }

    /// The generation key the successful exit call used.
    #[must_use]
    pub const fn key(&self) -> MapKey {
        self.key
    }

    #[must_use]
    pub const fn entry_count(&self) -> usize {
        self.len / self.desc_size
    }

    /// ABI form for the hand-off record.
    #[must_use]
    pub fn to_info(&self) -> MemoryMapInfo {
        MemoryMapInfo {
            mmap_ptr: self.buffer.as_ptr() as u64,
            mmap_len: self.len as u64,
            mmap_desc_size: self.desc_size as u64,
            mmap_desc_version: self.desc_version,
        }
    }
}

/// Drives the collection protocol against a [`FirmwareServices`]
/// implementation. `Unqueried` state; [`MemoryMapCollector::capture`]
/// advances through `SizeKnown` into `Captured`.
pub struct MemoryMapCollector<F> {
    firmware: F,
}

impl<F: FirmwareServices> MemoryMapCollector<F> {
    pub const fn new(firmware: F) -> Self {
        Self { firmware }
    }

    /// Run the whole protocol to completion: capture, then exit. On
    /// success the firmware service environment has been exited and the
    /// captured map is the snapshot the exit key matched.
    ///
    /// # Errors
    /// Any [`MapProtocolError`] is an unrecoverable protocol violation; the
    /// caller is expected to halt.
    pub fn run(self) -> Result<CapturedMemoryMap, MapProtocolError> {
        self.capture()?.finish()
    }

    /// `Unqueried → SizeKnown → Captured`: size probe, page allocation,
    /// capture query. Boot services are still alive afterwards, so the
    /// caller may still report the snapshot to the console before
    /// [`CapturedMap::finish`] tears the environment down.
    ///
    /// # Errors
    /// See [`MemoryMapCollector::run`].
    pub fn capture(mut self) -> Result<CapturedMap<F>, MapProtocolError> {
        // Unqueried → SizeKnown
        let required = self.discover_size()?;
        debug!("memory map size probe reported {required} bytes");

        // SizeKnown → Captured
        let mut captured = CapturedMap {
            firmware: self.firmware,
            buffer: NonNull::dangling(),
            capacity: 0,
            meta: None,
        };
        captured.grow_to(required)?;
        captured.refresh()?;
        Ok(captured)
    }

    fn discover_size(&mut self) -> Result<usize, MapProtocolError> {
        match self.firmware.query_memory_map(&mut []) {
            Err(MapQueryError::BufferTooSmall { required }) => Ok(required),
            Err(MapQueryError::Firmware(status)) => Err(MapProtocolError::SizeProbe(status)),
            Ok(_) => Err(MapProtocolError::SizeProbeSucceeded),
        }
    }
}

/// `Captured` state: a buffer holding the latest snapshot, boot services
/// still running. The only way forward is [`CapturedMap::finish`].
pub struct CapturedMap<F> {
    firmware: F,
    buffer: NonNull<u8>,
    capacity: usize,
    meta: Option<MapMeta>,
}

impl<F: FirmwareServices> CapturedMap<F> {
    /// The snapshot captured so far. Reporting it must happen here, while
    /// console output is still defined.
    #[must_use]
    pub fn view(&self) -> MemoryMapView<'_> {
        let len = self.meta.as_ref().map_or(0, |meta| meta.map_size);
        let bytes = unsafe { core::slice::from_raw_parts(self.buffer.as_ptr(), len) };
        MemoryMapView {
            bytes,
            desc_size: self.meta.as_ref().map_or(DESCRIPTOR_MIN_LEN, |meta| meta.desc_size),
        }
    }

    /// `Captured → Exited`: re-issue the map query immediately before
    /// exiting (the map may have changed; the allocation call itself
    /// perturbs memory state) and exit with the *latest* key. A refused
    /// exit means the key went stale; the capture is retried, bounded by
    /// [`MAX_EXIT_ATTEMPTS`].
    ///
    /// Consumes the firmware handle: after success no firmware call of any
    /// kind is expressible, and the buffer is read-only historical data.
    ///
    /// # Errors
    /// See [`MemoryMapCollector::run`].
    pub fn finish(mut self) -> Result<CapturedMemoryMap, MapProtocolError> {
        let mut attempts = 0usize;
        loop {
            let meta = self.refresh()?;
            match self.firmware.exit_boot_services(meta.map_key) {
                Ok(()) => {
                    return Ok(CapturedMemoryMap {
                        buffer: self.buffer,
                        len: meta.map_size,
                        desc_size: meta.desc_size,
                        desc_version: meta.desc_version,
                        key: meta.map_key,
                    });
                }
                Err(status) => {
                    attempts += 1;
                    if attempts >= MAX_EXIT_ATTEMPTS {
                        return Err(MapProtocolError::ExitRefused { attempts, status });
                    }
                    debug!("exit refused with status {status}, retrying with a fresh snapshot");
                }
            }
        }
    }

    /// Query into the buffer, growing it when the map outgrew the previous
    /// snapshot. An outgrown buffer stays with the still-running boot
    /// services and is simply abandoned.
    fn refresh(&mut self) -> Result<MapMeta, MapProtocolError> {
        loop {
            let buf = unsafe { core::slice::from_raw_parts_mut(self.buffer.as_ptr(), self.capacity) };
            match self.firmware.query_memory_map(buf) {
                Ok(meta) => {
                    self.meta = Some(meta);
                    return Ok(meta);
                }
                Err(MapQueryError::BufferTooSmall { required }) => {
                    debug!("memory map grew to {required} bytes, reallocating");
                    self.grow_to(required)?;
                }
                Err(err) => return Err(MapProtocolError::Capture(err)),
            }
        }
    }

    fn grow_to(&mut self, required: usize) -> Result<(), MapProtocolError> {
        let pages = required
            .div_ceil(PAGE_SIZE_4K)
            .max(self.capacity / PAGE_SIZE_4K + 1);
        match self.firmware.allocate_pages(pages) {
            Ok(buffer) => {
                self.buffer = buffer;
                self.capacity = pages * PAGE_SIZE_4K;
                Ok(())
            }
            Err(status) => Err(MapProtocolError::Allocation { pages, status }),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    const DESC_SIZE: usize = 48; // deliberately larger than the natural 40

    fn encode_descriptor(ty: MemoryType, start: u64, pages: u64, attrs: u64) -> Vec<u8> {
        let mut bytes = vec![0u8; DESC_SIZE];
        bytes[0..4].copy_from_slice(&ty.0.to_le_bytes());
        bytes[8..16].copy_from_slice(&start.to_le_bytes());
        bytes[24..32].copy_from_slice(&pages.to_le_bytes());
        bytes[32..40].copy_from_slice(&attrs.to_le_bytes());
        bytes
    }

    /// Scripted firmware double. Hands out keys that advance on every
    /// query and refuses exits whose key is not the latest one issued, plus
    /// a configurable number of unconditional refusals. State is shared so
    /// a test can keep inspecting it after the collector consumed the
    /// double.
    #[derive(Default)]
    struct FakeState {
        map: Vec<u8>,
        next_key: usize,
        latest_key: Option<usize>,
        refuse_exits: usize,
        exited: bool,
        exit_keys_seen: Vec<(usize, usize)>, // (key passed, latest at that time)
        grow_on_query: Option<usize>,        // grow the map by n descriptors once
    }

    #[derive(Clone)]
    struct FakeFirmware {
        state: std::rc::Rc<core::cell::RefCell<FakeState>>,
    }

    impl FakeFirmware {
        fn new(entries: usize) -> Self {
            let mut map = Vec::new();
            for i in 0..entries {
                map.extend_from_slice(&encode_descriptor(
                    MemoryType::CONVENTIONAL,
                    i as u64 * 0x1000,
                    1,
                    0,
                ));
            }
            Self {
                state: std::rc::Rc::new(core::cell::RefCell::new(FakeState {
                    map,
                    next_key: 100,
                    ..FakeState::default()
                })),
            }
        }
    }

    impl FirmwareServices for FakeFirmware {
        fn query_memory_map(&mut self, buf: &mut [u8]) -> Result<MapMeta, MapQueryError> {
            let mut state = self.state.borrow_mut();
            assert!(!state.exited, "firmware call after exit");
            // Growth is scripted to hit the first *capture* query; the
            // zero-length size probe still sees the original size.
            if let Some(extra) = (!buf.is_empty())
                .then(|| state.grow_on_query.take())
                .flatten()
            {
                for i in 0..extra {
                    let desc = encode_descriptor(
                        MemoryType::BOOT_SERVICES_DATA,
                        0x8000_0000 + i as u64 * 0x1000,
                        1,
                        0,
                    );
                    state.map.extend_from_slice(&desc);
                }
            }
            if buf.len() < state.map.len() {
                return Err(MapQueryError::BufferTooSmall {
                    required: state.map.len(),
                });
            }
            buf[..state.map.len()].copy_from_slice(&state.map);
            state.next_key += 1;
            state.latest_key = Some(state.next_key);
            Ok(MapMeta {
                map_size: state.map.len(),
                map_key: MapKey(state.next_key),
                desc_size: DESC_SIZE,
                desc_version: 1,
            })
        }

        fn allocate_pages(&mut self, count: usize) -> Result<NonNull<u8>, FirmwareStatus> {
            let state = self.state.borrow();
            assert!(!state.exited, "firmware call after exit");
            let buf = vec![0u8; count * PAGE_SIZE_4K].leak();
            Ok(NonNull::new(buf.as_mut_ptr()).unwrap())
        }

        fn exit_boot_services(&mut self, key: MapKey) -> Result<(), FirmwareStatus> {
            let mut state = self.state.borrow_mut();
            assert!(!state.exited, "firmware call after exit");
            let latest = state.latest_key.unwrap();
            state.exit_keys_seen.push((key.0, latest));
            if state.refuse_exits > 0 {
                state.refuse_exits -= 1;
                // A refusal invalidates the snapshot.
                state.next_key += 1;
                state.latest_key = Some(state.next_key);
                return Err(FirmwareStatus::INVALID_PARAMETER);
            }
            if key.0 == latest {
                state.exited = true;
                Ok(())
            } else {
                Err(FirmwareStatus::INVALID_PARAMETER)
            }
        }
    }

    #[test]
    fn happy_path_captures_map_verbatim() {
        let firmware = FakeFirmware::new(5);
        let expected = firmware.state.borrow().map.clone();
        let captured = MemoryMapCollector::new(firmware).run().unwrap();
        assert_eq!(captured.entry_count(), 5);
        let view = captured.view();
        for (i, entry) in view.entries().enumerate() {
            assert_eq!(entry.region_type(), MemoryType::CONVENTIONAL);
            assert_eq!(entry.phys_start(), i as u64 * 0x1000);
            assert_eq!(entry.page_count(), 1);
        }
        let bytes = unsafe {
            core::slice::from_raw_parts(captured.to_info().mmap_ptr as *const u8, expected.len())
        };
        assert_eq!(bytes, expected.as_slice());
    }

    #[test]
    fn exit_key_always_comes_from_the_latest_query() {
        let firmware = FakeFirmware::new(3);
        firmware.state.borrow_mut().refuse_exits = 2;
        let state = firmware.state.clone();
        let captured = MemoryMapCollector::new(firmware).run().unwrap();
        let state = state.borrow();
        assert!(state.exited);
        // Every exit call, refused ones included, used the key issued by
        // the query immediately preceding it; none used an older snapshot.
        assert!(!state.exit_keys_seen.is_empty());
        for &(passed, latest_at_call) in &state.exit_keys_seen {
            assert_eq!(passed, latest_at_call);
        }
        assert_eq!(captured.key().0, state.latest_key.unwrap());
    }

    #[test]
    fn stale_key_forces_retry_not_proceed() {
        // The double refuses the first exit outright, simulating a key that
        // went stale between the query and the exit call. The collector
        // must re-query and try again rather than give up or proceed.
        let firmware = FakeFirmware::new(2);
        firmware.state.borrow_mut().refuse_exits = 1;
        let state = firmware.state.clone();
        let captured = MemoryMapCollector::new(firmware).run().unwrap();
        assert_eq!(captured.entry_count(), 2);
        assert_eq!(state.borrow().exit_keys_seen.len(), 2);
    }

    #[test]
    fn persistent_refusal_is_bounded() {
        let firmware = FakeFirmware::new(2);
        firmware.state.borrow_mut().refuse_exits = MAX_EXIT_ATTEMPTS + 2;
        let err = MemoryMapCollector::new(firmware).run().unwrap_err();
        assert!(matches!(
            err,
            MapProtocolError::ExitRefused {
                attempts: MAX_EXIT_ATTEMPTS,
                ..
            }
        ));
    }

    #[test]
    fn grown_map_forces_reallocation() {
        let firmware = FakeFirmware::new(2);
        {
            let mut state = firmware.state.borrow_mut();
            // The map gains many descriptors right after the size probe,
            // enough to overflow the one-page allocation.
            assert!(state.map.len() < PAGE_SIZE_4K);
            state.grow_on_query = Some(PAGE_SIZE_4K / DESC_SIZE + 1);
        }
        let extra = PAGE_SIZE_4K / DESC_SIZE + 1;
        let captured = MemoryMapCollector::new(firmware).run().unwrap();
        assert_eq!(captured.entry_count(), 2 + extra);
    }

    #[test]
    fn size_probe_must_report_too_small() {
        struct BrokenProbe;
        impl FirmwareServices for BrokenProbe {
            fn query_memory_map(&mut self, _buf: &mut [u8]) -> Result<MapMeta, MapQueryError> {
                Ok(MapMeta {
                    map_size: 0,
                    map_key: MapKey(0),
                    desc_size: DESC_SIZE,
                    desc_version: 1,
                })
            }
            fn allocate_pages(&mut self, _count: usize) -> Result<NonNull<u8>, FirmwareStatus> {
                unreachable!("must not allocate before the size is known")
            }
            fn exit_boot_services(&mut self, _key: MapKey) -> Result<(), FirmwareStatus> {
                unreachable!("must not exit before the size is known")
            }
        }
        let err = MemoryMapCollector::new(BrokenProbe).run().unwrap_err();
        assert!(matches!(err, MapProtocolError::SizeProbeSucceeded));
    }

    #[test]
    fn stride_larger_than_natural_layout() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_descriptor(MemoryType::MMIO, 0xF000_0000, 16, 1));
        bytes.extend_from_slice(&encode_descriptor(MemoryType::PERSISTENT, 0x1000, 2, 0));
        let view = MemoryMapView::new(&bytes, DESC_SIZE).unwrap();
        assert_eq!(view.entry_count(), 2);
        let mut entries = view.entries();
        assert_eq!(entries.next().unwrap().region_type(), MemoryType::MMIO);
        let second = entries.next().unwrap();
        assert_eq!(second.region_type(), MemoryType::PERSISTENT);
        assert_eq!(second.phys_end(), 0x1000 + 2 * 4096);
        assert!(entries.next().is_none());
    }

    #[test]
    fn hostile_descriptor_values_saturate_instead_of_panicking() {
        let bytes = encode_descriptor(MemoryType::RESERVED, u64::MAX - 0x1000, u64::MAX, 0);
        let view = MemoryMapView::new(&bytes, DESC_SIZE).unwrap();
        let entry = view.entries().next().unwrap();
        assert_eq!(entry.phys_end(), u64::MAX);
    }

    #[test]
    fn undersized_stride_is_rejected() {
        assert!(MemoryMapView::new(&[0u8; 80], 16).is_none());
    }

    #[test]
    fn attribute_flags_render() {
        extern crate std;
        use std::string::ToString;
        let attrs = MemoryAttributes::new()
            .with_uncacheable(true)
            .with_write_back(true)
            .with_execute_protected(true)
            .with_runtime(true);
        assert_eq!(attrs.to_string(), "U--B----X---t");
    }
}
