//! The real [`FirmwareServices`] implementation: three function pointers
//! read out of the validated boot-services table at their 64-bit offsets,
//! plus the image handle the exit call wants back.

use boot_handoff::firmware::{
    FirmwareServices, FirmwareStatus, MapKey, MapMeta, MapQueryError,
};
use core::ffi::c_void;
use core::ptr::NonNull;
use uefi::boot::image_handle;

/// Function-pointer offsets inside the boot services table (64-bit layout).
const ALLOCATE_PAGES_OFFSET: usize = 40;
const GET_MEMORY_MAP_OFFSET: usize = 56;
const EXIT_BOOT_SERVICES_OFFSET: usize = 232;

/// `AllocateAnyPages` allocation strategy.
const ALLOCATE_ANY_PAGES: u32 = 0;
/// `LoaderData` region class for the map buffer, so the kernel sees it as
/// claimed memory it must preserve.
const LOADER_DATA: u32 = 2;

type AllocatePagesFn = unsafe extern "efiapi" fn(
    alloc_type: u32,
    memory_type: u32,
    pages: usize,
    memory: *mut u64,
) -> usize;

type GetMemoryMapFn = unsafe extern "efiapi" fn(
    memory_map_size: *mut usize,
    memory_map: *mut u8,
    map_key: *mut usize,
    descriptor_size: *mut usize,
    descriptor_version: *mut u32,
) -> usize;

type ExitBootServicesFn =
    unsafe extern "efiapi" fn(image_handle: *mut c_void, map_key: usize) -> usize;

/// Live boot services, usable until the first successful exit call.
pub struct UefiFirmware {
    image: *mut c_void,
    allocate_pages: AllocatePagesFn,
    get_memory_map: GetMemoryMapFn,
    exit_boot_services: ExitBootServicesFn,
}

impl UefiFirmware {
    /// Bind to the boot services table at `addr`.
    ///
    /// # Safety
    /// `addr` must be the address of a boot services table that passed
    /// checksum validation; the function pointers at the fixed offsets are
    /// read and later called as-is.
    #[must_use]
    pub unsafe fn from_boot_services(addr: u64) -> Self {
        let base = addr as usize as *const u8;
        unsafe {
            Self {
                image: image_handle().as_ptr(),
                allocate_pages: base
                    .add(ALLOCATE_PAGES_OFFSET)
                    .cast::<AllocatePagesFn>()
                    .read_unaligned(),
                get_memory_map: base
                    .add(GET_MEMORY_MAP_OFFSET)
                    .cast::<GetMemoryMapFn>()
                    .read_unaligned(),
                exit_boot_services: base
                    .add(EXIT_BOOT_SERVICES_OFFSET)
                    .cast::<ExitBootServicesFn>()
                    .read_unaligned(),
            }
        }
    }
}

impl FirmwareServices for UefiFirmware {
    fn query_memory_map(&mut self, buf: &mut [u8]) -> Result<MapMeta, MapQueryError> {
        let mut map_size = buf.len();
        let mut map_key = 0usize;
        let mut desc_size = 0usize;
        let mut desc_version = 0u32;
        let status = FirmwareStatus(unsafe {
            (self.get_memory_map)(
                &mut map_size,
                buf.as_mut_ptr(),
                &mut map_key,
                &mut desc_size,
                &mut desc_version,
            )
        });
        if status == FirmwareStatus::BUFFER_TOO_SMALL {
            // map_size now holds the size the firmware would have needed.
            return Err(MapQueryError::BufferTooSmall { required: map_size });
        }
        if status.is_error() {
            return Err(MapQueryError::Firmware(status));
        }
        Ok(MapMeta {
            map_size,
            map_key: MapKey(map_key),
            desc_size,
            desc_version,
        })
    }

    fn allocate_pages(&mut self, count: usize) -> Result<NonNull<u8>, FirmwareStatus> {
        let mut addr = 0u64;
        let status = FirmwareStatus(unsafe {
            (self.allocate_pages)(ALLOCATE_ANY_PAGES, LOADER_DATA, count, &mut addr)
        });
        if status.is_error() {
            return Err(status);
        }
        NonNull::new(addr as usize as *mut u8).ok_or(FirmwareStatus::OUT_OF_RESOURCES)
    }

    fn exit_boot_services(&mut self, key: MapKey) -> Result<(), FirmwareStatus> {
        let status = FirmwareStatus(unsafe { (self.exit_boot_services)(self.image, key.0) });
        if status.is_error() {
            return Err(status);
        }
        Ok(())
    }
}
