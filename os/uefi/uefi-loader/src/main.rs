//! # UEFI Boot Hand-off Application
//!
//! The firmware-services boot path: certify the firmware's own tables,
//! resolve the platform description pointers, capture the physical memory
//! map, leave the firmware service environment and hand one immutable
//! record to the kernel entry point.
//!
//! The sequence is load-bearing:
//!
//! ```text
//! UEFI Firmware Boot
//!         ↓
//! ┌──────────────────────────────────────────────┐
//! │             uefi-loader                      │
//! ├──────────────────────────────────────────────┤
//! │  1. Console + allocator up                   │
//! │  2. Validate system / boot / runtime tables  │
//! │  3. Locate ACPI + SMBIOS roots               │
//! │  4. Leak the hand-off record (heap is only   │
//! │     legal while boot services live)          │
//! │  5. Capture memory map, report it, silence   │
//! │     the console, exit boot services          │
//! │  6. Patch map fields, enter the kernel       │
//! └──────────────────────────────────────────────┘
//!         ↓
//! Kernel Execution
//! ```
//!
//! Every failure is terminal: a corrupt system or boot-services table halts
//! with a distinguishable reason code, a corrupt runtime-services table
//! aborts back through the firmware while the console is still trustworthy,
//! and a violated memory-map protocol halts. Nothing returns to the caller
//! after step 5.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
#![allow(unsafe_code)]
extern crate alloc;

mod firmware;
mod logger;

use crate::firmware::UefiFirmware;
use crate::logger::BootConsoleLogger;
use alloc::boxed::Box;
use boot_handoff::halt::{HaltReason, halt};
use boot_handoff::handoff::{BootHandoffBuilder, enter_kernel};
use boot_handoff::mmap::{self, MemoryMapCollector};
use boot_handoff::platform::{self, IdentityMap};
use boot_handoff::table::{SystemTableView, table_at, validate_table};
use kernel_info::boot::KernelEntryFn;
use log::{LevelFilter, debug, error, info};
use uefi::prelude::*;

/// Physical address the kernel image is linked to run at. The platform's
/// boot flow places the image there before this application runs.
const KERNEL_ENTRY_ADDR: usize = 0x0010_0000;

#[entry]
fn efi_main() -> Status {
    // Console and allocator first; nothing below reports without them.
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }
    let logger = BootConsoleLogger::new(LevelFilter::Debug);
    let Ok(logger) = logger.init() else {
        return Status::UNSUPPORTED;
    };
    info!("boot hand-off layer up, console live");

    let Some(system_table) = uefi::table::system_table_raw() else {
        return Status::UNSUPPORTED;
    };
    let system_addr = system_table.as_ptr() as usize as u64;

    // Nothing in a table is trusted before its checksum holds, the system
    // table first since every other address comes out of it.
    let Some(system) = (unsafe { SystemTableView::from_addr(system_addr) }) else {
        halt(HaltReason::SystemTableCorrupt);
    };
    if !validate_table(system.header()) {
        halt(HaltReason::SystemTableCorrupt);
    }
    debug!(
        "system table at {system_addr:#x} validated, firmware revision {:#x}",
        system.firmware_revision()
    );

    let boot_services_addr = system.boot_services_addr();
    match unsafe { table_at(boot_services_addr) } {
        Some(table) if validate_table(table) => {}
        _ => halt(HaltReason::BootServicesCorrupt),
    }

    // A corrupt runtime-services table poisons the post-boot environment
    // but the console is still fine: report and abort through the
    // firmware's own exit path instead of halting.
    match unsafe { table_at(system.runtime_services_addr()) } {
        Some(table) if validate_table(table) => {}
        _ => {
            error!("runtime services table failed validation, aborting boot");
            return Status::ABORTED;
        }
    }

    // Platform discovery must finish while the configuration list is still
    // firmware-owned memory; pre-exit everything is identity mapped.
    let phys = IdentityMap;
    let entries = unsafe {
        platform::config_entries(&phys, system.config_table_addr(), system.config_entry_count())
    };
    let located = platform::locate(&phys, entries);

    // Heap use is only legal before the exit; leak the record now and patch
    // the map fields in right before the hand-off.
    let record = Box::leak(Box::new(
        BootHandoffBuilder::firmware_services()
            .with_platform(&located)
            .build(),
    ));

    let services = unsafe { UefiFirmware::from_boot_services(boot_services_addr) };
    let captured = match MemoryMapCollector::new(services).capture() {
        Ok(captured) => captured,
        Err(err) => {
            error!("memory map capture failed: {err}");
            halt(HaltReason::MemoryMapProtocol);
        }
    };
    mmap::report(&captured.view());

    // Last console output above. The exit happens inside finish(), so the
    // logger goes mute first.
    logger.exit_boot_services();
    let Ok(captured) = captured.finish() else {
        halt(HaltReason::MemoryMapProtocol);
    };
    record.mmap = captured.to_info();

    // SAFETY: the image at the kernel load address honors the entry
    // contract; the record outlives the call because it was leaked.
    let entry = unsafe { core::mem::transmute::<usize, KernelEntryFn>(KERNEL_ENTRY_ADDR) };
    enter_kernel(entry, record)
}
