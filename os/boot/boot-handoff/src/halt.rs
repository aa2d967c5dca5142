//! # Terminal States
//!
//! The boot hand-off layer never returns to its caller and never raises an
//! error across its boundary. Every unrecoverable condition ends in
//! [`halt`], and the infinite halt loop is the designed terminal state, not
//! a bug.

use log::error;

/// Distinguishable reason codes for a fatal halt. The code survives as a
/// single byte so even the legacy path's bare-screen diagnostic can show
/// it.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum HaltReason {
    /// The top-level system table failed checksum validation.
    SystemTableCorrupt = 1,
    /// The boot-services table failed checksum validation; console output
    /// is unreliable from here on.
    BootServicesCorrupt = 2,
    /// The memory-map collection protocol was violated beyond retry.
    MemoryMapProtocol = 3,
    /// The legacy loader's magic number was wrong.
    NotMultiboot = 4,
    /// The legacy loader's information block was misaligned.
    MisalignedBootInfo = 5,
    /// The kernel entry point returned, violating its contract.
    KernelReturned = 6,
}

impl HaltReason {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::SystemTableCorrupt => "system table failed validation",
            Self::BootServicesCorrupt => "boot services table failed validation",
            Self::MemoryMapProtocol => "memory map protocol violated",
            Self::NotMultiboot => "legacy loader magic number mismatch",
            Self::MisalignedBootInfo => "legacy boot information block misaligned",
            Self::KernelReturned => "kernel entry point returned",
        }
    }
}

/// Stop the processor for good, after a best-effort diagnostic message.
///
/// The message only reaches anyone if a logger is still alive and its sink
/// is still defined; a halt after boot services ended produces no output.
pub fn halt(reason: HaltReason) -> ! {
    error!("halting: {} (code {})", reason.describe(), reason as u8);
    halt_loop()
}

/// The busy-wait itself, shared by every irrecoverable path.
pub fn halt_loop() -> ! {
    loop {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack, preserves_flags));
        }
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        core::hint::spin_loop();
    }
}
