//! # Kernel Boot Interface
//!
//! Stable ABI definitions shared between the boot hand-off layer and the
//! kernel proper. The bootloader (firmware-services or legacy) resolves the
//! machine state into a single [`boot::BootHandoffRecord`] and passes it, by
//! reference, through the one-way call into the kernel entry point.
//!
//! All structures crossing that boundary are `#[repr(C)]` and prefer
//! fixed-size integers, so both sides agree on layout regardless of how
//! either was compiled.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
