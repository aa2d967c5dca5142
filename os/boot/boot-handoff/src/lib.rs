//! # Boot Hand-off Layer
//!
//! The code that runs after a firmware/bootloader environment has
//! transferred control and before the kernel's own scheduler and memory
//! manager take over. It verifies that the firmware-provided tables are
//! trustworthy, discovers the physical memory layout and the platform
//! description tables, probes the processor's feature set on legacy boot
//! paths, and assembles a single validated record that is handed to the
//! kernel entry point.
//!
//! ## Boot Sequence
//!
//! ```text
//! Firmware calls the loader entry
//!         ↓
//! ┌─────────────────────────────────────────────┐
//! │            Boot Hand-off Layer              │
//! ├─────────────────────────────────────────────┤
//! │  1. Table Certification                     │
//! │     • CRC-32 check of system table          │
//! │     • CRC-32 check of boot/runtime services │
//! │  2. Platform Discovery                      │
//! │     • Scan configuration table for ACPI     │
//! │     • Validate RSDP, prefer ACPI 2.0+       │
//! │     • Locate SMBIOS entry points            │
//! │  3. Memory Map Capture                      │
//! │     • Size probe (expected: too small)      │
//! │     • Page allocation, capture query        │
//! │     • Exit boot services with latest key    │
//! │  4. Hand-off                                │
//! │     • Assemble the immutable record         │
//! │     • One-way call into the kernel entry    │
//! └─────────────────────────────────────────────┘
//!         ↓
//! Kernel execution (never returns here)
//! ```
//!
//! On the legacy (non-UEFI) path, steps 1–3 are replaced by loader magic
//! validation and a strictly ordered CPUID capability probe feeding the same
//! record builder.
//!
//! ## Ordering Guarantee
//!
//! All console output and all platform-table discovery must complete before
//! the memory map is finalized and the firmware service environment is
//! exited: console and configuration-table access are defined to become
//! unreliable immediately afterwards. [`mmap::MemoryMapCollector::run`]
//! consumes the firmware handle so that no later call is even expressible.
//!
//! ## Error Model
//!
//! Nothing propagates across this layer's boundary. Every condition is
//! resolved before the hand-off call happens:
//! * **fatal**: [`halt::halt`] with a distinguishable [`halt::HaltReason`];
//! * **degraded-continue**: logged, the record field stays absent;
//! * **expected-non-error**: the "buffer too small" size probe response and
//!   missing CPUID prerequisites are normal protocol steps.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cpu;
pub mod crc32;
pub mod firmware;
pub mod guid;
pub mod halt;
pub mod handoff;
pub mod legacy;
pub mod mmap;
pub mod platform;
pub mod table;
