//! # CPU Feature Probe
//!
//! The firmware-free discovery path used on legacy (non-UEFI) boot. Each
//! capability is only probed once its prerequisite is confirmed present; an
//! absent prerequisite short-circuits every dependent flag to false. That
//! is the expected shape of older hardware, not an error.

use kernel_info::boot::CpuCapabilities;
use log::debug;

/// Standard leaf 1, EDX bit 6: Physical Address Extension.
const LEAF1_EDX_PAE: u32 = 1 << 6;

/// Extended leaf 0x8000_0001, EDX bit 29: 64-bit long mode.
const EXT1_EDX_LONG_MODE: u32 = 1 << 29;

/// Leaf 7 subleaf 0, ECX bit 16: 5-level paging / 57-bit linear addresses.
const LEAF7_ECX_LA57: u32 = 1 << 16;

const EXTENDED_BASE_LEAF: u32 = 0x8000_0000;

/// Register quad returned by one capability query.
#[derive(Copy, Clone, Default, Debug)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// The capability-query instruction, behind a seam so the probe ladder can
/// be exercised against scripted hardware.
pub trait CpuidPort {
    /// Whether the instruction exists at all. Detected through an
    /// architecture-defined mechanism (the EFLAGS.ID toggle on 32-bit
    /// parts) outside this layer's control.
    fn has_cpuid(&self) -> bool;

    /// Execute one query. Only called when [`CpuidPort::has_cpuid`]
    /// returned true.
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult;
}

/// The real instruction, available whenever this layer itself runs in
/// 64-bit mode.
#[cfg(target_arch = "x86_64")]
#[derive(Copy, Clone, Default)]
pub struct HardwareCpuid;

#[cfg(target_arch = "x86_64")]
impl CpuidPort for HardwareCpuid {
    fn has_cpuid(&self) -> bool {
        // Long mode implies CPUID; the EFLAGS.ID toggle only matters for
        // the 32-bit entry stub.
        true
    }

    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        let r = core::arch::x86_64::__cpuid_count(leaf, subleaf);
        CpuidResult {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
        }
    }
}

/// Run the strictly ordered probe ladder.
///
/// Ordering: instruction presence → highest standard leaf ≥ 1 → PAE →
/// extended range implemented → long mode → 5-level paging. Each probe is
/// only meaningful once its prerequisite holds.
#[must_use]
pub fn probe(port: &impl CpuidPort) -> CpuCapabilities {
    let mut caps = CpuCapabilities::NONE;

    if !port.has_cpuid() {
        debug!("capability-query instruction absent, assuming baseline CPU");
        return caps;
    }
    caps.has_cpuid = 1;

    let highest = port.cpuid(0, 0).eax;
    if highest < 1 {
        return caps;
    }

    if port.cpuid(1, 0).edx & LEAF1_EDX_PAE == 0 {
        return caps;
    }
    caps.has_pae = 1;

    // The extended range counts as implemented only when the reported
    // maximum is non-trivial and not a plain echo of the input leaf. This
    // is a commonly used heuristic, not something the instruction's
    // specification guarantees.
    let highest_ext = port.cpuid(EXTENDED_BASE_LEAF, 0).eax;
    if highest_ext <= EXTENDED_BASE_LEAF {
        return caps;
    }

    if port.cpuid(EXTENDED_BASE_LEAF + 1, 0).edx & EXT1_EDX_LONG_MODE == 0 {
        return caps;
    }
    caps.has_long_mode = 1;

    if highest >= 7 && port.cpuid(7, 0).ecx & LEAF7_ECX_LA57 != 0 {
        caps.has_la57 = 1;
    }

    debug!(
        "cpu capabilities: pae={} long_mode={} la57={}",
        caps.has_pae, caps.has_long_mode, caps.has_la57
    );
    caps
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    /// Scripted CPU that records every leaf it is asked about.
    struct FakeCpu {
        present: bool,
        max_leaf: u32,
        max_ext_leaf: u32, // what leaf 0x8000_0000 reports in EAX
        pae: bool,
        long_mode: bool,
        la57: bool,
        queried: RefCell<Vec<u32>>,
    }

    impl FakeCpu {
        fn modern() -> Self {
            Self {
                present: true,
                max_leaf: 0x1F,
                max_ext_leaf: 0x8000_0008,
                pae: true,
                long_mode: true,
                la57: true,
                queried: RefCell::new(Vec::new()),
            }
        }

        fn asked_about(&self, leaf: u32) -> bool {
            self.queried.borrow().contains(&leaf)
        }
    }

    impl CpuidPort for FakeCpu {
        fn has_cpuid(&self) -> bool {
            self.present
        }

        fn cpuid(&self, leaf: u32, _subleaf: u32) -> CpuidResult {
            assert!(self.present, "cpuid executed on a CPU without it");
            self.queried.borrow_mut().push(leaf);
            match leaf {
                0 => CpuidResult {
                    eax: self.max_leaf,
                    ..CpuidResult::default()
                },
                1 => CpuidResult {
                    edx: if self.pae { LEAF1_EDX_PAE } else { 0 },
                    ..CpuidResult::default()
                },
                7 => CpuidResult {
                    ecx: if self.la57 { LEAF7_ECX_LA57 } else { 0 },
                    ..CpuidResult::default()
                },
                0x8000_0000 => CpuidResult {
                    eax: self.max_ext_leaf,
                    ..CpuidResult::default()
                },
                0x8000_0001 => CpuidResult {
                    edx: if self.long_mode { EXT1_EDX_LONG_MODE } else { 0 },
                    ..CpuidResult::default()
                },
                _ => CpuidResult::default(),
            }
        }
    }

    #[test]
    fn no_cpuid_means_no_flags_and_no_queries() {
        let cpu = FakeCpu {
            present: false,
            ..FakeCpu::modern()
        };
        let caps = probe(&cpu);
        assert_eq!(caps, CpuCapabilities::NONE);
        assert!(cpu.queried.borrow().is_empty());
    }

    #[test]
    fn pae_absent_short_circuits_extended_leaves() {
        let cpu = FakeCpu {
            pae: false,
            ..FakeCpu::modern()
        };
        let caps = probe(&cpu);
        assert_eq!(caps.has_cpuid, 1);
        assert_eq!(caps.has_pae, 0);
        assert_eq!(caps.has_long_mode, 0);
        assert_eq!(caps.has_la57, 0);
        assert!(!cpu.asked_about(0x8000_0000));
        assert!(!cpu.asked_about(0x8000_0001));
        assert!(!cpu.asked_about(7));
    }

    #[test]
    fn echoed_extended_leaf_counts_as_unimplemented() {
        let cpu = FakeCpu {
            max_ext_leaf: 0x8000_0000, // plain echo, extended range missing
            ..FakeCpu::modern()
        };
        let caps = probe(&cpu);
        assert_eq!(caps.has_pae, 1);
        assert_eq!(caps.has_long_mode, 0);
        assert!(!cpu.asked_about(0x8000_0001));
    }

    #[test]
    fn long_mode_absent_skips_paging_depth() {
        let cpu = FakeCpu {
            long_mode: false,
            ..FakeCpu::modern()
        };
        let caps = probe(&cpu);
        assert_eq!(caps.has_long_mode, 0);
        assert_eq!(caps.has_la57, 0);
        assert!(!cpu.asked_about(7));
    }

    #[test]
    fn full_ladder_sets_all_flags() {
        let cpu = FakeCpu::modern();
        let caps = probe(&cpu);
        assert_eq!(
            caps,
            CpuCapabilities {
                has_cpuid: 1,
                has_pae: 1,
                has_long_mode: 1,
                has_la57: 1,
            }
        );
    }

    #[test]
    fn old_cpu_without_leaf_one() {
        let cpu = FakeCpu {
            max_leaf: 0,
            ..FakeCpu::modern()
        };
        let caps = probe(&cpu);
        assert_eq!(caps.has_cpuid, 1);
        assert_eq!(caps.has_pae, 0);
        assert!(!cpu.asked_about(1));
    }
}
