//! # CRC-32 (IEEE 802.3)
//!
//! The cyclic redundancy check used by the firmware to protect its
//! fixed-layout tables: reflected polynomial `0xEDB8_8320`, initial value
//! all-ones, final value complemented. This is the conventional "CRC-32"
//! shared with Ethernet and gzip, so the published check value applies:
//! `crc32(b"123456789") == 0xCBF4_3926`.

/// Reflected form of the IEEE 802.3 generator polynomial.
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// 256-entry lookup table, one round of the bitwise algorithm per byte value.
const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut crc = n as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[n] = crc;
        n += 1;
    }
    table
}

/// Incremental CRC-32 hasher.
///
/// Exists so a caller can checksum a logical byte sequence that is not
/// contiguous in memory, e.g. a table header whose stored checksum field
/// must be treated as zero without mutating the real table.
#[derive(Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    #[must_use]
    pub const fn new() -> Self {
        Self { state: !0 }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let mut crc = self.state;
        for &byte in bytes {
            let index = (crc ^ u32::from(byte)) & 0xFF;
            crc = (crc >> 8) ^ TABLE[index as usize];
        }
        self.state = crc;
    }

    #[must_use]
    pub const fn finalize(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot CRC-32 of a byte sequence. Deterministic, no failure mode; the
/// empty input yields `0`.
#[must_use]
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(bytes);
    hasher.finalize()
}
