//! # Configuration Table Class Identifiers
//!
//! The firmware tags every configuration-table entry with a 128-bit class
//! identifier. Entries whose identifier matches none of the classes we know
//! are ignored, not an error.

use core::fmt;

/// A 128-bit class identifier in the firmware's mixed-endian layout: the
/// first three groups are little-endian integers, the last eight bytes are
/// stored as-is.
#[repr(C)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    #[must_use]
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Read an identifier out of raw table bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4: [
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ],
        }
    }

    /// Raw wire form, the inverse of [`Guid::from_bytes`].
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        let d1 = self.data1.to_le_bytes();
        let d2 = self.data2.to_le_bytes();
        let d3 = self.data3.to_le_bytes();
        [
            d1[0],
            d1[1],
            d1[2],
            d1[3],
            d2[0],
            d2[1],
            d3[0],
            d3[1],
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        ]
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// ACPI 1.0 RSDP configuration-table class.
pub const ACPI_GUID: Guid = Guid::new(
    0xeb9d_2d30,
    0x2d88,
    0x11d3,
    [0x9a, 0x16, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d],
);

/// ACPI 2.0+ RSDP configuration-table class.
pub const ACPI2_GUID: Guid = Guid::new(
    0x8868_e871,
    0xe4f1,
    0x11d3,
    [0xbc, 0x22, 0x00, 0x80, 0xc7, 0x3c, 0x88, 0x81],
);

/// Legacy (32-bit) SMBIOS entry point class.
pub const SMBIOS_GUID: Guid = Guid::new(
    0xeb9d_2d31,
    0x2d88,
    0x11d3,
    [0x9a, 0x16, 0x00, 0x90, 0x27, 0x3f, 0xc1, 0x4d],
);

/// SMBIOS 3 (64-bit) entry point class.
pub const SMBIOS3_GUID: Guid = Guid::new(
    0xf2fd_1544,
    0x9794,
    0x4a2c,
    [0x99, 0x2e, 0xe5, 0xbb, 0xcf, 0x20, 0xe3, 0x94],
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        let bytes = ACPI2_GUID.to_bytes();
        assert_eq!(Guid::from_bytes(bytes), ACPI2_GUID);
    }

    #[test]
    fn display_is_canonical() {
        extern crate alloc;
        use alloc::string::ToString;
        assert_eq!(
            ACPI2_GUID.to_string(),
            "8868e871-e4f1-11d3-bc22-0080c73c8881"
        );
    }

    #[test]
    fn known_classes_are_distinct() {
        let all = [ACPI_GUID, ACPI2_GUID, SMBIOS_GUID, SMBIOS3_GUID];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                assert_eq!(i == j, a == b);
            }
        }
    }
}
