// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content masks.
//!
//! Content masks declare which optional sections a producer wants on the wire.
//! They are encoding neutral: each encoder derives its own wire flags from them
//! (see [`crate::uadp::flags`]). The bit layout of the low bits matches the
//! OPC UA UADP stack masks so that stack configuration can be mapped directly.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unknown flag name in a configuration mask.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} flag: {name}")]
pub struct UnknownFlag {
    pub kind: &'static str,
    pub name: String,
}

/// Generate a mask newtype with named bit constants.
///
/// Each generated type gets `from_bits`/`bits`, set operations, `BitOr`/`BitAnd`,
/// a `Debug` impl listing the set flag names and name parsing for configuration.
macro_rules! content_flags {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$fmeta:meta])* $flag:ident = $bit:expr, $label:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            /// No flag set.
            pub const NONE: $name = $name(0);

            $( $(#[$fmeta])* pub const $flag: $name = $name($bit); )*

            const NAMES: &'static [(&'static str, $name)] = &[ $( ($label, $name::$flag), )* ];

            #[must_use]
            pub const fn from_bits(bits: u32) -> Self {
                $name(bits)
            }

            #[must_use]
            pub const fn bits(&self) -> u32 {
                self.0
            }

            #[must_use]
            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// True if every bit of `other` is set.
            #[must_use]
            pub const fn contains(&self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            /// True if any bit of `other` is set.
            #[must_use]
            pub const fn intersects(&self, other: $name) -> bool {
                (self.0 & other.0) != 0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: $name) {
                self.0 &= !other.0;
            }

            pub fn set(&mut self, other: $name, on: bool) {
                if on {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            #[must_use]
            pub const fn or(self, other: $name) -> Self {
                $name(self.0 | other.0)
            }

            #[must_use]
            pub const fn and(self, other: $name) -> Self {
                $name(self.0 & other.0)
            }

            /// Names of the set flags, in bit order.
            pub fn names(&self) -> Vec<&'static str> {
                Self::NAMES
                    .iter()
                    .filter(|(_, flag)| self.contains(*flag))
                    .map(|(label, _)| *label)
                    .collect()
            }

            /// Combine flags given by name (case-insensitive).
            pub fn from_names<I, S>(names: I) -> Result<Self, UnknownFlag>
            where
                I: IntoIterator<Item = S>,
                S: AsRef<str>,
            {
                names
                    .into_iter()
                    .try_fold(Self::NONE, |acc, name| -> Result<Self, UnknownFlag> {
                        Ok(acc | name.as_ref().parse::<$name>()?)
                    })
            }
        }

        impl FromStr for $name {
            type Err = UnknownFlag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::NAMES
                    .iter()
                    .find(|(label, _)| label.eq_ignore_ascii_case(s))
                    .map(|(_, flag)| *flag)
                    .ok_or_else(|| UnknownFlag {
                        kind: $kind,
                        name: s.to_string(),
                    })
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.names().join(" | "))
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                self.or(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.insert(rhs);
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                self.and(rhs)
            }
        }
    };
}

content_flags! {
    /// Network message content mask.
    NetworkMessageContentFlags, "network message" {
        PUBLISHER_ID = 1 << 0, "PublisherId";
        GROUP_HEADER = 1 << 1, "GroupHeader";
        WRITER_GROUP_ID = 1 << 2, "WriterGroupId";
        GROUP_VERSION = 1 << 3, "GroupVersion";
        NETWORK_MESSAGE_NUMBER = 1 << 4, "NetworkMessageNumber";
        SEQUENCE_NUMBER = 1 << 5, "SequenceNumber";
        PAYLOAD_HEADER = 1 << 6, "PayloadHeader";
        TIMESTAMP = 1 << 7, "Timestamp";
        PICOSECONDS = 1 << 8, "Picoseconds";
        DATASET_CLASS_ID = 1 << 9, "DataSetClassId";
        PROMOTED_FIELDS = 1 << 10, "PromotedFields";
        /// JSON: write the network message envelope.
        NETWORK_MESSAGE_HEADER = 1 << 11, "NetworkMessageHeader";
        /// JSON: write the dataset message header fields.
        DATASET_MESSAGE_HEADER = 1 << 12, "DataSetMessageHeader";
        SINGLE_DATASET_MESSAGE = 1 << 13, "SingleDataSetMessage";
    }
}

content_flags! {
    /// Dataset message content mask.
    DataSetMessageContentFlags, "dataset message" {
        TIMESTAMP = 1 << 0, "Timestamp";
        PICOSECONDS = 1 << 1, "PicoSeconds";
        STATUS = 1 << 2, "Status";
        MAJOR_VERSION = 1 << 3, "MajorVersion";
        MINOR_VERSION = 1 << 4, "MinorVersion";
        SEQUENCE_NUMBER = 1 << 5, "SequenceNumber";
        DATASET_WRITER_ID = 1 << 6, "DataSetWriterId";
        METADATA_VERSION = 1 << 7, "MetaDataVersion";
        MESSAGE_TYPE = 1 << 8, "MessageType";
        DATASET_WRITER_NAME = 1 << 9, "DataSetWriterName";
        REVERSIBLE_FIELD_ENCODING = 1 << 10, "ReversibleFieldEncoding";
    }
}

content_flags! {
    /// Dataset field content mask (which DataValue sub-fields are carried).
    DataSetFieldContentFlags, "field" {
        STATUS_CODE = 1 << 0, "StatusCode";
        SOURCE_TIMESTAMP = 1 << 1, "SourceTimestamp";
        SERVER_TIMESTAMP = 1 << 2, "ServerTimestamp";
        SOURCE_PICOSECONDS = 1 << 3, "SourcePicoSeconds";
        SERVER_PICOSECONDS = 1 << 4, "ServerPicoSeconds";
        RAW_DATA = 1 << 5, "RawData";
    }
}

// ============================================================================
// OPC UA stack mask conversions
// ============================================================================

/// Bits shared between the unified network mask and the UADP stack mask.
const UADP_NETWORK_BITS: u32 = 0x7FF;

/// Bits shared between the unified dataset mask and the UADP stack mask.
const UADP_DATASET_BITS: u32 = 0x3F;

// JSON stack network mask bits.
const JSON_NM_NETWORK_MESSAGE_HEADER: u32 = 1 << 0;
const JSON_NM_DATASET_MESSAGE_HEADER: u32 = 1 << 1;
const JSON_NM_SINGLE_DATASET_MESSAGE: u32 = 1 << 2;
const JSON_NM_PUBLISHER_ID: u32 = 1 << 3;
const JSON_NM_DATASET_CLASS_ID: u32 = 1 << 4;

const JSON_NETWORK_MAP: &[(u32, NetworkMessageContentFlags)] = &[
    (
        JSON_NM_NETWORK_MESSAGE_HEADER,
        NetworkMessageContentFlags::NETWORK_MESSAGE_HEADER,
    ),
    (
        JSON_NM_DATASET_MESSAGE_HEADER,
        NetworkMessageContentFlags::DATASET_MESSAGE_HEADER,
    ),
    (
        JSON_NM_SINGLE_DATASET_MESSAGE,
        NetworkMessageContentFlags::SINGLE_DATASET_MESSAGE,
    ),
    (JSON_NM_PUBLISHER_ID, NetworkMessageContentFlags::PUBLISHER_ID),
    (
        JSON_NM_DATASET_CLASS_ID,
        NetworkMessageContentFlags::DATASET_CLASS_ID,
    ),
];

const JSON_DATASET_MAP: &[(u32, DataSetMessageContentFlags)] = &[
    (1 << 0, DataSetMessageContentFlags::DATASET_WRITER_ID),
    (1 << 1, DataSetMessageContentFlags::METADATA_VERSION),
    (1 << 2, DataSetMessageContentFlags::SEQUENCE_NUMBER),
    (1 << 3, DataSetMessageContentFlags::TIMESTAMP),
    (1 << 4, DataSetMessageContentFlags::STATUS),
    (1 << 5, DataSetMessageContentFlags::MESSAGE_TYPE),
    (1 << 6, DataSetMessageContentFlags::DATASET_WRITER_NAME),
    (1 << 7, DataSetMessageContentFlags::REVERSIBLE_FIELD_ENCODING),
];

impl NetworkMessageContentFlags {
    /// Map a `UadpNetworkMessageContentMask` value.
    #[must_use]
    pub const fn from_uadp_stack(mask: u32) -> Self {
        Self(mask & UADP_NETWORK_BITS)
    }

    #[must_use]
    pub const fn to_uadp_stack(self) -> u32 {
        self.0 & UADP_NETWORK_BITS
    }

    /// Map a `JsonNetworkMessageContentMask` value.
    #[must_use]
    pub fn from_json_stack(mask: u32) -> Self {
        JSON_NETWORK_MAP
            .iter()
            .filter(|(bit, _)| mask & bit != 0)
            .fold(Self::NONE, |acc, (_, flag)| acc | *flag)
    }

    /// Publisher and class id only exist inside a network message header.
    #[must_use]
    pub fn to_json_stack(self) -> u32 {
        let mut result = 0;
        if self.contains(Self::NETWORK_MESSAGE_HEADER) {
            result |= JSON_NM_NETWORK_MESSAGE_HEADER;
            if self.contains(Self::PUBLISHER_ID) {
                result |= JSON_NM_PUBLISHER_ID;
            }
            if self.contains(Self::DATASET_CLASS_ID) {
                result |= JSON_NM_DATASET_CLASS_ID;
            }
        }
        if self.contains(Self::DATASET_MESSAGE_HEADER) {
            result |= JSON_NM_DATASET_MESSAGE_HEADER;
        }
        if self.contains(Self::SINGLE_DATASET_MESSAGE) {
            result |= JSON_NM_SINGLE_DATASET_MESSAGE;
        }
        result
    }

    /// Any of the group header fields.
    #[must_use]
    pub const fn has_group_fields(&self) -> bool {
        self.intersects(
            Self::WRITER_GROUP_ID
                .or(Self::GROUP_VERSION)
                .or(Self::NETWORK_MESSAGE_NUMBER)
                .or(Self::SEQUENCE_NUMBER),
        )
    }
}

impl DataSetMessageContentFlags {
    /// Map a `UadpDataSetMessageContentMask` value.
    #[must_use]
    pub const fn from_uadp_stack(mask: u32) -> Self {
        Self(mask & UADP_DATASET_BITS)
    }

    #[must_use]
    pub const fn to_uadp_stack(self) -> u32 {
        self.0 & UADP_DATASET_BITS
    }

    /// Map a `JsonDataSetMessageContentMask` value.
    #[must_use]
    pub fn from_json_stack(mask: u32) -> Self {
        JSON_DATASET_MAP
            .iter()
            .filter(|(bit, _)| mask & bit != 0)
            .fold(Self::NONE, |acc, (_, flag)| acc | *flag)
    }

    #[must_use]
    pub fn to_json_stack(self) -> u32 {
        JSON_DATASET_MAP
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .fold(0, |acc, (bit, _)| acc | bit)
    }
}

impl DataSetFieldContentFlags {
    /// The stack `DataSetFieldContentMask` uses the same bit layout.
    #[must_use]
    pub const fn from_stack(mask: u32) -> Self {
        Self(mask & 0x3F)
    }

    #[must_use]
    pub const fn to_stack(self) -> u32 {
        self.0
    }

    /// All DataValue sub-fields, without RawData.
    #[must_use]
    pub const fn data_value_fields() -> Self {
        Self::STATUS_CODE
            .or(Self::SOURCE_TIMESTAMP)
            .or(Self::SERVER_TIMESTAMP)
            .or(Self::SOURCE_PICOSECONDS)
            .or(Self::SERVER_PICOSECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_insert() {
        let mut mask = NetworkMessageContentFlags::PUBLISHER_ID;
        assert!(mask.contains(NetworkMessageContentFlags::PUBLISHER_ID));
        assert!(!mask.contains(NetworkMessageContentFlags::PAYLOAD_HEADER));

        mask.insert(NetworkMessageContentFlags::PAYLOAD_HEADER);
        assert_eq!(mask.bits(), 0x41);

        mask.remove(NetworkMessageContentFlags::PUBLISHER_ID);
        assert_eq!(mask, NetworkMessageContentFlags::PAYLOAD_HEADER);
    }

    #[test]
    fn test_uadp_stack_mapping_is_identity_on_low_bits() {
        let mask = NetworkMessageContentFlags::from_uadp_stack(0x3FF);
        assert!(mask.contains(NetworkMessageContentFlags::DATASET_CLASS_ID));
        assert!(!mask.contains(NetworkMessageContentFlags::PROMOTED_FIELDS));
        assert_eq!(mask.to_uadp_stack(), 0x3FF);

        let ds = DataSetMessageContentFlags::from_uadp_stack(0x3F);
        assert_eq!(
            ds,
            DataSetMessageContentFlags::TIMESTAMP
                | DataSetMessageContentFlags::PICOSECONDS
                | DataSetMessageContentFlags::STATUS
                | DataSetMessageContentFlags::MAJOR_VERSION
                | DataSetMessageContentFlags::MINOR_VERSION
                | DataSetMessageContentFlags::SEQUENCE_NUMBER
        );
    }

    #[test]
    fn test_json_network_stack_mapping() {
        // PublisherId | NetworkMessageHeader | DataSetMessageHeader | DataSetClassId
        let mask = NetworkMessageContentFlags::from_json_stack(0x1B);
        assert!(mask.contains(NetworkMessageContentFlags::NETWORK_MESSAGE_HEADER));
        assert!(mask.contains(NetworkMessageContentFlags::DATASET_MESSAGE_HEADER));
        assert!(mask.contains(NetworkMessageContentFlags::PUBLISHER_ID));
        assert!(mask.contains(NetworkMessageContentFlags::DATASET_CLASS_ID));
        assert!(!mask.contains(NetworkMessageContentFlags::SINGLE_DATASET_MESSAGE));
        assert_eq!(mask.to_json_stack(), 0x1B);
    }

    #[test]
    fn test_json_network_stack_drops_publisher_without_header() {
        let mask = NetworkMessageContentFlags::PUBLISHER_ID
            | NetworkMessageContentFlags::DATASET_MESSAGE_HEADER;
        assert_eq!(mask.to_json_stack(), JSON_NM_DATASET_MESSAGE_HEADER);
    }

    #[test]
    fn test_json_dataset_stack_mapping() {
        let mask = DataSetMessageContentFlags::from_json_stack(0x7F);
        assert!(mask.contains(DataSetMessageContentFlags::DATASET_WRITER_NAME));
        assert!(mask.contains(DataSetMessageContentFlags::MESSAGE_TYPE));
        assert!(!mask.contains(DataSetMessageContentFlags::REVERSIBLE_FIELD_ENCODING));
        assert_eq!(mask.to_json_stack(), 0x7F);
    }

    #[test]
    fn test_parse_names() {
        let mask =
            DataSetFieldContentFlags::from_names(["statuscode", "SourceTimestamp"]).unwrap();
        assert_eq!(mask.bits(), 0x03);

        let err = DataSetFieldContentFlags::from_names(["Bogus"]).unwrap_err();
        assert_eq!(err.name, "Bogus");
        assert_eq!(err.to_string(), "unknown field flag: Bogus");
    }

    #[test]
    fn test_debug_lists_names() {
        let mask = DataSetFieldContentFlags::RAW_DATA | DataSetFieldContentFlags::STATUS_CODE;
        assert_eq!(
            format!("{:?}", mask),
            "DataSetFieldContentFlags(StatusCode | RawData)"
        );
    }

    #[test]
    fn test_group_fields() {
        assert!(!NetworkMessageContentFlags::GROUP_HEADER.has_group_fields());
        assert!(NetworkMessageContentFlags::SEQUENCE_NUMBER.has_group_fields());
    }
}
