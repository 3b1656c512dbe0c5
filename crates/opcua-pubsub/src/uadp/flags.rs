// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UADP wire flag bytes and their derivation from content masks.
//!
//! Flags are derived by pure functions at the start of every encode (and for
//! every emitted frame, since chunk mode changes ExtendedFlags2). Nothing is
//! cached between calls.

use crate::binary::codec::{read_string, write_string};
use crate::binary::{BinaryReader, BinaryWriter};
use crate::config::{CodecContext, UADP_VERSION};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::{DataSetFieldContentFlags, DataSetMessageContentFlags, NetworkMessageContentFlags};
use crate::message::{DataSetMessage, MessageType};

/// Generate a wire flag byte newtype.
macro_rules! wire_flags {
    ($(#[$meta:meta])* $name:ident { $($flag:ident = $bit:expr;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub u8);

        impl $name {
            $( pub const $flag: u8 = $bit; )*

            pub const fn bits(&self) -> u8 {
                self.0
            }

            pub const fn has(&self, bit: u8) -> bool {
                self.0 & bit != 0
            }

            pub fn set(&mut self, bit: u8, on: bool) {
                if on {
                    self.0 |= bit;
                } else {
                    self.0 &= !bit;
                }
            }
        }
    };
}

wire_flags! {
    /// First byte of every UADP message.
    UadpFlags {
        VERSION_MASK = 0x0F;
        PUBLISHER_ID = 0x10;
        GROUP_HEADER = 0x20;
        PAYLOAD_HEADER = 0x40;
        EXTENDED_FLAGS1 = 0x80;
    }
}

wire_flags! {
    ExtendedFlags1 {
        PUBLISHER_ID_TYPE_MASK = 0x07;
        DATASET_CLASS_ID = 0x08;
        SECURITY = 0x10;
        TIMESTAMP = 0x20;
        PICOSECONDS = 0x40;
        EXTENDED_FLAGS2 = 0x80;
    }
}

wire_flags! {
    ExtendedFlags2 {
        CHUNK = 0x01;
        PROMOTED_FIELDS = 0x02;
        DISCOVERY_PROBE = 0x04;
        DISCOVERY_ANNOUNCEMENT = 0x08;
        MESSAGE_TYPE_MASK = 0x1C;
    }
}

wire_flags! {
    GroupFlags {
        WRITER_GROUP_ID = 0x01;
        GROUP_VERSION = 0x02;
        NETWORK_MESSAGE_NUMBER = 0x04;
        SEQUENCE_NUMBER = 0x08;
    }
}

wire_flags! {
    SecurityFlags {
        SIGNED = 0x01;
        ENCRYPTED = 0x02;
        FOOTER = 0x04;
        FORCE_KEY_RESET = 0x08;
    }
}

wire_flags! {
    DataSetFlags1 {
        VALID = 0x01;
        RAW_DATA = 0x02;
        DATA_VALUE = 0x04;
        FIELD_ENCODING_MASK = 0x06;
        SEQUENCE_NUMBER = 0x08;
        STATUS = 0x10;
        MAJOR_VERSION = 0x20;
        MINOR_VERSION = 0x40;
        DATASET_FLAGS2 = 0x80;
    }
}

wire_flags! {
    DataSetFlags2 {
        MESSAGE_TYPE_MASK = 0x0F;
        TIMESTAMP = 0x10;
        PICOSECONDS = 0x20;
    }
}

// ============================================================================
// Publisher id
// ============================================================================

/// Wire type of the publisher id (ExtendedFlags1 bits 0-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherIdType {
    Byte = 0,
    UInt16 = 1,
    UInt32 = 2,
    UInt64 = 3,
    String = 4,
}

impl PublisherIdType {
    /// Narrowest numeric type the id parses as, else String.
    pub fn detect(id: &str) -> Self {
        if id.parse::<u8>().is_ok() {
            PublisherIdType::Byte
        } else if id.parse::<u16>().is_ok() {
            PublisherIdType::UInt16
        } else if id.parse::<u32>().is_ok() {
            PublisherIdType::UInt32
        } else if id.parse::<u64>().is_ok() {
            PublisherIdType::UInt64
        } else {
            PublisherIdType::String
        }
    }

    pub fn from_bits(bits: u8) -> DecodeResult<Self> {
        Ok(match bits & ExtendedFlags1::PUBLISHER_ID_TYPE_MASK {
            0 => PublisherIdType::Byte,
            1 => PublisherIdType::UInt16,
            2 => PublisherIdType::UInt32,
            3 => PublisherIdType::UInt64,
            4 => PublisherIdType::String,
            other => {
                return Err(DecodeError::InvalidFlags(format!(
                    "reserved publisher id type {}",
                    other
                )))
            }
        })
    }
}

fn parse_id<T: std::str::FromStr>(id: &str) -> EncodeResult<T> {
    id.parse::<T>()
        .map_err(|_| EncodeError::InvalidPublisherId(id.to_string()))
}

pub fn write_publisher_id(w: &mut BinaryWriter, id_type: PublisherIdType, id: &str) -> EncodeResult<()> {
    match id_type {
        PublisherIdType::Byte => w.write_u8(parse_id(id)?),
        PublisherIdType::UInt16 => w.write_u16(parse_id(id)?),
        PublisherIdType::UInt32 => w.write_u32(parse_id(id)?),
        PublisherIdType::UInt64 => w.write_u64(parse_id(id)?),
        PublisherIdType::String => write_string(w, Some(id))?,
    }
    Ok(())
}

pub fn read_publisher_id(
    r: &mut BinaryReader<'_>,
    ctx: &CodecContext,
    id_type: PublisherIdType,
) -> DecodeResult<String> {
    Ok(match id_type {
        PublisherIdType::Byte => r.read_u8()?.to_string(),
        PublisherIdType::UInt16 => r.read_u16()?.to_string(),
        PublisherIdType::UInt32 => r.read_u32()?.to_string(),
        PublisherIdType::UInt64 => r.read_u64()?.to_string(),
        PublisherIdType::String => read_string(r, ctx)?.unwrap_or_default(),
    })
}

// ============================================================================
// Network flags
// ============================================================================

/// Flag bytes of one network message frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkFlags {
    pub uadp: UadpFlags,
    pub ext1: ExtendedFlags1,
    pub ext2: ExtendedFlags2,
    pub group: GroupFlags,
}

impl NetworkFlags {
    /// Derive the flag bytes for a data frame.
    ///
    /// The publisher id is only flagged when it is both requested and set.
    /// Security is never enabled.
    pub fn derive(
        mask: NetworkMessageContentFlags,
        publisher_id: Option<&str>,
        chunk: bool,
    ) -> Self {
        type M = NetworkMessageContentFlags;
        let publisher_id = publisher_id
            .filter(|id| !id.is_empty() && mask.contains(M::PUBLISHER_ID));

        let mut ext2 = ExtendedFlags2::default();
        ext2.set(ExtendedFlags2::CHUNK, chunk);
        ext2.set(
            ExtendedFlags2::PROMOTED_FIELDS,
            mask.contains(M::PROMOTED_FIELDS),
        );

        let mut ext1 = ExtendedFlags1::default();
        if let Some(id) = publisher_id {
            ext1.0 |= PublisherIdType::detect(id) as u8;
        }
        ext1.set(ExtendedFlags1::DATASET_CLASS_ID, mask.contains(M::DATASET_CLASS_ID));
        ext1.set(ExtendedFlags1::TIMESTAMP, mask.contains(M::TIMESTAMP));
        ext1.set(ExtendedFlags1::PICOSECONDS, mask.contains(M::PICOSECONDS));
        ext1.set(ExtendedFlags1::EXTENDED_FLAGS2, ext2.0 != 0);

        let mut group = GroupFlags::default();
        group.set(GroupFlags::WRITER_GROUP_ID, mask.contains(M::WRITER_GROUP_ID));
        group.set(GroupFlags::GROUP_VERSION, mask.contains(M::GROUP_VERSION));
        group.set(
            GroupFlags::NETWORK_MESSAGE_NUMBER,
            mask.contains(M::NETWORK_MESSAGE_NUMBER),
        );
        group.set(GroupFlags::SEQUENCE_NUMBER, mask.contains(M::SEQUENCE_NUMBER));

        let mut uadp = UadpFlags(UADP_VERSION);
        uadp.set(UadpFlags::PUBLISHER_ID, publisher_id.is_some());
        uadp.set(UadpFlags::GROUP_HEADER, group.0 != 0);
        uadp.set(UadpFlags::PAYLOAD_HEADER, mask.contains(M::PAYLOAD_HEADER));
        uadp.set(
            UadpFlags::EXTENDED_FLAGS1,
            ext1.0 != 0 || publisher_id.is_some(),
        );

        Self {
            uadp,
            ext1,
            ext2,
            group,
        }
    }

    /// Flags of a discovery frame; the publisher id is mandatory there.
    pub fn discovery(publisher_id: &str, message_type: u8) -> Self {
        let mut flags = Self {
            uadp: UadpFlags(UADP_VERSION | UadpFlags::PUBLISHER_ID | UadpFlags::EXTENDED_FLAGS1),
            ext1: ExtendedFlags1(
                PublisherIdType::detect(publisher_id) as u8 | ExtendedFlags1::EXTENDED_FLAGS2,
            ),
            ext2: ExtendedFlags2::default(),
            group: GroupFlags::default(),
        };
        flags.ext2.0 = message_type & ExtendedFlags2::MESSAGE_TYPE_MASK;
        flags
    }

    pub fn publisher_id_type(&self) -> DecodeResult<PublisherIdType> {
        PublisherIdType::from_bits(self.ext1.0)
    }

    /// Discovery probe or announcement rather than data.
    pub fn is_discovery(&self) -> bool {
        self.ext2.0 & ExtendedFlags2::MESSAGE_TYPE_MASK != 0
    }

    pub fn is_chunk(&self) -> bool {
        self.ext2.has(ExtendedFlags2::CHUNK)
    }

    /// UADPFlags, then ExtendedFlags1/2 when flagged.
    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u8(self.uadp.0);
        if self.uadp.has(UadpFlags::EXTENDED_FLAGS1) {
            w.write_u8(self.ext1.0);
            if self.ext1.has(ExtendedFlags1::EXTENDED_FLAGS2) {
                w.write_u8(self.ext2.0);
            }
        }
    }

    /// Read the leading flag bytes. Group flags are read later with the group header.
    pub fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        let uadp = UadpFlags(r.read_u8()?);
        let version = uadp.0 & UadpFlags::VERSION_MASK;
        if version != UADP_VERSION {
            return Err(DecodeError::InvalidFlags(format!(
                "unsupported UADP version {}",
                version
            )));
        }
        let mut flags = Self {
            uadp,
            ..Self::default()
        };
        if uadp.has(UadpFlags::EXTENDED_FLAGS1) {
            flags.ext1 = ExtendedFlags1(r.read_u8()?);
            if flags.ext1.has(ExtendedFlags1::EXTENDED_FLAGS2) {
                flags.ext2 = ExtendedFlags2(r.read_u8()?);
            }
        }
        Ok(flags)
    }

    /// Content mask a decoder reconstructs from the flags.
    pub fn content_mask(&self) -> NetworkMessageContentFlags {
        type M = NetworkMessageContentFlags;
        let mut mask = M::NONE;
        mask.set(M::PUBLISHER_ID, self.uadp.has(UadpFlags::PUBLISHER_ID));
        mask.set(M::GROUP_HEADER, self.uadp.has(UadpFlags::GROUP_HEADER));
        mask.set(M::PAYLOAD_HEADER, self.uadp.has(UadpFlags::PAYLOAD_HEADER));
        mask.set(M::DATASET_CLASS_ID, self.ext1.has(ExtendedFlags1::DATASET_CLASS_ID));
        mask.set(M::TIMESTAMP, self.ext1.has(ExtendedFlags1::TIMESTAMP));
        mask.set(M::PICOSECONDS, self.ext1.has(ExtendedFlags1::PICOSECONDS));
        mask.set(M::PROMOTED_FIELDS, self.ext2.has(ExtendedFlags2::PROMOTED_FIELDS));
        mask.set(M::WRITER_GROUP_ID, self.group.has(GroupFlags::WRITER_GROUP_ID));
        mask.set(M::GROUP_VERSION, self.group.has(GroupFlags::GROUP_VERSION));
        mask.set(
            M::NETWORK_MESSAGE_NUMBER,
            self.group.has(GroupFlags::NETWORK_MESSAGE_NUMBER),
        );
        mask.set(M::SEQUENCE_NUMBER, self.group.has(GroupFlags::SEQUENCE_NUMBER));
        mask
    }
}

// ============================================================================
// DataSet flags
// ============================================================================

/// How payload fields are encoded (DataSetFlags1 bits 1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    Variant,
    RawData,
    DataValue,
}

impl FieldEncoding {
    pub fn from_field_mask(mask: DataSetFieldContentFlags) -> Self {
        if mask.contains(DataSetFieldContentFlags::RAW_DATA) {
            FieldEncoding::RawData
        } else if mask.is_empty() {
            FieldEncoding::Variant
        } else {
            FieldEncoding::DataValue
        }
    }
}

/// DataSetFlags1/2 of one dataset message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataSetFlags {
    pub flags1: DataSetFlags1,
    pub flags2: DataSetFlags2,
}

impl DataSetFlags {
    pub fn derive(msg: &DataSetMessage) -> EncodeResult<Self> {
        type M = DataSetMessageContentFlags;
        let mask = msg.content_mask;

        let type_bits = match msg.message_type {
            MessageType::KeyFrame => 0,
            MessageType::DeltaFrame => 1,
            MessageType::Event => 2,
            MessageType::KeepAlive => 3,
            MessageType::Condition => 6,
            MessageType::Metadata | MessageType::Closed => {
                return Err(EncodeError::InvalidMessageType(msg.message_type.as_str()))
            }
        };
        let mut flags2 = DataSetFlags2(type_bits);
        flags2.set(DataSetFlags2::TIMESTAMP, mask.contains(M::TIMESTAMP));
        flags2.set(DataSetFlags2::PICOSECONDS, mask.contains(M::PICOSECONDS));

        let mut flags1 = DataSetFlags1(DataSetFlags1::VALID);
        match FieldEncoding::from_field_mask(msg.payload.field_mask) {
            FieldEncoding::RawData => flags1.0 |= DataSetFlags1::RAW_DATA,
            FieldEncoding::DataValue => flags1.0 |= DataSetFlags1::DATA_VALUE,
            FieldEncoding::Variant => {}
        }
        flags1.set(DataSetFlags1::SEQUENCE_NUMBER, mask.contains(M::SEQUENCE_NUMBER));
        flags1.set(DataSetFlags1::STATUS, mask.contains(M::STATUS));
        flags1.set(DataSetFlags1::MAJOR_VERSION, mask.contains(M::MAJOR_VERSION));
        flags1.set(DataSetFlags1::MINOR_VERSION, mask.contains(M::MINOR_VERSION));
        flags1.set(DataSetFlags1::DATASET_FLAGS2, flags2.0 != 0);

        Ok(Self { flags1, flags2 })
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u8(self.flags1.0);
        if self.flags1.has(DataSetFlags1::DATASET_FLAGS2) {
            w.write_u8(self.flags2.0);
        }
    }

    pub fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        let flags1 = DataSetFlags1(r.read_u8()?);
        let flags2 = if flags1.has(DataSetFlags1::DATASET_FLAGS2) {
            DataSetFlags2(r.read_u8()?)
        } else {
            DataSetFlags2::default()
        };
        Ok(Self { flags1, flags2 })
    }

    pub fn field_encoding(&self) -> DecodeResult<FieldEncoding> {
        match self.flags1.0 & DataSetFlags1::FIELD_ENCODING_MASK {
            0 => Ok(FieldEncoding::Variant),
            DataSetFlags1::RAW_DATA => Ok(FieldEncoding::RawData),
            DataSetFlags1::DATA_VALUE => Ok(FieldEncoding::DataValue),
            _ => Err(DecodeError::ReservedFieldEncoding),
        }
    }

    pub fn message_type(&self) -> DecodeResult<MessageType> {
        Ok(match self.flags2.0 & DataSetFlags2::MESSAGE_TYPE_MASK {
            0 => MessageType::KeyFrame,
            1 => MessageType::DeltaFrame,
            2 => MessageType::Event,
            3 => MessageType::KeepAlive,
            6 => MessageType::Condition,
            other => {
                return Err(DecodeError::InvalidFlags(format!(
                    "reserved dataset message type {}",
                    other
                )))
            }
        })
    }

    /// Delta-style payload (index/value pairs): delta frames and keep-alives.
    pub fn is_delta_payload(&self) -> bool {
        self.flags2.0 & 0x01 != 0
    }

    /// Header content mask a decoder reconstructs from the flags.
    pub fn content_mask(&self) -> DataSetMessageContentFlags {
        type M = DataSetMessageContentFlags;
        let mut mask = M::NONE;
        mask.set(M::SEQUENCE_NUMBER, self.flags1.has(DataSetFlags1::SEQUENCE_NUMBER));
        mask.set(M::STATUS, self.flags1.has(DataSetFlags1::STATUS));
        mask.set(M::MAJOR_VERSION, self.flags1.has(DataSetFlags1::MAJOR_VERSION));
        mask.set(M::MINOR_VERSION, self.flags1.has(DataSetFlags1::MINOR_VERSION));
        mask.set(M::TIMESTAMP, self.flags2.has(DataSetFlags2::TIMESTAMP));
        mask.set(M::PICOSECONDS, self.flags2.has(DataSetFlags2::PICOSECONDS));
        mask
    }
}
