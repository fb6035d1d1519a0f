// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw FIT data messages.
//!
//! A [`Message`] keeps every field exactly as it was read (number, base type
//! and raw bytes) so that untouched messages round-trip byte for byte. Typed
//! accessors are provided for the handful of values the patcher reads.

use super::profile::base_type;

/// Byte order of multi-byte values in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Architecture {
    #[default]
    LittleEndian,
    BigEndian,
}

impl Architecture {
    pub fn from_byte(byte: u8) -> Self {
        if byte == 1 {
            Architecture::BigEndian
        } else {
            Architecture::LittleEndian
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Architecture::LittleEndian => 0,
            Architecture::BigEndian => 1,
        }
    }
}

/// A profile field value in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub number: u8,
    pub base_type: u8,
    pub bytes: Vec<u8>,
}

/// A developer data field in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeveloperField {
    pub number: u8,
    pub developer_index: u8,
    pub bytes: Vec<u8>,
}

/// Layout of a message as written in a definition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub architecture: Architecture,
    pub global: u16,
    /// (field number, size, base type)
    pub fields: Vec<(u8, u8, u8)>,
    /// (field number, size, developer data index)
    pub developer_fields: Vec<(u8, u8, u8)>,
}

/// One FIT data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Global message number (profile message kind)
    pub global: u16,
    /// Local message type the message was written with
    pub local: u8,
    pub architecture: Architecture,
    /// Time offset when the message used a compressed timestamp header
    pub time_offset: Option<u8>,
    pub fields: Vec<Field>,
    pub developer_fields: Vec<DeveloperField>,
}

impl Message {
    /// Create an empty little-endian message on local type 0.
    pub fn new(global: u16) -> Self {
        Self {
            global,
            local: 0,
            architecture: Architecture::LittleEndian,
            time_offset: None,
            fields: Vec::new(),
            developer_fields: Vec::new(),
        }
    }

    /// Builder-style local type override.
    pub fn with_local(mut self, local: u8) -> Self {
        self.local = local & 0x0F;
        self
    }

    /// Builder-style `set_u16`.
    pub fn with_u16(mut self, number: u8, value: u16) -> Self {
        self.set_u16(number, value);
        self
    }

    /// Builder-style `set_u32`.
    pub fn with_u32(mut self, number: u8, value: u32) -> Self {
        self.set_u32(number, value);
        self
    }

    pub fn field(&self, number: u8) -> Option<&Field> {
        self.fields.iter().find(|f| f.number == number)
    }

    fn field_mut(&mut self, number: u8) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.number == number)
    }

    /// Read a uint16 field. Absent, short, and invalid (0xFFFF) values are `None`.
    pub fn get_u16(&self, number: u8) -> Option<u16> {
        let field = self.field(number)?;
        let raw: [u8; 2] = field.bytes.get(..2)?.try_into().ok()?;
        let value = match self.architecture {
            Architecture::LittleEndian => u16::from_le_bytes(raw),
            Architecture::BigEndian => u16::from_be_bytes(raw),
        };
        (value != u16::MAX).then_some(value)
    }

    /// Read a uint32 field. Absent, short, and invalid (0xFFFFFFFF) values are `None`.
    pub fn get_u32(&self, number: u8) -> Option<u32> {
        let field = self.field(number)?;
        let raw: [u8; 4] = field.bytes.get(..4)?.try_into().ok()?;
        let value = match self.architecture {
            Architecture::LittleEndian => u32::from_le_bytes(raw),
            Architecture::BigEndian => u32::from_be_bytes(raw),
        };
        (value != u32::MAX).then_some(value)
    }

    /// Read a null-terminated string field.
    pub fn get_string(&self, number: u8) -> Option<String> {
        let field = self.field(number)?;
        let end = field
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(field.bytes.len());
        if end == 0 {
            return None;
        }
        Some(String::from_utf8_lossy(&field.bytes[..end]).into_owned())
    }

    /// Write a uint16 field, appending it when the message does not carry it.
    pub fn set_u16(&mut self, number: u8, value: u16) {
        let bytes = match self.architecture {
            Architecture::LittleEndian => value.to_le_bytes(),
            Architecture::BigEndian => value.to_be_bytes(),
        };
        self.set_raw(number, base_type::UINT16, bytes.to_vec());
    }

    /// Write a uint32 field, appending it when the message does not carry it.
    pub fn set_u32(&mut self, number: u8, value: u32) {
        let bytes = match self.architecture {
            Architecture::LittleEndian => value.to_le_bytes(),
            Architecture::BigEndian => value.to_be_bytes(),
        };
        self.set_raw(number, base_type::UINT32, bytes.to_vec());
    }

    pub fn set_u8(&mut self, number: u8, base: u8, value: u8) {
        self.set_raw(number, base, vec![value]);
    }

    /// Write a null-terminated UTF-8 string field.
    pub fn set_string(&mut self, number: u8, value: &str) {
        let mut bytes = value.as_bytes().to_vec();
        // FIT field sizes are a single byte, leave room for the terminator
        bytes.truncate(254);
        bytes.push(0);
        self.set_raw(number, base_type::STRING, bytes);
    }

    fn set_raw(&mut self, number: u8, base: u8, bytes: Vec<u8>) {
        match self.field_mut(number) {
            Some(field) if field.bytes.len() == bytes.len() => field.bytes = bytes,
            Some(field) => {
                field.base_type = base;
                field.bytes = bytes;
            }
            None => self.fields.push(Field {
                number,
                base_type: base,
                bytes,
            }),
        }
    }

    /// The definition record this message needs to be written.
    pub fn definition(&self) -> Definition {
        Definition {
            architecture: self.architecture,
            global: self.global,
            fields: self
                .fields
                .iter()
                .map(|f| (f.number, f.bytes.len() as u8, f.base_type))
                .collect(),
            developer_fields: self
                .developer_fields
                .iter()
                .map(|f| (f.number, f.bytes.len() as u8, f.developer_index))
                .collect(),
        }
    }
}
