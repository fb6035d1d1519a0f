// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Minimal FIT codec.
//!
//! Decodes a FIT stream into an ordered list of raw [`Message`]s and encodes
//! it back, regenerating definition records as needed. Message contents are
//! never interpreted here, which keeps unknown messages intact.

pub mod crc;
pub mod message;
pub mod profile;

pub use message::{Architecture, Definition, DeveloperField, Field, Message};

use std::path::Path;

const FIT_SIGNATURE: &[u8; 4] = b".FIT";
const HEADER_SIZE: u8 = 14;
const LEGACY_HEADER_SIZE: u8 = 12;
const LOCAL_TYPES: usize = 16;

const DEFINITION_BIT: u8 = 0x40;
const DEVELOPER_DATA_BIT: u8 = 0x20;
const COMPRESSED_HEADER_BIT: u8 = 0x80;

/// Errors from decoding or encoding FIT data.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("Failed to read file: {0}")]
    Io(String),

    #[error("Unexpected end of data at offset {0}")]
    Truncated(usize),

    #[error("Unsupported header size {0}")]
    BadHeaderSize(u8),

    #[error("Missing .FIT signature")]
    BadSignature,

    #[error("Data message for undefined local type {local} at offset {offset}")]
    UndefinedLocal { local: u8, offset: usize },

    #[error("Field {0} is larger than 255 bytes")]
    FieldTooLarge(u8),
}

/// A decoded FIT file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitFile {
    pub protocol_version: u8,
    pub profile_version: u16,
    pub messages: Vec<Message>,
}

impl FitFile {
    /// Empty file with protocol 2.0.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            protocol_version: 0x20,
            profile_version: 21_158,
            messages,
        }
    }
}

/// Decoding and encoding of activity files.
///
/// The patcher and upload pipeline are generic over this so they can be
/// exercised without real device files.
pub trait ActivityCodec {
    fn decode(&self, bytes: &[u8]) -> Result<FitFile, FitError>;

    fn encode(&self, file: &FitFile) -> Result<Vec<u8>, FitError>;

    fn decode_file(&self, path: &Path) -> Result<FitFile, FitError> {
        let bytes = std::fs::read(path).map_err(|e| FitError::Io(e.to_string()))?;
        self.decode(&bytes)
    }
}

/// The built-in binary FIT codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitCodec;

impl ActivityCodec for FitCodec {
    fn decode(&self, bytes: &[u8]) -> Result<FitFile, FitError> {
        decode(bytes)
    }

    fn encode(&self, file: &FitFile) -> Result<Vec<u8>, FitError> {
        encode(file)
    }
}

/// Byte cursor over the data section.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, FitError> {
        let b = *self.buf.get(self.pos).ok_or(FitError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FitError> {
        let end = self.pos + n;
        let slice = self.buf.get(self.pos..end).ok_or(FitError::Truncated(self.pos))?;
        self.pos = end;
        Ok(slice)
    }
}

/// Decode a complete FIT file.
pub fn decode(bytes: &[u8]) -> Result<FitFile, FitError> {
    let header_size = *bytes.first().ok_or(FitError::Truncated(0))?;
    if header_size != HEADER_SIZE && header_size != LEGACY_HEADER_SIZE {
        return Err(FitError::BadHeaderSize(header_size));
    }
    let header_len = header_size as usize;
    if bytes.len() < header_len {
        return Err(FitError::Truncated(bytes.len()));
    }
    if &bytes[8..12] != FIT_SIGNATURE {
        return Err(FitError::BadSignature);
    }

    let protocol_version = bytes[1];
    let profile_version = u16::from_le_bytes([bytes[2], bytes[3]]);
    let data_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let data_end = header_len + data_size;
    if bytes.len() < data_end + 2 {
        return Err(FitError::Truncated(bytes.len()));
    }

    if header_size == HEADER_SIZE {
        let stored = u16::from_le_bytes([bytes[12], bytes[13]]);
        if stored != 0 && stored != crc::checksum(&bytes[..12]) {
            tracing::warn!(stored, "FIT header CRC mismatch");
        }
    }
    let stored_crc = u16::from_le_bytes([bytes[data_end], bytes[data_end + 1]]);
    let actual_crc = crc::checksum(&bytes[..data_end]);
    if stored_crc != actual_crc {
        tracing::warn!(stored_crc, actual_crc, "FIT file CRC mismatch");
    }
    if bytes.len() > data_end + 2 {
        tracing::warn!(
            trailing = bytes.len() - data_end - 2,
            "Ignoring data after the first FIT file"
        );
    }

    let mut reader = Reader {
        buf: &bytes[..data_end],
        pos: header_len,
    };
    let mut definitions: [Option<Definition>; LOCAL_TYPES] = Default::default();
    let mut messages = Vec::new();

    while reader.pos < data_end {
        let offset = reader.pos;
        let header = reader.u8()?;

        if header & COMPRESSED_HEADER_BIT != 0 {
            let local = (header >> 5) & 0x03;
            let def = definitions[local as usize]
                .as_ref()
                .ok_or(FitError::UndefinedLocal { local, offset })?;
            let mut msg = read_data(&mut reader, def, local)?;
            msg.time_offset = Some(header & 0x1F);
            messages.push(msg);
        } else if header & DEFINITION_BIT != 0 {
            let local = header & 0x0F;
            let def = read_definition(&mut reader, header & DEVELOPER_DATA_BIT != 0)?;
            definitions[local as usize] = Some(def);
        } else {
            let local = header & 0x0F;
            let def = definitions[local as usize]
                .as_ref()
                .ok_or(FitError::UndefinedLocal { local, offset })?;
            messages.push(read_data(&mut reader, def, local)?);
        }
    }

    Ok(FitFile {
        protocol_version,
        profile_version,
        messages,
    })
}

fn read_definition(reader: &mut Reader<'_>, developer: bool) -> Result<Definition, FitError> {
    let _reserved = reader.u8()?;
    let architecture = Architecture::from_byte(reader.u8()?);
    let raw = reader.take(2)?;
    let global = match architecture {
        Architecture::LittleEndian => u16::from_le_bytes([raw[0], raw[1]]),
        Architecture::BigEndian => u16::from_be_bytes([raw[0], raw[1]]),
    };

    let count = reader.u8()?;
    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let f = reader.take(3)?;
        fields.push((f[0], f[1], f[2]));
    }

    let mut developer_fields = Vec::new();
    if developer {
        let count = reader.u8()?;
        for _ in 0..count {
            let f = reader.take(3)?;
            developer_fields.push((f[0], f[1], f[2]));
        }
    }

    Ok(Definition {
        architecture,
        global,
        fields,
        developer_fields,
    })
}

fn read_data(reader: &mut Reader<'_>, def: &Definition, local: u8) -> Result<Message, FitError> {
    let mut fields = Vec::with_capacity(def.fields.len());
    for &(number, size, base_type) in &def.fields {
        fields.push(Field {
            number,
            base_type,
            bytes: reader.take(size as usize)?.to_vec(),
        });
    }

    let mut developer_fields = Vec::with_capacity(def.developer_fields.len());
    for &(number, size, developer_index) in &def.developer_fields {
        developer_fields.push(DeveloperField {
            number,
            developer_index,
            bytes: reader.take(size as usize)?.to_vec(),
        });
    }

    Ok(Message {
        global: def.global,
        local,
        architecture: def.architecture,
        time_offset: None,
        fields,
        developer_fields,
    })
}

/// Encode a FIT file, emitting definitions whenever a local type's layout changes.
pub fn encode(file: &FitFile) -> Result<Vec<u8>, FitError> {
    let mut out = vec![0u8; HEADER_SIZE as usize];
    let mut current: [Option<Definition>; LOCAL_TYPES] = Default::default();

    for msg in &file.messages {
        let def = msg.definition();
        if let Some(field) = msg.fields.iter().find(|f| f.bytes.len() > u8::MAX as usize) {
            return Err(FitError::FieldTooLarge(field.number));
        }

        let compressed = msg.time_offset.filter(|_| msg.local < 4);
        let local = msg.local & 0x0F;

        if current[local as usize].as_ref() != Some(&def) {
            write_definition(&mut out, local, &def);
            current[local as usize] = Some(def);
        }

        match compressed {
            Some(offset) => out.push(COMPRESSED_HEADER_BIT | (local << 5) | (offset & 0x1F)),
            None => out.push(local),
        }
        for field in &msg.fields {
            out.extend_from_slice(&field.bytes);
        }
        for field in &msg.developer_fields {
            out.extend_from_slice(&field.bytes);
        }
    }

    let data_size = (out.len() - HEADER_SIZE as usize) as u32;
    out[0] = HEADER_SIZE;
    out[1] = file.protocol_version;
    out[2..4].copy_from_slice(&file.profile_version.to_le_bytes());
    out[4..8].copy_from_slice(&data_size.to_le_bytes());
    out[8..12].copy_from_slice(FIT_SIGNATURE);
    let header_crc = crc::checksum(&out[..12]);
    out[12..14].copy_from_slice(&header_crc.to_le_bytes());

    let file_crc = crc::checksum(&out);
    out.extend_from_slice(&file_crc.to_le_bytes());
    Ok(out)
}

fn write_definition(out: &mut Vec<u8>, local: u8, def: &Definition) {
    let developer = !def.developer_fields.is_empty();
    let mut header = DEFINITION_BIT | local;
    if developer {
        header |= DEVELOPER_DATA_BIT;
    }
    out.push(header);
    out.push(0);
    out.push(def.architecture.as_byte());
    match def.architecture {
        Architecture::LittleEndian => out.extend_from_slice(&def.global.to_le_bytes()),
        Architecture::BigEndian => out.extend_from_slice(&def.global.to_be_bytes()),
    }
    out.push(def.fields.len() as u8);
    for &(number, size, base_type) in &def.fields {
        out.extend_from_slice(&[number, size, base_type]);
    }
    if developer {
        out.push(def.developer_fields.len() as u8);
        for &(number, size, index) in &def.developer_fields {
            out.extend_from_slice(&[number, size, index]);
        }
    }
}
