use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use covmat_core::StoreError;

use crate::consts::{FORMAT_VERSION, MAGIC};

/// magic + version + reserved
pub const HEADER_LEN: u64 = 8;
/// directory offset + directory length + magic
pub const FOOTER_LEN: u64 = 20;

///
/// Location of one member's bytes inside the store file.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Member {
    Text {
        offset: u64,
        len: u64,
    },
    Int32 {
        offset: u64,
    },
    Array {
        len: u64,
        chunk_len: u64,
        level: u32,
        chunks: Vec<Chunk>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub offset: u64,
    pub compressed_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub members: BTreeMap<String, Member>,
}

///
/// The table of contents written at the end of a finished store. Groups are kept in
/// write order.
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub directory_offset: u64,
    pub directory_len: u64,
}

pub fn write_header<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    writer.write_u16::<LittleEndian>(0)?;
    Ok(())
}

pub fn read_header<R: Read>(reader: &mut R) -> Result<(), StoreError> {
    let mut magic = [0; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(StoreError::InvalidStore("bad header magic".to_string()));
    }

    let version = reader.read_u16::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(StoreError::InvalidStore(format!(
            "unsupported format version {version}"
        )));
    }
    let _reserved = reader.read_u16::<LittleEndian>()?;

    Ok(())
}

impl Footer {
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.directory_offset)?;
        writer.write_u64::<LittleEndian>(self.directory_len)?;
        writer.write_all(MAGIC)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, StoreError> {
        let directory_offset = reader.read_u64::<LittleEndian>()?;
        let directory_len = reader.read_u64::<LittleEndian>()?;

        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            // the writer never got to finish()
            return Err(StoreError::InvalidStore(
                "missing footer, store was not finished".to_string(),
            ));
        }

        Ok(Footer {
            directory_offset,
            directory_len,
        })
    }
}

///
/// Compress a slice of values as little-endian `u32`s.
///
pub fn encode_chunk(values: &[u32], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    for &value in values {
        encoder.write_u32::<LittleEndian>(value)?;
    }
    encoder.finish()
}

///
/// Inflate a chunk that should hold exactly `expected` values.
///
pub fn decode_chunk(bytes: &[u8], expected: usize) -> Result<Vec<u32>, StoreError> {
    let mut raw = Vec::with_capacity(expected * 4);
    ZlibDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(|err| StoreError::Corrupt(format!("chunk failed to inflate: {err}")))?;

    if raw.len() != expected * 4 {
        return Err(StoreError::Corrupt(format!(
            "chunk holds {} bytes, expected {}",
            raw.len(),
            expected * 4
        )));
    }

    let mut values = vec![0u32; expected];
    raw.as_slice().read_u32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}
