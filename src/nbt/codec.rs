//! Payload codecs
//!
//! The seam between the storage engine and the tag serialization grammar.
//! A [`RecordCodec`] turns a record payload (after the 5-byte body header)
//! into a [`Document`] and back. The default [`BincodeCodec`] stores the tag
//! tree with `bincode` and compresses it with `flate2`.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::{Result, TreeError};

use super::document::{Document, DocumentHandle};
use super::tag::NbtTag;

/// Compression scheme byte stored in every record body header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zlib,
    None,
}

impl Compression {
    /// Parse the scheme id (without the external flag)
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Compression::Gzip),
            2 => Some(Compression::Zlib),
            3 => Some(Compression::None),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Compression::Gzip => 1,
            Compression::Zlib => 2,
            Compression::None => 3,
        }
    }

    /// Guess the scheme from leading magic bytes
    pub fn detect(data: &[u8]) -> Self {
        match data {
            [0x1f, 0x8b, ..] => Compression::Gzip,
            [0x78, second, ..] if (0x7800u16 | *second as u16) % 31 == 0 => Compression::Zlib,
            _ => Compression::None,
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            Compression::None => Ok(data.to_vec()),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Compression::Gzip => {
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| TreeError::Decode(format!("gzip: {}", e)))?;
            }
            Compression::Zlib => {
                ZlibDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| TreeError::Decode(format!("zlib: {}", e)))?;
            }
            Compression::None => out.extend_from_slice(data),
        }
        Ok(out)
    }
}

/// Decompression + deserialization for record payloads
pub trait RecordCodec {
    /// Decode a payload stored with `compression`
    fn decode(&self, compression: Compression, payload: &[u8]) -> Result<DocumentHandle>;

    /// Encode a document into a payload compressed with `compression`
    fn encode(&self, compression: Compression, document: &Document) -> Result<Vec<u8>>;
}

/// Default codec: bincode-serialized tag tree behind flate2 compression
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Serialize a root tag without compression
    pub fn serialize(document: &Document) -> Result<Vec<u8>> {
        let root = document.root().borrow();
        Ok(bincode::serialize(&*root)?)
    }

    /// Deserialize an uncompressed root tag
    pub fn deserialize(bytes: &[u8]) -> Result<DocumentHandle> {
        let root: NbtTag =
            bincode::deserialize(bytes).map_err(|e| TreeError::Decode(e.to_string()))?;
        Ok(Document::from_tag(root))
    }
}

impl RecordCodec for BincodeCodec {
    fn decode(&self, compression: Compression, payload: &[u8]) -> Result<DocumentHandle> {
        let raw = compression.decompress(payload)?;
        Self::deserialize(&raw)
    }

    fn encode(&self, compression: Compression, document: &Document) -> Result<Vec<u8>> {
        let raw = Self::serialize(document)?;
        compression.compress(&raw)
    }
}
