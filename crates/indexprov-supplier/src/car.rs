//! Content archive (CAR) framing, versions 1 and 2.
//!
//! Only the framing needed to walk the block CIDs is implemented; block data
//! is skipped, never interpreted.
//!
//! CARv1: `varint(len) || dag-cbor {roots, version: 1}` followed by sections
//! `varint(len) || cid || block`.
//!
//! CARv2: an 11-byte pragma, a 40-byte header, an inner CARv1 payload and an
//! optional index.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use ciborium::value::Value;

use indexprov_core::{varint, Cid};

use crate::error::CarError;
use crate::index::{MultihashIndex, MULTIHASH_INDEX_SORTED};

/// The CARv2 pragma: a CARv1-style header declaring version 2.
pub const V2_PRAGMA: [u8; 11] = [
    0x0a, 0xa1, 0x67, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x02,
];

/// Size of the fixed CARv2 header following the pragma.
pub const V2_HEADER_LEN: usize = 40;

const MAX_HEADER_LEN: u64 = 32 << 20;
const MAX_SECTION_LEN: u64 = 32 << 20;

/// CBOR tag for CIDs in dag-cbor.
const CID_TAG: u64 = 42;

/// Options controlling how sections are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Treat a zero-length section as the end of the payload instead of an error.
    pub zero_length_section_as_eof: bool,
}

/// The CARv1 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarHeader {
    pub version: u64,
    pub roots: Vec<Cid>,
}

impl CarHeader {
    /// Encode as a length-prefixed dag-cbor header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CarError> {
        let roots = self
            .roots
            .iter()
            .map(|cid| {
                let mut bytes = vec![0x00];
                bytes.extend(cid.to_bytes());
                Value::Tag(CID_TAG, Box::new(Value::Bytes(bytes)))
            })
            .collect();
        // dag-cbor orders map keys by length first.
        let value = Value::Map(vec![
            (Value::Text("roots".into()), Value::Array(roots)),
            (Value::Text("version".into()), Value::Integer(self.version.into())),
        ]);
        let mut body = Vec::new();
        ciborium::into_writer(&value, &mut body)
            .map_err(|e| CarError::InvalidHeader(e.to_string()))?;

        let mut out = varint::to_vec(body.len() as u64);
        out.extend(body);
        Ok(out)
    }
}

/// The fixed CARv2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2Header {
    pub characteristics: [u8; 16],
    pub data_offset: u64,
    pub data_size: u64,
    /// Zero when the CAR carries no index.
    pub index_offset: u64,
}

impl V2Header {
    pub fn to_bytes(&self) -> [u8; V2_HEADER_LEN] {
        let mut out = [0u8; V2_HEADER_LEN];
        out[..16].copy_from_slice(&self.characteristics);
        out[16..24].copy_from_slice(&self.data_offset.to_le_bytes());
        out[24..32].copy_from_slice(&self.data_size.to_le_bytes());
        out[32..40].copy_from_slice(&self.index_offset.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; V2_HEADER_LEN]) -> Self {
        let u64_at = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(word)
        };
        let mut characteristics = [0u8; 16];
        characteristics.copy_from_slice(&bytes[..16]);
        Self {
            characteristics,
            data_offset: u64_at(16),
            data_size: u64_at(24),
            index_offset: u64_at(32),
        }
    }
}

/// One block section of a CAR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub cid: Cid,
    /// Offset of the section (its length prefix) from the start of the CARv1 payload.
    pub offset: u64,
    /// Length of the block data.
    pub data_len: u64,
}

/// Read a length-prefixed dag-cbor header.
///
/// Returns the header and the number of bytes consumed.
pub fn read_header<R: Read>(reader: &mut R) -> Result<(CarHeader, u64), CarError> {
    let len = varint::read(reader)?
        .ok_or_else(|| CarError::InvalidHeader("empty input".into()))?;
    if len == 0 || len > MAX_HEADER_LEN {
        return Err(CarError::InvalidHeader(format!("header length {}", len)));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;

    let value: Value = ciborium::from_reader(&body[..])
        .map_err(|e| CarError::InvalidHeader(e.to_string()))?;
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CarError::InvalidHeader("header is not a map".into())),
    };

    let version = match field(&map, "version") {
        Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
            .map_err(|_| CarError::InvalidHeader("negative version".into()))?,
        _ => return Err(CarError::InvalidHeader("missing version".into())),
    };

    let roots = match field(&map, "roots") {
        Some(Value::Array(items)) => items
            .iter()
            .map(decode_root)
            .collect::<Result<Vec<_>, _>>()?,
        None if version == 2 => Vec::new(),
        _ => return Err(CarError::InvalidHeader("missing roots".into())),
    };

    let consumed = varint::to_vec(len).len() as u64 + len;
    Ok((CarHeader { version, roots }, consumed))
}

fn field<'a>(map: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(t) if t == name))
        .map(|(_, v)| v)
}

fn decode_root(value: &Value) -> Result<Cid, CarError> {
    match value {
        Value::Tag(CID_TAG, inner) => match inner.as_ref() {
            Value::Bytes(b) if b.first() == Some(&0x00) => Ok(Cid::from_bytes(&b[1..])?),
            _ => Err(CarError::InvalidHeader("malformed root CID".into())),
        },
        _ => Err(CarError::InvalidHeader("root is not a tagged CID".into())),
    }
}

/// Iterator over the sections of a CARv1 payload.
///
/// Stops at the first error.
pub struct SectionReader<R> {
    reader: R,
    position: u64,
    options: ReadOptions,
    done: bool,
}

impl<R: Read> SectionReader<R> {
    /// `position` is the payload offset of the first section (the header length).
    pub fn new(reader: R, position: u64, options: ReadOptions) -> Self {
        Self {
            reader,
            position,
            options,
            done: false,
        }
    }

    fn read_section(&mut self) -> Result<Option<Section>, CarError> {
        let offset = self.position;
        let len = match varint::read(&mut self.reader)? {
            Some(len) => len,
            None => return Ok(None),
        };
        if len == 0 {
            if self.options.zero_length_section_as_eof {
                return Ok(None);
            }
            return Err(CarError::InvalidSection(format!(
                "zero-length section at offset {}",
                offset
            )));
        }
        if len > MAX_SECTION_LEN {
            return Err(CarError::InvalidSection(format!(
                "section length {} exceeds limit",
                len
            )));
        }

        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                CarError::InvalidSection(format!("truncated section at offset {}", offset))
            } else {
                CarError::Io(e)
            }
        })?;
        let (cid, used) = Cid::read_bytes(&buf)?;

        self.position += varint::to_vec(len).len() as u64 + len;
        Ok(Some(Section {
            cid,
            offset,
            data_len: len - used as u64,
        }))
    }
}

impl<R: Read> Iterator for SectionReader<R> {
    type Item = Result<Section, CarError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_section() {
            Ok(Some(section)) => Some(Ok(section)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Boxed reader positioned inside a CAR payload.
pub type PayloadReader = Box<dyn Read + Send>;

/// An opened CAR file, version 1 or 2.
#[derive(Debug, Clone)]
pub struct CarFile {
    path: std::path::PathBuf,
    /// The CARv1 header (the inner one for CARv2).
    header: CarHeader,
    v2: Option<V2Header>,
    /// Length of the CARv1 header, where the first section starts.
    header_len: u64,
}

impl CarFile {
    /// Open a CAR file and read its headers.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CarError> {
        let path = path.as_ref().to_path_buf();
        let (car, _) = Self::open_payload(&path)?;
        Ok(car)
    }

    fn open_payload(path: &Path) -> Result<(Self, PayloadReader), CarError> {
        let mut reader = BufReader::new(File::open(path)?);
        let (outer, outer_len) = read_header(&mut reader)?;

        match outer.version {
            1 => {
                let payload: PayloadReader = Box::new(reader);
                Ok((
                    Self {
                        path: path.to_path_buf(),
                        header: outer,
                        v2: None,
                        header_len: outer_len,
                    },
                    payload,
                ))
            }
            2 => {
                let mut raw = [0u8; V2_HEADER_LEN];
                reader.read_exact(&mut raw)?;
                let v2 = V2Header::from_bytes(&raw);

                let consumed = outer_len + V2_HEADER_LEN as u64;
                let skip = v2.data_offset.checked_sub(consumed).ok_or_else(|| {
                    CarError::InvalidHeader(format!("data offset {} overlaps header", v2.data_offset))
                })?;
                io::copy(&mut (&mut reader).take(skip), &mut io::sink())?;

                let mut limited = reader.take(v2.data_size);
                let (inner, inner_len) = read_header(&mut limited)?;
                if inner.version != 1 {
                    return Err(CarError::UnsupportedVersion(inner.version));
                }
                let payload: PayloadReader = Box::new(limited);
                Ok((
                    Self {
                        path: path.to_path_buf(),
                        header: inner,
                        v2: Some(v2),
                        header_len: inner_len,
                    },
                    payload,
                ))
            }
            other => Err(CarError::UnsupportedVersion(other)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u64 {
        if self.v2.is_some() {
            2
        } else {
            1
        }
    }

    pub fn roots(&self) -> &[Cid] {
        &self.header.roots
    }

    pub fn v2_header(&self) -> Option<&V2Header> {
        self.v2.as_ref()
    }

    /// Walk the sections of the payload from the start.
    pub fn sections(&self, options: ReadOptions) -> Result<SectionReader<PayloadReader>, CarError> {
        let (car, reader) = Self::open_payload(&self.path)?;
        Ok(SectionReader::new(reader, car.header_len, options))
    }

    /// The CAR's embedded index, if it has one in multihash-sorted format.
    pub fn embedded_index(&self) -> Result<Option<MultihashIndex>, CarError> {
        let offset = match self.v2 {
            Some(v2) if v2.index_offset != 0 => v2.index_offset,
            _ => return Ok(None),
        };
        let mut file = BufReader::new(File::open(&self.path)?);
        file.seek(SeekFrom::Start(offset))?;
        let codec = varint::read(&mut file)?
            .ok_or_else(|| CarError::InvalidIndex("missing index codec".into()))?;
        if codec != MULTIHASH_INDEX_SORTED {
            tracing::debug!(codec, path = %self.path.display(), "embedded index has another format");
            return Ok(None);
        }
        Ok(Some(MultihashIndex::read_body(&mut file)?))
    }

    /// The embedded multihash-sorted index, or one generated from the payload.
    pub fn multihash_index(&self, options: ReadOptions) -> Result<MultihashIndex, CarError> {
        if let Some(index) = self.embedded_index()? {
            return Ok(index);
        }
        MultihashIndex::from_sections(self.sections(options)?)
    }
}

/// Append a section for `cid` and `data` to `buf`.
pub fn write_section(buf: &mut Vec<u8>, cid: &Cid, data: &[u8]) {
    let cid_bytes = cid.to_bytes();
    varint::encode((cid_bytes.len() + data.len()) as u64, buf);
    buf.extend(cid_bytes);
    buf.extend_from_slice(data);
}
