//! UFX string-table wire codec.
//!
//! The venue speaks length-prefixed string tables: a request is one dataset
//! of field names followed by string-coerced values, a reply is one or more
//! datasets of named columns and string rows. All typed interpretation
//! happens above the codec; this module only moves strings in and out of
//! buffers.
//!
//! Layout (little-endian):
//!
//! ```text
//! header:  magic u16 (0x4655) | kind u8 (0x51 request / 0x52 answer)
//!          | function u32 | dataset_count u32
//! dataset: row_count u32 | col_count u32
//!          | col names   (u32 length + UTF-8 bytes) x col_count
//!          | cell values (u32 length + UTF-8 bytes) x row_count x col_count
//! ```
//!
//! Decoding well-formed input never fails. A framing inconsistency means
//! the protocol state can no longer be trusted and is fatal to the session;
//! the caller tears the connection down rather than resynchronizing.

use std::collections::HashMap;

const MAGIC: u16 = 0x4655;
const KIND_REQUEST: u8 = 0x51;
const KIND_ANSWER: u8 = 0x52;

const KIND_OFFSET: usize = 2;

// Bounds on counts read from the header, so a corrupt buffer is rejected
// before it can request an absurd allocation.
const MAX_DATASETS: u32 = 16;
const MAX_ROWS: u32 = 100_000;
const MAX_COLS: u32 = 512;
const MAX_STRING_LEN: u32 = 65_536;

/// Wire codec errors. All of these are fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Buffer does not start with the protocol magic.
    #[error("bad frame magic: {0:#06x}")]
    BadMagic(u16),

    /// Unknown packet kind byte.
    #[error("unknown frame kind: {0:#04x}")]
    UnknownKind(u8),

    /// Buffer ended before the framing said it would.
    #[error("truncated frame: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Bytes the framing asked for.
        needed: usize,
        /// Read position when the buffer ran out.
        offset: usize,
    },

    /// A count field exceeds the protocol bounds.
    #[error("frame {field} count {value} exceeds limit {limit}")]
    CountOutOfBounds {
        /// Which count was out of bounds.
        field: &'static str,
        /// The value read from the buffer.
        value: u32,
        /// The protocol limit.
        limit: u32,
    },

    /// A field name or cell value is not valid UTF-8.
    #[error("invalid UTF-8 in frame string at offset {0}")]
    InvalidUtf8(usize),

    /// Bytes remained after the last dataset.
    #[error("trailing garbage: {0} bytes after last dataset")]
    TrailingBytes(usize),
}

/// Packet direction marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Caller-to-venue request.
    Request,
    /// Venue-to-caller answer (replies and pushes).
    Answer,
}

/// One decoded row: column name to string value.
pub type Row = HashMap<String, String>;

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Packet direction.
    pub kind: FrameKind,
    /// Function code from the header.
    pub function: u32,
    /// Datasets, each a sequence of rows.
    pub datasets: Vec<Vec<Row>>,
}

impl Frame {
    /// Flatten all datasets into one row sequence, in wire order.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.datasets.into_iter().flatten().collect()
    }
}

/// Encode a request frame: one dataset, one row, fields in insertion order.
#[must_use]
pub fn encode_request(function: u32, fields: &[(&str, String)]) -> Vec<u8> {
    encode_frame(KIND_REQUEST, function, &[fields])
}

/// Encode an answer frame with the given rows.
///
/// The gateway itself never answers (except the heartbeat transform); this
/// is the venue-side counterpart used by loopback tests and simulators. All
/// rows must share one column set; the first row defines the column order.
#[must_use]
pub fn encode_answer(function: u32, rows: &[Vec<(&str, String)>]) -> Vec<u8> {
    let borrowed: Vec<&[(&str, String)]> = rows.iter().map(Vec::as_slice).collect();
    encode_frame(KIND_ANSWER, function, &borrowed)
}

fn encode_frame(kind: u8, function: u32, rows: &[&[(&str, String)]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.push(kind);
    buf.extend_from_slice(&function.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes()); // dataset count

    let row_count = u32::try_from(rows.len()).unwrap_or(u32::MAX);
    let col_count = rows
        .first()
        .map_or(0, |row| u32::try_from(row.len()).unwrap_or(u32::MAX));
    buf.extend_from_slice(&row_count.to_le_bytes());
    buf.extend_from_slice(&col_count.to_le_bytes());

    if let Some(first) = rows.first() {
        for (name, _) in *first {
            write_string(&mut buf, name);
        }
        for row in rows {
            for (_, value) in *row {
                write_string(&mut buf, value);
            }
        }
    }

    buf
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Read the function code from a frame header without decoding the body.
///
/// The inbound path calls this before any other action so the heartbeat can
/// be answered without touching the correlation table or the engine.
pub fn peek_function(buf: &[u8]) -> Result<u32, CodecError> {
    let mut cursor = Cursor::new(buf);
    let magic = cursor.read_u16()?;
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let kind = cursor.read_u8()?;
    if kind != KIND_REQUEST && kind != KIND_ANSWER {
        return Err(CodecError::UnknownKind(kind));
    }
    cursor.read_u32()
}

/// Transform a heartbeat request buffer into the answer to echo back.
///
/// The venue transform is the request frame with its kind byte flipped;
/// the body is returned untouched.
pub fn heartbeat_answer(buf: &[u8]) -> Result<Vec<u8>, CodecError> {
    peek_function(buf)?;
    let mut answer = buf.to_vec();
    answer[KIND_OFFSET] = KIND_ANSWER;
    Ok(answer)
}

/// Decode a complete frame.
pub fn decode(buf: &[u8]) -> Result<Frame, CodecError> {
    let mut cursor = Cursor::new(buf);

    let magic = cursor.read_u16()?;
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let kind = match cursor.read_u8()? {
        KIND_REQUEST => FrameKind::Request,
        KIND_ANSWER => FrameKind::Answer,
        other => return Err(CodecError::UnknownKind(other)),
    };
    let function = cursor.read_u32()?;
    let dataset_count = cursor.read_bounded_u32("dataset", MAX_DATASETS)?;

    let mut datasets = Vec::with_capacity(dataset_count as usize);
    for _ in 0..dataset_count {
        let row_count = cursor.read_bounded_u32("row", MAX_ROWS)?;
        let col_count = cursor.read_bounded_u32("column", MAX_COLS)?;

        let mut names = Vec::with_capacity(col_count as usize);
        for _ in 0..col_count {
            names.push(cursor.read_string()?);
        }

        let mut rows = Vec::with_capacity(row_count as usize);
        for _ in 0..row_count {
            let mut row = Row::with_capacity(col_count as usize);
            for name in &names {
                row.insert(name.clone(), cursor.read_string()?);
            }
            rows.push(row);
        }
        datasets.push(rows);
    }

    let remaining = cursor.remaining();
    if remaining > 0 {
        return Err(CodecError::TrailingBytes(remaining));
    }

    Ok(Frame {
        kind,
        function,
        datasets,
    })
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::Truncated {
                needed: len,
                offset: self.pos,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_bounded_u32(&mut self, field: &'static str, limit: u32) -> Result<u32, CodecError> {
        let value = self.read_u32()?;
        if value > limit {
            return Err(CodecError::CountOutOfBounds {
                field,
                value,
                limit,
            });
        }
        Ok(value)
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_bounded_u32("string length", MAX_STRING_LEN)?;
        let offset = self.pos;
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8(offset))
    }
}
