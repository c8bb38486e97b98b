//! Records, batches and the packed-batch codec.
//!
//! A packed batch is length-prefixed:
//!
//! ```text
//! [4 bytes: record count (big-endian)]
//! repeated count times:
//!   [4 bytes: payload length (big-endian)][N bytes: payload]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const LEN_PREFIX: usize = 4;

/// Error decoding a packed batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated batch header: need 4 bytes, have {0}")]
    TruncatedHeader(usize),
    #[error("record count {count} exceeds remaining {remaining} bytes")]
    CountOverrun { count: usize, remaining: usize },
    #[error("record {index}: truncated length prefix")]
    TruncatedLength { index: usize },
    #[error("record {index}: payload needs {expected} bytes, have {available}")]
    TruncatedPayload {
        index: usize,
        expected: usize,
        available: usize,
    },
    #[error("{0} trailing bytes after last record")]
    TrailingBytes(usize),
}

/// Error packing a batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    #[error("record {index} is {len} bytes, larger than the u32 length prefix allows")]
    RecordTooLarge { index: usize, len: usize },
    #[error("batch holds {0} records, more than the u32 count allows")]
    TooManyRecords(usize),
}

/// A single record. The payload is opaque bytes, assumed to be valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub payload: Bytes,
}

impl Record {
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// An ordered group of records delivered together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub records: Vec<Record>,
}

impl Batch {
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build a batch from raw payloads, preserving order.
    #[must_use]
    pub fn from_payloads<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        Self {
            records: payloads.into_iter().map(Record::new).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Encode into the packed wire form.
    ///
    /// # Errors
    /// Returns error if the record count or a payload length does not fit
    /// in a `u32`.
    pub fn pack(&self) -> Result<Bytes, PackError> {
        pack_batch(self.records.iter().map(|r| r.payload.as_ref()))
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Pack raw payloads into the length-prefixed wire form.
///
/// # Errors
/// Returns error if the record count or a payload length does not fit in a
/// `u32`.
pub fn pack_batch<I, P>(payloads: I) -> Result<Bytes, PackError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let payloads: Vec<P> = payloads.into_iter().collect();
    let count =
        u32::try_from(payloads.len()).map_err(|_| PackError::TooManyRecords(payloads.len()))?;

    let body: usize = payloads.iter().map(|p| LEN_PREFIX + p.as_ref().len()).sum();
    let mut buf = BytesMut::with_capacity(LEN_PREFIX + body);
    buf.put_u32(count);

    for (index, payload) in payloads.iter().enumerate() {
        let payload = payload.as_ref();
        let len = u32::try_from(payload.len()).map_err(|_| PackError::RecordTooLarge {
            index,
            len: payload.len(),
        })?;
        buf.put_u32(len);
        buf.put_slice(payload);
    }

    Ok(buf.freeze())
}

/// Decode a packed batch. Payloads are sliced out of `packed` without copying.
///
/// # Errors
/// Returns error if the input is truncated, declares more records than it
/// can hold, or has bytes left after the last record.
pub fn unpack_batch(mut packed: Bytes) -> Result<Batch, DecodeError> {
    if packed.remaining() < LEN_PREFIX {
        return Err(DecodeError::TruncatedHeader(packed.remaining()));
    }
    let count = packed.get_u32() as usize;

    // Every record carries at least its length prefix.
    if count > packed.remaining() / LEN_PREFIX {
        return Err(DecodeError::CountOverrun {
            count,
            remaining: packed.remaining(),
        });
    }

    let mut records = Vec::with_capacity(count);
    for index in 0..count {
        if packed.remaining() < LEN_PREFIX {
            return Err(DecodeError::TruncatedLength { index });
        }
        let len = packed.get_u32() as usize;
        if packed.remaining() < len {
            return Err(DecodeError::TruncatedPayload {
                index,
                expected: len,
                available: packed.remaining(),
            });
        }
        records.push(Record {
            payload: packed.split_to(len),
        });
    }

    if packed.has_remaining() {
        return Err(DecodeError::TrailingBytes(packed.remaining()));
    }

    Ok(Batch { records })
}
