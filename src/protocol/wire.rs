//! # Primitive Wire Readers
//!
//! Bounds-checked readers for the jute encoding used by ZooKeeper: big-endian
//! fixed-width integers, single-byte booleans, length-prefixed buffers, and
//! the composite records built from them (ACL lists, string lists, stats).
//!
//! The offset-based functions never index past the end of the buffer. A read
//! that would overrun returns a [`DecodeError`]; the message decoders turn
//! that into "no message". [`WireReader`] is a sequential cursor layered on
//! the same functions.

use crate::protocol::message::{Acl, ZnodeStat};

/// Size of an encoded [`ZnodeStat`].
pub const STAT_LEN: usize = 68;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A read that does not fit in the captured bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("need {needed} bytes at offset {offset}, buffer has {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("length prefix {length} at offset {offset} overruns buffer of {len} bytes")]
    Overrun {
        offset: usize,
        length: i32,
        len: usize,
    },
}

fn take<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(DecodeError::Truncated {
            offset,
            needed: N,
            len: buf.len(),
        })
}

// ---------------------------------------------------------------------------
// Offset readers
// ---------------------------------------------------------------------------

/// Read a big-endian `i32` at `offset`.
pub fn read_i32(buf: &[u8], offset: usize) -> Result<i32, DecodeError> {
    take::<4>(buf, offset).map(i32::from_be_bytes)
}

/// Read a big-endian `i64` at `offset`.
pub fn read_i64(buf: &[u8], offset: usize) -> Result<i64, DecodeError> {
    take::<8>(buf, offset).map(i64::from_be_bytes)
}

/// Read a boolean byte. Out-of-range offsets read as `false`, which is what
/// older clients that omit trailing flags mean.
pub fn read_bool(buf: &[u8], offset: usize) -> bool {
    buf.get(offset).is_some_and(|b| *b != 0)
}

/// Read a length-prefixed buffer at `offset`.
///
/// Returns `Ok(None)` for a negative length (a null buffer), which is distinct
/// from `Ok(Some(&[]))`.
pub fn read_buffer(buf: &[u8], offset: usize) -> Result<Option<&[u8]>, DecodeError> {
    let length = read_i32(buf, offset)?;
    if length < 0 {
        return Ok(None);
    }

    let start = offset + 4;
    start
        .checked_add(length as usize)
        .and_then(|end| buf.get(start..end))
        .map(Some)
        .ok_or(DecodeError::Overrun {
            offset,
            length,
            len: buf.len(),
        })
}

/// Number of bytes a buffer read at some offset occupied on the wire.
pub fn encoded_len(buffer: Option<&[u8]>) -> usize {
    4 + buffer.map_or(0, <[u8]>::len)
}

/// Read a length-prefixed buffer as text. Invalid UTF-8 is replaced rather
/// than rejected so that a mangled path still shows up in the output.
pub fn read_string(buf: &[u8], offset: usize) -> Result<Option<String>, DecodeError> {
    Ok(read_buffer(buf, offset)?.map(|b| String::from_utf8_lossy(b).into_owned()))
}

/// Read an ACL vector. Returns the entries and the offset following the last
/// one. A negative count is an empty list.
pub fn read_acl_list(buf: &[u8], offset: usize) -> Result<(Vec<Acl>, usize), DecodeError> {
    let mut reader = WireReader::at(buf, offset);
    let acls = reader.acl_list()?;
    Ok((acls, reader.position()))
}

/// Read a vector of strings (children names, watch paths). Returns the
/// entries and the offset following the last one.
pub fn read_string_list(buf: &[u8], offset: usize) -> Result<(Vec<String>, usize), DecodeError> {
    let mut reader = WireReader::at(buf, offset);
    let items = reader.string_list()?;
    Ok((items, reader.position()))
}

/// Read a 68-byte [`ZnodeStat`] at `offset`.
pub fn read_stat(buf: &[u8], offset: usize) -> Result<ZnodeStat, DecodeError> {
    WireReader::at(buf, offset).stat()
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// Sequential reader over an immutable payload.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Start reading `buf` at `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        let value = read_i32(self.buf, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    pub fn i64(&mut self) -> Result<i64, DecodeError> {
        let value = read_i64(self.buf, self.pos)?;
        self.pos += 8;
        Ok(value)
    }

    pub fn bool(&mut self) -> bool {
        let value = read_bool(self.buf, self.pos);
        self.pos += 1;
        value
    }

    pub fn buffer(&mut self) -> Result<Option<&'a [u8]>, DecodeError> {
        let value = read_buffer(self.buf, self.pos)?;
        self.pos += encoded_len(value);
        Ok(value)
    }

    pub fn string(&mut self) -> Result<Option<String>, DecodeError> {
        Ok(self
            .buffer()?
            .map(|b| String::from_utf8_lossy(b).into_owned()))
    }

    /// A znode path. A null path reads as empty.
    pub fn path(&mut self) -> Result<String, DecodeError> {
        Ok(self.string()?.unwrap_or_default())
    }

    /// A buffer whose content the decoders do not keep (e.g. create data).
    pub fn skip_buffer(&mut self) -> Result<(), DecodeError> {
        self.buffer().map(|_| ())
    }

    pub fn acl_list(&mut self) -> Result<Vec<Acl>, DecodeError> {
        let count = self.i32()?;
        // The count is untrusted, so no preallocation.
        let mut acls = Vec::new();
        for _ in 0..count.max(0) {
            let perms = self.i32()?;
            let scheme = self.string()?.unwrap_or_default();
            let credential = self.string()?.unwrap_or_default();
            acls.push(Acl {
                perms,
                scheme,
                credential,
            });
        }
        Ok(acls)
    }

    pub fn string_list(&mut self) -> Result<Vec<String>, DecodeError> {
        let count = self.i32()?;
        let mut items = Vec::new();
        for _ in 0..count.max(0) {
            items.push(self.string()?.unwrap_or_default());
        }
        Ok(items)
    }

    pub fn stat(&mut self) -> Result<ZnodeStat, DecodeError> {
        let available = self.buf.len().saturating_sub(self.pos);
        if available < STAT_LEN {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: STAT_LEN,
                len: self.buf.len(),
            });
        }

        Ok(ZnodeStat {
            czxid: self.i64()?,
            mzxid: self.i64()?,
            ctime: self.i64()?,
            mtime: self.i64()?,
            version: self.i32()?,
            cversion: self.i32()?,
            aversion: self.i32()?,
            ephemeral_owner: self.i64()?,
            data_length: self.i32()?,
            num_children: self.i32()?,
            pzxid: self.i64()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
