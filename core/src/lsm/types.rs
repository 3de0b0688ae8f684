//! Keys, values and the record format memtables store in their arena.

use std::cmp::Ordering;

use super::varint::{decode_varint, encode_varint, varint_len};
use crate::error::{CoreError, Result};

/// Per-memtable write counter. Higher is newer.
pub type SeqNum = u64;

macro_rules! byte_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name(pub Vec<u8>);

        impl $name {
            pub fn from_slice(data: &[u8]) -> Self {
                Self(data.to_vec())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.as_bytes().to_vec())
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(data: Vec<u8>) -> Self {
                Self(data)
            }
        }
    };
}

byte_newtype!(
    /// Lookup key. Orders bytewise.
    #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
    Key
);

byte_newtype!(
    #[derive(Clone, Debug, Eq, PartialEq)]
    Value
);

/// A memtable record. `value` is `None` for a tombstone.
#[derive(Clone, Debug)]
pub struct Entry {
    pub key: Key,
    pub seq_num: SeqNum,
    pub value: Option<Value>,
}

impl Entry {
    pub fn put(key: Key, seq_num: SeqNum, value: Value) -> Self {
        Self {
            key,
            seq_num,
            value: Some(value),
        }
    }

    pub fn delete(key: Key, seq_num: SeqNum) -> Self {
        Self {
            key,
            seq_num,
            value: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// `varint(klen) key seq:u64le flag:u8 [varint(vlen) value]`
    pub fn encoded_len(&self) -> usize {
        let head = varint_len(self.key.len() as u64) + self.key.len() + 9;
        head + self
            .value
            .as_ref()
            .map_or(0, |v| varint_len(v.len() as u64) + v.len())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        encode_varint(self.key.len() as u64, &mut out);
        out.extend_from_slice(self.key.as_bytes());
        out.extend_from_slice(&self.seq_num.to_le_bytes());
        match self.value {
            Some(ref value) => {
                out.push(0);
                encode_varint(value.len() as u64, &mut out);
                out.extend_from_slice(value.as_bytes());
            }
            None => out.push(1),
        }
        out
    }

    /// Decode a record. The whole slice must be consumed.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut offset = 0;

        let (key_len, n) = decode_varint(data)?;
        offset += n;
        let key = Key::from_slice(take(data, offset, key_len as usize)?);
        offset += key_len as usize;

        let seq_bytes: [u8; 8] = take(data, offset, 8)?
            .try_into()
            .map_err(|_| CoreError::Corrupted("invalid seq_num".into()))?;
        let seq_num = u64::from_le_bytes(seq_bytes);
        offset += 8;

        let is_tombstone = take(data, offset, 1)?[0] != 0;
        offset += 1;

        let value = if is_tombstone {
            None
        } else {
            let (value_len, n) = decode_varint(&data[offset..])?;
            offset += n;
            let value = Value::from_slice(take(data, offset, value_len as usize)?);
            offset += value_len as usize;
            Some(value)
        };

        if offset != data.len() {
            return Err(CoreError::Corrupted(format!(
                "{} trailing bytes after record",
                data.len() - offset
            )));
        }
        Ok(Self {
            key,
            seq_num,
            value,
        })
    }
}

fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| CoreError::Corrupted(format!("record truncated at byte {}", offset)))
}

/// Key ascending, newest first within a key.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.seq_num.cmp(&self.seq_num))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq_num == other.seq_num
    }
}
