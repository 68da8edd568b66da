// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Records and the binary stream container
//!
//! A record file is a raw concatenation of fixed-size records whose shape
//! is described by a declarative [`DataFormat`]: a sequence of named fields
//! with byte widths. Integer fields are little-endian; 1-byte fields are
//! unsigned, wider fields are read zero-extended into a signed 64-bit
//! value.

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info};

use crate::error::{MeterError, Result};
use crate::flowkey::FlowKey;

/// How a record contributes to a flow's aggregate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CntMethod {
    /// Count header + payload bytes.
    InLength,
    /// Each packet counts as 1.
    InPacket,
}

/// One packet's contribution to the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Record<const L: usize> {
    pub flowkey: FlowKey<L>,
    /// Microseconds; informational.
    pub timestamp: i64,
    /// IP datagram length in bytes, header included.
    pub length: i64,
}

#[derive(Clone, Copy, Debug)]
struct Field {
    offset: usize,
    length: usize,
}

/// Declarative record layout.
///
/// Recognised fields:
///
/// | Field name | Viable length | Constraints            |
/// |:-----------|:--------------|:-----------------------|
/// | flowkey    | 4, 8, 13      | exactly once           |
/// | timestamp  | 1, 2, 4, 8    | at most once           |
/// | length     | 1, 2, 4, 8    | at most once           |
/// | padding    | > 0           | none                   |
#[derive(Clone, Debug)]
pub struct DataFormat {
    key: Field,
    timestamp: Option<Field>,
    length: Option<Field>,
    total: usize,
}

impl DataFormat {
    /// Build a layout from `(field name, byte width)` pairs in file order.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut key = None;
        let mut timestamp = None;
        let mut length = None;
        let mut offset = 0usize;

        for (name, len) in fields {
            match name {
                "flowkey" => {
                    if key.is_some() {
                        return Err(MeterError::BadConfig(
                            "data format declares flowkey twice".into(),
                        ));
                    }
                    if !matches!(len, 4 | 8 | 13) {
                        return Err(MeterError::BadConfig(format!(
                            "flowkey field must be 4, 8 or 13 bytes, got {len}"
                        )));
                    }
                    key = Some(Field { offset, length: len });
                }
                "timestamp" => {
                    if timestamp.is_some() {
                        return Err(MeterError::BadConfig(
                            "data format declares timestamp twice".into(),
                        ));
                    }
                    if !matches!(len, 1 | 2 | 4 | 8) {
                        return Err(MeterError::BadConfig(format!(
                            "timestamp field must be 1, 2, 4 or 8 bytes, got {len}"
                        )));
                    }
                    timestamp = Some(Field { offset, length: len });
                }
                "length" => {
                    if length.is_some() {
                        return Err(MeterError::BadConfig(
                            "data format declares length twice".into(),
                        ));
                    }
                    if !matches!(len, 1 | 2 | 4 | 8) {
                        return Err(MeterError::BadConfig(format!(
                            "length field must be 1, 2, 4 or 8 bytes, got {len}"
                        )));
                    }
                    length = Some(Field { offset, length: len });
                }
                "padding" => {
                    if len == 0 {
                        return Err(MeterError::BadConfig(
                            "padding field must have positive length".into(),
                        ));
                    }
                }
                other => {
                    return Err(MeterError::BadConfig(format!(
                        "unknown data format field {other:?}"
                    )));
                }
            }
            offset += len;
        }

        let key = key.ok_or_else(|| {
            MeterError::BadConfig("data format declares no flowkey field".into())
        })?;
        Ok(Self {
            key,
            timestamp,
            length,
            total: offset,
        })
    }

    /// Total record size in bytes.
    pub fn record_len(&self) -> usize {
        self.total
    }

    /// Declared flow-key length in bytes.
    pub fn key_len(&self) -> usize {
        self.key.length
    }

    fn check_key_len<const L: usize>(&self) -> Result<()> {
        if self.key.length != L {
            return Err(MeterError::BadData(format!(
                "key length of record ({L}) and of data format ({}) mismatch",
                self.key.length
            )));
        }
        Ok(())
    }

    /// Unscramble one record out of `buf`, which must hold at least
    /// [`Self::record_len`] bytes.
    pub fn read_record<const L: usize>(&self, buf: &[u8]) -> Result<Record<L>> {
        self.check_key_len::<L>()?;
        if buf.len() < self.total {
            return Err(MeterError::BadData(format!(
                "record buffer holds {} bytes, format needs {}",
                buf.len(),
                self.total
            )));
        }

        let mut record = Record::<L>::default();
        record.flowkey =
            FlowKey::from_slice(&buf[self.key.offset..self.key.offset + self.key.length])?;
        if let Some(field) = self.timestamp {
            record.timestamp = read_int(&buf[field.offset..field.offset + field.length]);
        }
        if let Some(field) = self.length {
            record.length = read_int(&buf[field.offset..field.offset + field.length]);
        }
        Ok(record)
    }

    /// Scramble `record` into `buf` in the declared layout; padding bytes
    /// are zeroed.
    pub fn write_record<const L: usize>(&self, record: &Record<L>, buf: &mut [u8]) -> Result<()> {
        self.check_key_len::<L>()?;
        if buf.len() < self.total {
            return Err(MeterError::BadData(format!(
                "record buffer holds {} bytes, format needs {}",
                buf.len(),
                self.total
            )));
        }

        buf[..self.total].fill(0);
        buf[self.key.offset..self.key.offset + self.key.length]
            .copy_from_slice(record.flowkey.as_bytes());
        if let Some(field) = self.timestamp {
            write_int(
                &mut buf[field.offset..field.offset + field.length],
                record.timestamp,
            );
        }
        if let Some(field) = self.length {
            write_int(
                &mut buf[field.offset..field.offset + field.length],
                record.length,
            );
        }
        Ok(())
    }
}

fn read_int(buf: &[u8]) -> i64 {
    match buf.len() {
        1 => buf[0] as i64,
        2 => LittleEndian::read_u16(buf) as i64,
        4 => LittleEndian::read_u32(buf) as i64,
        _ => LittleEndian::read_i64(buf),
    }
}

fn write_int(buf: &mut [u8], value: i64) {
    match buf.len() {
        1 => buf[0] = value as u8,
        2 => LittleEndian::write_u16(buf, value as u16),
        4 => LittleEndian::write_u32(buf, value as u32),
        _ => LittleEndian::write_i64(buf, value),
    }
}

/// The formatted streaming data, fully loaded into memory.
#[derive(Clone, Debug, Default)]
pub struct StreamData<const L: usize> {
    records: Vec<Record<L>>,
}

impl<const L: usize> StreamData<L> {
    /// Load every record of `path` in the given format.
    ///
    /// The file size must be a multiple of the record size, otherwise the
    /// file is rejected as garbled.
    pub fn from_file(path: impl AsRef<Path>, format: &DataFormat) -> Result<Self> {
        let path = path.as_ref();
        info!("loading records from {}", path.display());
        let raw = fs::read(path)?;
        let record_len = format.record_len();
        if raw.len() % record_len != 0 {
            return Err(MeterError::BadData(format!(
                "size of {} is not a multiple of the record size, file could be garbled",
                path.display()
            )));
        }

        let mut records = Vec::with_capacity(raw.len() / record_len);
        for chunk in raw.chunks_exact(record_len) {
            records.push(format.read_record(chunk)?);
        }
        debug!("{} records loaded", records.len());
        Ok(Self { records })
    }

    /// Wrap records already in memory.
    pub fn from_records(records: Vec<Record<L>>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in input order.
    pub fn records(&self) -> &[Record<L>] {
        &self.records
    }

    /// The records in `[from, to)`; fails when the bounds are out of
    /// range.
    pub fn range(&self, from: usize, to: usize) -> Result<&[Record<L>]> {
        if from > to || to > self.records.len() {
            return Err(MeterError::OutOfRange {
                index: to,
                bound: self.records.len(),
            });
        }
        Ok(&self.records[from..to])
    }
}
