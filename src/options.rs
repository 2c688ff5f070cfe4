//! Configuration surface: `Options`, `ReadOptions`, `WriteOptions`, and the
//! small text-formatting helpers historically bundled alongside them.

use std::sync::Arc;

use crate::dbformat::SequenceNumber;
use crate::env::Env;
use crate::env::Logger;
use crate::util::{BytewiseComparator, Comparator, FilterPolicy};

/// Compression applied to blocks before they are written to a file.
/// `Snappy` is the default to match upstream LevelDB; this crate does not
/// implement a block layer, so the variant is carried purely as
/// configuration state for whatever assembles blocks downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Snappy,
    Zstd,
}

pub struct Options {
    pub comparator: Arc<dyn Comparator>,
    pub create_if_missing: bool,
    pub error_if_exists: bool,
    pub paranoid_checks: bool,
    pub env: Option<Arc<dyn Env>>,
    pub info_log: Option<Arc<dyn Logger>>,
    pub write_buffer_size: usize,
    pub max_open_files: i32,
    /// No block/SSTable cache layer exists in this crate; always `None`.
    pub block_cache: Option<()>,
    pub block_size: usize,
    pub block_restart_interval: i32,
    pub max_file_size: usize,
    pub compression: Compression,
    pub zstd_compression_level: i32,
    pub reuse_logs: bool,
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            comparator: Arc::new(BytewiseComparator::new()),
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            env: None,
            info_log: None,
            write_buffer_size: 4 << 20,
            max_open_files: 1000,
            block_cache: None,
            block_size: 4 << 10,
            block_restart_interval: 16,
            max_file_size: 2 << 20,
            compression: Compression::Snappy,
            zstd_compression_level: 1,
            reuse_logs: false,
            filter_policy: None,
        }
    }
}

pub struct ReadOptions {
    pub verify_checksums: bool,
    pub fill_cache: bool,
    /// A snapshot is the bare sequence-number token the core reads "as of";
    /// there is no owned/refcounted `Snapshot` object to manage here.
    pub snapshot: Option<SequenceNumber>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WriteOptions {
    pub sync: bool,
}

pub fn append_number(dst: &mut String, num: u64) {
    dst.push_str(&num.to_string());
}

pub fn number_to_string(num: u64) -> String {
    let mut r = String::new();
    append_number(&mut r, num);
    r
}

/// Appends `value` with non-printable bytes rendered as `\xHH`.
pub fn append_escaped_string(dst: &mut String, value: &[u8]) {
    for &byte in value {
        if (0x20..0x7f).contains(&byte) {
            dst.push(byte as char);
        } else {
            dst.push_str(&format!("\\x{:02x}", byte));
        }
    }
}

pub fn escape_string(value: &[u8]) -> String {
    let mut r = String::new();
    append_escaped_string(&mut r, value);
    r
}

/// Parses a leading run of ASCII digits off the front of `input`, returning
/// `(value, bytes_consumed)`. Returns `None` on overflow or if `input`
/// starts with no digits at all.
pub fn consume_decimal_number(input: &mut &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    let mut consumed = 0;
    for &byte in input.iter() {
        if !byte.is_ascii_digit() {
            break;
        }
        let digit = (byte - b'0') as u64;
        value = value.checked_mul(10)?.checked_add(digit)?;
        consumed += 1;
    }
    if consumed == 0 {
        return None;
    }
    *input = &input[consumed..];
    Some(value)
}
