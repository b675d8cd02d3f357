//! Append-only store file
//!
//! Each record is a brace-delimited block of `key:value` lines:
//!
//! ```text
//! {
//! name:Noodle Bar
//! address:12 Main St
//! bindPassword:hunter2
//! phoneNum:555-0100
//! }
//! ```

use crate::codec::{self, CodecError};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default store file name
pub const DEFAULT_STORE_FILE: &str = "storesList.txt";

/// Field names, in the order they must appear in the query
pub const STORE_FIELDS: [&str; 4] = ["name", "address", "bindPassword", "phoneNum"];

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Wrong number of fields
    #[error("expected {} fields, got {0}", STORE_FIELDS.len())]
    FieldCount(usize),

    /// A field is not the one expected at its position
    #[error("expected field '{expected}', got '{found}'")]
    UnexpectedField {
        /// Field name required at this position
        expected: &'static str,
        /// Field name that was supplied
        found: String,
    },

    /// A value would break the line-based record format
    #[error("field '{0}' contains a line break")]
    InvalidValue(&'static str),

    /// The encoded field could not be decoded
    #[error("field 'bindPassword': {0}")]
    Codec(#[from] CodecError),

    /// The store file is corrupt
    #[error("malformed store file at line {line}: {reason}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// File I/O error
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// One store registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    /// Store name
    pub name: String,
    /// Street address
    pub address: String,
    /// Password used to bind the store, decoded from base64
    pub bind_password: String,
    /// Contact phone number
    pub phone_num: String,
}

impl StoreRecord {
    /// Build a record from query pairs.
    ///
    /// Exactly the keys in [`STORE_FIELDS`] must be present, in that order.
    /// `bindPassword` is base64 in either alphabet and is decoded here.
    pub fn from_query(query: &[(String, String)]) -> Result<StoreRecord, StoreError> {
        if query.len() != STORE_FIELDS.len() {
            return Err(StoreError::FieldCount(query.len()));
        }

        let mut values = Vec::with_capacity(STORE_FIELDS.len());
        for ((key, value), expected) in query.iter().zip(STORE_FIELDS) {
            if key != expected {
                return Err(StoreError::UnexpectedField {
                    expected,
                    found: key.clone(),
                });
            }
            values.push(value.as_str());
        }

        let record = StoreRecord {
            name: values[0].to_string(),
            address: values[1].to_string(),
            bind_password: codec::decode_to_string(values[2], false)?,
            phone_num: values[3].to_string(),
        };
        record.validate()?;
        Ok(record)
    }

    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            (STORE_FIELDS[0], &self.name),
            (STORE_FIELDS[1], &self.address),
            (STORE_FIELDS[2], &self.bind_password),
            (STORE_FIELDS[3], &self.phone_num),
        ]
    }

    fn validate(&self) -> Result<(), StoreError> {
        for (key, value) in self.fields() {
            if value.contains(['\n', '\r']) {
                return Err(StoreError::InvalidValue(key));
            }
        }
        Ok(())
    }

    fn to_block(&self) -> String {
        let mut block = String::from("{\n");
        for (key, value) in self.fields() {
            block.push_str(key);
            block.push(':');
            block.push_str(value);
            block.push('\n');
        }
        block.push_str("}\n");
        block
    }
}

/// Append-only flat file of store records.
///
/// Appends from concurrent tasks are serialized so blocks never interleave.
#[derive(Debug)]
pub struct StoreFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StoreFile {
    /// Store backed by `path`; the file is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record
    pub fn append(&self, record: &StoreRecord) -> Result<(), StoreError> {
        record.validate()?;
        let block = record.to_block();

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Read every record back; a missing file holds no records
    pub fn load(&self) -> Result<Vec<StoreRecord>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        parse_records(&contents)
    }
}

fn parse_records(contents: &str) -> Result<Vec<StoreRecord>, StoreError> {
    let mut records = Vec::new();
    let mut current: Option<Vec<String>> = None;

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let malformed = |reason: &str| StoreError::Malformed {
            line: line_no,
            reason: reason.to_string(),
        };

        match (line, current.as_mut()) {
            ("", None) => {}
            ("{", None) => current = Some(Vec::with_capacity(STORE_FIELDS.len())),
            ("{", Some(_)) => return Err(malformed("nested record")),
            ("}", Some(values)) => {
                if values.len() != STORE_FIELDS.len() {
                    return Err(malformed("incomplete record"));
                }
                let mut values = std::mem::take(values).into_iter();
                records.push(StoreRecord {
                    name: values.next().unwrap_or_default(),
                    address: values.next().unwrap_or_default(),
                    bind_password: values.next().unwrap_or_default(),
                    phone_num: values.next().unwrap_or_default(),
                });
                current = None;
            }
            (_, None) => return Err(malformed("data outside a record")),
            (field, Some(values)) => {
                let expected = STORE_FIELDS
                    .get(values.len())
                    .ok_or_else(|| malformed("too many fields"))?;
                let value = field
                    .strip_prefix(expected)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .ok_or_else(|| malformed(&format!("expected field '{}'", expected)))?;
                values.push(value.to_string());
            }
        }
    }

    if current.is_some() {
        return Err(StoreError::Malformed {
            line: contents.lines().count(),
            reason: "unterminated record".to_string(),
        });
    }
    Ok(records)
}
