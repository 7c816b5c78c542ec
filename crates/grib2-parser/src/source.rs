//! Byte sources the record scanner reads from.
//!
//! A source hands out owned spans on demand so a scan over a large file only
//! keeps the message currently being decoded in memory.

use crate::error::{Grib2Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Random-access byte source.
pub trait ByteSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Read exactly `length` bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Bytes>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_span(offset: u64, length: usize, end: u64) -> Result<()> {
    match offset.checked_add(length as u64) {
        Some(stop) if stop <= end => Ok(()),
        _ => Err(Grib2Error::OutOfBounds {
            offset,
            requested: length as u64,
            end,
        }),
    }
}

/// Source over bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, length: usize) -> Result<Bytes> {
        check_span(offset, length, self.len())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + length))
    }
}

/// Source over a file on disk. The handle is closed when the source is dropped.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    length: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let length = file.metadata()?.len();
        Ok(Self { file, path, length })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.length
    }

    fn read_at(&mut self, offset: u64, length: usize) -> Result<Bytes> {
        check_span(offset, length, self.length)?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; length];
        self.file.read_exact(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }
}
