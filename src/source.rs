//! Byte sources for record readers.
//!
//! Regular files are memory-mapped. Anything that cannot be mapped (FIFOs,
//! character devices, empty files) is read through the file handle instead.
//! Both variants implement [`Read`] and [`Seek`] with the same semantics, so
//! readers do not need to know which one they got.

use crate::error::Result;
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A readable, seekable view of a file.
#[derive(Debug)]
pub enum ByteSource {
    /// A memory-mapped regular file
    Mapped {
        /// The mapping
        map: Mmap,
        /// Current read offset
        position: usize,
    },
    /// A file read through its handle (pipes, FIFOs, empty files)
    Streamed {
        /// The open file
        file: File,
        /// Bytes consumed so far, or the last seek target
        position: u64,
        /// Size of the file, if it is a regular file
        size: Option<u64>,
    },
}

impl ByteSource {
    /// Open `path`, mapping it into memory if it is a non-empty regular file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, inspected or mapped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;

        if metadata.is_file() && metadata.len() > 0 {
            // SAFETY: the mapping is read-only. Callers must not truncate
            // the file while a reader holds it, as with any mmap-based reader.
            #[allow(unsafe_code)]
            let map = unsafe { Mmap::map(&file)? };
            debug!("memory-mapped {} ({} bytes)", path.display(), map.len());
            return Ok(ByteSource::Mapped { map, position: 0 });
        }

        debug!("streaming {}", path.display());
        Ok(ByteSource::Streamed {
            file,
            position: 0,
            size: metadata.is_file().then(|| metadata.len()),
        })
    }

    /// Whether the source is memory-mapped.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, ByteSource::Mapped { .. })
    }

    /// Current read offset in bytes.
    #[must_use]
    pub fn tell(&self) -> u64 {
        match self {
            ByteSource::Mapped { position, .. } => *position as u64,
            ByteSource::Streamed { position, .. } => *position,
        }
    }

    /// Total size in bytes, if known. Pipes have no size.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match self {
            ByteSource::Mapped { map, .. } => Some(map.len() as u64),
            ByteSource::Streamed { size, .. } => *size,
        }
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Mapped { map, position } => {
                let remaining = map.get(*position..).unwrap_or_default();
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                *position += n;
                Ok(n)
            },
            ByteSource::Streamed { file, position, .. } => {
                let n = file.read(buf)?;
                *position += n as u64;
                Ok(n)
            },
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ByteSource::Mapped { map, position } => {
                let target = match pos {
                    SeekFrom::Start(offset) => Some(offset),
                    SeekFrom::End(delta) => (map.len() as u64).checked_add_signed(delta),
                    SeekFrom::Current(delta) => (*position as u64).checked_add_signed(delta),
                };
                let target = target.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
                })?;
                *position = usize::try_from(target).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range")
                })?;
                Ok(target)
            },
            ByteSource::Streamed { file, position, .. } => {
                *position = file.seek(pos)?;
                Ok(*position)
            },
        }
    }
}
