//! The polymorphic stream a descriptor owns (spec §9 Design Notes): a tagged
//! variant over host-file / in-memory / stdio backing, queried for capability
//! bits rather than introspected through a class hierarchy.

use crate::errno::Errno;
use crate::types::{Advice, Filesize};
use cap_std::fs::Metadata;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Which standard stream a `Stdio` variant backs, and the direction I/O can
/// flow (stdin is read-only, stdout/stderr are write-only, matching POSIX).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StdioKind {
    In,
    Out,
    Err,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct StreamCaps {
    pub read: bool,
    pub write: bool,
    pub seek: bool,
    pub sync: bool,
    pub truncate: bool,
}

pub enum Stream {
    File(cap_std::fs::File),
    Dir(cap_std::fs::Dir),
    /// `/dev/null`: reads return 0 bytes, writes discard (spec §8 boundary
    /// behavior).
    Null,
    Stdio(StdioKind),
    /// Set by `DescriptorTable::remove`/`renumber` for regular files, whose
    /// backing stream is closed as a side effect (spec §4.1).
    Closed,
}

impl Stream {
    pub fn capabilities(&self) -> StreamCaps {
        match self {
            Stream::File(_) => StreamCaps {
                read: true,
                write: true,
                seek: true,
                sync: true,
                truncate: true,
            },
            Stream::Dir(_) => StreamCaps::default(),
            Stream::Null => StreamCaps {
                read: true,
                write: true,
                ..StreamCaps::default()
            },
            Stream::Stdio(StdioKind::In) => StreamCaps {
                read: true,
                ..StreamCaps::default()
            },
            Stream::Stdio(StdioKind::Out) | Stream::Stdio(StdioKind::Err) => StreamCaps {
                write: true,
                ..StreamCaps::default()
            },
            Stream::Closed => StreamCaps::default(),
        }
    }

    /// A stream is open iff probing any capability on it succeeds without
    /// fault (spec §9 Open Question) — `Closed` is the only variant for
    /// which that probe is defined to fail.
    pub fn is_open(&self) -> bool {
        !matches!(self, Stream::Closed)
    }

    pub fn read_vectored(&mut self, bufs: &mut [io::IoSliceMut]) -> Result<usize, Errno> {
        match self {
            Stream::File(f) => f.read_vectored(bufs).map_err(|e| Errno::from_io_error(&e)),
            Stream::Null => Ok(0),
            Stream::Stdio(StdioKind::In) => io::stdin()
                .lock()
                .read_vectored(bufs)
                .map_err(|e| Errno::from_io_error(&e)),
            Stream::Dir(_) => Err(Errno::Isdir),
            _ => Err(Errno::Badf),
        }
    }

    pub fn write_vectored(&mut self, bufs: &[io::IoSlice]) -> Result<usize, Errno> {
        match self {
            Stream::File(f) => f.write_vectored(bufs).map_err(|e| Errno::from_io_error(&e)),
            Stream::Null => Ok(bufs.iter().map(|b| b.len()).sum()),
            Stream::Stdio(StdioKind::Out) => io::stdout()
                .lock()
                .write_vectored(bufs)
                .map_err(|e| Errno::from_io_error(&e)),
            Stream::Stdio(StdioKind::Err) => io::stderr()
                .lock()
                .write_vectored(bufs)
                .map_err(|e| Errno::from_io_error(&e)),
            Stream::Dir(_) => Err(Errno::Isdir),
            _ => Err(Errno::Badf),
        }
    }

    pub fn pread(&self, buf: &mut [u8], offset: u64) -> Result<usize, Errno> {
        match self {
            Stream::File(f) => {
                let mut f = f.try_clone().map_err(|e| Errno::from_io_error(&e))?;
                f.seek(SeekFrom::Start(offset))
                    .map_err(|e| Errno::from_io_error(&e))?;
                f.read(buf).map_err(|e| Errno::from_io_error(&e))
            }
            Stream::Null => Ok(0),
            Stream::Dir(_) => Err(Errno::Isdir),
            _ => Err(Errno::Badf),
        }
    }

    pub fn pwrite(&self, buf: &[u8], offset: u64) -> Result<usize, Errno> {
        match self {
            Stream::File(f) => {
                let mut f = f.try_clone().map_err(|e| Errno::from_io_error(&e))?;
                f.seek(SeekFrom::Start(offset))
                    .map_err(|e| Errno::from_io_error(&e))?;
                f.write(buf).map_err(|e| Errno::from_io_error(&e))
            }
            Stream::Null => Ok(buf.len()),
            Stream::Dir(_) => Err(Errno::Isdir),
            _ => Err(Errno::Badf),
        }
    }

    /// Implements `fd_seek`'s whence handling; non-seekable streams report
    /// `ESPIPE` for anything but a degenerate `CUR`/`0` seek (spec §4.4).
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, Errno> {
        match self {
            Stream::File(f) => f.seek(pos).map_err(|e| Errno::from_io_error(&e)),
            _ => Err(Errno::Spipe),
        }
    }

    pub fn sync(&self, data_only: bool) -> Result<(), Errno> {
        match self {
            Stream::File(f) => {
                let res = if data_only { f.sync_data() } else { f.sync_all() };
                res.map_err(|e| Errno::from_io_error(&e))
            }
            Stream::Null | Stream::Stdio(_) => Ok(()),
            _ => Err(Errno::Inval),
        }
    }

    pub fn advise(&self, offset: Filesize, len: Filesize, advice: Advice) -> Result<(), Errno> {
        match self {
            Stream::File(f) => {
                let advice = match advice {
                    Advice::Normal => system_interface::fs::Advice::Normal,
                    Advice::Sequential => system_interface::fs::Advice::Sequential,
                    Advice::Random => system_interface::fs::Advice::Random,
                    Advice::Willneed => system_interface::fs::Advice::WillNeed,
                    Advice::Dontneed => system_interface::fs::Advice::DontNeed,
                    Advice::Noreuse => system_interface::fs::Advice::NoReuse,
                };
                system_interface::fs::FileIoExt::advise(f, offset, len, advice)
                    .map_err(|e| Errno::from_io_error(&e))
            }
            _ => Err(Errno::Badf),
        }
    }

    /// Extends the file with zero bytes if needed; emulates `fd_allocate`
    /// when the host has no dedicated syscall for it (spec §4.4).
    pub fn allocate(&self, offset: Filesize, len: Filesize) -> Result<(), Errno> {
        match self {
            Stream::File(f) => {
                let want = offset.checked_add(len).ok_or(Errno::Inval)?;
                let cur = f.metadata().map_err(|e| Errno::from_io_error(&e))?.len();
                if want > cur {
                    f.set_len(want).map_err(|e| Errno::from_io_error(&e))?;
                }
                Ok(())
            }
            _ => Err(Errno::Badf),
        }
    }

    pub fn set_len(&self, size: Filesize) -> Result<(), Errno> {
        match self {
            Stream::File(f) => f.set_len(size).map_err(|e| Errno::from_io_error(&e)),
            _ => Err(Errno::Badf),
        }
    }

    pub fn metadata(&self) -> Result<Metadata, Errno> {
        match self {
            Stream::File(f) => f.metadata().map_err(|e| Errno::from_io_error(&e)),
            Stream::Dir(d) => d.dir_metadata().map_err(|e| Errno::from_io_error(&e)),
            _ => Err(Errno::Badf),
        }
    }

    pub fn set_times(
        &self,
        atim: Option<fs_set_times::SystemTimeSpec>,
        mtim: Option<fs_set_times::SystemTimeSpec>,
    ) -> Result<(), Errno> {
        use fs_set_times::SetTimes;
        match self {
            Stream::File(f) => f.set_times(atim, mtim).map_err(|e| Errno::from_io_error(&e)),
            Stream::Dir(d) => d.set_times(atim, mtim).map_err(|e| Errno::from_io_error(&e)),
            _ => Err(Errno::Badf),
        }
    }

    /// Closes the backing resource in place, leaving the variant as
    /// `Closed`. Used by `DescriptorTable::remove`/`renumber` for regular
    /// files only (spec §4.1) — directories and special devices release
    /// only their table slot.
    pub fn close_in_place(&mut self) {
        *self = Stream::Closed;
    }
}
