//! The preview1 `errno` taxonomy (spec §7) and the single boundary that maps
//! host I/O failures onto it. Host functions never let a Rust panic or a raw
//! `std::io::Error` cross the guest boundary; everything funnels through
//! [`Errno`].

use std::io;

/// A preview1 error code. Only the subset this crate can actually produce is
/// represented — there is no socket- or clock-specific variant, since those
/// subsystems are out of scope (spec §1).
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum Errno {
    #[error("no error")]
    Success = 0,
    #[error("permission denied")]
    Acces = 2,
    #[error("resource unavailable, try again")]
    Again = 6,
    #[error("bad file descriptor")]
    Badf = 8,
    #[error("file exists")]
    Exist = 20,
    #[error("bad address")]
    Fault = 21,
    #[error("interrupted function")]
    Intr = 27,
    #[error("invalid argument")]
    Inval = 28,
    #[error("i/o error")]
    Io = 29,
    #[error("is a directory")]
    Isdir = 31,
    #[error("too many levels of symbolic links")]
    Loop = 32,
    #[error("too many open files")]
    Mfile = 33,
    #[error("too many open files in system")]
    Nfile = 41,
    #[error("no such file or directory")]
    Noent = 44,
    #[error("no space left on device")]
    Nospc = 51,
    #[error("function not supported")]
    Nosys = 52,
    #[error("not a directory or a symbolic link to a directory")]
    Notdir = 54,
    #[error("directory not empty")]
    Notempty = 55,
    #[error("not supported, or operation not supported on socket")]
    Notsup = 58,
    #[error("invalid seek")]
    Spipe = 70,
    #[error("capabilities insufficient")]
    Notcapable = 76,
}

impl Errno {
    /// The raw `u32` value every `wasi_snapshot_preview1` export returns.
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Maps a host I/O failure onto the closest preview1 errno. This is the
    /// single boundary function host I/O adapter code should call — never
    /// match on `io::ErrorKind`/raw os errors inline at a call site.
    pub fn from_io_error(err: &io::Error) -> Errno {
        #[cfg(unix)]
        if let Some(raw) = err.raw_os_error() {
            if let Some(errno) = Self::from_raw_os_error(raw) {
                return errno;
            }
        }
        match err.kind() {
            io::ErrorKind::NotFound => Errno::Noent,
            io::ErrorKind::PermissionDenied => Errno::Acces,
            io::ErrorKind::AlreadyExists => Errno::Exist,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Errno::Inval,
            io::ErrorKind::WouldBlock => Errno::Again,
            io::ErrorKind::Interrupted => Errno::Intr,
            io::ErrorKind::Unsupported => Errno::Notsup,
            _ => Errno::Io,
        }
    }

    #[cfg(unix)]
    fn from_raw_os_error(raw: i32) -> Option<Errno> {
        let e = rustix::io::Errno::from_raw_os_error(raw);
        Some(match e {
            _ if e == rustix::io::Errno::NOENT => Errno::Noent,
            _ if e == rustix::io::Errno::ACCES => Errno::Acces,
            _ if e == rustix::io::Errno::EXIST => Errno::Exist,
            _ if e == rustix::io::Errno::NOTDIR => Errno::Notdir,
            _ if e == rustix::io::Errno::ISDIR => Errno::Isdir,
            _ if e == rustix::io::Errno::NOTEMPTY => Errno::Notempty,
            _ if e == rustix::io::Errno::LOOP => Errno::Loop,
            _ if e == rustix::io::Errno::MFILE => Errno::Mfile,
            _ if e == rustix::io::Errno::NFILE => Errno::Nfile,
            _ if e == rustix::io::Errno::NOSPC => Errno::Nospc,
            _ if e == rustix::io::Errno::NOSYS => Errno::Nosys,
            _ if e == rustix::io::Errno::SPIPE => Errno::Spipe,
            _ if e == rustix::io::Errno::AGAIN => Errno::Again,
            _ if e == rustix::io::Errno::INTR => Errno::Intr,
            _ if e == rustix::io::Errno::INVAL => Errno::Inval,
            _ if e == rustix::io::Errno::OPNOTSUPP || e == rustix::io::Errno::NOTSUP => {
                Errno::Notsup
            }
            _ => return None,
        })
    }
}

pub type Result<T> = std::result::Result<T, Errno>;
