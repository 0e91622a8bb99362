//! `FileDescriptor`: the data model from spec §3. Ownership is unidirectional
//! (the descriptor owns its stream; the stream never references its id or
//! the table, spec §9 Design Notes), so a descriptor is plain data guarded by
//! interior mutability for the few fields a running guest can mutate.

use crate::stream::Stream;
use crate::types::{AccessMode, FdFlags, Filetype, Rights};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Copy, Clone)]
pub struct RightsPair {
    pub base: Rights,
    pub inheriting: Rights,
}

impl RightsPair {
    pub fn contains(&self, required: Rights) -> bool {
        self.base.contains(required)
    }
}

pub struct FileDescriptor {
    id: AtomicU32,
    pub path: String,
    pub file_type: Filetype,
    pub stream: Mutex<Stream>,
    pub access_mode: AccessMode,
    rights: Mutex<RightsPair>,
    fd_flags: Mutex<FdFlags>,
    pub is_preopened: bool,
    /// Current byte offset for seekable streams; undefined and unused for
    /// directories (spec §3 invariants).
    offset: AtomicU64,
}

impl FileDescriptor {
    pub fn new(
        id: u32,
        path: String,
        file_type: Filetype,
        stream: Stream,
        access_mode: AccessMode,
        rights: RightsPair,
        fd_flags: FdFlags,
        is_preopened: bool,
    ) -> Self {
        Self {
            id: AtomicU32::new(id),
            path,
            file_type,
            stream: Mutex::new(stream),
            access_mode,
            rights: Mutex::new(rights),
            fd_flags: Mutex::new(fd_flags),
            is_preopened,
            offset: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u32 {
        self.id.load(Ordering::SeqCst)
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.id.store(id, Ordering::SeqCst);
    }

    pub fn rights(&self) -> RightsPair {
        *self.rights.lock().unwrap()
    }

    pub fn set_rights(&self, rights: RightsPair) {
        *self.rights.lock().unwrap() = rights;
    }

    pub fn fd_flags(&self) -> FdFlags {
        *self.fd_flags.lock().unwrap()
    }

    pub fn set_fd_flags(&self, flags: FdFlags) {
        *self.fd_flags.lock().unwrap() = flags;
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub fn set_offset(&self, offset: u64) {
        self.offset.store(offset, Ordering::SeqCst);
    }

    pub fn advance_offset(&self, by: u64) {
        self.offset.fetch_add(by, Ordering::SeqCst);
    }

    pub fn has_rights(&self, required: Rights) -> bool {
        self.rights().contains(required)
    }
}
