//! The Descriptor Table (spec §4.1): smallest-free-id allocation, lookup,
//! and atomic removal/renumbering. A single `RwLock` over the id→descriptor
//! map gives readers and writers the concurrency discipline spec §5 asks
//! for (disjoint-key reads never corrupt, bulk scans may race with
//! concurrent inserts) without introducing a lock-free map crate the
//! teacher's own dependency list does not carry (see `DESIGN.md`).

use crate::descriptor::FileDescriptor;
use crate::errno::Errno;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Ids 0, 1, and 2 are always reserved for stdio (spec §3 invariants),
/// whether or not a stream was actually bound to them.
const RESERVED_IDS: [u32; 3] = [0, 1, 2];

pub struct DescriptorTable {
    inner: RwLock<HashMap<u32, Arc<FileDescriptor>>>,
    max_open: usize,
}

impl DescriptorTable {
    pub fn new(max_open: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_open,
        }
    }

    /// Binds `fd` at a specific id, bypassing smallest-free allocation. Used
    /// only during construction, for stdio and preopens (spec §3
    /// Lifecycle).
    pub fn insert_at(&self, id: u32, fd: FileDescriptor) {
        fd.set_id(id);
        self.inner.write().unwrap().insert(id, Arc::new(fd));
    }

    /// Allocates the smallest id not in `RESERVED_IDS` and not already in
    /// use. Fails with `ENFILE` if the configured maximum would be
    /// exceeded (spec §4.1).
    pub fn insert(&self, fd: FileDescriptor) -> Result<u32, Errno> {
        let mut map = self.inner.write().unwrap();
        if map.len() >= self.max_open {
            return Err(Errno::Nfile);
        }
        let mut candidate = 0u32;
        loop {
            if !RESERVED_IDS.contains(&candidate) && !map.contains_key(&candidate) {
                break;
            }
            candidate += 1;
        }
        fd.set_id(candidate);
        map.insert(candidate, Arc::new(fd));
        Ok(candidate)
    }

    pub fn get(&self, id: u32) -> Result<Arc<FileDescriptor>, Errno> {
        self.inner
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Errno::Badf)
    }

    /// Linear scan for the first descriptor bound to `path`. Used by
    /// preopen unbinding (spec §4.1).
    pub fn get_by_path(&self, path: &str) -> Option<Arc<FileDescriptor>> {
        self.inner
            .read()
            .unwrap()
            .values()
            .find(|fd| fd.path == path)
            .cloned()
    }

    /// Removes `id` atomically. Regular-file descriptors have their
    /// backing stream closed as a side effect; directories and special
    /// devices release only their table slot (spec §4.1).
    pub fn remove(&self, id: u32) -> Result<(), Errno> {
        let mut map = self.inner.write().unwrap();
        let fd = map.remove(&id).ok_or(Errno::Badf)?;
        Self::close_if_regular_file(&fd);
        Ok(())
    }

    /// Moves the descriptor at `from` to `to`, closing whatever previously
    /// occupied `to` first (spec §4.1). Atomic: on `EBADF` the table is
    /// unchanged, since the lock is held for the whole operation and no
    /// partial mutation is visible.
    pub fn renumber(&self, from: u32, to: u32) -> Result<(), Errno> {
        let mut map = self.inner.write().unwrap();
        if !map.contains_key(&from) {
            return Err(Errno::Badf);
        }
        if from == to {
            return Ok(());
        }
        if let Some(existing) = map.remove(&to) {
            Self::close_if_regular_file(&existing);
        }
        let fd = map.remove(&from).expect("checked above");
        fd.set_id(to);
        map.insert(to, fd);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Closes every live regular-file descriptor's backing stream, leaving
    /// the table entries in place. Used at subsystem teardown (spec §4.1).
    pub fn close_all_regular_files(&self) {
        let map = self.inner.read().unwrap();
        for fd in map.values() {
            Self::close_if_regular_file(fd);
        }
    }

    fn close_if_regular_file(fd: &Arc<FileDescriptor>) {
        if fd.file_type == crate::types::Filetype::RegularFile {
            fd.stream.lock().unwrap().close_in_place();
        }
    }
}
