//! The Host I/O Adapter (spec §4.6): `WasiFilesystemCtx`, the subsystem
//! instance. Every method here takes and returns plain Rust types; the
//! `wasi_snapshot_preview1` ABI surface in [`crate::snapshot_preview1`] is a
//! thin decode/encode wrapper around these, exactly the split the teacher
//! draws between `wasi-common`'s `WasiCtx`/`WasiFile` traits and its
//! `wiggle`-generated export shims.

use crate::config::Config;
use crate::descriptor::{FileDescriptor, RightsPair};
use crate::errno::Errno;
use crate::path::PathMapper;
use crate::rights;
use crate::stream::{Stream, StdioKind};
use crate::table::DescriptorTable;
use crate::types::*;
use cap_fs_ext::DirExt;
use cap_std::fs::{Dir, Metadata, OpenOptions};
use is_terminal::IsTerminal;
use std::io::{self, IoSlice, IoSliceMut, SeekFrom};
use std::time::SystemTime;
use tracing::instrument;

pub struct WasiFilesystemCtx {
    table: DescriptorTable,
    path_mapper: PathMapper,
}

impl WasiFilesystemCtx {
    pub(crate) fn from_config(config: Config) -> anyhow::Result<Self> {
        let table = DescriptorTable::new(config.max_open_file_descriptors);
        let path_mapper = PathMapper::new();

        if config.stdin {
            table.insert_at(
                0,
                FileDescriptor::new(
                    0,
                    "<stdin>".to_string(),
                    Filetype::CharacterDevice,
                    Stream::Stdio(StdioKind::In),
                    AccessMode::ReadOnly,
                    stdio_rights(AccessMode::ReadOnly, io::stdin().is_terminal()),
                    FdFlags::empty(),
                    false,
                ),
            );
        }
        if config.stdout {
            table.insert_at(
                1,
                FileDescriptor::new(
                    1,
                    "<stdout>".to_string(),
                    Filetype::CharacterDevice,
                    Stream::Stdio(StdioKind::Out),
                    AccessMode::WriteOnly,
                    stdio_rights(AccessMode::WriteOnly, io::stdout().is_terminal()),
                    FdFlags::empty(),
                    false,
                ),
            );
        }
        if config.stderr {
            table.insert_at(
                2,
                FileDescriptor::new(
                    2,
                    "<stderr>".to_string(),
                    Filetype::CharacterDevice,
                    Stream::Stdio(StdioKind::Err),
                    AccessMode::WriteOnly,
                    stdio_rights(AccessMode::WriteOnly, io::stderr().is_terminal()),
                    FdFlags::empty(),
                    false,
                ),
            );
        }

        let host_root = config.host_root.expect("checked by builder");
        Self::bind_preopen(&table, &path_mapper, host_root, config.allow_file_creation, config.allow_file_deletion)?;
        for preopen in config.preopens {
            Self::bind_preopen(&table, &path_mapper, preopen, config.allow_file_creation, config.allow_file_deletion)?;
        }

        Ok(Self { table, path_mapper })
    }

    fn bind_preopen(
        table: &DescriptorTable,
        path_mapper: &PathMapper,
        spec: crate::config::PreopenSpec,
        allow_create: bool,
        allow_delete: bool,
    ) -> anyhow::Result<()> {
        let dir_for_table = spec.dir.try_clone()?;
        path_mapper.add_mapping(&spec.guest_path, spec.dir, spec.host_path.clone())?;
        let (base, inheriting) =
            rights::compute_initial(Filetype::Directory, spec.access, allow_create, allow_delete);
        let fd = FileDescriptor::new(
            0,
            spec.guest_path,
            Filetype::Directory,
            Stream::Dir(dir_for_table),
            spec.access,
            RightsPair { base, inheriting },
            FdFlags::empty(),
            true,
        );
        table.insert(fd)?;
        Ok(())
    }

    /// Closes every live regular-file descriptor. Directories and preopens
    /// release only their table slot, matching `DescriptorTable::remove`'s
    /// side-effect rule (spec §4.1). Dropping the context does this anyway
    /// via `Drop`; this exists for embedders that tear the subsystem down
    /// without dropping it immediately.
    pub fn shutdown(&self) {
        self.table.close_all_regular_files();
    }

    // -- fd_* operations --------------------------------------------------

    #[instrument(skip(self))]
    pub fn fd_close(&self, id: u32) -> crate::errno::Result<()> {
        self.table.remove(id)
    }

    #[instrument(skip(self))]
    pub fn fd_renumber(&self, from: u32, to: u32) -> crate::errno::Result<()> {
        self.table.renumber(from, to)
    }

    pub fn fd_read(&self, id: u32, bufs: &mut [IoSliceMut]) -> crate::errno::Result<usize> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_READ)?;
        let n = fd.stream.lock().unwrap().read_vectored(bufs)?;
        fd.advance_offset(n as u64);
        Ok(n)
    }

    pub fn fd_write(&self, id: u32, bufs: &[IoSlice]) -> crate::errno::Result<usize> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_WRITE)?;
        let n = fd.stream.lock().unwrap().write_vectored(bufs)?;
        fd.advance_offset(n as u64);
        Ok(n)
    }

    pub fn fd_pread(&self, id: u32, bufs: &mut [IoSliceMut], offset: Filesize) -> crate::errno::Result<usize> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_READ | Rights::FD_SEEK)?;
        let stream = fd.stream.lock().unwrap();
        let mut total = 0usize;
        let mut off = offset;
        for buf in bufs.iter_mut() {
            let n = stream.pread(buf, off)?;
            total += n;
            off += n as u64;
            if n == 0 {
                break;
            }
        }
        Ok(total)
    }

    pub fn fd_pwrite(&self, id: u32, bufs: &[IoSlice], offset: Filesize) -> crate::errno::Result<usize> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_WRITE | Rights::FD_SEEK)?;
        let stream = fd.stream.lock().unwrap();
        let mut total = 0usize;
        let mut off = offset;
        for buf in bufs.iter() {
            let n = stream.pwrite(buf, off)?;
            total += n;
            off += n as u64;
        }
        Ok(total)
    }

    pub fn fd_seek(&self, id: u32, delta: Filedelta, whence: Whence) -> crate::errno::Result<Filesize> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_SEEK)?;
        let pos = match whence {
            Whence::Set => SeekFrom::Start(delta as u64),
            Whence::Cur => SeekFrom::Current(delta),
            Whence::End => SeekFrom::End(delta),
        };
        let new_pos = fd.stream.lock().unwrap().seek(pos)?;
        fd.set_offset(new_pos);
        Ok(new_pos)
    }

    pub fn fd_tell(&self, id: u32) -> crate::errno::Result<Filesize> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_TELL)?;
        fd.stream.lock().unwrap().seek(SeekFrom::Current(0))
    }

    pub fn fd_fdstat_get(&self, id: u32) -> crate::errno::Result<Fdstat> {
        let fd = self.table.get(id)?;
        let rights = fd.rights();
        Ok(Fdstat {
            filetype: fd.file_type,
            flags: fd.fd_flags(),
            rights_base: rights.base,
            rights_inheriting: rights.inheriting,
        })
    }

    pub fn fd_fdstat_set_flags(&self, id: u32, flags: FdFlags) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_FDSTAT_SET_FLAGS)?;
        fd.set_fd_flags(flags);
        Ok(())
    }

    pub fn fd_fdstat_set_rights(&self, id: u32, base: Rights, inheriting: Rights) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        let cur = fd.rights();
        rights::narrow(cur.base, cur.inheriting, base, inheriting)?;
        fd.set_rights(RightsPair { base, inheriting });
        Ok(())
    }

    pub fn fd_prestat_get(&self, id: u32) -> crate::errno::Result<Prestat> {
        let fd = self.table.get(id)?;
        if !fd.is_preopened {
            return Err(Errno::Badf);
        }
        Ok(Prestat {
            dir_name_len: fd.path.len() as u32,
        })
    }

    pub fn fd_prestat_dir_name(&self, id: u32) -> crate::errno::Result<String> {
        let fd = self.table.get(id)?;
        if !fd.is_preopened {
            return Err(Errno::Badf);
        }
        Ok(fd.path.clone())
    }

    pub fn fd_sync(&self, id: u32) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_SYNC)?;
        fd.stream.lock().unwrap().sync(false)
    }

    pub fn fd_datasync(&self, id: u32) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_DATASYNC)?;
        fd.stream.lock().unwrap().sync(true)
    }

    pub fn fd_advise(&self, id: u32, offset: Filesize, len: Filesize, advice: Advice) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_ADVISE)?;
        fd.stream.lock().unwrap().advise(offset, len, advice)
    }

    pub fn fd_allocate(&self, id: u32, offset: Filesize, len: Filesize) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_ALLOCATE)?;
        fd.stream.lock().unwrap().allocate(offset, len)
    }

    pub fn fd_filestat_get(&self, id: u32) -> crate::errno::Result<Filestat> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_FILESTAT_GET)?;
        let meta = fd.stream.lock().unwrap().metadata()?;
        Ok(filestat_from_metadata(&meta, fd.file_type))
    }

    pub fn fd_filestat_set_size(&self, id: u32, size: Filesize) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_FILESTAT_SET_SIZE)?;
        fd.stream.lock().unwrap().set_len(size)
    }

    pub fn fd_filestat_set_times(
        &self,
        id: u32,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: FstFlags,
    ) -> crate::errno::Result<()> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_FILESTAT_SET_TIMES)?;
        let (a, m) = time_specs(atim, mtim, fst_flags);
        fd.stream.lock().unwrap().set_times(a, m)
    }

    /// Lists directory entries starting at `cookie`, synthesizing `.` and
    /// `..` ahead of the host-reported children (spec §4.4). Ordering is
    /// stabilized by name so repeated calls with the same cookie over an
    /// unchanged directory are idempotent — required for the
    /// cookie-resumption scenario to visit every entry exactly once.
    pub fn fd_readdir_entries(&self, id: u32, cookie: Dircookie) -> crate::errno::Result<Vec<(Dirent, String)>> {
        let fd = self.table.get(id)?;
        require(&fd, Rights::FD_READDIR)?;
        let stream = fd.stream.lock().unwrap();
        let dir = match &*stream {
            Stream::Dir(dir) => dir,
            _ => return Err(Errno::Notdir),
        };

        let mut named: Vec<(String, u64, Filetype)> = vec![
            (".".to_string(), 0, Filetype::Directory),
            ("..".to_string(), 0, Filetype::Directory),
        ];
        let mut children: Vec<(String, u64, Filetype)> = Vec::new();
        for entry in dir.entries().map_err(|e| Errno::from_io_error(&e))? {
            let entry = entry.map_err(|e| Errno::from_io_error(&e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata().map_err(|e| Errno::from_io_error(&e))?;
            let ino = unix_ino(&meta);
            children.push((name, ino, Filetype::from(entry.file_type().map_err(|e| Errno::from_io_error(&e))?)));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        named.extend(children);

        let start = cookie as usize;
        let out = named
            .into_iter()
            .enumerate()
            .skip(start)
            .map(|(i, (name, ino, filetype))| {
                (
                    Dirent {
                        d_next: (i + 1) as Dircookie,
                        d_ino: ino,
                        d_namlen: name.len() as u32,
                        d_type: filetype,
                    },
                    name,
                )
            })
            .collect();
        Ok(out)
    }

    // -- path_* operations --------------------------------------------------

    #[instrument(skip(self))]
    pub fn path_open(
        &self,
        dir_id: u32,
        // Symlink-follow on the path's final component is left to the host
        // platform's default `open(2)` behavior: cap-std's `Dir::open_with`
        // has no portable toggle for it, and none of the testable scenarios
        // this crate targets exercise the distinction (see `DESIGN.md`).
        _lookupflags: LookupFlags,
        path: &str,
        oflags: OFlags,
        requested_base: Rights,
        requested_inheriting: Rights,
        fd_flags: FdFlags,
    ) -> crate::errno::Result<u32> {
        check_path(path)?;
        let dir_fd = self.table.get(dir_id)?;
        require(&dir_fd, Rights::PATH_OPEN)?;
        let parent_inheriting = dir_fd.rights().inheriting;
        let (base, inheriting) = rights::derive_child(parent_inheriting, requested_base, requested_inheriting)?;

        // `/dev/null` succeeds regardless of the host filesystem (spec §8):
        // it is a virtual descriptor, never a lookup through `dir`.
        let full_path = join_guest_path(&dir_fd.path, path);
        if full_path == "/dev/null" {
            if oflags.contains(OFlags::DIRECTORY) {
                return Err(Errno::Notdir);
            }
            let access = access_mode_for(base);
            let fd = FileDescriptor::new(
                0,
                full_path,
                Filetype::CharacterDevice,
                Stream::Null,
                access,
                RightsPair { base, inheriting },
                fd_flags,
                false,
            );
            return self.table.insert(fd);
        }

        let dir_stream = dir_fd.stream.lock().unwrap();
        let dir = match &*dir_stream {
            Stream::Dir(dir) => dir,
            _ => return Err(Errno::Notdir),
        };

        let access = access_mode_for(base);
        if oflags.contains(OFlags::DIRECTORY) {
            let child_dir = dir.open_dir(path).map_err(|e| Errno::from_io_error(&e))?;
            let child_path = join_guest_path(&dir_fd.path, path);
            drop(dir_stream);
            let fd = FileDescriptor::new(
                0,
                child_path,
                Filetype::Directory,
                Stream::Dir(child_dir),
                access,
                RightsPair { base, inheriting },
                fd_flags,
                false,
            );
            return self.table.insert(fd);
        }

        let mut opts = OpenOptions::new();
        opts.read(access.can_read());
        if fd_flags.contains(FdFlags::APPEND) {
            opts.append(true);
        } else {
            opts.write(access.can_write());
        }
        opts.create(oflags.contains(OFlags::CREAT));
        opts.create_new(oflags.contains(OFlags::CREAT) && oflags.contains(OFlags::EXCL));
        opts.truncate(oflags.contains(OFlags::TRUNC) && !oflags.contains(OFlags::EXCL));

        let file = dir.open_with(path, &opts).map_err(|e| Errno::from_io_error(&e))?;
        let child_path = join_guest_path(&dir_fd.path, path);
        drop(dir_stream);
        let fd = FileDescriptor::new(
            0,
            child_path,
            Filetype::RegularFile,
            Stream::File(file),
            access,
            RightsPair { base, inheriting },
            fd_flags,
            false,
        );
        self.table.insert(fd)
    }

    pub fn path_create_directory(&self, dir_id: u32, path: &str) -> crate::errno::Result<()> {
        check_path(path)?;
        self.with_dir(dir_id, Rights::PATH_CREATE_DIRECTORY, |dir| {
            dir.create_dir(path).map_err(|e| Errno::from_io_error(&e))
        })
    }

    pub fn path_filestat_get(&self, dir_id: u32, lookupflags: LookupFlags, path: &str) -> crate::errno::Result<Filestat> {
        check_path(path)?;
        self.with_dir(dir_id, Rights::PATH_FILESTAT_GET, |dir| {
            let meta = if lookupflags.contains(LookupFlags::SYMLINK_FOLLOW) {
                dir.metadata(path)
            } else {
                dir.symlink_metadata(path)
            }
            .map_err(|e| Errno::from_io_error(&e))?;
            let filetype = Filetype::from(meta.file_type());
            Ok(filestat_from_metadata(&meta, filetype))
        })
    }

    pub fn path_filestat_set_times(
        &self,
        dir_id: u32,
        lookupflags: LookupFlags,
        path: &str,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: FstFlags,
    ) -> crate::errno::Result<()> {
        check_path(path)?;
        self.with_dir(dir_id, Rights::PATH_FILESTAT_SET_TIMES, |dir| {
            let (a, m) = time_specs(atim, mtim, fst_flags);
            // `cap_fs_ext::DirExt` resolves `path` relative to the capability
            // `dir` handle itself, unlike `fs_set_times`'s free functions,
            // which take an ambient path and would escape the sandbox.
            if lookupflags.contains(LookupFlags::SYMLINK_FOLLOW) {
                dir.set_times(path, a, m)
            } else {
                dir.set_symlink_times(path, a, m)
            }
            .map_err(|e| Errno::from_io_error(&e))
        })
    }

    pub fn path_link(
        &self,
        old_dir_id: u32,
        old_path: &str,
        new_dir_id: u32,
        new_path: &str,
    ) -> crate::errno::Result<()> {
        check_path(old_path)?;
        check_path(new_path)?;
        let old_fd = self.table.get(old_dir_id)?;
        require(&old_fd, Rights::PATH_LINK_SOURCE)?;
        let new_fd = self.table.get(new_dir_id)?;
        require(&new_fd, Rights::PATH_LINK_TARGET)?;
        let old_stream = old_fd.stream.lock().unwrap();
        let new_stream = new_fd.stream.lock().unwrap();
        let (old_dir, new_dir) = match (&*old_stream, &*new_stream) {
            (Stream::Dir(a), Stream::Dir(b)) => (a, b),
            _ => return Err(Errno::Notdir),
        };
        old_dir
            .hard_link(old_path, new_dir, new_path)
            .map_err(|e| Errno::from_io_error(&e))
    }

    pub fn path_readlink(&self, dir_id: u32, path: &str) -> crate::errno::Result<String> {
        check_path(path)?;
        self.with_dir(dir_id, Rights::PATH_READLINK, |dir| {
            dir.read_link(path)
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| Errno::from_io_error(&e))
        })
    }

    pub fn path_remove_directory(&self, dir_id: u32, path: &str) -> crate::errno::Result<()> {
        check_path(path)?;
        self.with_dir(dir_id, Rights::PATH_REMOVE_DIRECTORY, |dir| {
            dir.remove_dir(path).map_err(|e| Errno::from_io_error(&e))
        })
    }

    pub fn path_rename(
        &self,
        old_dir_id: u32,
        old_path: &str,
        new_dir_id: u32,
        new_path: &str,
    ) -> crate::errno::Result<()> {
        check_path(old_path)?;
        check_path(new_path)?;
        let old_fd = self.table.get(old_dir_id)?;
        require(&old_fd, Rights::PATH_RENAME_SOURCE)?;
        let new_fd = self.table.get(new_dir_id)?;
        require(&new_fd, Rights::PATH_RENAME_TARGET)?;
        let old_stream = old_fd.stream.lock().unwrap();
        let new_stream = new_fd.stream.lock().unwrap();
        let (old_dir, new_dir) = match (&*old_stream, &*new_stream) {
            (Stream::Dir(a), Stream::Dir(b)) => (a, b),
            _ => return Err(Errno::Notdir),
        };
        old_dir
            .rename(old_path, new_dir, new_path)
            .map_err(|e| Errno::from_io_error(&e))
    }

    pub fn path_symlink(&self, old_path: &str, dir_id: u32, new_path: &str) -> crate::errno::Result<()> {
        check_path(new_path)?;
        self.with_dir(dir_id, Rights::PATH_SYMLINK, |dir| {
            #[cfg(unix)]
            {
                dir.symlink(old_path, new_path).map_err(|e| Errno::from_io_error(&e))
            }
            #[cfg(not(unix))]
            {
                let _ = (dir, old_path, new_path);
                Err(Errno::Notsup)
            }
        })
    }

    pub fn path_unlink_file(&self, dir_id: u32, path: &str) -> crate::errno::Result<()> {
        check_path(path)?;
        self.with_dir(dir_id, Rights::PATH_UNLINK_FILE, |dir| {
            dir.remove_file(path).map_err(|e| Errno::from_io_error(&e))
        })
    }

    pub fn path_mapper(&self) -> &PathMapper {
        &self.path_mapper
    }

    fn with_dir<T>(
        &self,
        dir_id: u32,
        required: Rights,
        f: impl FnOnce(&Dir) -> crate::errno::Result<T>,
    ) -> crate::errno::Result<T> {
        let fd = self.table.get(dir_id)?;
        require(&fd, required)?;
        let stream = fd.stream.lock().unwrap();
        match &*stream {
            Stream::Dir(dir) => f(dir),
            _ => Err(Errno::Notdir),
        }
    }
}

/// Rejects any path with a `..` component before it ever reaches a
/// `cap_std::fs::Dir` call. `cap_std` itself refuses to let such a path
/// escape its root, but which host `io::Error` (and therefore which mapped
/// `Errno`) that produces varies by platform and kernel; checking here
/// guarantees the capability-violation scenario always surfaces as
/// `ENOTCAPABLE` (spec §4.2, §8) rather than whatever the host happened to
/// report.
fn rejects_escape(path: &str) -> bool {
    std::path::Path::new(path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
}

fn check_path(path: &str) -> crate::errno::Result<()> {
    if rejects_escape(path) {
        Err(Errno::Notcapable)
    } else {
        Ok(())
    }
}

fn require(fd: &FileDescriptor, required: Rights) -> crate::errno::Result<()> {
    if fd.has_rights(required) {
        Ok(())
    } else {
        Err(Errno::Notcapable)
    }
}

fn rights_pair(kind: Filetype, access: AccessMode, allow_create: bool, allow_delete: bool) -> RightsPair {
    let (base, inheriting) = rights::compute_initial(kind, access, allow_create, allow_delete);
    RightsPair { base, inheriting }
}

/// Stdio rights, minus `FD_SEEK`/`FD_TELL` when the underlying stream is a
/// real terminal: a tty is never seekable, while a stdio stream redirected
/// to a regular file or pipe may still report the seek-capable bits (the
/// host `seek(2)` call itself is the final authority either way).
fn stdio_rights(access: AccessMode, is_tty: bool) -> RightsPair {
    let mut pair = rights_pair(Filetype::CharacterDevice, access, false, false);
    if is_tty {
        pair.base.remove(Rights::FD_SEEK | Rights::FD_TELL);
        pair.inheriting.remove(Rights::FD_SEEK | Rights::FD_TELL);
    }
    pair
}

fn access_mode_for(base: Rights) -> AccessMode {
    let r = base.contains(Rights::FD_READ);
    let w = base.contains(Rights::FD_WRITE);
    match (r, w) {
        (true, true) => AccessMode::ReadWrite,
        (true, false) => AccessMode::ReadOnly,
        (false, true) => AccessMode::WriteOnly,
        (false, false) => AccessMode::None,
    }
}

fn join_guest_path(base: &str, rel: &str) -> String {
    if base == "/" {
        format!("/{rel}")
    } else {
        format!("{base}/{rel}")
    }
}

fn time_specs(
    atim: Timestamp,
    mtim: Timestamp,
    fst_flags: FstFlags,
) -> (Option<fs_set_times::SystemTimeSpec>, Option<fs_set_times::SystemTimeSpec>) {
    let a = if fst_flags.contains(FstFlags::ATIM_NOW) {
        Some(fs_set_times::SystemTimeSpec::SymbolicNow)
    } else if fst_flags.contains(FstFlags::ATIM) {
        Some(fs_set_times::SystemTimeSpec::Absolute(
            SystemTime::UNIX_EPOCH + std::time::Duration::from_nanos(atim),
        ))
    } else {
        None
    };
    let m = if fst_flags.contains(FstFlags::MTIM_NOW) {
        Some(fs_set_times::SystemTimeSpec::SymbolicNow)
    } else if fst_flags.contains(FstFlags::MTIM) {
        Some(fs_set_times::SystemTimeSpec::Absolute(
            SystemTime::UNIX_EPOCH + std::time::Duration::from_nanos(mtim),
        ))
    } else {
        None
    };
    (a, m)
}

fn to_timestamp(t: io::Result<SystemTime>) -> Timestamp {
    t.ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn unix_ino(meta: &Metadata) -> u64 {
    use cap_std::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn unix_ino(_meta: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn unix_dev_nlink(meta: &Metadata) -> (u64, u64) {
    use cap_std::fs::MetadataExt;
    (meta.dev(), meta.nlink())
}

#[cfg(not(unix))]
fn unix_dev_nlink(_meta: &Metadata) -> (u64, u64) {
    (0, 0)
}

fn filestat_from_metadata(meta: &Metadata, filetype: Filetype) -> Filestat {
    let (dev, nlink) = unix_dev_nlink(meta);
    Filestat {
        dev,
        ino: unix_ino(meta),
        filetype,
        nlink,
        size: meta.len(),
        atim: to_timestamp(meta.accessed()),
        mtim: to_timestamp(meta.modified()),
        ctim: to_timestamp(meta.created()),
    }
}
