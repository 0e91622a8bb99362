//! The Host Function Surface (spec §6): one function per
//! `wasi_snapshot_preview1` export, each a thin decode/dispatch/encode shim
//! over [`crate::ctx::WasiFilesystemCtx`]. This is the layer the teacher
//! generates with `wiggle` from witx; without running the toolchain to
//! verify generated code we write the shim by hand instead (see
//! `DESIGN.md`), but the shape — decode arguments, call the context, encode
//! the result, return a raw errno — is the same one `wiggle` produces.
//!
//! Every export is `#[instrument]`-wrapped so an embedder who turns on
//! `tracing` (or, via the `trace_log` feature, `log`) sees one span per
//! hostcall, mirroring wasmtime's own instrumentation of its preview1 shims.

use crate::abi;
use crate::ctx::WasiFilesystemCtx;
use crate::errno::Errno;
use crate::memory::GuestMemory;
use crate::types::*;
use std::io::{IoSlice, IoSliceMut};
use tracing::instrument;

fn run(f: impl FnOnce() -> Result<(), Errno>) -> u32 {
    match f() {
        Ok(()) => Errno::Success.as_raw(),
        Err(e) => e.as_raw(),
    }
}

fn gather_read<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    offset: Option<Filesize>,
) -> Result<u32, Errno> {
    let iovecs = abi::read_iovec_array(memory, iovs, iovs_len)?;
    let mut scratch: Vec<Vec<u8>> = iovecs.iter().map(|iv| vec![0u8; iv.buf_len as usize]).collect();
    let mut slices: Vec<IoSliceMut> = scratch.iter_mut().map(|b| IoSliceMut::new(b.as_mut_slice())).collect();
    let n = match offset {
        Some(off) => ctx.fd_pread(fd, &mut slices, off)?,
        None => ctx.fd_read(fd, &mut slices)?,
    };
    drop(slices);
    let mut remaining = n;
    for (iov, buf) in iovecs.iter().zip(scratch.iter()) {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(iov.buf_len as usize);
        abi::write_bytes(memory, iov.buf, &buf[..take])?;
        remaining -= take;
    }
    Ok(n as u32)
}

fn gather_write<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &M,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    offset: Option<Filesize>,
) -> Result<u32, Errno> {
    let iovecs = abi::read_iovec_array(memory, iovs, iovs_len)?;
    let mut scratch: Vec<Vec<u8>> = Vec::with_capacity(iovecs.len());
    for iov in &iovecs {
        let mut buf = vec![0u8; iov.buf_len as usize];
        memory.read(iov.buf, &mut buf)?;
        scratch.push(buf);
    }
    let slices: Vec<IoSlice> = scratch.iter().map(|b| IoSlice::new(b)).collect();
    let n = match offset {
        Some(off) => ctx.fd_pwrite(fd, &slices, off)?,
        None => ctx.fd_write(fd, &slices)?,
    };
    Ok(n as u32)
}

#[instrument(skip(ctx, memory))]
pub fn fd_read<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, iovs: u32, iovs_len: u32, nread_out: u32) -> u32 {
    run(|| {
        let n = gather_read(ctx, memory, fd, iovs, iovs_len, None)?;
        abi::write_u32(memory, nread_out, n)
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_pread<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    offset: Filesize,
    nread_out: u32,
) -> u32 {
    run(|| {
        let n = gather_read(ctx, memory, fd, iovs, iovs_len, Some(offset))?;
        abi::write_u32(memory, nread_out, n)
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_write<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, iovs: u32, iovs_len: u32, nwritten_out: u32) -> u32 {
    run(|| {
        let n = gather_write(ctx, memory, fd, iovs, iovs_len, None)?;
        abi::write_u32(memory, nwritten_out, n)
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_pwrite<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    offset: Filesize,
    nwritten_out: u32,
) -> u32 {
    run(|| {
        let n = gather_write(ctx, memory, fd, iovs, iovs_len, Some(offset))?;
        abi::write_u32(memory, nwritten_out, n)
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_seek<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, offset: Filedelta, whence: u8, newoffset_out: u32) -> u32 {
    run(|| {
        let whence = Whence::try_from(whence)?;
        let pos = ctx.fd_seek(fd, offset, whence)?;
        abi::write_u64(memory, newoffset_out, pos)
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_tell<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, offset_out: u32) -> u32 {
    run(|| {
        let pos = ctx.fd_tell(fd)?;
        abi::write_u64(memory, offset_out, pos)
    })
}

#[instrument(skip(ctx))]
pub fn fd_close(ctx: &WasiFilesystemCtx, fd: u32) -> u32 {
    run(|| ctx.fd_close(fd))
}

#[instrument(skip(ctx))]
pub fn fd_renumber(ctx: &WasiFilesystemCtx, from: u32, to: u32) -> u32 {
    run(|| ctx.fd_renumber(from, to))
}

#[instrument(skip(ctx, memory))]
pub fn fd_fdstat_get<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, out: u32) -> u32 {
    run(|| {
        let stat = ctx.fd_fdstat_get(fd)?;
        abi::write_fdstat(memory, out, &stat)
    })
}

#[instrument(skip(ctx))]
pub fn fd_fdstat_set_flags(ctx: &WasiFilesystemCtx, fd: u32, flags: u16) -> u32 {
    run(|| ctx.fd_fdstat_set_flags(fd, FdFlags::from_bits_truncate(flags)))
}

#[instrument(skip(ctx))]
pub fn fd_fdstat_set_rights(ctx: &WasiFilesystemCtx, fd: u32, base: u64, inheriting: u64) -> u32 {
    run(|| {
        ctx.fd_fdstat_set_rights(
            fd,
            Rights::from_bits_truncate(base),
            Rights::from_bits_truncate(inheriting),
        )
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_prestat_get<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, out: u32) -> u32 {
    run(|| {
        let prestat = ctx.fd_prestat_get(fd)?;
        abi::write_prestat_dir(memory, out, prestat.dir_name_len)
    })
}

#[instrument(skip(ctx, memory))]
pub fn fd_prestat_dir_name<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, path_out: u32, path_len: u32) -> u32 {
    run(|| {
        let name = ctx.fd_prestat_dir_name(fd)?;
        let bytes = name.as_bytes();
        if bytes.len() > path_len as usize {
            return Err(Errno::Inval);
        }
        abi::write_bytes(memory, path_out, bytes)
    })
}

#[instrument(skip(ctx))]
pub fn fd_sync(ctx: &WasiFilesystemCtx, fd: u32) -> u32 {
    run(|| ctx.fd_sync(fd))
}

#[instrument(skip(ctx))]
pub fn fd_datasync(ctx: &WasiFilesystemCtx, fd: u32) -> u32 {
    run(|| ctx.fd_datasync(fd))
}

#[instrument(skip(ctx))]
pub fn fd_advise(ctx: &WasiFilesystemCtx, fd: u32, offset: Filesize, len: Filesize, advice: u8) -> u32 {
    run(|| {
        let advice = Advice::try_from(advice)?;
        ctx.fd_advise(fd, offset, len, advice)
    })
}

#[instrument(skip(ctx))]
pub fn fd_allocate(ctx: &WasiFilesystemCtx, fd: u32, offset: Filesize, len: Filesize) -> u32 {
    run(|| ctx.fd_allocate(fd, offset, len))
}

#[instrument(skip(ctx, memory))]
pub fn fd_filestat_get<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &mut M, fd: u32, out: u32) -> u32 {
    run(|| {
        let stat = ctx.fd_filestat_get(fd)?;
        abi::write_filestat(memory, out, &stat)
    })
}

#[instrument(skip(ctx))]
pub fn fd_filestat_set_size(ctx: &WasiFilesystemCtx, fd: u32, size: Filesize) -> u32 {
    run(|| ctx.fd_filestat_set_size(fd, size))
}

#[instrument(skip(ctx))]
pub fn fd_filestat_set_times(ctx: &WasiFilesystemCtx, fd: u32, atim: Timestamp, mtim: Timestamp, fst_flags: u16) -> u32 {
    run(|| ctx.fd_filestat_set_times(fd, atim, mtim, FstFlags::from_bits_truncate(fst_flags)))
}

/// Packs as many `(dirent header, name)` pairs as fit into `buf_len` bytes,
/// truncating the final entry's trailing bytes rather than omitting it, and
/// reports the number of bytes actually written (spec §4.4).
#[instrument(skip(ctx, memory))]
pub fn fd_readdir<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    fd: u32,
    buf: u32,
    buf_len: u32,
    cookie: Dircookie,
    bufused_out: u32,
) -> u32 {
    run(|| {
        let entries = ctx.fd_readdir_entries(fd, cookie)?;
        let mut written = 0u32;
        for (dirent, name) in entries {
            let remaining = buf_len - written;
            if remaining == 0 {
                break;
            }
            let header_take = remaining.min(abi::DIRENT_SIZE);
            if header_take < abi::DIRENT_SIZE {
                let mut header = vec![0u8; abi::DIRENT_SIZE as usize];
                abi::write_dirent(header.as_mut_slice(), 0, &dirent)?;
                abi::write_bytes(memory, buf + written, &header[..header_take as usize])?;
                written += header_take;
                break;
            }
            abi::write_dirent(memory, buf + written, &dirent)?;
            written += abi::DIRENT_SIZE;

            let remaining = buf_len - written;
            if remaining == 0 {
                break;
            }
            let name_take = remaining.min(dirent.d_namlen);
            abi::write_bytes(memory, buf + written, &name.as_bytes()[..name_take as usize])?;
            written += name_take;
            if name_take < dirent.d_namlen {
                break;
            }
        }
        abi::write_u32(memory, bufused_out, written)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_open<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    dir_fd: u32,
    dirflags: u32,
    path_ptr: u32,
    path_len: u32,
    oflags: u16,
    fs_rights_base: u64,
    fs_rights_inheriting: u64,
    fd_flags: u16,
    fd_out: u32,
) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        // Checked before the open itself runs: an out-of-bounds `fd_out`
        // must fail without ever inserting a descriptor into the table, or
        // the call would leak one on every such failure (spec §9).
        memory.check_region(fd_out, 4)?;
        let new_fd = ctx.path_open(
            dir_fd,
            LookupFlags::from_bits_truncate(dirflags),
            &path,
            OFlags::from_bits_truncate(oflags),
            Rights::from_bits_truncate(fs_rights_base),
            Rights::from_bits_truncate(fs_rights_inheriting),
            FdFlags::from_bits_truncate(fd_flags),
        )?;
        // Written exactly once, only after every fallible step above has
        // succeeded, so a failed call never leaves a stale or partial value
        // at `fd_out` (spec §7).
        abi::write_u32(memory, fd_out, new_fd)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_create_directory<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &M, dir_fd: u32, path_ptr: u32, path_len: u32) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        ctx.path_create_directory(dir_fd, &path)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_filestat_get<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    dir_fd: u32,
    dirflags: u32,
    path_ptr: u32,
    path_len: u32,
    out: u32,
) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        let stat = ctx.path_filestat_get(dir_fd, LookupFlags::from_bits_truncate(dirflags), &path)?;
        abi::write_filestat(memory, out, &stat)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_filestat_set_times<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &M,
    dir_fd: u32,
    dirflags: u32,
    path_ptr: u32,
    path_len: u32,
    atim: Timestamp,
    mtim: Timestamp,
    fst_flags: u16,
) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        ctx.path_filestat_set_times(
            dir_fd,
            LookupFlags::from_bits_truncate(dirflags),
            &path,
            atim,
            mtim,
            FstFlags::from_bits_truncate(fst_flags),
        )
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_link<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &M,
    old_dir_fd: u32,
    _old_dirflags: u32,
    old_path_ptr: u32,
    old_path_len: u32,
    new_dir_fd: u32,
    new_path_ptr: u32,
    new_path_len: u32,
) -> u32 {
    run(|| {
        let old_path = abi::read_string(memory, old_path_ptr, old_path_len)?;
        let new_path = abi::read_string(memory, new_path_ptr, new_path_len)?;
        ctx.path_link(old_dir_fd, &old_path, new_dir_fd, &new_path)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_readlink<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &mut M,
    dir_fd: u32,
    path_ptr: u32,
    path_len: u32,
    buf: u32,
    buf_len: u32,
    bufused_out: u32,
) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        let target = ctx.path_readlink(dir_fd, &path)?;
        let bytes = target.as_bytes();
        let take = bytes.len().min(buf_len as usize);
        abi::write_bytes(memory, buf, &bytes[..take])?;
        abi::write_u32(memory, bufused_out, take as u32)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_remove_directory<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &M, dir_fd: u32, path_ptr: u32, path_len: u32) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        ctx.path_remove_directory(dir_fd, &path)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_rename<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &M,
    old_dir_fd: u32,
    old_path_ptr: u32,
    old_path_len: u32,
    new_dir_fd: u32,
    new_path_ptr: u32,
    new_path_len: u32,
) -> u32 {
    run(|| {
        let old_path = abi::read_string(memory, old_path_ptr, old_path_len)?;
        let new_path = abi::read_string(memory, new_path_ptr, new_path_len)?;
        ctx.path_rename(old_dir_fd, &old_path, new_dir_fd, &new_path)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_symlink<M: GuestMemory>(
    ctx: &WasiFilesystemCtx,
    memory: &M,
    old_path_ptr: u32,
    old_path_len: u32,
    dir_fd: u32,
    new_path_ptr: u32,
    new_path_len: u32,
) -> u32 {
    run(|| {
        let old_path = abi::read_string(memory, old_path_ptr, old_path_len)?;
        let new_path = abi::read_string(memory, new_path_ptr, new_path_len)?;
        ctx.path_symlink(&old_path, dir_fd, &new_path)
    })
}

#[instrument(skip(ctx, memory))]
pub fn path_unlink_file<M: GuestMemory>(ctx: &WasiFilesystemCtx, memory: &M, dir_fd: u32, path_ptr: u32, path_len: u32) -> u32 {
    run(|| {
        let path = abi::read_string(memory, path_ptr, path_len)?;
        ctx.path_unlink_file(dir_fd, &path)
    })
}
