//! End-to-end coverage of the Host I/O Adapter and the host function
//! surface, in the style of `tests/all/sync.rs` in the reference pack, but
//! driving `WasiFilesystemCtx`/`snapshot_preview1` directly rather than a
//! compiled guest module, since embedding a Wasm engine is out of scope for
//! this crate.

use cap_std::{ambient_authority, fs::Dir};
use std::io::{IoSlice, IoSliceMut};
use wasi_preview1_fs::config::WasiFilesystemCtxBuilder;
use wasi_preview1_fs::ctx::WasiFilesystemCtx;
use wasi_preview1_fs::errno::Errno;
use wasi_preview1_fs::types::*;
use wasi_preview1_fs::{snapshot_preview1 as p1, GuestMemory};

fn ctx_over(tmp: &tempfile::TempDir) -> (WasiFilesystemCtx, u32) {
    let dir = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
    let ctx = WasiFilesystemCtxBuilder::new()
        .host_root_directory(dir, tmp.path())
        .build()
        .unwrap();
    // The host root is the first (and, here, only) preopen, so it lands at
    // the smallest id past the reserved stdio range.
    (ctx, 3)
}

#[test_log::test]
fn preopen_write_close_reopen_read_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    let write_fd = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "hello.txt",
            OFlags::CREAT,
            Rights::FD_WRITE | Rights::FD_READ | Rights::FD_SEEK,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();
    let n = ctx.fd_write(write_fd, &[IoSlice::new(b"hello world")]).unwrap();
    assert_eq!(n, 11);
    ctx.fd_close(write_fd).unwrap();

    let read_fd = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "hello.txt",
            OFlags::empty(),
            Rights::FD_READ,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();
    let mut buf = vec![0u8; 32];
    let n = ctx.fd_read(read_fd, &mut [IoSliceMut::new(&mut buf)]).unwrap();
    assert_eq!(&buf[..n], b"hello world");
    ctx.fd_close(read_fd).unwrap();
}

#[test_log::test]
fn dotdot_escape_is_notcapable() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    let err = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "../../etc/passwd",
            OFlags::empty(),
            Rights::FD_READ,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap_err();
    assert_eq!(err, Errno::Notcapable);
}

#[test_log::test]
fn fdstat_set_rights_narrows_but_rejects_widening() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    let fd = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "rw.txt",
            OFlags::CREAT,
            Rights::FD_WRITE | Rights::FD_READ,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();

    ctx.fd_fdstat_set_rights(fd, Rights::FD_READ, Rights::empty()).unwrap();
    let stat = ctx.fd_fdstat_get(fd).unwrap();
    assert_eq!(stat.rights_base, Rights::FD_READ);

    let err = ctx
        .fd_fdstat_set_rights(fd, Rights::FD_READ | Rights::FD_WRITE, Rights::empty())
        .unwrap_err();
    assert_eq!(err, Errno::Notcapable);
}

#[test_log::test]
fn seek_on_non_seekable_stdout_is_espipe() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
    let ctx = WasiFilesystemCtxBuilder::new()
        .host_root_directory(dir, tmp.path())
        .inherit_stdout()
        .build()
        .unwrap();

    let err = ctx.fd_seek(1, 0, Whence::Cur).unwrap_err();
    assert_eq!(err, Errno::Spipe);
}

#[test_log::test]
fn readdir_cookie_resumption_visits_every_entry_once() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    for name in ["a.txt", "b.txt", "c.txt"] {
        let fd = ctx
            .path_open(
                root,
                LookupFlags::empty(),
                name,
                OFlags::CREAT,
                Rights::FD_WRITE,
                Rights::empty(),
                FdFlags::empty(),
            )
            .unwrap();
        ctx.fd_close(fd).unwrap();
    }

    let mut seen = std::collections::BTreeSet::new();
    let mut cookie = DIRCOOKIE_START;
    loop {
        let entries = ctx.fd_readdir_entries(root, cookie).unwrap();
        if entries.is_empty() {
            break;
        }
        for (dirent, name) in &entries {
            assert!(seen.insert(name.clone()), "{name} visited twice");
            cookie = dirent.d_next;
        }
    }
    assert_eq!(
        seen,
        [".", "..", "a.txt", "b.txt", "c.txt"]
            .into_iter()
            .map(String::from)
            .collect()
    );
}

#[test_log::test]
fn disallowing_deletion_keeps_unlink_notcapable() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
    let ctx = WasiFilesystemCtxBuilder::new()
        .host_root_directory(dir, tmp.path())
        .allow_file_deletion(false)
        .build()
        .unwrap();
    let root = 3;

    let fd = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "doomed.txt",
            OFlags::CREAT,
            Rights::FD_WRITE,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();
    ctx.fd_close(fd).unwrap();

    let err = ctx.path_unlink_file(root, "doomed.txt").unwrap_err();
    assert_eq!(err, Errno::Notcapable);
    assert!(tmp.path().join("doomed.txt").exists());
}

#[test_log::test]
fn renumber_then_close_leaves_neither_id_live() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    let a = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "a.txt",
            OFlags::CREAT,
            Rights::FD_WRITE,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();
    let b = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "b.txt",
            OFlags::CREAT,
            Rights::FD_WRITE,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();

    ctx.fd_renumber(a, b).unwrap();
    assert_eq!(ctx.fd_fdstat_get(a).unwrap_err(), Errno::Badf);
    ctx.fd_close(b).unwrap();
    assert_eq!(ctx.fd_fdstat_get(b).unwrap_err(), Errno::Badf);
}

#[test_log::test]
fn renumber_to_self_is_a_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    let fd = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "a.txt",
            OFlags::CREAT,
            Rights::FD_WRITE,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();

    ctx.fd_renumber(fd, fd).unwrap();
    assert!(ctx.fd_fdstat_get(fd).is_ok());
}

#[test_log::test]
fn child_rights_are_subset_of_parent_inheriting() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
    let ctx = WasiFilesystemCtxBuilder::new()
        .host_root_directory(dir, tmp.path())
        .allow_file_creation(false)
        .build()
        .unwrap();
    let root = 3;

    let err = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "new.txt",
            OFlags::CREAT,
            Rights::FD_WRITE | Rights::PATH_CREATE_FILE,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap_err();
    assert_eq!(err, Errno::Notcapable);
}

#[test_log::test]
fn dev_null_reads_zero_and_discards_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);

    let fd = ctx
        .path_open(
            root,
            LookupFlags::empty(),
            "dev/null",
            OFlags::empty(),
            Rights::FD_READ | Rights::FD_WRITE,
            Rights::empty(),
            FdFlags::empty(),
        )
        .unwrap();

    let n = ctx.fd_write(fd, &[IoSlice::new(b"discarded")]).unwrap();
    assert_eq!(n, 9);

    let mut buf = vec![0xAAu8; 16];
    let n = ctx.fd_read(fd, &mut [IoSliceMut::new(&mut buf)]).unwrap();
    assert_eq!(n, 0);

    ctx.fd_close(fd).unwrap();
    // Never touched the host filesystem: opening it created nothing.
    assert!(!tmp.path().join("dev").exists());
}

/// Drives the same roundtrip through the ABI surface, exercising
/// `abi::read_iovec_array`/`write_u32` and `GuestMemory` bounds checks
/// rather than calling `WasiFilesystemCtx` methods directly.
#[test_log::test]
fn abi_surface_path_open_write_read() {
    let tmp = tempfile::tempdir().unwrap();
    let (ctx, root) = ctx_over(&tmp);
    let mut mem: Vec<u8> = vec![0u8; 256];

    // Layout: path string "greeting.txt" at 0..12, fd_out at 16.
    let path = b"greeting.txt";
    mem[0..path.len()].copy_from_slice(path);
    let fd_out_ptr = 16;

    let rc = p1::path_open(
        &ctx,
        &mut mem,
        root,
        0,
        0,
        path.len() as u32,
        OFlags::CREAT.bits(),
        (Rights::FD_WRITE | Rights::FD_READ | Rights::FD_SEEK).bits(),
        0,
        0,
        fd_out_ptr,
    );
    assert_eq!(rc, Errno::Success.as_raw());
    let fd = u32::from_le_bytes(mem[fd_out_ptr as usize..fd_out_ptr as usize + 4].try_into().unwrap());

    // Write "hi" via a single iovec: buf ptr 32, len 2; payload at 40.
    mem[32..36].copy_from_slice(&40u32.to_le_bytes());
    mem[36..40].copy_from_slice(&2u32.to_le_bytes());
    mem[40..42].copy_from_slice(b"hi");
    let nwritten_ptr = 48;
    let rc = p1::fd_write(&ctx, &mut mem, fd, 32, 1, nwritten_ptr);
    assert_eq!(rc, Errno::Success.as_raw());
    let nwritten = u32::from_le_bytes(mem[nwritten_ptr as usize..nwritten_ptr as usize + 4].try_into().unwrap());
    assert_eq!(nwritten, 2);

    assert_eq!(p1::fd_close(&ctx, fd), Errno::Success.as_raw());

    // Bad fd_out pointer (out of bounds): path_open must fail before ever
    // inserting a descriptor into the table. Reopening the same file
    // afterwards must land on the id `fd` vacated above, proving the
    // earlier failed call did not leak a live descriptor ahead of it.
    let rc = p1::path_open(
        &ctx,
        &mut mem,
        root,
        0,
        0,
        path.len() as u32,
        OFlags::empty().bits(),
        Rights::FD_READ.bits(),
        0,
        0,
        10_000,
    );
    assert_eq!(rc, Errno::Fault.as_raw());

    let rc = p1::path_open(
        &ctx,
        &mut mem,
        root,
        0,
        0,
        path.len() as u32,
        OFlags::empty().bits(),
        Rights::FD_READ.bits(),
        0,
        0,
        fd_out_ptr,
    );
    assert_eq!(rc, Errno::Success.as_raw());
    let reopened = u32::from_le_bytes(mem[fd_out_ptr as usize..fd_out_ptr as usize + 4].try_into().unwrap());
    assert_eq!(reopened, fd);
}

#[test_log::test]
fn guest_memory_bounds_check_rejects_out_of_range_write() {
    let mut mem: Vec<u8> = vec![0; 4];
    assert_eq!(mem.write(2, &[1, 2, 3]), Err(Errno::Fault));
}
