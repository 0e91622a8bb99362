//! The ABI Codec (spec §4.5): typed pack/unpack of preview1 structs over a
//! `(GuestMemory, offset)` pair. All layouts are little-endian with preview1's
//! natural (8-byte-max) alignment, exactly as enumerated in spec §4.5.
//!
//! Every write bounds-checks the destination region before touching memory
//! (via `GuestMemory::check_region`) and returns `EFAULT` rather than
//! panicking on an out-of-bounds offset.

use crate::errno::Errno;
use crate::memory::GuestMemory;
use crate::types::*;

pub const IOVEC_SIZE: u32 = 8;
pub const FDSTAT_SIZE: u32 = 32;
pub const FILESTAT_SIZE: u32 = 64;
pub const PRESTAT_SIZE: u32 = 8;
pub const DIRENT_SIZE: u32 = 24;

pub fn read_iovec(mem: &impl GuestMemory, offset: u32) -> Result<Iovec, Errno> {
    let mut buf = [0u8; 8];
    mem.read(offset, &mut buf)?;
    Ok(Iovec {
        buf: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
        buf_len: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
    })
}

/// Reads `count` consecutive `iovec`/`ciovec` entries starting at `offset`.
pub fn read_iovec_array(
    mem: &impl GuestMemory,
    offset: u32,
    count: u32,
) -> Result<Vec<Iovec>, Errno> {
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let entry_offset = offset
            .checked_add(i.checked_mul(IOVEC_SIZE).ok_or(Errno::Fault)?)
            .ok_or(Errno::Fault)?;
        out.push(read_iovec(mem, entry_offset)?);
    }
    Ok(out)
}

pub fn write_fdstat(mem: &mut impl GuestMemory, offset: u32, fdstat: &Fdstat) -> Result<(), Errno> {
    mem.check_region(offset, FDSTAT_SIZE)?;
    let mut buf = [0u8; FDSTAT_SIZE as usize];
    buf[0] = fdstat.filetype as u8;
    buf[8..10].copy_from_slice(&(fdstat.flags.bits()).to_le_bytes());
    buf[16..24].copy_from_slice(&fdstat.rights_base.bits().to_le_bytes());
    buf[24..32].copy_from_slice(&fdstat.rights_inheriting.bits().to_le_bytes());
    mem.write(offset, &buf)
}

pub fn read_fdstat(mem: &impl GuestMemory, offset: u32) -> Result<Fdstat, Errno> {
    let mut buf = [0u8; FDSTAT_SIZE as usize];
    mem.read(offset, &mut buf)?;
    let filetype = decode_filetype(buf[0])?;
    let flags = FdFlags::from_bits_truncate(u16::from_le_bytes(buf[8..10].try_into().unwrap()));
    let rights_base = Rights::from_bits_truncate(u64::from_le_bytes(buf[16..24].try_into().unwrap()));
    let rights_inheriting =
        Rights::from_bits_truncate(u64::from_le_bytes(buf[24..32].try_into().unwrap()));
    Ok(Fdstat {
        filetype,
        flags,
        rights_base,
        rights_inheriting,
    })
}

pub fn write_filestat(
    mem: &mut impl GuestMemory,
    offset: u32,
    st: &Filestat,
) -> Result<(), Errno> {
    mem.check_region(offset, FILESTAT_SIZE)?;
    let mut buf = [0u8; FILESTAT_SIZE as usize];
    buf[0..8].copy_from_slice(&st.dev.to_le_bytes());
    buf[8..16].copy_from_slice(&st.ino.to_le_bytes());
    buf[16] = st.filetype as u8;
    buf[24..32].copy_from_slice(&st.nlink.to_le_bytes());
    buf[32..40].copy_from_slice(&st.size.to_le_bytes());
    buf[40..48].copy_from_slice(&st.atim.to_le_bytes());
    buf[48..56].copy_from_slice(&st.mtim.to_le_bytes());
    buf[56..64].copy_from_slice(&st.ctim.to_le_bytes());
    mem.write(offset, &buf)
}

pub fn write_prestat_dir(
    mem: &mut impl GuestMemory,
    offset: u32,
    dir_name_len: u32,
) -> Result<(), Errno> {
    mem.check_region(offset, PRESTAT_SIZE)?;
    let mut buf = [0u8; PRESTAT_SIZE as usize];
    buf[0] = 0; // tag 0 == __WASI_PREOPENTYPE_DIR, the only preview1 variant.
    buf[4..8].copy_from_slice(&dir_name_len.to_le_bytes());
    mem.write(offset, &buf)
}

/// Writes a `dirent` header (name bytes follow immediately and are written
/// separately by the caller, per spec §4.4's truncation rule).
pub fn write_dirent(mem: &mut impl GuestMemory, offset: u32, d: &Dirent) -> Result<(), Errno> {
    mem.check_region(offset, DIRENT_SIZE)?;
    let mut buf = [0u8; DIRENT_SIZE as usize];
    buf[0..8].copy_from_slice(&d.d_next.to_le_bytes());
    buf[8..16].copy_from_slice(&d.d_ino.to_le_bytes());
    buf[16..20].copy_from_slice(&d.d_namlen.to_le_bytes());
    buf[20] = d.d_type as u8;
    mem.write(offset, &buf)
}

pub fn read_u32(mem: &impl GuestMemory, offset: u32) -> Result<u32, Errno> {
    let mut buf = [0u8; 4];
    mem.read(offset, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u32(mem: &mut impl GuestMemory, offset: u32, val: u32) -> Result<(), Errno> {
    mem.write(offset, &val.to_le_bytes())
}

pub fn read_u64(mem: &impl GuestMemory, offset: u32) -> Result<u64, Errno> {
    let mut buf = [0u8; 8];
    mem.read(offset, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_u64(mem: &mut impl GuestMemory, offset: u32, val: u64) -> Result<(), Errno> {
    mem.write(offset, &val.to_le_bytes())
}

/// Reads a guest path/string argument. Preview1 strings are a raw
/// `(ptr, len)` pair, not NUL-terminated; invalid UTF-8 is rejected with
/// `EINVAL` rather than lossily substituted, since a host path built from
/// replacement characters could resolve somewhere the guest didn't intend.
pub fn read_string(mem: &impl GuestMemory, offset: u32, len: u32) -> Result<String, Errno> {
    let mut buf = vec![0u8; len as usize];
    mem.read(offset, &mut buf)?;
    String::from_utf8(buf).map_err(|_| Errno::Inval)
}

pub fn write_bytes(mem: &mut impl GuestMemory, offset: u32, bytes: &[u8]) -> Result<(), Errno> {
    mem.write(offset, bytes)
}

fn decode_filetype(v: u8) -> Result<Filetype, Errno> {
    Ok(match v {
        0 => Filetype::Unknown,
        1 => Filetype::BlockDevice,
        2 => Filetype::CharacterDevice,
        3 => Filetype::Directory,
        4 => Filetype::RegularFile,
        5 => Filetype::SocketDgram,
        6 => Filetype::SocketStream,
        7 => Filetype::SymbolicLink,
        _ => return Err(Errno::Inval),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fdstat_round_trips() {
        let mut mem: Vec<u8> = vec![0; 64];
        let want = Fdstat {
            filetype: Filetype::RegularFile,
            flags: FdFlags::APPEND | FdFlags::SYNC,
            rights_base: Rights::FD_READ | Rights::FD_WRITE,
            rights_inheriting: Rights::empty(),
        };
        write_fdstat(&mut mem, 8, &want).unwrap();
        let got = read_fdstat(&mem, 8).unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn fdstat_write_out_of_bounds_is_efault() {
        let mut mem: Vec<u8> = vec![0; 16];
        let st = Fdstat {
            filetype: Filetype::Directory,
            flags: FdFlags::empty(),
            rights_base: Rights::empty(),
            rights_inheriting: Rights::empty(),
        };
        assert_eq!(write_fdstat(&mut mem, 8, &st), Err(Errno::Fault));
    }

    #[test]
    fn iovec_array_reads_consecutive_entries() {
        let mut mem: Vec<u8> = vec![0; 32];
        mem[0..4].copy_from_slice(&100u32.to_le_bytes());
        mem[4..8].copy_from_slice(&10u32.to_le_bytes());
        mem[8..12].copy_from_slice(&200u32.to_le_bytes());
        mem[12..16].copy_from_slice(&20u32.to_le_bytes());
        let iovs = read_iovec_array(&mem, 0, 2).unwrap();
        assert_eq!(iovs, vec![Iovec { buf: 100, buf_len: 10 }, Iovec { buf: 200, buf_len: 20 }]);
    }

    #[test]
    fn prestat_dir_round_trips() {
        let mut mem: Vec<u8> = vec![0; 8];
        write_prestat_dir(&mut mem, 0, 42).unwrap();
        assert_eq!(mem[0], 0);
        assert_eq!(u32::from_le_bytes(mem[4..8].try_into().unwrap()), 42);
    }
}
