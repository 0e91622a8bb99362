//! The Rights Algebra (spec §4.3): the per-file-type base/inheriting right
//! sets and the operations that compute, restrict, and narrow them.
//!
//! The per-type right sets below are adapted from the `RightsExt` trait
//! found in older (pre-`wiggle`) forks of `wasi-common` kept in this pack's
//! reference material, re-expressed against this crate's own `Rights` bit
//! layout (`src/types.rs`).

use crate::errno::Errno;
use crate::types::{AccessMode, Filetype, Rights};

pub trait RightsExt: Sized {
    fn directory_base() -> Self;
    fn directory_inheriting() -> Self;
    fn regular_file_base() -> Self;
    fn regular_file_inheriting() -> Self;
    fn character_device_base() -> Self;
    fn character_device_inheriting() -> Self;
}

impl RightsExt for Rights {
    fn directory_base() -> Self {
        Self::FD_FDSTAT_SET_FLAGS
            | Self::FD_SYNC
            | Self::FD_ADVISE
            | Self::PATH_CREATE_DIRECTORY
            | Self::PATH_CREATE_FILE
            | Self::PATH_LINK_SOURCE
            | Self::PATH_LINK_TARGET
            | Self::PATH_OPEN
            | Self::FD_READDIR
            | Self::PATH_READLINK
            | Self::PATH_RENAME_SOURCE
            | Self::PATH_RENAME_TARGET
            | Self::PATH_FILESTAT_GET
            | Self::PATH_FILESTAT_SET_SIZE
            | Self::PATH_FILESTAT_SET_TIMES
            | Self::FD_FILESTAT_GET
            | Self::FD_FILESTAT_SET_TIMES
            | Self::PATH_SYMLINK
            | Self::PATH_UNLINK_FILE
            | Self::PATH_REMOVE_DIRECTORY
            | Self::POLL_FD_READWRITE
    }

    fn directory_inheriting() -> Self {
        Self::directory_base() | Self::regular_file_base()
    }

    fn regular_file_base() -> Self {
        Self::FD_DATASYNC
            | Self::FD_READ
            | Self::FD_SEEK
            | Self::FD_FDSTAT_SET_FLAGS
            | Self::FD_SYNC
            | Self::FD_TELL
            | Self::FD_WRITE
            | Self::FD_ADVISE
            | Self::FD_ALLOCATE
            | Self::FD_FILESTAT_GET
            | Self::FD_FILESTAT_SET_SIZE
            | Self::FD_FILESTAT_SET_TIMES
            | Self::POLL_FD_READWRITE
    }

    fn regular_file_inheriting() -> Self {
        Self::empty()
    }

    // Character devices (stdio, `/dev/null`) are outside WASI's normal
    // capability containment; grant everything meaningful for an fd.
    fn character_device_base() -> Self {
        Self::FD_DATASYNC
            | Self::FD_READ
            | Self::FD_SEEK
            | Self::FD_FDSTAT_SET_FLAGS
            | Self::FD_SYNC
            | Self::FD_TELL
            | Self::FD_WRITE
            | Self::FD_ADVISE
            | Self::FD_FILESTAT_GET
            | Self::POLL_FD_READWRITE
    }

    fn character_device_inheriting() -> Self {
        Self::empty()
    }
}

/// The write-capable and create/delete-capable bits that `compute_initial`
/// strips out when access is read-only or the respective allow-flag is off.
fn write_bits() -> Rights {
    Rights::FD_WRITE
        | Rights::FD_ALLOCATE
        | Rights::FD_FILESTAT_SET_SIZE
        | Rights::FD_FILESTAT_SET_TIMES
        | Rights::PATH_FILESTAT_SET_SIZE
        | Rights::PATH_FILESTAT_SET_TIMES
}

fn create_bits() -> Rights {
    Rights::PATH_CREATE_FILE | Rights::PATH_CREATE_DIRECTORY | Rights::PATH_SYMLINK
}

fn delete_bits() -> Rights {
    Rights::PATH_UNLINK_FILE | Rights::PATH_REMOVE_DIRECTORY
}

/// Computes the initial base/inheriting rights for a freshly opened
/// descriptor of file type `kind`, per spec §4.3.
pub fn compute_initial(
    kind: Filetype,
    access: AccessMode,
    allow_create: bool,
    allow_delete: bool,
) -> (Rights, Rights) {
    let (mut base, mut inheriting) = match kind {
        Filetype::Directory => (Rights::directory_base(), Rights::directory_inheriting()),
        Filetype::RegularFile => (
            Rights::regular_file_base(),
            Rights::regular_file_inheriting(),
        ),
        Filetype::CharacterDevice => (
            Rights::character_device_base(),
            Rights::character_device_inheriting(),
        ),
        _ => (Rights::empty(), Rights::empty()),
    };

    if !access.can_read() {
        base.remove(Rights::FD_READ | Rights::PATH_READLINK | Rights::FD_READDIR);
        inheriting.remove(Rights::FD_READ | Rights::PATH_READLINK | Rights::FD_READDIR);
    }
    if !access.can_write() {
        base.remove(write_bits());
        inheriting.remove(write_bits());
    }
    if !allow_create {
        base.remove(create_bits());
        inheriting.remove(create_bits());
    }
    if !allow_delete {
        base.remove(delete_bits());
        inheriting.remove(delete_bits());
    }
    (base, inheriting)
}

/// Bitwise-AND restriction (spec §4.3).
pub fn restrict(computed: Rights, restricted: Rights) -> Rights {
    computed & restricted
}

/// Derives the rights of a descriptor opened through `parent`, per spec
/// §4.3: the child's rights are the requested rights intersected with the
/// parent's inheriting rights, and it is an error (`ENOTCAPABLE`, not a
/// silent narrowing) for the request to have asked for anything the parent
/// does not grant.
pub fn derive_child(
    parent_inheriting: Rights,
    requested_base: Rights,
    requested_inheriting: Rights,
) -> Result<(Rights, Rights), Errno> {
    if !parent_inheriting.contains(requested_base) || !parent_inheriting.contains(requested_inheriting)
    {
        return Err(Errno::Notcapable);
    }
    Ok((
        requested_base & parent_inheriting,
        requested_inheriting & parent_inheriting,
    ))
}

/// `fd_fdstat_set_rights` must only ever narrow: both new masks must be
/// subsets of the descriptor's current rights (spec §4.3).
pub fn narrow(
    current_base: Rights,
    current_inheriting: Rights,
    new_base: Rights,
    new_inheriting: Rights,
) -> Result<(), Errno> {
    if current_base.contains(new_base) && current_inheriting.contains(new_inheriting) {
        Ok(())
    } else {
        Err(Errno::Notcapable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_access_strips_write_bits() {
        let (base, _) = compute_initial(Filetype::RegularFile, AccessMode::ReadOnly, true, true);
        assert!(!base.contains(Rights::FD_WRITE));
        assert!(base.contains(Rights::FD_READ));
    }

    #[test]
    fn disallowing_create_strips_create_bits_from_directory() {
        let (base, inheriting) =
            compute_initial(Filetype::Directory, AccessMode::ReadWrite, false, true);
        assert!(!base.contains(Rights::PATH_CREATE_FILE));
        assert!(!inheriting.contains(Rights::PATH_CREATE_FILE));
    }

    #[test]
    fn derive_child_rejects_request_exceeding_parent_inheriting() {
        let parent_inheriting = Rights::FD_READ;
        let err = derive_child(parent_inheriting, Rights::FD_READ | Rights::FD_WRITE, Rights::empty())
            .unwrap_err();
        assert_eq!(err, Errno::Notcapable);
    }

    #[test]
    fn derive_child_intersects_when_within_bounds() {
        let parent_inheriting = Rights::FD_READ | Rights::FD_WRITE;
        let (base, inheriting) =
            derive_child(parent_inheriting, Rights::FD_READ, Rights::empty()).unwrap();
        assert_eq!(base, Rights::FD_READ);
        assert_eq!(inheriting, Rights::empty());
    }

    #[test]
    fn narrow_rejects_widening() {
        let err = narrow(Rights::FD_READ, Rights::empty(), Rights::FD_READ | Rights::FD_WRITE, Rights::empty())
            .unwrap_err();
        assert_eq!(err, Errno::Notcapable);
    }

    #[test]
    fn narrow_allows_subset() {
        narrow(
            Rights::FD_READ | Rights::FD_WRITE,
            Rights::empty(),
            Rights::FD_READ,
            Rights::empty(),
        )
        .unwrap();
    }
}
