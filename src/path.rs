//! The Path Mapper (spec §4.2): the preopen table and longest-prefix
//! resolution. Containment of `..`/symlink escapes is delegated to
//! `cap_std::fs::Dir` at the point an operation actually touches the host
//! filesystem (see `SPEC_FULL.md` §4 and `DESIGN.md`) — each preopen is
//! represented by a capability-safe directory handle rather than a raw host
//! path string, so an escaping path is rejected by the handle itself before
//! any syscall reaches outside the preopen root.

use crate::errno::Errno;
use cap_std::fs::Dir;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub struct Preopen {
    pub guest_prefix: String,
    pub dir: Dir,
    /// Host path, retained only for diagnostics and `fd_prestat_dir_name`;
    /// never used to build a raw path for a syscall.
    pub host_path: PathBuf,
}

pub struct PathMapper {
    preopens: RwLock<Vec<Preopen>>,
}

fn normalize_guest_prefix(prefix: &str) -> Result<String, Errno> {
    if !prefix.starts_with('/') {
        return Err(Errno::Inval);
    }
    if prefix == "/" {
        return Ok("/".to_string());
    }
    Ok(prefix.trim_end_matches('/').to_string())
}

fn rejects_dev(prefix: &str) -> bool {
    prefix == "/dev" || prefix.starts_with("/dev/")
}

impl PathMapper {
    pub fn new() -> Self {
        Self {
            preopens: RwLock::new(Vec::new()),
        }
    }

    /// Records the host root under the guest root `/` (spec §4.2
    /// `set_root`).
    pub fn set_root(&self, dir: Dir, host_path: PathBuf) -> Result<(), Errno> {
        self.add_mapping("/", dir, host_path)
    }

    /// Adds a guest-prefix → host-directory mapping. Rejects `/dev` or any
    /// subpath of it, which is reserved (spec §3, §4.2).
    pub fn add_mapping(&self, guest_prefix: &str, dir: Dir, host_path: PathBuf) -> Result<(), Errno> {
        let prefix = normalize_guest_prefix(guest_prefix)?;
        if rejects_dev(&prefix) {
            return Err(Errno::Acces);
        }
        let mut preopens = self.preopens.write().unwrap();
        preopens.retain(|p| p.guest_prefix != prefix);
        preopens.push(Preopen {
            guest_prefix: prefix,
            dir,
            host_path,
        });
        Ok(())
    }

    pub fn remove_mapping(&self, guest_prefix: &str) -> bool {
        let Ok(prefix) = normalize_guest_prefix(guest_prefix) else {
            return false;
        };
        let mut preopens = self.preopens.write().unwrap();
        let before = preopens.len();
        preopens.retain(|p| p.guest_prefix != prefix);
        preopens.len() != before
    }

    /// Finds the mapping whose guest-prefix is the longest prefix of
    /// `guest_path` (on path-segment boundaries) and returns the relative
    /// sub-path cap-std operations should be given, along with the
    /// preopen's guest-prefix and host path for diagnostics.
    pub fn resolve(&self, guest_path: &str) -> Result<(String, PathBuf, PathBuf), Errno> {
        if !guest_path.starts_with('/') {
            return Err(Errno::Inval);
        }
        if rejects_dev(guest_path) {
            return Err(Errno::Notcapable);
        }
        let preopens = self.preopens.read().unwrap();
        let best = preopens
            .iter()
            .filter(|p| is_prefix_match(&p.guest_prefix, guest_path))
            .max_by_key(|p| p.guest_prefix.len())
            .ok_or(Errno::Noent)?;

        let rest = if best.guest_prefix == "/" {
            guest_path.trim_start_matches('/')
        } else {
            guest_path[best.guest_prefix.len()..].trim_start_matches('/')
        };
        Ok((best.guest_prefix.clone(), PathBuf::from(rest), best.host_path.clone()))
    }

    /// Runs `f` with the `Dir` handle for the preopen matching `guest_path`,
    /// and the relative path within it. This is the only way callers reach
    /// a `Dir` — the lock is never held across the call into `f`'s caller.
    pub fn with_resolved<T>(
        &self,
        guest_path: &str,
        f: impl FnOnce(&Dir, &Path) -> Result<T, Errno>,
    ) -> Result<T, Errno> {
        if !guest_path.starts_with('/') {
            return Err(Errno::Inval);
        }
        if rejects_dev(guest_path) {
            return Err(Errno::Notcapable);
        }
        let preopens = self.preopens.read().unwrap();
        let best = preopens
            .iter()
            .filter(|p| is_prefix_match(&p.guest_prefix, guest_path))
            .max_by_key(|p| p.guest_prefix.len())
            .ok_or(Errno::Noent)?;
        let rest = if best.guest_prefix == "/" {
            guest_path.trim_start_matches('/')
        } else {
            guest_path[best.guest_prefix.len()..].trim_start_matches('/')
        };
        f(&best.dir, Path::new(rest))
    }

    pub fn prestat_name(&self, guest_prefix: &str) -> Option<String> {
        let preopens = self.preopens.read().unwrap();
        preopens
            .iter()
            .find(|p| p.guest_prefix == guest_prefix)
            .map(|p| p.guest_prefix.clone())
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new()
    }
}

fn is_prefix_match(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        assert!(is_prefix_match("/", "/a/b"));
        assert!(is_prefix_match("/a", "/a/b"));
        assert!(!is_prefix_match("/ab", "/a/b"));
    }

    #[test]
    fn dev_prefix_is_rejected_at_add_time() {
        let mapper = PathMapper::new();
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::open_ambient_dir(tmp.path(), cap_std::ambient_authority()).unwrap();
        assert_eq!(
            mapper
                .add_mapping("/dev", dir, tmp.path().to_path_buf())
                .unwrap_err(),
            Errno::Acces
        );
    }
}
