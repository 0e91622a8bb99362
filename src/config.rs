//! The configuration surface (spec §6, expanded in `SPEC_FULL.md`) and its
//! builder, mirroring `wasi_cap_std_sync::WasiCtxBuilder`'s shape (the one
//! piece of the teacher's own cap-std-sync usage retained in the pack, in
//! `tests/all/sync.rs`): fallible construction returns `anyhow::Result`,
//! never a guest-visible errno (spec §7, "Configuration errors at
//! construction time are surfaced to the embedder, not the guest").

use crate::ctx::WasiFilesystemCtx;
use crate::types::AccessMode;
use anyhow::{bail, Context};
use cap_std::fs::Dir;
use std::path::PathBuf;

pub(crate) struct PreopenSpec {
    pub guest_path: String,
    pub dir: Dir,
    pub host_path: PathBuf,
    pub access: AccessMode,
}

pub struct Config {
    pub(crate) host_root: Option<PreopenSpec>,
    pub(crate) preopens: Vec<PreopenSpec>,
    pub(crate) max_open_file_descriptors: usize,
    pub(crate) default_permissions: AccessMode,
    pub(crate) allow_file_creation: bool,
    pub(crate) allow_file_deletion: bool,
    pub(crate) stdin: bool,
    pub(crate) stdout: bool,
    pub(crate) stderr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_root: None,
            preopens: Vec::new(),
            max_open_file_descriptors: 1024,
            default_permissions: AccessMode::ReadWrite,
            allow_file_creation: true,
            allow_file_deletion: true,
            stdin: false,
            stdout: false,
            stderr: false,
        }
    }
}

/// Builder for [`WasiFilesystemCtx`]. See `SPEC_FULL.md`'s "Configuration
/// surface" section for the full enumerated surface.
pub struct WasiFilesystemCtxBuilder {
    config: Config,
}

impl WasiFilesystemCtxBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Records the mandatory host root directory, bound at guest path `/`
    /// (spec §3: "The root mapping `/` must exist").
    pub fn host_root_directory(mut self, dir: Dir, host_path: impl Into<PathBuf>) -> Self {
        let access = self.config.default_permissions;
        self.config.host_root = Some(PreopenSpec {
            guest_path: "/".to_string(),
            dir,
            host_path: host_path.into(),
            access,
        });
        self
    }

    /// Adds an additional preopen at `guest_path`, which must be absolute
    /// and is not allowed to be (or be under) `/dev` (spec §3, §4.2).
    pub fn preopened_dir(
        mut self,
        dir: Dir,
        guest_path: impl Into<String>,
        host_path: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let guest_path = guest_path.into();
        if !guest_path.starts_with('/') {
            bail!("preopen guest path {guest_path:?} must be absolute");
        }
        if guest_path == "/dev" || guest_path.starts_with("/dev/") {
            bail!("the /dev prefix is reserved and cannot be bound");
        }
        self.config.preopens.push(PreopenSpec {
            guest_path,
            dir,
            host_path: host_path.into(),
            access: self.config.default_permissions,
        });
        Ok(self)
    }

    pub fn max_open_file_descriptors(mut self, n: usize) -> Self {
        self.config.max_open_file_descriptors = n;
        self
    }

    pub fn default_permissions(mut self, mode: AccessMode) -> Self {
        self.config.default_permissions = mode;
        self
    }

    pub fn allow_file_creation(mut self, allow: bool) -> Self {
        self.config.allow_file_creation = allow;
        self
    }

    pub fn allow_file_deletion(mut self, allow: bool) -> Self {
        self.config.allow_file_deletion = allow;
        self
    }

    /// Binds fd 0 to the process's real stdin (spec §3 invariant: ids 0-2
    /// are reserved and, if configured, pre-bound to stdio).
    pub fn inherit_stdin(mut self) -> Self {
        self.config.stdin = true;
        self
    }

    pub fn inherit_stdout(mut self) -> Self {
        self.config.stdout = true;
        self
    }

    pub fn inherit_stderr(mut self) -> Self {
        self.config.stderr = true;
        self
    }

    /// Validates the configuration and constructs the subsystem instance.
    /// Any error here is a construction-time embedder error, never a
    /// guest-visible errno (spec §7).
    pub fn build(self) -> anyhow::Result<WasiFilesystemCtx> {
        if self.config.max_open_file_descriptors == 0 {
            bail!("max_open_file_descriptors must be positive");
        }
        if self.config.host_root.is_none() {
            bail!("host_root_directory is mandatory");
        }
        WasiFilesystemCtx::from_config(self.config).context("failed to initialize filesystem host")
    }
}

impl Default for WasiFilesystemCtxBuilder {
    fn default() -> Self {
        Self::new()
    }
}
