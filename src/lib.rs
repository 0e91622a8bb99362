//! A sandboxed host implementation of the `wasi_snapshot_preview1` filesystem
//! subsystem: a descriptor table, a rights algebra, a preopen path mapper,
//! and the ABI codec and host function surface a Wasm runtime links against.
//!
//! The runtime that owns the Wasm instance's linear memory is out of scope;
//! callers supply one by implementing [`GuestMemory`](memory::GuestMemory).
//! Everything else — opening, reading, writing, and listing files under a
//! set of preopened directories, with capability rights narrowing on every
//! `path_open` — lives here.
//!
//! ```no_run
//! use wasi_preview1_fs::config::WasiFilesystemCtxBuilder;
//! use cap_std::{ambient_authority, fs::Dir};
//!
//! # fn main() -> anyhow::Result<()> {
//! let root = Dir::open_ambient_dir("/tmp/sandbox", ambient_authority())?;
//! let ctx = WasiFilesystemCtxBuilder::new()
//!     .host_root_directory(root, "/tmp/sandbox")
//!     .inherit_stdout()
//!     .build()?;
//! # let _ = ctx;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod config;
pub mod ctx;
pub mod descriptor;
pub mod errno;
pub mod memory;
pub mod path;
pub mod rights;
pub mod snapshot_preview1;
pub mod stream;
pub mod table;
pub mod types;

pub use config::WasiFilesystemCtxBuilder;
pub use ctx::WasiFilesystemCtx;
pub use errno::Errno;
pub use memory::GuestMemory;
