//! Filesystem primitives for a file-synchronization engine.
//!
//! - [`is_deleted`]: symlink-safe, component-wise check of whether a path the
//!   sync tree knows about is gone from disk. Permission problems never count
//!   as deletions.
//! - [`rename_or_copy`]: atomic rename when source and destination share a
//!   filesystem handle, otherwise (or on a cross-device rename failure) a
//!   copy that is synced before the source is removed.
//!
//! Both work against the [`Filesystem`] capability trait, implemented for the
//! real disk ([`BasicFilesystem`]) and in memory ([`FakeFilesystem`]).

pub mod config;
pub mod copy;
pub mod deleted;
pub mod errors;
pub mod fs;
pub mod helpers;
pub mod logging;
pub mod mover;
pub mod path;

pub use config::{Config, LogLevel, load_config, load_config_from_xml_path};
pub use copy::DurabilityMode;
pub use deleted::is_deleted;
pub use errors::{FsError, MoveError};
pub use fs::{
    BasicFilesystem, EntryKind, FakeFilesystem, FileId, Filesystem, FilesystemType, Metadata, classify,
    same_filesystem,
};
pub use logging::init_tracing;
pub use mover::{MoveOptions, MoveOutcome, rename_or_copy, rename_or_copy_with};
pub use path::{canonical_filename, native_filename};
