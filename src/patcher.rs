#![deny(missing_docs)]

//! # Source Patching
//!
//! The edit engine and the three patch strategies built on it. All
//! strategies share the same discipline: compute byte-range edits from
//! the current tree, splice the raw buffer, then reparse before the next
//! position-based lookup.
//!
//! - **engine**: the buffer/tree pair and its clean/dirty state machine.
//! - **locate**: name-and-kind declaration lookup with typed errors.
//! - **imports**: alias resolution and import insertion.
//! - **mount**: inserting fields into structs.
//! - **tags**: rewriting field tags from naming strategies.
//! - **sync**: keeping implementations in step with their interfaces.

/// The shared edit/reparse loop.
pub mod engine;

/// Declaration lookup.
pub mod locate;

/// Import alias bookkeeping and the module-path cache.
pub mod imports;

/// The field mounting strategy.
pub mod mount;

/// The tag synthesis strategy.
pub mod tags;

/// The interface stub synchronization strategy.
pub mod sync;

pub use engine::SourceUnit;
pub use imports::{add_import_edit, resolve_alias, AliasResolution, ModulePathCache};
pub use locate::{locate, locate_interface, locate_struct, DeclKind};
pub use mount::{mount_field, mount_into, MountRequest};
pub use sync::{
    sync_annotated_interfaces, sync_interface, SyncReport, SyncRequest, DEFAULT_SKELETON,
};
pub use tags::{
    parse_tag, render_tag, strategies_from_json, synthesize_into, synthesize_tags,
    synthesize_tags_in_dir, NamingMode, TagStrategy,
};
