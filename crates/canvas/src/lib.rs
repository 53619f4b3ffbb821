//! # Pengate Canvas
//!
//! An in-process [`DocumentTree`](pengate_core::DocumentTree). The live
//! editor owns the real document; this one backs sandbox sessions, the
//! `pengate script` command and tests.
//!
//! Nodes live in a flat map keyed by id with ordered child lists. Component
//! instances (`ref` nodes) never copy their component: edits addressed
//! through an instance land in its `descendants` override map, keyed by the
//! component-side id path.

pub mod document;
pub mod file;
pub mod image;
pub mod layout;
mod node;
mod query;

pub use document::{InMemoryDocument, ROOT_ID};
pub use file::{DocumentFile, DocumentFileError};
pub use image::PlaceholderImageSource;
pub use layout::Rect;
pub use node::IMMUTABLE_KEYS;
