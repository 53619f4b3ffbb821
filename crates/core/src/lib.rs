//! # Pengate Core
//!
//! Domain types, traits, and error definitions for the Pengate design-agent
//! gateway. This crate has **no framework dependencies**; it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`]: the language-model backend
//! - [`DocumentTree`]: the canvas document being edited
//! - [`ImageSource`]: generative / stock image lookup
//!
//! Implementations live in their respective crates, so the orchestration
//! code can be tested against in-process fakes.

pub mod document;
pub mod error;
pub mod image;
pub mod message;
pub mod provider;
pub mod query;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use document::{
    CopyOptions, Direction, DocumentTree, NodeType, Placement, Props, SharedDocument, Target,
};
pub use error::{CanvasError, Error, ProviderError, Result, ToolError};
pub use image::{ImageFill, ImageKind, ImageSource};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition, Usage,
};
pub use query::{
    BatchGetQuery, EmptySpaceQuery, LayoutQuery, NodePattern, PropertyName, PropertyReplacements,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
