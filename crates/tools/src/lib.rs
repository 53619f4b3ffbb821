//! Built-in tools for Pengate.
//!
//! The catalog is fixed: thirteen tools, always offered in the same order.
//! Three of them are reference lookups that run in-process. The other ten
//! read or edit the document, and where they run depends on who owns it:
//!
//! - **Relay**: the editor owns the document. Canvas tools are declared to
//!   the model and their calls are forwarded to the client.
//! - **Sandbox**: the session owns an in-process document. Every tool
//!   executes locally.

pub mod canvas;
pub mod catalog;
pub mod guidelines;
pub mod input;
pub mod style_guide;

use std::sync::Arc;

use pengate_core::tool::{Tool, ToolRegistry};
use pengate_core::{ImageSource, SharedDocument};

pub use canvas::{BatchDesignTool, CanvasTool};
pub use catalog::{CATALOG, ToolSpec};
pub use guidelines::{GuidelineTopic, GuidelinesTool};
pub use input::ToolInput;
pub use style_guide::{StyleGuideTagsTool, StyleGuideTool};

/// Where canvas tools run for one session.
#[derive(Clone)]
pub enum CanvasBackend {
    Relay,
    Sandbox {
        document: SharedDocument,
        images: Arc<dyn ImageSource>,
    },
}

impl std::fmt::Debug for CanvasBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanvasBackend::Relay => f.write_str("Relay"),
            CanvasBackend::Sandbox { images, .. } => f
                .debug_struct("Sandbox")
                .field("images", &images.name())
                .finish_non_exhaustive(),
        }
    }
}

fn local_tool(spec: &ToolSpec) -> Option<Box<dyn Tool>> {
    match spec.name {
        n if n == catalog::GET_GUIDELINES.name => Some(Box::new(GuidelinesTool)),
        n if n == catalog::GET_STYLE_GUIDE_TAGS.name => Some(Box::new(StyleGuideTagsTool)),
        n if n == catalog::GET_STYLE_GUIDE.name => Some(Box::new(StyleGuideTool)),
        _ => None,
    }
}

/// Build the registry for one session, in catalog order.
pub fn build_registry(backend: &CanvasBackend) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for spec in CATALOG {
        if let Some(tool) = local_tool(spec) {
            registry.register(tool);
            continue;
        }
        match backend {
            CanvasBackend::Relay => registry.declare(spec.definition()),
            CanvasBackend::Sandbox { document, images } => {
                if spec.name == catalog::BATCH_DESIGN.name {
                    registry.register(Box::new(BatchDesignTool::new(
                        document.clone(),
                        images.clone(),
                    )));
                } else {
                    registry.register(Box::new(CanvasTool::new(spec, document.clone())));
                }
            }
        }
    }

    registry
}
