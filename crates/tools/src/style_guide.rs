//! `get_style_guide_tags` and `get_style_guide`.
//!
//! There is no style-guide library behind these yet: tags come from a fixed
//! vocabulary and every request gets the same baseline guide, labelled with
//! whatever the model asked for.

use async_trait::async_trait;
use pengate_core::error::ToolError;
use pengate_core::tool::{Tool, ToolResult};
use serde::Serialize;
use serde_json::json;

use crate::catalog::{GET_STYLE_GUIDE, GET_STYLE_GUIDE_TAGS};
use crate::input::ToolInput;

#[derive(Debug, Clone, Serialize)]
pub struct StyleTags {
    pub style: &'static [&'static str],
    pub color: &'static [&'static str],
    pub industry: &'static [&'static str],
    pub platform: &'static [&'static str],
    pub layout: &'static [&'static str],
}

pub const STYLE_TAGS: StyleTags = StyleTags {
    style: &[
        "minimal",
        "bold",
        "elegant",
        "playful",
        "corporate",
        "modern",
        "retro",
        "brutalist",
    ],
    color: &[
        "monochrome",
        "vibrant",
        "pastel",
        "dark",
        "light",
        "warm",
        "cool",
        "earth-tones",
    ],
    industry: &[
        "saas",
        "ecommerce",
        "finance",
        "healthcare",
        "education",
        "creative",
        "technology",
    ],
    platform: &["mobile", "website", "webapp", "dashboard"],
    layout: &[
        "grid",
        "asymmetric",
        "centered",
        "full-width",
        "card-based",
        "sidebar",
    ],
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleGuide {
    pub name: String,
    pub based_on: Vec<String>,
    pub typography: Typography,
    pub colors: Palette,
    pub spacing: Spacing,
    pub border_radius: Radii,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    pub heading_font: &'static str,
    pub body_font: &'static str,
    pub sizes: TypeScale,
    pub weights: Weights,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeScale {
    pub h1: u32,
    pub h2: u32,
    pub h3: u32,
    pub h4: u32,
    pub body: u32,
    pub small: u32,
    pub caption: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Weights {
    pub heading: &'static str,
    pub body: &'static str,
    pub emphasis: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub text_muted: &'static str,
    pub border: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Spacing {
    pub xs: u32,
    pub sm: u32,
    pub md: u32,
    pub lg: u32,
    pub xl: u32,
    pub xxl: u32,
    pub section: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Radii {
    pub sm: u32,
    pub md: u32,
    pub lg: u32,
    pub xl: u32,
    pub full: u32,
}

pub const DEFAULT_GUIDE_NAME: &str = "Generated Style Guide";

impl StyleGuide {
    /// The baseline guide, labelled with the request.
    pub fn baseline(name: Option<String>, tags: Option<Vec<String>>) -> Self {
        Self {
            name: name.unwrap_or_else(|| DEFAULT_GUIDE_NAME.to_string()),
            based_on: tags.unwrap_or_default(),
            typography: Typography {
                heading_font: "Inter",
                body_font: "Inter",
                sizes: TypeScale {
                    h1: 48,
                    h2: 36,
                    h3: 24,
                    h4: 18,
                    body: 16,
                    small: 14,
                    caption: 12,
                },
                weights: Weights {
                    heading: "700",
                    body: "400",
                    emphasis: "600",
                },
            },
            colors: Palette {
                primary: "#3B82F6",
                secondary: "#8B5CF6",
                accent: "#F59E0B",
                background: "#FFFFFF",
                surface: "#F8FAFC",
                text: "#0F172A",
                text_muted: "#64748B",
                border: "#E2E8F0",
                success: "#22C55E",
                error: "#EF4444",
                warning: "#F59E0B",
            },
            spacing: Spacing {
                xs: 4,
                sm: 8,
                md: 16,
                lg: 24,
                xl: 32,
                xxl: 48,
                section: 64,
            },
            border_radius: Radii {
                sm: 4,
                md: 8,
                lg: 12,
                xl: 16,
                full: 9999,
            },
        }
    }
}

pub struct StyleGuideTagsTool;

#[async_trait]
impl Tool for StyleGuideTagsTool {
    fn name(&self) -> &str {
        GET_STYLE_GUIDE_TAGS.name
    }

    fn description(&self) -> &str {
        GET_STYLE_GUIDE_TAGS.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        GET_STYLE_GUIDE_TAGS.schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        ToolInput::decode(self.name(), &arguments)?;
        Ok(ToolResult::json(true, json!({ "tags": STYLE_TAGS })))
    }
}

pub struct StyleGuideTool;

#[async_trait]
impl Tool for StyleGuideTool {
    fn name(&self) -> &str {
        GET_STYLE_GUIDE.name
    }

    fn description(&self) -> &str {
        GET_STYLE_GUIDE.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        GET_STYLE_GUIDE.schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let ToolInput::GetStyleGuide(input) = ToolInput::decode(self.name(), &arguments)? else {
            return Err(ToolError::InvalidArguments(self.name().into()));
        };
        let guide = StyleGuide::baseline(input.name, input.tags);
        let data = serde_json::to_value(&guide).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::json(true, data))
    }
}
