//! Image collaborator: generative or stock lookup for `G(...)` operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Ai,
    Stock,
}

impl ImageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(ImageKind::Ai),
            "stock" => Some(ImageKind::Stock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Ai => "ai",
            ImageKind::Stock => "stock",
        }
    }
}

/// Image content usable as a node fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFill {
    pub url: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "fill".into()
}

impl ImageFill {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: default_mode(),
        }
    }

    /// The fill value as stored on a node.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "type": "image", "url": self.url, "mode": self.mode })
    }
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, kind: ImageKind, prompt: &str) -> Result<ImageFill, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_only_known_tags() {
        assert_eq!(ImageKind::parse("ai"), Some(ImageKind::Ai));
        assert_eq!(ImageKind::parse("stock"), Some(ImageKind::Stock));
        assert_eq!(ImageKind::parse("AI"), None);
    }

    #[test]
    fn fill_value_shape() {
        let v = ImageFill::new("https://img/1").to_value();
        assert_eq!(v["type"], "image");
        assert_eq!(v["mode"], "fill");
    }
}
