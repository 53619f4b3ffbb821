//! Offline image source that yields deterministic placeholder URLs.

use async_trait::async_trait;
use pengate_core::{ImageFill, ImageKind, ImageSource, ProviderError};

pub const PLACEHOLDER_BASE_URL: &str = "https://placehold.co/pengate";

/// Maps a prompt to a stable URL without any network call.
#[derive(Debug, Clone)]
pub struct PlaceholderImageSource {
    base_url: String,
}

impl Default for PlaceholderImageSource {
    fn default() -> Self {
        Self::new(PLACEHOLDER_BASE_URL)
    }
}

impl PlaceholderImageSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn slug(prompt: &str) -> String {
    prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl ImageSource for PlaceholderImageSource {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn fetch(&self, kind: ImageKind, prompt: &str) -> Result<ImageFill, ProviderError> {
        let slug = slug(prompt);
        if slug.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 400,
                message: "image prompt has no searchable words".into(),
            });
        }
        Ok(ImageFill::new(format!("{}/{}/{slug}", self.base_url, kind.as_str())))
    }
}
