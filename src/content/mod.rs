use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod wikipedia;

use crate::Result;

pub use wikipedia::WikipediaClient;

/// Article content resolved for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleContent {
    /// URL of the article's primary image
    pub image_url: String,

    /// Plain-text introduction of the article
    pub summary: String,
}

/// Trait for looking up article content by title
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Return the URL of the article's primary image.
    ///
    /// Fails with `WikicastError::NotFound` when no article matches and with
    /// `WikicastError::NoImage` when the article has no image.
    async fn resolve_image(&self, title: &str) -> Result<String>;

    /// Return the article's introductory text
    async fn resolve_summary(&self, title: &str) -> Result<String>;

    /// Name of the content service
    fn service_name(&self) -> &'static str;
}

/// Resolve image and summary with two independent lookups, image first
pub async fn resolve_content(
    resolver: &dyn ContentResolver,
    title: &str,
) -> Result<ArticleContent> {
    tracing::info!("Resolving article '{}' via {}", title, resolver.service_name());

    let image_url = resolver.resolve_image(title).await?;
    tracing::debug!("Primary image: {}", image_url);

    let summary = resolver.resolve_summary(title).await?;
    tracing::info!("Summary length: {} characters", summary.chars().count());

    Ok(ArticleContent { image_url, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WikicastError;

    #[tokio::test]
    async fn test_resolve_content_stops_after_missing_image() {
        let mut resolver = MockContentResolver::new();
        resolver.expect_service_name().return_const("Fake");
        resolver
            .expect_resolve_image()
            .times(1)
            .returning(|title| Err(WikicastError::NoImage(title.to_string()).into()));
        resolver.expect_resolve_summary().never();

        let err = resolve_content(&resolver, "Plain Article").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<WikicastError>(), Some(WikicastError::NoImage(_))));
    }

    #[tokio::test]
    async fn test_resolve_content_issues_both_lookups() {
        let mut resolver = MockContentResolver::new();
        resolver.expect_service_name().return_const("Fake");
        resolver
            .expect_resolve_image()
            .withf(|title| title == "Albert Einstein")
            .times(1)
            .returning(|_| Ok("https://upload.wikimedia.org/einstein.jpg".to_string()));
        resolver
            .expect_resolve_summary()
            .withf(|title| title == "Albert Einstein")
            .times(1)
            .returning(|_| Ok("Albert Einstein was a physicist.".to_string()));

        let content = resolve_content(&resolver, "Albert Einstein").await.unwrap();
        assert_eq!(content.image_url, "https://upload.wikimedia.org/einstein.jpg");
        assert_eq!(content.summary, "Albert Einstein was a physicist.");
    }
}
