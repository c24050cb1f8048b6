//! kirinuki-service: the generation-service contract.
//!
//! The sticker pipeline consumes an external image-generation
//! capability through the [`GenerationService`] trait: free-text
//! decomposition into prompts, prompt-to-draft expansion, and
//! same-subject re-rendering (used for upscaling and for producing the
//! contrasting-background twin). [`gemini`] provides the concrete
//! client; everything else in the workspace depends only on the trait.

use async_trait::async_trait;

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

/// Number of draft variants one prompt expands into.
pub const DRAFT_VARIANTS: usize = 4;

/// Errors surfaced by the generation service.
///
/// Both variants propagate unchanged to the caller; the pipeline
/// decides whether a failure is batch-level or entity-level.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The capability is not usable at all (e.g. missing credential).
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A call completed but returned no usable image.
    #[error("generation failed: {0}")]
    GenerationFailure(String),
}

/// The image-generation capability the sticker pipeline consumes.
///
/// All methods are suspension points; implementations must not block
/// indefinitely. Futures are `?Send` — the pipeline runs on a single
/// logical thread of control.
#[async_trait(?Send)]
pub trait GenerationService {
    /// Best-effort decomposition of free text into independent prompts.
    ///
    /// Callers must not rely on this succeeding: use
    /// [`split_prompts_or_lines`] to get the mandatory deterministic
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the underlying capability fails.
    async fn split_prompts(&self, raw: &str) -> Result<Vec<String>, ServiceError>;

    /// Expand one prompt into [`DRAFT_VARIANTS`] independent
    /// flat-background draft renders.
    ///
    /// The index → variant mapping is stable within one call; nothing
    /// is guaranteed across calls.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when any variant request fails.
    async fn generate_drafts(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<[Vec<u8>; DRAFT_VARIANTS], ServiceError>;

    /// Re-render the same subject at `target_size`, steered by a
    /// caller-controlled instruction (upscale, or swap to a
    /// contrasting background).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the request fails or no image
    /// comes back.
    async fn regenerate(
        &self,
        image: &[u8],
        instruction: &str,
        target_size: u32,
    ) -> Result<Vec<u8>, ServiceError>;

    /// Confirm that the high-fidelity tier may be used.
    ///
    /// Callers invoke this before any [`regenerate`](Self::regenerate)
    /// above the baseline fidelity tier.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ServiceUnavailable`] when elevated
    /// fidelity is not enabled.
    async fn ensure_elevated_access(&self) -> Result<(), ServiceError>;
}

/// Deterministic prompt splitting: one prompt per trimmed non-empty
/// line.
#[must_use]
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Split free text into prompts, degrading to line splitting.
///
/// Tries the service's splitter first; on failure (or an empty
/// result) falls back to [`split_lines`]. Always returns at least the
/// trimmed non-empty lines of the input, so submission behavior under
/// splitter failure is fully determined.
pub async fn split_prompts_or_lines(service: &dyn GenerationService, raw: &str) -> Vec<String> {
    match service.split_prompts(raw).await {
        Ok(prompts) if !prompts.is_empty() => prompts,
        Ok(_) => split_lines(raw),
        Err(err) => {
            tracing::warn!("prompt splitting failed, falling back to line split: {err}");
            split_lines(raw)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Splitter stub: either a fixed answer or a fixed failure.
    struct StubSplitter {
        result: Result<Vec<String>, ServiceError>,
    }

    #[async_trait(?Send)]
    impl GenerationService for StubSplitter {
        async fn split_prompts(&self, _raw: &str) -> Result<Vec<String>, ServiceError> {
            self.result.clone()
        }

        async fn generate_drafts(
            &self,
            _prompt: &str,
            _reference: Option<&[u8]>,
        ) -> Result<[Vec<u8>; DRAFT_VARIANTS], ServiceError> {
            Err(ServiceError::GenerationFailure("stub".into()))
        }

        async fn regenerate(
            &self,
            _image: &[u8],
            _instruction: &str,
            _target_size: u32,
        ) -> Result<Vec<u8>, ServiceError> {
            Err(ServiceError::GenerationFailure("stub".into()))
        }

        async fn ensure_elevated_access(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[test]
    fn split_lines_trims_and_drops_empties() {
        let raw = "  a red fox  \n\n a blue bird\n   \n";
        assert_eq!(split_lines(raw), vec!["a red fox", "a blue bird"]);
    }

    #[test]
    fn split_lines_of_blank_input_is_empty() {
        assert!(split_lines("   \n \n").is_empty());
    }

    #[tokio::test]
    async fn splitter_success_is_used_verbatim() {
        let service = StubSplitter {
            result: Ok(vec!["a cat".into(), "a dog".into()]),
        };
        let prompts = split_prompts_or_lines(&service, "ignored").await;
        assert_eq!(prompts, vec!["a cat", "a dog"]);
    }

    #[tokio::test]
    async fn splitter_failure_falls_back_to_lines() {
        let service = StubSplitter {
            result: Err(ServiceError::ServiceUnavailable("no key".into())),
        };
        let prompts = split_prompts_or_lines(&service, "a cat\na dog").await;
        assert_eq!(prompts, vec!["a cat", "a dog"]);
    }

    #[tokio::test]
    async fn splitter_empty_result_falls_back_to_lines() {
        let service = StubSplitter { result: Ok(vec![]) };
        let prompts = split_prompts_or_lines(&service, "only line").await;
        assert_eq!(prompts, vec!["only line"]);
    }

    #[test]
    fn service_error_display() {
        let err = ServiceError::ServiceUnavailable("missing API key".into());
        assert_eq!(
            err.to_string(),
            "generation service unavailable: missing API key",
        );
        let err = ServiceError::GenerationFailure("no image returned".into());
        assert_eq!(err.to_string(), "generation failed: no image returned");
    }
}
