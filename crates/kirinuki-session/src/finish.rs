//! The finishing pipeline: draft in, transparent sticker out.
//!
//! One orchestration task per selected candidate drives
//! `Drafted -> Upscaling -> Masking -> Matting -> Complete`, with
//! `Failed` reachable from any non-terminal state. Pipelines for
//! different candidates run concurrently and suspend independently at
//! their service calls; a failure never touches siblings.

use futures::future::join_all;
use kirinuki_export::sticker_filename;
use kirinuki_matte::{MatteConfig, MatteError};
use kirinuki_service::ServiceError;

use crate::entity::{StickerId, StickerStatus};
use crate::session::Session;

/// Instruction for the upscale re-render: same subject, same white
/// background, higher fidelity.
const UPSCALE_INSTRUCTION: &str = "Generate a high-fidelity, high-resolution version of \
    this sticker. Preserve the exact composition, colors, and subject details. \
    Keep the background pure white.";

/// Instruction for the contrasting-background twin.
const MASK_INSTRUCTION: &str = "Change the background to solid black (#000000). \
    Do not change the subject. Keep the sticker subject exactly identical to the \
    original image.";

/// Tunables for the finishing pipeline.
#[derive(Debug, Clone)]
pub struct FinishConfig {
    /// Edge length of the finished sticker in pixels.
    pub target_size: u32,

    /// Target sizes at or above this require elevated service access,
    /// checked before the first re-render.
    pub elevated_threshold: u32,

    /// Alpha-recovery tunables passed through to the matting engine.
    pub matte: MatteConfig,
}

impl Default for FinishConfig {
    fn default() -> Self {
        Self {
            target_size: 4096,
            elevated_threshold: 2048,
            matte: MatteConfig::default(),
        }
    }
}

/// Why one candidate's pipeline stopped. Converted into the `Failed`
/// status at the pipeline boundary; never escapes to siblings.
#[derive(Debug, thiserror::Error)]
enum FinishError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Matte(#[from] MatteError),

    #[error("sticker has no draft image")]
    NotDrafted,
}

impl Session {
    /// Finish every currently selected candidate, concurrently.
    ///
    /// The selection is snapshotted up front; returns once every
    /// pipeline has settled. Individual failures are absorbed into the
    /// affected candidate's `Failed` status.
    pub async fn process_selected(&self) {
        let ids: Vec<StickerId> = self.state.borrow().selection.iter().copied().collect();
        tracing::info!(count = ids.len(), "finishing selected stickers");
        join_all(ids.into_iter().map(|id| self.finish_sticker(id))).await;
    }

    /// Drive one candidate's pipeline, absorbing its failure.
    async fn finish_sticker(&self, id: StickerId) {
        if let Err(err) = self.try_finish(id).await {
            tracing::warn!(%id, "finishing failed: {err}");
            self.fail_entity(id);
        }
    }

    async fn try_finish(&self, id: StickerId) -> Result<(), FinishError> {
        let Some(entity) = self.entity(id) else {
            // Cleared or never existed; nothing to do.
            return Ok(());
        };

        // Cached result: skip all computation, re-trigger the export
        // side effect only.
        if let Some(final_image) = entity.final_image {
            self.export_final(id, &final_image).await;
            return Ok(());
        }

        if entity.status != StickerStatus::Drafted {
            // Already in flight elsewhere, or not eligible yet.
            return Ok(());
        }
        let draft = entity.draft_image.ok_or(FinishError::NotDrafted)?;

        if !self.patch_entity(id, |e| e.status = StickerStatus::Upscaling) {
            return Ok(());
        }

        self.ensure_fidelity_tier().await?;
        let upscaled = self
            .service
            .regenerate(&draft, UPSCALE_INSTRUCTION, self.config.target_size)
            .await?;
        // Later steps operate on the upgraded render.
        let applied = self.patch_entity(id, |e| {
            e.draft_image = Some(upscaled.clone());
            e.status = StickerStatus::Masking;
        });
        if !applied {
            return Ok(());
        }

        self.ensure_fidelity_tier().await?;
        let mask = self
            .service
            .regenerate(&upscaled, MASK_INSTRUCTION, self.config.target_size)
            .await?;
        let applied = self.patch_entity(id, |e| {
            e.mask_image = Some(mask.clone());
            e.status = StickerStatus::Matting;
        });
        if !applied {
            return Ok(());
        }

        let final_image = kirinuki_matte::matte_encoded(&upscaled, &mask, &self.config.matte)?;
        let applied = self.patch_entity(id, |e| {
            e.final_image = Some(final_image.clone());
            e.status = StickerStatus::Complete;
        });
        if !applied {
            return Ok(());
        }

        self.export_final(id, &final_image).await;
        Ok(())
    }

    /// Check elevated access when the target size sits above the
    /// baseline fidelity tier. Invoked before every such re-render.
    async fn ensure_fidelity_tier(&self) -> Result<(), FinishError> {
        if self.config.target_size >= self.config.elevated_threshold {
            self.service.ensure_elevated_access().await?;
        }
        Ok(())
    }

    /// Hand the finished image to the export sink.
    ///
    /// Fire-and-forget: a failed save is logged and never changes
    /// sticker state.
    async fn export_final(&self, id: StickerId, image: &[u8]) {
        let filename = sticker_filename(self.config.target_size, &id.to_string());
        if let Err(err) = self.export.save(image, &filename).await {
            tracing::warn!(%id, "export failed: {err}");
        }
    }
}
