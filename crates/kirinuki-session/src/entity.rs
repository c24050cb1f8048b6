//! Sticker entities and their identifiers.

use kirinuki_service::DRAFT_VARIANTS;
use serde::{Deserialize, Serialize};

/// Identifier of one submitted batch (one prompt).
///
/// Drawn from a session-local monotonic counter, so two batches
/// submitted in the same instant can never collide. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(u64);

impl BatchId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one sticker candidate, displayed `<batch>:<variant>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StickerId {
    /// The batch this candidate belongs to.
    pub batch: BatchId,
    /// Variant index within the batch.
    pub variant: u8,
}

impl StickerId {
    /// All candidate ids of one batch, in variant order.
    pub(crate) fn variants(batch: BatchId) -> impl Iterator<Item = Self> {
        #[expect(clippy::cast_possible_truncation)]
        let count = DRAFT_VARIANTS as u8;
        (0..count).map(move |variant| Self { batch, variant })
    }
}

impl std::fmt::Display for StickerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.batch, self.variant)
    }
}

/// Processing state of one sticker candidate.
///
/// `Complete` and `Failed` are terminal; once a candidate fails, no
/// field of it is ever written again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StickerStatus {
    /// Placeholder waiting for its batch to produce a draft.
    QueuedDraft,
    /// Draft render available; eligible for finishing.
    Drafted,
    /// The finishing pipeline is re-rendering at full fidelity.
    Upscaling,
    /// The contrasting-background twin is being generated.
    Masking,
    /// Alpha recovery is running.
    Matting,
    /// The transparent result is stored.
    Complete,
    /// Something went wrong; this candidate is frozen.
    Failed,
}

impl StickerStatus {
    /// Whether this candidate can be part of the selection set.
    #[must_use]
    pub const fn is_selectable(self) -> bool {
        !matches!(self, Self::QueuedDraft | Self::Failed)
    }

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// One sticker candidate: the images accumulated so far plus status.
///
/// Invariants: `final_image` is only ever set together with
/// `Complete`; `mask_image` only together with the transition into
/// `Matting`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerEntity {
    /// Stable unique identifier.
    pub id: StickerId,
    /// The prompt that produced this candidate (set when the batch
    /// resolves).
    pub prompt: Option<String>,
    /// Flat-background draft render; replaced by the upscaled render
    /// during finishing.
    pub draft_image: Option<Vec<u8>>,
    /// Contrasting-background twin.
    pub mask_image: Option<Vec<u8>>,
    /// The matted, alpha-recovered result (terminal).
    pub final_image: Option<Vec<u8>>,
    /// Current processing state.
    pub status: StickerStatus,
}

impl StickerEntity {
    /// Fresh placeholder created at submission time.
    pub(crate) const fn placeholder(id: StickerId) -> Self {
        Self {
            id,
            prompt: None,
            draft_image: None,
            mask_image: None,
            final_image: None,
            status: StickerStatus::QueuedDraft,
        }
    }
}
