//! Append-only submission history.

use serde::{Deserialize, Serialize};

use crate::entity::{BatchId, StickerEntity};

/// One submitted batch and the entities it produced.
///
/// Created at submission with an empty entity list, updated once when
/// the batch resolves. The core never deletes records; pruning is a
/// front-end concern. A record can be re-inserted into the live
/// collection via [`Session::restore_from_history`].
///
/// [`Session::restore_from_history`]: crate::Session::restore_from_history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// The batch this record mirrors.
    pub batch_id: BatchId,
    /// The prompt that was submitted.
    pub prompt: String,
    /// Optional guidance image attached at submission time.
    pub reference_image: Option<Vec<u8>>,
    /// Entity snapshots taken when the batch resolved (empty until
    /// then).
    pub entities: Vec<StickerEntity>,
}
