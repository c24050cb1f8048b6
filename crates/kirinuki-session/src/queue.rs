//! The batch queue: serialized prompt-to-drafts generation.
//!
//! Arbitrarily many prompts can be enqueued without blocking, but at
//! most one batch request is ever in flight against the generation
//! service. Draining is event-driven -- kicked after an enqueue and
//! continued after every task resolution -- never a background poll.

use crate::entity::{BatchId, StickerId, StickerStatus};
use crate::session::Session;

/// One queued prompt-to-drafts request.
///
/// Created at submission, consumed exactly once by the queue (success
/// or failure), never mutated after enqueue.
#[derive(Debug, Clone)]
pub struct BatchTask {
    /// The batch this task will resolve.
    pub batch_id: BatchId,
    /// Prompt to expand into draft variants.
    pub prompt: String,
    /// Optional guidance image attached at submission time.
    pub reference_image: Option<Vec<u8>>,
}

impl Session {
    /// Drain the batch queue, strictly one task at a time.
    ///
    /// A task is only started once the previous one's resolution has
    /// been fully applied. Concurrent invocations return immediately:
    /// the active drain re-reads the queue after every resolution and
    /// therefore picks up anything enqueued meanwhile. A batch failure
    /// marks its four placeholders `Failed` and records a recoverable
    /// notice; it never halts the queue.
    pub async fn process_queue(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let task = self.state.borrow_mut().queue.pop_front();
            let Some(task) = task else { break };
            self.run_batch(task).await;
        }

        self.state.borrow_mut().draining = false;
    }

    /// Resolve one batch task and apply the outcome.
    async fn run_batch(&self, task: BatchTask) {
        tracing::info!(batch = %task.batch_id, prompt = %task.prompt, "generating drafts");

        let result = self
            .service
            .generate_drafts(&task.prompt, task.reference_image.as_deref())
            .await;

        match result {
            Ok(variants) => {
                for (id, image) in StickerId::variants(task.batch_id).zip(variants) {
                    self.patch_entity(id, |entity| {
                        entity.prompt = Some(task.prompt.clone());
                        entity.draft_image = Some(image);
                        entity.status = StickerStatus::Drafted;
                    });
                }
            }
            Err(err) => {
                tracing::warn!(batch = %task.batch_id, "draft generation failed: {err}");
                for id in StickerId::variants(task.batch_id) {
                    self.fail_entity(id);
                }
                self.state.borrow_mut().notice =
                    Some(format!("could not generate \"{}\": {err}", task.prompt));
            }
        }

        self.record_batch_outcome(task.batch_id);
    }

    /// Update the matching history record with the resolved entities.
    fn record_batch_outcome(&self, batch_id: BatchId) {
        let mut state = self.state.borrow_mut();
        let snapshots: Vec<_> = StickerId::variants(batch_id)
            .filter_map(|id| state.entities.get(&id).cloned())
            .collect();
        if let Some(record) = state
            .history
            .iter_mut()
            .find(|record| record.batch_id == batch_id)
        {
            record.entities = snapshots;
        }
    }
}
