//! The session controller: sole owner of the live sticker collection,
//! the selection set, the batch queue, and the submission history.
//!
//! Everything runs on one logical thread of control; external-service
//! calls are the only suspension points. The hazard is therefore not a
//! data race but a stale-snapshot overwrite: a completion that was
//! computed against old state clobbering a newer status. All mutation
//! goes through `Session::patch_entity`, which re-reads the live map
//! at write time and silently drops writes for ids that are gone.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use kirinuki_export::ExportSink;
use kirinuki_service::{GenerationService, split_prompts_or_lines};

use crate::entity::{BatchId, StickerEntity, StickerId, StickerStatus};
use crate::finish::FinishConfig;
use crate::history::HistoryRecord;
use crate::queue::BatchTask;

pub(crate) struct SessionState {
    pub(crate) entities: BTreeMap<StickerId, StickerEntity>,
    pub(crate) selection: BTreeSet<StickerId>,
    pub(crate) queue: VecDeque<BatchTask>,
    pub(crate) history: Vec<HistoryRecord>,
    next_batch: u64,
    pub(crate) draining: bool,
    pub(crate) notice: Option<String>,
}

/// The sticker session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    pub(crate) state: Rc<RefCell<SessionState>>,
    pub(crate) service: Rc<dyn GenerationService>,
    pub(crate) export: Rc<dyn ExportSink>,
    pub(crate) config: FinishConfig,
}

impl Session {
    /// Create an empty session around a generation service and an
    /// export sink.
    #[must_use]
    pub fn new(
        service: Rc<dyn GenerationService>,
        export: Rc<dyn ExportSink>,
        config: FinishConfig,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(SessionState {
                entities: BTreeMap::new(),
                selection: BTreeSet::new(),
                queue: VecDeque::new(),
                history: Vec::new(),
                next_batch: 0,
                draining: false,
                notice: None,
            })),
            service,
            export,
            config,
        }
    }

    /// Submit raw text, creating placeholders and queueing one batch
    /// task per prompt.
    ///
    /// The text is split into prompts (best-effort splitter, degrading
    /// to line splitting), four placeholder entities per prompt appear
    /// immediately, and a history record is appended per prompt.
    /// Generation itself has not started when this returns; call
    /// [`process_queue`](Self::process_queue) to drain.
    pub async fn submit(
        &self,
        raw_text: &str,
        reference_image: Option<Vec<u8>>,
    ) -> Vec<BatchId> {
        let prompts = split_prompts_or_lines(&*self.service, raw_text).await;

        let mut state = self.state.borrow_mut();
        let mut batch_ids = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let batch_id = BatchId::new(state.next_batch);
            state.next_batch += 1;

            for id in StickerId::variants(batch_id) {
                state.entities.insert(id, StickerEntity::placeholder(id));
            }
            state.queue.push_back(BatchTask {
                batch_id,
                prompt: prompt.clone(),
                reference_image: reference_image.clone(),
            });
            state.history.push(HistoryRecord {
                batch_id,
                prompt,
                reference_image: reference_image.clone(),
                entities: Vec::new(),
            });
            batch_ids.push(batch_id);
        }

        tracing::info!(batches = batch_ids.len(), "submitted");
        batch_ids
    }

    /// Toggle one candidate in or out of the selection set.
    ///
    /// Selecting an unknown id is a no-op.
    pub fn toggle_select(&self, id: StickerId) {
        let mut state = self.state.borrow_mut();
        if !state.selection.remove(&id) && state.entities.contains_key(&id) {
            state.selection.insert(id);
        }
    }

    /// Select every candidate that is neither waiting for its draft
    /// nor failed.
    pub fn select_all(&self) {
        let mut state = self.state.borrow_mut();
        state.selection = state
            .entities
            .values()
            .filter(|entity| entity.status.is_selectable())
            .map(|entity| entity.id)
            .collect();
    }

    /// Empty the selection set.
    pub fn clear_selection(&self) {
        self.state.borrow_mut().selection.clear();
    }

    /// Drop entities, selection, pending queue tasks, and the current
    /// notice.
    ///
    /// In-flight work is not cancelled: when a late result arrives,
    /// its id no longer resolves and the write is discarded. History
    /// is kept -- pruning it is a front-end concern.
    pub fn clear_session(&self) {
        let mut state = self.state.borrow_mut();
        state.entities.clear();
        state.selection.clear();
        state.queue.clear();
        state.notice = None;
        tracing::info!("session cleared");
    }

    /// Re-insert a history record's entities into the live collection.
    ///
    /// Idempotent merge by id: candidates that already exist are left
    /// untouched.
    pub fn restore_from_history(&self, record: &HistoryRecord) {
        let mut state = self.state.borrow_mut();
        for entity in &record.entities {
            state
                .entities
                .entry(entity.id)
                .or_insert_with(|| entity.clone());
        }
    }

    /// Snapshot of one candidate.
    #[must_use]
    pub fn entity(&self, id: StickerId) -> Option<StickerEntity> {
        self.state.borrow().entities.get(&id).cloned()
    }

    /// Snapshot of all candidates, in id order.
    #[must_use]
    pub fn entities(&self) -> Vec<StickerEntity> {
        self.state.borrow().entities.values().cloned().collect()
    }

    /// Currently selected ids, in id order.
    #[must_use]
    pub fn selection(&self) -> Vec<StickerId> {
        self.state.borrow().selection.iter().copied().collect()
    }

    /// Snapshot of the submission history.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.state.borrow().history.clone()
    }

    /// Number of batch tasks still waiting to start.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Whether the queue has nothing waiting and nothing in flight.
    #[must_use]
    pub fn is_queue_idle(&self) -> bool {
        let state = self.state.borrow();
        state.queue.is_empty() && !state.draining
    }

    /// Consume the pending user-visible notice, if any.
    ///
    /// Only batch-level failures produce one; finishing failures stay
    /// local to the affected candidate.
    #[must_use]
    pub fn take_notice(&self) -> Option<String> {
        self.state.borrow_mut().notice.take()
    }

    /// Apply a keyed patch against the live collection.
    ///
    /// Returns `false` -- and logs at debug -- when the id is gone
    /// (cleared session, late result) or the candidate already failed.
    /// Callers must re-read state through this after every suspension
    /// point instead of writing a snapshot captured earlier.
    pub(crate) fn patch_entity(
        &self,
        id: StickerId,
        patch: impl FnOnce(&mut StickerEntity),
    ) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(entity) = state.entities.get_mut(&id) else {
            tracing::debug!(%id, "discarding result for unknown sticker");
            return false;
        };
        if entity.status == StickerStatus::Failed {
            tracing::debug!(%id, "ignoring write to failed sticker");
            return false;
        }
        patch(entity);
        true
    }

    /// Freeze one candidate in the `Failed` state.
    pub(crate) fn fail_entity(&self, id: StickerId) {
        self.patch_entity(id, |entity| entity.status = StickerStatus::Failed);
    }
}
