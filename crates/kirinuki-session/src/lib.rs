//! kirinuki-session: prompt in, finished stickers out.
//!
//! Owns the live sticker collection and drives the two orchestration
//! layers around it:
//!
//! - the **batch queue** expands each prompt into four flat-background
//!   drafts, strictly one batch request in flight at a time
//! - the **finishing pipeline** takes a selected draft through
//!   upscale -> contrasting-background twin -> difference matting,
//!   concurrently across candidates
//!
//! Everything runs on a single logical thread of control (`Rc` +
//! `RefCell`, `?Send` futures); service calls are the only suspension
//! points. See [`Session`] for the operations the surrounding front
//! end calls.

pub mod entity;
pub mod finish;
pub mod history;
pub mod queue;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use entity::{BatchId, StickerEntity, StickerId, StickerStatus};
pub use finish::FinishConfig;
pub use history::HistoryRecord;
pub use queue::BatchTask;
pub use session::Session;
