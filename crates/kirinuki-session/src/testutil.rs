//! Scripted service and export doubles for the session tests.
//!
//! The scripted service answers every call from in-memory fixtures,
//! records call order, and yields once per image request so tests can
//! interleave other work at the real suspension points.

#![allow(clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use async_trait::async_trait;
use kirinuki_export::{ExportError, ExportSink};
use kirinuki_matte::{RgbaImage, encode_png};
use kirinuki_service::{DRAFT_VARIANTS, GenerationService, ServiceError};

use crate::finish::FinishConfig;
use crate::session::Session;

pub(crate) struct ScriptedService {
    calls: RefCell<Vec<String>>,
    split_result: RefCell<Option<Vec<String>>>,
    failing_prompts: RefCell<HashSet<String>>,
    failing_upscales: RefCell<Vec<Vec<u8>>>,
    shrunken_masks: RefCell<Vec<Vec<u8>>>,
    elevated_fails: Cell<bool>,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            split_result: RefCell::new(None),
            failing_prompts: RefCell::new(HashSet::new()),
            failing_upscales: RefCell::new(Vec::new()),
            shrunken_masks: RefCell::new(Vec::new()),
            elevated_fails: Cell::new(false),
        }
    }

    /// Everything the service has been asked so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn regenerate_calls(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("regenerate"))
            .count()
    }

    /// Make the splitter answer with these prompts.
    pub(crate) fn set_split(&self, prompts: Vec<String>) {
        *self.split_result.borrow_mut() = Some(prompts);
    }

    /// Make the splitter fail, forcing callers onto line splitting.
    pub(crate) fn set_split_failure(&self) {
        *self.split_result.borrow_mut() = None;
    }

    /// Make draft generation fail for this prompt.
    pub(crate) fn fail_drafts_for(&self, prompt: &str) {
        self.failing_prompts.borrow_mut().insert(prompt.to_owned());
    }

    /// Make the upscale re-render of this exact draft fail.
    pub(crate) fn fail_upscale_of(&self, draft: Vec<u8>) {
        self.failing_upscales.borrow_mut().push(draft);
    }

    /// Answer the mask request for this exact draft with a
    /// wrong-sized image.
    pub(crate) fn shrink_mask_of(&self, draft: Vec<u8>) {
        self.shrunken_masks.borrow_mut().push(draft);
    }

    pub(crate) fn fail_elevated(&self) {
        self.elevated_fails.set(true);
    }

    /// The deterministic draft image for one variant index: white
    /// 4x4 with the index embedded in the corner pixel.
    pub(crate) fn draft_png(&self, variant: u8) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(4, 4, image::Rgba([255, 255, 255, 255]));
        img.put_pixel(0, 0, image::Rgba([255, 255, 200 + variant, 255]));
        encode_png(&img).unwrap()
    }

    fn log(&self, entry: impl Into<String>) {
        self.calls.borrow_mut().push(entry.into());
    }

    fn black_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255]));
        encode_png(&img).unwrap()
    }
}

#[async_trait(?Send)]
impl GenerationService for ScriptedService {
    async fn split_prompts(&self, _raw: &str) -> Result<Vec<String>, ServiceError> {
        self.log("split");
        self.split_result
            .borrow()
            .clone()
            .ok_or_else(|| ServiceError::ServiceUnavailable("scripted splitter outage".into()))
    }

    async fn generate_drafts(
        &self,
        prompt: &str,
        _reference: Option<&[u8]>,
    ) -> Result<[Vec<u8>; DRAFT_VARIANTS], ServiceError> {
        self.log(format!("drafts-start:{prompt}"));
        tokio::task::yield_now().await;

        if self.failing_prompts.borrow().contains(prompt) {
            self.log(format!("drafts-fail:{prompt}"));
            return Err(ServiceError::GenerationFailure(
                "scripted draft failure".into(),
            ));
        }

        self.log(format!("drafts-end:{prompt}"));
        Ok([
            self.draft_png(0),
            self.draft_png(1),
            self.draft_png(2),
            self.draft_png(3),
        ])
    }

    async fn regenerate(
        &self,
        image: &[u8],
        instruction: &str,
        _target_size: u32,
    ) -> Result<Vec<u8>, ServiceError> {
        let wants_mask = instruction.contains("black");
        self.log(if wants_mask {
            "regenerate-mask"
        } else {
            "regenerate-upscale"
        });
        tokio::task::yield_now().await;

        if !wants_mask {
            if self.failing_upscales.borrow().iter().any(|d| d == image) {
                return Err(ServiceError::GenerationFailure(
                    "scripted upscale failure".into(),
                ));
            }
            // Identity upscale: same pixels, "higher fidelity".
            return Ok(image.to_vec());
        }

        if self.shrunken_masks.borrow().iter().any(|d| d == image) {
            return Ok(Self::black_png(2, 2));
        }
        let source = kirinuki_matte::decode_rgba(image)
            .map_err(|e| ServiceError::GenerationFailure(e.to_string()))?;
        Ok(Self::black_png(source.width(), source.height()))
    }

    async fn ensure_elevated_access(&self) -> Result<(), ServiceError> {
        self.log("elevated");
        if self.elevated_fails.get() {
            return Err(ServiceError::ServiceUnavailable(
                "scripted elevated outage".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) struct RecordingExport {
    saved: RefCell<Vec<(String, usize)>>,
    fail: Cell<bool>,
}

impl RecordingExport {
    pub(crate) fn new() -> Self {
        Self {
            saved: RefCell::new(Vec::new()),
            fail: Cell::new(false),
        }
    }

    /// `(filename, byte count)` of every save, in order.
    pub(crate) fn saved(&self) -> Vec<(String, usize)> {
        self.saved.borrow().clone()
    }

    pub(crate) fn fail_saves(&self) {
        self.fail.set(true);
    }
}

#[async_trait(?Send)]
impl ExportSink for RecordingExport {
    async fn save(&self, image: &[u8], filename: &str) -> Result<(), ExportError> {
        if self.fail.get() {
            return Err(ExportError::Io {
                filename: filename.to_owned(),
                source: std::io::Error::other("scripted export failure"),
            });
        }
        self.saved
            .borrow_mut()
            .push((filename.to_owned(), image.len()));
        Ok(())
    }
}

/// A session wired to scripted doubles with the default config.
pub(crate) fn scripted_session() -> (Session, Rc<ScriptedService>, Rc<RecordingExport>) {
    scripted_session_with(FinishConfig::default())
}

/// A session wired to scripted doubles with a custom config.
pub(crate) fn scripted_session_with(
    config: FinishConfig,
) -> (Session, Rc<ScriptedService>, Rc<RecordingExport>) {
    let service = Rc::new(ScriptedService::new());
    let export = Rc::new(RecordingExport::new());
    let session = Session::new(service.clone(), export.clone(), config);
    (session, service, export)
}
