//! Plain data handed to JavaScript

use serde::Serialize;
use stamp_core::{Notice, NoticeKind, Overlay, RenderOutcome};

/// A notice as the page shows it: `kind` is `"error"` or `"success"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeView {
    pub kind: &'static str,
    pub message: String,
    pub ttl_ms: u64,
}

impl From<&Notice> for NoticeView {
    fn from(notice: &Notice) -> Self {
        Self {
            kind: match notice.kind {
                NoticeKind::Error => "error",
                NoticeKind::Success => "success",
            },
            message: notice.message.clone(),
            ttl_ms: notice.ttl.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub superseded: bool,
    pub page: u32,
    pub page_count: u32,
    pub zoom_label: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl PageView {
    pub fn from_outcome(outcome: &RenderOutcome, zoom_label: String) -> Self {
        match outcome {
            RenderOutcome::Applied(view) => Self {
                superseded: false,
                page: view.page,
                page_count: view.page_count,
                zoom_label,
                canvas_width: view.canvas_width,
                canvas_height: view.canvas_height,
            },
            RenderOutcome::Superseded => Self {
                superseded: true,
                page: 0,
                page_count: 0,
                zoom_label,
                canvas_width: 0,
                canvas_height: 0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    pub visible: bool,
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub font_size: f64,
}

impl From<Overlay> for OverlayView {
    fn from(overlay: Overlay) -> Self {
        Self {
            visible: overlay.visible,
            text: overlay.text,
            left: overlay.left,
            top: overlay.top,
            font_size: overlay.font_size,
        }
    }
}
