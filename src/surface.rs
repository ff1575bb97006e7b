//! The rendering-surface seam.
//!
//! Hosts implement [`RenderSurface`] over whatever embedded web view they
//! own. The adapter only ever talks to the surface from the presentation
//! queue it was constructed with, so implementations can rely on calls
//! arriving one at a time, in order.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::template::ComposedDocument;

/// Monotonic identity of a scheduled load.
///
/// Later loads get larger tokens; completion signals are matched against the
/// latest issued token so superseded loads cannot report stale results.
pub type LoadToken = u64;

/// Script evaluation failures reported by the rendering surface.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("script evaluation failed: {message}")]
    Evaluation { message: String },
}

/// The embedded web-content display object.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Start loading a document, replacing any displayed content. The last
    /// call wins; an earlier in-flight load is superseded. When the load
    /// completes, the surface glue reports it back through
    /// [`MarkdownView::load_finished`](crate::MarkdownView::load_finished)
    /// with the same token.
    async fn load_html(&self, document: ComposedDocument, token: LoadToken);

    /// Evaluate JavaScript against the loaded document and return its result
    /// as a JSON value.
    async fn evaluate_script(&self, script: &str) -> Result<Value, ScriptError>;
}
