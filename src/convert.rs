//! Markdown to HTML conversion behind a trait seam.
//!
//! The rest of the crate treats conversion as an external collaborator; the
//! default implementation is Comrak with a lean extension set suited to
//! inline previews.

use std::sync::Arc;

use comrak::{Arena, format_html, parse_document};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Structured errors surfaced by markdown conversion.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    #[error("markdown conversion failed: {message}")]
    Markdown { message: String },
}

/// Converts CommonMark Markdown into an HTML fragment.
///
/// Implementations must be pure and deterministic: given the same input, they
/// return identical output or errors.
pub trait MarkdownConverter: Send + Sync {
    fn to_html(&self, markdown: &str) -> Result<String, ConversionError>;
}

/// Default Comrak-based converter.
pub struct ComrakConverter {
    options: comrak::Options<'static>,
}

impl ComrakConverter {
    pub fn new() -> Self {
        Self {
            options: default_options(),
        }
    }
}

impl Default for ComrakConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter for ComrakConverter {
    fn to_html(&self, markdown: &str) -> Result<String, ConversionError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| ConversionError::Markdown {
            message: err.to_string(),
        })?;
        Ok(html)
    }
}

static SHARED_CONVERTER: Lazy<Arc<ComrakConverter>> = Lazy::new(|| Arc::new(ComrakConverter::new()));

/// Access the shared converter instance, initialised on first use.
pub fn shared_converter() -> Arc<ComrakConverter> {
    Arc::clone(&SHARED_CONVERTER)
}

fn default_options() -> comrak::Options<'static> {
    let mut options = comrak::Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;

    let render = &mut options.render;
    // The surface displays host-supplied markdown; raw HTML passes through.
    render.r#unsafe = true;

    options
}
