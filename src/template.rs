//! Page template loading and composition.
//!
//! A single packaged HTML page carries two placeholder tokens. Composition is
//! literal global text replacement: every occurrence of each token is
//! substituted, preserving the lenient semantics of the original page
//! template, which repeats the scale token.

use std::fs;
use std::io;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Placeholder replaced with the converted markdown fragment.
pub const CONTENT_TOKEN: &str = "DOWN_HTML";
/// Placeholder replaced with the decimal string form of the page scale.
pub const SCALE_TOKEN: &str = "webPageScale";

const EMBEDDED_TEMPLATE: &str = include_str!("../assets/template.html");

static EMBEDDED_BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("about:blank").expect("static base url literal must parse"));

/// Where the page template comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemplateSource {
    /// The compiled-in default page.
    #[default]
    Embedded,
    /// A template file resolved at runtime, e.g. from an application bundle.
    File(PathBuf),
}

/// Errors raised while loading the page template. These indicate a packaging
/// defect rather than a runtime input problem and are not retryable: every
/// subsequent render would fail identically.
#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("template resource unreadable: {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("template path cannot form a base URL: {path}")]
    InvalidBase { path: PathBuf },
    #[error("template is missing required placeholder `{token}`")]
    MissingPlaceholder { token: &'static str },
}

/// A fully rendered HTML document ready for the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    pub html: String,
    /// Relative resource references inside the template resolve against this.
    pub base_url: Url,
}

/// Validated page template, loaded once per compositor and cached for its
/// lifetime.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    base_url: Url,
}

impl Template {
    /// Load and validate a template. Both placeholder tokens must appear at
    /// least once; multiple occurrences are allowed.
    pub fn load(source: &TemplateSource) -> Result<Self, TemplateLoadError> {
        let (raw, base_url) = match source {
            TemplateSource::Embedded => {
                (EMBEDDED_TEMPLATE.to_string(), EMBEDDED_BASE_URL.clone())
            }
            TemplateSource::File(path) => {
                let raw =
                    fs::read_to_string(path).map_err(|source| TemplateLoadError::Unreadable {
                        path: path.clone(),
                        source,
                    })?;
                let base_url = Url::from_file_path(path)
                    .map_err(|_| TemplateLoadError::InvalidBase { path: path.clone() })?;
                (raw, base_url)
            }
        };

        for token in [CONTENT_TOKEN, SCALE_TOKEN] {
            if !raw.contains(token) {
                return Err(TemplateLoadError::MissingPlaceholder { token });
            }
        }

        Ok(Self { raw, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Composes full HTML documents out of converted fragments.
pub struct TemplateCompositor {
    template: Template,
}

impl TemplateCompositor {
    /// Two-phase construction: the template is loaded and validated up front
    /// so a broken resource surfaces here instead of on every render.
    pub fn new(source: &TemplateSource) -> Result<Self, TemplateLoadError> {
        Ok(Self {
            template: Template::load(source)?,
        })
    }

    /// Substitute the content token with `fragment_html` and the scale token
    /// with the decimal string form of `scale`. Content is substituted first,
    /// matching the original replacement order.
    ///
    /// `relative_base_url` is a reserved hook for rewriting relative links in
    /// the fragment to absolute URLs; it is currently accepted and ignored.
    pub fn compose(
        &self,
        fragment_html: &str,
        scale: f64,
        relative_base_url: Option<&Url>,
    ) -> ComposedDocument {
        if let Some(base) = relative_base_url {
            debug!(base = %base, "relative base URL supplied; link rewriting not implemented");
        }

        let html = self
            .template
            .raw
            .replace(CONTENT_TOKEN, fragment_html)
            .replace(SCALE_TOKEN, &format!("{scale}"));

        ComposedDocument {
            html,
            base_url: self.template.base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &Url {
        self.template.base_url()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn embedded_compositor() -> TemplateCompositor {
        TemplateCompositor::new(&TemplateSource::Embedded).unwrap()
    }

    #[test]
    fn substitution_is_total() {
        let compositor = embedded_compositor();
        let document = compositor.compose("<h1>Hi</h1>", 0.6, None);

        assert!(document.html.contains("<h1>Hi</h1>"));
        assert!(!document.html.contains(CONTENT_TOKEN));
        assert!(!document.html.contains(SCALE_TOKEN));
    }

    #[test]
    fn scale_renders_as_decimal_string() {
        let compositor = embedded_compositor();
        let document = compositor.compose("<p>x</p>", 0.6, None);

        assert!(document.html.contains("initial-scale=0.6"));
    }

    #[test]
    fn composition_is_idempotent() {
        let compositor = embedded_compositor();
        let first = compositor.compose("<p>same</p>", 0.75, None);
        let second = compositor.compose("<p>same</p>", 0.75, None);

        assert_eq!(first, second);
    }

    #[test]
    fn repeated_tokens_are_all_replaced() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "<body scale=webPageScale>DOWN_HTML</body><footer>DOWN_HTML webPageScale</footer>"
        )
        .unwrap();

        let source = TemplateSource::File(file.path().to_path_buf());
        let compositor = TemplateCompositor::new(&source).unwrap();
        let document = compositor.compose("<p>twice</p>", 0.5, None);

        assert_eq!(document.html.matches("<p>twice</p>").count(), 2);
        assert!(!document.html.contains(CONTENT_TOKEN));
        assert!(!document.html.contains(SCALE_TOKEN));
    }

    #[test]
    fn relative_base_url_is_a_no_op() {
        let compositor = embedded_compositor();
        let base = Url::parse("https://example.com/docs/").unwrap();

        let with_base = compositor.compose("<a href=\"a.md\">a</a>", 0.6, Some(&base));
        let without_base = compositor.compose("<a href=\"a.md\">a</a>", 0.6, None);

        assert_eq!(with_base, without_base);
    }

    #[test]
    fn missing_content_token_fails_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<body scale=webPageScale>no content slot</body>").unwrap();

        let source = TemplateSource::File(file.path().to_path_buf());
        let err = Template::load(&source).unwrap_err();

        assert!(matches!(
            err,
            TemplateLoadError::MissingPlaceholder {
                token: CONTENT_TOKEN
            }
        ));
    }

    #[test]
    fn unreadable_file_fails_load() {
        let source = TemplateSource::File(PathBuf::from("/nonexistent/vetrina-template.html"));
        let err = Template::load(&source).unwrap_err();

        assert!(matches!(err, TemplateLoadError::Unreadable { .. }));
    }

    #[test]
    fn file_template_carries_file_base_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "DOWN_HTML webPageScale").unwrap();

        let source = TemplateSource::File(file.path().to_path_buf());
        let template = Template::load(&source).unwrap();

        assert_eq!(template.base_url().scheme(), "file");
    }
}
