//! The render surface adapter.
//!
//! [`MarkdownView`] converts markdown, composes the page document, schedules
//! loads onto the presentation queue, and bridges completion, sizing, and
//! navigation signals back to the host. Conversion and composition are pure
//! synchronous work on the caller's thread; everything that touches the
//! surface is submitted to the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::convert::{ConversionError, MarkdownConverter, shared_converter};
use crate::navigation::{
    ExternalOpener, NavigationAction, NavigationDecision, NavigationDelegate, NavigationEvent,
    NavigationVerdict, PolicyResponder, SystemOpener, classify,
};
use crate::queue::PresentationQueue;
use crate::surface::{LoadToken, RenderSurface};
use crate::template::{TemplateCompositor, TemplateLoadError, TemplateSource};

/// Script evaluated after every completed load to measure rendered content.
const HEIGHT_PROBE: &str = "document.body.getBoundingClientRect().height";

/// Fired when a non-stale load completes, regardless of measurement outcome.
pub type LoadCallback = Arc<dyn Fn() + Send + Sync>;
/// Fired with the scaled content height after a successful measurement.
pub type SizeCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// View-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Scale applied to the page and to reported heights. Must be in (0, 1].
    pub page_scale: f64,
    /// Cancel link activations and hand their URLs to the external opener.
    pub open_links_externally: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_scale: 0.6,
            open_links_externally: false,
        }
    }
}

/// Errors surfaced by view construction and [`MarkdownView::update`].
#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Template(#[from] TemplateLoadError),
    #[error("page scale must be in (0, 1], got {0}")]
    InvalidScale(f64),
}

struct Callbacks {
    on_load: Option<LoadCallback>,
    on_size: Option<SizeCallback>,
}

struct Inner {
    surface: Arc<dyn RenderSurface>,
    queue: PresentationQueue,
    compositor: TemplateCompositor,
    converter: Arc<dyn MarkdownConverter>,
    opener: Arc<dyn ExternalOpener>,
    delegate: Option<Arc<dyn NavigationDelegate>>,
    page_scale: f64,
    links_armed: bool,
    /// Token of the most recently scheduled load. Completion signals
    /// carrying any other token are stale and discarded.
    latest_token: AtomicU64,
    callbacks: Mutex<Callbacks>,
}

impl Inner {
    fn callbacks(&self, op: &'static str) -> MutexGuard<'_, Callbacks> {
        match self.callbacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op, "recovered from poisoned callback lock");
                poisoned.into_inner()
            }
        }
    }

    /// One-shot measurement query against the loaded document. Failures and
    /// non-numeric results are dropped without surfacing an error.
    async fn measure(&self) {
        let on_size = self.callbacks("measure").on_size.clone();
        match self.surface.evaluate_script(HEIGHT_PROBE).await {
            Ok(value) => match value.as_f64() {
                Some(height) => {
                    let scaled = height * self.page_scale;
                    debug!(height, scaled, "content height measured");
                    if let Some(callback) = on_size {
                        callback(scaled);
                    }
                }
                None => debug!(?value, "non-numeric measurement result discarded"),
            },
            Err(error) => debug!(error = %error, "measurement query failed"),
        }
    }
}

/// Markdown-rendering web view adapter. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MarkdownView {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MarkdownView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownView").finish_non_exhaustive()
    }
}

impl MarkdownView {
    pub fn builder() -> MarkdownViewBuilder {
        MarkdownViewBuilder::new()
    }

    /// Render the given markdown and schedule it onto the surface, keeping
    /// the page style intact. Returns once the load has been scheduled, not
    /// once content is visible; completion is signaled later through the
    /// registered load callback.
    ///
    /// A supplied `on_load_complete` replaces the previously registered
    /// callback (last write wins); `None` keeps the existing registration.
    /// On error the previously displayed content remains visible.
    pub fn update(
        &self,
        markdown: &str,
        relative_base_url: Option<Url>,
        on_load_complete: Option<LoadCallback>,
    ) -> Result<(), ViewError> {
        let fragment = self.inner.converter.to_html(markdown)?;
        let document =
            self.inner
                .compositor
                .compose(&fragment, self.inner.page_scale, relative_base_url.as_ref());

        if let Some(callback) = on_load_complete {
            self.inner.callbacks("update").on_load = Some(callback);
        }

        let token = self.inner.latest_token.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(token, "markdown load scheduled");

        let inner = Arc::clone(&self.inner);
        self.inner.queue.submit(async move {
            inner.surface.load_html(document, token).await;
        });
        Ok(())
    }

    /// Register or replace the size listener.
    pub fn set_on_size_changed<F>(&self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.inner.callbacks("set_on_size_changed").on_size = Some(Arc::new(callback));
    }

    /// Surface glue: the load identified by `token` finished successfully.
    ///
    /// Stale tokens, superseded by a later [`update`](Self::update), are
    /// discarded: neither the load callback nor a size measurement fires for
    /// them. For the latest token the load callback fires unconditionally,
    /// then the one-shot measurement query runs.
    pub fn load_finished(&self, token: LoadToken) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.submit(async move {
            let latest = inner.latest_token.load(Ordering::SeqCst);
            if token != latest {
                debug!(token, latest, "stale load completion discarded");
                return;
            }

            let on_load = inner.callbacks("load_finished").on_load.clone();
            if let Some(callback) = on_load {
                callback();
            }

            inner.measure().await;
        });
    }

    /// Surface glue: synchronous policy decision for a navigation attempt.
    ///
    /// In link-policy mode an armed link activation is cancelled and its URL
    /// handed to the external opener. With a delegate configured the filter
    /// is notify-only: the delegate hears about every decision but the
    /// verdict is always `Allow`, even when the delegate asked to cancel.
    pub fn decide_navigation(&self, action: &NavigationAction) -> NavigationVerdict {
        match classify(action, self.inner.links_armed, self.inner.delegate.is_some()) {
            NavigationDecision::Allow => NavigationVerdict::Allow,
            NavigationDecision::CancelAndOpenExternally => {
                debug!(url = %action.url, "link activation cancelled; opening externally");
                self.inner.opener.open(&action.url);
                NavigationVerdict::Cancel
            }
            NavigationDecision::DelegateToHost => {
                let responder = PolicyResponder::new();
                if let Some(delegate) = &self.inner.delegate {
                    delegate.decide_policy(action, responder.clone());
                }
                if responder.answer() == Some(NavigationVerdict::Cancel) {
                    debug!(url = %action.url, "delegate cancellation ignored; allowing navigation");
                }
                NavigationVerdict::Allow
            }
        }
    }

    /// Surface glue: forward a navigation lifecycle event.
    ///
    /// `Decision` events are answered through their responder with the
    /// filter's verdict; everything else is passed to the delegate
    /// unmodified, when one is configured.
    pub fn navigation_event(&self, event: NavigationEvent) {
        match event {
            NavigationEvent::Decision { action, responder } => {
                responder.respond(self.decide_navigation(&action));
            }
            NavigationEvent::Started => {
                if let Some(delegate) = &self.inner.delegate {
                    delegate.did_start();
                }
            }
            NavigationEvent::Redirect => {
                if let Some(delegate) = &self.inner.delegate {
                    delegate.did_redirect();
                }
            }
            NavigationEvent::Commit => {
                if let Some(delegate) = &self.inner.delegate {
                    delegate.did_commit();
                }
            }
            NavigationEvent::Fail { error } => {
                debug!(error = %error, provisional = error.provisional, "navigation failed");
                if let Some(delegate) = &self.inner.delegate {
                    delegate.did_fail(&error);
                }
            }
            NavigationEvent::AuthChallenge {
                challenge,
                responder,
            } => {
                if let Some(delegate) = &self.inner.delegate {
                    delegate.auth_challenge(&challenge, responder);
                }
            }
            NavigationEvent::ProcessTerminated => {
                if let Some(delegate) = &self.inner.delegate {
                    delegate.process_terminated();
                }
            }
        }
    }

    pub fn page_scale(&self) -> f64 {
        self.inner.page_scale
    }

    /// Base URL of the loaded page template.
    pub fn base_url(&self) -> &Url {
        self.inner.compositor.base_url()
    }
}

/// Builder for [`MarkdownView`].
pub struct MarkdownViewBuilder {
    config: ViewConfig,
    template_source: TemplateSource,
    initial_markdown: Option<String>,
    converter: Option<Arc<dyn MarkdownConverter>>,
    opener: Option<Arc<dyn ExternalOpener>>,
    delegate: Option<Arc<dyn NavigationDelegate>>,
    on_load: Option<LoadCallback>,
    on_size: Option<SizeCallback>,
}

impl Default for MarkdownViewBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownViewBuilder {
    pub fn new() -> Self {
        Self {
            config: ViewConfig::default(),
            template_source: TemplateSource::default(),
            initial_markdown: None,
            converter: None,
            opener: None,
            delegate: None,
            on_load: None,
            on_size: None,
        }
    }

    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_scale(mut self, scale: f64) -> Self {
        self.config.page_scale = scale;
        self
    }

    pub fn open_links_externally(mut self, open: bool) -> Self {
        self.config.open_links_externally = open;
        self
    }

    pub fn template_source(mut self, source: TemplateSource) -> Self {
        self.template_source = source;
        self
    }

    /// Markdown rendered immediately at construction. Empty input skips the
    /// initial load entirely.
    pub fn initial_markdown(mut self, markdown: impl Into<String>) -> Self {
        self.initial_markdown = Some(markdown.into());
        self
    }

    pub fn converter(mut self, converter: Arc<dyn MarkdownConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn external_opener(mut self, opener: Arc<dyn ExternalOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Switch the navigation filter into notify-only delegating mode.
    pub fn navigation_delegate(mut self, delegate: Arc<dyn NavigationDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Callback fired on every completed (non-stale) load. Registering one
    /// here also arms the link filter, mirroring the legacy dual-purpose
    /// configuration.
    pub fn on_load_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_load = Some(Arc::new(callback));
        self
    }

    pub fn on_size_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_size = Some(Arc::new(callback));
        self
    }

    /// Two-phase construction: the template is loaded and validated here,
    /// and any initial markdown is converted and scheduled before the view
    /// is handed back.
    pub fn build(
        self,
        surface: Arc<dyn RenderSurface>,
        queue: PresentationQueue,
    ) -> Result<MarkdownView, ViewError> {
        if !(self.config.page_scale > 0.0 && self.config.page_scale <= 1.0) {
            return Err(ViewError::InvalidScale(self.config.page_scale));
        }

        let compositor = TemplateCompositor::new(&self.template_source)?;
        let links_armed = self.config.open_links_externally || self.on_load.is_some();

        let view = MarkdownView {
            inner: Arc::new(Inner {
                surface,
                queue,
                compositor,
                converter: self.converter.unwrap_or_else(|| shared_converter()),
                opener: self.opener.unwrap_or_else(|| Arc::new(SystemOpener)),
                delegate: self.delegate,
                page_scale: self.config.page_scale,
                links_armed,
                latest_token: AtomicU64::new(0),
                callbacks: Mutex::new(Callbacks {
                    on_load: self.on_load,
                    on_size: self.on_size,
                }),
            }),
        };

        if let Some(markdown) = self.initial_markdown {
            if !markdown.is_empty() {
                view.update(&markdown, None, None)?;
            }
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::presentation_queue;
    use crate::surface::ScriptError;
    use crate::template::ComposedDocument;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NullSurface;

    #[async_trait]
    impl RenderSurface for NullSurface {
        async fn load_html(&self, _document: ComposedDocument, _token: LoadToken) {}

        async fn evaluate_script(&self, _script: &str) -> Result<Value, ScriptError> {
            Err(ScriptError::Evaluation {
                message: "no document".to_string(),
            })
        }
    }

    #[test]
    fn zero_scale_is_rejected() {
        let (queue, _driver) = presentation_queue();
        let err = MarkdownView::builder()
            .page_scale(0.0)
            .build(Arc::new(NullSurface), queue)
            .unwrap_err();

        assert!(matches!(err, ViewError::InvalidScale(_)));
    }

    #[test]
    fn scale_above_one_is_rejected() {
        let (queue, _driver) = presentation_queue();
        let err = MarkdownView::builder()
            .page_scale(1.5)
            .build(Arc::new(NullSurface), queue)
            .unwrap_err();

        assert!(matches!(err, ViewError::InvalidScale(_)));
    }

    #[test]
    fn default_config_matches_source_defaults() {
        let config = ViewConfig::default();

        assert_eq!(config.page_scale, 0.6);
        assert!(!config.open_links_externally);
    }

    #[test]
    fn missing_template_fails_construction() {
        let (queue, _driver) = presentation_queue();
        let err = MarkdownView::builder()
            .template_source(TemplateSource::File("/nonexistent/template.html".into()))
            .build(Arc::new(NullSurface), queue)
            .unwrap_err();

        assert!(matches!(err, ViewError::Template(_)));
    }
}
