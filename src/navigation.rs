//! Navigation policy and host-delegate fan-out.
//!
//! Every navigation attempt is classified into one of three outcomes: let
//! the surface proceed, cancel and hand the URL to the external opener, or
//! notify a host delegate. The wide per-callback protocol of embedded web
//! views is folded into one tagged [`NavigationEvent`] type with a matching
//! per-variant listener trait.

use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Cause of a navigation attempt, as reported by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// A user activated a link in the rendered content.
    LinkActivated,
    FormSubmitted,
    BackForward,
    Reload,
    FormResubmitted,
    /// Programmatic loads, including the view's own document loads.
    Other,
}

/// One navigation attempt awaiting a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationAction {
    pub url: Url,
    pub kind: NavigationKind,
}

/// Classification of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    CancelAndOpenExternally,
    DelegateToHost,
}

/// What the rendering surface is ultimately told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationVerdict {
    Allow,
    Cancel,
}

/// Load-failed signal forwarded from the rendering surface. Informational;
/// the view attempts no recovery.
#[derive(Debug, Clone, Error)]
#[error("navigation failed: {message}")]
pub struct NavigationError {
    pub message: String,
    /// True when the failure happened before any content was committed.
    pub provisional: bool,
}

/// Authentication challenge passed through from the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub host: String,
    pub realm: Option<String>,
}

/// How an authentication challenge should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthDisposition {
    #[default]
    PerformDefaultHandling,
    Cancel,
}

/// One-shot answer slot for an authentication challenge. Unanswered
/// challenges fall back to platform default handling.
#[derive(Debug, Clone, Default)]
pub struct AuthResponder {
    answer: Arc<OnceLock<AuthDisposition>>,
}

impl AuthResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the disposition. Later calls are ignored.
    pub fn respond(&self, disposition: AuthDisposition) {
        let _ = self.answer.set(disposition);
    }

    pub fn disposition(&self) -> AuthDisposition {
        self.answer.get().copied().unwrap_or_default()
    }
}

/// One-shot answer slot for a policy decision request.
///
/// The delegate receives one of these for every decision, but the filter
/// resolves `Allow` regardless of the recorded answer: the slot exists so
/// the host is notified of decisions, not so it can block them.
#[derive(Debug, Clone, Default)]
pub struct PolicyResponder {
    answer: Arc<OnceLock<NavigationVerdict>>,
}

impl PolicyResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict. Later calls are ignored.
    pub fn respond(&self, verdict: NavigationVerdict) {
        let _ = self.answer.set(verdict);
    }

    pub fn answer(&self) -> Option<NavigationVerdict> {
        self.answer.get().copied()
    }
}

/// Navigation lifecycle, folded into one tagged type.
#[derive(Debug, Clone)]
pub enum NavigationEvent {
    /// The surface asks whether a navigation attempt may proceed. The
    /// responder is answered with the filter's verdict.
    Decision {
        action: NavigationAction,
        responder: PolicyResponder,
    },
    Started,
    Redirect,
    Commit,
    Fail { error: NavigationError },
    AuthChallenge {
        challenge: AuthChallenge,
        responder: AuthResponder,
    },
    ProcessTerminated,
}

/// Host-side observer of the navigation lifecycle, one method per
/// [`NavigationEvent`] variant. All methods default to no-ops so hosts only
/// implement what they care about.
pub trait NavigationDelegate: Send + Sync {
    fn decide_policy(&self, action: &NavigationAction, responder: PolicyResponder) {
        let _ = (action, responder);
    }
    fn did_start(&self) {}
    fn did_redirect(&self) {}
    fn did_commit(&self) {}
    fn did_fail(&self, error: &NavigationError) {
        let _ = error;
    }
    fn auth_challenge(&self, challenge: &AuthChallenge, responder: AuthResponder) {
        let _ = (challenge, responder);
    }
    fn process_terminated(&self) {}
}

/// Opens a URL outside the rendering surface.
pub trait ExternalOpener: Send + Sync {
    fn open(&self, url: &Url);
}

/// Default opener backed by the platform browser launcher.
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    fn open(&self, url: &Url) {
        if let Err(error) = webbrowser::open(url.as_str()) {
            warn!(url = %url, error = %error, "failed to open URL externally");
        }
    }
}

/// Classify a navigation attempt.
///
/// `links_armed` reflects the legacy dual-purpose configuration: link
/// activations leave the view when external opening was requested explicitly
/// or a load callback was registered at construction. A configured delegate
/// takes precedence and switches the filter into notify-only mode.
pub(crate) fn classify(
    action: &NavigationAction,
    links_armed: bool,
    delegating: bool,
) -> NavigationDecision {
    if delegating {
        return NavigationDecision::DelegateToHost;
    }
    match action.kind {
        NavigationKind::LinkActivated if links_armed => NavigationDecision::CancelAndOpenExternally,
        _ => NavigationDecision::Allow,
    }
}
