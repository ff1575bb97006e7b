//! Embeddable CommonMark preview surface.
//!
//! `vetrina` renders a Markdown string into a styled HTML document through a
//! placeholder template, loads it into a host-provided web rendering
//! surface, and bridges the asynchronous signals the host cares about back
//! out of the page:
//!
//! - the rendered content's pixel height, for auto-sizing layouts,
//! - interception of outbound link navigation (open externally, or notify a
//!   host delegate), and
//! - a load-completion callback.
//!
//! The host implements [`RenderSurface`] over its embedded web view, drives
//! a [`PresentationDriver`] on the thread that owns the surface, and builds
//! a [`MarkdownView`] on top. All surface interaction is marshaled through
//! the presentation queue; `update` may be called from any thread and
//! returns once the load has been scheduled. Loads superseded before
//! completion are suppressed by a monotonic token, so a stale load can never
//! report a stale height or fire a stale callback.

pub mod convert;
pub mod navigation;
pub mod queue;
pub mod surface;
pub mod template;
pub mod view;

pub use convert::{ComrakConverter, ConversionError, MarkdownConverter, shared_converter};
pub use navigation::{
    AuthChallenge, AuthDisposition, AuthResponder, ExternalOpener, NavigationAction,
    NavigationDecision, NavigationDelegate, NavigationError, NavigationEvent, NavigationKind,
    NavigationVerdict, PolicyResponder, SystemOpener,
};
pub use queue::{PresentationDriver, PresentationQueue, presentation_queue};
pub use surface::{LoadToken, RenderSurface, ScriptError};
pub use template::{
    CONTENT_TOKEN, ComposedDocument, SCALE_TOKEN, Template, TemplateCompositor, TemplateLoadError,
    TemplateSource,
};
pub use view::{
    LoadCallback, MarkdownView, MarkdownViewBuilder, SizeCallback, ViewConfig, ViewError,
};
