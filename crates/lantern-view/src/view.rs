use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lantern_protocol::message::methods;
use lantern_protocol::{InboundFrame, ProtocolSession, SessionEvent};
use lantern_render::{UiTree, render};
use serde_json::Value;

use crate::bootstrap::{Incoming, ingest};
use crate::config::ViewConfig;
use crate::error::ViewError;
use crate::mutation::Interaction;
use crate::surface::{Status, StatusLevel, Surface};

/// Delay before measuring, so layout has settled for one frame.
pub const FRAME_DELAY: Duration = Duration::from_millis(16);

/// Startup inputs that do not come over the channel.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    /// Payload injected before startup.
    pub preloaded: Option<Value>,
}

/// One embedded view instance.
///
/// Cheap to clone; clones share the session, the surface and the gesture
/// state. Tool-call continuations run on spawned tasks holding a clone.
pub struct View<S> {
    pub(crate) session: Arc<ProtocolSession>,
    pub(crate) surface: Arc<Mutex<S>>,
    pub(crate) interaction: Arc<Mutex<Interaction>>,
    pub(crate) config: Arc<ViewConfig>,
    status_ids: Arc<AtomicU64>,
}

impl<S> Clone for View<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            surface: self.surface.clone(),
            interaction: self.interaction.clone(),
            config: self.config.clone(),
            status_ids: self.status_ids.clone(),
        }
    }
}

/// Lock a mutex, recovering the data if a panicking task poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: Surface + 'static> View<S> {
    pub fn new(session: Arc<ProtocolSession>, surface: S, config: ViewConfig) -> Self {
        Self {
            session,
            surface: Arc::new(Mutex::new(surface)),
            interaction: Arc::new(Mutex::new(Interaction::Idle)),
            config: Arc::new(config),
            status_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn session(&self) -> &Arc<ProtocolSession> {
        &self.session
    }

    /// Run `f` against the surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock(&self.surface))
    }

    /// Show the loading state, ingest a pre-injected payload and start the
    /// handshake when a parent is present.
    pub fn start(&self, bootstrap: Bootstrap) -> Result<(), ViewError> {
        lock(&self.surface).show_loading();

        if let Some(preloaded) = &bootstrap.preloaded {
            match ingest(&Incoming::Preloaded(preloaded)) {
                Some((shape, tree)) => {
                    tracing::info!(?shape, root = %tree.root, "Using pre-injected payload");
                    self.render_tree(&tree);
                }
                None => tracing::warn!("Pre-injected payload does not contain a UI tree"),
            }
        }

        self.session.start()?;
        Ok(())
    }

    /// Process one posted message.
    pub async fn handle_frame(&self, frame: &InboundFrame) {
        let Some(event) = self.session.handle_frame(frame).await else {
            return;
        };

        match event {
            SessionEvent::Initialized => tracing::info!("View initialized"),
            SessionEvent::Teardown => tracing::info!("View torn down by host"),
            SessionEvent::Notification { method, params } => {
                self.handle_notification(&method, &params)
            }
            SessionEvent::Legacy(data) => match ingest(&Incoming::Legacy(&data)) {
                Some((shape, tree)) => {
                    tracing::info!(?shape, root = %tree.root, "Tree received via legacy message");
                    self.render_tree(&tree);
                }
                None => tracing::debug!("Ignoring unrecognized legacy message"),
            },
        }
    }

    fn handle_notification(&self, method: &str, params: &Value) {
        match method {
            methods::TOOL_RESULT => match ingest(&Incoming::Notification { method, params }) {
                Some((shape, tree)) => {
                    tracing::info!(?shape, root = %tree.root, "Tree received via tool result");
                    self.render_tree(&tree);
                }
                None => tracing::warn!("Tool result does not contain a UI tree"),
            },
            methods::TOOL_INPUT | methods::TOOL_INPUT_PARTIAL => {
                tracing::debug!(method, "Tool input received, still loading");
            }
            methods::TOOL_CANCELLED => {
                let reason = params
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("The tool call was cancelled before it produced a result.");
                tracing::warn!(reason, "Tool cancelled");
                lock(&self.surface).show_error("Tool cancelled", reason);
            }
            methods::HOST_CONTEXT_CHANGED => {
                tracing::debug!(context = %params, "Host context changed");
            }
            other => tracing::debug!(method = other, "Ignoring unknown notification"),
        }
    }

    /// Render a tree into the surface.
    ///
    /// A missing root replaces the whole view with an error panel and skips
    /// the size report.
    pub fn render_tree(&self, tree: &UiTree) {
        match render(tree) {
            Ok(rendered) => {
                if !rendered.diagnostics.is_empty() {
                    tracing::warn!(
                        diagnostics = ?rendered.diagnostics,
                        "Tree rendered with localized errors"
                    );
                }
                lock(&self.surface).mount(&rendered);
                // A new tree invalidates any in-flight gesture tracking.
                *lock(&self.interaction) = Interaction::Idle;
                self.schedule_size_report();
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot render tree");
                lock(&self.surface).show_error("Unable to display this view", &e.to_string());
            }
        }
    }

    /// Measure one frame after a render and report the clamped size.
    fn schedule_size_report(&self) {
        let view = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(FRAME_DELAY).await;
            let size = lock(&view.surface).measure();
            let height = size.height.min(view.config.max_height);
            if let Err(e) = view.session.notify_size(size.width, height) {
                tracing::warn!(error = %e, "Failed to report size");
            }
        });
    }

    /// Show a transient status that dismisses itself.
    pub fn show_status(&self, level: StatusLevel, text: impl Into<String>) -> u64 {
        let status = Status {
            id: self.status_ids.fetch_add(1, Ordering::Relaxed),
            level,
            text: text.into(),
        };
        tracing::debug!(id = status.id, ?level, text = %status.text, "Showing status");
        lock(&self.surface).show_status(&status);

        let id = status.id;
        let surface = self.surface.clone();
        let dismiss_after = self.config.status_dismiss();
        tokio::spawn(async move {
            tokio::time::sleep(dismiss_after).await;
            lock(&surface).dismiss_status(id);
        });
        id
    }
}
