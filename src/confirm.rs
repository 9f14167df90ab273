//! Await-able confirmation dialogs.
//!
//! Any part of the application can ask "are you sure?" through one shared
//! [`ConfirmationService`] and `.await` the answer. Exactly one dialog is shown at
//! a time; requests made while a dialog is open wait in FIFO order and are shown
//! once the earlier ones are answered. A front-end renders whatever
//! [`ConfirmationService::subscribe`] reports and answers it with
//! [`accept`](ConfirmationService::accept), [`cancel`](ConfirmationService::cancel)
//! or [`dismiss`](ConfirmationService::dismiss).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tracing::debug;
use uuid::Uuid;

/// Named bundles of dialog defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmPreset {
    #[default]
    Default,
    Logout,
    Ban,
    Delete,
}

/// Visual treatment only; `Danger` changes icon and colour, not behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmVariant {
    #[default]
    Default,
    Danger,
}

/// Caller-supplied dialog options; unset fields come from the preset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub preset: ConfirmPreset,
    pub title: Option<String>,
    pub description: Option<String>,
    pub confirm_label: Option<String>,
    pub cancel_label: Option<String>,
    pub variant: Option<ConfirmVariant>,
    pub ask_reason: Option<bool>,
    pub reason_placeholder: Option<String>,
}

impl ConfirmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(preset: ConfirmPreset) -> Self {
        Self {
            preset,
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn confirm_label(mut self, label: impl Into<String>) -> Self {
        self.confirm_label = Some(label.into());
        self
    }

    pub fn cancel_label(mut self, label: impl Into<String>) -> Self {
        self.cancel_label = Some(label.into());
        self
    }

    pub fn variant(mut self, variant: ConfirmVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn ask_reason(mut self, ask: bool) -> Self {
        self.ask_reason = Some(ask);
        self
    }

    pub fn reason_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.reason_placeholder = Some(placeholder.into());
        self
    }

    /// Merge with the preset's defaults, caller fields winning
    pub fn resolve(&self) -> DialogOptions {
        let defaults = DialogOptions::for_preset(self.preset);
        // The ban preset always collects a reason
        let ask_reason =
            self.preset == ConfirmPreset::Ban || self.ask_reason.unwrap_or(defaults.ask_reason);

        DialogOptions {
            title: self.title.clone().unwrap_or(defaults.title),
            description: self.description.clone().or(defaults.description),
            confirm_label: self.confirm_label.clone().unwrap_or(defaults.confirm_label),
            cancel_label: self.cancel_label.clone().unwrap_or(defaults.cancel_label),
            variant: self.variant.unwrap_or(defaults.variant),
            ask_reason,
            reason_placeholder: self
                .reason_placeholder
                .clone()
                .or(defaults.reason_placeholder),
        }
    }
}

/// Fully resolved dialog content, ready to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogOptions {
    pub title: String,
    pub description: Option<String>,
    pub confirm_label: String,
    pub cancel_label: String,
    pub variant: ConfirmVariant,
    pub ask_reason: bool,
    pub reason_placeholder: Option<String>,
}

impl DialogOptions {
    pub fn for_preset(preset: ConfirmPreset) -> Self {
        match preset {
            ConfirmPreset::Default => Self {
                title: "Are you sure?".to_string(),
                description: None,
                confirm_label: "Confirm".to_string(),
                cancel_label: "Cancel".to_string(),
                variant: ConfirmVariant::Default,
                ask_reason: false,
                reason_placeholder: None,
            },
            ConfirmPreset::Logout => Self {
                title: "Sign out?".to_string(),
                description: Some("You will need to sign in again to continue.".to_string()),
                confirm_label: "Sign out".to_string(),
                cancel_label: "Stay".to_string(),
                variant: ConfirmVariant::Default,
                ask_reason: false,
                reason_placeholder: None,
            },
            ConfirmPreset::Ban => Self {
                title: "Ban this user?".to_string(),
                description: Some("The user will lose access to the platform.".to_string()),
                confirm_label: "Ban".to_string(),
                cancel_label: "Cancel".to_string(),
                variant: ConfirmVariant::Danger,
                ask_reason: true,
                reason_placeholder: Some("Reason for the ban".to_string()),
            },
            ConfirmPreset::Delete => Self {
                title: "Delete permanently?".to_string(),
                description: Some("This action cannot be undone.".to_string()),
                confirm_label: "Delete".to_string(),
                cancel_label: "Cancel".to_string(),
                variant: ConfirmVariant::Danger,
                ask_reason: false,
                reason_placeholder: None,
            },
        }
    }
}

/// How a confirmation was answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// Cancelled, dismissed, or abandoned; the pending action must not run
    Cancelled,
    Confirmed,
    ConfirmedWithReason { reason: String },
}

impl ConfirmOutcome {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, ConfirmOutcome::Cancelled)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ConfirmOutcome::ConfirmedWithReason { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Idle,
    AwaitingInput(Uuid),
}

/// Snapshot of the dialog currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDialog {
    pub id: Uuid,
    pub options: DialogOptions,
    /// Reason typed so far (only meaningful when `options.ask_reason`)
    pub reason: String,
    /// Requests waiting behind this one
    pub queued: usize,
}

/// Ways a user can answer a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResponse {
    Accept,
    Cancel,
    /// Escape, backdrop click, or programmatic close
    Dismiss,
}

struct PendingRequest {
    id: Uuid,
    options: DialogOptions,
    resolver: oneshot::Sender<ConfirmOutcome>,
}

struct OpenDialog {
    request: PendingRequest,
    reason: String,
}

#[derive(Default)]
struct DialogQueue {
    active: Option<OpenDialog>,
    waiting: VecDeque<PendingRequest>,
}

impl DialogQueue {
    fn snapshot(&self) -> Option<ActiveDialog> {
        self.active.as_ref().map(|open| ActiveDialog {
            id: open.request.id,
            options: open.request.options.clone(),
            reason: open.reason.clone(),
            queued: self.waiting.len(),
        })
    }

    /// Open the oldest waiting request whose caller is still listening
    fn promote_next(&mut self) {
        if self.active.is_some() {
            return;
        }

        while let Some(request) = self.waiting.pop_front() {
            if request.resolver.is_closed() {
                debug!("Dropping confirmation {}; its caller is gone", request.id);
                continue;
            }
            self.active = Some(OpenDialog {
                request,
                reason: String::new(),
            });
            return;
        }
    }
}

struct Shared {
    queue: Mutex<DialogQueue>,
    updates: watch::Sender<Option<ActiveDialog>>,
}

/// Shared handle to the application's confirmation dialog
#[derive(Clone)]
pub struct ConfirmationService {
    shared: Arc<Shared>,
}

impl Default for ConfirmationService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationService {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(DialogQueue::default()),
                updates,
            }),
        }
    }

    /// Ask the user to confirm and wait for the answer. Never fails: a request
    /// that is abandoned without an answer resolves to `Cancelled`.
    pub async fn confirm(&self, options: ConfirmOptions) -> ConfirmOutcome {
        let (resolver, answer) = oneshot::channel();
        let request = PendingRequest {
            id: Uuid::now_v7(),
            options: options.resolve(),
            resolver,
        };
        metrics::counter!("confirm.requests_total").increment(1);

        {
            let mut queue = self.lock();
            debug!(
                "Confirmation {} requested ({} already waiting)",
                request.id,
                queue.waiting.len() + usize::from(queue.active.is_some())
            );
            queue.waiting.push_back(request);
            queue.promote_next();
            self.publish(&queue);
        }

        answer.await.unwrap_or(ConfirmOutcome::Cancelled)
    }

    pub fn state(&self) -> DialogState {
        match &self.lock().active {
            Some(open) => DialogState::AwaitingInput(open.request.id),
            None => DialogState::Idle,
        }
    }

    pub fn current(&self) -> Option<ActiveDialog> {
        self.lock().snapshot()
    }

    /// Watch the dialog on screen; `None` means nothing is open
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveDialog>> {
        self.shared.updates.subscribe()
    }

    /// Update the reason typed into the active dialog
    pub fn set_reason(&self, reason: impl Into<String>) -> bool {
        let mut queue = self.lock();
        let Some(open) = queue.active.as_mut() else {
            return false;
        };
        open.reason = reason.into();
        self.publish(&queue);
        true
    }

    pub fn accept(&self) -> bool {
        self.respond_active(DialogResponse::Accept)
    }

    pub fn cancel(&self) -> bool {
        self.respond_active(DialogResponse::Cancel)
    }

    pub fn dismiss(&self) -> bool {
        self.respond_active(DialogResponse::Dismiss)
    }

    /// Answer dialog `id`. Returns false if it is not the one on screen.
    pub fn respond(&self, id: Uuid, response: DialogResponse) -> bool {
        let mut queue = self.lock();
        if queue.active.as_ref().map(|open| open.request.id) != Some(id) {
            debug!("Ignoring {:?} for confirmation {} which is not open", response, id);
            return false;
        }
        self.resolve_active(&mut queue, response);
        true
    }

    /// Resolve every open and waiting request as `Cancelled`
    pub fn cancel_all(&self) -> usize {
        let mut queue = self.lock();
        let mut cancelled = 0;
        if let Some(open) = queue.active.take() {
            let _ = open.request.resolver.send(ConfirmOutcome::Cancelled);
            cancelled += 1;
        }
        for request in queue.waiting.drain(..) {
            let _ = request.resolver.send(ConfirmOutcome::Cancelled);
            cancelled += 1;
        }
        self.publish(&queue);
        cancelled
    }

    fn respond_active(&self, response: DialogResponse) -> bool {
        let mut queue = self.lock();
        if queue.active.is_none() {
            return false;
        }
        self.resolve_active(&mut queue, response);
        true
    }

    fn resolve_active(&self, queue: &mut DialogQueue, response: DialogResponse) {
        let Some(open) = queue.active.take() else {
            return;
        };

        let outcome = match response {
            DialogResponse::Accept if open.request.options.ask_reason => {
                ConfirmOutcome::ConfirmedWithReason {
                    reason: open.reason.trim().to_string(),
                }
            }
            DialogResponse::Accept => ConfirmOutcome::Confirmed,
            DialogResponse::Cancel | DialogResponse::Dismiss => ConfirmOutcome::Cancelled,
        };

        debug!("Confirmation {} answered: {:?}", open.request.id, response);
        if open.request.resolver.send(outcome).is_err() {
            debug!("Caller of confirmation {} is gone", open.request.id);
        }

        queue.promote_next();
        self.publish(queue);
    }

    fn publish(&self, queue: &DialogQueue) {
        self.shared.updates.send_replace(queue.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, DialogQueue> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
