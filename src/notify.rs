//! Short-lived toast messages shown over the map.

use std::time::{Duration, Instant};

use egui::{Align2, Color32, Context, Frame, Margin, RichText, vec2};
use log::{error, info};

/// Whether a toast reports a success or a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    /// Something worked.
    Success,

    /// Something went wrong.
    Error,
}

/// A message that disappears on its own.
#[derive(Clone, Debug)]
pub struct Toast {
    /// The kind of the toast.
    pub kind: ToastKind,

    /// The text shown to the user.
    pub message: String,

    expires_at: Instant,
}

/// The toasts currently on screen.
#[derive(Clone, Debug)]
pub struct Notifications {
    toasts: Vec<Toast>,
    duration: Duration,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl Notifications {
    /// Creates an empty queue whose toasts live for `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            toasts: Vec::new(),
            duration,
        }
    }

    /// Shows a toast. Never blocks and never fails.
    pub fn notify(&mut self, kind: ToastKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            ToastKind::Success => info!("{}", message),
            ToastKind::Error => error!("{}", message),
        }
        self.toasts.push(Toast {
            kind,
            message,
            expires_at: Instant::now() + self.duration,
        });
    }

    /// Shows a success toast.
    pub fn success(&mut self, message: impl Into<String>) {
        self.notify(ToastKind::Success, message);
    }

    /// Shows an error toast.
    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(ToastKind::Error, message);
    }

    /// Drops the toasts that expired at `now`.
    pub fn prune(&mut self, now: Instant) {
        self.toasts.retain(|toast| toast.expires_at > now);
    }

    /// The live toasts, oldest first.
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// Draws the live toasts in the top-right corner.
    pub fn show(&mut self, ctx: &Context) {
        let now = Instant::now();
        self.prune(now);

        let Some(next_expiry) = self.toasts.iter().map(|t| t.expires_at).min() else {
            return;
        };

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(Align2::RIGHT_TOP, vec2(-10.0, 10.0))
            .interactable(false)
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    let (fill, text) = match toast.kind {
                        ToastKind::Success => (Color32::from_rgb(46, 125, 50), Color32::WHITE),
                        ToastKind::Error => (Color32::from_rgb(198, 40, 40), Color32::WHITE),
                    };
                    Frame::NONE
                        .fill(fill)
                        .inner_margin(Margin::symmetric(12, 8))
                        .corner_radius(4.0)
                        .show(ui, |ui| {
                            ui.label(RichText::new(&toast.message).color(text));
                        });
                    ui.add_space(6.0);
                }
            });

        // Wake up again to remove the next toast on time.
        ctx.request_repaint_after(next_expiry.saturating_duration_since(now));
    }
}
