//! Transient, user-visible notifications.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

pub const SUCCESS_DURATION: Duration = Duration::from_secs(3);
pub const ERROR_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    /// How long the toast should stay on screen.
    pub duration: Duration,
}

/// A queue of notifications waiting to be shown.
#[derive(Debug, Default)]
pub struct Toasts {
    pending: Mutex<VecDeque<Toast>>,
}

impl Toasts {
    pub fn new() -> Self { Toasts::default() }

    pub fn success<S: Into<String>>(&self, message: S) {
        self.push(ToastKind::Success, message.into(), SUCCESS_DURATION);
    }

    pub fn error<S: Into<String>>(&self, message: S) {
        self.push(ToastKind::Error, message.into(), ERROR_DURATION);
    }

    /// Take every pending toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> { self.queue().drain(..).collect() }

    pub fn is_empty(&self) -> bool { self.queue().is_empty() }

    fn push(&self, kind: ToastKind, message: String, duration: Duration) {
        log::debug!("Toast ({:?}): {}", kind, message);
        self.queue().push_back(Toast {
            kind,
            message,
            duration,
        });
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Toast>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
