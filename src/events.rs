//! Lifecycle events.
//!
//! Listeners registered through [`Popups::on`](crate::Popups::on) are called
//! synchronously, in registration order, at each lifecycle boundary.

use crate::host::OverlaySnapshot;
use parking_lot::RwLock;
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeInit,
    Ready,
    BeforeOpen,
    AfterOpen,
    BeforeClose,
    AfterClose,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeInit => "before-init",
            Self::Ready => "ready",
            Self::BeforeOpen => "before-open",
            Self::AfterOpen => "after-open",
            Self::BeforeClose => "before-close",
            Self::AfterClose => "after-close",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted event. `overlay` is `None` for `before-init` and `ready`.
#[derive(Debug, Clone)]
pub struct PopupEvent {
    pub kind: EventKind,
    pub overlay: Option<OverlaySnapshot>,
}

pub type Listener = Arc<dyn Fn(&PopupEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn subscribe(&self, listener: Listener) {
        self.listeners.write().push(listener);
    }

    pub fn emit(&self, kind: EventKind, overlay: Option<OverlaySnapshot>) {
        // Listeners may subscribe from inside a callback.
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return;
        }
        let event = PopupEvent { kind, overlay };
        for listener in &listeners {
            listener(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
