//! Overlay lifecycle.
//!
//! ```text
//! Closed ──open──▶ Opening ──▶ Open ──close──▶ Closing ──teardown──▶ Closed
//! ```
//!
//! At most one overlay holds the active slot at a time. Opening another
//! overlay while one is active closes the active one and completes its
//! teardown immediately, without waiting for its transition.
//!
//! [`Popups::open`] and [`Popups::close`] take turns on a FIFO queue, so a
//! close requested while an open is in flight runs after it. Teardown
//! completion is not queued: it comes from [`Popups::transition_end`], the
//! configured timeout, or happens inline when the overlay has no transition.

use crate::controller::{Active, Popups, State};
use crate::dom::{NodeId, Selector};
use crate::error::PopupError;
use crate::events::EventKind;
use crate::log;
use crate::relocate;
use std::fmt;
use tokio::sync::watch;

/// Body class that stops the page from scrolling behind an overlay.
pub const CLASS_SCROLL_LOCK: &str = "popup-scroll-lock";
/// Body class present while an overlay holds the active slot.
pub const CLASS_ACTIVE: &str = "popup-active";
/// Container class of a visible overlay.
pub const CLASS_OPEN: &str = "open";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// How an overlay is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Selector of the node to relocate into the single-item slot.
    pub target: Option<String>,
    pub autoplay: bool,
    /// Element that receives focus back after close.
    pub trigger: Option<NodeId>,
}

/// Result of [`Popups::handle_click`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Opened(String),
    Closed,
    Ignored,
}

/// A close waiting for its transition to end.
#[derive(Debug)]
pub(crate) struct Pending {
    pub(crate) id: String,
    pub(crate) seq: u64,
    pub(crate) done: watch::Sender<bool>,
}

/// Completion handle of a close.
///
/// Already complete when the overlay has no transition.
#[derive(Debug, Clone)]
#[must_use = "a pending teardown finishes on its own; call `finished` to wait for it"]
pub struct Teardown {
    signal: Option<watch::Receiver<bool>>,
}

impl Teardown {
    pub(crate) fn complete() -> Self {
        Self { signal: None }
    }

    fn pending(signal: watch::Receiver<bool>) -> Self {
        Self {
            signal: Some(signal),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.signal.as_ref().is_none_or(|rx| *rx.borrow())
    }

    /// Resolve once the overlay is `Closed`.
    pub async fn finished(self) {
        if let Some(mut rx) = self.signal {
            // A dropped sender means the session is gone.
            let _ = rx.wait_for(|done| *done).await;
        }
    }
}

impl Popups {
    /// Open overlay `id`.
    ///
    /// No-op when `id` is already open. Fails with
    /// [`PopupError::BuildGuard`] when `id` is unknown.
    ///
    /// A build failure surfaces after `before-open` was emitted. No close
    /// events follow it; the page classes and active slot are reset.
    pub async fn open(&self, id: &str, options: OpenOptions) -> Result<(), PopupError> {
        let _turn = self.inner.queue.lock().await;

        let (already_open, has_active) = {
            let state = self.inner.state.lock();
            let Some(overlay) = state.registry.get(id) else {
                return Err(PopupError::BuildGuard { id: id.to_owned() });
            };
            let is_active = state.active.as_ref().is_some_and(|a| a.id == id);
            (
                is_active && overlay.instance.state() == LifecycleState::Open,
                state.active.is_some(),
            )
        };
        if already_open {
            return Ok(());
        }
        if has_active {
            self.force_close();
        }

        let snapshot = self.snapshot(id);
        self.inner.events.emit(EventKind::BeforeOpen, snapshot);
        {
            let mut state = self.inner.state.lock();
            let return_focus = options.trigger.or(state.focused);
            if let Some(overlay) = state.registry.get_mut(id) {
                overlay.instance.state = LifecycleState::Opening;
            }
            if let Some(body) = state.page.body() {
                state.page.add_class(body, CLASS_SCROLL_LOCK);
                state.page.add_class(body, CLASS_ACTIVE);
            }
            state.active = Some(Active {
                id: id.to_owned(),
                return_focus,
            });
        }

        if let Err(err) = self.build(id).await {
            self.abort_open(id);
            return Err(err);
        }
        // Blocks must not initialize before the scripts they need, even when
        // a concurrent build is the one loading them.
        self.script_pass(&[id.to_owned()]).await;

        self.reveal(id, options.target.as_deref());

        let delay = self.inner.config.behavior.focus_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let snapshot = {
            let mut state = self.inner.state.lock();
            let container = state
                .registry
                .get(id)
                .and_then(|o| o.instance.container());
            if let Some(container) = container {
                let target = state
                    .page
                    .query(container, &self.inner.selectors.focusable)
                    .unwrap_or(container);
                state.focused = Some(target);
            }
            state.snapshot(id)
        };

        if let Some(snapshot) = &snapshot {
            let host = &self.inner.host;
            if options.autoplay || self.inner.config.behavior.autoplay_videos {
                host.play_media(snapshot);
            }
            host.initialize_blocks(snapshot);
        }

        let snapshot = {
            let mut state = self.inner.state.lock();
            if let Some(overlay) = state.registry.get_mut(id) {
                overlay.instance.state = LifecycleState::Open;
            }
            state.snapshot(id)
        };
        log!("open"; "{id}");
        self.inner.events.emit(EventKind::AfterOpen, snapshot);
        Ok(())
    }

    /// Close the active overlay. No-op (and no events) unless one is open.
    ///
    /// Closing an overlay that is already closing returns its pending
    /// teardown.
    pub async fn close(&self) -> Teardown {
        let _turn = self.inner.queue.lock().await;
        self.begin_close(false)
    }

    /// Report that the close transition of `id` ended. Returns whether a
    /// pending teardown completed.
    pub fn transition_end(&self, id: &str) -> bool {
        let seq = {
            let state = self.inner.state.lock();
            match &state.pending {
                Some(pending) if pending.id == id => pending.seq,
                _ => return false,
            }
        };
        self.finish_close(Some(seq))
    }

    /// Delegated click handling: close controls first, then triggers.
    pub async fn handle_click(&self, node: NodeId) -> Result<ClickOutcome, PopupError> {
        enum Action {
            Close,
            Open(crate::trigger::TriggerBinding),
        }

        let action = {
            let state = self.inner.state.lock();
            let selectors = &self.inner.selectors;
            if state.page.closest(node, &selectors.close).is_some() {
                Some(Action::Close)
            } else {
                state
                    .page
                    .closest(node, &selectors.trigger)
                    .and_then(|t| state.registry.trigger(t).cloned())
                    .map(Action::Open)
            }
        };

        match action {
            Some(Action::Close) => {
                let _teardown = self.close().await;
                Ok(ClickOutcome::Closed)
            }
            Some(Action::Open(binding)) => {
                if self.state_of(&binding.id) == Some(LifecycleState::Open) {
                    return Ok(ClickOutcome::Ignored);
                }
                let options = OpenOptions {
                    target: binding.target,
                    autoplay: binding.autoplay,
                    trigger: Some(binding.node),
                };
                self.open(&binding.id, options).await?;
                Ok(ClickOutcome::Opened(binding.id))
            }
            None => Ok(ClickOutcome::Ignored),
        }
    }

    /// Relocate `target` (if any) and mark the container visible.
    fn reveal(&self, id: &str, target: Option<&str>) {
        let mut state = self.inner.state.lock();
        let State { page, registry, .. } = &mut *state;
        let Some(overlay) = registry.get_mut(id) else {
            return;
        };

        if let Some(target) = target {
            match Selector::parse(target) {
                Ok(selector) => {
                    if !relocate::relocate(page, &mut overlay.instance, &selector) {
                        log!("open"; "{id}: `{target}` not found, showing everything");
                    }
                }
                Err(err) => log!("error"; "{id}: bad target `{target}`: {err}"),
            }
        }

        if let Some(container) = overlay.instance.container() {
            page.add_class(container, CLASS_OPEN);
            page.set_attr(container, "aria-hidden", "false");
        }
    }

    /// Undo the entry steps of an open whose build failed.
    fn abort_open(&self, id: &str) {
        let mut state = self.inner.state.lock();
        if let Some(overlay) = state.registry.get_mut(id) {
            overlay.instance.state = LifecycleState::Closed;
        }
        unlock_page(&mut state);
        state.active = None;
    }

    /// Close whatever holds the active slot and finish its teardown now.
    fn force_close(&self) {
        let _ = self.begin_close(true);
        // Still closing from an earlier close that waits for its transition.
        self.finish_close(None);
    }

    /// Close entry steps. Completes teardown inline unless the overlay has a
    /// transition and `force` is off.
    fn begin_close(&self, force: bool) -> Teardown {
        let (id, snapshot) = {
            let state = self.inner.state.lock();
            let Some(active) = &state.active else {
                return Teardown::complete();
            };
            let current = state
                .registry
                .get(&active.id)
                .map(|o| o.instance.state())
                .unwrap_or_default();
            match current {
                LifecycleState::Open => {}
                LifecycleState::Opening if force => {}
                LifecycleState::Closing => {
                    return match &state.pending {
                        Some(pending) => Teardown::pending(pending.done.subscribe()),
                        None => Teardown::complete(),
                    };
                }
                _ => return Teardown::complete(),
            }
            (active.id.clone(), state.snapshot(&active.id))
        };

        self.inner.events.emit(EventKind::BeforeClose, snapshot.clone());
        if let Some(snapshot) = &snapshot {
            self.inner.host.pause_media(snapshot);
            self.inner.host.halt_embeds(snapshot);
        }

        let waiting = {
            let mut state = self.inner.state.lock();
            unlock_page(&mut state);
            let State { page, registry, .. } = &mut *state;
            let mut waits = false;
            if let Some(overlay) = registry.get_mut(&id) {
                overlay.instance.state = LifecycleState::Closing;
                waits = !force && overlay.instance.animation().has_transition();
                if let Some(container) = overlay.instance.container() {
                    page.remove_class(container, CLASS_OPEN);
                    page.set_attr(container, "aria-hidden", "true");
                }
            }

            if waits {
                state.close_seq += 1;
                let seq = state.close_seq;
                let (done, signal) = watch::channel(false);
                state.pending = Some(Pending {
                    id: id.clone(),
                    seq,
                    done,
                });
                Some((seq, signal))
            } else {
                None
            }
        };

        let Some((seq, signal)) = waiting else {
            self.finish_close(None);
            return Teardown::complete();
        };

        if let Some(timeout) = self.inner.config.behavior.transition_timeout()
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            let popups = self.clone();
            runtime.spawn(async move {
                tokio::time::sleep(timeout).await;
                if popups.finish_close(Some(seq)) {
                    log!("close"; "transition timed out after {}ms", timeout.as_millis());
                }
            });
        }
        log!("close"; "{id} waiting for transition");
        Teardown::pending(signal)
    }

    /// Closing → Closed. With `expected`, only completes that pending close.
    fn finish_close(&self, expected: Option<u64>) -> bool {
        let snapshot = {
            let mut state = self.inner.state.lock();
            if let Some(seq) = expected
                && state.pending.as_ref().map(|p| p.seq) != Some(seq)
            {
                return false;
            }
            let State {
                page,
                registry,
                active,
                pending,
                focused,
                ..
            } = &mut *state;

            let Some(current) = active.as_ref() else {
                return false;
            };
            let Some(overlay) = registry.get_mut(&current.id) else {
                return false;
            };
            if overlay.instance.state() != LifecycleState::Closing {
                return false;
            }

            relocate::restore(page, &mut overlay.instance);
            overlay.instance.state = LifecycleState::Closed;
            *focused = current.return_focus.filter(|&node| page.is_connected(node));
            if let Some(pending) = pending.take() {
                pending.done.send_replace(true);
            }
            let id = current.id.clone();
            *active = None;
            log!("close"; "{id}");
            state.snapshot(&id)
        };
        self.inner.events.emit(EventKind::AfterClose, snapshot);
        true
    }
}

fn unlock_page(state: &mut State) {
    if let Some(body) = state.page.body() {
        state.page.remove_class(body, CLASS_SCROLL_LOCK);
        state.page.remove_class(body, CLASS_ACTIVE);
    }
}
