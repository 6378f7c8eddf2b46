//! Overlay registry.
//!
//! Maps overlay ids to their definition (where content comes from) and
//! instance (what has been mounted). Content is acquired through a per-id
//! [`OnceCell`]: the first caller runs the fetch, concurrent callers await
//! the same result, and later callers read it without any I/O.
//!
//! Only id-keyed access is exposed. [`Registry::ids`] returns ids sorted so
//! nothing downstream depends on discovery order.

use crate::builder::AnimationMode;
use crate::dom::{NodeId, Selector};
use crate::lifecycle::LifecycleState;
use crate::relocate::RelocationRecord;
use crate::trigger::TriggerBinding;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Where an overlay's content comes from.
#[derive(Debug, Clone)]
pub enum OverlaySource {
    Inline(String),
    Remote { path: String, region: Selector },
}

#[derive(Debug)]
pub struct OverlayDefinition {
    pub id: String,
    pub source: OverlaySource,
    content: Arc<OnceCell<String>>,
}

impl OverlayDefinition {
    fn new(id: &str, source: OverlaySource) -> Self {
        Self {
            id: id.to_owned(),
            source,
            content: Arc::new(OnceCell::new()),
        }
    }

    /// Whether content acquisition has completed. Never reverts.
    pub fn loaded(&self) -> bool {
        self.content.initialized()
    }

    /// Whether a build currently holds the content cell, i.e. content
    /// acquisition is in flight.
    pub fn acquiring(&self) -> bool {
        Arc::strong_count(&self.content) > 1
    }

    pub(crate) fn content_cell(&self) -> Arc<OnceCell<String>> {
        Arc::clone(&self.content)
    }
}

/// Mounted state of one overlay.
#[derive(Debug, Default)]
pub struct OverlayInstance {
    pub(crate) container: Option<NodeId>,
    pub(crate) slot: Option<NodeId>,
    pub(crate) animation: AnimationMode,
    pub(crate) state: LifecycleState,
    pub(crate) relocation: Option<RelocationRecord>,
}

impl OverlayInstance {
    /// Set once by the builder, never cleared.
    #[inline]
    pub fn built(&self) -> bool {
        self.container.is_some()
    }

    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    pub fn animation(&self) -> AnimationMode {
        self.animation
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn relocation(&self) -> Option<&RelocationRecord> {
        self.relocation.as_ref()
    }
}

#[derive(Debug)]
pub struct Overlay {
    pub definition: OverlayDefinition,
    pub instance: OverlayInstance,
}

#[derive(Debug, Default)]
pub struct Registry {
    overlays: FxHashMap<String, Overlay>,
    triggers: FxHashMap<NodeId, TriggerBinding>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a remote overlay. Existing definitions are left untouched.
    ///
    /// Returns `true` when the id was new.
    pub fn define_remote(&mut self, id: &str, region: &Selector) -> bool {
        if self.overlays.contains_key(id) {
            return false;
        }
        let source = OverlaySource::Remote {
            path: id.to_owned(),
            region: region.clone(),
        };
        self.insert(id, source);
        true
    }

    /// Register inline content, replacing a remote definition that has not
    /// started loading. Returns `false` when the overlay already has content
    /// or a build is acquiring it.
    pub fn define_inline(&mut self, id: &str, html: &str) -> bool {
        if let Some(existing) = self.overlays.get(id)
            && (existing.definition.loaded()
                || existing.definition.acquiring()
                || existing.instance.built())
        {
            return false;
        }
        self.insert(id, OverlaySource::Inline(html.to_owned()));
        true
    }

    fn insert(&mut self, id: &str, source: OverlaySource) {
        let overlay = Overlay {
            definition: OverlayDefinition::new(id, source),
            instance: OverlayInstance::default(),
        };
        self.overlays.insert(id.to_owned(), overlay);
    }

    pub fn get(&self, id: &str) -> Option<&Overlay> {
        self.overlays.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Overlay> {
        self.overlays.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.overlays.contains_key(id)
    }

    /// All ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.overlays.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn bind_trigger(&mut self, binding: TriggerBinding) -> bool {
        self.triggers.insert(binding.node, binding).is_none()
    }

    pub fn trigger(&self, node: NodeId) -> Option<&TriggerBinding> {
        self.triggers.get(&node)
    }
}
