//! Relocation engine.
//!
//! Moves one node of an overlay into the overlay's single-item slot and puts
//! it back on close. The node is moved, never cloned, so identity and any
//! state hanging off it survive the round trip.
//!
//! Each overlay keeps its own [`RelocationRecord`]; relocations of different
//! overlays may interleave freely.

use crate::dom::{Document, NodeId, Selector};
use crate::registry::OverlayInstance;

/// Class on the container while a relocated node is shown alone.
pub const CLASS_SINGLE_ITEM: &str = "single-item-only";

/// Exact restore position of a displaced node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationRecord {
    pub node: NodeId,
    pub original_parent: NodeId,
    pub original_next_sibling: Option<NodeId>,
}

/// Move the first descendant of the overlay matching `selector` into its slot.
///
/// Returns `false` (and changes nothing) when the overlay is not built or
/// nothing matches. An active relocation is restored first.
pub fn relocate(doc: &mut Document, instance: &mut OverlayInstance, selector: &Selector) -> bool {
    let (Some(container), Some(slot)) = (instance.container, instance.slot) else {
        return false;
    };
    restore(doc, instance);

    // The slot and its ancestors can't move into the slot.
    let Some(node) = doc
        .query_all(container, selector)
        .into_iter()
        .find(|&n| !doc.contains(n, slot))
    else {
        return false;
    };
    let Some(original_parent) = doc.parent(node) else {
        return false;
    };

    instance.relocation = Some(RelocationRecord {
        node,
        original_parent,
        original_next_sibling: doc.next_sibling(node),
    });
    doc.append_child(slot, node);
    doc.add_class(container, CLASS_SINGLE_ITEM);
    true
}

/// Put the relocated node back where it was. No-op without an active record.
pub fn restore(doc: &mut Document, instance: &mut OverlayInstance) -> bool {
    let Some(record) = instance.relocation.take() else {
        return false;
    };
    doc.insert_before(
        record.original_parent,
        record.node,
        record.original_next_sibling,
    );
    if let Some(container) = instance.container {
        doc.remove_class(container, CLASS_SINGLE_ITEM);
    }
    true
}
