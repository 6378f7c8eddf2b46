//! One-time script execution.
//!
//! Markup inserted into the page does not execute its `<script>` elements,
//! so scripts found in freshly built overlays are handed to the [`Host`]
//! explicitly. Every script has an identity (its `src`, else a digest of its
//! body) and no identity runs twice per session.
//!
//! Identities are claimed before the first suspension point, so concurrent
//! batches that share a script cannot both run it. A batch that finds an
//! external script claimed by another batch still waits for that load to
//! settle, so callers never proceed before a script they depend on is present.

use crate::dom::{Document, NodeId, NodeKind};
use crate::host::Host;
use crate::log;
use futures::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use tokio::sync::watch;

/// `type` values that denote classic or module JavaScript.
const SCRIPT_TYPES: &[&str] = &[
    "",
    "module",
    "text/javascript",
    "application/javascript",
    "application/ecmascript",
    "text/ecmascript",
];

/// An executable script found in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    External { src: String, is_async: bool },
    Inline { body: String },
}

impl ScriptRef {
    /// Read a `<script>` element. Data blocks (`application/ld+json`, …) and
    /// empty inline scripts yield `None`.
    pub fn from_element(doc: &Document, node: NodeId) -> Option<Self> {
        if doc.tag(node) != Some("script") {
            return None;
        }
        let ty = doc.attr(node, "type").unwrap_or("").trim();
        if !SCRIPT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(ty)) {
            return None;
        }

        if let Some(src) = doc.attr(node, "src").filter(|s| !s.trim().is_empty()) {
            return Some(Self::External {
                src: src.trim().to_owned(),
                is_async: doc.has_attr(node, "async"),
            });
        }

        // Script bodies are kept verbatim by the parser.
        let body: String = doc
            .children(node)
            .iter()
            .filter_map(|&c| match doc.kind(c) {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        (!body.trim().is_empty()).then_some(Self::Inline { body })
    }

    pub fn identity(&self) -> ScriptIdentity {
        match self {
            Self::External { src, .. } => ScriptIdentity::Src(src.clone()),
            Self::Inline { body } => ScriptIdentity::Body(blake3::hash(body.as_bytes())),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::External { src, .. } => src.clone(),
            Self::Inline { body } => format!("inline script ({} bytes)", body.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptIdentity {
    Src(String),
    Body(blake3::Hash),
}

/// Outcome counts of one [`ScriptLoader::run_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Session-wide set of executed script identities.
///
/// Each identity maps to a flag that flips to `true` once its execution
/// settled. A dropped sender (cancelled batch) also counts as settled.
#[derive(Debug, Default)]
pub struct ScriptLoader {
    loaded: Mutex<FxHashMap<ScriptIdentity, watch::Receiver<bool>>>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `script` as loaded. Returns `false` if it already was.
    pub fn claim(&self, script: &ScriptRef) -> bool {
        self.try_claim(script).is_ok()
    }

    /// The settle sender when this call claimed `script`, else a receiver on
    /// the existing claim.
    fn try_claim(&self, script: &ScriptRef) -> Result<watch::Sender<bool>, watch::Receiver<bool>> {
        match self.loaded.lock().entry(script.identity()) {
            Entry::Occupied(claimed) => Err(claimed.get().clone()),
            Entry::Vacant(slot) => {
                let (settled, rx) = watch::channel(false);
                slot.insert(rx);
                Ok(settled)
            }
        }
    }

    pub fn is_loaded(&self, script: &ScriptRef) -> bool {
        self.loaded.lock().contains_key(&script.identity())
    }

    pub fn len(&self) -> usize {
        self.loaded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one script unless its identity already ran. Returns whether it ran.
    pub async fn run_once(&self, host: &dyn Host, script: &ScriptRef) -> bool {
        let report = self.run_batch(host, std::slice::from_ref(script)).await;
        report.ran + report.failed == 1
    }

    /// Run every not-yet-loaded script.
    ///
    /// Inline scripts execute synchronously in discovery order. External
    /// scripts load concurrently and the batch waits for all of them,
    /// including those another batch claimed and is still loading; a failing
    /// load never cancels the others. Failures are logged and stay claimed.
    pub async fn run_batch(&self, host: &dyn Host, scripts: &[ScriptRef]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut externals = Vec::new();
        let mut in_flight = Vec::new();

        for script in scripts {
            let settled = match self.try_claim(script) {
                Ok(settled) => settled,
                Err(claimed) => {
                    report.skipped += 1;
                    if matches!(script, ScriptRef::External { .. }) {
                        in_flight.push(claimed);
                    }
                    continue;
                }
            };
            match script {
                ScriptRef::Inline { body } => {
                    match host.eval_script(body) {
                        Ok(()) => report.ran += 1,
                        Err(err) => {
                            log!("error"; "{}: {err:#}", script.label());
                            report.failed += 1;
                        }
                    }
                    settled.send_replace(true);
                }
                ScriptRef::External { src, .. } => externals.push((src.as_str(), settled)),
            }
        }

        let loads = join_all(externals.iter().map(|(src, _)| host.load_script(src)));
        let waits = join_all(in_flight.into_iter().map(|mut claimed| async move {
            // Err means the claiming batch was dropped; nothing left to wait for.
            let _ = claimed.wait_for(|settled| *settled).await;
        }));
        let (results, _) = futures::join!(loads, waits);

        for ((src, settled), result) in externals.iter().zip(results) {
            settled.send_replace(true);
            match result {
                Ok(()) => {
                    log!("script"; "loaded {src}");
                    report.ran += 1;
                }
                Err(err) => {
                    log!("error"; "{src}: {err:#}");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Executable scripts under each of `roots`, in document order.
pub fn collect(doc: &Document, roots: &[NodeId]) -> Vec<ScriptRef> {
    roots
        .iter()
        .flat_map(|&root| doc.descendants(root))
        .filter_map(|node| ScriptRef::from_element(doc, node))
        .collect()
}
