//! The popup engine.
//!
//! [`Popups`] owns every piece of session state: the page document, the
//! overlay registry, the active-overlay slot and the loaded-script set. It is
//! created explicitly, is cheap to clone and can be shared across tasks.
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! `.await`. Open and close additionally take turns on a FIFO queue (see
//! [`lifecycle`](crate::lifecycle)).

use crate::builder::{self, ATTR_CLOSE};
use crate::config::PopupConfig;
use crate::dom::{Document, NodeId, Selector};
use crate::error::PopupError;
use crate::events::{EventBus, EventKind, PopupEvent};
use crate::fetch::{ContentSource, Fetcher};
use crate::host::{Host, OverlaySnapshot};
use crate::lifecycle::{LifecycleState, Pending};
use crate::log;
use crate::logger;
use crate::registry::{OverlaySource, Registry};
use crate::relocate;
use crate::scripts::{self, BatchReport, ScriptLoader, ScriptRef};
use crate::trigger::{self, ATTR_AUTOPLAY, ATTR_ID, ATTR_TARGET, OverlayRef, TriggerBinding};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;

/// Focus candidates inside an opened overlay, first match wins.
const FOCUSABLE: &str = r#"a[href], button, input, select, textarea, [tabindex]:not([tabindex="-1"])"#;

/// Handle to one popup session.
#[derive(Clone)]
pub struct Popups {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) config: PopupConfig,
    pub(crate) selectors: Selectors,
    pub(crate) fetcher: Fetcher,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) scripts: ScriptLoader,
    pub(crate) events: EventBus,
    pub(crate) state: Mutex<State>,
    /// Open/close turn queue. Tokio's mutex is fair, so turns are FIFO.
    pub(crate) queue: tokio::sync::Mutex<()>,
}

/// Configuration selectors, parsed once.
pub(crate) struct Selectors {
    pub(crate) region: Selector,
    pub(crate) mount: Selector,
    pub(crate) bundle: Option<Selector>,
    pub(crate) bundle_when: Vec<Selector>,
    pub(crate) close: Selector,
    pub(crate) trigger: Selector,
    pub(crate) focusable: Selector,
}

impl Selectors {
    fn new(config: &PopupConfig) -> Result<Self, PopupError> {
        Ok(Self {
            region: Selector::parse(&config.content.region)?,
            mount: Selector::parse(&config.content.mount)?,
            bundle: config
                .scripts
                .bundle
                .as_deref()
                .map(Selector::parse)
                .transpose()?,
            bundle_when: config
                .scripts
                .bundle_when
                .iter()
                .map(|s| Selector::parse(s))
                .collect::<Result<_, _>>()?,
            close: Selector::parse(&format!("[{ATTR_CLOSE}]"))?,
            trigger: Selector::parse(&format!("[{ATTR_ID}]"))?,
            focusable: Selector::parse(FOCUSABLE)?,
        })
    }
}

/// The overlay currently holding the active slot.
#[derive(Debug, Clone)]
pub(crate) struct Active {
    pub(crate) id: String,
    pub(crate) return_focus: Option<NodeId>,
}

pub(crate) struct State {
    pub(crate) page: Document,
    pub(crate) registry: Registry,
    pub(crate) active: Option<Active>,
    pub(crate) pending: Option<Pending>,
    pub(crate) close_seq: u64,
    pub(crate) focused: Option<NodeId>,
    pub(crate) initialized: bool,
}

impl State {
    pub(crate) fn snapshot(&self, id: &str) -> Option<OverlaySnapshot> {
        let overlay = self.registry.get(id)?;
        let instance = &overlay.instance;
        Some(OverlaySnapshot {
            id: id.to_owned(),
            container: instance.container(),
            state: instance.state(),
            built: instance.built(),
            loaded: overlay.definition.loaded(),
            animation: instance.animation(),
            media: OverlaySnapshot::collect_media(&self.page, instance.container()),
        })
    }
}

impl Popups {
    /// Create a session over `page`.
    ///
    /// Fails when the configuration does not validate. `log.quiet` is applied
    /// to the process-wide logger only when set, so one quiet session silences
    /// logging for every session in the process. Call [`logger::set_quiet`]
    /// directly to turn it back on.
    pub fn new(
        config: PopupConfig,
        page: Document,
        source: Arc<dyn ContentSource>,
        host: Arc<dyn Host>,
    ) -> Result<Self, PopupError> {
        config.validate()?;
        if config.log.quiet {
            logger::set_quiet(true);
        }

        let selectors = Selectors::new(&config)?;
        let state = State {
            page,
            registry: Registry::new(),
            active: None,
            pending: None,
            close_seq: 0,
            focused: None,
            initialized: false,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                selectors,
                fetcher: Fetcher::new(source),
                host,
                scripts: ScriptLoader::new(),
                events: EventBus::default(),
                state: Mutex::new(state),
                queue: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Discover triggers, check the mount point and preload if configured.
    ///
    /// Emits `before-init` and `ready`. Safe to call again after new
    /// triggers were added to the page.
    pub async fn init(&self) -> Result<(), PopupError> {
        self.inner.events.emit(EventKind::BeforeInit, None);
        let found = self.render();

        {
            let mut state = self.inner.state.lock();
            if !state.initialized {
                let page = &state.page;
                if builder::resolve_mount_point(page, &self.inner.selectors.mount).is_none() {
                    return Err(PopupError::MountMissing {
                        selector: self.inner.config.content.mount.clone(),
                    });
                }
                state.initialized = true;
            }
        }
        log!("init"; "{found} trigger(s)");

        if self.inner.config.behavior.preload {
            self.build_all().await;
        }
        self.inner.events.emit(EventKind::Ready, None);
        Ok(())
    }

    /// Bind every trigger not bound yet. Returns how many were bound.
    ///
    /// Each trigger is stamped with `data-popup` attributes and its `href`
    /// neutralized; its overlay is registered as remote unless already known.
    pub fn render(&self) -> usize {
        let prefixes = &self.inner.config.trigger.prefixes;
        let region = &self.inner.selectors.region;
        let mut state = self.inner.state.lock();
        let State { page, registry, .. } = &mut *state;

        let candidates: Vec<NodeId> = page
            .descendants(page.root())
            .filter(|&n| page.element(n).is_some() && registry.trigger(n).is_none())
            .collect();

        let mut bound = 0;
        for node in candidates {
            let Some(reference) = trigger_reference(page, node, prefixes) else {
                continue;
            };

            page.set_attr(node, ATTR_ID, &reference.path);
            if let Some(target) = &reference.target {
                page.set_attr(node, ATTR_TARGET, target);
            }
            if reference.autoplay {
                page.set_attr(node, ATTR_AUTOPLAY, "");
            }
            if page.has_attr(node, "href") {
                page.set_attr(node, "href", "#");
            }

            registry.define_remote(&reference.path, region);
            registry.bind_trigger(TriggerBinding {
                node,
                id: reference.path,
                target: reference.target,
                autoplay: reference.autoplay,
            });
            bound += 1;
        }
        bound
    }

    /// Register an overlay whose content is `html`; it never touches the
    /// network. Returns `false` when `id` already has content.
    pub fn register_inline(&self, id: &str, html: &str) -> Result<bool, PopupError> {
        Document::parse(html)?;
        let registered = self.inner.state.lock().registry.define_inline(id, html);
        if !registered {
            log!("build"; "{id} already has content, inline source ignored");
        }
        Ok(registered)
    }

    /// Build `id` if needed and run the scripts it introduced.
    ///
    /// When another task built `id`, this still waits until the scripts that
    /// task started loading have settled.
    pub async fn ensure_built(&self, id: &str) -> Result<OverlaySnapshot, PopupError> {
        self.build(id).await?;
        self.script_pass(&[id.to_owned()]).await;
        self.snapshot(id)
            .ok_or_else(|| PopupError::BuildGuard { id: id.to_owned() })
    }

    /// Build every registered overlay concurrently, then run one script pass
    /// and initialize blocks for the new containers. Failures are logged per
    /// overlay. Returns the number of overlays built by this call.
    pub async fn build_all(&self) -> usize {
        let ids = self.inner.state.lock().registry.ids();
        let results = join_all(ids.iter().map(|id| self.build(id))).await;

        let mut fresh = Vec::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(true) => fresh.push(id),
                Ok(false) => {}
                Err(err) => log!("error"; "{err}"),
            }
        }

        self.script_pass(&fresh).await;
        for id in &fresh {
            if let Some(snapshot) = self.snapshot(id) {
                self.inner.host.initialize_blocks(&snapshot);
            }
        }
        fresh.len()
    }

    /// Acquire content once and mount the container. Returns `true` when
    /// this call mounted it.
    pub(crate) async fn build(&self, id: &str) -> Result<bool, PopupError> {
        let (cell, source) = {
            let state = self.inner.state.lock();
            let overlay = state
                .registry
                .get(id)
                .ok_or_else(|| PopupError::BuildGuard { id: id.to_owned() })?;
            if overlay.instance.built() {
                return Ok(false);
            }
            (overlay.definition.content_cell(), overlay.definition.source.clone())
        };

        let content = cell
            .get_or_init(|| async {
                match &source {
                    OverlaySource::Inline(html) => html.clone(),
                    OverlaySource::Remote { path, region } => {
                        self.inner.fetcher.fetch_or_placeholder(path, region).await
                    }
                }
            })
            .await
            .clone();

        // No suspension point from here on.
        let mut state = self.inner.state.lock();
        let State { page, registry, .. } = &mut *state;
        let overlay = registry
            .get_mut(id)
            .ok_or_else(|| PopupError::BuildGuard { id: id.to_owned() })?;
        if overlay.instance.built() {
            return Ok(false);
        }

        let mount_point = builder::resolve_mount_point(page, &self.inner.selectors.mount)
            .ok_or_else(|| PopupError::MountMissing {
                selector: self.inner.config.content.mount.clone(),
            })?;
        let mounted = builder::mount(page, mount_point, id, &content)?;

        let instance = &mut overlay.instance;
        instance.container = Some(mounted.container);
        instance.slot = Some(mounted.slot);
        instance.animation = if self.inner.config.behavior.entrance_animation {
            builder::resolve_animation(page, mounted.container)
        } else {
            Default::default()
        };
        log!("build"; "{id} mounted ({:?})", instance.animation);
        Ok(true)
    }

    /// Run scripts found in the containers of `ids`, plus the site bundle
    /// when one of them needs it. Scripts that already ran are skipped, and
    /// scripts still loading for another pass are waited for.
    pub(crate) async fn script_pass(&self, ids: &[String]) -> BatchReport {
        if ids.is_empty() {
            return BatchReport::default();
        }
        let batch = {
            let state = self.inner.state.lock();
            let page = &state.page;
            let containers: Vec<NodeId> = ids
                .iter()
                .filter_map(|id| state.registry.get(id)?.instance.container())
                .collect();

            let mut batch = scripts::collect(page, &containers);
            if let Some(bundle) = &self.inner.selectors.bundle
                && containers.iter().any(|&c| {
                    self.inner
                        .selectors
                        .bundle_when
                        .iter()
                        .any(|s| page.query(c, s).is_some())
                })
                && let Some(script) = page
                    .query(page.root(), bundle)
                    .and_then(|node| ScriptRef::from_element(page, node))
            {
                batch.push(script);
            }
            batch
        };

        let report = self
            .inner
            .scripts
            .run_batch(self.inner.host.as_ref(), &batch)
            .await;
        if report.ran + report.failed > 0 {
            log!("script"; "ran {}, failed {}, skipped {}", report.ran, report.failed, report.skipped);
        }
        report
    }

    /// Move the first match of `selector` inside overlay `id` into its
    /// single-item slot. `false` when `id` is not built or nothing matches.
    pub fn relocate(&self, id: &str, selector: &Selector) -> bool {
        let mut state = self.inner.state.lock();
        let State { page, registry, .. } = &mut *state;
        registry
            .get_mut(id)
            .is_some_and(|o| relocate::relocate(page, &mut o.instance, selector))
    }

    /// Put the node relocated into overlay `id` back in place.
    pub fn restore(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock();
        let State { page, registry, .. } = &mut *state;
        registry
            .get_mut(id)
            .is_some_and(|o| relocate::restore(page, &mut o.instance))
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Subscribe to lifecycle events.
    pub fn on(&self, listener: impl Fn(&PopupEvent) + Send + Sync + 'static) {
        self.inner.events.subscribe(Arc::new(listener));
    }

    pub fn config(&self) -> &PopupConfig {
        &self.inner.config
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.state.lock().registry.contains(id)
    }

    /// Registered overlay ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.inner.state.lock().registry.ids()
    }

    pub fn state_of(&self, id: &str) -> Option<LifecycleState> {
        let state = self.inner.state.lock();
        state.registry.get(id).map(|o| o.instance.state())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        let state = self.inner.state.lock();
        state.registry.get(id).is_some_and(|o| o.definition.loaded())
    }

    /// Id of the overlay holding the active slot (open, opening or closing).
    pub fn active(&self) -> Option<String> {
        self.inner.state.lock().active.as_ref().map(|a| a.id.clone())
    }

    pub fn snapshot(&self, id: &str) -> Option<OverlaySnapshot> {
        self.inner.state.lock().snapshot(id)
    }

    /// Element that currently has focus, as far as the engine knows.
    pub fn focused(&self) -> Option<NodeId> {
        self.inner.state.lock().focused
    }

    /// Record that the page moved focus to `node`.
    pub fn set_focused(&self, node: Option<NodeId>) {
        self.inner.state.lock().focused = node;
    }

    /// Read the page.
    pub fn with_page<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.inner.state.lock().page)
    }

    /// Mutate the page, e.g. to insert markup with new triggers before
    /// calling [`Popups::render`].
    pub fn with_page_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.inner.state.lock().page)
    }
}

/// Overlay reference of a trigger candidate: a `data-popup` attribute, else
/// an `href` carrying a configured marker.
fn trigger_reference(page: &Document, node: NodeId, prefixes: &[String]) -> Option<OverlayRef> {
    if let Some(value) = page.attr(node, ATTR_ID) {
        let mut reference = trigger::parse_reference(value)?;
        if let Some(target) = page.attr(node, ATTR_TARGET) {
            reference.target = Some(target.to_owned());
        }
        reference.autoplay |= page.has_attr(node, ATTR_AUTOPLAY);
        return Some(reference);
    }

    let href = page.attr(node, "href")?;
    let value = trigger::reference_in(href, prefixes)?;
    let reference = trigger::parse_reference(value);
    if reference.is_none() {
        log!("trigger"; "ignoring `{href}`: no overlay path");
    }
    reference
}
