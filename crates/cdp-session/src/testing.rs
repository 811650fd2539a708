//! In-memory scripted driver for exercising flows without a browser.
//!
//! Pages are trees of [`FakeNode`]s registered under a name. URLs route to
//! pages, clicks on ids can transition to other pages, and every interaction
//! is recorded as a [`DriverEvent`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::DriverConfig;
use crate::driver::{Driver, Launcher, Selector};
use crate::error::{DriverError, DriverErrorKind};

/// Declarative DOM node.
#[derive(Clone, Debug)]
pub struct FakeNode {
    pub tag: String,
    pub id: Option<String>,
    pub text: String,
    pub attrs: BTreeMap<String, String>,
    pub displayed: bool,
    pub enabled: bool,
    pub children: Vec<FakeNode>,
}

impl FakeNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            id: None,
            text: String::new(),
            attrs: BTreeMap::new(),
            displayed: true,
            enabled: true,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn child(mut self, child: FakeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = FakeNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn input(id: impl Into<String>) -> Self {
        FakeNode::new("input")
            .with_id(id)
            .with_attr("type", "text")
    }

    pub fn button(id: impl Into<String>, label: impl Into<String>) -> Self {
        FakeNode::new("button").with_id(id).with_text(label)
    }

    pub fn link(href: impl Into<String>) -> Self {
        FakeNode::new("a").with_attr("href", href)
    }

    /// `<select>` with `(value, label)` options.
    pub fn select(id: impl Into<String>, options: &[(&str, &str)]) -> Self {
        FakeNode::new("select").with_id(id).children(
            options
                .iter()
                .map(|(value, label)| FakeNode::new("option").with_attr("value", *value).with_text(*label)),
        )
    }

    pub fn cell(text: impl Into<String>) -> Self {
        FakeNode::new("td").with_text(text)
    }

    pub fn row(cells: impl IntoIterator<Item = FakeNode>) -> Self {
        FakeNode::new("tr").children(cells)
    }

    pub fn table(rows: impl IntoIterator<Item = FakeNode>) -> Self {
        FakeNode::new("table").children(rows)
    }

    fn label(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.tag.clone())
    }
}

/// Interaction recorded by [`ScriptedDriver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverEvent {
    Navigate(String),
    Click(String),
    Clear(String),
    Type { target: String, text: String },
    Select { target: String, value: String },
    Scroll(String),
    Screenshot,
    PageSource,
    Quit,
}

/// Handle into the currently loaded page. Goes stale when the page changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptedElement {
    generation: u64,
    index: usize,
}

#[derive(Clone, Debug)]
struct LiveNode {
    node: FakeNode,
    parent: Option<usize>,
}

struct LookupFailure {
    selector: Selector,
    remaining: usize,
}

#[derive(Default)]
struct ScriptState {
    pages: HashMap<String, FakeNode>,
    routes: HashMap<String, String>,
    transitions: HashMap<(String, String), String>,
    current: Option<String>,
    live: Vec<LiveNode>,
    generation: u64,
    events: Vec<DriverEvent>,
    nav_failures: VecDeque<DriverError>,
    click_failures: HashMap<String, DriverError>,
    probe_failures: HashSet<String>,
    lookup_failures: Vec<LookupFailure>,
    quit_count: usize,
    dropped_handles: usize,
}

impl ScriptState {
    /// Counts one lookup for `selector` and fails it once its quota is spent.
    fn check_lookup(&mut self, selector: &Selector) -> Result<(), DriverError> {
        let Some(pos) = self
            .lookup_failures
            .iter()
            .position(|failure| &failure.selector == selector)
        else {
            return Ok(());
        };
        let failure = &mut self.lookup_failures[pos];
        if failure.remaining > 0 {
            failure.remaining -= 1;
            return Ok(());
        }
        self.lookup_failures.remove(pos);
        Err(DriverError::new(DriverErrorKind::CdpIo)
            .with_hint(format!("lookup {selector} failed"))
            .retriable(true))
    }

    fn load(&mut self, page: &str) -> Result<(), DriverError> {
        let root = self.pages.get(page).cloned().ok_or_else(|| {
            DriverError::new(DriverErrorKind::Navigation).with_hint(format!("unknown page {page}"))
        })?;
        let mut live = Vec::new();
        flatten(root, None, &mut live);
        self.live = live;
        self.generation += 1;
        self.current = Some(page.to_string());
        Ok(())
    }

    fn node(&self, element: &ScriptedElement) -> Result<&FakeNode, DriverError> {
        if element.generation != self.generation {
            return Err(DriverError::new(DriverErrorKind::StaleElement)
                .with_hint("element belongs to a previous page"));
        }
        self.live
            .get(element.index)
            .map(|live| &live.node)
            .ok_or_else(|| DriverError::new(DriverErrorKind::StaleElement))
    }

    fn node_mut(&mut self, element: &ScriptedElement) -> Result<&mut FakeNode, DriverError> {
        self.node(element)?;
        Ok(&mut self.live[element.index].node)
    }

    fn is_descendant(&self, mut index: usize, ancestor: usize) -> bool {
        while let Some(parent) = self.live[index].parent {
            if parent == ancestor {
                return true;
            }
            index = parent;
        }
        false
    }

    fn matching(&self, selector: &Selector, within: Option<usize>) -> Vec<ScriptedElement> {
        self.live
            .iter()
            .enumerate()
            .filter(|(index, _)| match within {
                Some(parent) => self.is_descendant(*index, parent),
                None => true,
            })
            .filter(|(_, live)| matches(selector, &live.node))
            .map(|(index, _)| ScriptedElement {
                generation: self.generation,
                index,
            })
            .collect()
    }

    fn text_of(&self, index: usize) -> String {
        let mut parts = Vec::new();
        let own = self.live[index].node.text.trim();
        if !own.is_empty() {
            parts.push(own.to_string());
        }
        for (child, _) in self
            .live
            .iter()
            .enumerate()
            .filter(|(child, live)| live.parent == Some(index) && *child != index)
        {
            let text = self.text_of(child);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join("\n")
    }

    fn displayed(&self, index: usize) -> bool {
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            if !self.live[current].node.displayed {
                return false;
            }
            cursor = self.live[current].parent;
        }
        true
    }
}

fn flatten(mut node: FakeNode, parent: Option<usize>, out: &mut Vec<LiveNode>) {
    let children = std::mem::take(&mut node.children);
    let index = out.len();
    out.push(LiveNode { node, parent });
    for child in children {
        flatten(child, Some(index), out);
    }
}

fn matches(selector: &Selector, node: &FakeNode) -> bool {
    match selector {
        Selector::Id(id) => node.id.as_deref() == Some(id.as_str()),
        Selector::Tag(tag) => node.tag.eq_ignore_ascii_case(tag),
        Selector::Css(css) => css_matches(css, node),
    }
}

/// Supports `tag`, `*`, `#id`, `[attr]`, `[attr=value]` and `tag[attr='value']`.
fn css_matches(css: &str, node: &FakeNode) -> bool {
    let css = css.trim();
    if let Some(id) = css.strip_prefix('#') {
        return node.id.as_deref() == Some(id);
    }
    let (tag, filter) = match css.find('[') {
        Some(pos) => (&css[..pos], Some(css[pos + 1..].trim_end_matches(']'))),
        None => (css, None),
    };
    if !tag.is_empty() && tag != "*" && !node.tag.eq_ignore_ascii_case(tag) {
        return false;
    }
    let Some(filter) = filter else {
        return true;
    };
    let (name, expected) = match filter.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim().trim_matches(['"', '\'']))),
        None => (filter.trim(), None),
    };
    let actual = match name {
        "id" => node.id.clone(),
        other => node.attrs.get(other).cloned(),
    };
    match (actual, expected) {
        (Some(actual), Some(expected)) => actual == expected,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Scripted [`Driver`]. Clones share state, so a test can keep one clone for
/// assertions while the session owns another.
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
    session_handle: bool,
}

impl Clone for ScriptedDriver {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            session_handle: false,
        }
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScriptedDriver {
    fn drop(&mut self) {
        if self.session_handle {
            self.state.lock().dropped_handles += 1;
        }
    }
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
            session_handle: false,
        }
    }

    /// Clone whose drop counts as the browser being released.
    pub fn session_handle(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            session_handle: true,
        }
    }

    pub fn page(self, name: impl Into<String>, root: FakeNode) -> Self {
        self.state.lock().pages.insert(name.into(), root);
        self
    }

    pub fn route(self, url: impl Into<String>, page: impl Into<String>) -> Self {
        self.state.lock().routes.insert(url.into(), page.into());
        self
    }

    /// Clicking element `id` while on `from` loads page `to`.
    pub fn on_click(self, from: impl Into<String>, id: impl Into<String>, to: impl Into<String>) -> Self {
        self.state
            .lock()
            .transitions
            .insert((from.into(), id.into()), to.into());
        self
    }

    pub fn fail_next_navigation(self, err: DriverError) -> Self {
        self.state.lock().nav_failures.push_back(err);
        self
    }

    pub fn fail_click(self, id: impl Into<String>, err: DriverError) -> Self {
        self.state.lock().click_failures.insert(id.into(), err);
        self
    }

    /// Visibility probes on `id` fail with a transport error.
    pub fn fail_probe(self, id: impl Into<String>) -> Self {
        self.state.lock().probe_failures.insert(id.into());
        self
    }

    /// Lookups with `selector` succeed `after` times, then the next one
    /// fails once with a transport error.
    pub fn fail_lookup(self, selector: Selector, after: usize) -> Self {
        self.state.lock().lookup_failures.push(LookupFailure {
            selector,
            remaining: after,
        });
        self
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.state.lock().events.clone()
    }

    pub fn current_page(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    /// Current value of the element `id` on the loaded page.
    pub fn value_of(&self, id: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .live
            .iter()
            .find(|live| live.node.id.as_deref() == Some(id))
            .and_then(|live| live.node.attrs.get("value").cloned())
    }

    pub fn quit_count(&self) -> usize {
        self.state.lock().quit_count
    }

    pub fn released(&self) -> bool {
        let state = self.state.lock();
        state.quit_count > 0 || state.dropped_handles > 0
    }

    fn record(&self, event: DriverEvent) {
        self.state.lock().events.push(event);
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    type Element = ScriptedElement;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.events.push(DriverEvent::Navigate(url.to_string()));
        if let Some(err) = state.nav_failures.pop_front() {
            return Err(err);
        }
        let page = state.routes.get(url).cloned().ok_or_else(|| {
            DriverError::new(DriverErrorKind::Navigation).with_hint(format!("no route for {url}"))
        })?;
        state.load(&page)
    }

    async fn find(&self, selector: &Selector) -> Result<Option<ScriptedElement>, DriverError> {
        let mut state = self.state.lock();
        state.check_lookup(selector)?;
        Ok(state.matching(selector, None).into_iter().next())
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<ScriptedElement>, DriverError> {
        let mut state = self.state.lock();
        state.check_lookup(selector)?;
        Ok(state.matching(selector, None))
    }

    async fn find_within(
        &self,
        parent: &ScriptedElement,
        selector: &Selector,
    ) -> Result<Vec<ScriptedElement>, DriverError> {
        let mut state = self.state.lock();
        state.node(parent)?;
        state.check_lookup(selector)?;
        Ok(state.matching(selector, Some(parent.index)))
    }

    async fn click(&self, element: &ScriptedElement) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let node = state.node(element)?;
        let label = node.label();
        let id = node.id.clone();
        state.events.push(DriverEvent::Click(label));
        if let Some(id) = id {
            if let Some(err) = state.click_failures.get(&id) {
                return Err(err.clone());
            }
            let from = state.current.clone().unwrap_or_default();
            if let Some(next) = state.transitions.get(&(from, id)).cloned() {
                state.load(&next)?;
            }
        }
        Ok(())
    }

    async fn clear(&self, element: &ScriptedElement) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let node = state.node_mut(element)?;
        node.attrs.insert("value".to_string(), String::new());
        let label = node.label();
        state.events.push(DriverEvent::Clear(label));
        Ok(())
    }

    async fn type_text(&self, element: &ScriptedElement, text: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let node = state.node_mut(element)?;
        node.attrs.entry("value".to_string()).or_default().push_str(text);
        let target = node.label();
        state.events.push(DriverEvent::Type {
            target,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn select_option(&self, element: &ScriptedElement, value: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let known = state
            .matching(&Selector::tag("option"), Some(element.index))
            .iter()
            .any(|option| {
                state
                    .node(option)
                    .map(|node| node.attrs.get("value").map(String::as_str) == Some(value))
                    .unwrap_or(false)
            });
        let node = state.node_mut(element)?;
        if !known {
            return Err(DriverError::new(DriverErrorKind::OptionNotFound)
                .with_hint(format!("no option with value {value}")));
        }
        node.attrs.insert("value".to_string(), value.to_string());
        let target = node.label();
        state.events.push(DriverEvent::Select {
            target,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ScriptedElement) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let label = state.node(element)?.label();
        state.events.push(DriverEvent::Scroll(label));
        Ok(())
    }

    async fn text(&self, element: &ScriptedElement) -> Result<String, DriverError> {
        let state = self.state.lock();
        state.node(element)?;
        Ok(state.text_of(element.index).trim().to_string())
    }

    async fn attribute(&self, element: &ScriptedElement, name: &str) -> Result<Option<String>, DriverError> {
        let state = self.state.lock();
        let node = state.node(element)?;
        Ok(match name {
            "id" => node.id.clone(),
            other => node.attrs.get(other).cloned(),
        })
    }

    async fn is_displayed(&self, element: &ScriptedElement) -> Result<bool, DriverError> {
        let state = self.state.lock();
        let node = state.node(element)?;
        if let Some(id) = &node.id {
            if state.probe_failures.contains(id) {
                return Err(DriverError::new(DriverErrorKind::CdpIo)
                    .with_hint(format!("probe failed for {id}")));
            }
        }
        let hidden_input = node.tag == "input" && node.attrs.get("type").map(String::as_str) == Some("hidden");
        Ok(!hidden_input && state.displayed(element.index))
    }

    async fn is_enabled(&self, element: &ScriptedElement) -> Result<bool, DriverError> {
        Ok(self.state.lock().node(element)?.enabled)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.record(DriverEvent::Screenshot);
        Ok(b"\x89PNG\r\n\x1a\nscripted".to_vec())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.record(DriverEvent::PageSource);
        let page = self.current_page().unwrap_or_default();
        Ok(format!("<html data-page=\"{page}\"></html>"))
    }

    async fn quit(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.events.push(DriverEvent::Quit);
        state.quit_count += 1;
        Ok(())
    }
}

/// Launcher that hands out session handles of one [`ScriptedDriver`].
#[derive(Clone)]
pub struct ScriptedLauncher {
    driver: ScriptedDriver,
    failure: Option<DriverError>,
    configs: Arc<Mutex<Vec<DriverConfig>>>,
}

impl ScriptedLauncher {
    pub fn new(driver: &ScriptedDriver) -> Self {
        Self {
            driver: driver.clone(),
            failure: None,
            configs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(err: DriverError) -> Self {
        Self {
            driver: ScriptedDriver::new(),
            failure: Some(err),
            configs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn launches(&self) -> Vec<DriverConfig> {
        self.configs.lock().clone()
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    type Driver = ScriptedDriver;

    async fn launch(&self, config: &DriverConfig) -> Result<ScriptedDriver, DriverError> {
        self.configs.lock().push(config.clone());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self.driver.session_handle())
    }
}
