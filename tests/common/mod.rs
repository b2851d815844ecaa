#![allow(dead_code)]
//! Scripted in-memory browser driver for exercising the automation core
//! without a real browser.
//!
//! Pages are declared up front as element lists; a small CSS-subset matcher
//! (tag, `#id`, `.class`, `[attr]`, `[attr='v']`, `[attr*='v']`, comma
//! lists) answers the driver's selector queries against them. Navigation,
//! clicks, fills, and uploads are recorded for assertions, and failures can
//! be injected per URL or per selector.

use apply_pilot::browser::{BrowserDriver, DriverError, ElementInfo};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub enum DriverAction {
    Goto(String),
    Click(String),
    Fill { selector: String, value: String },
    Upload { selector: String, path: String },
    Check(String),
    SelectLabel { selector: String, label: String },
    SelectValue { selector: String, value: String },
    Screenshot,
}

#[derive(Debug, Clone)]
pub struct MockElement {
    pub info: ElementInfo,
    pub visible: bool,
    /// `(label, value)` pairs for select elements.
    pub options: Vec<(String, String)>,
}

impl MockElement {
    pub fn new(tag: &str, attrs: &[(&str, &str)], text: &str) -> Self {
        Self {
            info: ElementInfo {
                tag: tag.to_string(),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text: text.to_string(),
            },
            visible: true,
            options: Vec::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(l, v)| (l.to_string(), v.to_string()))
            .collect();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub elements: Vec<MockElement>,
    /// Selector → URL the page "navigates" to when that selector is clicked.
    pub click_goes_to: HashMap<String, String>,
}

impl MockPage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: format!("Mock page {}", url),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn body_text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn input(self, attrs: &[(&str, &str)]) -> Self {
        self.element(MockElement::new("input", attrs, ""))
    }

    pub fn label_for(self, id: &str, text: &str) -> Self {
        self.element(MockElement::new("label", &[("for", id)], text))
    }

    pub fn click_navigates(mut self, selector: &str, url: &str) -> Self {
        self.click_goes_to
            .insert(selector.to_string(), url.to_string());
        self
    }
}

// ── CSS-subset matcher ──────────────────────────────────────────────────────

#[derive(Debug)]
enum AttrTest {
    Present(String),
    Equals(String, String),
    Contains(String, String),
}

#[derive(Debug, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

fn parse_simple(piece: &str) -> Option<SimpleSelector> {
    let piece = piece.trim();
    if piece.is_empty() {
        return None;
    }
    let mut sel = SimpleSelector::default();
    let mut chars = piece.chars().peekable();
    let mut tag = String::new();
    while let Some(&c) = chars.peek() {
        if c == '#' || c == '.' || c == '[' {
            break;
        }
        tag.push(c);
        chars.next();
    }
    if !tag.is_empty() {
        sel.tag = Some(tag);
    }
    while let Some(c) = chars.next() {
        match c {
            '#' | '.' => {
                let mut word = String::new();
                while let Some(&n) = chars.peek() {
                    if n == '#' || n == '.' || n == '[' {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                if c == '#' {
                    sel.id = Some(word);
                } else {
                    sel.classes.push(word);
                }
            }
            '[' => {
                let mut inner = String::new();
                for n in chars.by_ref() {
                    if n == ']' {
                        break;
                    }
                    inner.push(n);
                }
                let test = if let Some((name, value)) = inner.split_once("*=") {
                    AttrTest::Contains(name.to_string(), unquote(value))
                } else if let Some((name, value)) = inner.split_once('=') {
                    AttrTest::Equals(name.to_string(), unquote(value))
                } else {
                    AttrTest::Present(inner)
                };
                sel.attrs.push(test);
            }
            _ => return None,
        }
    }
    Some(sel)
}

fn unquote(value: &str) -> String {
    value.trim_matches(|c| c == '\'' || c == '"').to_string()
}

fn element_matches(info: &ElementInfo, selector: &str) -> bool {
    selector.split(',').any(|piece| {
        let Some(sel) = parse_simple(piece) else {
            return false;
        };
        if let Some(tag) = &sel.tag {
            if &info.tag != tag {
                return false;
            }
        }
        if let Some(id) = &sel.id {
            if info.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        for class in &sel.classes {
            let has = info
                .attr("class")
                .map(|c| c.split_whitespace().any(|x| x == class))
                .unwrap_or(false);
            if !has {
                return false;
            }
        }
        for test in &sel.attrs {
            let ok = match test {
                AttrTest::Present(name) => info.attrs.contains_key(name),
                AttrTest::Equals(name, value) => info.attr(name) == Some(value.as_str()),
                AttrTest::Contains(name, value) => {
                    info.attr(name).map(|v| v.contains(value)).unwrap_or(false)
                }
            };
            if !ok {
                return false;
            }
        }
        true
    })
}

// ── The driver ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDriver {
    pages: Mutex<HashMap<String, MockPage>>,
    current: Mutex<Option<String>>,
    fail_navigation: Mutex<HashSet<String>>,
    fail_fill: Mutex<HashSet<String>>,
    checked: Mutex<HashMap<String, bool>>,
    actions: Mutex<Vec<DriverAction>>,
    nav_gate: Option<Arc<Semaphore>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `goto` blocks until a permit is added to the returned gate;
    /// lets tests hold the loop mid-job deterministically.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let driver = Self {
            nav_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        (driver, gate)
    }

    pub fn with_page(self, page: MockPage) -> Self {
        self.pages.lock().unwrap().insert(page.url.clone(), page);
        self
    }

    pub fn fail_navigation(self, url: &str) -> Self {
        self.fail_navigation.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn fail_fill(self, selector: &str) -> Self {
        self.fail_fill.lock().unwrap().insert(selector.to_string());
        self
    }

    pub fn actions(&self) -> Vec<DriverAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn navigated_urls(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                DriverAction::Goto(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: DriverAction) {
        self.actions.lock().unwrap().push(action);
    }

    fn current_page(&self) -> Result<MockPage, DriverError> {
        let current = self.current.lock().unwrap().clone();
        let url = current.ok_or_else(|| DriverError::Navigation("no page loaded".into()))?;
        self.pages
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| DriverError::Navigation(format!("no mock page for {}", url)))
    }

    fn first_match(&self, selector: &str) -> Result<Option<(usize, MockElement)>, DriverError> {
        let page = self.current_page()?;
        Ok(page
            .elements
            .iter()
            .enumerate()
            .find(|(_, el)| element_matches(&el.info, selector))
            .map(|(i, el)| (i, el.clone())))
    }

    fn check_key(&self, index: usize) -> String {
        let current = self.current.lock().unwrap().clone().unwrap_or_default();
        format!("{}#{}", current, index)
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        // Record before blocking on the gate so tests can observe that a
        // navigation is in flight.
        self.record(DriverAction::Goto(url.to_string()));
        if let Some(gate) = &self.nav_gate {
            gate.acquire()
                .await
                .map_err(|_| DriverError::Unavailable("gate closed".into()))?
                .forget();
        }
        if self.fail_navigation.lock().unwrap().contains(url) {
            return Err(DriverError::Navigation(format!("net::ERR_FAILED {}", url)));
        }
        if !self.pages.lock().unwrap().contains_key(url) {
            // Unknown URLs land on an empty page rather than erroring, the
            // way a real browser would render *something*.
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), MockPage::new(url));
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DriverError::Navigation("no page loaded".into()))
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.current_page()?.title)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementInfo>, DriverError> {
        let page = self.current_page()?;
        Ok(page
            .elements
            .iter()
            .filter(|el| element_matches(&el.info, selector))
            .map(|el| el.info.clone())
            .collect())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self
            .first_match(selector)?
            .map(|(_, el)| el.visible)
            .unwrap_or(false))
    }

    async fn text_content(&self, selector: &str) -> Result<String, DriverError> {
        match self.first_match(selector)? {
            Some((_, el)) => Ok(el.info.text),
            None => Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            }),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let page = self.current_page()?;
        self.record(DriverAction::Click(selector.to_string()));
        if self.first_match(selector)?.is_none() {
            return Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: "no element to click".into(),
            });
        }
        if let Some(target) = page.click_goes_to.get(selector) {
            *self.current.lock().unwrap() = Some(target.clone());
            if !self.pages.lock().unwrap().contains_key(target) {
                self.pages
                    .lock()
                    .unwrap()
                    .insert(target.clone(), MockPage::new(target));
            }
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        if self.fail_fill.lock().unwrap().contains(selector) {
            return Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: "element is not editable".into(),
            });
        }
        if self.first_match(selector)?.is_none() {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            });
        }
        self.record(DriverAction::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn set_input_files(&self, selector: &str, path: &Path) -> Result<(), DriverError> {
        if self.first_match(selector)?.is_none() {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            });
        }
        self.record(DriverAction::Upload {
            selector: selector.to_string(),
            path: path.to_string_lossy().to_string(),
        });
        Ok(())
    }

    async fn check(&self, selector: &str) -> Result<(), DriverError> {
        let Some((index, _)) = self.first_match(selector)? else {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            });
        };
        let key = self.check_key(index);
        self.checked.lock().unwrap().insert(key, true);
        self.record(DriverAction::Check(selector.to_string()));
        Ok(())
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError> {
        let Some((index, el)) = self.first_match(selector)? else {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            });
        };
        let key = self.check_key(index);
        Ok(self
            .checked
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or_else(|| el.info.attrs.contains_key("checked")))
    }

    async fn select_by_label(&self, selector: &str, label: &str) -> Result<(), DriverError> {
        let Some((_, el)) = self.first_match(selector)? else {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            });
        };
        if el.options.iter().any(|(l, _)| l == label) {
            self.record(DriverAction::SelectLabel {
                selector: selector.to_string(),
                label: label.to_string(),
            });
            Ok(())
        } else {
            Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: format!("no option with label {:?}", label),
            })
        }
    }

    async fn select_by_value(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let Some((_, el)) = self.first_match(selector)? else {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            });
        };
        if el.options.iter().any(|(_, v)| v == value) {
            self.record(DriverAction::SelectValue {
                selector: selector.to_string(),
                value: value.to_string(),
            });
            Ok(())
        } else {
            Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: format!("no option with value {:?}", value),
            })
        }
    }

    async fn wait_until_settled(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn screenshot(&self, _path: &Path) -> Result<(), DriverError> {
        self.record(DriverAction::Screenshot);
        Ok(())
    }

    async fn page_text(&self) -> Result<String, DriverError> {
        Ok(self.current_page()?.body_text)
    }
}

// ── Shared fixtures ─────────────────────────────────────────────────────────

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

pub fn sample_profile() -> apply_pilot::UserProfile {
    apply_pilot::UserProfile {
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        email: Some("ada@example.com".into()),
        phone: Some("+44 20 7946 0958".into()),
        location: Some("London, UK".into()),
        linkedin: Some("https://linkedin.com/in/ada".into()),
        portfolio: Some("https://ada.dev".into()),
    }
}
