//! In-memory document model standing in for a real browser in tests.

use std::collections::HashMap;
use std::time::Duration;

use super::query::Condition;
use super::{Browser, ClickStyle, DriverError, ElementId, ElementQuery};

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub key: String,
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub parent: Option<usize>,
    /// Number of matching queries that still skip this node.
    pub hidden_for: u32,
    /// Dropped on the next navigation.
    pub ephemeral: bool,
    pub removed: bool,
}

impl FakeNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
pub struct FakePage {
    nodes: Vec<FakeNode>,
    pub url: String,
    pub values: HashMap<String, String>,
    pub clicks: Vec<String>,
    pub navigations: Vec<String>,
    pub session_lost: bool,
}

type Hook = Box<dyn FnMut(&mut FakePage)>;

pub struct FakeBrowser {
    pub page: FakePage,
    click_hooks: HashMap<String, Vec<Hook>>,
    navigate_hooks: Vec<Hook>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn into_browser(self) -> FakeBrowser {
        FakeBrowser {
            page: self,
            click_hooks: HashMap::new(),
            navigate_hooks: Vec::new(),
        }
    }

    /// Append a node and return its index.
    pub fn add(
        &mut self,
        parent: Option<usize>,
        key: &str,
        tag: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> usize {
        self.nodes.push(FakeNode {
            key: key.to_string(),
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            text: text.to_string(),
            parent,
            hidden_for: 0,
            ephemeral: false,
            removed: false,
        });
        self.nodes.len() - 1
    }

    /// Like [`add`](Self::add), but the node disappears on the next navigation.
    pub fn add_ephemeral(
        &mut self,
        parent: Option<usize>,
        key: &str,
        tag: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> usize {
        let idx = self.add(parent, key, tag, attrs, text);
        self.nodes[idx].ephemeral = true;
        idx
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.key == key && !n.removed)
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut FakeNode> {
        self.nodes.iter_mut().find(|n| n.key == key && !n.removed)
    }

    /// Hide a node from the next `queries` lookups that would match it.
    pub fn hide(&mut self, key: &str, queries: u32) {
        if let Some(node) = self.node_mut(key) {
            node.hidden_for = queries;
        }
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(node) = self.node_mut(key) {
            node.removed = true;
        }
    }

    /// Drop every node, as a full page reload would.
    pub fn clear(&mut self) {
        for node in self.nodes.iter_mut() {
            node.removed = true;
        }
    }

    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn clicked(&self, key: &str) -> bool {
        self.clicks.iter().any(|k| k == key)
    }

    pub fn key_of(&self, element: &ElementId) -> Option<&str> {
        self.resolve(element).map(|idx| self.nodes[idx].key.as_str())
    }

    fn resolve(&self, element: &ElementId) -> Option<usize> {
        let idx: usize = element.0.strip_prefix('n')?.parse().ok()?;
        self.alive(idx).then_some(idx)
    }

    fn alive(&self, idx: usize) -> bool {
        let mut current = Some(idx);
        while let Some(i) = current {
            if self.nodes[i].removed {
                return false;
            }
            current = self.nodes[i].parent;
        }
        true
    }

    fn string_value(&self, idx: usize) -> String {
        let mut out = self.nodes[idx].text.clone();
        for (child, node) in self.nodes.iter().enumerate() {
            if node.parent == Some(idx) && !node.removed {
                out.push(' ');
                out.push_str(&self.string_value(child));
            }
        }
        out
    }

    fn matches(&self, idx: usize, query: &ElementQuery) -> bool {
        let node = &self.nodes[idx];
        if let Some(tag) = &query.tag
            && *tag != node.tag
        {
            return false;
        }
        let conditions_hold = query.conditions.iter().all(|c| match c {
            Condition::AttrEquals { name, value } => node.attr(name) == Some(value.as_str()),
            Condition::AttrContains { name, fragment } => node
                .attr(name)
                .is_some_and(|v| v.contains(fragment.as_str())),
            Condition::TextContains(text) => self.string_value(idx).contains(text.as_str()),
            Condition::OwnTextContains(text) => node.text.contains(text.as_str()),
        });
        if !conditions_hold {
            return false;
        }
        match &query.ancestor {
            None => true,
            Some(ancestor) => {
                let mut current = node.parent;
                while let Some(p) = current {
                    if self.matches(p, ancestor) {
                        return true;
                    }
                    current = self.nodes[p].parent;
                }
                false
            }
        }
    }

    fn query(&mut self, query: &ElementQuery) -> Vec<ElementId> {
        let matched: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.alive(i) && self.matches(i, query))
            .collect();
        let mut visible = Vec::new();
        for idx in matched {
            let node = &mut self.nodes[idx];
            if node.hidden_for > 0 {
                node.hidden_for -= 1;
            } else {
                visible.push(ElementId(format!("n{idx}")));
            }
        }
        visible
    }
}

impl FakeBrowser {
    /// Run `hook` every time the node with `key` is clicked.
    pub fn on_click(&mut self, key: &str, hook: impl FnMut(&mut FakePage) + 'static) {
        self.click_hooks
            .entry(key.to_string())
            .or_default()
            .push(Box::new(hook));
    }

    /// Run `hook` after every navigation.
    pub fn on_navigate(&mut self, hook: impl FnMut(&mut FakePage) + 'static) {
        self.navigate_hooks.push(Box::new(hook));
    }

    fn check_session(&self) -> Result<(), DriverError> {
        if self.page.session_lost {
            return Err(DriverError::SessionLost("invalid session id".into()));
        }
        Ok(())
    }

    fn live(&self, element: &ElementId) -> Result<usize, DriverError> {
        self.page
            .resolve(element)
            .ok_or_else(|| DriverError::StaleElement(element.0.clone()))
    }
}

impl Browser for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.check_session()?;
        self.page.url = url.to_string();
        self.page.navigations.push(url.to_string());
        for node in self.page.nodes.iter_mut().filter(|n| n.ephemeral) {
            node.removed = true;
        }
        for hook in self.navigate_hooks.iter_mut() {
            hook(&mut self.page);
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.check_session()?;
        Ok(self.page.url.clone())
    }

    async fn find_all(&mut self, query: &ElementQuery) -> Result<Vec<ElementId>, DriverError> {
        self.check_session()?;
        Ok(self.page.query(query))
    }

    async fn text(&mut self, element: &ElementId) -> Result<String, DriverError> {
        self.check_session()?;
        let idx = self.live(element)?;
        Ok(self
            .page
            .string_value(idx)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.check_session()?;
        let idx = self.live(element)?;
        Ok(self.page.nodes[idx].attr(name).map(str::to_string))
    }

    async fn click(&mut self, element: &ElementId, _style: ClickStyle) -> Result<(), DriverError> {
        self.check_session()?;
        let idx = self.live(element)?;
        let key = self.page.nodes[idx].key.clone();
        self.page.clicks.push(key.clone());
        if let Some(mut hooks) = self.click_hooks.remove(&key) {
            for hook in hooks.iter_mut() {
                hook(&mut self.page);
            }
            self.click_hooks.insert(key, hooks);
        }
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError> {
        self.check_session()?;
        let idx = self.live(element)?;
        let key = self.page.nodes[idx].key.clone();
        self.page.values.insert(key, text.to_string());
        Ok(())
    }

    async fn page_excerpt(&mut self, max_chars: usize) -> Result<String, DriverError> {
        self.check_session()?;
        let roots: Vec<usize> = (0..self.page.nodes.len())
            .filter(|&i| self.page.nodes[i].parent.is_none() && !self.page.nodes[i].removed)
            .collect();
        let text: Vec<String> = roots.iter().map(|&i| self.page.string_value(i)).collect();
        Ok(text.join(" ").chars().take(max_chars).collect())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.check_session()?;
        Ok(b"\x89PNG fake".to_vec())
    }
}

/// A [`FakeBrowser`] whose lookups each take `delay`, like a slow driver.
pub struct SlowBrowser {
    pub inner: FakeBrowser,
    delay: Duration,
}

impl SlowBrowser {
    pub fn new(inner: FakeBrowser, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl Browser for SlowBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.inner.navigate(url).await
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        self.inner.current_url().await
    }

    async fn find_all(&mut self, query: &ElementQuery) -> Result<Vec<ElementId>, DriverError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_all(query).await
    }

    async fn text(&mut self, element: &ElementId) -> Result<String, DriverError> {
        tokio::time::sleep(self.delay).await;
        self.inner.text(element).await
    }

    async fn attribute(
        &mut self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.inner.attribute(element, name).await
    }

    async fn click(&mut self, element: &ElementId, style: ClickStyle) -> Result<(), DriverError> {
        self.inner.click(element, style).await
    }

    async fn type_text(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError> {
        self.inner.type_text(element, text).await
    }

    async fn page_excerpt(&mut self, max_chars: usize) -> Result<String, DriverError> {
        self.inner.page_excerpt(max_chars).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.inner.screenshot().await
    }
}
