//! In-memory element arena standing in for a window's document
//!
//! Elements are addressed by generational [`NodeId`]s. Removing an element
//! frees its slot and bumps the generation, so any id still held elsewhere
//! (exit targets, registry keys) stops resolving instead of aliasing a new
//! element.

use super::error::FocusError;
use super::geometry::Rect;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Stable identity of an element within one [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
    pub text: String,
    pub style: BTreeMap<String, String>,
    pub rect: Rect,
    /// Computed `visibility` is not `hidden`
    pub visible: bool,
    pub content_editable: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            text: String::new(),
            style: BTreeMap::new(),
            rect: Rect::default(),
            visible: true,
            content_editable: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// One window's element tree plus its active element
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    body: NodeId,
    active: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId { index: 0, generation: 0 },
            active: None,
        };
        document.body = document.create_element("body");
        document
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let element = Element::new(tag);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.element = Some(element);
            NodeId { index, generation: slot.generation }
        } else {
            self.slots.push(Slot { generation: 0, element: Some(element) });
            NodeId { index: (self.slots.len() - 1) as u32, generation: 0 }
        }
    }

    /// Create an element and append it under `parent` in one step
    pub fn create_child(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let child = self.create_element(tag);
        self.append_child(parent, child);
        child
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_live(parent) || !self.is_live(child) || self.contains(child, parent) {
            log::warn!("Refusing to append {} under {}", child, parent);
            return;
        }
        self.detach(child);
        if let Some(element) = self.element_mut(child) {
            element.parent = Some(parent);
        }
        if let Some(element) = self.element_mut(parent) {
            element.children.push(child);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.element(node).and_then(|e| e.parent);
        if let Some(parent) = parent {
            if let Some(element) = self.element_mut(parent) {
                element.children.retain(|c| *c != node);
            }
        }
        if let Some(element) = self.element_mut(node) {
            element.parent = None;
        }
    }

    /// Remove `node` and its subtree. Ids into the subtree stop resolving.
    pub fn remove(&mut self, node: NodeId) {
        if !self.is_live(node) || node == self.body {
            return;
        }
        self.detach(node);
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(element) = slot.element.take() {
                stack.extend(element.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
            }
            if self.active == Some(current) {
                self.active = None;
            }
        }
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.slots
            .get(node.index as usize)
            .map_or(false, |slot| slot.generation == node.generation && slot.element.is_some())
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        let slot = self.slots.get(node.index as usize)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.element.as_ref()
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        let slot = self.slots.get_mut(node.index as usize)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.element.as_mut()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node)?.parent
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    // Attributes and classes

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attr(name)
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.remove(name);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).map_or(false, |e| e.has_class(class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node) {
            element.classes.insert(class.to_string());
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node) {
            element.classes.remove(class);
        }
    }

    // Layout

    pub fn rect(&self, node: NodeId) -> Rect {
        self.element(node).map(|e| e.rect).unwrap_or_default()
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(element) = self.element_mut(node) {
            element.rect = rect;
        }
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(element) = self.element_mut(node) {
            element.visible = visible;
        }
    }

    /// Rendered with a non-empty box, not aria-hidden and not visibility-hidden
    pub fn is_rendered(&self, node: NodeId) -> bool {
        match self.element(node) {
            Some(element) => {
                !element.rect.is_empty() && element.attr("aria-hidden") != Some("true") && element.visible
            }
            None => false,
        }
    }

    /// Bounding box used for spatial navigation; controls wrapped in a
    /// `label` navigate by the label's box
    pub fn navigation_rect(&self, node: NodeId) -> Rect {
        match self.parent(node) {
            Some(parent) if self.tag(parent) == Some("label") => self.rect(parent),
            _ => self.rect(node),
        }
    }

    // Tree queries

    /// `ancestor` is `node` or one of its ancestors
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// `node` followed by its ancestors up to the root
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = if self.is_live(node) { Some(node) } else { None };
        while let Some(id) = current {
            chain.push(id);
            current = self.parent(id);
        }
        chain
    }

    /// Nearest of `node` and its ancestors satisfying `predicate`
    pub fn closest(&self, node: NodeId, predicate: impl Fn(&Element) -> bool) -> Option<NodeId> {
        self.ancestors(node)
            .into_iter()
            .find(|id| self.element(*id).map_or(false, |e| predicate(e)))
    }

    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        self.closest(node, |e| e.has_class(class))
    }

    /// Descendants of `root` in document order, excluding `root` itself
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.element(root) {
            Some(element) => element.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(element) = self.element(id) {
                stack.extend(element.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, FocusError> {
        let selector = Selector::parse(selector)?;
        let root = self.body;
        Ok(std::iter::once(root)
            .chain(self.descendants(root))
            .find(|id| self.matches(*id, &selector)))
    }

    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, FocusError> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .filter(|id| self.matches(*id, &selector))
            .collect())
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        match self.element(node) {
            Some(element) => selector.matches(element),
            None => false,
        }
    }

    // Focus

    pub fn active_element(&self) -> Option<NodeId> {
        self.active.filter(|id| self.is_live(*id))
    }

    /// Low-level active element update without event dispatch
    pub(crate) fn set_active(&mut self, node: Option<NodeId>) {
        self.active = node;
    }

    /// Whether `focus()` on this element would take effect
    pub fn is_focusable(&self, node: NodeId) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };
        if element.attributes.contains_key("disabled") {
            return false;
        }
        if element.attributes.contains_key("tabindex") || element.content_editable {
            return true;
        }
        match element.tag.as_str() {
            "a" => element.attributes.contains_key("href"),
            "button" | "input" | "textarea" | "select" | "details" => true,
            _ => false,
        }
    }

    /// Keyboard-focusable descendants of `container` for a loop at `level`.
    ///
    /// Elements inside a nested loop one level deeper are skipped so navigation
    /// does not fall into sub-menus.
    pub fn keyboard_focusable(&self, container: NodeId, level: Option<i64>, only_tabbable: bool) -> Vec<NodeId> {
        let nested_level = level.map(|l| (l + 1).to_string());
        self.descendants(container)
            .into_iter()
            .filter(|id| {
                let Some(element) = self.element(*id) else {
                    return false;
                };
                let candidate = match element.tag.as_str() {
                    "a" => element.attributes.contains_key("href"),
                    "button" | "input" | "textarea" | "select" | "details" => true,
                    _ => false,
                } || element.attributes.contains_key("tabindex");
                if !candidate {
                    return false;
                }
                if only_tabbable && element.attr("tabindex") == Some("-1") {
                    return false;
                }
                if let Some(nested) = &nested_level {
                    let inside_nested = self.ancestors(*id).into_iter().skip(1).any(|a| {
                        self.element(a).map_or(false, |e| {
                            e.has_class(super::MENU_LEVEL_CLASS) && e.attr(super::LEVEL_ATTR) == Some(nested.as_str())
                        })
                    });
                    if inside_nested {
                        return false;
                    }
                }
                !element.attributes.contains_key("disabled") && self.is_rendered(*id)
            })
            .collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// A single compound selector: `tag`, `#id`, `.class`, `[attr]`, `[attr=value]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &mut Peekable<CharIndices<'_>>) -> String {
    let mut ident = String::new();
    while let Some((_, c)) = chars.peek() {
        if is_ident_char(*c) {
            ident.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, FocusError> {
        let invalid = || FocusError::InvalidSelector(input.to_string());
        let text = input.trim();
        if text.is_empty() {
            return Err(invalid());
        }

        let mut selector = Selector::default();
        let mut chars = text.char_indices().peekable();

        while let Some((_, c)) = chars.peek().copied() {
            match c {
                '#' => {
                    chars.next();
                    let ident = read_ident(&mut chars);
                    if ident.is_empty() {
                        return Err(invalid());
                    }
                    selector.id = Some(ident);
                }
                '.' => {
                    chars.next();
                    let ident = read_ident(&mut chars);
                    if ident.is_empty() {
                        return Err(invalid());
                    }
                    selector.classes.push(ident);
                }
                '[' => {
                    chars.next();
                    let mut body = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        body.push(c);
                    }
                    if !closed {
                        return Err(invalid());
                    }
                    let (name, value) = match body.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                            (name.trim().to_string(), Some(value.to_string()))
                        }
                        None => (body.trim().to_string(), None),
                    };
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    selector.attributes.push((name, value));
                }
                c if is_ident_char(c) && selector.tag.is_none() && selector.id.is_none()
                    && selector.classes.is_empty() && selector.attributes.is_empty() =>
                {
                    selector.tag = Some(read_ident(&mut chars).to_ascii_lowercase());
                }
                _ => return Err(invalid()),
            }
        }

        Ok(selector)
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if &element.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        self.attributes.iter().all(|(name, value)| match value {
            Some(value) => element.attr(name) == Some(value.as_str()),
            None => element.attributes.contains_key(name),
        })
    }
}
