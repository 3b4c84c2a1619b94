//! Test-only helpers: a scripted automation surface and rule/row builders.

use std::cell::{Cell as StdCell, RefCell};
use std::collections::HashMap;

use crate::core::rules::{Browser, FieldKind, FieldRule, Mapping};
use crate::core::types::{Cell, Row, SourceRow};
use crate::error::AutomationError;
use crate::io::surface::{AutomationSurface, ElementHandle};

pub const FORM_URL: &str = "https://forms.example.test/signup";

/// State-changing interaction recorded by [`ScriptedSurface`], keyed by selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Navigate(String),
    Click(String),
    Clear(String),
    Type(String, String),
    Select(String, String),
}

/// A control on the fake page.
#[derive(Debug, Clone)]
pub struct FakeElement {
    checked: bool,
    visible: bool,
    text: String,
    options: Vec<String>,
    /// Clicking this element makes the named element visible.
    reveals: Option<String>,
    /// Bumped when the page replaces the node; older handles go stale.
    generation: usize,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            checked: false,
            visible: true,
            text: String::new(),
            options: Vec::new(),
            reveals: None,
            generation: 0,
        }
    }
}

impl FakeElement {
    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn options(mut self, values: &[&str]) -> Self {
        self.options = values.iter().map(|value| value.to_string()).collect();
        self
    }

    pub fn reveals(mut self, selector: &str) -> Self {
        self.reveals = Some(selector.to_string());
        self
    }
}

/// In-memory automation surface that records interactions.
///
/// Elements are addressed by their exact selector. Session loss can be scripted
/// to happen immediately or on a given navigation; once lost, every call fails.
#[derive(Debug, Default)]
pub struct ScriptedSurface {
    elements: RefCell<HashMap<String, FakeElement>>,
    failures: HashMap<String, AutomationError>,
    calls: RefCell<Vec<Call>>,
    navigations: StdCell<usize>,
    lose_on_navigation: Option<usize>,
    lost: StdCell<bool>,
    rerenders: RefCell<HashMap<String, (usize, FakeElement)>>,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, selector: &str, element: FakeElement) -> Self {
        self.elements
            .borrow_mut()
            .insert(selector.to_string(), element);
        self
    }

    /// Make `find(selector)` fail with `error`.
    pub fn failing_find(mut self, selector: &str, error: AutomationError) -> Self {
        self.failures.insert(selector.to_string(), error);
        self
    }

    /// Replace the element at `selector` with `replacement` after its text
    /// has been read `reads` times. Handles found before then become stale.
    pub fn rerender_after_reads(self, selector: &str, reads: usize, replacement: FakeElement) -> Self {
        self.rerenders
            .borrow_mut()
            .insert(selector.to_string(), (reads, replacement));
        self
    }

    /// The session is already gone.
    pub fn lose_session(self) -> Self {
        self.lost.set(true);
        self
    }

    /// The `nth` navigation (1-based) fails with session loss.
    pub fn lose_session_on_navigation(mut self, nth: usize) -> Self {
        self.lose_on_navigation = Some(nth);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Successful navigations so far.
    pub fn navigations(&self) -> usize {
        self.navigations.get()
    }

    pub fn clicks_on(&self, selector: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Click(target) if target == selector))
            .count()
    }

    fn alive(&self) -> Result<(), AutomationError> {
        if self.lost.get() {
            return Err(AutomationError::SessionLost(
                "scripted session is gone".to_string(),
            ));
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn with_element_state<T>(
        &self,
        element: &ElementHandle,
        f: impl FnOnce(&mut FakeElement) -> T,
    ) -> Result<T, AutomationError> {
        self.alive()?;
        let mut elements = self.elements.borrow_mut();
        let state = elements
            .get_mut(&element.selector)
            .filter(|state| handle_id(&element.selector, state.generation) == element.id)
            .ok_or_else(|| AutomationError::Unexpected("stale element reference".to_string()))?;
        Ok(f(state))
    }

    fn apply_rerender(&self, selector: &str) {
        let mut rerenders = self.rerenders.borrow_mut();
        let Some((reads, _)) = rerenders.get_mut(selector) else {
            return;
        };
        *reads = reads.saturating_sub(1);
        if *reads > 0 {
            return;
        }
        let Some((_, mut replacement)) = rerenders.remove(selector) else {
            return;
        };
        let mut elements = self.elements.borrow_mut();
        replacement.generation = elements
            .get(selector)
            .map_or(1, |current| current.generation + 1);
        elements.insert(selector.to_string(), replacement);
    }
}

impl AutomationSurface for ScriptedSurface {
    fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.alive()?;
        if self.lose_on_navigation == Some(self.navigations.get() + 1) {
            self.lost.set(true);
            return self.alive();
        }
        self.navigations.set(self.navigations.get() + 1);
        self.record(Call::Navigate(url.to_string()));
        Ok(())
    }

    fn find(&self, selector: &str) -> Result<ElementHandle, AutomationError> {
        self.alive()?;
        if let Some(error) = self.failures.get(selector) {
            return Err(error.clone());
        }
        let generation = self
            .elements
            .borrow()
            .get(selector)
            .map(|state| state.generation)
            .ok_or_else(|| AutomationError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        Ok(ElementHandle {
            id: handle_id(selector, generation),
            selector: selector.to_string(),
        })
    }

    fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let reveals = self.with_element_state(element, |state| {
            state.checked = !state.checked;
            state.reveals.clone()
        })?;
        if let Some(target) = reveals
            && let Some(state) = self.elements.borrow_mut().get_mut(&target)
        {
            state.visible = true;
        }
        self.record(Call::Click(element.selector.clone()));
        Ok(())
    }

    fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.with_element_state(element, |state| state.text.clear())?;
        self.record(Call::Clear(element.selector.clone()));
        Ok(())
    }

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        self.with_element_state(element, |state| state.text.push_str(text))?;
        self.record(Call::Type(element.selector.clone(), text.to_string()));
        Ok(())
    }

    fn is_checked(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        self.with_element_state(element, |state| state.checked)
    }

    fn select_by_value(&self, element: &ElementHandle, value: &str) -> Result<(), AutomationError> {
        let known = self.with_element_state(element, |state| {
            state.options.iter().any(|option| option == value)
        })?;
        if !known {
            return Err(AutomationError::NoSuchOption {
                selector: element.selector.clone(),
                value: value.to_string(),
            });
        }
        self.record(Call::Select(element.selector.clone(), value.to_string()));
        Ok(())
    }

    fn is_displayed(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        self.with_element_state(element, |state| state.visible)
    }

    fn text(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let text = self.with_element_state(element, |state| state.text.clone())?;
        self.apply_rerender(&element.selector);
        Ok(text)
    }
}

fn handle_id(selector: &str, generation: usize) -> String {
    format!("{selector}@{generation}")
}

/// Optional text rule with no validators.
pub fn text_rule(column: &str, selector: &str) -> FieldRule {
    FieldRule {
        column: column.to_string(),
        selector: selector.to_string(),
        kind: FieldKind::Text,
        required: false,
        default: None,
        validators: Vec::new(),
    }
}

/// Mapping for [`FORM_URL`] with no submit selector or success check.
pub fn mapping(fields: Vec<FieldRule>) -> Mapping {
    Mapping {
        url: FORM_URL.to_string(),
        browser: Browser::Chrome,
        headless: true,
        submit_selector: None,
        success_check: None,
        fields,
    }
}

/// Number rows 1.. in order from `(column, text)` pairs. Empty text is an empty cell.
pub fn source_rows(rows: Vec<Vec<(&str, &str)>>) -> Vec<SourceRow> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, cells)| SourceRow {
            number: idx + 1,
            row: cells
                .into_iter()
                .map(|(column, text)| {
                    let cell = if text.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::from(text)
                    };
                    (column, cell)
                })
                .collect::<Row>(),
        })
        .collect()
}
