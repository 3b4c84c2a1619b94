//! Automation surface abstraction.
//!
//! The [`AutomationSurface`] trait decouples row orchestration from the actual
//! browser backend (currently WebDriver). Tests use a scripted surface that
//! records interactions without a browser.

use crate::error::AutomationError;

/// Opaque reference to a located control.
///
/// `selector` is kept alongside the backend id so errors can name the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: String,
    pub selector: String,
}

/// Primitive operations a browser session exposes to the engine.
///
/// Every call blocks until the backend answers. Waiting for a condition is
/// built on top of these primitives by [`crate::detect::wait_until`].
pub trait AutomationSurface {
    /// Load `url` in the current page.
    fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Locate the first control matching `selector`.
    ///
    /// Fails with [`AutomationError::ElementNotFound`] when nothing matches.
    fn find(&self, selector: &str) -> Result<ElementHandle, AutomationError>;

    fn click(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError>;

    fn is_checked(&self, element: &ElementHandle) -> Result<bool, AutomationError>;

    /// Choose the option whose `value` attribute equals `value`.
    ///
    /// Fails with [`AutomationError::NoSuchOption`] when no option matches.
    fn select_by_value(&self, element: &ElementHandle, value: &str)
    -> Result<(), AutomationError>;

    fn is_displayed(&self, element: &ElementHandle) -> Result<bool, AutomationError>;

    /// Rendered text content of the control.
    fn text(&self, element: &ElementHandle) -> Result<String, AutomationError>;
}
