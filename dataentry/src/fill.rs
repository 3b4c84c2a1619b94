//! Field setting, one handler per [`FieldKind`].

use tracing::debug;

use crate::core::coerce::coerce_truthy;
use crate::core::rules::{FieldKind, FieldRule};
use crate::core::types::Row;
use crate::error::AutomationError;
use crate::io::surface::{AutomationSurface, ElementHandle};

/// Value to enter for `rule`: the cell when non-empty, else the rule's default.
pub fn resolve_value(row: &Row, rule: &FieldRule) -> Option<String> {
    row.value(&rule.column).or_else(|| rule.default.clone())
}

/// Drive `element` so it holds `value`.
///
/// `None` is entered as the empty string (text, select) or unchecked (checkbox).
/// Checkboxes are only clicked when their state differs, so setting is idempotent.
pub fn set_field<S: AutomationSurface + ?Sized>(
    surface: &S,
    element: &ElementHandle,
    kind: FieldKind,
    value: Option<&str>,
) -> Result<(), AutomationError> {
    let value = value.unwrap_or("");
    match kind {
        FieldKind::Text => {
            surface.clear(element)?;
            surface.type_text(element, value)
        }
        FieldKind::Select => surface.select_by_value(element, value),
        FieldKind::Checkbox => {
            let desired = coerce_truthy(value);
            let current = surface.is_checked(element)?;
            if current != desired {
                debug!(selector = %element.selector, desired, "toggling checkbox");
                surface.click(element)?;
            }
            Ok(())
        }
    }
}

/// Locate and set every mapped field of `row`, in declared order.
pub fn fill_row<S: AutomationSurface + ?Sized>(
    surface: &S,
    row: &Row,
    fields: &[FieldRule],
) -> Result<(), AutomationError> {
    for rule in fields {
        let value = resolve_value(row, rule);
        let element = surface.find(&rule.selector)?;
        debug!(column = %rule.column, kind = rule.kind.label(), "setting field");
        set_field(surface, &element, rule.kind, value.as_deref())?;
    }
    Ok(())
}
