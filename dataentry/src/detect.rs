//! Post-submission success detection by bounded polling.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::core::rules::SuccessCheck;
use crate::error::AutomationError;
use crate::io::surface::{AutomationSurface, ElementHandle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Poll `predicate` until it yields a value or `deadline` passes.
///
/// `Ok(None)` means "not yet". Errors abort the wait immediately. Returns
/// `Ok(None)` when the deadline passes without a value. The predicate is always
/// evaluated at least once.
pub fn wait_until<T, F>(
    deadline: Instant,
    poll_interval: Duration,
    mut predicate: F,
) -> Result<Option<T>, AutomationError>
where
    F: FnMut() -> Result<Option<T>, AutomationError>,
{
    loop {
        if let Some(value) = predicate()? {
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

/// Treat transient surface failures as "not yet"; only session loss is fatal.
fn transient<T>(result: Result<T, AutomationError>) -> Result<Option<T>, AutomationError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_session_lost() => Err(err),
        Err(err) => {
            debug!(%err, "success check not satisfied yet");
            Ok(None)
        }
    }
}

fn visible_element<S: AutomationSurface + ?Sized>(
    surface: &S,
    selector: &str,
) -> Result<Option<ElementHandle>, AutomationError> {
    let Some(element) = transient(surface.find(selector))? else {
        return Ok(None);
    };
    Ok(transient(surface.is_displayed(&element))?
        .filter(|shown| *shown)
        .map(|_| element))
}

/// Wait until `check` holds: the selector is visible, then (optionally) its
/// text contains the expected substring. Both stages share one deadline.
#[instrument(skip_all, fields(selector = %check.selector))]
pub fn await_success<S: AutomationSurface + ?Sized>(
    surface: &S,
    check: &SuccessCheck,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), AutomationError> {
    let deadline = Instant::now() + timeout;
    let timed_out = |condition: String| AutomationError::Timeout { condition, timeout };

    wait_until(deadline, poll_interval, || {
        visible_element(surface, &check.selector)
    })?
    .ok_or_else(|| timed_out(format!("'{}' to be visible", check.selector)))?;
    debug!("success element visible");

    if let Some(expected) = &check.text_contains {
        // Re-locate on every poll; the page may replace the node while it loads.
        wait_until(deadline, poll_interval, || {
            let Some(element) = transient(surface.find(&check.selector))? else {
                return Ok(None);
            };
            Ok(transient(surface.text(&element))?.filter(|text| text.contains(expected.as_str())))
        })?
        .ok_or_else(|| {
            timed_out(format!(
                "'{}' to contain text '{}'",
                check.selector, expected
            ))
        })?;
        debug!("success text matched");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeElement, ScriptedSurface};

    const POLL: Duration = Duration::from_millis(5);

    fn check(selector: &str, text: Option<&str>) -> SuccessCheck {
        SuccessCheck {
            selector: selector.to_string(),
            text_contains: text.map(str::to_string),
        }
    }

    #[test]
    fn wait_until_evaluates_once_even_when_already_expired() {
        let mut calls = 0;
        let result = wait_until(Instant::now(), POLL, || {
            calls += 1;
            Ok(None::<()>)
        })
        .expect("wait");
        assert_eq!(result, None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn visible_element_with_matching_text_succeeds() {
        let surface = ScriptedSurface::new()
            .with_element("#msg", FakeElement::default().text("Thanks for signing up"));
        await_success(
            &surface,
            &check("#msg", Some("Thanks")),
            Duration::from_millis(100),
            POLL,
        )
        .expect("success");
    }

    #[test]
    fn absent_element_times_out() {
        let surface = ScriptedSurface::new();
        let err = await_success(&surface, &check("#msg", None), Duration::from_millis(30), POLL)
            .unwrap_err();
        assert_eq!(err.category(), Some("SubmissionTimeout"));
        assert!(err.to_string().contains("'#msg' to be visible"), "{err}");
    }

    #[test]
    fn hidden_element_times_out() {
        let surface =
            ScriptedSurface::new().with_element("#msg", FakeElement::default().hidden());
        let err = await_success(&surface, &check("#msg", None), Duration::from_millis(30), POLL)
            .unwrap_err();
        assert!(matches!(err, AutomationError::Timeout { .. }));
    }

    #[test]
    fn wrong_text_times_out_on_the_text_stage() {
        let surface = ScriptedSurface::new()
            .with_element("#msg", FakeElement::default().text("Please fix the errors"));
        let err = await_success(
            &surface,
            &check("#msg", Some("Thanks")),
            Duration::from_millis(30),
            POLL,
        )
        .unwrap_err();
        assert!(err.to_string().contains("contain text 'Thanks'"), "{err}");
    }

    #[test]
    fn replaced_success_element_is_located_again() {
        let surface = ScriptedSurface::new()
            .with_element("#msg", FakeElement::default().text("Loading..."))
            .rerender_after_reads("#msg", 2, FakeElement::default().text("Thank you!"));
        await_success(
            &surface,
            &check("#msg", Some("Thank you")),
            Duration::from_millis(200),
            POLL,
        )
        .expect("success after re-render");
    }

    #[test]
    fn stale_handles_fail_after_a_rerender() {
        let surface = ScriptedSurface::new()
            .with_element("#msg", FakeElement::default().text("Loading..."))
            .rerender_after_reads("#msg", 1, FakeElement::default().text("Thank you!"));
        let old = surface.find("#msg").expect("find");
        assert_eq!(surface.text(&old).expect("text"), "Loading...");
        assert!(surface.text(&old).is_err());
        let fresh = surface.find("#msg").expect("find again");
        assert_eq!(surface.text(&fresh).expect("text"), "Thank you!");
    }

    #[test]
    fn session_loss_aborts_polling() {
        let surface = ScriptedSurface::new().lose_session();
        let err = await_success(&surface, &check("#msg", None), Duration::from_secs(5), POLL)
            .unwrap_err();
        assert!(err.is_session_lost());
    }
}
