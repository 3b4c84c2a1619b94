//! W3C WebDriver client implementing [`AutomationSurface`].
//!
//! Speaks the JSON wire protocol over blocking HTTP. The session either
//! attaches to an existing WebDriver endpoint or spawns a local driver server
//! (see [`crate::io::driver_process`]). Dropping the session deletes it and
//! stops any driver it spawned.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::rules::Browser;
use crate::error::{AutomationError, BrowserLaunchError};
use crate::io::driver_process::{DriverCommand, DriverProcess};
use crate::io::surface::{AutomationSurface, ElementHandle};

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Protocol errors meaning the session itself is unusable.
const SESSION_ERRORS: [&str; 3] = ["invalid session id", "session not created", "no such window"];

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Parameters for starting a session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub browser: Browser,
    pub headless: bool,
    /// Attach to this endpoint instead of spawning a driver.
    pub webdriver_url: Option<String>,
    /// Driver executable override (defaults to `chromedriver`/`geckodriver` on `PATH`).
    pub driver_program: Option<PathBuf>,
    pub launch_timeout: Duration,
    pub request_timeout: Duration,
    pub page_load_timeout: Duration,
}

impl LaunchOptions {
    pub fn new(browser: Browser, headless: bool) -> Self {
        Self {
            browser,
            headless,
            webdriver_url: None,
            driver_program: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_load_timeout: Duration::from_secs(15),
        }
    }
}

/// Browser capabilities for a new-session request.
pub fn capabilities(browser: Browser, headless: bool, page_load_timeout: Duration) -> Value {
    let timeouts = json!({ "pageLoad": page_load_timeout.as_millis() as u64 });
    match browser {
        Browser::Chrome => {
            let mut args = Vec::new();
            if headless {
                args.push("--headless=new");
            }
            args.extend(["--no-sandbox", "--disable-dev-shm-usage"]);
            json!({
                "browserName": "chrome",
                "timeouts": timeouts,
                "goog:chromeOptions": { "args": args },
            })
        }
        Browser::Firefox => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };
            json!({
                "browserName": "firefox",
                "timeouts": timeouts,
                "moz:firefoxOptions": { "args": args },
            })
        }
    }
}

/// Quote `value` as a CSS string literal.
fn css_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\a "),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Failure talking to the WebDriver endpoint, before classification.
#[derive(Debug)]
enum WireFailure {
    Transport(reqwest::Error),
    Protocol { error: String, message: String },
    Malformed(String),
}

impl fmt::Display for WireFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFailure::Transport(err) => write!(f, "webdriver request failed: {err}"),
            WireFailure::Protocol { error, message } => write!(f, "{error}: {message}"),
            WireFailure::Malformed(reason) => write!(f, "malformed webdriver response: {reason}"),
        }
    }
}

impl WireFailure {
    fn is_protocol(&self, expected: &str) -> bool {
        matches!(self, WireFailure::Protocol { error, .. } if error == expected)
    }

    /// Like [`Self::into_automation`], but a driver `timeout` is a page load timeout.
    fn into_navigation(self, url: &str, timeout: Duration) -> AutomationError {
        if self.is_protocol("timeout") {
            return AutomationError::Timeout {
                condition: format!("page load of {url}"),
                timeout,
            };
        }
        self.into_automation()
    }

    fn into_automation(self) -> AutomationError {
        let lost = match &self {
            WireFailure::Transport(err) => err.is_connect(),
            WireFailure::Protocol { error, .. } => SESSION_ERRORS.contains(&error.as_str()),
            WireFailure::Malformed(_) => false,
        };
        if lost {
            AutomationError::SessionLost(self.to_string())
        } else {
            AutomationError::Unexpected(self.to_string())
        }
    }
}

fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&Value>,
) -> Result<Value, WireFailure> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().map_err(WireFailure::Transport)?;
    let status = response.status();
    let payload: Value = response
        .json()
        .map_err(|err| WireFailure::Malformed(err.to_string()))?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let error = field("error");
    Err(WireFailure::Protocol {
        error: if error.is_empty() {
            format!("http {}", status.as_u16())
        } else {
            error
        },
        message: field("message"),
    })
}

fn driver_ready(client: &Client, base_url: &str) -> bool {
    match send(client, Method::GET, &format!("{base_url}/status"), None) {
        Ok(value) => value.get("ready").and_then(Value::as_bool).unwrap_or(false),
        Err(_) => false,
    }
}

/// A live WebDriver session.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    page_load_timeout: Duration,
    // Dropped after the session is deleted (field order).
    _driver: Option<DriverProcess>,
}

impl WebDriverSession {
    /// Start a browser session, spawning a driver unless an endpoint is given.
    #[instrument(skip_all, fields(browser = options.browser.label(), headless = options.headless))]
    pub fn launch(options: &LaunchOptions) -> Result<Self, BrowserLaunchError> {
        let launch_error = |reason: String| BrowserLaunchError {
            browser: options.browser.label().to_string(),
            reason,
        };
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| launch_error(format!("build http client: {err}")))?;

        let (base_url, driver) = match &options.webdriver_url {
            Some(url) => (url.trim_end_matches('/').to_string(), None),
            None => {
                let command =
                    DriverCommand::for_browser(options.browser, options.driver_program.as_deref());
                let process = DriverProcess::spawn(&command, options.launch_timeout, |base| {
                    driver_ready(&client, base)
                })
                .map_err(|err| launch_error(format!("{err:#}")))?;
                (process.base_url().to_string(), Some(process))
            }
        };

        let body = json!({
            "capabilities": {
                "alwaysMatch": capabilities(options.browser, options.headless, options.page_load_timeout),
            }
        });
        let value = send(&client, Method::POST, &format!("{base_url}/session"), Some(&body))
            .map_err(|err| launch_error(err.to_string()))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| launch_error("new session response has no sessionId".to_string()))?
            .to_string();
        info!(%session_id, %base_url, "webdriver session started");
        Ok(Self {
            client,
            base_url,
            session_id,
            page_load_timeout: options.page_load_timeout,
            _driver: driver,
        })
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, WireFailure> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        debug!(%method, path, "webdriver command");
        send(&self.client, method, &url, body.as_ref())
    }

    fn element_command(
        &self,
        element: &ElementHandle,
        method: Method,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, AutomationError> {
        self.command(method, &format!("/element/{}{}", element.id, suffix), body)
            .map_err(WireFailure::into_automation)
    }

    /// Locate `selector`, within `scope` when given. `None` when nothing matches.
    fn find_in(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, AutomationError> {
        let path = match scope {
            Some(parent) => format!("/element/{}/element", parent.id),
            None => "/element".to_string(),
        };
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, &path, Some(body)) {
            Ok(value) => {
                let id = value
                    .get(ELEMENT_KEY)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AutomationError::Unexpected(format!(
                            "find '{selector}' returned no element reference"
                        ))
                    })?;
                Ok(Some(ElementHandle {
                    id: id.to_string(),
                    selector: selector.to_string(),
                }))
            }
            Err(err) if err.is_protocol("no such element") => Ok(None),
            Err(err) => Err(err.into_automation()),
        }
    }

    fn bool_query(&self, element: &ElementHandle, suffix: &str) -> Result<bool, AutomationError> {
        let value = self.element_command(element, Method::GET, suffix, None)?;
        value.as_bool().ok_or_else(|| {
            AutomationError::Unexpected(format!("expected boolean from {suffix}, got {value}"))
        })
    }
}

impl AutomationSurface for WebDriverSession {
    fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .map_err(|err| err.into_navigation(url, self.page_load_timeout))?;
        Ok(())
    }

    fn find(&self, selector: &str) -> Result<ElementHandle, AutomationError> {
        self.find_in(None, selector)?
            .ok_or_else(|| AutomationError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.element_command(element, Method::POST, "/click", Some(json!({})))?;
        Ok(())
    }

    fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.element_command(element, Method::POST, "/clear", Some(json!({})))?;
        Ok(())
    }

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        if text.is_empty() {
            return Ok(());
        }
        self.element_command(element, Method::POST, "/value", Some(json!({ "text": text })))?;
        Ok(())
    }

    fn is_checked(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        self.bool_query(element, "/selected")
    }

    fn select_by_value(&self, element: &ElementHandle, value: &str) -> Result<(), AutomationError> {
        let option_selector = format!("option[value={}]", css_string(value));
        let option = self
            .find_in(Some(element), &option_selector)?
            .ok_or_else(|| AutomationError::NoSuchOption {
                selector: element.selector.clone(),
                value: value.to_string(),
            })?;
        if !self.bool_query(&option, "/selected")? {
            self.click(&option)?;
        }
        Ok(())
    }

    fn is_displayed(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        self.bool_query(element, "/displayed")
    }

    fn text(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let value = self.element_command(element, Method::GET, "/text", None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        match send(&self.client, Method::DELETE, &url, None) {
            Ok(_) => debug!(session_id = %self.session_id, "webdriver session deleted"),
            Err(err) => warn!(session_id = %self.session_id, %err, "failed to delete webdriver session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn chrome_capabilities_include_headless_and_sandbox_flags() {
        let caps = capabilities(Browser::Chrome, true, Duration::from_secs(15));
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["timeouts"]["pageLoad"], 15_000);
        assert_eq!(
            caps["goog:chromeOptions"]["args"],
            json!(["--headless=new", "--no-sandbox", "--disable-dev-shm-usage"])
        );
    }

    #[test]
    fn firefox_capabilities_only_add_headless_when_requested() {
        let headed = capabilities(Browser::Firefox, false, Duration::from_secs(5));
        assert_eq!(headed["moz:firefoxOptions"]["args"], json!([]));
        let headless = capabilities(Browser::Firefox, true, Duration::from_secs(5));
        assert_eq!(headless["moz:firefoxOptions"]["args"], json!(["-headless"]));
    }

    #[test]
    fn css_strings_escape_quotes_and_backslashes() {
        assert_eq!(css_string("US"), "\"US\"");
        assert_eq!(css_string(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn session_errors_are_classified_as_session_lost() {
        let lost = WireFailure::Protocol {
            error: "invalid session id".to_string(),
            message: "session deleted".to_string(),
        };
        assert!(lost.into_automation().is_session_lost());

        let stale = WireFailure::Protocol {
            error: "stale element reference".to_string(),
            message: "element is not attached".to_string(),
        };
        assert_eq!(
            stale.into_automation(),
            AutomationError::Unexpected(
                "stale element reference: element is not attached".to_string()
            )
        );
    }

    #[test]
    fn page_load_timeouts_are_timeout_errors() {
        let timeout = WireFailure::Protocol {
            error: "timeout".to_string(),
            message: "timeout: Timed out receiving message from renderer".to_string(),
        };
        let err = timeout.into_navigation("https://forms.example.test", Duration::from_secs(15));
        assert_eq!(err.category(), Some("SubmissionTimeout"));
        assert!(
            err.outcome_message()
                .contains("waiting for page load of https://forms.example.test"),
            "{err}"
        );

        let lost = WireFailure::Protocol {
            error: "invalid session id".to_string(),
            message: String::new(),
        };
        assert!(
            lost.into_navigation("https://forms.example.test", Duration::from_secs(15))
                .is_session_lost()
        );
    }

    #[test]
    fn unreachable_endpoint_is_a_launch_error() {
        // Bind then release a port so nothing is listening on it.
        let port = TcpListener::bind("127.0.0.1:0")
            .expect("bind")
            .local_addr()
            .expect("addr")
            .port();
        let mut options = LaunchOptions::new(Browser::Chrome, true);
        options.webdriver_url = Some(format!("http://127.0.0.1:{port}/"));
        options.request_timeout = Duration::from_secs(5);

        let err = WebDriverSession::launch(&options)
            .err()
            .expect("launch should fail");
        assert_eq!(err.browser, "chrome");
        assert!(err.reason.contains("webdriver request failed"), "{}", err.reason);
    }
}
