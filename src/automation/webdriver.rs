//! [`AutomationChannel`] over the W3C WebDriver wire protocol (chromedriver).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tokio::time::Instant;

use super::{AutomationChannel, Element, SessionFactory};
use crate::config::WebDriverConfig;
use crate::error::{Error, Result};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Interval between element lookups while waiting.
const WAIT_POLL: Duration = Duration::from_millis(250);

/// Attributes read through the element property so they come back absolute.
const URL_PROPERTIES: [&str; 2] = ["href", "src"];

/// A live WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverChannel {
    http: reqwest::Client,
    session_url: String,
}

impl WebDriverChannel {
    /// Starts a Chrome session that saves downloads into `download_dir`.
    ///
    /// `log_level` is Chrome's `--log-level` (0 = verbose, 3 = fatal only).
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or refuses the
    /// session.
    pub async fn start(
        http: reqwest::Client,
        config: &WebDriverConfig,
        download_dir: &Path,
        log_level: u8,
    ) -> Result<Self> {
        let url = format!("{}/session", config.url.trim_end_matches('/'));
        let body = capabilities(config, download_dir, log_level);
        let value = send(&http, Method::POST, &url, Some(body), "new session").await?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| Error::WebDriver("new session response without sessionId".to_string()))?;
        log::debug!("WebDriver session {session_id}, downloads to {}", download_dir.display());

        Ok(Self {
            session_url: format!("{url}/{session_id}"),
            http,
        })
    }

    /// Base URL of this session's commands.
    #[must_use]
    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    /// Ends the session and closes the browser.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the request.
    pub async fn quit(&self) -> Result<()> {
        send(&self.http, Method::DELETE, &self.session_url, None, "delete session").await?;
        Ok(())
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        context: &str,
    ) -> Result<Value> {
        let url = format!("{}{path}", self.session_url);
        send(&self.http, method, &url, body, context).await
    }

    async fn find_one(&self, selector: &str) -> Result<Option<Element>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "/element", Some(body), selector).await {
            Ok(value) => element_ref(&value).map(Some),
            Err(Error::ElementNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn is_displayed(&self, element: &Element) -> Result<bool> {
        let path = format!("/element/{}/displayed", element.0);
        let value = self.command(Method::GET, &path, None, &element.0).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl AutomationChannel for WebDriverChannel {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })), url)
            .await?;
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find_one(selector).await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(Error::ElementNotFound {
                    selector: selector.to_string(),
                });
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn wait_for_visible(&self, element: &Element, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_displayed(element).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::ElementNotFound {
                    selector: format!("visible element {}", element.0),
                });
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Element>> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self
            .command(Method::POST, "/elements", Some(body), selector)
            .await?;
        value
            .as_array()
            .map(|items| items.iter().map(element_ref).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        let path = format!("/element/{}/value", element.0);
        self.command(Method::POST, &path, Some(json!({ "text": text })), &element.0)
            .await?;
        Ok(())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        let path = format!("/element/{}/click", element.0);
        self.command(Method::POST, &path, Some(json!({})), &element.0)
            .await?;
        Ok(())
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn get_attribute(&self, element: &Element, name: &str) -> Result<String> {
        // URL attributes hold the markup text; their properties are resolved
        // against the page. innerHTML and friends exist only as properties.
        let lookups = if URL_PROPERTIES.contains(&name) {
            ["property", "attribute"]
        } else {
            ["attribute", "property"]
        };
        for kind in lookups {
            let path = format!("/element/{}/{kind}/{name}", element.0);
            let value = self.command(Method::GET, &path, None, &element.0).await?;
            if let Some(text) = value.as_str() {
                return Ok(text.to_string());
            }
        }
        Ok(String::new())
    }
}

/// Opens one [`WebDriverChannel`] per user.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    http: reqwest::Client,
    config: WebDriverConfig,
    log_level: u8,
}

impl WebDriverLauncher {
    #[must_use]
    pub const fn new(http: reqwest::Client, config: WebDriverConfig, log_level: u8) -> Self {
        Self {
            http,
            config,
            log_level,
        }
    }
}

#[async_trait]
impl SessionFactory for WebDriverLauncher {
    type Channel = WebDriverChannel;

    async fn open(&self, download_dir: &Path) -> Result<Self::Channel> {
        WebDriverChannel::start(self.http.clone(), &self.config, download_dir, self.log_level).await
    }

    async fn close(&self, channel: Self::Channel) -> Result<()> {
        channel.quit().await
    }
}

fn capabilities(config: &WebDriverConfig, download_dir: &Path, log_level: u8) -> Value {
    let mut args = vec![
        "--test-type".to_string(),
        "--start-maximized".to_string(),
        "--no-sandbox".to_string(),
        "--ignore-gpu-blacklist".to_string(),
        "--use-gl".to_string(),
        format!("--log-level={log_level}"),
    ];
    if config.headless {
        args.push("--headless".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": args,
                    "prefs": {
                        "download": {
                            "default_directory": download_dir.to_string_lossy(),
                            "prompt_for_download": false,
                        }
                    }
                }
            }
        }
    })
}

fn element_ref(value: &Value) -> Result<Element> {
    value[ELEMENT_KEY]
        .as_str()
        .map(|id| Element(id.to_string()))
        .ok_or_else(|| Error::WebDriver(format!("not an element reference: {value}")))
}

/// Issues one WebDriver command and unwraps its `value`.
async fn send(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    context: &str,
) -> Result<Value> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let mut payload: Value = response.json().await?;
    let value = payload["value"].take();

    if status.is_success() {
        Ok(value)
    } else {
        Err(protocol_error(&value, context))
    }
}

fn protocol_error(value: &Value, context: &str) -> Error {
    let code = value["error"].as_str().unwrap_or("unknown error");
    match code {
        "no such element" => Error::ElementNotFound {
            selector: context.to_string(),
        },
        "stale element reference" => Error::StaleReference(context.to_string()),
        _ => {
            let message = value["message"].as_str().unwrap_or_default();
            Error::WebDriver(format!("{code}: {message}"))
        }
    }
}
