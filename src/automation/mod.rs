//! The UI-automation capability the backup drives, and its session lifecycle.
//!
//! Everything that touches the browser goes through [`AutomationChannel`], so
//! the orchestration code can be exercised against a scripted fake.

pub mod selectors;
pub mod webdriver;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use webdriver::{WebDriverChannel, WebDriverLauncher};

/// Opaque handle to an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element(pub String);

/// WebDriver key codes usable inside `send_keys` text.
pub mod keys {
    pub const ENTER: &str = "\u{E007}";
    pub const CONTROL: &str = "\u{E009}";
}

/// A single browser session.
///
/// Callers never issue two operations concurrently; implementations may
/// rely on that.
#[async_trait]
pub trait AutomationChannel: Send + Sync {
    /// Loads `url` in the current tab.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Waits until an element matching `selector` exists.
    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<Element>;

    /// Waits until `element` is displayed.
    async fn wait_for_visible(&self, element: &Element, timeout: Duration) -> Result<()>;

    /// Returns every element currently matching `selector`.
    async fn find_elements(&self, selector: &str) -> Result<Vec<Element>>;

    /// Types `text` into `element`. Key codes from [`keys`] are honoured.
    async fn send_keys(&self, element: &Element, text: &str) -> Result<()>;

    async fn click(&self, element: &Element) -> Result<()>;

    /// Pauses the session's control flow.
    async fn sleep(&self, duration: Duration);

    /// Reads an attribute (or, failing that, a DOM property) of `element`.
    async fn get_attribute(&self, element: &Element, name: &str) -> Result<String>;
}

/// Creates and tears down automation sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Channel: AutomationChannel;

    /// Opens a session whose downloads land in `download_dir`.
    async fn open(&self, download_dir: &Path) -> Result<Self::Channel>;

    async fn close(&self, channel: Self::Channel) -> Result<()>;
}

/// Waits for `selector` to exist and be visible, then returns it.
///
/// # Errors
///
/// Propagates the channel's `ElementNotFound` or protocol errors.
pub async fn wait_and_get<C: AutomationChannel + ?Sized>(
    channel: &C,
    selector: &str,
    timeout: Duration,
) -> Result<Element> {
    let element = channel.wait_for_element(selector, timeout).await?;
    channel.wait_for_visible(&element, timeout).await?;
    Ok(element)
}

/// Like [`wait_and_get`], but returns every match once the first is visible.
///
/// # Errors
///
/// Propagates the channel's `ElementNotFound` or protocol errors.
pub async fn wait_and_get_all<C: AutomationChannel + ?Sized>(
    channel: &C,
    selector: &str,
    timeout: Duration,
) -> Result<Vec<Element>> {
    wait_and_get(channel, selector, timeout).await?;
    channel.find_elements(selector).await
}

/// Returns the first element matching `selector` without waiting.
///
/// # Errors
///
/// Returns `ElementNotFound` if nothing matches.
pub async fn find_element<C: AutomationChannel + ?Sized>(
    channel: &C,
    selector: &str,
) -> Result<Element> {
    channel
        .find_elements(selector)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| crate::Error::ElementNotFound {
            selector: selector.to_string(),
        })
}
