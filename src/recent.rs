//! Scraping of the "recent files" view.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::automation::selectors;

static TILE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<div[^>]+class[^>]+generic_tile--title[^>]+>([^<]+)</div>")
        .expect("valid regex")
});

static TILE_EDITED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Edited[^<]*<span[^>]*>([^<]+)</span>").expect("valid regex")
});

static APP_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse(selectors::APP_URL).expect("valid url"));

/// A row of the recent-files view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEntry {
    pub link: String,
    pub title: Option<String>,
    /// Relative edit time as shown, e.g. `"3 hours ago"`.
    pub edited: Option<String>,
}

/// Makes a tile link absolute. Links that cannot be joined are kept as
/// they are.
fn resolve_link(href: &str) -> String {
    APP_BASE.join(href).map_or_else(|_| href.to_string(), Into::into)
}

/// Builds an entry from a tile's `href` and inner HTML. Relative links
/// are resolved against the application origin.
#[must_use]
pub fn parse_tile(href: &str, inner_html: &str) -> RecentEntry {
    let capture = |re: &Regex| {
        re.captures(inner_html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    RecentEntry {
        link: resolve_link(href),
        title: capture(&TILE_TITLE_RE),
        edited: capture(&TILE_EDITED_RE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: &str = r#"<div class="generic_tile--preview"></div>
<div class="generic_tile--title--abc ellipsis">Marketing site</div>
<div class="generic_tile--subtitle">Edited <span class="x">3 hours ago</span></div>"#;

    #[test]
    fn extracts_title_and_edit_time() {
        let entry = parse_tile("https://www.figma.com/file/K/Marketing-site", TILE);
        assert_eq!(entry.link, "https://www.figma.com/file/K/Marketing-site");
        assert_eq!(entry.title.as_deref(), Some("Marketing site"));
        assert_eq!(entry.edited.as_deref(), Some("3 hours ago"));
    }

    #[test]
    fn relative_links_are_made_absolute() {
        let entry = parse_tile("/file/K/Marketing-site", TILE);
        assert_eq!(entry.link, "https://www.figma.com/file/K/Marketing-site");
        let entry = parse_tile("https://www.figma.com/design/K/Deck?node-id=1", TILE);
        assert_eq!(entry.link, "https://www.figma.com/design/K/Deck?node-id=1");
    }

    #[test]
    fn missing_fields_are_none() {
        let entry = parse_tile("https://www.figma.com/file/K/X", "<div>nothing</div>");
        assert_eq!(entry.title, None);
        assert_eq!(entry.edited, None);
    }

    #[test]
    fn edited_yesterday() {
        let entry = parse_tile("l", r"<p>Edited&nbsp;<span>yesterday</span></p>");
        assert_eq!(entry.edited.as_deref(), Some("yesterday"));
    }
}
