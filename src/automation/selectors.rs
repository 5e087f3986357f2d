//! CSS selectors and URLs of the web application's UI.

/// Origin that relative links in the UI are resolved against.
pub const APP_URL: &str = "https://www.figma.com/";
pub const LOGIN_URL: &str = "https://www.figma.com/login";
pub const RECENT_URL: &str = "https://www.figma.com/files/recent";

/// Sign-in form container.
pub const AUTH_BLOCK: &str = r#"[class^="auth"]"#;
pub const AUTH_FIELD_LOGIN: &str = "input[type=email]";
pub const AUTH_FIELD_PASSWORD: &str = "input[type=password]";
pub const LOGIN_BUTTON: &str = "#auth-view-page button[type=submit]";

/// "Drafts" entry of the sidebar, shown once signed in.
pub const MENU_DRAFTS: &str = r#"[class^="folder_link--draftsName"]"#;

/// Toolbar button group, present once a document has finished loading.
pub const DOCUMENT_LOADED: &str = r#"[class^="toolbar_view--buttonGroup"]"#;

/// Search box of the quick-actions palette.
pub const QUICK_ACTIONS_INPUT: &str = r#"[class^="quick_actions--searchInput"]"#;

/// File tiles of the "recent files" view.
pub const RECENT_FILES: &str = r#"a[class^="generic_tile--tile"]"#;

pub const ROOT: &str = "html";

/// Command typed into the quick-actions palette to save a local copy.
pub const SAVE_COMMAND: &str = "Save local";
