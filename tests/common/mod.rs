//! In-memory stand-ins for the browser and the catalog.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use figma_backup::automation::{AutomationChannel, Element, SessionFactory, keys, selectors};
use figma_backup::catalog::{Catalog, FileRecord, Project};
use figma_backup::config::Team;
use figma_backup::saver::derive_title;
use figma_backup::{Error, Result};

/// Everything the fake web application knows, shared by all sessions.
#[derive(Default)]
pub struct World {
    /// login -> password
    pub accounts: HashMap<String, String>,
    /// login -> (href, inner HTML) of each recent tile
    pub recent: HashMap<String, Vec<(String, String)>>,
    /// link -> number of visits whose document never loads
    pub fail_first: HashMap<String, u32>,
    pub visits: HashMap<String, u32>,
    /// link -> number of saves that never reach staging
    pub lost_saves: HashMap<String, u32>,
    pub navigations: Vec<String>,
    pub opened: u32,
    pub closed: u32,
    pub fail_open: bool,
}

pub type SharedWorld = Arc<Mutex<World>>;

#[derive(Default)]
struct Page {
    url: String,
    login_typed: String,
    password_typed: String,
    user: Option<String>,
}

pub struct FakeBrowser {
    world: SharedWorld,
    staging: PathBuf,
    page: Mutex<Page>,
}

fn not_found(selector: &str) -> Error {
    Error::ElementNotFound {
        selector: selector.to_string(),
    }
}

fn is_file_link(url: &str) -> bool {
    url.starts_with("https://www.figma.com/file/")
}

impl FakeBrowser {
    fn tiles(&self) -> Vec<(String, String)> {
        let page = self.page.lock().unwrap();
        let world = self.world.lock().unwrap();
        page.user
            .as_ref()
            .and_then(|login| world.recent.get(login))
            .cloned()
            .unwrap_or_default()
    }

    fn tile(&self, element: &Element) -> Option<(String, String)> {
        let index: usize = element.0.strip_prefix("tile-")?.parse().ok()?;
        self.tiles().get(index).cloned()
    }

    fn find(&self, selector: &str) -> Vec<Element> {
        let page = self.page.lock().unwrap();
        let on_login = page.url == selectors::LOGIN_URL;
        let found = match selector {
            selectors::AUTH_BLOCK
            | selectors::AUTH_FIELD_LOGIN
            | selectors::AUTH_FIELD_PASSWORD
            | selectors::LOGIN_BUTTON => on_login,
            selectors::MENU_DRAFTS => page.user.is_some(),
            selectors::ROOT | selectors::QUICK_ACTIONS_INPUT => true,
            selectors::DOCUMENT_LOADED => {
                let world = self.world.lock().unwrap();
                let failures = world.fail_first.get(&page.url).copied().unwrap_or(0);
                let visits = world.visits.get(&page.url).copied().unwrap_or(0);
                is_file_link(&page.url) && visits > failures
            }
            selectors::RECENT_FILES => {
                drop(page);
                return (0..self.tiles().len())
                    .map(|i| Element(format!("tile-{i}")))
                    .collect();
            }
            _ => false,
        };
        if found {
            vec![Element(selector.to_string())]
        } else {
            Vec::new()
        }
    }

    fn save_current(&self) -> Result<()> {
        let page = self.page.lock().unwrap();
        if !is_file_link(&page.url) {
            return Ok(());
        }
        let mut world = self.world.lock().unwrap();
        if let Some(left) = world.lost_saves.get_mut(&page.url) {
            if *left > 0 {
                *left -= 1;
                return Ok(());
            }
        }
        // Like Chrome: the first name not already present in the download directory.
        let title = derive_title(&page.url);
        let mut path = self.staging.join(format!("{title}.fig"));
        let mut n = 1;
        while path.exists() {
            path = self.staging.join(format!("{title} ({n}).fig"));
            n += 1;
        }
        std::fs::write(path, b"figma")?;
        Ok(())
    }
}

#[async_trait]
impl AutomationChannel for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut world = self.world.lock().unwrap();
        world.navigations.push(url.to_string());
        *world.visits.entry(url.to_string()).or_insert(0) += 1;
        self.page.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, _timeout: Duration) -> Result<Element> {
        self.find(selector)
            .into_iter()
            .next()
            .ok_or_else(|| not_found(selector))
    }

    async fn wait_for_visible(&self, _element: &Element, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(self.find(selector))
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        match element.0.as_str() {
            selectors::AUTH_FIELD_LOGIN => self.page.lock().unwrap().login_typed = text.to_string(),
            selectors::AUTH_FIELD_PASSWORD => {
                self.page.lock().unwrap().password_typed = text.to_string();
            }
            selectors::QUICK_ACTIONS_INPUT if text == keys::ENTER => self.save_current()?,
            _ => {}
        }
        Ok(())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        if element.0 == selectors::LOGIN_BUTTON {
            let world = self.world.lock().unwrap();
            let mut page = self.page.lock().unwrap();
            if world.accounts.get(&page.login_typed) == Some(&page.password_typed) {
                page.user = Some(page.login_typed.clone());
            }
        }
        Ok(())
    }

    async fn sleep(&self, _duration: Duration) {}

    async fn get_attribute(&self, element: &Element, name: &str) -> Result<String> {
        let (href, html) = self.tile(element).ok_or_else(|| not_found(&element.0))?;
        Ok(match name {
            "href" => href,
            "innerHTML" => html,
            _ => String::new(),
        })
    }
}

pub struct FakeSessions {
    pub world: SharedWorld,
}

#[async_trait]
impl SessionFactory for FakeSessions {
    type Channel = FakeBrowser;

    async fn open(&self, download_dir: &Path) -> Result<FakeBrowser> {
        let mut world = self.world.lock().unwrap();
        if world.fail_open {
            return Err(Error::WebDriver("session not created: chrome not reachable".to_string()));
        }
        world.opened += 1;
        Ok(FakeBrowser {
            world: Arc::clone(&self.world),
            staging: download_dir.to_path_buf(),
            page: Mutex::new(Page::default()),
        })
    }

    async fn close(&self, _channel: FakeBrowser) -> Result<()> {
        self.world.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Catalog answering from fixed tables.
#[derive(Default)]
pub struct FakeCatalog {
    /// team id -> projects; teams missing here fail to list
    pub projects: HashMap<String, Vec<Project>>,
    /// project id -> files; projects missing here fail to list
    pub files: HashMap<String, Vec<FileRecord>>,
}

impl FakeCatalog {
    pub fn with_project(mut self, team: &str, id: &str, name: &str, files: Vec<FileRecord>) -> Self {
        self.projects.entry(team.to_string()).or_default().push(Project {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.files.insert(id.to_string(), files);
        self
    }

    pub fn with_broken_project(mut self, team: &str, id: &str, name: &str) -> Self {
        self.projects.entry(team.to_string()).or_default().push(Project {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn list_projects(&self, team: &Team, _token: &str) -> Result<Vec<Project>> {
        self.projects
            .get(&team.id)
            .cloned()
            .ok_or_else(|| Error::CatalogUnavailable {
                url: format!("teams/{}/projects", team.id),
                attempts: 10,
            })
    }

    async fn list_files(&self, project_id: &str, _token: &str) -> Result<Vec<FileRecord>> {
        self.files
            .get(project_id)
            .cloned()
            .ok_or_else(|| Error::CatalogUnavailable {
                url: format!("projects/{project_id}/files"),
                attempts: 10,
            })
    }
}

pub fn file(key: &str, name: &str, last_modified: &str) -> FileRecord {
    FileRecord {
        key: key.to_string(),
        name: name.to_string(),
        last_modified: last_modified.to_string(),
    }
}

pub fn tile(key: &str, title: &str, edited: &str) -> (String, String) {
    (
        format!("https://www.figma.com/file/{key}/{}", title.replace(' ', "-")),
        format!(
            r#"<div class="generic_tile--title--x1 ellipsis">{title}</div><div>Edited <span>{edited}</span></div>"#
        ),
    )
}
