//! Read-only catalog of teams, projects and files (Figma REST API).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::config::Team;
use crate::error::{Error, Result};
use crate::window::BackupWindow;

pub const API_BASE: &str = "https://api.figma.com/v1";
pub const FILE_URL_BASE: &str = "https://www.figma.com/file";
const TOKEN_HEADER: &str = "X-FIGMA-TOKEN";

/// Attempts per catalog call. The API times out often enough that retrying
/// immediately is worthwhile.
pub const MAX_ATTEMPTS: u32 = 10;

/// A project inside a team.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
}

/// A file as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    pub key: String,
    pub name: String,
    /// RFC 3339 timestamp.
    pub last_modified: String,
}

#[derive(Deserialize)]
struct ProjectList {
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct FileList {
    files: Vec<FileRecord>,
}

/// Project ids arrive as numbers from some endpoints and strings from others.
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

/// Source of candidate files.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Lists the projects of `team`.
    async fn list_projects(&self, team: &Team, token: &str) -> Result<Vec<Project>>;

    /// Lists the files of a project.
    async fn list_files(&self, project_id: &str, token: &str) -> Result<Vec<FileRecord>>;
}

/// [`Catalog`] backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: reqwest::Client,
    api_base: String,
    max_attempts: u32,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base(http, API_BASE)
    }

    /// Creates a catalog against a different API root.
    #[must_use]
    pub fn with_base(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Sets the number of attempts per call.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// GETs `url`, retrying immediately on any failure.
    async fn get_with_retry<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        for attempt in 1..=self.max_attempts {
            match self.get_once(url, token).await {
                Ok(body) => return Ok(body),
                Err(e) => log::warn!("{url} failed (attempt {attempt}/{}): {e}", self.max_attempts),
            }
        }
        Err(Error::CatalogUnavailable {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn list_projects(&self, team: &Team, token: &str) -> Result<Vec<Project>> {
        let url = format!("{}/teams/{}/projects", self.api_base, team.id);
        let list: ProjectList = self.get_with_retry(&url, token).await?;
        Ok(list.projects)
    }

    async fn list_files(&self, project_id: &str, token: &str) -> Result<Vec<FileRecord>> {
        let url = format!("{}/projects/{project_id}/files", self.api_base);
        let list: FileList = self.get_with_retry(&url, token).await?;
        Ok(list.files)
    }
}

/// A qualifying file together with where it belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFile {
    pub link: String,
    pub team: Team,
    pub project: Project,
    pub file: FileRecord,
}

/// Browser link of a file. Slashes in the name are escaped so the name stays
/// a single path segment.
#[must_use]
pub fn file_link(key: &str, name: &str) -> String {
    format!("{FILE_URL_BASE}/{key}/{}", name.replace('/', "%2F"))
}

/// Collects every file in `teams` that qualifies for `window`.
///
/// A team whose projects cannot be listed is logged and skipped. A project
/// whose files cannot be listed fails the whole call.
///
/// # Errors
///
/// Returns `CatalogUnavailable` (or the catalog's own error) when a file
/// list cannot be fetched.
pub async fn resolve_links<K: Catalog + ?Sized>(
    catalog: &K,
    teams: &[Team],
    token: &str,
    window: BackupWindow,
    now: DateTime<Utc>,
) -> Result<Vec<LinkedFile>> {
    let mut projects = Vec::new();
    for team in teams {
        match catalog.list_projects(team, token).await {
            Ok(found) => {
                log::debug!("team {}: {} project(s)", team.name, found.len());
                projects.extend(found.into_iter().map(|p| (team, p)));
            }
            Err(e) => log::error!("skipping team {} ({}): {e}", team.name, team.id),
        }
    }

    let mut links = Vec::new();
    for (team, project) in projects {
        let files = catalog.list_files(&project.id, token).await?;
        links.extend(
            files
                .into_iter()
                .filter(|f| window.admits_timestamp_text(&f.last_modified, now))
                .map(|file| LinkedFile {
                    link: file_link(&file.key, &file.name),
                    team: team.clone(),
                    project: project.clone(),
                    file,
                }),
        );
    }
    Ok(links)
}
