//! GitHub gist API client.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{NewPage, Page};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub's maximum page size for the gist listing.
const PER_PAGE: usize = 100;

const USER_AGENT: &str = "gist";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("creating a gist requires GITHUB_TOKEN")]
    MissingToken,
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => ApiError::Status {
                code,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
        }
    }
}

/// Remote listing and creation of gists.
pub trait GistApi: Send + Sync {
    /// All gists owned by `user`.
    fn list(&self, user: &str) -> Result<Vec<Page>, ApiError>;

    /// Create a gist and return its metadata.
    fn create(&self, page: &NewPage) -> Result<Page, ApiError>;
}

impl<A: GistApi + ?Sized> GistApi for &A {
    fn list(&self, user: &str) -> Result<Vec<Page>, ApiError> {
        (**self).list(user)
    }

    fn create(&self, page: &NewPage) -> Result<Page, ApiError> {
        (**self).create(page)
    }
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiGist {
    id: String,
    description: Option<String>,
    git_pull_url: String,
    public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    files: BTreeMap<String, IgnoredAny>,
    owner: Option<ApiOwner>,
}

impl ApiGist {
    fn into_page(self, fallback_user: &str) -> Page {
        Page {
            user: self
                .owner
                .map(|o| o.login)
                .unwrap_or_else(|| fallback_user.to_string()),
            id: self.id,
            description: self.description.unwrap_or_default(),
            url: self.git_pull_url,
            public: self.public,
            created_at: self.created_at,
            updated_at: self.updated_at,
            files: self.files.into_keys().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateFile<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<&'a str, CreateFile<'a>>,
}

/// Blocking client for `api.github.com`.
pub struct GithubClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(GITHUB_API_URL, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: Option<String>) -> Self {
        let agent = ureq::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        let request = request.set("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.set("Authorization", &format!("token {}", token)),
            None => request,
        }
    }

    fn list_page(&self, user: &str, page: usize) -> Result<Vec<ApiGist>, ApiError> {
        let url = format!("{}/users/{}/gists", self.base_url, user);
        let response = self
            .authorize(self.agent.get(&url))
            .query("per_page", &PER_PAGE.to_string())
            .query("page", &page.to_string())
            .call()?;
        let mut body = String::new();
        response.into_reader().read_to_string(&mut body)?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl GistApi for GithubClient {
    fn list(&self, user: &str) -> Result<Vec<Page>, ApiError> {
        let mut pages = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_page(user, page)?;
            let done = batch.len() < PER_PAGE;
            log::debug!("Fetched {} gists (page {})", batch.len(), page);
            pages.extend(batch.into_iter().map(|g| g.into_page(user)));
            if done {
                break;
            }
            page += 1;
        }
        log::info!("Fetched {} gists for {}", pages.len(), user);
        Ok(pages)
    }

    fn create(&self, page: &NewPage) -> Result<Page, ApiError> {
        if self.token.is_none() {
            return Err(ApiError::MissingToken);
        }
        let body = serde_json::to_string(&create_request(page))?;
        let url = format!("{}/gists", self.base_url);
        let response = self
            .authorize(self.agent.post(&url))
            .set("Content-Type", "application/json")
            .send_string(&body)?;
        let mut text = String::new();
        response.into_reader().read_to_string(&mut text)?;
        let gist: ApiGist = serde_json::from_str(&text)?;
        let created = gist.into_page("");
        log::info!("Created gist {}", created.id);
        Ok(created)
    }
}

fn create_request(page: &NewPage) -> CreateRequest<'_> {
    CreateRequest {
        description: &page.description,
        public: page.public,
        files: page
            .files
            .iter()
            .map(|(name, content)| (name.as_str(), CreateFile { content }))
            .collect(),
    }
}
