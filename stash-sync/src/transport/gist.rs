//! The document host behind the gist provider.
//!
//! A document host stores named documents, each a set of files addressed by
//! filename. [`DocumentHost`] is the seam: the provider creates, updates,
//! fetches, and deletes documents and never sees HTTP. [`GithubGists`]
//! implements it against the GitHub gist API; [`MockDocumentHost`] is the
//! in-memory stand-in for tests.
//!
//! The credential travels as an argument on every call rather than living
//! in the host, so one host instance can serve connection tests with a
//! candidate token and regular syncs with the stored one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stash_types::Token;

/// Where the real API lives.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the document host, by HTTP outcome class.
#[derive(Debug, Error)]
pub enum HostError {
    /// The credential was rejected (401).
    #[error("credential rejected: {0}")]
    Auth(String),

    /// The credential lacks the required scope (403).
    #[error("credential lacks required scope: {0}")]
    Scope(String),

    /// The host is rate limiting this client (403 with a rate-limit
    /// body, or 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// No document at this handle (404).
    #[error("document not found: {0}")]
    NotFound(String),

    /// The request never completed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The host answered with something unparsable.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// One file inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    /// The file's full content.
    pub content: String,
}

/// A document's files, by filename.
pub type DocumentFiles = BTreeMap<String, DocumentFile>;

/// Where a document lives after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    /// The host-assigned id, used for later updates and fetches.
    pub id: String,
    /// A browser-openable URL for the document, when the host has one.
    pub url: Option<String>,
}

/// A host that stores named multi-file documents.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// The login of the account `token` belongs to.
    async fn viewer(&self, token: &Token) -> Result<String, HostError>;

    /// Create a document and return its handle.
    async fn create_document(
        &self,
        token: &Token,
        description: &str,
        files: DocumentFiles,
        public: bool,
    ) -> Result<DocumentHandle, HostError>;

    /// Update an existing document. Files merge by name; files not named
    /// here keep their current content.
    async fn update_document(
        &self,
        token: &Token,
        id: &str,
        description: &str,
        files: DocumentFiles,
    ) -> Result<DocumentHandle, HostError>;

    /// Fetch a document's files.
    async fn get_document(&self, token: &Token, id: &str) -> Result<DocumentFiles, HostError>;

    /// Delete a document.
    async fn delete_document(&self, token: &Token, id: &str) -> Result<(), HostError>;
}

/// Classify a non-success HTTP status into a [`HostError`].
///
/// GitHub reports rate limiting as 403 with an explanatory body, so the
/// body is consulted for that status.
pub fn classify_status(status: u16, body: &str) -> HostError {
    match status {
        401 => HostError::Auth("the host rejected the credential (401)".to_owned()),
        403 if body.to_lowercase().contains("rate limit") => {
            HostError::RateLimited("the host is rate limiting this client (403)".to_owned())
        }
        403 => HostError::Scope("the credential lacks the gist scope (403)".to_owned()),
        404 => HostError::NotFound("no document at this id (404)".to_owned()),
        429 => HostError::RateLimited("the host asked this client to back off (429)".to_owned()),
        _ => HostError::Transport(format!("unexpected status {status}: {}", snippet(body))),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(120).collect()
}

#[derive(Serialize)]
struct GistWrite<'a> {
    description: &'a str,
    // Visibility is fixed at creation; updates must not send it.
    #[serde(skip_serializing_if = "Option::is_none")]
    public: Option<bool>,
    files: &'a DocumentFiles,
}

#[derive(Deserialize)]
struct GistRead {
    id: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    files: DocumentFiles,
}

#[derive(Deserialize)]
struct ViewerRead {
    login: String,
}

/// [`DocumentHost`] backed by the GitHub gist API.
#[derive(Debug, Clone)]
pub struct GithubGists {
    base_url: String,
    http: reqwest::Client,
}

impl GithubGists {
    /// Client against the public GitHub API.
    pub fn new() -> Result<Self, HostError> {
        Self::with_base_url(GITHUB_API_URL)
    }

    /// Client against `base_url`, for enterprise hosts and test servers.
    pub fn with_base_url(base_url: &str) -> Result<Self, HostError> {
        // GitHub refuses requests without a user agent.
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("tabstash-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| HostError::Transport(error.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder, token: &Token) -> reqwest::RequestBuilder {
        request
            .header(header::AUTHORIZATION, format!("token {}", token.as_str()))
            .header(header::ACCEPT, "application/vnd.github.v3+json")
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, HostError> {
        let response = request
            .send()
            .await
            .map_err(|error| HostError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }

    async fn read_gist(response: reqwest::Response) -> Result<GistRead, HostError> {
        response
            .json()
            .await
            .map_err(|error| HostError::UnexpectedResponse(error.to_string()))
    }
}

#[async_trait]
impl DocumentHost for GithubGists {
    async fn viewer(&self, token: &Token) -> Result<String, HostError> {
        let url = format!("{}/user", self.base_url);
        let response = self.send(self.authed(self.http.get(&url), token)).await?;
        let viewer: ViewerRead = response
            .json()
            .await
            .map_err(|error| HostError::UnexpectedResponse(error.to_string()))?;
        Ok(viewer.login)
    }

    async fn create_document(
        &self,
        token: &Token,
        description: &str,
        files: DocumentFiles,
        public: bool,
    ) -> Result<DocumentHandle, HostError> {
        let url = format!("{}/gists", self.base_url);
        let body = GistWrite {
            description,
            public: Some(public),
            files: &files,
        };
        let response = self
            .send(self.authed(self.http.post(&url), token).json(&body))
            .await?;
        let gist = Self::read_gist(response).await?;
        Ok(DocumentHandle {
            id: gist.id,
            url: gist.html_url,
        })
    }

    async fn update_document(
        &self,
        token: &Token,
        id: &str,
        description: &str,
        files: DocumentFiles,
    ) -> Result<DocumentHandle, HostError> {
        let url = format!("{}/gists/{id}", self.base_url);
        let body = GistWrite {
            description,
            public: None,
            files: &files,
        };
        let response = self
            .send(self.authed(self.http.patch(&url), token).json(&body))
            .await?;
        let gist = Self::read_gist(response).await?;
        Ok(DocumentHandle {
            id: gist.id,
            url: gist.html_url,
        })
    }

    async fn get_document(&self, token: &Token, id: &str) -> Result<DocumentFiles, HostError> {
        let url = format!("{}/gists/{id}", self.base_url);
        let response = self.send(self.authed(self.http.get(&url), token)).await?;
        let gist = Self::read_gist(response).await?;
        Ok(gist.files)
    }

    async fn delete_document(&self, token: &Token, id: &str) -> Result<(), HostError> {
        let url = format!("{}/gists/{id}", self.base_url);
        self.send(self.authed(self.http.delete(&url), token))
            .await?;
        Ok(())
    }
}

struct MockDocument {
    description: String,
    public: bool,
    files: DocumentFiles,
}

#[derive(Default)]
struct MockHostInner {
    login: String,
    documents: BTreeMap<String, MockDocument>,
    next_id: usize,
    calls: Vec<&'static str>,
    deleted: Vec<String>,
    fail_next_viewer: Option<HostError>,
    fail_next_create: Option<HostError>,
    fail_next_update: Option<HostError>,
    fail_next_get: Option<HostError>,
    fail_next_delete: Option<HostError>,
}

/// In-memory [`DocumentHost`] for tests.
///
/// Records every call, assigns sequential document ids, and can inject one
/// failure per method through the `fail_next_*` switches. Clones share
/// state, so a test keeps a handle while the provider owns another.
#[derive(Clone)]
pub struct MockDocumentHost {
    inner: Arc<Mutex<MockHostInner>>,
}

impl MockDocumentHost {
    /// A host whose viewer resolves to "octocat".
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockHostInner {
                login: "octocat".to_owned(),
                next_id: 1,
                ..Default::default()
            })),
        }
    }

    /// Override the viewer login.
    pub fn with_login(self, login: impl Into<String>) -> Self {
        self.inner.lock().unwrap().login = login.into();
        self
    }

    /// Pre-seed a document under a fixed id.
    pub fn seed_document(&self, id: impl Into<String>, files: DocumentFiles) {
        self.inner.lock().unwrap().documents.insert(
            id.into(),
            MockDocument {
                description: String::new(),
                public: false,
                files,
            },
        );
    }

    /// A stored document's files.
    pub fn document(&self, id: &str) -> Option<DocumentFiles> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(id)
            .map(|doc| doc.files.clone())
    }

    /// A stored document's description and visibility.
    pub fn document_meta(&self, id: &str) -> Option<(String, bool)> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(id)
            .map(|doc| (doc.description.clone(), doc.public))
    }

    /// Every call made so far, by method name.
    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// How many calls reached the host.
    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    /// Ids passed to successful deletes.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted.clone()
    }

    /// Make the next `viewer` call fail with `error`.
    pub fn fail_next_viewer(&self, error: HostError) {
        self.inner.lock().unwrap().fail_next_viewer = Some(error);
    }

    /// Make the next `create_document` call fail with `error`.
    pub fn fail_next_create(&self, error: HostError) {
        self.inner.lock().unwrap().fail_next_create = Some(error);
    }

    /// Make the next `update_document` call fail with `error`.
    pub fn fail_next_update(&self, error: HostError) {
        self.inner.lock().unwrap().fail_next_update = Some(error);
    }

    /// Make the next `get_document` call fail with `error`.
    pub fn fail_next_get(&self, error: HostError) {
        self.inner.lock().unwrap().fail_next_get = Some(error);
    }

    /// Make the next `delete_document` call fail with `error`.
    pub fn fail_next_delete(&self, error: HostError) {
        self.inner.lock().unwrap().fail_next_delete = Some(error);
    }

    fn handle(id: &str) -> DocumentHandle {
        DocumentHandle {
            id: id.to_owned(),
            url: Some(format!("https://gists.example/{id}")),
        }
    }
}

impl Default for MockDocumentHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentHost for MockDocumentHost {
    async fn viewer(&self, _token: &Token) -> Result<String, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("viewer");
        if let Some(error) = inner.fail_next_viewer.take() {
            return Err(error);
        }
        Ok(inner.login.clone())
    }

    async fn create_document(
        &self,
        _token: &Token,
        description: &str,
        files: DocumentFiles,
        public: bool,
    ) -> Result<DocumentHandle, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("create");
        if let Some(error) = inner.fail_next_create.take() {
            return Err(error);
        }
        let id = format!("gist-{}", inner.next_id);
        inner.next_id += 1;
        inner.documents.insert(
            id.clone(),
            MockDocument {
                description: description.to_owned(),
                public,
                files,
            },
        );
        Ok(Self::handle(&id))
    }

    async fn update_document(
        &self,
        _token: &Token,
        id: &str,
        description: &str,
        files: DocumentFiles,
    ) -> Result<DocumentHandle, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("update");
        if let Some(error) = inner.fail_next_update.take() {
            return Err(error);
        }
        let document = inner
            .documents
            .get_mut(id)
            .ok_or_else(|| HostError::NotFound(format!("no document {id}")))?;
        document.description = description.to_owned();
        document.files.extend(files);
        Ok(Self::handle(id))
    }

    async fn get_document(&self, _token: &Token, id: &str) -> Result<DocumentFiles, HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("get");
        if let Some(error) = inner.fail_next_get.take() {
            return Err(error);
        }
        inner
            .documents
            .get(id)
            .map(|doc| doc.files.clone())
            .ok_or_else(|| HostError::NotFound(format!("no document {id}")))
    }

    async fn delete_document(&self, _token: &Token, id: &str) -> Result<(), HostError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("delete");
        if let Some(error) = inner.fail_next_delete.take() {
            return Err(error);
        }
        if inner.documents.remove(id).is_none() {
            return Err(HostError::NotFound(format!("no document {id}")));
        }
        inner.deleted.push(id.to_owned());
        Ok(())
    }
}
