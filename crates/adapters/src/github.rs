// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git hosting adapter.
//!
//! The atomic multi-file commit contract rides the Git Data API: blobs and
//! trees are created first, then a commit, then a fast-forward-only ref
//! update. A non-fast-forward rejection means another writer won the race;
//! the caller retries the whole pipeline.

use async_trait::async_trait;
use fm_core::ErrorClass;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Errors from the git hosting boundary.
#[derive(Debug, Clone, Error)]
pub enum GitHostError {
    #[error("branch not found: {0}")]
    BranchNotFound(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("non-fast-forward update of {0}")]
    NonFastForward(String),
    #[error("git host returned {0}: {1}")]
    Status(u16, String),
    #[error("git host request timed out: {0}")]
    Timeout(String),
    #[error("git host transport error: {0}")]
    Transport(String),
}

impl GitHostError {
    pub fn error_class(&self) -> ErrorClass {
        match self {
            GitHostError::Timeout(_) => ErrorClass::NetworkTimeout,
            GitHostError::BranchNotFound(_) | GitHostError::PathNotFound(_) => {
                ErrorClass::InvalidInput
            }
            _ => ErrorClass::ExternalFailure,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if crate::http::is_timeout(&err) {
            GitHostError::Timeout(err.to_string())
        } else {
            GitHostError::Transport(err.to_string())
        }
    }
}

/// A branch head: commit SHA plus its root tree SHA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    pub commit_sha: String,
    pub tree_sha: String,
}

/// One entry for a tree create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob_sha: String,
}

/// Directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
}

/// A commit summary for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

/// The git hosting contract the push pipeline and read tools consume.
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Resolve a branch to its head commit and tree.
    async fn branch_head(&self, branch: &str) -> Result<CommitRef, GitHostError>;
    /// Create a raw UTF-8 blob (no base64 round-trip). Returns the blob SHA.
    async fn create_blob(&self, content: &str) -> Result<String, GitHostError>;
    /// Create a tree on top of `base_tree`. Returns the tree SHA.
    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, GitHostError>;
    /// Create a commit with a single parent. Returns the commit SHA.
    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, GitHostError>;
    /// Fast-forward the branch ref. Rejects non-fast-forward updates.
    async fn update_ref(&self, branch: &str, commit_sha: &str) -> Result<(), GitHostError>;
    /// Read a file as raw text at a ref (contents API, 10k-truncating).
    async fn read_raw(&self, path: &str, git_ref: &str) -> Result<String, GitHostError>;
    /// Read a full file via the tree + blob API (no truncation).
    async fn read_full(&self, path: &str, git_ref: &str) -> Result<String, GitHostError>;
    async fn list_dir(&self, path: &str, git_ref: &str) -> Result<Vec<FileEntry>, GitHostError>;
    /// Flat path listing of the tree at a ref.
    async fn tree_paths(&self, git_ref: &str, recursive: bool)
        -> Result<Vec<String>, GitHostError>;
    async fn search_code(&self, query: &str) -> Result<Value, GitHostError>;
    async fn log(&self, path: Option<&str>, limit: u32) -> Result<Vec<CommitInfo>, GitHostError>;
    async fn diff(&self, base: &str, head: &str) -> Result<String, GitHostError>;
    async fn blame(&self, path: &str, git_ref: &str) -> Result<Value, GitHostError>;
}

const GIT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// REST + GraphQL client for a GitHub-shaped hosting API.
pub struct GithubClient {
    http: reqwest::Client,
    base: String,
    repo: String,
    token: String,
}

impl GithubClient {
    pub fn new(base: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: crate::http::client(GIT_HTTP_TIMEOUT),
            base: base.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.base, self.repo, path)
    }

    async fn get_json(&self, url: &str) -> Result<Value, GitHostError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(GitHostError::from_reqwest)?;
        Self::json_body(resp).await
    }

    async fn get_text(&self, url: &str, accept: &str) -> Result<String, GitHostError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", accept)
            .send()
            .await
            .map_err(GitHostError::from_reqwest)?;
        let status = resp.status();
        let body = resp.text().await.map_err(GitHostError::from_reqwest)?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GitHostError::PathNotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(GitHostError::Status(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn post_json(&self, url: &str, body: Value) -> Result<Value, GitHostError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(GitHostError::from_reqwest)?;
        Self::json_body(resp).await
    }

    async fn json_body(resp: reqwest::Response) -> Result<Value, GitHostError> {
        let status = resp.status();
        let body = resp.text().await.map_err(GitHostError::from_reqwest)?;
        if !status.is_success() {
            return Err(GitHostError::Status(status.as_u16(), body));
        }
        serde_json::from_str(&body).map_err(|e| GitHostError::Transport(e.to_string()))
    }

    fn str_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a str, GitHostError> {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .ok_or_else(|| GitHostError::Transport(format!("missing field {pointer}")))
    }
}

#[async_trait]
impl GitHost for GithubClient {
    async fn branch_head(&self, branch: &str) -> Result<CommitRef, GitHostError> {
        let url = self.url(&format!("git/ref/heads/{branch}"));
        let git_ref = match self.get_json(&url).await {
            Err(GitHostError::Status(404, _)) => {
                return Err(GitHostError::BranchNotFound(branch.to_string()))
            }
            other => other?,
        };
        let commit_sha = Self::str_at(&git_ref, "/object/sha")?.to_string();
        let commit = self.get_json(&self.url(&format!("git/commits/{commit_sha}"))).await?;
        let tree_sha = Self::str_at(&commit, "/tree/sha")?.to_string();
        Ok(CommitRef { commit_sha, tree_sha })
    }

    async fn create_blob(&self, content: &str) -> Result<String, GitHostError> {
        let body = json!({ "content": content, "encoding": "utf-8" });
        let created = self.post_json(&self.url("git/blobs"), body).await?;
        Ok(Self::str_at(&created, "/sha")?.to_string())
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, GitHostError> {
        let tree: Vec<Value> = entries
            .iter()
            .map(|e| json!({ "path": e.path, "mode": "100644", "type": "blob", "sha": e.blob_sha }))
            .collect();
        let body = json!({ "base_tree": base_tree, "tree": tree });
        let created = self.post_json(&self.url("git/trees"), body).await?;
        Ok(Self::str_at(&created, "/sha")?.to_string())
    }

    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, GitHostError> {
        let body = json!({ "message": message, "tree": tree_sha, "parents": [parent_sha] });
        let created = self.post_json(&self.url("git/commits"), body).await?;
        Ok(Self::str_at(&created, "/sha")?.to_string())
    }

    async fn update_ref(&self, branch: &str, commit_sha: &str) -> Result<(), GitHostError> {
        let url = self.url(&format!("git/refs/heads/{branch}"));
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&json!({ "sha": commit_sha, "force": false }))
            .send()
            .await
            .map_err(GitHostError::from_reqwest)?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(GitHostError::NonFastForward(branch.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GitHostError::Status(status.as_u16(), body));
        }
        Ok(())
    }

    async fn read_raw(&self, path: &str, git_ref: &str) -> Result<String, GitHostError> {
        let url = self.url(&format!("contents/{path}?ref={git_ref}"));
        self.get_text(&url, "application/vnd.github.raw").await
    }

    async fn read_full(&self, path: &str, git_ref: &str) -> Result<String, GitHostError> {
        // Tree + blob path: the contents API truncates large files.
        let tree = self.get_json(&self.url(&format!("git/trees/{git_ref}?recursive=1"))).await?;
        let blob_sha = tree
            .pointer("/tree")
            .and_then(Value::as_array)
            .and_then(|entries| {
                entries.iter().find(|e| e.pointer("/path").and_then(Value::as_str) == Some(path))
            })
            .and_then(|e| e.pointer("/sha").and_then(Value::as_str))
            .ok_or_else(|| GitHostError::PathNotFound(path.to_string()))?
            .to_string();
        let url = self.url(&format!("git/blobs/{blob_sha}"));
        self.get_text(&url, "application/vnd.github.raw").await
    }

    async fn list_dir(&self, path: &str, git_ref: &str) -> Result<Vec<FileEntry>, GitHostError> {
        let url = self.url(&format!("contents/{path}?ref={git_ref}"));
        let listing = self.get_json(&url).await?;
        serde_json::from_value(listing).map_err(|e| GitHostError::Transport(e.to_string()))
    }

    async fn tree_paths(
        &self,
        git_ref: &str,
        recursive: bool,
    ) -> Result<Vec<String>, GitHostError> {
        let suffix = if recursive { "?recursive=1" } else { "" };
        let tree = self.get_json(&self.url(&format!("git/trees/{git_ref}{suffix}"))).await?;
        Ok(tree
            .pointer("/tree")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.pointer("/path").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search_code(&self, query: &str) -> Result<Value, GitHostError> {
        let url = format!("{}/search/code?q={}+repo:{}", self.base, query, self.repo);
        self.get_json(&url).await
    }

    async fn log(&self, path: Option<&str>, limit: u32) -> Result<Vec<CommitInfo>, GitHostError> {
        let mut url = self.url(&format!("commits?per_page={limit}"));
        if let Some(p) = path {
            url.push_str(&format!("&path={p}"));
        }
        let commits = self.get_json(&url).await?;
        Ok(commits
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|c| CommitInfo {
                        sha: c.pointer("/sha").and_then(Value::as_str).unwrap_or("").to_string(),
                        message: c
                            .pointer("/commit/message")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        author: c
                            .pointer("/commit/author/name")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        date: c
                            .pointer("/commit/author/date")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn diff(&self, base: &str, head: &str) -> Result<String, GitHostError> {
        let url = self.url(&format!("compare/{base}...{head}"));
        self.get_text(&url, "application/vnd.github.diff").await
    }

    async fn blame(&self, path: &str, git_ref: &str) -> Result<Value, GitHostError> {
        let query = r#"query($owner: String!, $name: String!, $ref: String!, $path: String!) {
  repository(owner: $owner, name: $name) {
    object(expression: $ref) {
      ... on Commit { blame(path: $path) { ranges {
        startingLine endingLine commit { oid author { name } }
      } } }
    }
  }
}"#;
        let (owner, name) = self.repo.split_once('/').unwrap_or((self.repo.as_str(), ""));
        let body = json!({
            "query": query,
            "variables": { "owner": owner, "name": name, "ref": git_ref, "path": path },
        });
        let url = format!("{}/graphql", self.base);
        self.post_json(&url, body).await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGitHost;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use sha2::{Digest, Sha256};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, Clone)]
    struct FakeCommit {
        tree_sha: String,
        parent: Option<String>,
        message: String,
    }

    #[derive(Default)]
    struct Inner {
        branches: HashMap<String, String>,
        commits: HashMap<String, FakeCommit>,
        trees: HashMap<String, BTreeMap<String, String>>,
        blobs: HashMap<String, String>,
    }

    /// In-memory git host with content-addressed blobs and trees, enforcing
    /// the fast-forward ref contract.
    pub struct FakeGitHost {
        inner: Mutex<Inner>,
    }

    fn hex(digest: &[u8]) -> String {
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }

    fn hash(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for p in parts {
            hasher.update(p.as_bytes());
            hasher.update([0]);
        }
        hex(&hasher.finalize())[..40].to_string()
    }

    impl FakeGitHost {
        pub fn new() -> Self {
            Self { inner: Mutex::new(Inner::default()) }
        }

        /// Create a branch seeded with the given files in one root commit.
        pub fn seed_branch(&self, branch: &str, files: &[(&str, &str)]) -> String {
            let mut inner = self.inner.lock();
            let mut tree = BTreeMap::new();
            for (path, content) in files {
                let blob_sha = hash(&["blob", content]);
                inner.blobs.insert(blob_sha.clone(), content.to_string());
                tree.insert(path.to_string(), blob_sha);
            }
            let tree_sha = Self::tree_hash(&tree);
            inner.trees.insert(tree_sha.clone(), tree);
            let commit_sha = hash(&["commit", &tree_sha, "", "seed"]);
            inner.commits.insert(
                commit_sha.clone(),
                FakeCommit { tree_sha, parent: None, message: "seed".into() },
            );
            inner.branches.insert(branch.to_string(), commit_sha.clone());
            commit_sha
        }

        /// Current tip of a branch.
        pub fn head_of(&self, branch: &str) -> Option<String> {
            self.inner.lock().branches.get(branch).cloned()
        }

        /// File content at the current tip of a branch.
        pub fn file_at_head(&self, branch: &str, path: &str) -> Option<String> {
            let inner = self.inner.lock();
            let commit_sha = inner.branches.get(branch)?;
            let commit = inner.commits.get(commit_sha)?;
            let tree = inner.trees.get(&commit.tree_sha)?;
            let blob_sha = tree.get(path)?;
            inner.blobs.get(blob_sha).cloned()
        }

        /// Tree SHA at the tip of a branch.
        pub fn tree_at_head(&self, branch: &str) -> Option<String> {
            let inner = self.inner.lock();
            let commit_sha = inner.branches.get(branch)?;
            inner.commits.get(commit_sha).map(|c| c.tree_sha.clone())
        }

        fn tree_hash(tree: &BTreeMap<String, String>) -> String {
            let flat: Vec<String> =
                tree.iter().map(|(path, sha)| format!("{path}:{sha}")).collect();
            let refs: Vec<&str> = flat.iter().map(String::as_str).collect();
            let mut parts = vec!["tree"];
            parts.extend(refs);
            hash(&parts)
        }

        fn resolve_tree(inner: &Inner, git_ref: &str) -> Option<BTreeMap<String, String>> {
            let commit_sha = inner.branches.get(git_ref).cloned().or_else(|| {
                inner.commits.contains_key(git_ref).then(|| git_ref.to_string())
            })?;
            let commit = inner.commits.get(&commit_sha)?;
            inner.trees.get(&commit.tree_sha).cloned()
        }
    }

    impl Default for FakeGitHost {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl GitHost for FakeGitHost {
        async fn branch_head(&self, branch: &str) -> Result<CommitRef, GitHostError> {
            let inner = self.inner.lock();
            let commit_sha = inner
                .branches
                .get(branch)
                .ok_or_else(|| GitHostError::BranchNotFound(branch.to_string()))?;
            let commit = inner
                .commits
                .get(commit_sha)
                .ok_or_else(|| GitHostError::Transport("dangling branch".into()))?;
            Ok(CommitRef { commit_sha: commit_sha.clone(), tree_sha: commit.tree_sha.clone() })
        }

        async fn create_blob(&self, content: &str) -> Result<String, GitHostError> {
            let sha = hash(&["blob", content]);
            self.inner.lock().blobs.insert(sha.clone(), content.to_string());
            Ok(sha)
        }

        async fn create_tree(
            &self,
            base_tree: &str,
            entries: &[TreeEntry],
        ) -> Result<String, GitHostError> {
            let mut inner = self.inner.lock();
            let mut tree = inner
                .trees
                .get(base_tree)
                .cloned()
                .ok_or_else(|| GitHostError::Transport(format!("unknown tree {base_tree}")))?;
            for entry in entries {
                tree.insert(entry.path.clone(), entry.blob_sha.clone());
            }
            let sha = Self::tree_hash(&tree);
            inner.trees.insert(sha.clone(), tree);
            Ok(sha)
        }

        async fn create_commit(
            &self,
            message: &str,
            tree_sha: &str,
            parent_sha: &str,
        ) -> Result<String, GitHostError> {
            let sha = hash(&["commit", tree_sha, parent_sha, message]);
            self.inner.lock().commits.insert(
                sha.clone(),
                FakeCommit {
                    tree_sha: tree_sha.to_string(),
                    parent: Some(parent_sha.to_string()),
                    message: message.to_string(),
                },
            );
            Ok(sha)
        }

        async fn update_ref(&self, branch: &str, commit_sha: &str) -> Result<(), GitHostError> {
            let mut inner = self.inner.lock();
            let current = inner
                .branches
                .get(branch)
                .cloned()
                .ok_or_else(|| GitHostError::BranchNotFound(branch.to_string()))?;
            let new_commit = inner
                .commits
                .get(commit_sha)
                .ok_or_else(|| GitHostError::Transport(format!("unknown commit {commit_sha}")))?;
            if new_commit.parent.as_deref() != Some(current.as_str()) {
                return Err(GitHostError::NonFastForward(branch.to_string()));
            }
            inner.branches.insert(branch.to_string(), commit_sha.to_string());
            Ok(())
        }

        async fn read_raw(&self, path: &str, git_ref: &str) -> Result<String, GitHostError> {
            let inner = self.inner.lock();
            let tree = Self::resolve_tree(&inner, git_ref)
                .ok_or_else(|| GitHostError::BranchNotFound(git_ref.to_string()))?;
            let blob_sha =
                tree.get(path).ok_or_else(|| GitHostError::PathNotFound(path.to_string()))?;
            inner
                .blobs
                .get(blob_sha)
                .cloned()
                .ok_or_else(|| GitHostError::Transport("dangling blob".into()))
        }

        async fn read_full(&self, path: &str, git_ref: &str) -> Result<String, GitHostError> {
            self.read_raw(path, git_ref).await
        }

        async fn list_dir(
            &self,
            path: &str,
            git_ref: &str,
        ) -> Result<Vec<FileEntry>, GitHostError> {
            let inner = self.inner.lock();
            let tree = Self::resolve_tree(&inner, git_ref)
                .ok_or_else(|| GitHostError::BranchNotFound(git_ref.to_string()))?;
            let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
            Ok(tree
                .keys()
                .filter(|p| p.starts_with(&prefix))
                .map(|p| FileEntry { path: p.clone(), kind: "file".into(), size: 0 })
                .collect())
        }

        async fn tree_paths(
            &self,
            git_ref: &str,
            _recursive: bool,
        ) -> Result<Vec<String>, GitHostError> {
            let inner = self.inner.lock();
            let tree = Self::resolve_tree(&inner, git_ref)
                .ok_or_else(|| GitHostError::BranchNotFound(git_ref.to_string()))?;
            Ok(tree.keys().cloned().collect())
        }

        async fn search_code(&self, _query: &str) -> Result<Value, GitHostError> {
            Ok(json!({ "items": [] }))
        }

        async fn log(
            &self,
            _path: Option<&str>,
            limit: u32,
        ) -> Result<Vec<CommitInfo>, GitHostError> {
            let inner = self.inner.lock();
            Ok(inner
                .commits
                .iter()
                .take(limit as usize)
                .map(|(sha, c)| CommitInfo {
                    sha: sha.clone(),
                    message: c.message.clone(),
                    author: "fake".into(),
                    date: String::new(),
                })
                .collect())
        }

        async fn diff(&self, base: &str, head: &str) -> Result<String, GitHostError> {
            Ok(format!("diff {base}...{head}"))
        }

        async fn blame(&self, path: &str, _git_ref: &str) -> Result<Value, GitHostError> {
            Ok(json!({ "path": path, "ranges": [] }))
        }
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
