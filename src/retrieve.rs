//! Retrieval of external schema documents.
//!
//! A [`Fetch`] implementation turns a document URI into one future per
//! candidate source (a mirrored local file, the `file://` path, the HTTP
//! URL). The candidates race; the first one that yields a JSON document wins
//! and the others are abandoned. [`SchemaRegistryBuilder::retrieve_missing`]
//! uses this to fill in every document the registered schemas reference.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use url::Url;

use crate::error::FetchError;
use crate::loader::SchemaBaseConfig;
use crate::registry::SchemaRegistryBuilder;

/// Upper bound on fetch rounds; each round may discover new references.
const MAX_ROUNDS: usize = 16;

/// One way of obtaining a document.
pub type Candidate = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// Cooperative cancellation shared between a caller and running fetches.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // The sender lives as long as any token clone, so this only
                // happens while shutting down; never resolve.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces the candidate sources for a document.
pub trait Fetch: Send + Sync {
    fn candidates(&self, uri: &Url) -> Vec<Candidate>;
}

impl<F> Fetch for F
where
    F: Fn(&Url) -> Vec<Candidate> + Send + Sync,
{
    fn candidates(&self, uri: &Url) -> Vec<Candidate> {
        self(uri)
    }
}

/// Outcome of [`first_matching`].
#[derive(Debug, Clone, PartialEq)]
pub enum Race<T> {
    /// A candidate satisfied the predicate.
    Matched(T),
    /// Every candidate finished without satisfying it; their outputs in
    /// completion order.
    Exhausted(Vec<T>),
    Cancelled,
}

/// Run all candidates concurrently and return the first output accepted by
/// `predicate`.
///
/// Each candidate runs as its own task, so a slow or failing one never holds
/// up the others. Cancellation is checked before every completion is
/// consumed. Tasks still running when this returns are left to finish on
/// their own; their outputs are dropped.
pub async fn first_matching<T, P>(
    candidates: Vec<Pin<Box<dyn Future<Output = T> + Send>>>,
    predicate: P,
    token: &CancellationToken,
) -> Race<T>
where
    T: Send + 'static,
    P: Fn(&T) -> bool,
{
    let (tx, mut rx) = mpsc::channel(candidates.len().max(1));
    for candidate in candidates {
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(candidate.await).await;
        });
    }
    drop(tx);

    let mut rejected = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Race::Cancelled,
            received = rx.recv() => match received {
                Some(output) if predicate(&output) => return Race::Matched(output),
                Some(output) => rejected.push(output),
                None => return Race::Exhausted(rejected),
            },
        }
    }
}

/// Race the candidates for `uri` and return the first document that loads.
///
/// # Errors
///
/// `FetchError::Cancelled` if `token` fires first, `FetchError::Exhausted`
/// with every candidate's failure if none succeeds.
pub async fn settle(
    uri: &Url,
    candidates: Vec<Candidate>,
    token: &CancellationToken,
) -> Result<Value, FetchError> {
    let exhausted = |failures| FetchError::Exhausted {
        uri: uri.to_string(),
        failures,
    };
    match first_matching(candidates, Result::is_ok, token).await {
        Race::Matched(Ok(value)) => Ok(value),
        Race::Matched(Err(failure)) => Err(exhausted(vec![failure])),
        Race::Exhausted(outputs) => Err(exhausted(
            outputs.into_iter().filter_map(Result::err).collect(),
        )),
        Race::Cancelled => Err(FetchError::Cancelled),
    }
}

/// Fetch one document through `fetcher`.
///
/// # Errors
///
/// See [`settle`].
pub async fn fetch<F>(fetcher: &F, uri: &Url, token: &CancellationToken) -> Result<Value, FetchError>
where
    F: Fetch + ?Sized,
{
    settle(uri, fetcher.candidates(uri), token).await
}

/// Fetches schema documents from local mirrors and over HTTP.
#[derive(Debug, Clone)]
pub struct SchemaFetcher {
    config: SchemaBaseConfig,
    http: bool,
    #[cfg(feature = "remote")]
    client: reqwest::Client,
}

impl SchemaFetcher {
    /// A fetcher reading `file://` URIs and, with the `remote` feature,
    /// HTTP(S) URLs.
    pub fn new() -> Self {
        Self {
            config: SchemaBaseConfig::default(),
            http: cfg!(feature = "remote"),
            #[cfg(feature = "remote")]
            client: reqwest::Client::builder()
                .timeout(crate::loader::HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Also look for documents under a local mirror.
    pub fn with_base(mut self, config: SchemaBaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable HTTP candidates.
    pub fn http(mut self, enabled: bool) -> Self {
        self.http = enabled;
        self
    }
}

impl Default for SchemaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for SchemaFetcher {
    fn candidates(&self, uri: &Url) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = Vec::new();
        if let Some(path) = self.config.map_to_local(uri.as_str()) {
            candidates.push(Box::pin(read_file(path)));
        }
        if uri.scheme() == "file" {
            if let Ok(path) = uri.to_file_path() {
                candidates.push(Box::pin(read_file(path)));
            }
        }
        #[cfg(feature = "remote")]
        {
            if self.http && matches!(uri.scheme(), "http" | "https") {
                candidates.push(Box::pin(get_json(self.client.clone(), uri.clone())));
            }
        }
        candidates
    }
}

async fn read_file(path: PathBuf) -> Result<Value, String> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

#[cfg(feature = "remote")]
async fn get_json(client: reqwest::Client, uri: Url) -> Result<Value, String> {
    let response = client
        .get(uri.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| e.to_string())?;
    response.json().await.map_err(|e| format!("{}: {}", uri, e))
}

impl SchemaRegistryBuilder {
    /// Fetch and register every document referenced but not yet
    /// registered, following new references until nothing is missing.
    ///
    /// Documents that cannot be fetched or registered are recorded as
    /// failures, so resolving a reference into them later reports
    /// `ResolveError::Retrieval`. Returns the number of documents
    /// registered.
    ///
    /// # Errors
    ///
    /// Only `FetchError::Cancelled`; per-document failures are recorded.
    pub async fn retrieve_missing<F>(
        &mut self,
        fetcher: &F,
        token: &CancellationToken,
    ) -> Result<usize, FetchError>
    where
        F: Fetch + ?Sized,
    {
        let mut registered = 0;
        for round in 0..MAX_ROUNDS {
            let missing = self.missing();
            if missing.is_empty() {
                return Ok(registered);
            }
            tracing::debug!(round, documents = missing.len(), "retrieving schema documents");

            let handles: Vec<_> = missing
                .into_iter()
                .map(|uri| {
                    let candidates = fetcher.candidates(&uri);
                    let token = token.clone();
                    let task_uri = uri.clone();
                    let handle =
                        tokio::spawn(async move { settle(&task_uri, candidates, &token).await });
                    (uri, handle)
                })
                .collect();

            for (uri, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(join_error) => Err(FetchError::Exhausted {
                        uri: uri.to_string(),
                        failures: vec![join_error.to_string()],
                    }),
                };
                match outcome {
                    Ok(document) => match self.register(document, &uri) {
                        Ok(_) => registered += 1,
                        Err(err) => {
                            tracing::warn!(uri = %uri, error = %err, "fetched schema rejected");
                            self.record_failure(uri, err.to_string());
                        }
                    },
                    Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                    Err(err) => {
                        tracing::warn!(uri = %uri, error = %err, "schema retrieval failed");
                        self.record_failure(uri, err.to_string());
                    }
                }
            }
        }

        let left = self.missing();
        if !left.is_empty() {
            tracing::warn!(
                rounds = MAX_ROUNDS,
                documents = left.len(),
                "giving up on schema retrieval"
            );
            for uri in left {
                self.record_failure(uri, format!("not retrieved within {} rounds", MAX_ROUNDS));
            }
        }
        Ok(registered)
    }
}
