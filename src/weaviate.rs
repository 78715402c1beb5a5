//! Weaviate REST adapter.
//!
//! Implements [`VectorStore`] over Weaviate's HTTP API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | readiness | `GET /v1/.well-known/ready` |
//! | exists | `GET /v1/schema/{class}` (404 → absent) |
//! | create | `POST /v1/schema` with `vectorizer: "none"` |
//! | width check | `POST /v1/graphql` (`Get` one vector) |
//! | upsert | `POST /v1/batch/objects` |
//! | search, source lookup | `POST /v1/graphql` (`Get`) |
//! | count | `POST /v1/graphql` (`Aggregate`) |
//! | delete | `DELETE /v1/objects/{class}/{id}` |
//!
//! Vectors are always supplied by the client. The configured gRPC port is
//! recorded on the handle for diagnostics; all traffic uses REST.
//!
//! Transport failures (no HTTP response) map to [`Error::Connectivity`];
//! an HTTP or GraphQL error from a reachable server maps to [`Error::Store`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

use ragpipe_core::error::{Error, Result};
use ragpipe_core::models::{Candidate, Chunk, SearchMode, StoredChunkRef};
use ragpipe_core::store::{StoreConnector, VectorStore};

use crate::config::StoreConfig;

/// Objects per `POST /v1/batch/objects` request.
const BATCH_SIZE: usize = 100;

/// Upper bound on objects returned by one `Get`, Weaviate's default
/// `QUERY_MAXIMUM_RESULTS`.
const MAX_QUERY_RESULTS: usize = 10_000;

const PROPERTIES: &str = "text source chunk_index content_hash";

/// Handle to one Weaviate instance.
pub struct WeaviateClient {
    http: reqwest::Client,
    base_url: String,
    grpc_port: u16,
    api_key: Option<String>,
    closed: AtomicBool,
}

impl WeaviateClient {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = config.base_url();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Connectivity {
                endpoint: base_url.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            grpc_port: config.grpc_port,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn grpc_port(&self) -> u16 {
        self.grpc_port
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.unreachable("client is closed".to_string()));
        }
        req.send()
            .await
            .map_err(|e| self.unreachable(e.to_string()))
    }

    fn unreachable(&self, reason: String) -> Error {
        Error::Connectivity {
            endpoint: self.base_url.clone(),
            reason,
        }
    }

    /// Probe readiness, returning the failure reason when not ready.
    pub async fn probe_ready(&self) -> std::result::Result<(), String> {
        let resp = self
            .send(self.request(Method::GET, "/v1/.well-known/ready"))
            .await
            .map_err(|e| e.to_string())?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("readiness probe returned {}", resp.status()))
        }
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        let resp = self
            .send(
                self.request(Method::POST, "/v1/graphql")
                    .json(&json!({ "query": query })),
            )
            .await?;
        let body = json_body(resp).await?;
        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                    .collect();
                return Err(Error::Store(format!(
                    "GraphQL error: {}",
                    messages.join("; ")
                )));
            }
        }
        Ok(body)
    }
}

/// Read a success response as JSON; non-success status is a store error.
async fn json_body(resp: Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(Error::Store(format!("Weaviate returned {}: {}", status, body_text)));
    }
    resp.json()
        .await
        .map_err(|e| Error::Store(format!("invalid JSON from Weaviate: {}", e)))
}

/// Schema body for a collection with client-supplied vectors.
pub fn class_schema(name: &str) -> Value {
    json!({
        "class": name,
        "vectorizer": "none",
        "vectorIndexConfig": { "distance": "cosine" },
        "properties": [
            { "name": "text", "dataType": ["text"] },
            { "name": "source", "dataType": ["text"], "tokenization": "field" },
            { "name": "chunk_index", "dataType": ["int"] },
            { "name": "content_hash", "dataType": ["text"], "tokenization": "field" }
        ]
    })
}

fn batch_object(collection: &str, chunk: &Chunk, vector: &[f32]) -> Value {
    json!({
        "class": collection,
        "id": chunk.id,
        "properties": {
            "text": chunk.text,
            "source": chunk.source,
            "chunk_index": chunk.chunk_index,
            "content_hash": chunk.content_hash,
        },
        "vector": vector,
    })
}

/// Collect per-object error messages from a batch response.
pub fn batch_errors(response: &Value) -> Vec<String> {
    let mut messages = Vec::new();
    for object in response.as_array().into_iter().flatten() {
        let errors = object
            .pointer("/result/errors/error")
            .and_then(|e| e.as_array());
        for err in errors.into_iter().flatten() {
            let id = object.get("id").and_then(|i| i.as_str()).unwrap_or("?");
            let msg = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            messages.push(format!("{}: {}", id, msg));
        }
    }
    messages
}

/// Build the GraphQL `Get` query for a similarity search.
pub fn search_query(
    collection: &str,
    query: &str,
    vector: &[f32],
    limit: usize,
    mode: SearchMode,
) -> String {
    // serde_json renders f32 slices and escaped strings as valid GraphQL literals.
    let vector_lit = serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string());
    let operator = match mode {
        SearchMode::Vector => format!("nearVector: {{vector: {}}}", vector_lit),
        SearchMode::Hybrid { alpha } => {
            let query_lit = serde_json::to_string(query).unwrap_or_else(|_| "\"\"".to_string());
            format!(
                "hybrid: {{query: {}, vector: {}, alpha: {}}}",
                query_lit, vector_lit, alpha
            )
        }
    };
    format!(
        "{{ Get {{ {}({}, limit: {}) {{ {} _additional {{ id score distance }} }} }} }}",
        collection, operator, limit, PROPERTIES
    )
}

fn number_field(value: Option<&Value>) -> Option<f32> {
    match value? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        // Weaviate reports hybrid scores as strings.
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn get_results<'a>(response: &'a Value, collection: &str) -> Result<&'a [Value]> {
    response
        .pointer(&format!("/data/Get/{}", collection))
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .ok_or_else(|| Error::Store(format!("GraphQL response has no Get.{}", collection)))
}

/// Turn a `Get` response into candidates in result order.
pub fn parse_candidates(
    response: &Value,
    collection: &str,
    mode: SearchMode,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for (rank, hit) in get_results(response, collection)?.iter().enumerate() {
        let additional = hit.get("_additional");
        let id = additional
            .and_then(|a| a.get("id"))
            .and_then(|i| i.as_str())
            .ok_or_else(|| Error::Store("search hit without _additional.id".to_string()))?;
        let text_field = |name: &str| -> Result<String> {
            hit.get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| Error::Store(format!("search hit {} without '{}'", id, name)))
        };

        let similarity = match mode {
            SearchMode::Hybrid { .. } => number_field(additional.and_then(|a| a.get("score"))),
            SearchMode::Vector => number_field(additional.and_then(|a| a.get("distance")))
                .map(|d| 1.0 - d),
        }
        .unwrap_or(0.0);

        candidates.push(Candidate {
            chunk: Chunk {
                id: id.to_string(),
                text: text_field("text")?,
                source: text_field("source")?,
                chunk_index: hit
                    .get("chunk_index")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| {
                        Error::Store(format!("search hit {} without 'chunk_index'", id))
                    })?,
                content_hash: text_field("content_hash")?,
            },
            similarity,
            rank,
        });
    }
    Ok(candidates)
}

/// Object count from an `Aggregate { meta { count } }` response.
pub fn parse_count(response: &Value, collection: &str) -> Result<usize> {
    response
        .pointer(&format!("/data/Aggregate/{}/0/meta/count", collection))
        .and_then(|c| c.as_u64())
        .map(|c| c as usize)
        .ok_or_else(|| {
            Error::Store(format!(
                "GraphQL response has no Aggregate.{} count",
                collection
            ))
        })
}

/// Width of the first stored vector in a `Get { _additional { vector } }`
/// response; `None` for an empty collection.
pub fn parse_stored_dims(response: &Value, collection: &str) -> Result<Option<usize>> {
    let hits = get_results(response, collection)?;
    match hits.first() {
        None => Ok(None),
        Some(hit) => hit
            .pointer("/_additional/vector")
            .and_then(|v| v.as_array())
            .map(|v| Some(v.len()))
            .ok_or_else(|| Error::Store("stored object without _additional.vector".to_string())),
    }
}

#[async_trait]
impl VectorStore for WeaviateClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn is_ready(&self) -> bool {
        self.probe_ready().await.is_ok()
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let resp = self
            .send(self.request(Method::GET, &format!("/v1/schema/{}", name)))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => {
                let body_text = resp.text().await.unwrap_or_default();
                Err(Error::Store(format!(
                    "schema lookup for '{}' returned {}: {}",
                    name, s, body_text
                )))
            }
        }
    }

    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()> {
        if self.collection_exists(name).await? {
            // Weaviate fixes a class's vector width with its first object.
            let query = format!(
                "{{ Get {{ {}(limit: 1) {{ _additional {{ vector }} }} }} }}",
                name
            );
            let body = self.graphql(query).await?;
            return match parse_stored_dims(&body, name)? {
                Some(stored) if stored != dims => Err(Error::Store(format!(
                    "collection '{}' holds {}-dim vectors, embedder produces {}",
                    name, stored, dims
                ))),
                _ => Ok(()),
            };
        }
        let resp = self
            .send(self.request(Method::POST, "/v1/schema").json(&class_schema(name)))
            .await?;
        let status = resp.status();
        if status.is_success() {
            tracing::info!(collection = name, dims, "created collection");
            return Ok(());
        }
        let body_text = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNPROCESSABLE_ENTITY && body_text.contains("already exists") {
            // Lost a creation race.
            return Ok(());
        }
        Err(Error::Store(format!(
            "creating collection '{}' returned {}: {}",
            name, status, body_text
        )))
    }

    async fn upsert_chunks(
        &self,
        collection: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::Validation(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        for (chunk_batch, vector_batch) in chunks.chunks(BATCH_SIZE).zip(vectors.chunks(BATCH_SIZE)) {
            let objects: Vec<Value> = chunk_batch
                .iter()
                .zip(vector_batch)
                .map(|(c, v)| batch_object(collection, c, v))
                .collect();
            let resp = self
                .send(
                    self.request(Method::POST, "/v1/batch/objects")
                        .json(&json!({ "objects": objects })),
                )
                .await?;
            let body = json_body(resp).await?;
            let errors = batch_errors(&body);
            if !errors.is_empty() {
                return Err(Error::Store(format!(
                    "batch write rejected {} object(s): {}",
                    errors.len(),
                    errors.join("; ")
                )));
            }
        }
        Ok(())
    }

    async fn source_chunks(&self, collection: &str, source: &str) -> Result<Vec<StoredChunkRef>> {
        let source_lit = serde_json::to_string(source).unwrap_or_else(|_| "\"\"".to_string());
        let query = format!(
            "{{ Get {{ {}(where: {{path: [\"source\"], operator: Equal, valueText: {}}}, limit: {}) {{ content_hash _additional {{ id }} }} }} }}",
            collection, source_lit, MAX_QUERY_RESULTS
        );
        let body = self.graphql(query).await?;
        let refs = get_results(&body, collection)?
            .iter()
            .filter_map(|hit| {
                let id = hit.pointer("/_additional/id")?.as_str()?;
                let hash = hit.get("content_hash")?.as_str()?;
                Some(StoredChunkRef {
                    id: id.to_string(),
                    content_hash: hash.to_string(),
                })
            })
            .collect();
        Ok(refs)
    }

    async fn delete_chunks(&self, collection: &str, ids: &[String]) -> Result<()> {
        for id in ids {
            let resp = self
                .send(self.request(Method::DELETE, &format!("/v1/objects/{}/{}", collection, id)))
                .await?;
            let status = resp.status();
            if !(status.is_success() || status == StatusCode::NOT_FOUND) {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(Error::Store(format!(
                    "deleting {} returned {}: {}",
                    id, status, body_text
                )));
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        vector: &[f32],
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<Candidate>> {
        let body = self
            .graphql(search_query(collection, query, vector, limit, mode))
            .await?;
        parse_candidates(&body, collection, mode)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let query = format!("{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}", collection);
        let body = self.graphql(query).await?;
        let count = parse_count(&body, collection)?;
        Ok(count)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!(endpoint = %self.base_url, "closed Weaviate client");
    }
}

/// Opens [`WeaviateClient`] handles from [`StoreConfig`].
pub struct WeaviateConnector {
    config: StoreConfig,
}

impl WeaviateConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for WeaviateConnector {
    fn endpoint(&self) -> String {
        self.config.base_url()
    }

    async fn connect(&self) -> Result<Arc<dyn VectorStore>> {
        let client = WeaviateClient::new(&self.config)?;
        client.probe_ready().await.map_err(|reason| Error::Connectivity {
            endpoint: self.config.base_url(),
            reason,
        })?;
        tracing::debug!(
            endpoint = %self.config.base_url(),
            grpc_port = client.grpc_port(),
            "connected to Weaviate"
        );
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_client_vectors() {
        let schema = class_schema("Docs");
        assert_eq!(schema["class"], "Docs");
        assert_eq!(schema["vectorizer"], "none");
        let names: Vec<&str> = schema["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["text", "source", "chunk_index", "content_hash"]);
    }

    #[test]
    fn test_hybrid_query_escapes_text() {
        let q = search_query(
            "Docs",
            "say \"hi\"",
            &[0.5, -1.0],
            20,
            SearchMode::Hybrid { alpha: 0.75 },
        );
        assert!(q.contains("Docs(hybrid: {query: \"say \\\"hi\\\"\", vector: [0.5,-1.0], alpha: 0.75}, limit: 20)"));
    }

    #[test]
    fn test_vector_query_uses_near_vector() {
        let q = search_query("Docs", "ignored", &[1.0], 5, SearchMode::Vector);
        assert!(q.contains("nearVector: {vector: [1.0]}"));
        assert!(!q.contains("ignored"));
    }

    #[test]
    fn test_parse_hybrid_scores_as_strings() {
        let response = json!({
            "data": { "Get": { "Docs": [
                { "text": "a", "source": "x.md", "chunk_index": 0, "content_hash": "h0",
                  "_additional": { "id": "id-0", "score": "0.9", "distance": null } },
                { "text": "b", "source": "x.md", "chunk_index": 1, "content_hash": "h1",
                  "_additional": { "id": "id-1", "score": 0.4, "distance": null } }
            ]}}
        });
        let c = parse_candidates(&response, "Docs", SearchMode::Hybrid { alpha: 0.5 }).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].chunk.id, "id-0");
        assert!((c[0].similarity - 0.9).abs() < 1e-6);
        assert_eq!(c[1].rank, 1);
        assert_eq!(c[1].chunk.chunk_index, 1);
    }

    #[test]
    fn test_parse_vector_distance() {
        let response = json!({
            "data": { "Get": { "Docs": [
                { "text": "a", "source": "x.md", "chunk_index": 0, "content_hash": "h0",
                  "_additional": { "id": "id-0", "score": null, "distance": 0.25 } }
            ]}}
        });
        let c = parse_candidates(&response, "Docs", SearchMode::Vector).unwrap();
        assert!((c[0].similarity - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_missing_get_is_store_error() {
        let err = parse_candidates(&json!({"data": {}}), "Docs", SearchMode::Vector).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_hit_without_text_is_store_error() {
        let response = json!({
            "data": { "Get": { "Docs": [
                { "source": "x.md", "chunk_index": 0, "content_hash": "h0",
                  "_additional": { "id": "id-0", "score": "0.9" } }
            ]}}
        });
        let err = parse_candidates(&response, "Docs", SearchMode::Hybrid { alpha: 0.5 })
            .unwrap_err();
        match err {
            Error::Store(msg) => assert!(msg.contains("'text'")),
            other => panic!("expected store error, got {other}"),
        }
    }

    #[test]
    fn test_parse_count() {
        let ok = json!({ "data": { "Aggregate": { "Docs": [{ "meta": { "count": 7 } }] } } });
        assert_eq!(parse_count(&ok, "Docs").unwrap(), 7);
        let err = parse_count(&json!({ "data": { "Aggregate": {} } }), "Docs").unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_parse_stored_dims() {
        let empty = json!({ "data": { "Get": { "Docs": [] } } });
        assert_eq!(parse_stored_dims(&empty, "Docs").unwrap(), None);
        let one = json!({ "data": { "Get": { "Docs": [
            { "_additional": { "vector": [0.1, 0.2, 0.3] } }
        ]}}});
        assert_eq!(parse_stored_dims(&one, "Docs").unwrap(), Some(3));
        let bare = json!({ "data": { "Get": { "Docs": [{ "_additional": {} }] } } });
        assert!(parse_stored_dims(&bare, "Docs").is_err());
    }

    #[test]
    fn test_batch_errors() {
        let ok = json!([{ "id": "a", "result": {} }]);
        assert!(batch_errors(&ok).is_empty());
        let bad = json!([
            { "id": "a", "result": {} },
            { "id": "b", "result": { "errors": { "error": [{ "message": "vector lengths don't match" }] } } }
        ]);
        assert_eq!(batch_errors(&bad), vec!["b: vector lengths don't match".to_string()]);
    }
}
