//! Integration tests for fetching external schema documents.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use schema_eval::{
    BuildError, CancellationToken, Candidate, FetchError, SchemaBaseConfig, SchemaFetcher,
    Validator,
};
use url::Url;

fn served(document: Value) -> Candidate {
    Box::pin(async move { Ok::<Value, String>(document) })
}

fn refused(message: &str) -> Candidate {
    let message = message.to_string();
    Box::pin(async move { Err::<Value, String>(message) })
}

mod in_memory {
    use super::*;

    #[tokio::test]
    async fn follows_references_across_rounds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move |uri: &Url| -> Vec<Candidate> {
            counter.fetch_add(1, Ordering::SeqCst);
            match uri.path() {
                "/order.json" => vec![served(json!({
                    "properties": { "total": { "$ref": "money.json" } }
                }))],
                "/money.json" => vec![served(json!({ "type": "number", "minimum": 0 }))],
                _ => Vec::new(),
            }
        };

        let validator = Validator::builder()
            .build_with_fetcher(
                json!({ "$ref": "https://example.com/order.json" }),
                &fetcher,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(validator.is_valid(&json!({ "total": 10 })));
        assert!(!validator.is_valid(&json!({ "total": -1 })));
    }

    #[tokio::test]
    async fn failed_documents_surface_as_retrieval_errors() {
        let fetcher = |_: &Url| -> Vec<Candidate> { vec![refused("connection refused")] };
        let validator = Validator::builder()
            .build_with_fetcher(
                json!({ "$ref": "https://example.com/gone.json" }),
                &fetcher,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let outcome = validator.evaluate(&json!(1));
        assert!(!outcome.valid);
        let message = outcome.errors().next().unwrap().error.clone().unwrap();
        assert!(message.contains("failed to retrieve https://example.com/gone.json"));
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn cancelled_build_fails() {
        let token = CancellationToken::new();
        token.cancel();
        let fetcher = |_: &Url| -> Vec<Candidate> {
            let slow: Candidate = Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Ok::<Value, String>(json!({}))
            });
            vec![slow]
        };
        let result = Validator::builder()
            .build_with_fetcher(json!({ "$ref": "https://example.com/slow.json" }), &fetcher, &token)
            .await;
        assert!(matches!(result, Err(BuildError::Fetch(FetchError::Cancelled))));
        assert_eq!(result.unwrap_err().exit_code(), 3);
    }

    #[tokio::test]
    async fn nothing_missing_fetches_nothing() {
        let fetcher = |_: &Url| -> Vec<Candidate> { panic!("no fetch expected") };
        let validator = Validator::builder()
            .build_with_fetcher(
                json!({ "$defs": { "a": true }, "$ref": "#/$defs/a" }),
                &fetcher,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(validator.is_valid(&json!("anything")));
    }
}

mod local_mirror {
    use super::*;

    #[tokio::test]
    async fn remote_ids_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sku.json"),
            r#"{"type": "string", "pattern": "^SKU-"}"#,
        )
        .unwrap();

        let fetcher = SchemaFetcher::new()
            .http(false)
            .with_base(SchemaBaseConfig::new(dir.path()).remote_base("https://schemas.example.com/v2"));
        let validator = Validator::builder()
            .build_with_fetcher(
                json!({ "items": { "$ref": "https://schemas.example.com/v2/sku.json" } }),
                &fetcher,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(validator.is_valid(&json!(["SKU-1", "SKU-2"])));
        assert!(!validator.is_valid(&json!(["SKU-1", "2"])));
    }
}

#[cfg(feature = "remote")]
mod http {
    use super::*;

    #[tokio::test]
    async fn fetches_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/schemas/name.json")
            .with_header("content-type", "application/json")
            .with_body(r#"{"type": "string", "minLength": 2}"#)
            .create_async()
            .await;

        let schema = json!({
            "properties": {
                "name": { "$ref": format!("{}/schemas/name.json", server.url()) }
            }
        });
        let validator = Validator::builder()
            .build_with_fetcher(schema, &SchemaFetcher::new(), &CancellationToken::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(validator.is_valid(&json!({ "name": "Ada" })));
        assert!(!validator.is_valid(&json!({ "name": "A" })));
    }

    #[tokio::test]
    async fn http_error_is_recorded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.json")
            .with_status(404)
            .create_async()
            .await;

        let schema = json!({ "$ref": format!("{}/missing.json", server.url()) });
        let validator = Validator::builder()
            .build_with_fetcher(schema, &SchemaFetcher::new(), &CancellationToken::new())
            .await
            .unwrap();

        let outcome = validator.evaluate(&json!({}));
        assert!(!outcome.valid);
        let message = outcome.errors().next().unwrap().error.clone().unwrap();
        assert!(message.contains("failed to retrieve"));
        assert!(message.contains("404"));
    }
}
