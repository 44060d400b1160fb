use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage::{StoredSubmission, Submission, SubmissionStore};

pub const DEFAULT_TABLE: &str = "notas_hojas_trabajo";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Submission store backed by a Supabase table through its PostgREST API.
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Http {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SubmissionStore for SupabaseStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StorageError> {
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=representation")
            .json(&[submission])
            .send()
            .await?;

        let inserted: Vec<serde_json::Value> = check_status(response).await?.json().await?;
        if inserted.is_empty() {
            return Err(StorageError::NotConfirmed);
        }
        Ok(())
    }

    async fn select_recent(&self, limit: usize) -> Result<Vec<StoredSubmission>, StorageError> {
        let limit = limit.to_string();
        let response = self
            .request(reqwest::Method::GET)
            .query(&[
                ("select", "*"),
                ("order", "created_at.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submission() -> Submission {
        Submission {
            student_key: "12".to_string(),
            worksheet_id: "hoja_1_clave_12".to_string(),
            score_percent: 80.0,
            answer_detail: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_posts_row_and_accepts_confirmation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/notas_hojas_trabajo"))
            .and(header("apikey", "secret"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(serde_json::json!([{
                "alumno_id": "12",
                "hoja_id": "hoja_1_clave_12",
                "nota": 80.0,
                "respuestas_alumno": "{}"
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([{
                "id": 1,
                "alumno_id": "12"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "secret", DEFAULT_TABLE).unwrap();
        store.insert(&submission()).await.unwrap();
    }

    #[tokio::test]
    async fn insert_without_returned_rows_is_unconfirmed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "secret", DEFAULT_TABLE).unwrap();
        let err = store.insert(&submission()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotConfirmed));
    }

    #[tokio::test]
    async fn insert_reports_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&server.uri(), "wrong", DEFAULT_TABLE).unwrap();
        match store.insert(&submission()).await {
            Err(StorageError::Http { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn select_recent_orders_by_creation_time() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/notas_hojas_trabajo"))
            .and(query_param("select", "*"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 7,
                "created_at": "2026-10-19T09:30:00+00:00",
                "alumno_id": "12",
                "hoja_id": "hoja_2_clave_12",
                "nota": 40.0,
                "respuestas_alumno": "{}"
            }])))
            .mount(&server)
            .await;

        let store = SupabaseStore::new(&format!("{}/", server.uri()), "secret", DEFAULT_TABLE).unwrap();
        let rows = store.select_recent(20).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].submission.worksheet_id, "hoja_2_clave_12");
        assert_eq!(rows[0].submission.score_percent, 40.0);
        assert!(rows[0].created_at.is_some());
    }

    #[tokio::test]
    async fn unreachable_store_is_a_network_error() {
        let store = SupabaseStore::new("http://127.0.0.1:1", "secret", DEFAULT_TABLE).unwrap();
        let err = store.select_recent(20).await.unwrap_err();
        assert!(matches!(err, StorageError::Network(_)));
    }
}
