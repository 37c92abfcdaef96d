//! `TableStore` implementation over the Table service REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH},
    Client, Method, RequestBuilder, Response, StatusCode, Url,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use tablestore_core::entity::json::{entity_from_json, entity_to_write_json};
use tablestore_core::storage::{
    ContinuationToken, QueryFilter, QuerySegment, RepositoryError, Result, TableStore,
};
use tablestore_core::DynamicEntity;

use super::auth::{rfc1123, SharedKeyCredential};
use super::batch::{build_insert_batch, first_failure, BatchBoundaries};
use super::error::{map_service_error, map_transport_error, ServiceError, Target};
use super::request::{
    continuation_from_headers, entity_path, query_params, query_path, ACCEPT_JSON, API_VERSION,
    BATCH_PATH, TABLES_PATH,
};
use crate::config::AzureTableSettings;

/// Body of a query response.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

/// Table service client signing every request with Shared Key Lite.
#[derive(Debug, Clone)]
pub struct AzureTableStore {
    http: Client,
    credential: SharedKeyCredential,
    endpoint: String,
}

impl AzureTableStore {
    /// Creates a store for the account and endpoint in `settings`.
    pub fn new(settings: &AzureTableSettings, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(map_transport_error)?;
        Self::with_client(settings, http)
    }

    /// Creates a store that sends its requests through `http`.
    pub fn with_client(settings: &AzureTableSettings, http: Client) -> Result<Self> {
        let credential =
            SharedKeyCredential::new(&settings.storage_account, settings.storage_key())?;

        Ok(Self {
            http,
            credential,
            endpoint: settings.endpoint(),
        })
    }

    /// Base URL of the table service.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.endpoint, path))
            .map_err(|e| RepositoryError::InvalidData(format!("invalid request URL: {e}")))
    }

    /// Starts a signed request carrying the protocol headers.
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let date = rfc1123(Utc::now());
        let authorization = self.credential.authorization(&date, url.path())?;

        Ok(self
            .http
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", "3.0")
            .header("MaxDataServiceVersion", "3.0;NetFx")
            .header(ACCEPT, ACCEPT_JSON)
            .header(AUTHORIZATION, authorization))
    }

    /// Sends a request, turning transport failures into `ConnectionFailed`.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(map_transport_error)
    }

    async fn service_error(response: Response) -> ServiceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ServiceError::parse(status, &body)
    }

    /// Returns the response when successful, otherwise the mapped error.
    async fn expect_success(response: Response, target: Option<Target<'_>>) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let error = Self::service_error(response).await;
        Err(map_service_error(&error, target))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let body = response
            .bytes()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| {
            RepositoryError::Serialization(format!("invalid table service response: {e}"))
        })
    }

    fn write_body(entity: &DynamicEntity) -> String {
        Value::Object(entity_to_write_json(entity)).to_string()
    }

    fn decode(map: Map<String, Value>) -> Result<DynamicEntity> {
        entity_from_json(map).map_err(|e| match e {
            RepositoryError::InvalidData(msg) => RepositoryError::Serialization(msg),
            other => other,
        })
    }
}

#[async_trait]
impl TableStore for AzureTableStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        let body = serde_json::json!({ "TableName": table }).to_string();
        let request = self
            .request(Method::POST, self.url(TABLES_PATH)?)?
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-no-content")
            .body(body);
        let response = self.send(request).await?;

        if response.status() == StatusCode::CONFLICT {
            let error = Self::service_error(response).await;
            if error.is("TableAlreadyExists") {
                return Ok(false);
            }
            return Err(map_service_error(&error, None));
        }
        Self::expect_success(response, None).await?;

        tracing::debug!(table, account = self.credential.account(), "Created table");
        Ok(true)
    }

    async fn query_segment(
        &self,
        table: &str,
        filter: &QueryFilter,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QuerySegment> {
        let mut url = self.url(&query_path(table))?;
        {
            let params = query_params(filter, continuation);
            if !params.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (name, value) in &params {
                    pairs.append_pair(name, value);
                }
            }
        }

        let response = self.send(self.request(Method::GET, url)?).await?;
        let response = Self::expect_success(response, None).await?;

        let continuation = continuation_from_headers(response.headers());
        let body: QueryResponse = Self::read_json(response).await?;
        let entities = body
            .value
            .into_iter()
            .map(Self::decode)
            .collect::<Result<Vec<_>>>()?;

        Ok(QuerySegment {
            entities,
            continuation,
        })
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<DynamicEntity>> {
        let url = self.url(&entity_path(table, partition_key, row_key))?;
        let response = self.send(self.request(Method::GET, url)?).await?;

        if response.status() == StatusCode::NOT_FOUND {
            let error = Self::service_error(response).await;
            if error.is("ResourceNotFound") {
                return Ok(None);
            }
            return Err(map_service_error(
                &error,
                Some(Target {
                    partition_key,
                    row_key,
                }),
            ));
        }
        let response = Self::expect_success(response, None).await?;

        let header_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let map: Map<String, Value> = Self::read_json(response).await?;
        let mut entity = Self::decode(map)?;
        if entity.etag.is_none() {
            entity.etag = header_etag;
        }
        Ok(Some(entity))
    }

    async fn insert(&self, table: &str, entity: &DynamicEntity) -> Result<()> {
        let request = self
            .request(Method::POST, self.url(table)?)?
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return-no-content")
            .body(Self::write_body(entity));
        let response = self.send(request).await?;

        Self::expect_success(
            response,
            Some(Target {
                partition_key: &entity.partition_key,
                row_key: &entity.row_key,
            }),
        )
        .await?;
        Ok(())
    }

    async fn insert_batch(&self, table: &str, entities: &[DynamicEntity]) -> Result<()> {
        let boundaries = BatchBoundaries::new();
        let table_url = self.url(table)?;
        let body = build_insert_batch(&boundaries, table_url.as_str(), entities);

        let request = self
            .request(Method::POST, self.url(BATCH_PATH)?)?
            .header(CONTENT_TYPE, boundaries.content_type())
            .body(body);
        let response = self.send(request).await?;
        let response = Self::expect_success(response, None).await?;

        let text = response
            .text()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        match first_failure(&text) {
            None => Ok(()),
            Some(failure) => {
                let error = ServiceError::parse(failure.status, &failure.body);
                let target = error
                    .batch_index()
                    .and_then(|i| entities.get(i))
                    .or_else(|| entities.first())
                    .map(|e| Target {
                        partition_key: &e.partition_key,
                        row_key: &e.row_key,
                    });

                tracing::debug!(
                    table,
                    status = failure.status,
                    code = %error.code,
                    "Batch rejected"
                );
                Err(map_service_error(&error, target))
            }
        }
    }

    async fn insert_or_replace(&self, table: &str, entity: &DynamicEntity) -> Result<()> {
        let url = self.url(&entity_path(table, &entity.partition_key, &entity.row_key))?;
        let request = self
            .request(Method::PUT, url)?
            .header(CONTENT_TYPE, "application/json")
            .body(Self::write_body(entity));
        let response = self.send(request).await?;

        Self::expect_success(
            response,
            Some(Target {
                partition_key: &entity.partition_key,
                row_key: &entity.row_key,
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        etag: &str,
    ) -> Result<()> {
        let url = self.url(&entity_path(table, partition_key, row_key))?;
        let request = self.request(Method::DELETE, url)?.header(IF_MATCH, etag);
        let response = self.send(request).await?;

        Self::expect_success(
            response,
            Some(Target {
                partition_key,
                row_key,
            }),
        )
        .await?;
        Ok(())
    }
}
