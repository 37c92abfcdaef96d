use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        health::livez,
        tables::{
            create_entities, delete_entity, get_entity, list_entities, list_partition,
            update_entity,
        },
    },
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    // Table names are alphanumeric, so `/_livez` never shadows a table.
    // `/{table_name}` doubles as the update route `/{id}?tableName=`, so PUT lives on it.
    Router::new()
        .route("/_livez", get(livez))
        .route(
            "/{table_name}",
            get(list_entities).post(create_entities).put(update_entity),
        )
        .route("/{table_name}/{partition_key}", get(list_partition))
        .route(
            "/{table_name}/{partition_key}/{row_key}",
            get(get_entity).delete(delete_entity),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn small_pages() -> AppState {
        AppState::in_memory(2, "entities")
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_livez() {
        let app = create_app(AppState::default());

        let response = app.oneshot(empty_request("GET", "/_livez")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_table_named_livez_is_usable() {
        let app = create_app(AppState::default());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/livez",
                json!({"PartitionKey": "a", "RowKey": "1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(empty_request("GET", "/livez")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let entities = body_json(response).await;
        assert_eq!(entities.as_array().unwrap().len(), 1);
        assert_eq!(entities[0]["RowKey"], "1");
    }

    #[tokio::test]
    async fn test_list_missing_table_is_empty() {
        let app = create_app(AppState::default());

        let response = app.oneshot(empty_request("GET", "/orders")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_create_and_get_entity() {
        let app = create_app(AppState::default());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/people",
                json!({"PartitionKey": "u1", "RowKey": "p1", "name": "Alice", "age": 34}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["name"], "Alice");
        assert!(created["odata.etag"].is_string());
        assert!(created["Timestamp"].is_string());

        let response = app
            .oneshot(empty_request("GET", "/people/u1/p1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let entity = body_json(response).await;
        assert_eq!(entity["PartitionKey"], "u1");
        assert_eq!(entity["RowKey"], "p1");
        assert_eq!(entity["name"], "Alice");
        assert_eq!(entity["age"], 34);
        assert!(entity["odata.etag"].is_string());
        assert!(entity["Timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_get_nonexistent_entity() {
        let app = create_app(AppState::default());

        let response = app
            .oneshot(empty_request("GET", "/people/u1/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error = body_json(response).await;
        assert_eq!(error["status"], 404);
        assert_eq!(error["error"], "Entity not found: u1/missing");
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let app = create_app(AppState::default());
        let body = json!({"PartitionKey": "u1", "RowKey": "p1"});

        let first = app
            .clone()
            .oneshot(json_request("POST", "/people", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/people", body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["status"], 409);
    }

    #[tokio::test]
    async fn test_list_pages_through_small_segments() {
        let app = create_app(small_pages());

        for rk in ["1", "2", "3", "4", "5"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/orders",
                    json!({"PartitionKey": "a", "RowKey": rk}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.oneshot(empty_request("GET", "/orders")).await.unwrap();

        let entities = body_json(response).await;
        let row_keys: Vec<&str> = entities
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["RowKey"].as_str().unwrap())
            .collect();
        assert_eq!(row_keys, vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_list_partition() {
        let app = create_app(small_pages());

        let batch = json!([
            {"PartitionKey": "a", "RowKey": "1"},
            {"PartitionKey": "a", "RowKey": "2"},
            {"PartitionKey": "a", "RowKey": "3"}
        ]);
        let response = app
            .clone()
            .oneshot(json_request("POST", "/orders", batch))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let created = created.as_array().unwrap();
        assert_eq!(created.len(), 3);
        assert!(created
            .iter()
            .all(|e| e["odata.etag"].is_string() && e["Timestamp"].is_string()));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/orders",
                json!({"PartitionKey": "b", "RowKey": "1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(empty_request("GET", "/orders/a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let entities = body_json(response).await;
        let entities = entities.as_array().unwrap();
        assert_eq!(entities.len(), 3);
        assert!(entities.iter().all(|e| e["PartitionKey"] == "a"));
    }

    #[tokio::test]
    async fn test_cross_partition_batch_is_rejected() {
        let app = create_app(AppState::default());

        let batch = json!([
            {"PartitionKey": "a", "RowKey": "1"},
            {"PartitionKey": "b", "RowKey": "1"}
        ]);
        let response = app
            .clone()
            .oneshot(json_request("POST", "/orders", batch))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(empty_request("GET", "/orders")).await.unwrap();
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_update_uses_table_name_query() {
        let app = create_app(AppState::default());

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/anything?tableName=people",
                json!({"PartitionKey": "u1", "RowKey": "p1", "name": "Bob"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("GET", "/people/u1/p1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "Bob");
    }

    #[tokio::test]
    async fn test_update_without_table_name_uses_default() {
        let app = create_app(AppState::default());

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/ignored",
                json!({"PartitionKey": "u1", "RowKey": "p1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("GET", "/entities/u1/p1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_repeated_table_name_query_is_json_bad_request() {
        let app = create_app(AppState::default());

        let response = app
            .oneshot(json_request(
                "PUT",
                "/x?tableName=a&tableName=b",
                json!({"PartitionKey": "u1", "RowKey": "p1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await;
        assert_eq!(error["status"], 400);
        assert!(error["error"].is_string());
    }

    #[tokio::test]
    async fn test_delete_entity() {
        let app = create_app(AppState::default());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/people",
                json!({"PartitionKey": "u1", "RowKey": "p1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/people/u1/p1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("GET", "/people/u1/p1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_nonexistent_entity() {
        let app = create_app(AppState::default());

        let response = app
            .oneshot(empty_request("DELETE", "/people/u1/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = create_app(AppState::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/people")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], 400);
    }

    #[tokio::test]
    async fn test_missing_row_key_is_bad_request() {
        let app = create_app(AppState::default());

        let response = app
            .oneshot(json_request(
                "POST",
                "/people",
                json!({"PartitionKey": "u1", "name": "Alice"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nested_value_is_bad_request() {
        let app = create_app(AppState::default());

        let response = app
            .oneshot(json_request(
                "POST",
                "/people",
                json!({"PartitionKey": "u1", "RowKey": "p1", "tags": ["a", "b"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_table_name_is_bad_request() {
        let app = create_app(AppState::default());

        let response = app.oneshot(empty_request("GET", "/1abc")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_preserves_json_types() {
        let app = create_app(AppState::default());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/people",
                json!({
                    "PartitionKey": "u1",
                    "RowKey": "p1",
                    "score": 9.5,
                    "visits": 5_000_000_000_i64,
                    "active": false,
                    "nickname": null
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(empty_request("GET", "/people/u1/p1"))
            .await
            .unwrap();
        let entity = body_json(response).await;

        assert_eq!(entity["score"], 9.5);
        assert_eq!(entity["score@odata.type"], "Edm.Double");
        assert_eq!(entity["visits"], "5000000000");
        assert_eq!(entity["visits@odata.type"], "Edm.Int64");
        assert_eq!(entity["active"], false);
        assert!(entity.get("nickname").is_none());
    }
}
