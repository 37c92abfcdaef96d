//! Resource paths, query parameters and continuation headers.

use reqwest::header::HeaderMap;

use tablestore_core::storage::{ContinuationToken, QueryFilter};

pub const API_VERSION: &str = "2019-02-02";
pub const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";

pub const NEXT_PARTITION_KEY_HEADER: &str = "x-ms-continuation-nextpartitionkey";
pub const NEXT_ROW_KEY_HEADER: &str = "x-ms-continuation-nextrowkey";

pub const TABLES_PATH: &str = "Tables";
pub const BATCH_PATH: &str = "$batch";

/// Quotes and percent-encodes a key for use inside an entity path.
pub fn escape_key(key: &str) -> String {
    urlencoding::encode(&key.replace('\'', "''")).into_owned()
}

/// `{table}(PartitionKey='..',RowKey='..')`
pub fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "{table}(PartitionKey='{}',RowKey='{}')",
        escape_key(partition_key),
        escape_key(row_key)
    )
}

/// `{table}()`
pub fn query_path(table: &str) -> String {
    format!("{table}()")
}

/// Query string pairs for a segmented query.
pub fn query_params(
    filter: &QueryFilter,
    continuation: Option<&ContinuationToken>,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(filter) = filter.to_odata() {
        params.push(("$filter", filter));
    }
    if let Some(token) = continuation {
        params.push(("NextPartitionKey", token.next_partition_key.clone()));
        if let Some(row_key) = &token.next_row_key {
            params.push(("NextRowKey", row_key.clone()));
        }
    }
    params
}

/// Reads the continuation token of a query response, if the scan is incomplete.
pub fn continuation_from_headers(headers: &HeaderMap) -> Option<ContinuationToken> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header(NEXT_PARTITION_KEY_HEADER)
        .map(|partition_key| ContinuationToken::new(partition_key, header(NEXT_ROW_KEY_HEADER)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_entity_path_escapes_keys() {
        assert_eq!(
            entity_path("orders", "o'brien", "a b/c"),
            "orders(PartitionKey='o%27%27brien',RowKey='a%20b%2Fc')"
        );
    }

    #[test]
    fn test_query_path() {
        assert_eq!(query_path("orders"), "orders()");
    }

    #[test]
    fn test_query_params_without_filter_or_token() {
        assert!(query_params(&QueryFilter::All, None).is_empty());
    }

    #[test]
    fn test_query_params_with_filter_and_token() {
        let token = ContinuationToken::new("a", Some("5".to_string()));
        let params = query_params(
            &QueryFilter::PartitionKey("a".to_string()),
            Some(&token),
        );

        assert_eq!(
            params,
            vec![
                ("$filter", "PartitionKey eq 'a'".to_string()),
                ("NextPartitionKey", "a".to_string()),
                ("NextRowKey", "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_continuation_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(continuation_from_headers(&headers), None);

        headers.insert(
            NEXT_PARTITION_KEY_HEADER,
            HeaderValue::from_static("1!4!YQ--"),
        );
        assert_eq!(
            continuation_from_headers(&headers),
            Some(ContinuationToken::new("1!4!YQ--", None))
        );

        headers.insert(NEXT_ROW_KEY_HEADER, HeaderValue::from_static("1!4!Mg--"));
        assert_eq!(
            continuation_from_headers(&headers),
            Some(ContinuationToken::new(
                "1!4!YQ--",
                Some("1!4!Mg--".to_string())
            ))
        );
    }
}
