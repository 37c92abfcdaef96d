//! Entity group transactions (`$batch`).
//!
//! A batch is a `multipart/mixed` body holding a single changeset; the service
//! applies every sub-request or none of them.

use serde_json::Value;

use tablestore_core::entity::json::entity_to_write_json;
use tablestore_core::DynamicEntity;

use super::request::ACCEPT_JSON;

const CRLF: &str = "\r\n";

/// Boundaries of one batch request.
#[derive(Debug, Clone)]
pub struct BatchBoundaries {
    pub batch: String,
    pub changeset: String,
}

impl BatchBoundaries {
    pub fn new() -> Self {
        Self {
            batch: format!("batch_{}", uuid::Uuid::new_v4()),
            changeset: format!("changeset_{}", uuid::Uuid::new_v4()),
        }
    }

    /// `Content-Type` of the outer request.
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.batch)
    }
}

impl Default for BatchBoundaries {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the body of a batch inserting `entities` into `table_url`.
pub fn build_insert_batch(
    boundaries: &BatchBoundaries,
    table_url: &str,
    entities: &[DynamicEntity],
) -> String {
    let mut body = String::new();

    push_line(&mut body, &format!("--{}", boundaries.batch));
    push_line(
        &mut body,
        &format!(
            "Content-Type: multipart/mixed; boundary={}",
            boundaries.changeset
        ),
    );
    push_line(&mut body, "");

    for (index, entity) in entities.iter().enumerate() {
        let payload = Value::Object(entity_to_write_json(entity)).to_string();

        push_line(&mut body, &format!("--{}", boundaries.changeset));
        push_line(&mut body, "Content-Type: application/http");
        push_line(&mut body, "Content-Transfer-Encoding: binary");
        push_line(&mut body, "");
        push_line(&mut body, &format!("POST {table_url} HTTP/1.1"));
        push_line(&mut body, &format!("Content-ID: {}", index + 1));
        push_line(&mut body, "Content-Type: application/json");
        push_line(&mut body, &format!("Accept: {ACCEPT_JSON}"));
        push_line(&mut body, "Prefer: return-no-content");
        push_line(&mut body, "DataServiceVersion: 3.0");
        push_line(&mut body, "");
        push_line(&mut body, &payload);
    }

    push_line(&mut body, &format!("--{}--", boundaries.changeset));
    push_line(&mut body, &format!("--{}--", boundaries.batch));
    body
}

fn push_line(body: &mut String, line: &str) {
    body.push_str(line);
    body.push_str(CRLF);
}

/// First failing sub-response of a batch: its status and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOperation {
    pub status: u16,
    pub body: String,
}

/// Scans a batch response for the first sub-response with an error status.
///
/// `None` means every sub-request succeeded.
pub fn first_failure(response: &str) -> Option<FailedOperation> {
    let mut rest = response;

    while let Some(start) = rest.find("HTTP/1.1 ") {
        let after = &rest[start + "HTTP/1.1 ".len()..];
        let status: u16 = after
            .get(..3)
            .and_then(|code| code.parse().ok())
            .unwrap_or_default();

        // The sub-response ends at the next boundary line.
        let end = after.find("\n--").unwrap_or(after.len());
        let part = &after[..end];

        if status >= 400 {
            let body = match (part.find('{'), part.rfind('}')) {
                (Some(open), Some(close)) if open < close => part[open..=close].to_string(),
                _ => String::new(),
            };
            return Some(FailedOperation { status, body });
        }
        rest = &after[end..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundaries() -> BatchBoundaries {
        BatchBoundaries {
            batch: "batch_1".to_string(),
            changeset: "changeset_1".to_string(),
        }
    }

    #[test]
    fn test_content_type_names_batch_boundary() {
        assert_eq!(
            boundaries().content_type(),
            "multipart/mixed; boundary=batch_1"
        );
    }

    #[test]
    fn test_build_insert_batch_layout() {
        let entities = vec![
            DynamicEntity::new("a", "1").with_property("n", 1),
            DynamicEntity::new("a", "2"),
        ];
        let body = build_insert_batch(
            &boundaries(),
            "https://acct.table.core.windows.net/orders",
            &entities,
        );

        assert!(body.starts_with(
            "--batch_1\r\nContent-Type: multipart/mixed; boundary=changeset_1\r\n\r\n"
        ));
        assert!(body.ends_with("--changeset_1--\r\n--batch_1--\r\n"));
        assert_eq!(body.matches("--changeset_1\r\n").count(), 2);
        assert_eq!(
            body.matches("POST https://acct.table.core.windows.net/orders HTTP/1.1\r\n")
                .count(),
            2
        );
        assert!(body.contains(r#"{"PartitionKey":"a","RowKey":"1","n":1}"#));
        assert!(body.contains("Content-ID: 2\r\n"));
    }

    #[test]
    fn test_first_failure_none_when_all_succeed() {
        let response = "--batchresponse_1\r\n\
            Content-Type: multipart/mixed; boundary=changesetresponse_1\r\n\r\n\
            --changesetresponse_1\r\n\
            Content-Type: application/http\r\n\r\n\
            HTTP/1.1 204 No Content\r\n\r\n\
            --changesetresponse_1\r\n\
            Content-Type: application/http\r\n\r\n\
            HTTP/1.1 204 No Content\r\n\r\n\
            --changesetresponse_1--\r\n\
            --batchresponse_1--\r\n";

        assert_eq!(first_failure(response), None);
    }

    #[test]
    fn test_first_failure_extracts_status_and_body() {
        let response = "--batchresponse_1\r\n\
            Content-Type: multipart/mixed; boundary=changesetresponse_1\r\n\r\n\
            --changesetresponse_1\r\n\
            Content-Type: application/http\r\n\r\n\
            HTTP/1.1 409 Conflict\r\n\
            Content-Type: application/json;odata=minimalmetadata;charset=utf-8\r\n\r\n\
            {\"odata.error\":{\"code\":\"EntityAlreadyExists\",\"message\":{\"lang\":\"en-US\",\"value\":\"1:The specified entity already exists.\"}}}\r\n\
            --changesetresponse_1--\r\n\
            --batchresponse_1--\r\n";

        let failure = first_failure(response).unwrap();
        assert_eq!(failure.status, 409);
        assert!(failure.body.starts_with("{\"odata.error\""));
        assert!(failure.body.ends_with("}}}"));
    }
}
