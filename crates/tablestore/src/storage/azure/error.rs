//! Table service error mapping.
//!
//! Maps HTTP status codes and OData error codes to `RepositoryError` from
//! `tablestore_core::storage`.

use serde::Deserialize;

use tablestore_core::storage::{entity_id, RepositoryError};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Debug, Deserialize)]
struct ODataError {
    code: String,
    message: ODataMessage,
}

#[derive(Debug, Deserialize)]
struct ODataMessage {
    value: String,
}

/// Error code and message of a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ServiceError {
    /// Parses an OData error body. Unparseable bodies keep the raw text as message.
    pub fn parse(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status,
                code: parsed.error.code,
                message: first_line(&parsed.error.message.value).to_string(),
            },
            Err(_) => Self {
                status,
                code: String::new(),
                message: first_line(body.trim()).to_string(),
            },
        }
    }

    /// Index of the failing sub-request in a batch, from a `"{index}:{message}"` message.
    pub fn batch_index(&self) -> Option<usize> {
        let (index, _) = self.message.split_once(':')?;
        index.trim().parse().ok()
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

/// Service messages carry the request id and time on following lines.
fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

/// The entity an operation addressed, for not-found and conflict errors.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub partition_key: &'a str,
    pub row_key: &'a str,
}

/// Map a failed response to RepositoryError.
pub fn map_service_error(error: &ServiceError, target: Option<Target<'_>>) -> RepositoryError {
    let id = || {
        target
            .map(|t| entity_id(t.partition_key, t.row_key))
            .unwrap_or_default()
    };

    match error.status {
        404 if error.is("TableNotFound") => {
            RepositoryError::QueryFailed("Table not found".to_string())
        }
        404 => RepositoryError::NotFound {
            entity_type: "Entity",
            id: id(),
        },
        409 if error.is("EntityAlreadyExists") => RepositoryError::AlreadyExists {
            entity_type: "Entity",
            id: id(),
        },
        409 if error.is("TableAlreadyExists") => RepositoryError::AlreadyExists {
            entity_type: "Table",
            id: String::new(),
        },
        412 => RepositoryError::PreconditionFailed {
            entity_type: "Entity",
            id: id(),
        },
        400 | 413 => RepositoryError::InvalidData(describe(error)),
        401 | 403 => {
            RepositoryError::ConnectionFailed(format!("authentication failed: {}", describe(error)))
        }
        503 => RepositoryError::ConnectionFailed(format!(
            "table service unavailable: {}",
            describe(error)
        )),
        status => RepositoryError::QueryFailed(format!(
            "table service returned {status}: {}",
            describe(error)
        )),
    }
}

/// Map a transport failure (DNS, TLS, timeout, reset) to RepositoryError.
pub fn map_transport_error(err: reqwest::Error) -> RepositoryError {
    if err.is_timeout() {
        RepositoryError::ConnectionFailed(format!("request timed out: {err}"))
    } else {
        RepositoryError::ConnectionFailed(err.to_string())
    }
}

fn describe(error: &ServiceError) -> String {
    match (error.code.is_empty(), error.message.is_empty()) {
        (true, true) => format!("HTTP {}", error.status),
        (true, false) => error.message.clone(),
        (false, true) => error.code.clone(),
        (false, false) => format!("{}: {}", error.code, error.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFLICT: &str = r#"{"odata.error":{"code":"EntityAlreadyExists","message":{"lang":"en-US","value":"The specified entity already exists.\nRequestId:abc\nTime:2024-01-01T00:00:00Z"}}}"#;

    fn target() -> Option<Target<'static>> {
        Some(Target {
            partition_key: "u1",
            row_key: "p1",
        })
    }

    #[test]
    fn test_parse_odata_error() {
        let error = ServiceError::parse(409, CONFLICT);
        assert_eq!(error.code, "EntityAlreadyExists");
        assert_eq!(error.message, "The specified entity already exists.");
    }

    #[test]
    fn test_parse_non_json_body() {
        let error = ServiceError::parse(502, "Bad Gateway\n");
        assert_eq!(error.code, "");
        assert_eq!(error.message, "Bad Gateway");
    }

    #[test]
    fn test_batch_index() {
        let error = ServiceError {
            status: 409,
            code: "EntityAlreadyExists".to_string(),
            message: "2:The specified entity already exists.".to_string(),
        };
        assert_eq!(error.batch_index(), Some(2));
        assert_eq!(ServiceError::parse(409, CONFLICT).batch_index(), None);
    }

    #[test]
    fn test_conflict_maps_to_already_exists() {
        let error = ServiceError::parse(409, CONFLICT);
        assert_eq!(
            map_service_error(&error, target()),
            RepositoryError::entity_exists("u1", "p1")
        );
    }

    #[test]
    fn test_missing_entity_maps_to_not_found() {
        let error = ServiceError {
            status: 404,
            code: "ResourceNotFound".to_string(),
            message: "The specified resource does not exist.".to_string(),
        };
        assert_eq!(
            map_service_error(&error, target()),
            RepositoryError::entity_not_found("u1", "p1")
        );
    }

    #[test]
    fn test_missing_table_maps_to_query_failed() {
        let error = ServiceError {
            status: 404,
            code: "TableNotFound".to_string(),
            message: String::new(),
        };
        assert!(matches!(
            map_service_error(&error, target()),
            RepositoryError::QueryFailed(_)
        ));
    }

    #[test]
    fn test_status_mapping() {
        let error = |status| ServiceError {
            status,
            code: "Code".to_string(),
            message: "message".to_string(),
        };

        assert!(matches!(
            map_service_error(&error(412), target()),
            RepositoryError::PreconditionFailed { .. }
        ));
        assert_eq!(
            map_service_error(&error(400), None),
            RepositoryError::InvalidData("Code: message".to_string())
        );
        assert!(matches!(
            map_service_error(&error(403), None),
            RepositoryError::ConnectionFailed(_)
        ));
        assert!(matches!(
            map_service_error(&error(500), None),
            RepositoryError::QueryFailed(_)
        ));
    }
}
