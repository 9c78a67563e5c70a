use crate::error::{Result, SinkError};
use crate::types::BulkResponse;

/// Turn a structured bulk outcome into success or one aggregate error.
///
/// Every item is scanned; the top-level `errors` flag is informational only.
/// A single failing item fails the whole slice. Identifiers are deduplicated
/// in first-seen order.
pub fn check_bulk_response(response: &BulkResponse) -> Result<()> {
    let mut identifiers: Vec<String> = Vec::new();

    for item in &response.items {
        let outcome = &item.index;
        let identifier = match &outcome.error {
            Some(error) => error.identifier().to_string(),
            // Non-2xx without a descriptor still counts as a failure.
            None if outcome.status >= 300 => format!("status {}", outcome.status),
            None => continue,
        };
        if !identifiers.contains(&identifier) {
            identifiers.push(identifier);
        }
    }

    if identifiers.is_empty() {
        if response.errors {
            tracing::warn!("[SINK] bulk response flagged errors but no failing item was found");
        }
        Ok(())
    } else {
        Err(SinkError::AggregateItem(identifiers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BulkItem, ItemError, ItemOutcome};

    fn ok_item() -> BulkItem {
        BulkItem {
            index: ItemOutcome {
                status: 201,
                ..Default::default()
            },
        }
    }

    fn failed_item(status: u16, label: &str) -> BulkItem {
        BulkItem {
            index: ItemOutcome {
                status,
                error: Some(ItemError::Label(label.to_string())),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_all_success_is_ok() {
        assert!(check_bulk_response(&BulkResponse::all_ok(6)).is_ok());
    }

    #[test]
    fn test_empty_items_is_ok() {
        assert!(check_bulk_response(&BulkResponse::default()).is_ok());
    }

    #[test]
    fn test_failures_are_deduplicated_in_order() {
        let response = BulkResponse {
            took: Some(30),
            errors: true,
            items: vec![
                ok_item(),
                failed_item(500, "InternalServerError"),
                ok_item(),
                failed_item(403, "Forbidden"),
                failed_item(500, "InternalServerError"),
                ok_item(),
            ],
        };
        let err = check_bulk_response(&response).unwrap_err();
        assert_eq!(err.to_string(), "InternalServerError,Forbidden");
        assert_eq!(
            err,
            SinkError::AggregateItem(vec![
                "InternalServerError".to_string(),
                "Forbidden".to_string()
            ])
        );
    }

    #[test]
    fn test_structured_error_uses_type() {
        let response = BulkResponse {
            took: None,
            errors: true,
            items: vec![BulkItem {
                index: ItemOutcome {
                    status: 400,
                    error: Some(ItemError::Detail {
                        kind: "mapper_parsing_exception".to_string(),
                        reason: Some("failed to parse".to_string()),
                    }),
                    ..Default::default()
                },
            }],
        };
        let err = check_bulk_response(&response).unwrap_err();
        assert_eq!(err.to_string(), "mapper_parsing_exception");
    }

    #[test]
    fn test_bad_status_without_error_descriptor_fails() {
        let response = BulkResponse {
            took: None,
            errors: false,
            items: vec![
                ok_item(),
                BulkItem {
                    index: ItemOutcome {
                        status: 429,
                        ..Default::default()
                    },
                },
            ],
        };
        let err = check_bulk_response(&response).unwrap_err();
        assert_eq!(err.to_string(), "status 429");
    }

    #[test]
    fn test_errors_flag_alone_does_not_fail() {
        let mut response = BulkResponse::all_ok(2);
        response.errors = true;
        assert!(check_bulk_response(&response).is_ok());
    }
}
