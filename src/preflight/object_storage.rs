//! Object storage reachability
//!
//! A single ListBuckets call proves the endpoint answers and the credentials
//! are accepted. Nothing is written.

use super::{ErrorType, ValidationResult, ValidationSummary};
use crate::store::ObjectStore;

/// Classify a failed call by the wording SDK and server errors use
fn classify(message: &str) -> (ErrorType, &'static str) {
    let lower = message.to_ascii_lowercase();
    if lower.contains("accessdenied")
        || lower.contains("signature")
        || lower.contains("invalidaccesskeyid")
        || lower.contains("403")
    {
        (
            ErrorType::Authentication,
            "Check LISTBENCH_ACCESS_KEY / LISTBENCH_SECRET_KEY against the server's credentials",
        )
    } else {
        (
            ErrorType::Network,
            "Make sure the server is running and LISTBENCH_ENDPOINT points at it",
        )
    }
}

pub async fn validate_endpoint(store: &dyn ObjectStore, endpoint: &str) -> ValidationSummary {
    let result = match store.list_buckets().await {
        Ok(buckets) => ValidationResult::success(
            "endpoint",
            format!("{} reachable ({} buckets visible)", endpoint, buckets.len()),
        ),
        Err(e) => {
            let details = format!("{:#}", e);
            let (error_type, suggestion) = classify(&details);
            ValidationResult::error(
                error_type,
                "endpoint",
                format!("{} ({}) did not answer ListBuckets", endpoint, store.describe()),
                suggestion,
            )
            .with_details(details)
        }
    };
    ValidationSummary::new(vec![result])
}
