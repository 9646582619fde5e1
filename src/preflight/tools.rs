//! External tool availability

use super::{ErrorType, ValidationResult, ValidationSummary};
use crate::runner::TimingRunner;

pub async fn validate_runner(runner: &dyn TimingRunner) -> ValidationSummary {
    let result = match runner.check_available().await {
        Ok(version) => ValidationResult::success("tools", format!("{} available: {}", runner.name(), version)),
        Err(e) => ValidationResult::error(
            ErrorType::Tooling,
            "tools",
            format!("{} is not usable", runner.name()),
            "Install hyperfine or point LISTBENCH_HYPERFINE at its binary",
        )
        .with_details(format!("{:#}", e)),
    };
    ValidationSummary::new(vec![result])
}
