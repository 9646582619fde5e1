//! Pre-flight validation for list-bench
//!
//! Runs before any seeding or timing so that an unreachable server, bad
//! credentials or a missing timing tool abort the run up front with an
//! actionable message instead of failing halfway through a phase.
//!
//! Checks proceed from cheapest to most involved:
//! 1. config - resolved parameters are coherent
//! 2. tools - the timing runner is installed
//! 3. endpoint - the object store answers ListBuckets

pub mod object_storage;
pub mod tools;

use std::fmt;

use anyhow::{bail, Result};

use crate::config::{BenchConfig, SeedStrategy};
use crate::runner::TimingRunner;
use crate::store::ObjectStore;

/// Type of error encountered during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Invalid credentials or signature mismatch
    Authentication,
    /// DNS, connectivity, or timeout issues
    Network,
    /// Invalid configuration values
    Configuration,
    /// Required external tool missing
    Tooling,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Authentication => write!(f, "Authentication"),
            ErrorType::Network => write!(f, "Network"),
            ErrorType::Configuration => write!(f, "Configuration"),
            ErrorType::Tooling => write!(f, "Tooling"),
        }
    }
}

/// Severity level of validation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResultLevel {
    Success,
    Info,
    /// Potential issue but not fatal
    Warning,
    /// Fatal issue - must fix before proceeding
    Error,
}

impl fmt::Display for ResultLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultLevel::Success => write!(f, "SUCCESS"),
            ResultLevel::Info => write!(f, "INFO"),
            ResultLevel::Warning => write!(f, "WARNING"),
            ResultLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a single validation check
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub level: ResultLevel,
    /// None for Success
    pub error_type: Option<ErrorType>,
    pub message: String,
    /// How to fix it
    pub suggestion: String,
    pub details: Option<String>,
    /// Check identifier ("config", "tools", "endpoint")
    pub test_phase: String,
}

impl ValidationResult {
    pub fn error(
        error_type: ErrorType,
        test_phase: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            level: ResultLevel::Error,
            error_type: Some(error_type),
            message: message.into(),
            suggestion: suggestion.into(),
            details: None,
            test_phase: test_phase.into(),
        }
    }

    pub fn warning(
        error_type: ErrorType,
        test_phase: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            level: ResultLevel::Warning,
            error_type: Some(error_type),
            message: message.into(),
            suggestion: suggestion.into(),
            details: None,
            test_phase: test_phase.into(),
        }
    }

    pub fn info(test_phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: ResultLevel::Info,
            error_type: None,
            message: message.into(),
            suggestion: String::new(),
            details: None,
            test_phase: test_phase.into(),
        }
    }

    pub fn success(test_phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: ResultLevel::Success,
            error_type: None,
            message: message.into(),
            suggestion: String::new(),
            details: None,
            test_phase: test_phase.into(),
        }
    }

    /// Add technical details to this result
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn icon(&self) -> &'static str {
        match self.level {
            ResultLevel::Success => "✓",
            ResultLevel::Info => "ℹ",
            ResultLevel::Warning => "⚠",
            ResultLevel::Error => "✗",
        }
    }

    fn tag(&self) -> &'static str {
        match self.error_type {
            Some(ErrorType::Authentication) => "[AUTH]",
            Some(ErrorType::Network) => "[NET]",
            Some(ErrorType::Configuration) => "[CONFIG]",
            Some(ErrorType::Tooling) => "[TOOLS]",
            None => "",
        }
    }
}

/// Summary of all validation results
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub results: Vec<ValidationResult>,
}

impl ValidationSummary {
    pub fn new(results: Vec<ValidationResult>) -> Self {
        Self { results }
    }

    pub fn extend(&mut self, other: ValidationSummary) {
        self.results.extend(other.results);
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| r.level == ResultLevel::Error)
    }

    pub fn error_count(&self) -> usize {
        self.count(ResultLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(ResultLevel::Warning)
    }

    fn count(&self, level: ResultLevel) -> usize {
        self.results.iter().filter(|r| r.level == level).count()
    }

    /// Check if validation passed (no errors, warnings OK)
    pub fn passed(&self) -> bool {
        !self.has_errors()
    }

    /// Display results to console
    pub fn display(&self) {
        println!(
            "\nPre-flight: {} errors, {} warnings",
            self.error_count(),
            self.warning_count()
        );
        for result in &self.results {
            let tag = result.tag();
            if tag.is_empty() {
                println!("  {} [{}] {}", result.icon(), result.test_phase, result.message);
            } else {
                println!("  {} {} [{}] {}", result.icon(), tag, result.test_phase, result.message);
            }
            if !result.suggestion.is_empty() {
                println!("      → {}", result.suggestion);
            }
            if let Some(ref details) = result.details {
                if !details.is_empty() {
                    println!("      Details: {}", details);
                }
            }
        }
    }
}

/// Configuration sanity beyond what `BenchConfig::validate` enforces
pub fn validate_config(config: &BenchConfig) -> ValidationSummary {
    let mut results = Vec::new();
    match config.validate() {
        Ok(()) => results.push(ValidationResult::success(
            "config",
            format!(
                "tiers [{}], {} partitions, page size {}, {} runs / {} warmup",
                config.tiers_display(),
                config.partitions,
                config.page_size,
                config.runs,
                config.warmup
            ),
        )),
        Err(e) => results.push(ValidationResult::error(
            ErrorType::Configuration,
            "config",
            format!("{:#}", e),
            "Fix the flag or LISTBENCH_* variable named above",
        )),
    }

    if config.tiers.iter().all(|&t| t <= config.page_size as u64) {
        results.push(ValidationResult::warning(
            ErrorType::Configuration,
            "config",
            format!("No tier exceeds the page size ({})", config.page_size),
            "The paginated pattern will have no trials; add a larger tier or lower --page-size",
        ));
    }
    if config.tiers.iter().any(|&t| t < config.partitions as u64) {
        results.push(ValidationResult::warning(
            ErrorType::Configuration,
            "config",
            format!("Some tiers are smaller than the partition count ({})", config.partitions),
            "Nested containers for those tiers leave some partitions empty",
        ));
    }
    if config.seed_strategy == SeedStrategy::Staged {
        results.push(ValidationResult::info(
            "config",
            format!("Staged seeding builds hard-link trees under {}", config.staging_dir.display()),
        ));
    }
    ValidationSummary::new(results)
}

/// Run every check; fails if any check reports an error
pub async fn run_preflight(
    config: &BenchConfig,
    store: &dyn ObjectStore,
    runner: &dyn TimingRunner,
    need_runner: bool,
) -> Result<ValidationSummary> {
    let mut summary = validate_config(config);
    if need_runner {
        summary.extend(tools::validate_runner(runner).await);
    }
    summary.extend(object_storage::validate_endpoint(store, &config.endpoint).await);

    for r in &summary.results {
        tracing::debug!("preflight {} [{}] {}", r.level, r.test_phase, r.message);
    }
    if !summary.passed() {
        summary.display();
        bail!("Pre-flight validation failed with {} error(s)", summary.error_count());
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = ValidationSummary::new(vec![
            ValidationResult::success("config", "ok"),
            ValidationResult::warning(ErrorType::Configuration, "config", "hmm", "fix"),
            ValidationResult::error(ErrorType::Network, "endpoint", "down", "start it"),
        ]);
        assert!(summary.has_errors());
        assert!(!summary.passed());
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.warning_count(), 1);
    }

    #[test]
    fn test_validate_config_warnings() {
        let mut config = BenchConfig::default();
        config.tiers = vec![10, 100];
        config.partitions = 50;
        config.page_size = 1000;
        let summary = validate_config(&config);
        assert!(summary.passed());
        assert_eq!(summary.warning_count(), 2);
    }

    #[test]
    fn test_staged_strategy_reports_staging_area() {
        let mut config = BenchConfig::default();
        config.seed_strategy = SeedStrategy::Staged;
        config.staging_dir = "/scratch/list-bench".into();
        let summary = validate_config(&config);
        let info: Vec<_> = summary.results.iter().filter(|r| r.level == ResultLevel::Info).collect();
        assert_eq!(info.len(), 1);
        assert!(info[0].message.contains("/scratch/list-bench"));
        assert_eq!(info[0].icon(), "ℹ");
        assert!(summary.passed());
    }

    #[test]
    fn test_validate_config_error() {
        let mut config = BenchConfig::default();
        config.page_size = 0;
        assert!(validate_config(&config).has_errors());
    }
}
