//! Benchmark driver planning and execution with a recording runner

mod common;

use std::sync::Arc;

use common::{memory_store, small_config, RecordingRunner};
use list_bench::constants::{ENV_ACCESS_KEY, ENV_SECRET_KEY, LIST_MAX_KEYS};
use list_bench::driver::{candidate_trials, Driver, ProbeCommand};
use list_bench::layout::{flat_key, Layout};
use list_bench::pattern::Pattern;
use list_bench::results_dir::ResultsDir;
use list_bench::runner::HyperfineExport;
use list_bench::seed::{SeedStatus, Seeder};
use tempfile::TempDir;

#[tokio::test]
async fn test_full_run_over_seeded_corpus() {
    let scratch = TempDir::new().unwrap();
    let (_memory, store) = memory_store();
    let config = small_config(&[100, 1000], 10, 500, scratch.path());
    Seeder::new(store.clone(), config.clone()).seed_all().await.unwrap();

    let runner = RecordingRunner::new();
    let results = ResultsDir::create(&scratch.path().join("results")).unwrap();
    let driver = Driver::new(store, runner.clone(), config.clone(), ProbeCommand::new("list-bench"));

    for pattern in Pattern::ALL {
        driver.run(pattern, &results).await.unwrap();
        assert!(results.json_path(pattern).exists());
        assert!(results.markdown_path(pattern).exists());
    }

    let batches = runner.recorded();
    assert_eq!(batches.len(), 3);
    assert_eq!(
        batches[0].names,
        vec!["full-list-flat-100", "full-list-nested-100", "full-list-flat-1000", "full-list-nested-1000"]
    );
    assert_eq!(batches[1].names, vec!["paginated-flat-1000-2pages", "paginated-nested-1000-2pages"]);
    assert_eq!(
        batches[2].names,
        vec![
            "prefix-filter-nested-100",
            "delimiter-nested-100",
            "prefix-filter-nested-1000",
            "delimiter-nested-1000"
        ]
    );
    assert!(batches.iter().all(|b| b.runs == config.runs && b.warmup == config.warmup));

    // Credentials travel in the environment, never on the command line
    let secret = &config.credentials.secret_key;
    for batch in &batches {
        assert!(batch.env.iter().any(|(k, v)| k == ENV_SECRET_KEY && v == secret));
        assert!(batch.env.iter().any(|(k, _)| k == ENV_ACCESS_KEY));
        assert!(batch.commands.iter().all(|c| !c.contains(secret.as_str())));
    }
    assert!(batches[0].commands[0].starts_with("list-bench probe --bucket listbench-flat-100 --mode full"));

    let export = HyperfineExport::load(&results.json_path(Pattern::Paginated)).unwrap();
    assert_eq!(export.results.len(), 2);
}

#[tokio::test]
async fn test_ineligible_containers_are_skipped() {
    let scratch = TempDir::new().unwrap();
    let (memory, store) = memory_store();
    let config = small_config(&[50, 80], 5, 1000, scratch.path());
    let seeder = Seeder::new(store.clone(), config.clone());

    // 50: flat complete, nested short. 80: flat over-populated, nested missing
    seeder.seed_container(Layout::Flat, 50).await.unwrap();
    memory.fail_puts_for(["prefix-000/obj-000000".to_string()]);
    seeder.seed_container(Layout::Nested, 50).await.unwrap();
    memory.clear_failures();
    seeder.seed_container(Layout::Flat, 80).await.unwrap();
    store
        .put_object("listbench-flat-80", &flat_key(999), bytes::Bytes::from_static(b"x"))
        .await
        .unwrap();

    let runner = RecordingRunner::new();
    let results = ResultsDir::create(&scratch.path().join("results")).unwrap();
    let driver = Driver::new(store, runner.clone(), config, ProbeCommand::new("list-bench"));

    let outcome = driver.run(Pattern::FullList, &results).await.unwrap();
    let names: Vec<_> = outcome.trials.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["full-list-flat-50"]);

    let skipped: Vec<_> = outcome.skipped.iter().map(|s| (s.name.as_str(), s.reason.as_str())).collect();
    assert_eq!(skipped.len(), 3);
    assert!(skipped[0].0 == "full-list-nested-50" && skipped[0].1.contains("under-populated"));
    assert!(skipped[1].0 == "full-list-flat-80" && skipped[1].1.contains("expected exactly 80"));
    assert!(skipped[2].0 == "full-list-nested-80" && skipped[2].1.contains("does not exist"));

    let persisted = std::fs::read_to_string(results.skipped_path(Pattern::FullList)).unwrap();
    assert!(persisted.contains("full-list-nested-80"));
}

#[tokio::test]
async fn test_empty_matrix_is_an_error() {
    let scratch = TempDir::new().unwrap();
    let (_memory, store) = memory_store();
    let config = small_config(&[100], 10, 1000, scratch.path());

    let runner = RecordingRunner::new();
    let results = ResultsDir::create(&scratch.path().join("results")).unwrap();
    let driver = Driver::new(store, runner.clone(), config, ProbeCommand::new("list-bench"));

    let err = driver.run(Pattern::FullList, &results).await.unwrap_err();
    assert!(err.to_string().contains("No eligible work"), "{}", err);
    assert!(runner.recorded().is_empty());
    assert!(!results.json_path(Pattern::FullList).exists());
}

#[tokio::test]
async fn test_paginated_without_large_tier_has_no_work() {
    let scratch = TempDir::new().unwrap();
    let (_memory, store) = memory_store();
    let config = small_config(&[100], 10, 1000, scratch.path());
    Seeder::new(store.clone(), config.clone()).seed_all().await.unwrap();

    let runner = RecordingRunner::new();
    let results = ResultsDir::create(&scratch.path().join("results")).unwrap();
    let driver = Driver::new(store, runner, config, ProbeCommand::new("list-bench"));

    let plan = driver.plan(Pattern::Paginated).await.unwrap();
    assert!(plan.trials.is_empty());
    assert!(plan.skipped.is_empty());
    assert!(driver.run(Pattern::Paginated, &results).await.is_err());
}

#[tokio::test]
async fn test_container_counts_are_cached_across_phases() {
    let scratch = TempDir::new().unwrap();
    let (memory, store) = memory_store();
    let config = small_config(&[2_500], 10, 1000, scratch.path());
    Seeder::new(store.clone(), config.clone()).seed_all().await.unwrap();

    let runner: Arc<RecordingRunner> = RecordingRunner::new();
    let results = ResultsDir::create(&scratch.path().join("results")).unwrap();
    let driver = Driver::new(store, runner, config, ProbeCommand::new("list-bench"));

    memory.reset_list_calls();
    driver.run(Pattern::FullList, &results).await.unwrap();
    let after_first = memory.list_calls();
    assert_eq!(after_first, 6);

    driver.run(Pattern::Paginated, &results).await.unwrap();
    driver.run(Pattern::Prefix, &results).await.unwrap();
    assert_eq!(memory.list_calls(), after_first);
}

#[tokio::test]
async fn test_page_size_above_server_cap_is_rejected() {
    let scratch = TempDir::new().unwrap();
    let config = small_config(&[5_000], 10, LIST_MAX_KEYS + 1, scratch.path());
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("between 1 and 1000"), "{}", err);

    // At the cap, the planned request count is what the server issues
    let (memory, store) = memory_store();
    let config = small_config(&[5_000], 10, LIST_MAX_KEYS, scratch.path());
    config.validate().unwrap();
    Seeder::new(store.clone(), config.clone()).seed_container(Layout::Flat, 5_000).await.unwrap();

    let runner = RecordingRunner::new();
    let driver = Driver::new(store.clone(), runner, config.clone(), ProbeCommand::new("list-bench"));
    let plan = driver.plan(Pattern::Paginated).await.unwrap();
    assert_eq!(plan.trials[0].name, "paginated-flat-5000-5pages");

    let candidate = candidate_trials(Pattern::Paginated, &config).remove(0);
    memory.reset_list_calls();
    candidate.probe.execute(store.as_ref()).await.unwrap();
    assert_eq!(memory.list_calls(), 5);
}

#[tokio::test]
async fn test_nested_container_from_other_partition_count_is_skipped() {
    let scratch = TempDir::new().unwrap();
    let (_memory, store) = memory_store();
    Seeder::new(store.clone(), small_config(&[100], 10, 1000, scratch.path()))
        .seed_all()
        .await
        .unwrap();

    // Same tier, different partition count: re-seeding writes nothing
    let config = small_config(&[100], 20, 1000, scratch.path());
    let reseed = Seeder::new(store.clone(), config.clone()).seed_all().await.unwrap();
    assert!(reseed.containers.iter().all(|c| c.status == SeedStatus::AlreadyPopulated));

    let runner = RecordingRunner::new();
    let results = ResultsDir::create(&scratch.path().join("results")).unwrap();
    let driver = Driver::new(store, runner.clone(), config, ProbeCommand::new("list-bench"));

    let plan = driver.plan(Pattern::Prefix).await.unwrap();
    assert!(plan.trials.is_empty());
    let skipped: Vec<_> = plan.skipped.iter().map(|s| (s.name.as_str(), s.reason.as_str())).collect();
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0].0, "prefix-filter-nested-100");
    assert!(skipped[0].1.contains("layout mismatch"), "{}", skipped[0].1);
    assert_eq!(skipped[1].0, "delimiter-nested-100");
    assert!(skipped[1].1.contains("10 partitions, expected 20"), "{}", skipped[1].1);

    // Full-list trials only depend on the object count
    let full = driver.run(Pattern::FullList, &results).await.unwrap();
    assert_eq!(full.trials.len(), 2);

    let err = driver.run(Pattern::Prefix, &results).await.unwrap_err();
    assert!(err.to_string().contains("No eligible work"), "{}", err);
    assert_eq!(runner.recorded().len(), 1);
}
