//! Dispatcher runs over the file-backed store and the in-memory repository.

use std::path::Path;

use linksync_core::{
    config::LinkSyncConfig,
    store,
    types::{FieldName, LanguageTag, Record, RecordId, RecordType},
};
use linksync_engine::{
    Collaborators, ConfigError, ConfigSchema, DispatchMode, DispatchReport, Dispatcher,
    FileRepository, LifecycleEvent, LinkError, MemoryRepository, TargetAction, TargetRuleValidator,
};
use tempfile::TempDir;

const RELATED: &str = "Article~Article~related~Article~Article~related";
const PRODUCTS: &str = "Article~News~products~Product~Shoe~articles";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(links: &str) -> LinkSyncConfig {
    let yaml = format!(
        r#"
version: 1
languages: [en, de]
types:
  - name: Article
    subtypes:
      - name: Article
        fields:
          - name: related
            cardinality: 2
      - name: News
        fields:
          - name: products
            localized: true
  - name: Product
    subtypes:
      - name: Shoe
        fields:
          - name: articles
links:
{links}
"#
    );
    serde_yaml::from_str(&yaml).expect("config parses")
}

fn article(id: u64, related: &[u64]) -> Record {
    Record::new("Article", "Article", id).with_links("related", "default", related.iter().copied())
}

fn ids(record: &Record, field: &str) -> Vec<u64> {
    record
        .link_targets(&FieldName::from(field))
        .map(|id| id.0)
        .collect()
}

fn on_disk(home: &Path, record_type: &str, id: u64) -> Record {
    store::load_record_at(home, &RecordType::from(record_type), RecordId(id)).expect("record on disk")
}

/// Dispatch against the file store rooted at `home`.
fn dispatch_file(
    home: &Path,
    config: &LinkSyncConfig,
    event: &mut LifecycleEvent,
) -> Result<DispatchReport, LinkError> {
    let repo = FileRepository::new(home);
    let schema = ConfigSchema::new(config);
    let validator = TargetRuleValidator::new(&repo);
    Dispatcher::from_config(config).dispatch(
        event,
        Collaborators::new(&repo, &schema, &validator),
        DispatchMode::Direct,
    )
}

fn dispatch_memory(
    repo: &MemoryRepository,
    config: &LinkSyncConfig,
    event: &mut LifecycleEvent,
    mode: DispatchMode,
) -> Result<DispatchReport, LinkError> {
    let schema = ConfigSchema::new(config);
    let validator = TargetRuleValidator::new(repo);
    Dispatcher::from_config(config).dispatch(
        event,
        Collaborators::new(repo, &schema, &validator),
        mode,
    )
}

// ---------------------------------------------------------------------------
// Lifecycle against the record store
// ---------------------------------------------------------------------------

#[test]
fn related_articles_follow_insert_update_delete() {
    init_logging();
    let home = TempDir::new().unwrap();
    let config = config(&format!("  - key: {RELATED}"));
    for record in [article(1, &[2]), article(2, &[]), article(3, &[])] {
        store::save_record_at(home.path(), &record).unwrap();
    }

    // insert
    let mut event = LifecycleEvent::insert(on_disk(home.path(), "Article", 1));
    let report = dispatch_file(home.path(), &config, &mut event).expect("insert");
    assert_eq!(report.runs.len(), 1, "self-referencing pair runs once");
    assert_eq!(ids(&on_disk(home.path(), "Article", 2), "related"), vec![1]);

    // update: related [2] -> [3]
    let previous = on_disk(home.path(), "Article", 1);
    store::save_record_at(home.path(), &article(1, &[3])).unwrap();
    let mut event = LifecycleEvent::update(on_disk(home.path(), "Article", 1), Some(previous));
    dispatch_file(home.path(), &config, &mut event).expect("update");
    assert!(ids(&on_disk(home.path(), "Article", 2), "related").is_empty());
    assert_eq!(ids(&on_disk(home.path(), "Article", 3), "related"), vec![1]);

    // delete
    let mut event = LifecycleEvent::delete(on_disk(home.path(), "Article", 1));
    let report = dispatch_file(home.path(), &config, &mut event).expect("delete");
    assert!(report.record_modified);
    assert!(ids(&on_disk(home.path(), "Article", 3), "related").is_empty());
    assert!(ids(&on_disk(home.path(), "Article", 2), "related").is_empty());
}

#[test]
fn remote_side_event_runs_the_reversed_pair() {
    init_logging();
    let home = TempDir::new().unwrap();
    let config = config(&format!("  - key: {PRODUCTS}"));
    store::save_record_at(home.path(), &Record::new("Article", "News", 10)).unwrap();
    let shoe = Record::new("Product", "Shoe", 21).with_links("articles", "default", [10]);
    store::save_record_at(home.path(), &shoe).unwrap();

    let mut event = LifecycleEvent::insert(shoe);
    let report = dispatch_file(home.path(), &config, &mut event).expect("insert");

    assert_eq!(report.runs.len(), 1);
    assert_eq!(report.runs[0].link, "Product~Shoe~articles~Article~News~products");
    assert!(!report.record_modified);

    let news = on_disk(home.path(), "Article", 10);
    let products = news.variants(&FieldName::from("products")).expect("field written");
    for language in ["en", "de"] {
        let entries = &products[&LanguageTag::from(language)];
        assert_eq!(entries.len(), 1, "{language}");
        assert_eq!(entries[0].target, Some(RecordId(21)));
    }
}

#[test]
fn unrelated_records_and_disabled_links_are_ignored() {
    let repo = MemoryRepository::with_records([article(1, &[2]), article(2, &[])]);
    let config = config(&format!("  - key: {RELATED}\n    enabled: false\n  - key: {PRODUCTS}"));

    let mut event = LifecycleEvent::insert(article(1, &[2]));
    let report = dispatch_memory(&repo, &config, &mut event, DispatchMode::Direct).unwrap();
    assert!(report.runs.is_empty());
    assert!(repo.saves().is_empty());
}

// ---------------------------------------------------------------------------
// Error handling modes
// ---------------------------------------------------------------------------

#[test]
fn direct_mode_stops_at_first_failure() {
    let repo = MemoryRepository::with_records([article(1, &[2]), article(2, &[])]);
    let config = config(&format!(
        "  - key: Article~Article~missing~Article~Article~related\n  - key: {RELATED}"
    ));

    let mut event = LifecycleEvent::insert(article(1, &[2]));
    let err = dispatch_memory(&repo, &config, &mut event, DispatchMode::Direct).unwrap_err();
    assert!(
        matches!(err, LinkError::Config(ConfigError::UnresolvedField { .. })),
        "got: {err}"
    );
    assert!(repo.saves().is_empty(), "later pairs never ran");
}

#[test]
fn batch_mode_collects_failures_and_continues() {
    let repo = MemoryRepository::with_records([article(1, &[2]), article(2, &[])]);
    let config = config(&format!(
        "  - key: Article~Article~missing~Article~Article~related\n  - key: not-a-key\n  - key: {RELATED}"
    ));

    let mut event = LifecycleEvent::insert(article(1, &[2]));
    let report = dispatch_memory(&repo, &config, &mut event, DispatchMode::Batch).unwrap();

    assert!(!report.is_clean());
    let failed: Vec<&str> = report.failures.iter().map(|f| f.link.as_str()).collect();
    assert_eq!(
        failed,
        vec!["Article~Article~missing~Article~Article~related", "not-a-key"]
    );
    assert!(matches!(
        report.failures[1].error,
        LinkError::Config(ConfigError::MalformedKey { parts: 1, .. })
    ));
    assert_eq!(report.runs.len(), 1);
    let stored = repo.get(&RecordType::from("Article"), RecordId(2)).unwrap();
    assert_eq!(ids(&stored, "related"), vec![1]);
}

#[test]
fn batch_mode_records_target_save_failures() {
    let repo = MemoryRepository::with_records([article(1, &[2, 3]), article(2, &[]), article(3, &[])]);
    repo.fail_saves_of(&RecordType::from("Article"), RecordId(3));
    let config = config(&format!("  - key: {RELATED}"));

    let mut event = LifecycleEvent::insert(article(1, &[2, 3]));
    let report = dispatch_memory(&repo, &config, &mut event, DispatchMode::Batch).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, LinkError::Store(_)));
    assert!(report.runs.is_empty());
    let stored = repo.get(&RecordType::from("Article"), RecordId(2)).unwrap();
    assert_eq!(ids(&stored, "related"), vec![1], "target before the failure was saved");
}

#[test]
fn failed_run_still_reports_local_changes_and_partial_outcomes() {
    let repo = MemoryRepository::with_records([article(1, &[2, 3]), article(2, &[1]), article(3, &[1])]);
    repo.fail_saves_of(&RecordType::from("Article"), RecordId(3));
    let config = config(&format!("  - key: {RELATED}"));

    let mut event = LifecycleEvent::delete(article(1, &[2, 3]));
    let report = dispatch_memory(&repo, &config, &mut event, DispatchMode::Batch).unwrap();

    assert!(ids(&event.record, "related").is_empty());
    assert!(report.record_modified, "engine cleared the local field before failing");
    assert_eq!(report.failures.len(), 1);

    let partial = report.failures[0].report.as_ref().expect("partial report");
    let targets: Vec<u64> = partial.targets.iter().map(|t| t.target.0).collect();
    assert_eq!(targets, vec![2, 3]);
    assert!(matches!(partial.targets[0].action, TargetAction::Dereferenced(_)));
    assert!(matches!(partial.targets[1].action, TargetAction::Failed { .. }));
}

#[test]
fn unresolvable_pair_only_fails_the_records_it_names() {
    let repo = MemoryRepository::with_records([
        article(1, &[2]),
        article(2, &[]),
        Record::new("Product", "Shoe", 7),
    ]);
    let config = config(&format!(
        "  - key: Product~Shoe~nope~Product~Shoe~articles\n  - key: {RELATED}"
    ));

    let mut event = LifecycleEvent::insert(article(1, &[2]));
    let report = dispatch_memory(&repo, &config, &mut event, DispatchMode::Direct)
        .expect("unrelated pair is skipped");
    assert_eq!(report.runs.len(), 1);
    assert_eq!(ids(&repo.get(&RecordType::from("Article"), RecordId(2)).unwrap(), "related"), vec![1]);

    let mut event = LifecycleEvent::insert(Record::new("Product", "Shoe", 7));
    let err = dispatch_memory(&repo, &config, &mut event, DispatchMode::Direct).unwrap_err();
    assert!(
        matches!(err, LinkError::Config(ConfigError::UnresolvedField { .. })),
        "got: {err}"
    );
}
