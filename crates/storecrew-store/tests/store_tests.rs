//! Tests for storecrew-store: MemoryStore, JsonFileStore, and MutationExecutor

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use storecrew_core::*;
use storecrew_store::*;

fn schemas() -> Arc<SchemaRegistry> {
    let mut reg = SchemaRegistry::new();
    reg.register(
        "sports",
        SchemaRule::builder("name")
            .required("name", FieldKind::Text)
            .required("rule", FieldKind::Text)
            .optional("players", FieldKind::Number)
            .build()
            .unwrap(),
    )
    .unwrap();
    reg.register(
        "people",
        SchemaRule::builder("name")
            .required("name", FieldKind::Text)
            .required("gender", FieldKind::Text)
            .optional("age", FieldKind::Number)
            .build()
            .unwrap(),
    )
    .unwrap();
    Arc::new(reg)
}

fn validate(req: OperationRequest) -> ValidatedRequest {
    OperationValidator::new(schemas()).validate(&req).unwrap()
}

fn memory_executor() -> MutationExecutor {
    MutationExecutor::new(Arc::new(MemoryStore::new()))
}

async fn run(exec: &MutationExecutor, req: OperationRequest) -> OperationResult {
    exec.apply(&validate(req)).await
}

fn create_container(store: &str, container: &str) -> OperationRequest {
    OperationRequest::new(OperationKind::CreateContainer, Target::container(store, container))
}

fn tennis(rule: &str) -> OperationRequest {
    OperationRequest::new(
        OperationKind::CreateRecord,
        Target::container("sports_db", "sports").with_key("Tennis"),
    )
    .with_field("rule", rule)
}

async fn all_records(exec: &MutationExecutor, store: &str, container: &str) -> Vec<Record> {
    let result = run(
        exec,
        OperationRequest::new(OperationKind::RetrieveRecords, Target::container(store, container)),
    )
    .await;
    result.data().and_then(|d| d.records.clone()).unwrap_or_default()
}

// ===========================================================================
// Structural operations
// ===========================================================================

#[tokio::test]
async fn create_container_twice_is_skipped() {
    let exec = memory_executor();
    let first = run(&exec, create_container("sports_db", "sports")).await;
    assert_eq!(first.data().unwrap().created.as_deref(), Some("sports"));

    let second = run(&exec, create_container("sports_db", "sports")).await;
    assert!(second.is_success());
    assert!(second.data().unwrap().skipped);

    let stores = exec.store().list_stores().await.unwrap();
    assert_eq!(stores, vec!["sports_db".to_string()]);
}

#[tokio::test]
async fn create_store_twice_is_skipped() {
    let exec = memory_executor();
    let req = OperationRequest::new(OperationKind::CreateStore, Target::store("club"));
    assert!(!run(&exec, req.clone()).await.data().unwrap().skipped);
    assert!(run(&exec, req).await.data().unwrap().skipped);
}

#[tokio::test]
async fn delete_missing_container_is_not_found() {
    let exec = memory_executor();
    run(&exec, create_container("sports_db", "sports")).await;

    let result = run(
        &exec,
        OperationRequest::new(OperationKind::DeleteContainer, Target::container("sports_db", "chess")),
    )
    .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));

    let containers = exec.store().list_containers("sports_db").await.unwrap();
    assert_eq!(containers, vec!["sports".to_string()]);
}

#[tokio::test]
async fn delete_store_removes_it() {
    let exec = memory_executor();
    run(&exec, create_container("tmp", "a")).await;
    let result = run(&exec, OperationRequest::new(OperationKind::DeleteStore, Target::store("tmp"))).await;
    assert_eq!(result.data().unwrap().deleted_count, Some(1));
    assert!(!exec.store().store_exists("tmp").await.unwrap());

    let again = run(&exec, OperationRequest::new(OperationKind::DeleteStore, Target::store("tmp"))).await;
    assert_eq!(again.error_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn rename_container_and_conflict() {
    let exec = memory_executor();
    run(&exec, create_container("db", "a")).await;
    run(&exec, create_container("db", "b")).await;

    let conflict = run(
        &exec,
        OperationRequest::new(OperationKind::RenameContainer, Target::container("db", "a"))
            .with_rename_to("b"),
    )
    .await;
    assert_eq!(conflict.error_kind(), Some(ErrorKind::Conflict));

    let renamed = run(
        &exec,
        OperationRequest::new(OperationKind::RenameContainer, Target::container("db", "a"))
            .with_rename_to("c"),
    )
    .await;
    assert_eq!(renamed.data().unwrap().renamed_to.as_deref(), Some("c"));
    assert_eq!(
        exec.store().list_containers("db").await.unwrap(),
        vec!["b".to_string(), "c".to_string()]
    );
}

#[tokio::test]
async fn rename_missing_store_is_not_found() {
    let exec = memory_executor();
    let result = run(
        &exec,
        OperationRequest::new(OperationKind::RenameStore, Target::store("ghost")).with_rename_to("real"),
    )
    .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn list_containers_of_missing_store_is_not_found() {
    let exec = memory_executor();
    let result = run(
        &exec,
        OperationRequest::new(OperationKind::ListContainers, Target::store("ghost")),
    )
    .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
}

// ===========================================================================
// Record upsert
// ===========================================================================

#[tokio::test]
async fn tennis_created_twice_yields_one_record() {
    let exec = memory_executor();
    run(&exec, create_container("sports_db", "sports")).await;

    let first = run(&exec, tennis("Best of three sets")).await;
    assert!(first.data().unwrap().inserted_id.is_some());

    let second = run(&exec, tennis("Best of five sets")).await;
    let data = second.data().unwrap();
    assert_eq!(data.matched_count, Some(1));
    assert_eq!(data.modified_count, Some(1));
    assert!(data.inserted_id.is_none());

    let records = all_records(&exec, "sports_db", "sports").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], json!("Tennis"));
    assert_eq!(records[0]["rule"], json!("Best of five sets"));
    assert!(records[0].contains_key("_id"));
    assert!(records[0].contains_key("created_at"));
}

#[tokio::test]
async fn repeated_update_is_idempotent() {
    let exec = memory_executor();
    run(&exec, create_container("sports_db", "sports")).await;
    run(&exec, tennis("Best of three sets").with_field("players", 2)).await;

    let update = OperationRequest::new(
        OperationKind::UpdateRecord,
        Target::container("sports_db", "sports").with_key("Tennis"),
    )
    .with_field("rule", "Tiebreak at 6-6");

    run(&exec, update.clone()).await;
    let once = all_records(&exec, "sports_db", "sports").await;

    for _ in 0..4 {
        run(&exec, update.clone()).await;
    }
    let many = all_records(&exec, "sports_db", "sports").await;

    assert_eq!(once, many);
    assert_eq!(many.len(), 1);
    assert_eq!(many[0]["players"], json!(2));
    assert_eq!(many[0]["rule"], json!("Tiebreak at 6-6"));
}

#[tokio::test]
async fn record_write_into_missing_container_is_not_found() {
    let exec = memory_executor();
    let result = run(&exec, tennis("Best of three sets")).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    assert!(exec.store().list_stores().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_record_by_key() {
    let exec = memory_executor();
    run(&exec, create_container("sports_db", "sports")).await;
    run(&exec, tennis("Best of three sets")).await;

    let delete = OperationRequest::new(
        OperationKind::DeleteRecord,
        Target::container("sports_db", "sports").with_key("Tennis"),
    );
    let result = run(&exec, delete.clone()).await;
    assert_eq!(result.data().unwrap().deleted_count, Some(1));
    assert!(all_records(&exec, "sports_db", "sports").await.is_empty());

    let again = run(&exec, delete).await;
    assert_eq!(again.error_kind(), Some(ErrorKind::NotFound));
}

// ===========================================================================
// Retrieval
// ===========================================================================

async fn seed_people(exec: &MutationExecutor) {
    run(exec, create_container("hr", "people")).await;
    for (name, gender, age) in [("A", "Male", 40), ("B", "Female", 35), ("C", "Male", 25)] {
        let req = OperationRequest::new(OperationKind::CreateRecord, Target::container("hr", "people"))
            .with_field("name", name)
            .with_field("gender", gender)
            .with_field("age", age);
        assert!(run(exec, req).await.is_success());
    }
}

fn names(records: &[Record]) -> Vec<&str> {
    records.iter().filter_map(|r| r["name"].as_str()).collect()
}

#[tokio::test]
async fn filter_by_gender() {
    let exec = memory_executor();
    run(&exec, create_container("hr", "people")).await;
    for (name, gender) in [("A", "Male"), ("B", "Female")] {
        run(
            &exec,
            OperationRequest::new(OperationKind::CreateRecord, Target::container("hr", "people"))
                .with_field("name", name)
                .with_field("gender", gender),
        )
        .await;
    }

    let result = run(
        &exec,
        OperationRequest::new(OperationKind::RetrieveRecords, Target::container("hr", "people"))
            .with_query(Query::default().filter("gender", "Male")),
    )
    .await;
    let records = result.data().unwrap().records.clone().unwrap();
    assert_eq!(names(&records), vec!["A"]);
}

#[tokio::test]
async fn sort_limit_and_projection() {
    let exec = memory_executor();
    seed_people(&exec).await;

    let query = Query::default()
        .filter("gender", "Male")
        .sort_by("age", SortOrder::Ascending)
        .limit(1)
        .project(["name"]);
    let result = run(
        &exec,
        OperationRequest::new(OperationKind::RetrieveRecords, Target::container("hr", "people"))
            .with_query(query),
    )
    .await;
    let records = result.data().unwrap().records.clone().unwrap();
    assert_eq!(names(&records), vec!["C"]);
    let keys: Vec<&String> = records[0].keys().collect();
    assert_eq!(keys, vec!["_id", "name"]);
}

#[tokio::test]
async fn retrieval_without_filter_returns_everything() {
    let exec = memory_executor();
    seed_people(&exec).await;
    assert_eq!(all_records(&exec, "hr", "people").await.len(), 3);
}

// ===========================================================================
// JsonFileStore
// ===========================================================================

#[tokio::test]
async fn file_store_persists_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("catalog.json");

    {
        let exec = MutationExecutor::new(Arc::new(JsonFileStore::open(&path).await.unwrap()));
        run(&exec, create_container("sports_db", "sports")).await;
        run(&exec, tennis("Best of three sets")).await;
        run(&exec, tennis("Best of five sets")).await;
    }

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());

    let reopened = JsonFileStore::open(&path).await.unwrap();
    let records = reopened
        .find("sports_db", "sports", &Query::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["rule"], json!("Best of five sets"));
}

#[tokio::test]
async fn file_store_opens_missing_file_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(tmp.path().join("nested/none.json")).await.unwrap();
    assert!(store.list_stores().await.unwrap().is_empty());
    assert!(store.create_store("s").await.unwrap());
    assert!(tmp.path().join("nested/none.json").exists());
}

fn golf() -> Record {
    json!({ "name": "Golf", "rule": "Fewest strokes wins" }).as_object().cloned().unwrap()
}

fn tennis_fields() -> Record {
    json!({ "name": "Tennis", "rule": "Best of three sets" }).as_object().cloned().unwrap()
}

#[tokio::test]
async fn file_store_handles_share_committed_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("shared.json");

    let a = JsonFileStore::open(&path).await.unwrap();
    let b = JsonFileStore::open(&path).await.unwrap();

    a.create_container("sports_db", "sports").await.unwrap();
    assert!(b.container_exists("sports_db", "sports").await.unwrap());

    a.upsert("sports_db", "sports", "name", &json!("Tennis"), &tennis_fields())
        .await
        .unwrap();
    b.upsert("sports_db", "sports", "name", &json!("Golf"), &golf())
        .await
        .unwrap();

    let reopened = JsonFileStore::open(&path).await.unwrap();
    let mut names: Vec<String> = reopened
        .find("sports_db", "sports", &Query::default())
        .await
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Golf", "Tennis"]);
}

#[tokio::test]
async fn file_store_concurrent_writers_lose_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("busy.json");
    JsonFileStore::open(&path)
        .await
        .unwrap()
        .create_container("club", "players")
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let path = path.clone();
        tasks.push(tokio::spawn(async move {
            let store = JsonFileStore::open(&path).await.unwrap();
            let fields = json!({ "name": format!("p{}", i) }).as_object().cloned().unwrap();
            store
                .upsert("club", "players", "name", &json!(format!("p{}", i)), &fields)
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let store = JsonFileStore::open(&path).await.unwrap();
    let records = store.find("club", "players", &Query::default()).await.unwrap();
    assert_eq!(records.len(), 8);
}

#[tokio::test]
async fn file_store_rejects_corrupt_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(JsonFileStore::open(&path).await, Err(StoreError::Json(_))));
}

// ===========================================================================
// Timeouts and faults
// ===========================================================================

/// Delegates to a MemoryStore, sleeping before every read. With
/// `fail_writes`, record writes report a backend fault.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    fail_writes: bool,
}

#[async_trait::async_trait]
impl DocumentStore for SlowStore {
    fn name(&self) -> &str { "slow" }
    async fn list_stores(&self) -> StoreResult<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_stores().await
    }
    async fn store_exists(&self, store: &str) -> StoreResult<bool> {
        self.inner.store_exists(store).await
    }
    async fn create_store(&self, store: &str) -> StoreResult<bool> {
        self.inner.create_store(store).await
    }
    async fn drop_store(&self, store: &str) -> StoreResult<bool> {
        self.inner.drop_store(store).await
    }
    async fn rename_store(&self, from: &str, to: &str) -> StoreResult<bool> {
        self.inner.rename_store(from, to).await
    }
    async fn list_containers(&self, store: &str) -> StoreResult<Vec<String>> {
        self.inner.list_containers(store).await
    }
    async fn container_exists(&self, store: &str, container: &str) -> StoreResult<bool> {
        self.inner.container_exists(store, container).await
    }
    async fn create_container(&self, store: &str, container: &str) -> StoreResult<bool> {
        self.inner.create_container(store, container).await
    }
    async fn drop_container(&self, store: &str, container: &str) -> StoreResult<bool> {
        self.inner.drop_container(store, container).await
    }
    async fn rename_container(&self, store: &str, from: &str, to: &str) -> StoreResult<bool> {
        self.inner.rename_container(store, from, to).await
    }
    async fn find(&self, store: &str, container: &str, query: &Query) -> StoreResult<Vec<Record>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(store, container, query).await
    }
    async fn upsert(
        &self,
        store: &str,
        container: &str,
        key_field: &str,
        key: &Value,
        fields: &Record,
    ) -> StoreResult<UpsertOutcome> {
        if self.fail_writes {
            return Err(StoreError::Backend("disk quota exceeded".into()));
        }
        self.inner.upsert(store, container, key_field, key, fields).await
    }
    async fn delete_one(&self, store: &str, container: &str, key_field: &str, key: &Value) -> StoreResult<bool> {
        self.inner.delete_one(store, container, key_field, key).await
    }
}

#[tokio::test]
async fn slow_store_times_out() {
    let store = SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_secs(5),
        fail_writes: false,
    };
    let exec = MutationExecutor::new(Arc::new(store)).with_timeout(Duration::from_millis(20));
    let result = run(&exec, OperationRequest::new(OperationKind::ListStores, Target::default())).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
}

#[tokio::test]
async fn backend_fault_is_a_storage_fault_result() {
    let inner = MemoryStore::new();
    inner.create_container("sports_db", "sports").await.unwrap();
    let store = SlowStore {
        inner,
        delay: Duration::ZERO,
        fail_writes: true,
    };
    let exec = MutationExecutor::new(Arc::new(store));

    let result = run(&exec, tennis("Best of three sets")).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::StorageFault));
    assert!(result.message().unwrap().contains("disk quota exceeded"));

    let listed = run(&exec, OperationRequest::new(OperationKind::ListStores, Target::default())).await;
    assert!(listed.is_success());
}

#[test]
fn store_errors_map_to_execution_errors() {
    let missing: ExecutionError = StoreError::missing_container("db", "c").into();
    assert!(matches!(missing, ExecutionError::NotFound(_)));
    let taken: ExecutionError = StoreError::AlreadyExists("store 'x'".into()).into();
    assert!(matches!(taken, ExecutionError::Conflict(_)));
    let io: ExecutionError = StoreError::Io(std::io::Error::other("disk")).into();
    assert!(matches!(io, ExecutionError::StorageFault(_)));
}

#[test]
fn definition_lists_every_operation() {
    let def = MutationExecutor::definition();
    assert_eq!(def.name, TOOL_NAME);
    let kinds = def.input_schema["properties"]["operation"]["enum"].as_array().unwrap();
    assert_eq!(kinds.len(), OperationKind::ALL.len());
    assert!(kinds.contains(&json!("create_record")));
}
