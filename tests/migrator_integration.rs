//! Integration tests for the migration runner.
//!
//! These tests drive the runner end to end against in-memory SQLite
//! databases, checking ordering, atomicity and the range operations.

use pretty_assertions::assert_eq;
use verso::migrate::{
    Connection, Executor, MigrateResult, Migration, MigrationError, MigrationRegistry, Migrator,
    MigratorConfig, SqlMigration, SqlValue, StatusSummary, Transaction, VersionOrdering,
    summarize,
};
use verso::sqlite::SqliteConnection;

/// Appends `up <version>` / `down <version>` to a `journal` table.
struct Journaled {
    version: &'static str,
}

#[async_trait::async_trait]
impl Migration for Journaled {
    fn name(&self) -> &str {
        "journaled"
    }

    async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.execute(
            "INSERT INTO journal (entry) VALUES (?1)",
            &[SqlValue::from(format!("up {}", self.version))],
        )
        .await?;
        Ok(())
    }

    async fn down(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.execute(
            "INSERT INTO journal (entry) VALUES (?1)",
            &[SqlValue::from(format!("down {}", self.version))],
        )
        .await?;
        Ok(())
    }
}

/// Creates a table, writes to it, then fails.
struct WritesThenFails;

#[async_trait::async_trait]
impl Migration for WritesThenFails {
    fn name(&self) -> &str {
        "writes_then_fails"
    }

    async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.batch_execute("CREATE TABLE half_done (id INTEGER PRIMARY KEY)")
            .await?;
        tx.execute("INSERT INTO half_done (id) VALUES (?1)", &[SqlValue::Integer(1)])
            .await?;
        Err(MigrationError::other("simulated failure"))
    }

    async fn down(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.batch_execute("DROP TABLE half_done").await
    }
}

/// Writes a side table, then claims its own history row so the runner's
/// record insert collides.
struct RecordsItself {
    version: &'static str,
}

#[async_trait::async_trait]
impl Migration for RecordsItself {
    fn name(&self) -> &str {
        "records_itself"
    }

    async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.batch_execute("CREATE TABLE side_effect (id INTEGER PRIMARY KEY)")
            .await?;
        tx.execute("INSERT INTO side_effect (id) VALUES (?1)", &[SqlValue::Integer(1)])
            .await?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            &[SqlValue::from(self.version), SqlValue::from("records_itself")],
        )
        .await?;
        Ok(())
    }

    async fn down(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.batch_execute("DROP TABLE side_effect").await
    }
}

/// Applies cleanly but cannot be reverted.
struct FailsOnDown;

#[async_trait::async_trait]
impl Migration for FailsOnDown {
    fn name(&self) -> &str {
        "fails_on_down"
    }

    async fn up(&self, tx: &mut dyn Transaction) -> MigrateResult<()> {
        tx.execute("INSERT INTO journal (entry) VALUES (?1)", &[SqlValue::from("up 3")])
            .await?;
        Ok(())
    }

    async fn down(&self, _tx: &mut dyn Transaction) -> MigrateResult<()> {
        Err(MigrationError::other("cannot revert"))
    }
}

fn journaled(ordering: VersionOrdering, versions: &[&'static str]) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new(ordering);
    for &version in versions {
        registry.register(version, Journaled { version }).unwrap();
    }
    registry
}

async fn open() -> SqliteConnection {
    let mut conn = SqliteConnection::open_in_memory().await.unwrap();
    conn.batch_execute(
        "CREATE TABLE journal (seq INTEGER PRIMARY KEY AUTOINCREMENT, entry TEXT NOT NULL)",
    )
    .await
    .unwrap();
    conn
}

async fn migrator(registry: MigrationRegistry) -> Migrator<SqliteConnection> {
    Migrator::new(open().await, registry).unwrap()
}

async fn journal<C: Connection>(migrator: &mut Migrator<C>) -> Vec<String> {
    migrator
        .connection_mut()
        .query("SELECT entry FROM journal ORDER BY seq", &[])
        .await
        .unwrap()
        .iter()
        .map(|row| row.get_str(0).unwrap().to_string())
        .collect()
}

async fn table_exists<C: Connection>(migrator: &mut Migrator<C>, table: &str) -> bool {
    migrator
        .connection_mut()
        .query_opt(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[SqlValue::from(table)],
        )
        .await
        .unwrap()
        .is_some()
}

async fn applied<C: Connection>(migrator: &mut Migrator<C>) -> Vec<String> {
    migrator
        .status()
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_applied)
        .map(|s| s.version)
        .collect()
}

/// Test that a second `up` with nothing new applies nothing
#[tokio::test]
async fn test_up_is_idempotent() {
    let mut migrator = migrator(journaled(VersionOrdering::Lexicographic, &["001", "002"])).await;

    migrator.up().await.unwrap();
    migrator.up().await.unwrap();

    assert_eq!(journal(&mut migrator).await, vec!["up 001", "up 002"]);
    assert_eq!(migrator.version().await.unwrap(), Some("002".to_string()));
}

/// Test that units apply in ascending order regardless of registration order
#[tokio::test]
async fn test_up_orders_and_down_reverts_latest() {
    let mut migrator =
        migrator(journaled(VersionOrdering::Lexicographic, &["003", "001", "002"])).await;

    migrator.up().await.unwrap();
    migrator.down().await.unwrap();

    assert_eq!(
        journal(&mut migrator).await,
        vec!["up 001", "up 002", "up 003", "down 003"]
    );
    assert_eq!(applied(&mut migrator).await, vec!["001", "002"]);
}

/// Test that a failing body leaves neither its schema change nor a record
#[tokio::test]
async fn test_failed_unit_is_rolled_back() {
    let registry = MigrationRegistry::new(VersionOrdering::Lexicographic)
        .with("001", Journaled { version: "001" })
        .unwrap()
        .with("002", WritesThenFails)
        .unwrap()
        .with("003", Journaled { version: "003" })
        .unwrap();
    let mut migrator = migrator(registry).await;

    let err = migrator.up().await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Failed { ref version, .. } if version == "002"
    ));
    assert!(err.to_string().contains("simulated failure"));

    assert!(!table_exists(&mut migrator, "half_done").await);
    assert_eq!(applied(&mut migrator).await, vec!["001"]);
    assert_eq!(migrator.version().await.unwrap(), Some("001".to_string()));
    // Later units were not attempted.
    assert_eq!(journal(&mut migrator).await, vec!["up 001"]);
}

/// Test that a failed history write also undoes the unit's body
#[tokio::test]
async fn test_bookkeeping_failure_rolls_back_body() {
    let registry = MigrationRegistry::new(VersionOrdering::Lexicographic)
        .with("001", Journaled { version: "001" })
        .unwrap()
        .with("002", RecordsItself { version: "002" })
        .unwrap();
    let mut migrator = migrator(registry).await;

    let err = migrator.up().await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Bookkeeping { ref version, .. } if version == "002"
    ));

    assert!(!table_exists(&mut migrator, "side_effect").await);
    assert_eq!(applied(&mut migrator).await, vec!["001"]);
    assert_eq!(migrator.version().await.unwrap(), Some("001".to_string()));
}

/// Test that `up_to` applies exactly the bounded prefix
#[tokio::test]
async fn test_up_to_boundary() {
    let mut migrator =
        migrator(journaled(VersionOrdering::Sequential, &["1", "2", "3", "4"])).await;

    migrator.up_to("2").await.unwrap();

    let statuses = migrator.status().await.unwrap();
    let split: Vec<(&str, bool)> = statuses
        .iter()
        .map(|s| (s.version.as_str(), s.is_applied))
        .collect();
    assert_eq!(
        split,
        vec![("1", true), ("2", true), ("3", false), ("4", false)]
    );
    assert!(statuses[0].executed_at.is_some());
    assert!(statuses[2].executed_at.is_none());
    assert_eq!(
        summarize(&statuses),
        StatusSummary {
            applied: 2,
            pending: 2,
            orphaned: 0
        }
    );
    assert_eq!(migrator.pending().await.unwrap(), vec!["3", "4"]);
}

/// Test that `down_to` reverts newest first and keeps the bound applied
#[tokio::test]
async fn test_down_to_boundary() {
    let mut migrator =
        migrator(journaled(VersionOrdering::Sequential, &["1", "2", "3", "4"])).await;

    migrator.up().await.unwrap();
    migrator.down_to("2").await.unwrap();

    let log = journal(&mut migrator).await;
    assert_eq!(&log[4..], &["down 4".to_string(), "down 3".to_string()]);
    assert_eq!(applied(&mut migrator).await, vec!["1", "2"]);

    // Nothing newer than the bound is left, so a second call is a no-op.
    migrator.down_to("2").await.unwrap();
    assert_eq!(journal(&mut migrator).await.len(), 6);
}

/// Test that a `down_to` failure part-way keeps what it already reverted
#[tokio::test]
async fn test_down_to_stops_at_first_failure() {
    let registry = MigrationRegistry::new(VersionOrdering::Sequential)
        .with("1", Journaled { version: "1" })
        .unwrap()
        .with("2", Journaled { version: "2" })
        .unwrap()
        .with("3", FailsOnDown)
        .unwrap()
        .with("4", Journaled { version: "4" })
        .unwrap();
    let mut migrator = migrator(registry).await;
    migrator.up().await.unwrap();

    let err = migrator.down_to("1").await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Failed { ref version, .. } if version == "3"
    ));
    assert!(err.to_string().contains("cannot revert"));

    assert_eq!(applied(&mut migrator).await, vec!["1", "2", "3"]);
    assert_eq!(migrator.version().await.unwrap(), Some("3".to_string()));
    assert_eq!(journal(&mut migrator).await.last().map(String::as_str), Some("down 4"));
}

/// Test that reverting an unregistered version fails without changes
#[tokio::test]
async fn test_down_unknown_version_is_not_found() {
    let mut migrator =
        migrator(journaled(VersionOrdering::Lexicographic, &["001", "002", "003"])).await;
    migrator.up().await.unwrap();

    migrator
        .connection_mut()
        .execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            &[SqlValue::from("005"), SqlValue::from("removed")],
        )
        .await
        .unwrap();

    let err = migrator.down().await.unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(ref v) if v == "005"));

    assert_eq!(applied(&mut migrator).await, vec!["001", "002", "003", "005"]);
    assert_eq!(journal(&mut migrator).await.len(), 3);
}

/// Test that `down_to` checks every unit before reverting any
#[tokio::test]
async fn test_down_to_with_unknown_version_changes_nothing() {
    let mut migrator = migrator(journaled(VersionOrdering::Sequential, &["1", "2", "3"])).await;
    migrator.up().await.unwrap();

    migrator
        .connection_mut()
        .execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            &[SqlValue::from("7"), SqlValue::from("removed")],
        )
        .await
        .unwrap();

    let err = migrator.down_to("1").await.unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(ref v) if v == "7"));
    assert_eq!(applied(&mut migrator).await, vec!["1", "2", "3", "7"]);
}

/// Test that a fresh database reports no version and an empty history
#[tokio::test]
async fn test_empty_state() {
    let mut migrator = migrator(journaled(VersionOrdering::Lexicographic, &["001"])).await;

    assert_eq!(migrator.version().await.unwrap(), None);
    migrator.down().await.unwrap();
    migrator.down_to("000").await.unwrap();

    let statuses = migrator.status().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].is_applied);
    assert!(journal(&mut migrator).await.is_empty());
}

/// Test that sequential ordering compares numerically
#[tokio::test]
async fn test_sequential_ordering_is_numeric() {
    let mut migrator =
        migrator(journaled(VersionOrdering::Sequential, &["10", "9", "2", "1"])).await;

    migrator.up().await.unwrap();
    assert_eq!(
        journal(&mut migrator).await,
        vec!["up 1", "up 2", "up 9", "up 10"]
    );
    assert_eq!(migrator.version().await.unwrap(), Some("10".to_string()));

    migrator.down().await.unwrap();
    assert_eq!(migrator.version().await.unwrap(), Some("9".to_string()));
}

/// Test that sequential ordering refuses to apply below the applied head
#[tokio::test]
async fn test_sequential_rejects_out_of_order() {
    let conn = open().await;
    let mut migrator =
        Migrator::new(conn, journaled(VersionOrdering::Sequential, &["1", "3"])).unwrap();
    migrator.up().await.unwrap();

    let conn = migrator.into_inner();
    let mut migrator =
        Migrator::new(conn, journaled(VersionOrdering::Sequential, &["1", "2", "3"])).unwrap();

    let err = migrator.up().await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::OutOfOrder { ref version, ref highest } if version == "2" && highest == "3"
    ));
}

/// Test that lexicographic ordering applies late-arriving lower versions
#[tokio::test]
async fn test_lexicographic_applies_late_arrivals() {
    let conn = open().await;
    let mut migrator =
        Migrator::new(conn, journaled(VersionOrdering::Lexicographic, &["001", "003"])).unwrap();
    migrator.up().await.unwrap();

    let conn = migrator.into_inner();
    let mut migrator = Migrator::new(
        conn,
        journaled(VersionOrdering::Lexicographic, &["001", "002", "003"]),
    )
    .unwrap();
    migrator.up().await.unwrap();

    assert_eq!(applied(&mut migrator).await, vec!["001", "002", "003"]);
    assert_eq!(migrator.version().await.unwrap(), Some("003".to_string()));
}

/// Test that orphaned history rows show up in status and can block `up`
#[tokio::test]
async fn test_orphans() {
    let conn = open().await;
    let mut migrator =
        Migrator::new(conn, journaled(VersionOrdering::Lexicographic, &["001", "002"])).unwrap();
    migrator.up().await.unwrap();

    let conn = migrator.into_inner();
    let registry = journaled(VersionOrdering::Lexicographic, &["001", "003"]);
    let mut migrator = Migrator::with_config(
        conn,
        registry,
        MigratorConfig::new().fail_on_orphans(true),
    )
    .unwrap();

    let statuses = migrator.status().await.unwrap();
    let orphan = statuses.iter().find(|s| s.version == "002").unwrap();
    assert!(orphan.is_orphaned());
    assert_eq!(orphan.name, "journaled");
    assert_eq!(summarize(&statuses).orphaned, 1);

    let err = migrator.verify().await.unwrap_err();
    assert!(matches!(err, MigrationError::Inconsistent { ref orphans } if orphans == &["002"]));

    let err = migrator.up().await.unwrap_err();
    assert!(err.is_consistency_error());
    assert!(!applied(&mut migrator).await.contains(&"003".to_string()));
}

/// Test that a custom history table name is honoured
#[tokio::test]
async fn test_custom_history_table() {
    let mut migrator = Migrator::with_config(
        open().await,
        journaled(VersionOrdering::Lexicographic, &["001"]),
        MigratorConfig::new().table_name("app_versions"),
    )
    .unwrap();

    migrator.up().await.unwrap();

    assert!(table_exists(&mut migrator, "app_versions").await);
    assert!(!table_exists(&mut migrator, "schema_migrations").await);
    assert_eq!(migrator.version().await.unwrap(), Some("001".to_string()));
}

/// Test that reverting an irreversible unit fails and keeps its record
#[tokio::test]
async fn test_irreversible_unit() {
    let registry = MigrationRegistry::new(VersionOrdering::Lexicographic)
        .with(
            "001",
            SqlMigration::irreversible("create_audit", "CREATE TABLE audit (id INTEGER)"),
        )
        .unwrap();
    let mut migrator = migrator(registry).await;
    migrator.up().await.unwrap();

    let err = migrator.down().await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Failed { ref version, .. } if version == "001"
    ));
    assert!(table_exists(&mut migrator, "audit").await);
    assert_eq!(migrator.version().await.unwrap(), Some("001".to_string()));
}

/// Test that the runner is usable through the backend-neutral trait
#[tokio::test]
async fn test_schema_migrator_trait_object() {
    use verso::migrate::SchemaMigrator;

    let mut migrator: Box<dyn SchemaMigrator> =
        Box::new(migrator(journaled(VersionOrdering::Sequential, &["1", "2"])).await);

    assert_eq!(migrator.backend_name(), "sqlite");
    migrator.up().await.unwrap();
    migrator.down_to("1").await.unwrap();
    assert_eq!(migrator.version().await.unwrap(), Some("1".to_string()));
    assert_eq!(migrator.status().await.unwrap().len(), 2);
}
