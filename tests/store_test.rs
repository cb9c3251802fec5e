mod common;

use hivemind::adapters::sqlite::{hive_migrations, swarm_migrations, Migrator, Store};
use hivemind::domain::models::Swarm;
use hivemind::domain::ports::SwarmRepository;

#[tokio::test]
async fn test_migrations_apply_once() {
    let store = Store::open_in_memory().await.unwrap();
    let migrator = Migrator::new(store.pool().clone());

    let applied = migrator.run(&hive_migrations()).await.unwrap();
    assert_eq!(applied, hive_migrations().len());
    assert_eq!(migrator.current_version().await.unwrap(), 1);

    // A second pass has nothing to do.
    let applied = migrator.run(&hive_migrations()).await.unwrap();
    assert_eq!(applied, 0);
}

#[tokio::test]
async fn test_committed_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hive.db");

    let swarm = Swarm::new("durable", "persist me");
    {
        let store = Store::open(&db_path).await.unwrap();
        Migrator::new(store.pool().clone())
            .run(&hive_migrations())
            .await
            .unwrap();
        let repo =
            hivemind::adapters::sqlite::SqliteSwarmRepository::new(store.pool().clone());
        repo.create(&swarm).await.unwrap();
        // Dropped without close(): simulates an unclean shutdown that
        // leaves the WAL sidecars behind.
        drop(store);
    }

    let store = Store::open(&db_path).await.unwrap();
    let repo = hivemind::adapters::sqlite::SqliteSwarmRepository::new(store.pool().clone());
    let restored = repo.get(swarm.id).await.unwrap().expect("row survived reopen");
    assert_eq!(restored.name, "durable");

    // No duplication either.
    let all = repo.list(None).await.unwrap();
    assert_eq!(all.len(), 1);
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_close_truncates_wal() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hive.db");

    let store = Store::open(&db_path).await.unwrap();
    Migrator::new(store.pool().clone())
        .run(&hive_migrations())
        .await
        .unwrap();
    store.close().await.unwrap();

    let wal = dir.path().join("hive.db-wal");
    let wal_len = std::fs::metadata(&wal).map(|m| m.len()).unwrap_or(0);
    assert_eq!(wal_len, 0, "checkpoint should leave an empty WAL");
}

#[tokio::test]
async fn test_backup_writes_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hive.db");
    let backup_path = dir.path().join("backups/hive-backup.db");

    let store = Store::open(&db_path).await.unwrap();
    Migrator::new(store.pool().clone())
        .run(&hive_migrations())
        .await
        .unwrap();
    let repo = hivemind::adapters::sqlite::SqliteSwarmRepository::new(store.pool().clone());
    let swarm = Swarm::new("backed-up", "objective");
    repo.create(&swarm).await.unwrap();

    store.backup(&backup_path).await.unwrap();
    store.close().await.unwrap();

    // The backup opens as a standalone database containing the row.
    let restored = Store::open(&backup_path).await.unwrap();
    let repo =
        hivemind::adapters::sqlite::SqliteSwarmRepository::new(restored.pool().clone());
    assert!(repo.get(swarm.id).await.unwrap().is_some());
    restored.close().await.unwrap();
}

#[tokio::test]
async fn test_transaction_rolls_back_on_drop() {
    let store = common::setup_swarm_store().await;

    let mut tx = store.begin().await.unwrap();
    sqlx::query(
        "INSERT INTO metadata (key, value, updated_at) VALUES ('k', 'v', datetime('now'))",
    )
    .execute(&mut *tx)
    .await
    .unwrap();
    drop(tx); // rollback

    let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM metadata")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert!(rows.is_empty(), "dropped transaction left no rows");

    let mut tx = store.begin().await.unwrap();
    sqlx::query(
        "INSERT INTO metadata (key, value, updated_at) VALUES ('k', 'v', datetime('now'))",
    )
    .execute(&mut *tx)
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM metadata")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "committed transaction persists");
}

#[tokio::test]
async fn test_both_schemas_coexist() {
    // hive and swarm migrations target different databases with different
    // tables; each migrator must leave its own store queryable.
    let hive = common::setup_hive_store().await;
    let swarm = common::setup_swarm_store().await;

    let hive_tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(hive.pool())
            .await
            .unwrap();
    let names: Vec<&str> = hive_tables.iter().map(|(n,)| n.as_str()).collect();
    for expected in [
        "agents",
        "collective_memory",
        "consensus_decisions",
        "migrations",
        "swarms",
        "tasks",
    ] {
        assert!(names.contains(&expected), "missing table {expected}");
    }

    let swarm_tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(swarm.pool())
            .await
            .unwrap();
    let names: Vec<&str> = swarm_tables.iter().map(|(n,)| n.as_str()).collect();
    for expected in ["memory_store", "metadata", "migrations"] {
        assert!(names.contains(&expected), "missing table {expected}");
    }

    assert_eq!(swarm_migrations().len(), 1);
}
