//! `init` command: create databases, run migrations, write config.json.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::{hive_migrations, swarm_migrations, Migrator, Store};
use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::{ConfigLoader, HiveConfig};

#[derive(Debug, Serialize)]
struct InitOutput {
    hive_db: String,
    swarm_db: String,
    config: String,
    hive_migrations_applied: usize,
    swarm_migrations_applied: usize,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        format!(
            "Hive initialized.\n  hive database:  {} ({} migration(s) applied)\n  swarm database: {} ({} migration(s) applied)\n  config:         {}",
            self.hive_db,
            self.hive_migrations_applied,
            self.swarm_db,
            self.swarm_migrations_applied,
            self.config,
        )
    }
}

pub async fn handle_init(config: HiveConfig, force: bool, json: bool) -> Result<()> {
    let hive_db = config.hive_db_path();
    let swarm_db = config.swarm_db_path();

    if force {
        for db in [&hive_db, &swarm_db] {
            for suffix in ["", "-wal", "-shm"] {
                let mut path = db.as_os_str().to_owned();
                path.push(suffix);
                let path = std::path::PathBuf::from(path);
                if path.exists() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                }
            }
        }
    }

    let hive_store = Store::open(&hive_db)
        .await
        .context("Failed to create hive database")?;
    let hive_applied = Migrator::new(hive_store.pool().clone())
        .run(&hive_migrations())
        .await
        .context("Hive database migration failed")?;

    let swarm_store = Store::open(&swarm_db)
        .await
        .context("Failed to create swarm database")?;
    let swarm_applied = Migrator::new(swarm_store.pool().clone())
        .run(&swarm_migrations())
        .await
        .context("Swarm database migration failed")?;

    ConfigLoader::write(&config).context("Failed to write config.json")?;

    hive_store.close().await?;
    swarm_store.close().await?;

    output(
        &InitOutput {
            hive_db: hive_db.display().to_string(),
            swarm_db: swarm_db.display().to_string(),
            config: config.config_path().display().to_string(),
            hive_migrations_applied: hive_applied,
            swarm_migrations_applied: swarm_applied,
        },
        json,
    );
    Ok(())
}
