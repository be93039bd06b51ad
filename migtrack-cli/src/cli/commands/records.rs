//! Handlers for the stored-record commands

use anyhow::{Context, Result, bail};
use colored::*;

use crate::cli::{ClearArgs, RecordsArgs};
use crate::config::Config;
use crate::store::{RecordStore, SqliteStore};

async fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))
}

/// Handle `migtrack records`: one JSON object per line
pub async fn handle_records_command(args: RecordsArgs, config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let records = store
        .fetch(args.kind, args.limit)
        .await
        .with_context(|| format!("Failed to fetch {} records", args.kind))?;

    for record in &records {
        println!("{}", serde_json::to_string(record).context("Failed to serialize record")?);
    }
    log::info!("Printed {} {} record(s)", records.len(), args.kind);

    Ok(())
}

/// Handle `migtrack clear`
pub async fn handle_clear_command(args: ClearArgs, config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let count = store
        .count(args.kind)
        .await
        .with_context(|| format!("Failed to count {} records", args.kind))?;

    if count == 0 {
        println!("No {} stored.", args.kind.label());
        return Ok(());
    }

    if !args.yes {
        bail!(
            "Refusing to delete {} {} without --yes",
            count,
            args.kind.label()
        );
    }

    let removed = store
        .clear(args.kind)
        .await
        .with_context(|| format!("Failed to clear {} records", args.kind))?;
    println!(
        "{} Removed {} {}",
        "✓".bright_green().bold(),
        removed.to_string().bold(),
        args.kind.label()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::*;
    use crate::import::ImportKind;
    use crate::store::StoredRecord;

    async fn seeded(config: &Config) {
        let store = SqliteStore::open(&config.database_path).await.unwrap();
        let records: Vec<_> = ["a", "b"]
            .iter()
            .map(|key| StoredRecord {
                kind: ImportKind::Migration,
                key: key.to_string(),
                import_set: "IMP-test".to_string(),
                imported_at: Utc::now(),
                payload: serde_json::json!({ "application": key }),
            })
            .collect();
        store.save(&records).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let dir = tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("migtrack.db"),
            ..Config::default()
        };
        seeded(&config).await;

        let refused = handle_clear_command(
            ClearArgs {
                kind: ImportKind::Migration,
                yes: false,
            },
            &config,
        )
        .await;
        assert!(refused.is_err());

        handle_clear_command(
            ClearArgs {
                kind: ImportKind::Migration,
                yes: true,
            },
            &config,
        )
        .await
        .unwrap();

        let store = SqliteStore::open(&config.database_path).await.unwrap();
        assert_eq!(store.count(ImportKind::Migration).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_command_reads_store() {
        let dir = tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("migtrack.db"),
            ..Config::default()
        };
        seeded(&config).await;

        handle_records_command(
            RecordsArgs {
                kind: ImportKind::Migration,
                limit: Some(1),
            },
            &config,
        )
        .await
        .unwrap();
    }
}
