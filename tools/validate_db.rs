use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;
use std::collections::BTreeMap;
use std::env;

use cpe_config_sync::domain::root_version::compute_root_version;
use cpe_config_sync::value_objects::DeploymentState;

/// Consistency check for the document store
#[derive(Parser)]
struct Cli {
    #[arg(long)]
    database_url: Option<String>,

    /// Repair what can be repaired instead of only reporting it
    #[arg(long)]
    fix: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let db_url = cli
        .database_url
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("DATABASE_URL must be set or passed with --database-url")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // Sub-documents with a state code outside the deployment lifecycle
    let invalid_state_rows = sqlx::query(
        r#"SELECT device_id, name, state FROM sub_documents
           WHERE state IS NOT NULL AND state NOT BETWEEN 1 AND 4"#,
    )
    .fetch_all(&pool)
    .await?;

    println!("Invalid state rows: {}", invalid_state_rows.len());
    for r in invalid_state_rows.iter() {
        let device_id: String = r.get("device_id");
        let name: String = r.get("name");
        let state: i16 = r.get("state");
        println!("device: {}, subdoc: {}, state: {}", device_id, name, state);
        if cli.fix {
            // Pending download makes the device fetch the content again
            sqlx::query("UPDATE sub_documents SET state = $3 WHERE device_id = $1 AND name = $2")
                .bind(&device_id)
                .bind(&name)
                .bind(DeploymentState::PendingDownload.as_i32() as i16)
                .execute(&pool)
                .await?;
            println!("Fixed: {}/{} -> {}", device_id, name, DeploymentState::PendingDownload);
        }
    }

    // Sub-documents that can never be delivered
    let missing_version_rows = sqlx::query(
        r#"SELECT device_id, name FROM sub_documents
           WHERE payload IS NOT NULL AND (version IS NULL OR version = '')"#,
    )
    .fetch_all(&pool)
    .await?;

    println!("Payload without version rows: {}", missing_version_rows.len());
    for r in missing_version_rows.iter() {
        let device_id: String = r.get("device_id");
        let name: String = r.get("name");
        println!("device: {}, subdoc: {}", device_id, name);
    }

    // Root versions that no longer match the stored sub-document versions
    let version_rows = sqlx::query(
        r#"SELECT device_id, name, version FROM sub_documents
           WHERE version IS NOT NULL
           ORDER BY device_id"#,
    )
    .fetch_all(&pool)
    .await?;

    let mut versions_by_device: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for r in version_rows.iter() {
        versions_by_device
            .entry(r.get("device_id"))
            .or_default()
            .insert(r.get("name"), r.get("version"));
    }

    let root_rows = sqlx::query("SELECT device_id, version FROM root_documents WHERE version <> ''")
        .fetch_all(&pool)
        .await?;

    let mut stale = 0usize;
    for r in root_rows.iter() {
        let device_id: String = r.get("device_id");
        let stored: String = r.get("version");
        let expected = versions_by_device
            .get(&device_id)
            .map(compute_root_version)
            .unwrap_or_else(|| compute_root_version(&BTreeMap::new()));
        if stored == expected {
            continue;
        }

        stale += 1;
        println!(
            "device: {}, root version: {}, expected: {}",
            device_id, stored, expected
        );
        if cli.fix {
            sqlx::query("UPDATE root_documents SET version = $2, updated_at = NOW() WHERE device_id = $1")
                .bind(&device_id)
                .bind(&expected)
                .execute(&pool)
                .await?;
            println!("Fixed: {} -> {}", device_id, expected);
        }
    }
    println!("Stale root versions: {}", stale);

    Ok(())
}
