//! Team season-statistics pipeline: one competition stats page in, one
//! upserted batch per table family out.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{error, info};

use crate::db::{self, get_or_create_competition, get_or_create_team, upsert_stats};
use crate::fetch::Fetcher;
use crate::mappings::{competition_by_fbref_id, TeamAliases};
use crate::schema::{map_table, TableSchema, STATS_SCHEMAS};
use crate::tables::{extract_tables, locate, RawTable};

/// Scrape every declared table family for one competition and season.
pub fn run_stats(
    fbref_id: i64,
    season: &str,
    db_path: &Path,
    alias_file: Option<&Path>,
) -> Result<()> {
    let info = competition_by_fbref_id(fbref_id)
        .with_context(|| format!("Unknown competition fbref id: {}", fbref_id))?;
    let aliases = match alias_file {
        Some(path) => TeamAliases::with_overrides(path)?,
        None => TeamAliases::builtin(),
    };

    let mut conn = db::open(db_path)?;
    let competition_id = get_or_create_competition(&conn, info)?;

    let url = info.stats_url();
    info!(competition = info.name, season, url, "scraping team stats");
    let html = Fetcher::new()?.fetch(&url)?;
    let tables = extract_tables(&html);

    process_page(&mut conn, &tables, &aliases, season, competition_id)
}

/// Run every table family against an already-tokenized page.
///
/// A family whose table is missing is skipped; a store error while
/// committing a family rolls that family back and aborts the run. Families
/// committed before the failure stay persisted.
pub fn process_page(
    conn: &mut Connection,
    tables: &[RawTable],
    aliases: &TeamAliases,
    season: &str,
    competition_id: i64,
) -> Result<()> {
    for schema in STATS_SCHEMAS {
        process_family(conn, schema, tables, aliases, season, competition_id).map_err(|e| {
            error!(role = schema.role.name, error = %e, "table family failed, rolling back");
            e
        })?;
    }
    Ok(())
}

fn process_family(
    conn: &mut Connection,
    schema: &TableSchema,
    tables: &[RawTable],
    aliases: &TeamAliases,
    season: &str,
    competition_id: i64,
) -> Result<()> {
    // Missing table: already logged by the locator, nothing to commit.
    let Some(table) = locate(tables, &schema.role) else {
        return Ok(());
    };

    let report = map_table(table, schema);

    let tx = conn.transaction()?;
    let mut created = 0usize;
    let mut updated = 0usize;
    for row in &report.rows {
        let team_id = get_or_create_team(&tx, aliases, &row.team, competition_id)?;
        if upsert_stats(&tx, schema, team_id, season, competition_id, &row.values)? {
            created += 1;
        } else {
            updated += 1;
        }
    }
    tx.commit()
        .with_context(|| format!("Failed to commit {} batch", schema.table))?;

    info!(
        role = schema.role.name,
        created,
        updated,
        skipped = report.skipped,
        "table family saved"
    );
    Ok(())
}
