//! SQLite store: schema init, identity get-or-create, and the generic
//! stats upsert.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, ToSql, Transaction};
use tracing::{info, warn};

use crate::mappings::{CompetitionInfo, TeamAliases};
use crate::schema::{FieldValue, TableSchema};

/// Open the database and apply the schema. Safe to run repeatedly.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    init_database(&conn)?;
    Ok(conn)
}

pub fn init_database(conn: &Connection) -> Result<()> {
    let schema = include_str!("../schema.sql");
    conn.execute_batch(schema)
        .context("Failed to apply database schema")?;
    Ok(())
}

/// Competition id by unique name, created on first reference.
pub fn get_or_create_competition(conn: &Connection, info: &CompetitionInfo) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM competitions WHERE name = ?1",
            [info.name],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO competitions (name, short_name, country, fbref_id)
         VALUES (?1, ?2, ?3, ?4)",
        (info.name, info.short_name, info.country, info.fbref_id),
    )?;
    let id = conn.last_insert_rowid();
    info!(name = info.name, "created new competition");
    Ok(id)
}

/// Team id by canonical name, created on first reference.
///
/// The raw name is standardized through the alias table before lookup, so
/// two spellings of the same club share one row. An existing team is reused
/// as-is even if it was created under another competition; the mismatch is
/// logged rather than reassigned or rejected.
pub fn get_or_create_team(
    conn: &Connection,
    aliases: &TeamAliases,
    raw_name: &str,
    competition_id: i64,
) -> Result<i64> {
    let name = aliases.standardize(raw_name);

    let existing: Option<(i64, Option<i64>)> = conn
        .query_row(
            "SELECT id, competition_id FROM teams WHERE name = ?1",
            [name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    if let Some((id, stored_competition)) = existing {
        if stored_competition != Some(competition_id) {
            warn!(
                team = name,
                stored = ?stored_competition,
                requested = competition_id,
                "team already exists under another competition, reusing as-is"
            );
        }
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO teams (name, competition_id) VALUES (?1, ?2)",
        (name, competition_id),
    )?;
    let id = conn.last_insert_rowid();
    info!(team = name, "created new team");
    Ok(id)
}

/// Insert-or-update one season-scoped statistics record.
///
/// Every mapped field is applied, last-write-wins: a null from the new
/// scrape overwrites a previously stored value, because the page genuinely
/// no longer carries it. Returns true when a new row was created.
pub fn upsert_stats(
    tx: &Transaction,
    schema: &TableSchema,
    team_id: i64,
    season: &str,
    competition_id: i64,
    values: &[(&'static str, FieldValue)],
) -> Result<bool> {
    let existing: Option<i64> = tx
        .query_row(
            &format!(
                "SELECT id FROM {} WHERE team_id = ?1 AND season = ?2 AND competition_id = ?3",
                schema.table
            ),
            (team_id, season, competition_id),
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    // Column names come from the compiled-in schemas, never from scraped
    // text, so interpolating them is safe.
    match existing {
        Some(id) => {
            let assignments: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?{}",
                schema.table,
                assignments.join(", "),
                values.len() + 1
            );
            let mut params: Vec<&dyn ToSql> =
                values.iter().map(|(_, v)| v as &dyn ToSql).collect();
            params.push(&id);
            tx.execute(&sql, params.as_slice())?;
            Ok(false)
        }
        None => {
            let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
            let placeholders: Vec<String> =
                (1..=values.len() + 3).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "INSERT INTO {} (team_id, season, competition_id, {}) VALUES ({})",
                schema.table,
                columns.join(", "),
                placeholders.join(", ")
            );
            let mut params: Vec<&dyn ToSql> = vec![&team_id, &season, &competition_id];
            params.extend(values.iter().map(|(_, v)| v as &dyn ToSql));
            tx.execute(&sql, params.as_slice())?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappings::competition_by_fbref_id;
    use crate::schema::OVERALL_RESULTS;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_get_or_create_competition_is_idempotent() {
        let conn = test_conn();
        let epl = competition_by_fbref_id(9).unwrap();
        let first = get_or_create_competition(&conn, epl).unwrap();
        let second = get_or_create_competition(&conn, epl).unwrap();
        assert_eq!(first, second);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM competitions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_team_aliases_collapse_to_one_row() {
        let conn = test_conn();
        let aliases = TeamAliases::builtin();
        let epl = competition_by_fbref_id(9).unwrap();
        let competition_id = get_or_create_competition(&conn, epl).unwrap();

        let a = get_or_create_team(&conn, &aliases, "Brighton", competition_id).unwrap();
        let b =
            get_or_create_team(&conn, &aliases, "Brighton & Hove Albion", competition_id).unwrap();
        assert_eq!(a, b);

        let name: String = conn
            .query_row("SELECT name FROM teams WHERE id = ?1", [a], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Brighton & Hove Albion");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM teams", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_team_reused_across_competitions() {
        let conn = test_conn();
        let aliases = TeamAliases::builtin();
        let epl = get_or_create_competition(&conn, competition_by_fbref_id(9).unwrap()).unwrap();
        let liga = get_or_create_competition(&conn, competition_by_fbref_id(12).unwrap()).unwrap();

        let a = get_or_create_team(&conn, &aliases, "Arsenal", epl).unwrap();
        let b = get_or_create_team(&conn, &aliases, "Arsenal", liga).unwrap();
        assert_eq!(a, b);

        // The stored association is untouched by the second call.
        let stored: i64 = conn
            .query_row("SELECT competition_id FROM teams WHERE id = ?1", [a], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(stored, epl);
    }

    fn sample_values() -> Vec<(&'static str, FieldValue)> {
        vec![
            ("mp", FieldValue::Int(Some(38))),
            ("pts", FieldValue::Int(Some(84))),
            ("xg", FieldValue::Decimal(Some(81.8))),
        ]
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut conn = test_conn();
        let aliases = TeamAliases::builtin();
        let epl = get_or_create_competition(&conn, competition_by_fbref_id(9).unwrap()).unwrap();
        let team = get_or_create_team(&conn, &aliases, "Liverpool", epl).unwrap();

        for run in 0..3 {
            let tx = conn.transaction().unwrap();
            let created =
                upsert_stats(&tx, &OVERALL_RESULTS, team, "2024-2025", epl, &sample_values())
                    .unwrap();
            tx.commit().unwrap();
            assert_eq!(created, run == 0);
        }

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM team_overall_results
                 WHERE team_id = ?1 AND season = ?2 AND competition_id = ?3",
                (team, "2024-2025", epl),
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upsert_overwrites_with_null() {
        let mut conn = test_conn();
        let aliases = TeamAliases::builtin();
        let epl = get_or_create_competition(&conn, competition_by_fbref_id(9).unwrap()).unwrap();
        let team = get_or_create_team(&conn, &aliases, "Everton", epl).unwrap();

        let tx = conn.transaction().unwrap();
        upsert_stats(&tx, &OVERALL_RESULTS, team, "2024-2025", epl, &sample_values()).unwrap();
        tx.commit().unwrap();

        // Second scrape lacks xG entirely: last write wins, null included.
        let second = vec![
            ("mp", FieldValue::Int(Some(38))),
            ("pts", FieldValue::Int(Some(84))),
            ("xg", FieldValue::Decimal(None)),
        ];
        let tx = conn.transaction().unwrap();
        upsert_stats(&tx, &OVERALL_RESULTS, team, "2024-2025", epl, &second).unwrap();
        tx.commit().unwrap();

        let xg: Option<f64> = conn
            .query_row(
                "SELECT xg FROM team_overall_results WHERE team_id = ?1",
                [team],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(xg, None);
    }

    #[test]
    fn test_rollback_leaves_no_partial_batch() {
        let mut conn = test_conn();
        let aliases = TeamAliases::builtin();
        let epl = get_or_create_competition(&conn, competition_by_fbref_id(9).unwrap()).unwrap();
        let team = get_or_create_team(&conn, &aliases, "Fulham", epl).unwrap();

        let tx = conn.transaction().unwrap();
        upsert_stats(&tx, &OVERALL_RESULTS, team, "2024-2025", epl, &sample_values()).unwrap();
        drop(tx); // rolled back, not committed

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM team_overall_results", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
