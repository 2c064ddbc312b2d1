//! Match schedule pipeline: the scores-and-fixtures page into the matches
//! table, keyed by (date, home team, away team, competition).

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveTime};
use rusqlite::Transaction;
use tracing::{info, warn};

use crate::db::{self, get_or_create_competition, get_or_create_team};
use crate::fetch::Fetcher;
use crate::mappings::{competition_by_fbref_id, TeamAliases};
use crate::schema::{build_header_map, parse_decimal, parse_int, resolve_index};
use crate::tables::{extract_tables, locate, RawTable, TableRole};

/// The schedule table id starts with "sched"; when the id convention
/// changes, any table with schedule-style headers is accepted instead.
pub const SCHEDULE_ROLE: TableRole = TableRole {
    name: "schedule",
    id_substrings: &["sched"],
    header_keywords: &["date", "home", "away", "score"],
};

/// One parsed schedule row, pre identity resolution.
#[derive(Debug, Clone)]
pub struct MatchRow {
    pub week_number: Option<i64>,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
    pub venue: Option<String>,
    pub attendance: Option<i64>,
    pub referee: Option<String>,
}

/// Scrape and upsert the schedule for one competition.
pub fn run_matches(fbref_id: i64, db_path: &Path, alias_file: Option<&Path>) -> Result<()> {
    let info = competition_by_fbref_id(fbref_id)
        .with_context(|| format!("Unknown competition fbref id: {}", fbref_id))?;
    let aliases = match alias_file {
        Some(path) => TeamAliases::with_overrides(path)?,
        None => TeamAliases::builtin(),
    };

    let mut conn = db::open(db_path)?;
    let competition_id = get_or_create_competition(&conn, info)?;

    let url = info.schedule_url();
    info!(competition = info.name, url, "scraping schedule");
    let html = Fetcher::new()?.fetch(&url)?;
    let tables = extract_tables(&html);

    let Some(table) = locate(&tables, &SCHEDULE_ROLE) else {
        bail!("Schedule table not found, the page structure may have changed");
    };

    let (rows, skipped) = parse_schedule(table);

    let tx = conn.transaction()?;
    let mut created = 0usize;
    let mut updated = 0usize;
    for row in &rows {
        if upsert_match(&tx, &aliases, competition_id, row)? {
            created += 1;
        } else {
            updated += 1;
        }
    }
    tx.commit().context("Failed to commit match batch")?;

    info!(created, updated, skipped, "schedule saved");
    Ok(())
}

/// Map the schedule table into match rows. Rows without both team names or
/// a parseable date are skipped with a warning; they are spacer rows or
/// fixtures FBref has not filled in yet.
pub fn parse_schedule(table: &RawTable) -> (Vec<MatchRow>, usize) {
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    let Some(header) = table.rows.first() else {
        return (rows, skipped);
    };
    let header_map = build_header_map(header);

    // The second "xG" header is the away side; the header map only knows
    // the first, so away xG resolves positionally one past the score.
    let wk = resolve_index(&header_map, &["wk"], 0);
    let date = resolve_index(&header_map, &["date"], 2);
    let time = resolve_index(&header_map, &["time"], 3);
    let home = resolve_index(&header_map, &["home"], 4);
    let home_xg = resolve_index(&header_map, &["xg"], 5);
    let score = resolve_index(&header_map, &["score"], 6);
    let away_xg = score + 1;
    let away = resolve_index(&header_map, &["away"], 8);
    let attendance = resolve_index(&header_map, &["attendance"], 9);
    let venue = resolve_index(&header_map, &["venue"], 10);
    let referee = resolve_index(&header_map, &["referee"], 11);

    let cell = |row: &[String], idx: usize| row.get(idx).map(|s| s.trim().to_string());
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

    for row in table.rows.iter().skip(1) {
        let home_team = non_empty(cell(row, home));
        let away_team = non_empty(cell(row, away));
        let (Some(home_team), Some(away_team)) = (home_team, away_team) else {
            skipped += 1;
            continue;
        };

        let raw_date = cell(row, date).unwrap_or_default();
        let Some(parsed_date) = parse_match_date(&raw_date) else {
            warn!(home_team, away_team, raw_date, "unparseable match date, skipping row");
            skipped += 1;
            continue;
        };

        let (home_score, away_score) =
            parse_score(cell(row, score).as_deref().unwrap_or(""));

        rows.push(MatchRow {
            week_number: parse_int(cell(row, wk).as_deref().unwrap_or("")),
            date: parsed_date,
            time: cell(row, time).and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M").ok()),
            home_team,
            away_team,
            home_score,
            away_score,
            home_xg: parse_decimal(cell(row, home_xg).as_deref().unwrap_or("")),
            away_xg: parse_decimal(cell(row, away_xg).as_deref().unwrap_or("")),
            venue: non_empty(cell(row, venue)),
            attendance: parse_int(cell(row, attendance).as_deref().unwrap_or("")),
            referee: non_empty(cell(row, referee)),
        });
    }

    (rows, skipped)
}

/// FBref renders dates as "2024-08-16", occasionally "Fri, Aug 16" (current
/// year implied).
fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    if raw.contains('-') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();
    }
    let with_year = format!("{}, {}", raw, chrono::Local::now().year());
    NaiveDate::parse_from_str(&with_year, "%a, %b %d, %Y").ok()
}

/// Split "2–1" (en or em dash tolerated) into the two scores. Unplayed
/// fixtures have no score and yield (None, None).
fn parse_score(raw: &str) -> (Option<i64>, Option<i64>) {
    let normalized = raw.replace(['\u{2013}', '\u{2014}'], "-");
    match normalized.split_once('-') {
        Some((home, away)) => (parse_int(home), parse_int(away)),
        None => (None, None),
    }
}

/// Insert-or-update one match. Scores and xG are only overwritten when the
/// new scrape carries them: a played match must not lose its result to a
/// blank cell.
pub fn upsert_match(
    tx: &Transaction,
    aliases: &TeamAliases,
    competition_id: i64,
    row: &MatchRow,
) -> Result<bool> {
    let home_id = get_or_create_team(tx, aliases, &row.home_team, competition_id)?;
    let away_id = get_or_create_team(tx, aliases, &row.away_team, competition_id)?;
    let date = row.date.format("%Y-%m-%d").to_string();
    let time = row.time.map(|t| t.format("%H:%M").to_string());

    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM matches
             WHERE match_date = ?1 AND home_team_id = ?2 AND away_team_id = ?3
               AND competition_id = ?4",
            (&date, home_id, away_id, competition_id),
            |r| r.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match existing {
        Some(id) => {
            tx.execute(
                "UPDATE matches SET
                     week_number = ?1,
                     match_time = ?2,
                     venue = ?3,
                     referee = ?4,
                     attendance = ?5,
                     home_score = COALESCE(?6, home_score),
                     away_score = COALESCE(?7, away_score),
                     home_xg = COALESCE(?8, home_xg),
                     away_xg = COALESCE(?9, away_xg),
                     scraped_at = CURRENT_TIMESTAMP,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?10",
                (
                    row.week_number,
                    &time,
                    &row.venue,
                    &row.referee,
                    row.attendance,
                    row.home_score,
                    row.away_score,
                    row.home_xg,
                    row.away_xg,
                    id,
                ),
            )?;
            Ok(false)
        }
        None => {
            tx.execute(
                "INSERT INTO matches
                     (competition_id, week_number, match_date, match_time,
                      home_team_id, away_team_id, home_score, away_score,
                      home_xg, away_xg, venue, attendance, referee)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                (
                    competition_id,
                    row.week_number,
                    &date,
                    &time,
                    home_id,
                    away_id,
                    row.home_score,
                    row.away_score,
                    row.home_xg,
                    row.away_xg,
                    &row.venue,
                    row.attendance,
                    &row.referee,
                ),
            )?;
            Ok(true)
        }
    }
}
