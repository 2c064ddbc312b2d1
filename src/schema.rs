//! Declarative column schemas and the generic field mapper.
//!
//! Each table family declares its schema once: for every stored column, the
//! lowercased header spellings that identify it and the positional index to
//! fall back on when the header is blank, missing, or ambiguous. A single
//! mapping routine consumes all of them. Header text is usually stable but
//! occasionally shifts a column or two between FBref releases; pure
//! positional mapping breaks on that, and pure header mapping breaks on
//! repeated stat names (the home/away split repeats "MP" for both halves),
//! so both are needed.

use rusqlite::types::{ToSql, ToSqlOutput};
use std::collections::HashMap;
use tracing::warn;

use crate::tables::{RawTable, TableRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Decimal,
    Text,
}

/// A coerced cell value. Absence is always `None`, never zero: a zero is a
/// valid statistic and must not be confused with a blank cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(Option<i64>),
    Decimal(Option<f64>),
    Text(Option<String>),
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Int(v) => v.to_sql(),
            FieldValue::Decimal(v) => v.to_sql(),
            FieldValue::Text(v) => v.to_sql(),
        }
    }
}

/// One stored column of a table family.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Database column name.
    pub column: &'static str,
    /// Lowercased header spellings. Empty when the header is a duplicate of
    /// an earlier column (second half of a split table, repeated per-90
    /// names) and only the fallback index can disambiguate.
    pub aliases: &'static [&'static str],
    /// Positional index used when no alias is present in the header row.
    pub fallback: usize,
    pub kind: ValueKind,
}

/// Schema for one season-scoped statistics table family.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Database table the records land in.
    pub table: &'static str,
    pub role: TableRole,
    /// Leading header rows; the stat-name row is the last of them.
    pub header_rows: usize,
    /// Column carrying the team name.
    pub team_column: usize,
    /// "Against" tables prefix opponents with "vs " ("vs Arsenal").
    pub strip_vs_prefix: bool,
    pub fields: &'static [FieldSpec],
}

/// One mapped data row: the raw (pre-standardization) team name and every
/// schema field as a typed value.
#[derive(Debug, Clone)]
pub struct MappedRow {
    pub team: String,
    pub values: Vec<(&'static str, FieldValue)>,
}

/// Result of mapping a whole table.
#[derive(Debug, Default)]
pub struct MappingReport {
    pub rows: Vec<MappedRow>,
    pub skipped: usize,
}

/// Lowercased header text -> first column index bearing it. Later duplicates
/// are dropped, so second-half columns of split tables resolve by fallback.
pub fn build_header_map(header: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in header.iter().enumerate() {
        map.entry(name.trim().to_lowercase()).or_insert(idx);
    }
    map
}

/// Header-alias lookup with positional fallback.
pub fn resolve_index(
    header_map: &HashMap<String, usize>,
    aliases: &[&str],
    fallback: usize,
) -> usize {
    aliases
        .iter()
        .find_map(|alias| header_map.get(*alias).copied())
        .unwrap_or(fallback)
}

/// Strip a leading '+' and thousands commas. "+3" and "1,234" are how FBref
/// renders signed and large numbers.
fn clean_numeric(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    trimmed.replace(',', "")
}

/// Decimal coercion: empty, whitespace-only, or unparseable text is `None`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned = clean_numeric(raw);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Integer coercion: the cleaned text must be all digits (a single leading
/// '-' is allowed for signed stats like goal difference); anything else is
/// `None` rather than an error.
pub fn parse_int(raw: &str) -> Option<i64> {
    let cleaned = clean_numeric(raw);
    let digits = cleaned.strip_prefix('-').unwrap_or(&cleaned);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

fn coerce(raw: &str, kind: ValueKind) -> FieldValue {
    match kind {
        ValueKind::Int => FieldValue::Int(parse_int(raw)),
        ValueKind::Decimal => FieldValue::Decimal(parse_decimal(raw)),
        ValueKind::Text => {
            let text = raw.trim();
            FieldValue::Text((!text.is_empty()).then(|| text.to_string()))
        }
    }
}

/// Map every data row of a located table through its schema.
///
/// Rows with fewer cells than the stat-name header row are skipped whole:
/// a short row is structurally different (a subtotal or spacer), and
/// mapping part of it would pollute records.
pub fn map_table(table: &RawTable, schema: &TableSchema) -> MappingReport {
    let mut report = MappingReport::default();

    let Some(header) = table.rows.get(schema.header_rows - 1) else {
        warn!(
            role = schema.role.name,
            "table has no header row, nothing to map"
        );
        return report;
    };
    let header_map = build_header_map(header);

    for row in table.rows.iter().skip(schema.header_rows) {
        if row.len() < header.len() {
            warn!(
                role = schema.role.name,
                row_cells = row.len(),
                header_cells = header.len(),
                "row shorter than header, skipping"
            );
            report.skipped += 1;
            continue;
        }

        let raw_team = row
            .get(schema.team_column)
            .map(|s| s.as_str())
            .unwrap_or("");
        let team = if schema.strip_vs_prefix {
            raw_team.strip_prefix("vs ").unwrap_or(raw_team)
        } else {
            raw_team
        };
        if team.is_empty() {
            warn!(role = schema.role.name, "row has no team name, skipping");
            report.skipped += 1;
            continue;
        }

        let values = schema
            .fields
            .iter()
            .map(|field| {
                let idx = resolve_index(&header_map, field.aliases, field.fallback);
                let raw = row.get(idx).map(|s| s.as_str()).unwrap_or("");
                (field.column, coerce(raw, field.kind))
            })
            .collect();

        report.rows.push(MappedRow {
            team: team.to_string(),
            values,
        });
    }

    report
}

const fn int(column: &'static str, aliases: &'static [&'static str], fallback: usize) -> FieldSpec {
    FieldSpec {
        column,
        aliases,
        fallback,
        kind: ValueKind::Int,
    }
}

const fn dec(column: &'static str, aliases: &'static [&'static str], fallback: usize) -> FieldSpec {
    FieldSpec {
        column,
        aliases,
        fallback,
        kind: ValueKind::Decimal,
    }
}

/// League table: Rk, Squad, MP, W, D, L, GF, GA, GD, Pts, Pts/MP, xG, xGA,
/// xGD, xGD/90.
pub const OVERALL_RESULTS: TableSchema = TableSchema {
    table: "team_overall_results",
    role: TableRole {
        name: "overall results",
        id_substrings: &["overall", "results"],
        header_keywords: &[],
    },
    header_rows: 1,
    team_column: 1,
    strip_vs_prefix: false,
    fields: &[
        int("rk", &["rk"], 0),
        int("mp", &["mp"], 2),
        int("w", &["w"], 3),
        int("d", &["d"], 4),
        int("l", &["l"], 5),
        int("gf", &["gf"], 6),
        int("ga", &["ga"], 7),
        int("gd", &["gd"], 8),
        int("pts", &["pts"], 9),
        dec("pts_per_mp", &["pts/mp"], 10),
        dec("xg", &["xg"], 11),
        dec("xga", &["xga"], 12),
        dec("xgd", &["xgd"], 13),
        dec("xgd_per_90", &["xgd/90"], 14),
    ],
};

/// Home/away split: the same thirteen stats twice. The stat-name row repeats
/// "MP".."xGD/90" verbatim, so only the home half can resolve by alias; the
/// away half is positional (second half of the row).
pub const HOME_AWAY_RESULTS: TableSchema = TableSchema {
    table: "team_home_away_results",
    role: TableRole {
        name: "home/away results",
        id_substrings: &["home", "away"],
        header_keywords: &[],
    },
    header_rows: 2,
    team_column: 1,
    strip_vs_prefix: false,
    fields: &[
        int("home_mp", &["mp"], 2),
        int("home_w", &["w"], 3),
        int("home_d", &["d"], 4),
        int("home_l", &["l"], 5),
        int("home_gf", &["gf"], 6),
        int("home_ga", &["ga"], 7),
        int("home_gd", &["gd"], 8),
        int("home_pts", &["pts"], 9),
        dec("home_pts_per_mp", &["pts/mp"], 10),
        dec("home_xg", &["xg"], 11),
        dec("home_xga", &["xga"], 12),
        dec("home_xgd", &["xgd"], 13),
        dec("home_xgd_per_90", &["xgd/90"], 14),
        int("away_mp", &[], 15),
        int("away_w", &[], 16),
        int("away_d", &[], 17),
        int("away_l", &[], 18),
        int("away_gf", &[], 19),
        int("away_ga", &[], 20),
        int("away_gd", &[], 21),
        int("away_pts", &[], 22),
        dec("away_pts_per_mp", &[], 23),
        dec("away_xg", &[], 24),
        dec("away_xga", &[], 25),
        dec("away_xgd", &[], 26),
        dec("away_xgd_per_90", &[], 27),
    ],
};

/// Squad standard stats. The per-90 half of the row repeats the raw stat
/// names (Gls, Ast, ...), so it resolves positionally.
const SQUAD_STANDARD_FIELDS: &[FieldSpec] = &[
    dec("player_number", &["# pl"], 1),
    dec("age", &["age"], 2),
    dec("possession", &["poss"], 3),
    int("matches_played", &["mp"], 4),
    int("matches_started", &["starts"], 5),
    int("minutes_played", &["min"], 6),
    dec("minutes_played_90s", &["90s"], 7),
    int("goals", &["gls"], 8),
    int("assists", &["ast"], 9),
    int("goals_and_assists", &["g+a"], 10),
    int("goals_minus_penalties", &["g-pk"], 11),
    int("penalties", &["pk"], 12),
    int("penalties_attempted", &["pkatt"], 13),
    int("yellow_cards", &["crdy"], 14),
    int("red_cards", &["crdr"], 15),
    dec("expected_goals", &["xg"], 16),
    dec("non_penalty_expected_goals", &["npxg"], 17),
    dec("expected_assisted_goals", &["xag"], 18),
    dec("npxg_plus_xag", &["npxg+xag"], 19),
    int("progressive_carries", &["prgc"], 20),
    int("progressive_passes", &["prgp"], 21),
    dec("goals_per90", &[], 22),
    dec("assists_per90", &[], 23),
    dec("goals_and_assists_per90", &[], 24),
    dec("goals_minus_penalties_per90", &[], 25),
    dec("goals_and_assists_minus_penalties_per90", &[], 26),
    dec("expected_goals_per90", &[], 27),
    dec("expected_assisted_goals_per90", &[], 28),
    dec("expected_goals_and_assists_per90", &[], 29),
    dec("non_penalty_expected_goals_per90", &[], 30),
    dec("npxg_plus_xag_per90", &[], 31),
];

pub const SQUAD_STANDARD_FOR: TableSchema = TableSchema {
    table: "team_squad_standard_for",
    role: TableRole {
        name: "squad standard for",
        id_substrings: &["stats_squads_standard_for"],
        header_keywords: &[],
    },
    header_rows: 2,
    team_column: 0,
    strip_vs_prefix: false,
    fields: SQUAD_STANDARD_FIELDS,
};

pub const SQUAD_STANDARD_AGAINST: TableSchema = TableSchema {
    table: "team_squad_standard_against",
    role: TableRole {
        name: "squad standard against",
        id_substrings: &["stats_squads_standard_against"],
        header_keywords: &[],
    },
    header_rows: 2,
    team_column: 0,
    strip_vs_prefix: true,
    fields: SQUAD_STANDARD_FIELDS,
};

/// Squad goalkeeping. "Save%" appears twice (shot-stopping and penalties);
/// the penalty one resolves positionally.
const SQUAD_KEEPER_FIELDS: &[FieldSpec] = &[
    dec("player_number", &["# pl"], 1),
    int("matches_played", &["mp"], 2),
    int("matches_started", &["starts"], 3),
    int("minutes_played", &["min"], 4),
    dec("minutes_played_90s", &["90s"], 5),
    int("goals_against", &["ga"], 6),
    dec("goals_against_90s", &["ga90"], 7),
    int("shot_on_target_against", &["sota"], 8),
    int("saves", &["saves"], 9),
    dec("save_percentage", &["save%"], 10),
    int("wins", &["w"], 11),
    int("draws", &["d"], 12),
    int("losses", &["l"], 13),
    int("clean_sheets", &["cs"], 14),
    dec("clean_sheets_percentage", &["cs%"], 15),
    int("penalties_attempted", &["pkatt"], 16),
    int("penalties_allowed", &["pka"], 17),
    int("penalties_saved", &["pksv"], 18),
    int("penalties_missed", &["pkm"], 19),
    dec("penalties_saved_percentage", &[], 20),
];

pub const SQUAD_KEEPER_FOR: TableSchema = TableSchema {
    table: "team_squad_keeper_for",
    role: TableRole {
        name: "squad keeper for",
        id_substrings: &["stats_squads_keeper_for"],
        header_keywords: &[],
    },
    header_rows: 2,
    team_column: 0,
    strip_vs_prefix: false,
    fields: SQUAD_KEEPER_FIELDS,
};

pub const SQUAD_KEEPER_AGAINST: TableSchema = TableSchema {
    table: "team_squad_keeper_against",
    role: TableRole {
        name: "squad keeper against",
        id_substrings: &["stats_squads_keeper_against"],
        header_keywords: &[],
    },
    header_rows: 2,
    team_column: 0,
    strip_vs_prefix: true,
    fields: SQUAD_KEEPER_FIELDS,
};

/// Advanced goalkeeping. "Att", "Launch%" and "AvgLen" repeat across the
/// long-ball, pass and goal-kick groups; later occurrences are positional.
pub const SQUAD_KEEPER_ADV_FOR: TableSchema = TableSchema {
    table: "team_squad_keeper_adv_for",
    role: TableRole {
        name: "squad keeper advanced for",
        id_substrings: &["stats_squads_keeper_adv_for"],
        header_keywords: &[],
    },
    header_rows: 2,
    team_column: 0,
    strip_vs_prefix: false,
    fields: &[
        int("free_kick_goals_against", &["fk"], 5),
        int("corner_kick_goals_against", &["ck"], 6),
        int("own_goals_against", &["og"], 7),
        dec("post_shot_xg", &["psxg"], 8),
        dec("post_shot_xg_per_shot_ot", &["psxg/sot"], 9),
        dec("post_shot_xg_minus_goals_allowed", &["psxg+/-"], 10),
        dec("post_shot_xg_minus_goals_allowed_90s", &["/90"], 11),
        int("completed_long_balls", &["cmp"], 12),
        int("attempted_long_balls", &["att"], 13),
        dec("long_balls_completed_percentage", &["cmp%"], 14),
        int("passes_attempted", &["att (gk)"], 15),
        int("throws_attempted", &["thr"], 16),
        dec("launch_percentage", &["launch%"], 17),
        dec("avg_pass_length", &["avglen"], 18),
        int("goal_kicks", &[], 19),
        dec("goal_kicks_launched_percentage", &[], 20),
        dec("goal_kicks_avg_length", &[], 21),
        int("crosses_faced", &["opp"], 22),
        int("crosses_stopped", &["stp"], 23),
        dec("crosses_stopped_percentage", &["stp%"], 24),
        int("def_actions_outside_of_penalty_area", &["#opa"], 25),
        dec("def_actions_outside_of_penalty_area_90s", &["#opa/90"], 26),
        dec("avg_def_action_dist", &["avgdist"], 27),
    ],
};

/// The team-stats table families scraped from a competition stats page.
pub const STATS_SCHEMAS: &[&TableSchema] = &[
    &OVERALL_RESULTS,
    &HOME_AWAY_RESULTS,
    &SQUAD_STANDARD_FOR,
    &SQUAD_STANDARD_AGAINST,
    &SQUAD_KEEPER_FOR,
    &SQUAD_KEEPER_AGAINST,
    &SQUAD_KEEPER_ADV_FOR,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decimal_coercion_absence_is_null() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("  "), None);
        assert_eq!(parse_decimal("1,234"), Some(1234.0));
        assert_eq!(parse_decimal("+3"), Some(3.0));
        assert_eq!(parse_decimal("N/A"), None);
        assert_eq!(parse_decimal("0"), Some(0.0));
        assert_eq!(parse_decimal("1.85"), Some(1.85));
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("  "), None);
        assert_eq!(parse_int("1,234"), Some(1234));
        assert_eq!(parse_int("+3"), Some(3));
        assert_eq!(parse_int("-5"), Some(-5));
        assert_eq!(parse_int("N/A"), None);
        assert_eq!(parse_int("3.5"), None);
        assert_eq!(parse_int("0"), Some(0));
    }

    #[test]
    fn test_header_wins_over_fallback() {
        // "mp" sits at index 3 though the schema expects it at 2.
        let header_map = build_header_map(&strings(&["rk", "squad", "pts", "mp"]));
        assert_eq!(resolve_index(&header_map, &["mp"], 2), 3);
    }

    #[test]
    fn test_fallback_when_alias_missing() {
        let header_map = build_header_map(&strings(&["rk", "squad"]));
        assert_eq!(resolve_index(&header_map, &["mp"], 2), 2);
    }

    #[test]
    fn test_duplicate_header_keeps_first_index() {
        let header_map = build_header_map(&strings(&["squad", "mp", "w", "mp", "w"]));
        assert_eq!(header_map["mp"], 1);
        assert_eq!(header_map["w"], 2);
    }

    fn overall_table(rows: Vec<Vec<String>>) -> RawTable {
        RawTable {
            id: Some("results2024_overall".to_string()),
            rows,
        }
    }

    #[test]
    fn test_map_table_typed_fields() {
        let table = overall_table(vec![
            strings(&[
                "Rk", "Squad", "MP", "W", "D", "L", "GF", "GA", "GD", "Pts", "Pts/MP", "xG",
                "xGA", "xGD", "xGD/90",
            ]),
            strings(&[
                "1",
                "Liverpool",
                "38",
                "25",
                "9",
                "4",
                "86",
                "41",
                "+45",
                "84",
                "2.21",
                "81.8",
                "45.0",
                "+36.8",
                "+0.97",
            ]),
        ]);
        let report = map_table(&table, &OVERALL_RESULTS);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.rows.len(), 1);

        let row = &report.rows[0];
        assert_eq!(row.team, "Liverpool");
        let get = |col: &str| {
            row.values
                .iter()
                .find(|(c, _)| *c == col)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("mp"), FieldValue::Int(Some(38)));
        assert_eq!(get("gd"), FieldValue::Int(Some(45)));
        assert_eq!(get("xgd_per_90"), FieldValue::Decimal(Some(0.97)));
    }

    #[test]
    fn test_short_row_skipped_whole() {
        let table = overall_table(vec![
            strings(&[
                "Rk", "Squad", "MP", "W", "D", "L", "GF", "GA", "GD", "Pts", "Pts/MP", "xG",
                "xGA", "xGD", "xGD/90",
            ]),
            strings(&["1", "Arsenal", "38"]),
        ]);
        let report = map_table(&table, &OVERALL_RESULTS);
        assert_eq!(report.rows.len(), 0);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_unparseable_numeric_maps_to_null() {
        let table = overall_table(vec![
            strings(&[
                "Rk", "Squad", "MP", "W", "D", "L", "GF", "GA", "GD", "Pts", "Pts/MP", "xG",
                "xGA", "xGD", "xGD/90",
            ]),
            strings(&[
                "1", "Everton", "", "25", "9", "4", "86", "41", "N/A", "84", "", "81.8", "45.0",
                "36.8", "0.97",
            ]),
        ]);
        let report = map_table(&table, &OVERALL_RESULTS);
        let row = &report.rows[0];
        let get = |col: &str| {
            row.values
                .iter()
                .find(|(c, _)| *c == col)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("mp"), FieldValue::Int(None));
        assert_eq!(get("gd"), FieldValue::Int(None));
        assert_eq!(get("pts_per_mp"), FieldValue::Decimal(None));
        assert_eq!(get("w"), FieldValue::Int(Some(25)));
    }

    #[test]
    fn test_against_table_strips_vs_prefix() {
        let mut rows = vec![strings(&["", "Grouping"]), Vec::new()];
        // Stat-name row: Squad plus enough columns for the schema.
        let mut header = vec!["Squad".to_string()];
        header.extend((1..32).map(|i| format!("col{}", i)));
        rows[1] = header.clone();
        let mut data = vec!["vs Arsenal".to_string()];
        data.extend((1..32).map(|_| "1".to_string()));
        rows.push(data);

        let table = RawTable {
            id: Some("stats_squads_standard_against".to_string()),
            rows,
        };
        let report = map_table(&table, &SQUAD_STANDARD_AGAINST);
        assert_eq!(report.rows[0].team, "Arsenal");
    }

    #[test]
    fn test_home_away_second_half_is_positional() {
        let stat_names = [
            "Squad", "MP", "W", "D", "L", "GF", "GA", "GD", "Pts", "Pts/MP", "xG", "xGA", "xGD",
            "xGD/90",
        ];
        let mut header = vec!["Rk".to_string(), "Squad".to_string()];
        header.extend(stat_names[1..].iter().map(|s| s.to_string()));
        header.extend(stat_names[1..].iter().map(|s| s.to_string()));

        let mut data = vec!["1".to_string(), "Chelsea".to_string()];
        data.extend((0..13).map(|i| (i + 10).to_string())); // home half: 10..22
        data.extend((0..13).map(|i| (i + 30).to_string())); // away half: 30..42

        let table = RawTable {
            id: Some("results2024_home_away".to_string()),
            rows: vec![strings(&["spanning", "grouping", "row"]), header, data],
        };
        let report = map_table(&table, &HOME_AWAY_RESULTS);
        let row = &report.rows[0];
        let get = |col: &str| {
            row.values
                .iter()
                .find(|(c, _)| *c == col)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("home_mp"), FieldValue::Int(Some(10)));
        assert_eq!(get("away_mp"), FieldValue::Int(Some(30)));
        assert_eq!(get("away_pts"), FieldValue::Int(Some(37)));
    }

    #[test]
    fn test_stats_schemas_match_their_tables() {
        for schema in STATS_SCHEMAS {
            assert!(schema.header_rows >= 1);
            assert!(!schema.fields.is_empty());
            assert!(schema.table.starts_with("team_"));
        }
    }
}
