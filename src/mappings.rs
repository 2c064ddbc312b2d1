//! Team-name standardization and the competition catalog.
//!
//! FBref spells the same club several ways across tables ("Wolves",
//! "Newcastle Utd", "Nott'ham Forest"). The alias table maps every known
//! spelling to one canonical name so two raw spellings never produce two
//! team rows. The table is immutable once built and injected into whatever
//! needs it; an optional JSON file can extend it without code changes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Known alias spelling -> canonical name. Identity pairs are listed too so
/// the table doubles as the roster of names we expect to see.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Arsenal", "Arsenal"),
    ("Aston Villa", "Aston Villa"),
    ("Bournemouth", "Bournemouth"),
    ("Brentford", "Brentford"),
    ("Brighton & Hove Albion", "Brighton & Hove Albion"),
    ("Brighton", "Brighton & Hove Albion"),
    ("Chelsea", "Chelsea"),
    ("Crystal Palace", "Crystal Palace"),
    ("Everton", "Everton"),
    ("Fulham", "Fulham"),
    ("Ipswich Town", "Ipswich Town"),
    ("Leicester City", "Leicester City"),
    ("Liverpool", "Liverpool"),
    ("Manchester City", "Manchester City"),
    ("Manchester Utd", "Manchester United"),
    ("Manchester United", "Manchester United"),
    ("Newcastle Utd", "Newcastle United"),
    ("Newcastle United", "Newcastle United"),
    ("Nott'ham Forest", "Nottingham Forest"),
    ("Nottingham Forest", "Nottingham Forest"),
    ("Southampton", "Southampton"),
    ("Tottenham", "Tottenham Hotspur"),
    ("Tottenham Hotspur", "Tottenham Hotspur"),
    ("West Ham", "West Ham United"),
    ("West Ham United", "West Ham United"),
    ("Wolves", "Wolverhampton Wanderers"),
    ("Wolverhampton Wanderers", "Wolverhampton Wanderers"),
];

/// Immutable alias lookup for team names.
#[derive(Debug, Clone)]
pub struct TeamAliases {
    map: HashMap<String, String>,
}

impl TeamAliases {
    pub fn builtin() -> Self {
        let map = BUILTIN_ALIASES
            .iter()
            .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
            .collect();
        Self { map }
    }

    /// Built-in table extended from a JSON object file
    /// (`{"Alias": "Canonical Name", ...}`). A missing file is not an
    /// error; a malformed one is.
    pub fn with_overrides(path: &Path) -> Result<Self> {
        let mut aliases = Self::builtin();
        if !path.exists() {
            return Ok(aliases);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read alias file: {}", path.display()))?;
        let overrides: HashMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse alias file: {}", path.display()))?;
        info!(
            count = overrides.len(),
            file = %path.display(),
            "loaded team alias overrides"
        );
        aliases.map.extend(overrides);
        Ok(aliases)
    }

    /// Canonical spelling for a scraped name. Unknown names pass through
    /// unchanged.
    pub fn standardize<'a>(&'a self, name: &'a str) -> &'a str {
        self.map.get(name).map(|s| s.as_str()).unwrap_or(name)
    }
}

/// A competition FBref publishes, with the URL shapes its pages live under.
#[derive(Debug, Clone, Copy)]
pub struct CompetitionInfo {
    pub fbref_id: i64,
    pub name: &'static str,
    pub short_name: &'static str,
    pub country: &'static str,
    /// URL path segment, e.g. "Premier-League".
    slug: &'static str,
}

pub const COMPETITIONS: &[CompetitionInfo] = &[
    CompetitionInfo {
        fbref_id: 9,
        name: "Premier League",
        short_name: "EPL",
        country: "England",
        slug: "Premier-League",
    },
    CompetitionInfo {
        fbref_id: 12,
        name: "La Liga",
        short_name: "LaLiga",
        country: "Spain",
        slug: "La-Liga",
    },
    CompetitionInfo {
        fbref_id: 20,
        name: "Bundesliga",
        short_name: "BUN",
        country: "Germany",
        slug: "Bundesliga",
    },
    CompetitionInfo {
        fbref_id: 11,
        name: "Serie A",
        short_name: "SerieA",
        country: "Italy",
        slug: "Serie-A",
    },
    CompetitionInfo {
        fbref_id: 13,
        name: "Ligue 1",
        short_name: "L1",
        country: "France",
        slug: "Ligue-1",
    },
];

pub fn competition_by_fbref_id(fbref_id: i64) -> Option<&'static CompetitionInfo> {
    COMPETITIONS.iter().find(|c| c.fbref_id == fbref_id)
}

impl CompetitionInfo {
    /// Season-stats page for the competition.
    pub fn stats_url(&self) -> String {
        format!(
            "https://fbref.com/en/comps/{}/{}-Stats",
            self.fbref_id, self.slug
        )
    }

    /// Scores-and-fixtures page for the competition.
    pub fn schedule_url(&self) -> String {
        format!(
            "https://fbref.com/en/comps/{}/schedule/{}-Scores-and-Fixtures",
            self.fbref_id, self.slug
        )
    }
}
