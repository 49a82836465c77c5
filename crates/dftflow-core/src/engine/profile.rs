use super::direction::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Energies within this distance (eV) are treated as equal.
pub const ENERGY_TOLERANCE_EV: f64 = 1e-6;

/// One evaluated point of a reaction-path trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub direction: Direction,
    pub step: u64,
    pub energy_ev: f64,
    pub energy_hartree: f64,
}

/// Append-only, ordered profile with `(direction, step)` uniqueness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileCache {
    entries: Vec<ProfileEntry>,
    keys: HashSet<(Direction, u64)>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the cache from a persisted profile, dropping repeated keys.
    pub fn from_entries(entries: impl IntoIterator<Item = ProfileEntry>) -> Self {
        let mut cache = Self::new();
        for entry in entries {
            cache.record(entry);
        }
        cache
    }

    /// Appends `entry` unless its `(direction, step)` is already present.
    ///
    /// Returns `true` when the entry was appended.
    pub fn record(&mut self, entry: ProfileEntry) -> bool {
        if self.keys.insert((entry.direction, entry.step)) {
            self.entries.push(entry);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, direction: Direction, step: u64) -> bool {
        self.keys.contains(&(direction, step))
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionStatus {
    /// The endpoint lies below the TS reference and is the lowest point reached.
    DescendsToMinimum,
    /// The endpoint lies below the TS reference but a lower point was passed.
    NonMonotonic,
    /// The endpoint does not lie below the TS reference.
    NotDescending,
    /// No TS reference (step 0) entry was recorded.
    MissingReference,
}

impl DirectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectionStatus::DescendsToMinimum => "descends_to_minimum",
            DirectionStatus::NonMonotonic => "non_monotonic",
            DirectionStatus::NotDescending => "not_descending",
            DirectionStatus::MissingReference => "missing_reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionAssessment {
    pub status: DirectionStatus,
    pub n_points: usize,
    pub endpoint_step: u64,
    pub endpoint_energy_ev: f64,
    pub min_energy_ev: f64,
    pub endpoint_drop_from_ts_ev: Option<f64>,
    pub min_drop_from_ts_ev: Option<f64>,
    pub endpoint_near_min: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Pass,
    Warn,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDetails {
    pub ts_energy_ev: Option<f64>,
    pub directions: BTreeMap<Direction, DirectionAssessment>,
}

/// Post-hoc plausibility report for a reaction-path profile.
///
/// Purely informational; no stage decision depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAssessment {
    pub status: AssessmentStatus,
    pub message: String,
    pub details: AssessmentDetails,
}

impl ProfileAssessment {
    pub fn direction(&self, direction: Direction) -> Option<&DirectionAssessment> {
        self.details.directions.get(&direction)
    }
}

/// Evaluates each direction present in `profile` against the shared TS reference.
///
/// The reference is the first entry recorded at step 0, regardless of direction.
pub fn assess_profile(profile: &[ProfileEntry]) -> ProfileAssessment {
    let ts_energy_ev = profile
        .iter()
        .find(|entry| entry.step == 0)
        .map(|entry| entry.energy_ev);

    let mut directions = BTreeMap::new();
    for direction in Direction::ALL {
        let points: Vec<&ProfileEntry> = profile
            .iter()
            .filter(|entry| entry.direction == direction)
            .collect();
        if let Some(assessment) = assess_direction(&points, ts_energy_ev) {
            directions.insert(direction, assessment);
        }
    }

    let (status, message) = if directions.is_empty() {
        (AssessmentStatus::Empty, "No profile points recorded.".to_string())
    } else {
        let issues: Vec<String> = directions
            .iter()
            .filter(|(_, a)| a.status != DirectionStatus::DescendsToMinimum)
            .map(|(d, a)| format!("{}: {}", d, a.status.as_str()))
            .collect();
        if issues.is_empty() {
            (
                AssessmentStatus::Pass,
                "All directions descend from the TS to a minimum.".to_string(),
            )
        } else {
            (
                AssessmentStatus::Warn,
                format!("Profile needs review ({}).", issues.join(", ")),
            )
        }
    };

    ProfileAssessment {
        status,
        message,
        details: AssessmentDetails {
            ts_energy_ev,
            directions,
        },
    }
}

fn assess_direction(
    points: &[&ProfileEntry],
    ts_energy_ev: Option<f64>,
) -> Option<DirectionAssessment> {
    let endpoint = points.last()?;
    let min_energy_ev = points
        .iter()
        .map(|entry| entry.energy_ev)
        .fold(f64::INFINITY, f64::min);
    let endpoint_near_min = (endpoint.energy_ev - min_energy_ev).abs() <= ENERGY_TOLERANCE_EV;
    let endpoint_drop = ts_energy_ev.map(|ts| ts - endpoint.energy_ev);
    let min_drop = ts_energy_ev.map(|ts| ts - min_energy_ev);

    let status = match endpoint_drop {
        None => DirectionStatus::MissingReference,
        Some(drop) if drop <= ENERGY_TOLERANCE_EV => DirectionStatus::NotDescending,
        Some(_) if endpoint_near_min => DirectionStatus::DescendsToMinimum,
        Some(_) => DirectionStatus::NonMonotonic,
    };

    Some(DirectionAssessment {
        status,
        n_points: points.len(),
        endpoint_step: endpoint.step,
        endpoint_energy_ev: endpoint.energy_ev,
        min_energy_ev,
        endpoint_drop_from_ts_ev: endpoint_drop,
        min_drop_from_ts_ev: min_drop,
        endpoint_near_min,
    })
}

#[derive(Debug, Error)]
pub enum ProfileExportError {
    #[error("CSV export error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

const PROFILE_COLUMNS: [&str; 10] = [
    "direction",
    "step",
    "energy_ev",
    "energy_hartree",
    "direction_status",
    "direction_endpoint_energy_ev",
    "direction_min_energy_ev",
    "direction_drop_from_ts_ev",
    "direction_min_drop_from_ts_ev",
    "direction_endpoint_near_min",
];

#[derive(Debug, Serialize)]
struct ProfileRow<'a> {
    direction: Direction,
    step: u64,
    energy_ev: f64,
    energy_hartree: f64,
    direction_status: Option<&'a str>,
    direction_endpoint_energy_ev: Option<f64>,
    direction_min_energy_ev: Option<f64>,
    direction_drop_from_ts_ev: Option<f64>,
    direction_min_drop_from_ts_ev: Option<f64>,
    direction_endpoint_near_min: Option<bool>,
}

/// Writes one CSV row per profile entry, annotated with its direction's assessment.
///
/// The header is always written, even for an empty profile.
pub fn write_profile_csv(
    path: &Path,
    profile: &[ProfileEntry],
    assessment: &ProfileAssessment,
) -> Result<(), ProfileExportError> {
    let csv_err = |source| ProfileExportError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(PROFILE_COLUMNS).map_err(csv_err)?;

    for entry in profile {
        let detail = assessment.direction(entry.direction);
        writer
            .serialize(ProfileRow {
                direction: entry.direction,
                step: entry.step,
                energy_ev: entry.energy_ev,
                energy_hartree: entry.energy_hartree,
                direction_status: detail.map(|d| d.status.as_str()),
                direction_endpoint_energy_ev: detail.map(|d| d.endpoint_energy_ev),
                direction_min_energy_ev: detail.map(|d| d.min_energy_ev),
                direction_drop_from_ts_ev: detail.and_then(|d| d.endpoint_drop_from_ts_ev),
                direction_min_drop_from_ts_ev: detail.and_then(|d| d.min_drop_from_ts_ev),
                direction_endpoint_near_min: detail.map(|d| d.endpoint_near_min),
            })
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|e| ProfileExportError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}
