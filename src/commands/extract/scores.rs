use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::cli::{JoinKey, ScoreArgs};
use crate::error::ScoreTableError;
use crate::model::ScoreRecord;
use crate::util::has_extension;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        self.as_f64()
            .filter(|value| value.fract() == 0.0)
            .map(|value| value as i64)
    }
}

pub type ScoreRow = HashMap<String, Cell>;

/// Header row plus data rows of a score spreadsheet export.
#[derive(Debug, Clone, Default)]
pub struct ScoreSheet {
    pub headers: Vec<String>,
    pub rows: Vec<ScoreRow>,
}

#[derive(Debug, Clone)]
pub struct ScoreColumns {
    pub name: String,
    pub state: String,
    pub district: String,
    pub nominate: String,
    pub les: String,
    pub session: Option<String>,
}

impl ScoreColumns {
    pub fn from_args(args: &ScoreArgs) -> Self {
        Self {
            name: args.name_column.clone(),
            state: args.state_column.clone(),
            district: args.district_column.clone(),
            nominate: args.nominate_column.clone(),
            les: args.les_column.clone(),
            session: if args.no_session_filter {
                None
            } else {
                args.session_column.clone()
            },
        }
    }

    fn required(&self, key_kind: JoinKey) -> Vec<&str> {
        let mut required = match key_kind {
            JoinKey::Name => vec![self.name.as_str()],
            JoinKey::District => vec![self.state.as_str(), self.district.as_str()],
        };
        required.push(self.nominate.as_str());
        required.push(self.les.as_str());
        required
    }
}

#[derive(Debug, Clone)]
pub struct ScoreTable {
    key_kind: JoinKey,
    entries: HashMap<String, ScoreRecord>,
    latest_session: Option<i64>,
    skipped_rows: usize,
}

impl ScoreTable {
    pub fn empty(key_kind: JoinKey) -> Self {
        Self {
            key_kind,
            entries: HashMap::new(),
            latest_session: None,
            skipped_rows: 0,
        }
    }

    pub fn build(
        sheet: &ScoreSheet,
        key_kind: JoinKey,
        columns: &ScoreColumns,
    ) -> Result<Self, ScoreTableError> {
        let missing: Vec<String> = columns
            .required(key_kind)
            .into_iter()
            .filter(|column| !sheet.headers.iter().any(|header| header == column))
            .map(ToOwned::to_owned)
            .collect();
        if !missing.is_empty() {
            return Err(ScoreTableError::SchemaMismatch { missing });
        }

        let session_column = match &columns.session {
            Some(session) if sheet.headers.iter().any(|header| header == session) => Some(session),
            Some(session) => {
                warn!(
                    column = %session,
                    "session column not present in score table; keeping rows from every session"
                );
                None
            }
            None => None,
        };

        let latest_session = session_column.and_then(|session| {
            sheet
                .rows
                .iter()
                .filter_map(|row| row.get(session).and_then(Cell::as_integer))
                .max()
        });

        let mut table = Self {
            latest_session,
            ..Self::empty(key_kind)
        };

        for row in &sheet.rows {
            if let Some(session) = session_column {
                let row_session = row.get(session).and_then(Cell::as_integer);
                if row_session.is_none() || row_session != latest_session {
                    continue;
                }
            }

            let key = match key_kind {
                JoinKey::Name => row
                    .get(&columns.name)
                    .and_then(Cell::as_text)
                    .and_then(normalize_person_name),
                JoinKey::District => {
                    let state = row.get(&columns.state).and_then(Cell::as_text);
                    let district = row.get(&columns.district).and_then(Cell::as_integer);
                    match (state, district) {
                        (Some(state), Some(district)) => Some(district_key(state, district)),
                        _ => None,
                    }
                }
            };

            let Some(key) = key else {
                table.skipped_rows += 1;
                continue;
            };

            let record = ScoreRecord {
                dw_nominate: row.get(&columns.nominate).and_then(Cell::as_f64),
                les: row.get(&columns.les).and_then(Cell::as_f64),
            };
            table.entries.insert(key, record);
        }

        debug!(
            skipped_rows = table.skipped_rows,
            latest_session = ?table.latest_session,
            "score table rows filtered"
        );

        Ok(table)
    }

    pub fn get(&self, key: &str) -> Option<&ScoreRecord> {
        self.entries.get(key)
    }

    pub fn key_kind(&self) -> JoinKey {
        self.key_kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest_session(&self) -> Option<i64> {
        self.latest_session
    }
}

pub fn load_csv(path: &Path) -> Result<ScoreSheet, ScoreTableError> {
    if has_extension(path, "xlsx") || has_extension(path, "xls") {
        return Err(ScoreTableError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let read_error = |err: csv::Error| ScoreTableError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(read_error)?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_error)?;
        let row: ScoreRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), Cell::parse(value)))
            .collect();
        rows.push(row);
    }

    info!(path = %path.display(), rows = rows.len(), "loaded score file");
    Ok(ScoreSheet { headers, rows })
}

pub fn district_key(state: &str, district: i64) -> String {
    format!("{}-{}", state.trim().to_ascii_uppercase(), district)
}

/// Normalizes a model-reported district such as `"ca-05"` or `"WA 7"` to the
/// table form `"CA-5"`.
pub fn normalize_district(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z]{2})\s*[-\s]\s*([0-9]{1,2})\b").expect("valid district regex")
    });

    let captures = re.captures(raw)?;
    let state = captures.get(1)?.as_str();
    let district = captures.get(2)?.as_str().parse::<i64>().ok()?;
    Some(district_key(state, district))
}

/// Normalizes a legislator name to lowercase `"first last"`, accepting both
/// `"Horsford, Steven"` and `"Congressman Steven Horsford (NV-04)"`.
pub fn normalize_person_name(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:(?:congresswoman|congressman|representative|senator)\b|(?:rep|sen)\.)\s*")
            .expect("valid honorific regex")
    });

    let without_title = re.replace(raw, "");
    let without_suffix = without_title.split('(').next().unwrap_or_default();

    let ordered = match without_suffix.split_once(',') {
        Some((last, rest)) => {
            let first = rest.split(',').next().unwrap_or_default();
            format!("{} {}", first.trim(), last.trim())
        }
        None => without_suffix.to_string(),
    };

    let normalized = ordered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
