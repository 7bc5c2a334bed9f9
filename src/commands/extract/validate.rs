use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ExtractError, SchemaViolation};
use crate::model::JobRecord;

pub const ID_FIELD: &str = "Post_ID";
pub const MAX_SEARCH_DEPTH: usize = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldType {
    Text,
    Integer,
    /// 0/1 integer; booleans are accepted and converted.
    Flag,
    Float,
    TextList,
}

impl FieldType {
    fn describe(self) -> &'static str {
        match self {
            Self::Text => "string or null",
            Self::Integer => "integer or null",
            Self::Flag => "0 or 1 or null",
            Self::Float => "number or null",
            Self::TextList => "array of strings or null",
        }
    }
}

pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Enrichment fields are filled locally, never asked of the model.
    pub requested: bool,
}

const fn field(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        requested: true,
    }
}

pub const OPTIONAL_FIELDS: &[FieldSpec] = &[
    field("Posting_Author", FieldType::Text),
    field("Congress_Number", FieldType::Integer),
    field("State_District", FieldType::Text),
    field("Location", FieldType::Text),
    field("Date_Posted", FieldType::Text),
    field("Job_Function", FieldType::Text),
    field("Title_Parsed", FieldType::Text),
    field("Office_Type", FieldType::Text),
    field("Committee_Affiliation", FieldType::Text),
    field("Spanish_Language", FieldType::Flag),
    field("Responsibilities", FieldType::TextList),
    field("Qualifications", FieldType::TextList),
    field("Salary_Min", FieldType::Integer),
    field("Salary_Max", FieldType::Integer),
    field("Years_Experience", FieldType::Integer),
    field("Skills_Mentioned", FieldType::TextList),
    field("Equal_Opportunity_Information", FieldType::Text),
    field("Cleaned_Text", FieldType::Text),
    FieldSpec {
        name: "DW_NOMINATE",
        field_type: FieldType::Float,
        requested: false,
    },
    FieldSpec {
        name: "LES",
        field_type: FieldType::Float,
        requested: false,
    },
];

/// Renders the schema line embedded in the extraction prompt.
pub fn schema_description() -> String {
    let mut parts = vec![format!("\"{ID_FIELD}\": \"string\"")];
    parts.extend(
        OPTIONAL_FIELDS
            .iter()
            .filter(|spec| spec.requested)
            .map(|spec| format!("\"{}\": \"{}\"", spec.name, spec.field_type.describe())),
    );
    format!("{{ {} }}", parts.join(", "))
}

pub fn listing_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^MEM-[0-9]{3}-[0-9]{2}$").expect("valid listing id regex"))
}

#[derive(Debug, Default)]
pub struct Validated {
    pub records: Vec<JobRecord>,
    pub violations: Vec<SchemaViolation>,
    /// Nodes below `MAX_SEARCH_DEPTH` that were not searched.
    pub depth_limited: usize,
}

struct CandidateSearch<'a> {
    candidates: Vec<&'a Map<String, Value>>,
    depth_limited: usize,
}

/// Turns raw model output into job records. Fails only when the output holds
/// no identifier-bearing object at all.
pub fn validate(raw: &Value) -> Result<Validated, ExtractError> {
    let mut search = CandidateSearch {
        candidates: Vec::new(),
        depth_limited: 0,
    };
    collect_candidates(raw, 0, &mut search);

    if search.candidates.is_empty() {
        return Err(ExtractError::NoRecordsFound);
    }

    let mut validated = Validated {
        depth_limited: search.depth_limited,
        ..Validated::default()
    };
    for (index, candidate) in search.candidates.into_iter().enumerate() {
        match validate_candidate(index, candidate) {
            Ok(record) => validated.records.push(record),
            Err(violation) => validated.violations.push(violation),
        }
    }

    Ok(validated)
}

fn collect_candidates<'a>(value: &'a Value, depth: usize, search: &mut CandidateSearch<'a>) {
    if depth > MAX_SEARCH_DEPTH {
        search.depth_limited += 1;
        return;
    }

    match value {
        Value::Object(map) => {
            if map.contains_key(ID_FIELD) {
                search.candidates.push(map);
                return;
            }
            for child in map.values() {
                collect_candidates(child, depth + 1, search);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_candidates(item, depth + 1, search);
            }
        }
        _ => {}
    }
}

pub fn validate_candidate(
    index: usize,
    candidate: &Map<String, Value>,
) -> Result<JobRecord, SchemaViolation> {
    let violation = |post_id: Option<&str>, reason: String| SchemaViolation {
        index,
        post_id: post_id.map(ToOwned::to_owned),
        reason,
    };

    let post_id = match candidate.get(ID_FIELD) {
        Some(Value::String(value)) => value.trim(),
        Some(Value::Null) | None => {
            return Err(violation(None, format!("{ID_FIELD} is missing")));
        }
        Some(other) => {
            return Err(violation(
                None,
                format!("{ID_FIELD} must be a string, found {}", type_name(other)),
            ));
        }
    };
    if !listing_id_pattern().is_match(post_id) {
        return Err(violation(
            Some(post_id),
            format!("{ID_FIELD} '{post_id}' does not match MEM-###-##"),
        ));
    }

    let mut record = JobRecord::new(post_id);
    read_optional_fields(&mut record, &FieldReader { candidate })
        .map_err(|reason| violation(Some(post_id), reason))?;

    Ok(record)
}

fn read_optional_fields(record: &mut JobRecord, fields: &FieldReader<'_>) -> Result<(), String> {
    record.posting_author = fields.text("Posting_Author")?;
    record.congress_number = fields.integer("Congress_Number")?;
    record.state_district = fields.text("State_District")?;
    record.location = fields.text("Location")?;
    record.date_posted = fields.text("Date_Posted")?;
    record.job_function = fields.text("Job_Function")?;
    record.title_parsed = fields.text("Title_Parsed")?;
    record.office_type = fields.text("Office_Type")?;
    record.committee_affiliation = fields.text("Committee_Affiliation")?;
    record.spanish_language = fields.flag("Spanish_Language")?;
    record.responsibilities = fields.text_list("Responsibilities")?;
    record.qualifications = fields.text_list("Qualifications")?;
    record.salary_min = fields.integer("Salary_Min")?;
    record.salary_max = fields.integer("Salary_Max")?;
    record.years_experience = fields.integer("Years_Experience")?;
    record.skills_mentioned = fields.text_list("Skills_Mentioned")?;
    record.equal_opportunity_information = fields.text("Equal_Opportunity_Information")?;
    record.cleaned_text = fields.text("Cleaned_Text")?;
    record.dw_nominate = fields.float("DW_NOMINATE")?;
    record.les = fields.float("LES")?;
    Ok(())
}

struct FieldReader<'a> {
    candidate: &'a Map<String, Value>,
}

impl FieldReader<'_> {
    fn present(&self, name: &str) -> Option<&Value> {
        self.candidate.get(name).filter(|value| !value.is_null())
    }

    fn text(&self, name: &str) -> Result<Option<String>, String> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(wrong_type(name, "a string", other)),
        }
    }

    fn integer(&self, name: &str) -> Result<Option<i64>, String> {
        match self.present(name) {
            None => Ok(None),
            Some(value) => as_integer(value)
                .map(Some)
                .ok_or_else(|| wrong_type(name, "an integer", value)),
        }
    }

    fn flag(&self, name: &str) -> Result<Option<i64>, String> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(i64::from(*value))),
            Some(value) => match as_integer(value) {
                Some(flag @ (0 | 1)) => Ok(Some(flag)),
                _ => Err(wrong_type(name, "0 or 1", value)),
            },
        }
    }

    fn float(&self, name: &str) -> Result<Option<f64>, String> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("{name} is not a finite number")),
            Some(other) => Err(wrong_type(name, "a number", other)),
        }
    }

    fn text_list(&self, name: &str) -> Result<Option<Vec<String>>, String> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(value) => Ok(value.clone()),
                    other => Err(wrong_type(name, "an array of strings", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(wrong_type(name, "an array of strings", other)),
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(integer) = number.as_i64() {
        return Some(integer);
    }
    number
        .as_f64()
        .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
        .map(|float| float as i64)
}

fn wrong_type(name: &str, expected: &str, found: &Value) -> String {
    format!("{name} must be {expected}, found {}", type_name(found))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
