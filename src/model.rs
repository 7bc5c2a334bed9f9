use serde::{Deserialize, Serialize};

/// One structured job listing. `None` serializes as `null`; every field is
/// always emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "Post_ID")]
    pub post_id: String,
    #[serde(rename = "Posting_Author", default)]
    pub posting_author: Option<String>,
    #[serde(rename = "Congress_Number", default)]
    pub congress_number: Option<i64>,
    #[serde(rename = "State_District", default)]
    pub state_district: Option<String>,
    #[serde(rename = "Location", default)]
    pub location: Option<String>,
    #[serde(rename = "Date_Posted", default)]
    pub date_posted: Option<String>,
    #[serde(rename = "Job_Function", default)]
    pub job_function: Option<String>,
    #[serde(rename = "Title_Parsed", default)]
    pub title_parsed: Option<String>,
    #[serde(rename = "Office_Type", default)]
    pub office_type: Option<String>,
    #[serde(rename = "Committee_Affiliation", default)]
    pub committee_affiliation: Option<String>,
    #[serde(rename = "Spanish_Language", default)]
    pub spanish_language: Option<i64>,
    #[serde(rename = "Responsibilities", default)]
    pub responsibilities: Option<Vec<String>>,
    #[serde(rename = "Qualifications", default)]
    pub qualifications: Option<Vec<String>>,
    #[serde(rename = "Salary_Min", default)]
    pub salary_min: Option<i64>,
    #[serde(rename = "Salary_Max", default)]
    pub salary_max: Option<i64>,
    #[serde(rename = "Years_Experience", default)]
    pub years_experience: Option<i64>,
    #[serde(rename = "Skills_Mentioned", default)]
    pub skills_mentioned: Option<Vec<String>>,
    #[serde(rename = "Equal_Opportunity_Information", default)]
    pub equal_opportunity_information: Option<String>,
    #[serde(rename = "Cleaned_Text", default)]
    pub cleaned_text: Option<String>,
    #[serde(rename = "DW_NOMINATE", default)]
    pub dw_nominate: Option<f64>,
    #[serde(rename = "LES", default)]
    pub les: Option<f64>,
}

impl JobRecord {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            posting_author: None,
            congress_number: None,
            state_district: None,
            location: None,
            date_posted: None,
            job_function: None,
            title_parsed: None,
            office_type: None,
            committee_affiliation: None,
            spanish_language: None,
            responsibilities: None,
            qualifications: None,
            salary_min: None,
            salary_max: None,
            years_experience: None,
            skills_mentioned: None,
            equal_opportunity_information: None,
            cleaned_text: None,
            dw_nominate: None,
            les: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRecord {
    pub dw_nominate: Option<f64>,
    pub les: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingChunk {
    /// 1-based position within the source document.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub filename: String,
    pub kind: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub name_marker: Option<String>,
    pub document_count: usize,
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub retry_mode: String,
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPaths {
    pub input_dir: String,
    pub output_dir: String,
    pub score_file: Option<String>,
    pub csv_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub documents_found: usize,
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub documents_without_records: usize,
    pub chunks_total: usize,
    pub chunks_failed: usize,
    pub records_emitted: usize,
    pub records_rejected: usize,
    pub retries: usize,
    pub score_keys_loaded: usize,
    pub records_enriched: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub filename: String,
    pub sha256: Option<String>,
    pub status: String,
    pub chunk_count: usize,
    pub record_count: usize,
    pub output_path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub failure_reason: Option<String>,
    pub command: String,
    pub join_key: String,
    pub model: ModelSettings,
    pub paths: RunPaths,
    pub counts: RunCounts,
    pub documents: Vec<DocumentOutcome>,
    pub warnings: Vec<String>,
}
