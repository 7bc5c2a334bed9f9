use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ExportArgs;
use crate::model::JobRecord;
use crate::util::{ensure_directory, has_extension, list_files, read_json};

pub const CSV_COLUMNS: [&str; 21] = [
    "Post_ID",
    "Posting_Author",
    "Congress_Number",
    "State_District",
    "Location",
    "Date_Posted",
    "Job_Function",
    "Title_Parsed",
    "Office_Type",
    "Committee_Affiliation",
    "Spanish_Language",
    "Responsibilities",
    "Qualifications",
    "Salary_Min",
    "Salary_Max",
    "Years_Experience",
    "Skills_Mentioned",
    "Equal_Opportunity_Information",
    "Cleaned_Text",
    "DW_NOMINATE",
    "LES",
];

const LIST_SEPARATOR: &str = "; ";

pub fn run(args: ExportArgs) -> Result<()> {
    if !args.output_dir.is_dir() {
        bail!("output directory not found: {}", args.output_dir.display());
    }

    let records = collect_records(&args.output_dir)?;
    if records.is_empty() {
        info!(output_dir = %args.output_dir.display(), "no data to export");
        return Ok(());
    }

    write_records_csv(&args.csv_path, &records)?;
    info!(
        path = %args.csv_path.display(),
        records = records.len(),
        "export completed"
    );
    Ok(())
}

/// Reads every per-document JSON array under `output_dir`, in filename order.
/// Files that are not record arrays are skipped with a warning.
pub fn collect_records(output_dir: &Path) -> Result<Vec<JobRecord>> {
    let mut records = Vec::new();

    for path in list_files(output_dir)? {
        if !has_extension(&path, "json") {
            continue;
        }

        match read_json::<Vec<JobRecord>>(&path) {
            Ok(document_records) => records.extend(document_records),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable output"),
        }
    }

    Ok(records)
}

pub fn write_records_csv(path: &Path, records: &[JobRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;

    writer
        .write_record(CSV_COLUMNS)
        .with_context(|| format!("failed to write csv header: {}", path.display()))?;

    for record in records {
        writer
            .write_record(csv_row(record))
            .with_context(|| format!("failed to write csv row {}", record.post_id))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;
    Ok(())
}

pub fn csv_row(record: &JobRecord) -> Vec<String> {
    vec![
        record.post_id.clone(),
        text_cell(&record.posting_author),
        integer_cell(record.congress_number),
        text_cell(&record.state_district),
        text_cell(&record.location),
        text_cell(&record.date_posted),
        text_cell(&record.job_function),
        text_cell(&record.title_parsed),
        text_cell(&record.office_type),
        text_cell(&record.committee_affiliation),
        integer_cell(record.spanish_language),
        list_cell(&record.responsibilities),
        list_cell(&record.qualifications),
        integer_cell(record.salary_min),
        integer_cell(record.salary_max),
        integer_cell(record.years_experience),
        list_cell(&record.skills_mentioned),
        text_cell(&record.equal_opportunity_information),
        text_cell(&record.cleaned_text),
        float_cell(record.dw_nominate),
        float_cell(record.les),
    ]
}

fn text_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn integer_cell(value: Option<i64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn float_cell(value: Option<f64>) -> String {
    value.map(|value| format!("{value:.3}")).unwrap_or_default()
}

fn list_cell(value: &Option<Vec<String>>) -> String {
    value
        .as_ref()
        .map(|items| items.join(LIST_SEPARATOR))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::util::write_json_pretty;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("memjobs_export_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn sample_record() -> JobRecord {
        JobRecord {
            posting_author: Some("Rep. Steven Horsford".to_string()),
            congress_number: Some(118),
            state_district: Some("NV-04".to_string()),
            responsibilities: Some(vec![
                "Draft memos".to_string(),
                "Meet constituents".to_string(),
            ]),
            salary_min: Some(55000),
            dw_nominate: Some(-0.3456),
            ..JobRecord::new("MEM-001-24")
        }
    }

    #[test]
    fn csv_row_follows_column_order_and_formats_cells() {
        let row = csv_row(&sample_record());

        assert_eq!(row.len(), CSV_COLUMNS.len());
        assert_eq!(row[0], "MEM-001-24");
        assert_eq!(row[1], "Rep. Steven Horsford");
        assert_eq!(row[2], "118");
        assert_eq!(row[11], "Draft memos; Meet constituents");
        assert_eq!(row[13], "55000");
        assert_eq!(row[19], "-0.346");
        assert_eq!(row[20], "");
        assert_eq!(row[12], "");
    }

    #[test]
    fn export_combines_document_outputs_in_filename_order() {
        let dir = scratch_dir("combine");
        write_json_pretty(&dir.join("b_listings.json"), &vec![JobRecord::new("MEM-002-24")])
            .expect("write second document");
        write_json_pretty(&dir.join("a_listings.json"), &vec![sample_record()])
            .expect("write first document");
        fs::write(dir.join("notes.json"), "{\"not\": \"records\"}").expect("write stray json");

        let records = collect_records(&dir).expect("collect records");
        let ids: Vec<&str> = records.iter().map(|record| record.post_id.as_str()).collect();
        assert_eq!(ids, vec!["MEM-001-24", "MEM-002-24"]);

        let csv_path = dir.join("combined").join("listings.csv");
        write_records_csv(&csv_path, &records).expect("write csv");

        let mut reader = csv::Reader::from_path(&csv_path).expect("open csv");
        let headers: Vec<String> = reader
            .headers()
            .expect("csv headers")
            .iter()
            .map(ToOwned::to_owned)
            .collect();
        assert_eq!(headers, CSV_COLUMNS.map(ToOwned::to_owned).to_vec());
        assert_eq!(reader.records().count(), 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
