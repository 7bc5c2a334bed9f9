use super::scores::{ScoreTable, normalize_district, normalize_person_name};
use crate::cli::JoinKey;
use crate::model::JobRecord;

/// Lookup key a record joins on, or `None` when the record lacks the field.
pub fn record_key(record: &JobRecord, key_kind: JoinKey) -> Option<String> {
    match key_kind {
        JoinKey::District => record.state_district.as_deref().and_then(normalize_district),
        JoinKey::Name => record
            .posting_author
            .as_deref()
            .and_then(normalize_person_name),
    }
}

/// Sets both score fields from the table. A missing table, key, or match
/// always leaves both fields explicitly `None`.
pub fn enrich(mut record: JobRecord, table: Option<&ScoreTable>) -> JobRecord {
    let scores = table.and_then(|table| {
        record_key(&record, table.key_kind()).and_then(|key| table.get(&key).copied())
    });

    record.dw_nominate = scores.and_then(|scores| scores.dw_nominate);
    record.les = scores.and_then(|scores| scores.les);
    record
}
