// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use sift_app::{Record, RecordId, RecordStatus};

pub const DEMO_TABLE: &str = "moderation_queue";

const DEMO_DRAFTS: [&str; 6] = [
    "Short draft that fits on a card.",
    "The vendor confirmed the delivery window for the second week of March, \
     pending a final check of the loading dock schedule and the revised \
     insurance certificate from the carrier.",
    "Needs a second pass for tone.",
    "Approved copy from the previous round, kept for reference while the \
     replacement paragraph is reviewed. The replacement tightens the opening \
     sentence and drops the redundant closing clause entirely.",
    "One-liner.",
    "",
];

const DEMO_CONTENTS: [&str; 6] = [
    "Submitted via the intake form.",
    "Original submission text, unedited. The author asked for a review of \
     the second paragraph in particular, where the claims about response \
     times were flagged by a reader as potentially out of date.",
    "",
    "Final content as published on the previous site.",
    "Resubmission after the first rejection.",
    "Imported from the legacy queue.",
];

/// Builds a record with empty passthrough columns. Empty text becomes a null
/// column, matching how the service serves unset text fields.
pub fn sample_record(id: i64, status: Option<RecordStatus>, draft: &str, content: &str) -> Record {
    Record {
        id: RecordId::new(id),
        status,
        content: non_empty(content),
        draft: non_empty(draft),
        extra: serde_json::Map::new(),
    }
}

/// A text value guaranteed to be longer than the card preview limit.
pub fn long_text(label: &str) -> String {
    format!("{label}: {}", "x".repeat(140))
}

/// Seed rows for `--demo` mode and UI tests: a mix of pending, terminal, and
/// absent statuses, with at least one field long enough to need expansion.
pub fn demo_records() -> Vec<Record> {
    let statuses = [
        None,
        Some(RecordStatus::Pending),
        Some(RecordStatus::Approved),
        Some(RecordStatus::Rejected),
        None,
        Some(RecordStatus::Pending),
    ];

    statuses
        .into_iter()
        .enumerate()
        .map(|(index, status)| {
            let id = index as i64 + 1;
            let mut record = sample_record(id, status, DEMO_DRAFTS[index], DEMO_CONTENTS[index]);
            record
                .extra
                .insert("source".to_owned(), serde_json::Value::from("demo"));
            record
        })
        .collect()
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{demo_records, long_text, sample_record};
    use sift_app::{RecordStatus, StatusFilter, filter_records};

    #[test]
    fn demo_records_cover_every_filter() {
        let records = demo_records();
        for filter in [
            StatusFilter::Pending,
            StatusFilter::Approved,
            StatusFilter::Rejected,
        ] {
            assert!(
                !filter_records(&records, filter).is_empty(),
                "no demo record for {}",
                filter.label()
            );
        }
    }

    #[test]
    fn demo_records_include_a_long_field() {
        let records = demo_records();
        assert!(
            records.iter().any(|record| {
                record
                    .draft
                    .as_deref()
                    .map(|text| text.chars().count() > 100)
                    .unwrap_or(false)
            }),
            "expansion affordance never appears in demo data"
        );
    }

    #[test]
    fn sample_record_nulls_empty_text() {
        let record = sample_record(1, Some(RecordStatus::Pending), "", "body");
        assert_eq!(record.draft, None);
        assert_eq!(record.content.as_deref(), Some("body"));
    }

    #[test]
    fn long_text_exceeds_preview_limit() {
        assert!(long_text("draft").chars().count() > 100);
    }
}
