// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ModerationAction, Record, RecordId, StatusFilter, TextField, filter_records};
use std::collections::HashMap;

/// Per-record expansion flags for the two long-text fields. Keyed by record
/// id so a toggle survives list reloads; never cleared for the lifetime of
/// the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldExpansion {
    pub draft: bool,
    pub content: bool,
}

impl FieldExpansion {
    pub const fn get(self, field: TextField) -> bool {
        match field {
            TextField::Draft => self.draft,
            TextField::Content => self.content,
        }
    }

    fn toggle(&mut self, field: TextField) -> bool {
        let flag = match field {
            TextField::Draft => &mut self.draft,
            TextField::Content => &mut self.content,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub table: String,
    pub filter: StatusFilter,
    pub records: Vec<Record>,
    pub loading: bool,
    pub expanded: HashMap<RecordId, FieldExpansion>,
    pub pending_submission: Option<RecordId>,
    pub toast: Option<String>,
}

impl ViewState {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: StatusFilter::All,
            records: Vec::new(),
            loading: false,
            expanded: HashMap::new(),
            pending_submission: None,
            toast: None,
        }
    }

    pub fn is_expanded(&self, id: RecordId, field: TextField) -> bool {
        self.expanded
            .get(&id)
            .map(|expansion| expansion.get(field))
            .unwrap_or(false)
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    /// The records visible under the current filter, in backend order.
    pub fn filtered(&self) -> Vec<&Record> {
        filter_records(&self.records, self.filter)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    SelectTable(String),
    SetFilter(StatusFilter),
    ToggleExpansion(RecordId, TextField),
    BeginLoad,
    FinishLoad(Vec<Record>),
    BeginSubmission(RecordId, ModerationAction),
    SettleSubmission,
    ShowToast(String),
    ClearToast,
}

/// Why a submission attempt was refused before reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionRefusal {
    AlreadyInFlight,
    UnknownRecord,
    AlreadySettled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    TableChanged(String),
    FilterChanged(StatusFilter),
    ExpansionChanged {
        id: RecordId,
        field: TextField,
        expanded: bool,
    },
    LoadStarted,
    RecordsReplaced {
        count: usize,
    },
    SubmissionStarted {
        id: RecordId,
        action: ModerationAction,
    },
    SubmissionRefused {
        id: RecordId,
        reason: SubmissionRefusal,
    },
    SubmissionSettled,
    ToastShown,
    ToastCleared,
}

impl ViewState {
    pub fn dispatch(&mut self, command: ViewCommand) -> Vec<ViewEvent> {
        match command {
            ViewCommand::SelectTable(table) => {
                self.table = table.clone();
                vec![ViewEvent::TableChanged(table)]
            }
            ViewCommand::SetFilter(filter) => {
                self.filter = filter;
                vec![ViewEvent::FilterChanged(filter)]
            }
            ViewCommand::ToggleExpansion(id, field) => {
                let expanded = self.expanded.entry(id).or_default().toggle(field);
                vec![ViewEvent::ExpansionChanged {
                    id,
                    field,
                    expanded,
                }]
            }
            ViewCommand::BeginLoad => {
                self.loading = true;
                vec![ViewEvent::LoadStarted]
            }
            ViewCommand::FinishLoad(records) => {
                // Wholesale replacement; there is no incremental merge.
                self.records = records;
                self.loading = false;
                vec![ViewEvent::RecordsReplaced {
                    count: self.records.len(),
                }]
            }
            ViewCommand::BeginSubmission(id, action) => self.begin_submission(id, action),
            ViewCommand::SettleSubmission => {
                // Cleared unconditionally; success and failure both land here.
                self.pending_submission = None;
                vec![ViewEvent::SubmissionSettled]
            }
            ViewCommand::ShowToast(message) => {
                self.toast = Some(message);
                vec![ViewEvent::ToastShown]
            }
            ViewCommand::ClearToast => {
                self.toast = None;
                vec![ViewEvent::ToastCleared]
            }
        }
    }

    // One submission in flight system-wide, not per record.
    fn begin_submission(&mut self, id: RecordId, action: ModerationAction) -> Vec<ViewEvent> {
        if self.pending_submission.is_some() {
            return vec![ViewEvent::SubmissionRefused {
                id,
                reason: SubmissionRefusal::AlreadyInFlight,
            }];
        }

        let Some(record) = self.record(id) else {
            return vec![ViewEvent::SubmissionRefused {
                id,
                reason: SubmissionRefusal::UnknownRecord,
            }];
        };

        if record.is_terminal() {
            return vec![ViewEvent::SubmissionRefused {
                id,
                reason: SubmissionRefusal::AlreadySettled,
            }];
        }

        self.pending_submission = Some(id);
        vec![ViewEvent::SubmissionStarted { id, action }]
    }
}

// Tests for this module live in tests/state_tests.rs; they use sift-testkit,
// which depends on this crate, so they must link the library externally.
