//! Record selection by predicate.

use chrono::NaiveDateTime;
use reprise_common::{EventKind, InteractionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    IgnoreCase,
    /// Case-insensitive substring.
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub value: String,
    pub mode: MatchMode,
}

impl TextMatch {
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: MatchMode::Exact,
        }
    }

    pub fn ignore_case(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: MatchMode::IgnoreCase,
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: MatchMode::Contains,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self.mode {
            MatchMode::Exact => candidate == self.value,
            MatchMode::IgnoreCase => candidate.to_lowercase() == self.value.to_lowercase(),
            MatchMode::Contains => candidate
                .to_lowercase()
                .contains(&self.value.to_lowercase()),
        }
    }
}

/// Inclusive range on `start_time`; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeRange {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// Conjunction of optional predicates. The empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub process_name: Option<TextMatch>,
    pub application: Option<TextMatch>,
    pub event: Option<EventKind>,
    pub time_range: Option<TimeRange>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_name(mut self, m: TextMatch) -> Self {
        self.process_name = Some(m);
        self
    }

    pub fn application(mut self, m: TextMatch) -> Self {
        self.application = Some(m);
        self
    }

    pub fn event(mut self, event: impl Into<EventKind>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn time_range(mut self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        self.time_range = Some(TimeRange { from, to });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.process_name.is_none()
            && self.application.is_none()
            && self.event.is_none()
            && self.time_range.is_none()
    }

    pub fn matches(&self, record: &InteractionRecord) -> bool {
        if let Some(m) = &self.process_name
            && !m.matches(&record.process_name)
        {
            return false;
        }
        if let Some(m) = &self.application
            && !m.matches(&record.application)
        {
            return false;
        }
        if let Some(event) = &self.event
            && &record.event != event
        {
            return false;
        }
        if let Some(range) = &self.time_range {
            return record.start_time.is_some_and(|t| range.contains(t));
        }
        true
    }

    /// Sub-sequence of `records` satisfying every predicate, in input order.
    pub fn apply(&self, records: &[InteractionRecord]) -> Vec<InteractionRecord> {
        records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}
