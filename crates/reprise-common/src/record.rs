use crate::event::EventKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One captured UI event.
///
/// Records are immutable once loaded. `index` is the capture position and is
/// the only ordering the engine relies on; timestamps may repeat, go backwards
/// or be missing entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub index: usize,
    #[serde(default)]
    pub process_name: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub exe_name: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub window_name: String,
    #[serde(default)]
    pub event: EventKind,
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveDateTime>,
}

impl InteractionRecord {
    pub fn new(index: usize, event: impl Into<EventKind>) -> Self {
        Self {
            index,
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_process(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = process_name.into();
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    pub fn with_window(mut self, window_name: impl Into<String>) -> Self {
        self.window_name = window_name.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        self.field_name = name.into();
        self.field_type = field_type.into();
        self
    }

    pub fn with_sentence(mut self, sentence: impl Into<String>) -> Self {
        self.sentence = non_empty(sentence.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = non_empty(url.into());
        self
    }

    /// Sets both timestamps. An `end` earlier than `start` is clamped to `start`.
    pub fn with_times(mut self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self.normalize_times();
        self
    }

    /// Enforces `end_time >= start_time`. Returns true if the record was changed.
    pub fn normalize_times(&mut self) -> bool {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && end < start
        {
            self.end_time = Some(start);
            return true;
        }
        false
    }

    /// Non-blank URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn sentence(&self) -> Option<&str> {
        self.sentence.as_deref().filter(|s| !s.is_empty())
    }

    /// Name used when reporting which program a record targeted.
    pub fn target_name(&self) -> &str {
        if !self.application.is_empty() {
            &self.application
        } else {
            &self.process_name
        }
    }

    /// End of the interaction, falling back to its start.
    pub fn finished_at(&self) -> Option<NaiveDateTime> {
        self.end_time.or(self.start_time)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}
