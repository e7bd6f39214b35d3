//! Snapshot record persisted across a forced reload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Value of one form control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox / radio state
    Checked(bool),
    Text(String),
    /// Multi-select
    Multiple(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Checked(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    TextArea,
    Select,
    MultiSelect,
    Checkbox,
    Radio,
    Hidden,
    Password,
    File,
}

impl FieldKind {
    /// Password and file inputs never leave the page
    pub fn is_preserved(&self) -> bool {
        !matches!(self, FieldKind::Password | FieldKind::File)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
}

impl FormField {
    pub fn new(name: impl Into<String>, kind: FieldKind, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }
}

/// A form as read from the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot {
    pub id: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default)]
    pub sidebar_collapsed: bool,
    /// Page-specific toggles
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    #[serde(default)]
    pub scroll_position: ScrollPosition,
    /// form id → field name → value
    #[serde(default)]
    pub form_data: BTreeMap<String, BTreeMap<String, FieldValue>>,
    #[serde(default)]
    pub ui_settings: UiSettings,
    #[serde(default)]
    pub expanded_sections: BTreeSet<String>,
    /// tab group → selected tab
    #[serde(default)]
    pub selected_tabs: BTreeMap<String, String>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl SnapshotRecord {
    pub fn new(timestamp: DateTime<Utc>, path: impl Into<String>) -> Self {
        Self {
            timestamp,
            path: path.into(),
            scroll_position: ScrollPosition::default(),
            form_data: BTreeMap::new(),
            ui_settings: UiSettings::default(),
            expanded_sections: BTreeSet::new(),
            selected_tabs: BTreeMap::new(),
            filters: BTreeMap::new(),
        }
    }

    /// Keep the preservable fields of `forms`; forms left empty are dropped
    pub fn with_forms(mut self, forms: Vec<FormSnapshot>) -> Self {
        for form in forms {
            let fields: BTreeMap<String, FieldValue> = form
                .fields
                .into_iter()
                .filter(|field| field.kind.is_preserved())
                .map(|field| (field.name, field.value))
                .collect();
            if !fields.is_empty() {
                self.form_data.insert(form.id, fields);
            }
        }
        self
    }

    /// Strictly younger than `ttl` at `now`. Records stamped in the future
    /// (clock adjustments) count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.timestamp).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }

    pub fn field_count(&self) -> usize {
        self.form_data.values().map(BTreeMap::len).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
