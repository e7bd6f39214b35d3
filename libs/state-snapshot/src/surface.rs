//! Page boundary for capturing and replaying UI state

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

use crate::record::{FieldValue, FormSnapshot, ScrollPosition, UiSettings};

/// What the snapshot service can read from and write to the live page.
///
/// Setters return `false` when the target no longer exists on the page
/// (the form field, section, tab group or filter was not rendered after the
/// reload); the service skips those and keeps going.
pub trait PageSurface: Send + Sync {
    fn current_path(&self) -> String;

    fn scroll_position(&self) -> ScrollPosition;
    fn scroll_to(&self, position: ScrollPosition);

    /// Every form on the page with all of its fields, sensitive ones included
    fn forms(&self) -> Vec<FormSnapshot>;
    fn set_field(&self, form_id: &str, field: &str, value: &FieldValue) -> bool;

    fn ui_settings(&self) -> UiSettings;
    fn apply_ui_settings(&self, settings: &UiSettings);

    fn expanded_sections(&self) -> BTreeSet<String>;
    fn expand_section(&self, section_id: &str) -> bool;

    fn selected_tabs(&self) -> BTreeMap<String, String>;
    fn select_tab(&self, group_id: &str, tab_id: &str) -> bool;

    fn filters(&self) -> BTreeMap<String, String>;
    fn set_filter(&self, name: &str, value: &str) -> bool;
}

#[derive(Debug, Default)]
struct PageState {
    path: String,
    scroll: ScrollPosition,
    forms: Vec<FormSnapshot>,
    ui: UiSettings,
    /// Section id → expanded
    sections: BTreeMap<String, bool>,
    /// Group id → (available tabs, selected)
    tab_groups: BTreeMap<String, (BTreeSet<String>, Option<String>)>,
    /// Filter name → current value
    filters: BTreeMap<String, String>,
}

/// Headless page used by native shells and tests.
///
/// Targets have to be declared before they can be restored into, mirroring
/// a rendered page where only existing elements can receive state.
#[derive(Debug, Default)]
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new(path: impl Into<String>) -> Self {
        let page = Self::default();
        page.state.lock().path = path.into();
        page
    }

    pub fn navigate(&self, path: impl Into<String>) {
        self.state.lock().path = path.into();
    }

    pub fn add_form(&self, form: FormSnapshot) {
        let mut state = self.state.lock();
        state.forms.retain(|existing| existing.id != form.id);
        state.forms.push(form);
    }

    pub fn add_section(&self, section_id: impl Into<String>, expanded: bool) {
        self.state.lock().sections.insert(section_id.into(), expanded);
    }

    pub fn add_tab_group<I, S>(&self, group_id: impl Into<String>, tabs: I, selected: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tabs: BTreeSet<String> = tabs.into_iter().map(Into::into).collect();
        self.state
            .lock()
            .tab_groups
            .insert(group_id.into(), (tabs, selected.map(str::to_string)));
    }

    pub fn add_filter(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state.lock().filters.insert(name.into(), value.into());
    }

    pub fn set_ui(&self, settings: UiSettings) {
        self.state.lock().ui = settings;
    }

    /// Current value of a field, if the field exists
    pub fn field(&self, form_id: &str, field: &str) -> Option<FieldValue> {
        let state = self.state.lock();
        state
            .forms
            .iter()
            .find(|form| form.id == form_id)?
            .fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.value.clone())
    }

    /// Simulates a full reload: every piece of ephemeral state is reset while
    /// the page structure stays the same
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.scroll = ScrollPosition::default();
        state.ui = UiSettings::default();
        for form in &mut state.forms {
            for field in &mut form.fields {
                field.value = match field.value {
                    FieldValue::Checked(_) => FieldValue::Checked(false),
                    FieldValue::Text(_) => FieldValue::Text(String::new()),
                    FieldValue::Multiple(_) => FieldValue::Multiple(Vec::new()),
                };
            }
        }
        for expanded in state.sections.values_mut() {
            *expanded = false;
        }
        for (_, selected) in state.tab_groups.values_mut() {
            *selected = None;
        }
        for value in state.filters.values_mut() {
            value.clear();
        }
    }
}

impl PageSurface for MemoryPage {
    fn current_path(&self) -> String {
        self.state.lock().path.clone()
    }

    fn scroll_position(&self) -> ScrollPosition {
        self.state.lock().scroll
    }

    fn scroll_to(&self, position: ScrollPosition) {
        self.state.lock().scroll = position;
    }

    fn forms(&self) -> Vec<FormSnapshot> {
        self.state.lock().forms.clone()
    }

    fn set_field(&self, form_id: &str, field: &str, value: &FieldValue) -> bool {
        let mut state = self.state.lock();
        let target = state
            .forms
            .iter_mut()
            .find(|form| form.id == form_id)
            .and_then(|form| form.fields.iter_mut().find(|f| f.name == field));
        match target {
            Some(target) => {
                target.value = value.clone();
                true
            }
            None => false,
        }
    }

    fn ui_settings(&self) -> UiSettings {
        self.state.lock().ui.clone()
    }

    fn apply_ui_settings(&self, settings: &UiSettings) {
        self.state.lock().ui = settings.clone();
    }

    fn expanded_sections(&self) -> BTreeSet<String> {
        self.state
            .lock()
            .sections
            .iter()
            .filter(|(_, expanded)| **expanded)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn expand_section(&self, section_id: &str) -> bool {
        match self.state.lock().sections.get_mut(section_id) {
            Some(expanded) => {
                *expanded = true;
                true
            }
            None => false,
        }
    }

    fn selected_tabs(&self) -> BTreeMap<String, String> {
        self.state
            .lock()
            .tab_groups
            .iter()
            .filter_map(|(group, (_, selected))| {
                selected.as_ref().map(|tab| (group.clone(), tab.clone()))
            })
            .collect()
    }

    fn select_tab(&self, group_id: &str, tab_id: &str) -> bool {
        match self.state.lock().tab_groups.get_mut(group_id) {
            Some((tabs, selected)) if tabs.contains(tab_id) => {
                *selected = Some(tab_id.to_string());
                true
            }
            _ => false,
        }
    }

    fn filters(&self) -> BTreeMap<String, String> {
        self.state
            .lock()
            .filters
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn set_filter(&self, name: &str, value: &str) -> bool {
        match self.state.lock().filters.get_mut(name) {
            Some(current) => {
                *current = value.to_string();
                true
            }
            None => false,
        }
    }
}
