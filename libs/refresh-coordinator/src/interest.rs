//! Consumer interest sets and the page-type defaults they derive from

use std::collections::BTreeSet;
use std::fmt;
use sync_events::{RefreshCategory, RefreshOrigin, RefreshRequest};

/// Kind of page a consumer renders
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageType {
    AdminDashboard,
    InstructorDashboard,
    StudentDashboard,
    CourseDetail,
    SessionDetail,
    Profile,
    Custom(String),
}

impl PageType {
    /// Refresh categories a page of this type follows by default.
    /// Custom pages follow nothing, which leaves their interest empty.
    pub fn default_categories(&self) -> Vec<RefreshCategory> {
        match self {
            PageType::AdminDashboard => vec![RefreshCategory::Admin],
            PageType::InstructorDashboard | PageType::StudentDashboard => vec![
                RefreshCategory::Course,
                RefreshCategory::Session,
                RefreshCategory::Enrollment,
            ],
            PageType::CourseDetail => vec![RefreshCategory::Course],
            PageType::SessionDetail => vec![RefreshCategory::Session],
            PageType::Profile => vec![RefreshCategory::User],
            PageType::Custom(_) => Vec::new(),
        }
    }

    /// Union of the entity types routed to the default categories
    pub fn default_entity_types(&self) -> BTreeSet<String> {
        self.default_categories()
            .iter()
            .flat_map(|category| category.entity_types().iter())
            .map(|entity_type| entity_type.to_string())
            .collect()
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageType::AdminDashboard => write!(f, "admin-dashboard"),
            PageType::InstructorDashboard => write!(f, "instructor-dashboard"),
            PageType::StudentDashboard => write!(f, "student-dashboard"),
            PageType::CourseDetail => write!(f, "course-detail"),
            PageType::SessionDetail => write!(f, "session-detail"),
            PageType::Profile => write!(f, "profile"),
            PageType::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for PageType {
    fn from(s: &str) -> Self {
        match s {
            "admin-dashboard" => PageType::AdminDashboard,
            "instructor-dashboard" => PageType::InstructorDashboard,
            "student-dashboard" => PageType::StudentDashboard,
            "course-detail" => PageType::CourseDetail,
            "session-detail" => PageType::SessionDetail,
            "profile" => PageType::Profile,
            other => PageType::Custom(other.to_string()),
        }
    }
}

/// What a consumer registers with
#[derive(Debug, Clone)]
pub struct Registration {
    pub page_type: PageType,
    /// Overrides the page type's default entity types
    pub entity_types: Option<Vec<String>>,
    pub entity_ids: Option<Vec<String>>,
    /// Name used in logs and feedback; defaults to the page type
    pub label: Option<String>,
}

impl Registration {
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            entity_types: None,
            entity_ids: None,
            label: None,
        }
    }

    pub fn entity_types<I, S>(mut self, entity_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = Some(entity_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn entity_ids<I, S>(mut self, entity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_ids = Some(entity_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.page_type.to_string())
    }

    pub(crate) fn interest(&self) -> Interest {
        let entity_types = match &self.entity_types {
            Some(explicit) => explicit.iter().cloned().collect(),
            None => self.page_type.default_entity_types(),
        };
        let entity_ids = self
            .entity_ids
            .iter()
            .flatten()
            .cloned()
            .collect();
        Interest {
            entity_types,
            entity_ids,
        }
    }
}

/// Resolved interest set of one consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interest {
    pub entity_types: BTreeSet<String>,
    pub entity_ids: BTreeSet<String>,
}

impl Interest {
    /// Whether `request` should reload this consumer
    pub fn matches(&self, request: &RefreshRequest) -> bool {
        if request.origin == RefreshOrigin::Manual || self.entity_types.is_empty() {
            return true;
        }

        if request.affected_entities.is_empty() {
            return request
                .category
                .entity_types()
                .iter()
                .any(|entity_type| self.entity_types.contains(*entity_type));
        }

        request.affected_entities.iter().any(|entity| {
            self.entity_types.contains(&entity.entity_type)
                || self.entity_ids.contains(&entity.entity_id)
        })
    }
}
