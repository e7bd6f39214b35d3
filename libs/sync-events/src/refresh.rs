//! Refresh requests and the local refresh bus

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::EntityRef;

/// Category name the server uses for notification traffic. Frames carrying it
/// are routed to the notification store, never to the refresh bus.
pub const NOTIFICATION_CATEGORY: &str = "notification";

/// Refresh category carried by a server push or a local trigger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RefreshCategory {
    Admin,
    Course,
    User,
    Session,
    Enrollment,
    Custom(String),
}

impl RefreshCategory {
    /// Entity types a refresh of this category is scoped to.
    ///
    /// This is the fixed routing table consumers derive their default
    /// interest set from.
    pub fn entity_types(&self) -> &'static [&'static str] {
        match self {
            RefreshCategory::Admin => &["admin", "user", "course", "session", "enrollment", "payment"],
            RefreshCategory::Course => &["course", "session", "module", "enrollment"],
            RefreshCategory::User => &["user", "profile", "enrollment"],
            RefreshCategory::Session => &["session", "attendance", "course"],
            RefreshCategory::Enrollment => &["enrollment", "course", "user", "payment"],
            RefreshCategory::Custom(_) => &[],
        }
    }
}

impl std::fmt::Display for RefreshCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshCategory::Admin => write!(f, "admin"),
            RefreshCategory::Course => write!(f, "course"),
            RefreshCategory::User => write!(f, "user"),
            RefreshCategory::Session => write!(f, "session"),
            RefreshCategory::Enrollment => write!(f, "enrollment"),
            RefreshCategory::Custom(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for RefreshCategory {
    fn from(s: &str) -> Self {
        match s {
            "admin" => RefreshCategory::Admin,
            "course" => RefreshCategory::Course,
            "user" => RefreshCategory::User,
            "session" => RefreshCategory::Session,
            "enrollment" => RefreshCategory::Enrollment,
            custom => RefreshCategory::Custom(custom.to_string()),
        }
    }
}

impl From<String> for RefreshCategory {
    fn from(s: String) -> Self {
        RefreshCategory::from(s.as_str())
    }
}

impl From<RefreshCategory> for String {
    fn from(category: RefreshCategory) -> Self {
        category.to_string()
    }
}

/// Where a refresh request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshOrigin {
    /// Pushed by the server through the multiplexer
    Push,
    /// Triggered by the user
    Manual,
    /// Emitted by a periodic scheduler
    Timer,
}

/// A request to reload data, constructed per event and never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub category: RefreshCategory,
    #[serde(default)]
    pub affected_entities: Vec<EntityRef>,
    pub origin: RefreshOrigin,
}

impl RefreshRequest {
    pub fn push(category: RefreshCategory, affected_entities: Vec<EntityRef>) -> Self {
        Self {
            category,
            affected_entities,
            origin: RefreshOrigin::Push,
        }
    }

    /// Manual trigger. Carries no affected entities.
    pub fn manual(category: RefreshCategory) -> Self {
        Self {
            category,
            affected_entities: Vec::new(),
            origin: RefreshOrigin::Manual,
        }
    }

    pub fn timer(category: RefreshCategory) -> Self {
        Self {
            category,
            affected_entities: Vec::new(),
            origin: RefreshOrigin::Timer,
        }
    }
}

/// Local fan-out of refresh requests.
///
/// Cloning the bus clones the sending side; every [`RefreshBus::subscribe`]
/// call yields an independent receiver. A receiver that falls behind loses
/// the oldest requests, which matches the drop-over-queue refresh policy.
#[derive(Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshRequest>,
}

impl RefreshBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a request. Returns the number of receivers it reached.
    pub fn publish(&self, request: RefreshRequest) -> usize {
        trace!(
            category = %request.category,
            origin = ?request.origin,
            entities = request.affected_entities.len(),
            "Publishing refresh request"
        );
        match self.sender.send(request) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Refresh request published with no active receivers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshRequest> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
