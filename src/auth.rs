use serde::{Deserialize, Serialize};

/// The authenticated user as the auth collaborator hands it over: a stable
/// opaque id. Engines take `Option<&User>` and treat `None` as a hard
/// precondition failure before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
