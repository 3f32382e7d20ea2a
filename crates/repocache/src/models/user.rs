use serde::{Deserialize, Serialize};

use repocache_core::storage::{Attributes, Model, ModelId};

/// A user record, used by the demo command and the repository tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: ModelId,
    pub name: String,
    pub email: String,
    pub status: String,
    #[serde(default)]
    pub age: Option<u32>,
}

impl Model for User {
    const ENTITY: &'static str = "User";

    fn id(&self) -> ModelId {
        self.id
    }
}

/// Attributes for creating a new user.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl NewUser {
    /// An active user without an age.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            status: "active".to_string(),
            age: None,
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    /// Converts into the attribute map accepted by `Repository::create`.
    pub fn attributes(&self) -> Attributes {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct of strings and integers always serializes to an object.
            _ => Attributes::new(),
        }
    }
}
