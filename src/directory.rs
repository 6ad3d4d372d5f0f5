//! # User Directory
//!
//! The integration seam to the platform's user directory. The directory
//! collaborator supplies the set of possible counterparts and their
//! display metadata; the engine never validates that a counterpart id is
//! a real user (referential integrity, if wanted, belongs to the
//! directory's own storage contract).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A platform user's role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A learner enrolled on the platform
    Student,
    /// An instructor publishing assignments and grades
    Instructor,
}

impl Role {
    /// Get the lowercase string used across the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
        }
    }
}

/// Display metadata for one directory entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Opaque user id, the same space as message sender/receiver ids
    pub id: String,
    /// Display name
    pub username: String,
    /// Platform role
    pub role: Role,
    /// Avatar image URL, if set
    pub avatar_url: Option<String>,
}

/// The directory collaborator contract
///
/// Implemented by whatever backs the platform's profile table; the engine
/// only reads from it.
pub trait UserDirectory: Send + Sync {
    /// Every known profile
    fn list_users(&self) -> Result<Vec<UserProfile>>;
}

/// Directory backed by an in-memory list
///
/// For tests and for embedding callers that already hold the profile list.
pub struct InMemoryDirectory {
    users: Vec<UserProfile>,
}

impl InMemoryDirectory {
    /// Create a directory over the given profiles
    pub fn new(users: Vec<UserProfile>) -> Self {
        Self { users }
    }
}

impl UserDirectory for InMemoryDirectory {
    fn list_users(&self) -> Result<Vec<UserProfile>> {
        Ok(self.users.clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_strings() {
        assert_eq!(Role::Student.as_str(), "student");
        assert_eq!(Role::Instructor.as_str(), "instructor");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"instructor\"").unwrap(),
            Role::Instructor
        );
    }

    #[test]
    fn test_in_memory_directory_lists_users() {
        let directory = InMemoryDirectory::new(vec![UserProfile {
            id: "u1".to_string(),
            username: "alice".to_string(),
            role: Role::Instructor,
            avatar_url: Some("https://x/alice.png".to_string()),
        }]);

        let users = directory.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
    }

    #[test]
    fn test_profile_serializes_with_camel_case_fields() {
        let profile = UserProfile {
            id: "u1".to_string(),
            username: "alice".to_string(),
            role: Role::Student,
            avatar_url: None,
        };

        let value = serde_json::to_value(&profile).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("avatarUrl"));
        assert!(object.contains_key("username"));
    }
}
