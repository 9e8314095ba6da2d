//! User directory collaborator.
//!
//! User and role management live outside the engine; this is the narrow
//! slice the correctness core needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub active: bool,
    pub department: Option<String>,
    pub role: StaffRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Employee,
    Admin,
    Master,
}

impl StaffRole {
    /// Roles allowed to force payroll generation past pending reviews.
    pub fn can_force_payroll(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Master)
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> anyhow::Result<Option<DirectoryUser>>;

    async fn list_by_department(&self, department: &str) -> anyhow::Result<Vec<DirectoryUser>>;
}

/// Fixed in-memory directory for tests and wiring examples.
pub struct StaticDirectory {
    users: Mutex<HashMap<UserId, DirectoryUser>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, user: DirectoryUser) {
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user.id, user);
    }
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn get_user(&self, id: UserId) -> anyhow::Result<Option<DirectoryUser>> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }

    async fn list_by_department(&self, department: &str) -> anyhow::Result<Vec<DirectoryUser>> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|u| u.department.as_deref() == Some(department))
            .cloned()
            .collect())
    }
}
