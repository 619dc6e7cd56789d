use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Resolve the verified identity into the `{ caller_id, role }` pair the
    /// scheduling services work with.
    pub fn caller(&self) -> Result<Caller, AppError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;
        let role = self
            .role
            .as_deref()
            .and_then(Role::from_claim)
            .ok_or_else(|| AppError::Auth("Token does not carry a clinic role".to_string()))?;

        Ok(Caller { id, role })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Staff,
    Doctor,
    Patient,
}

impl Role {
    pub fn from_claim(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "staff" | "admin" => Some(Role::Staff),
            "doctor" => Some(Role::Doctor),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Staff => write!(f, "Staff"),
            Role::Doctor => write!(f, "Doctor"),
            Role::Patient => write!(f, "Patient"),
        }
    }
}

/// Identity of whoever initiated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn test_role_claims() {
        assert_eq!(Role::from_claim("admin"), Some(Role::Staff));
        assert_eq!(Role::from_claim("Staff"), Some(Role::Staff));
        assert_eq!(Role::from_claim("doctor"), Some(Role::Doctor));
        assert_eq!(Role::from_claim("PATIENT"), Some(Role::Patient));
        assert_eq!(Role::from_claim("authenticated"), None);
    }

    #[test]
    fn test_caller_requires_uuid_and_role() {
        let id = Uuid::new_v4();
        let caller = user(&id.to_string(), Some("doctor")).caller().unwrap();
        assert_eq!(caller, Caller::new(id, Role::Doctor));

        assert!(user("not-a-uuid", Some("doctor")).caller().is_err());
        assert!(user(&id.to_string(), None).caller().is_err());
    }
}
