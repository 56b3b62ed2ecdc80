//! Caller identity, as handed over by the fronting identity service.
//!
//! Token verification happens outside this core; the trusted proxy forwards
//! the verified subject in `x-user-id` / `x-user-role` headers. The core
//! only performs per-operation authorization on top of that.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Driver,
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub uid: Uuid,
    pub role: Role,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require(&self, role: Role, action: &str) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "only {}s can {action}",
                role.as_str()
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| AppError::Forbidden("missing or invalid caller identity".to_string()))?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some("client") => Role::Client,
            Some("driver") => Role::Driver,
            Some("admin") => Role::Admin,
            _ => {
                return Err(AppError::Forbidden(
                    "missing or invalid caller role".to_string(),
                ));
            }
        };

        Ok(Identity { uid, role })
    }
}
