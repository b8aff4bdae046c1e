use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity & Roles ---

/// Role
///
/// The three fixed capability tiers. The variant order is the tier order
/// (`User < Staff < Superuser`), so the derived `Ord` is what the hierarchical
/// policy compares against. Serialized as `USER`, `STAFF`, `SUPERUSER` both in
/// token claims and in the `users.role` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    User,
    Staff,
    Superuser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Staff, Role::Superuser];

    /// Ordinal rank used by the hierarchical policy.
    pub fn tier(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Staff => 1,
            Role::Superuser => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Staff => "STAFF",
            Role::Superuser => "SUPERUSER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "USER" => Ok(Role::User),
            "STAFF" => Ok(Role::Staff),
            "SUPERUSER" => Ok(Role::Superuser),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Identity
///
/// The authenticated subject of one request. Only the token codec produces it
/// (from a verified credential). It is not `Deserialize`: no
/// request body can be turned into one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// User
///
/// Public view of an account row. The password hash never leaves the repository
/// except inside `UserRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Account row as needed by the login flow.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

/// Input to `UserDirectory::create_user`; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// --- Catalogue & Cart ---

/// Product
///
/// Catalogue entry. Read-only from the cart's point of view; a cart line may only
/// reference a product that exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub rating: f64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CartKey
///
/// The `(user, product)` pair a cart line is uniquely keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CartKey {
    pub user_id: Uuid,
    pub product_id: Uuid,
}

impl CartKey {
    pub fn new(user_id: Uuid, product_id: Uuid) -> Self {
        Self {
            user_id,
            product_id,
        }
    }
}

/// CartLine
///
/// Persisted quantity record for one user/product pair. A line with
/// `quantity <= 0` never exists: it is deleted instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct CartLine {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

impl CartLine {
    pub fn key(&self) -> CartKey {
        CartKey::new(self.user_id, self.product_id)
    }
}

/// A cart line joined with its product, as returned by `GET /cart`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CartItem {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: Product,
}

/// Result of taking one unit of a product out of a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The line had more than one unit; this is its new state.
    Decremented(CartLine),
    /// The last unit was taken, so the line no longer exists.
    Removed,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CartRequest {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Body of both `/auth/register` and `/auth/staff-register`. The role is never
/// read from the body: it is fixed by the route.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// ChangePasswordRequest
///
/// Body of `/auth/change-password`. Both fields must be present and differ.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangePasswordRequest {
    #[serde(alias = "oldPassword")]
    pub old_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

/// UpdateUserRequest
///
/// Partial profile update by a superuser. The role has its own route.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub rating: f64,
}

/// UpdateProductRequest
///
/// Partial update: only the provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

// --- Response Envelopes ---

/// ApiResponse
///
/// Success envelope shared by every mutating route: `{ message, data }`.
/// `data` is omitted when there is nothing to return (e.g. a removed cart line).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}
