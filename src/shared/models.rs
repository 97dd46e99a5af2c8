use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use schema::{messages, tickets, users};

pub mod schema {
    diesel::table! {
        users (id) {
            id -> Int4,
            email -> Text,
            username -> Text,
            password_hash -> Text,
            is_active -> Bool,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        tickets (id) {
            id -> Int4,
            subject -> Text,
            description -> Text,
            status -> Text,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
            creator_id -> Int4,
            operator_id -> Nullable<Int4>,
        }
    }

    diesel::table! {
        messages (id) {
            id -> Int4,
            text -> Text,
            created_at -> Timestamptz,
            ticket_id -> Int4,
            author_id -> Int4,
        }
    }
}

// ===== Storage records =====

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: i32,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_id: i32,
    pub operator_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: i32,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub ticket_id: i32,
    pub author_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket<'a> {
    pub subject: &'a str,
    pub description: &'a str,
    pub creator_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub text: &'a str,
    pub ticket_id: i32,
    pub author_id: i32,
}

/// Partial ticket update. `None` fields are skipped by diesel, so absent
/// request fields leave the stored row untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketChanges {
    pub status: Option<String>,
    pub operator_id: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

// ===== Enumerations =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
}

// ===== API views =====
//
// Responses carry composed views with related users resolved, never the raw
// storage records; the password hash stays out of every response.

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            email: user.email,
            username: user.username,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    pub id: i32,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<UserView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i32,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: UserView,
}

// ===== Response envelope =====

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: &str) -> Self {
        ApiResponse {
            data: Some(data),
            message: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 7,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_view_hides_password_hash() {
        let view = UserView::from(sample_user());
        let json = serde_json::to_value(&view).expect("serialize failed");
        let obj = json.as_object().expect("expected object");
        assert!(obj.contains_key("email"));
        assert!(!obj.contains_key("password_hash"));
        assert!(!json.to_string().contains("argon2id"));
    }

    #[test]
    fn test_ticket_status_round_trip() {
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("resolved"), None);
        assert_eq!(TicketStatus::parse(""), None);
    }

    #[test]
    fn test_ticket_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let parsed: TicketStatus = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(parsed, TicketStatus::Closed);
        assert!(serde_json::from_str::<TicketStatus>("\"urgent\"").is_err());
    }

    #[test]
    fn test_sort_order_defaults_to_desc() {
        assert_eq!(SortOrder::default(), SortOrder::CreatedAtDesc);
        let parsed: SortOrder = serde_json::from_str("\"created_at_asc\"").unwrap();
        assert_eq!(parsed, SortOrder::CreatedAtAsc);
    }

    #[test]
    fn test_ticket_view_omits_unset_operator() {
        let view = TicketView {
            id: 1,
            subject: "Printer broken".to_string(),
            description: "Won't turn on".to_string(),
            status: TicketStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            creator: UserView::from(sample_user()),
            operator: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("operator").is_none());
        assert_eq!(json["status"], "open");
    }

    #[test]
    fn test_envelope_shape() {
        let response = ApiResponse::ok(42, "done");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"], 42);
        assert_eq!(json["message"], "done");

        let empty: ApiResponse<()> = ApiResponse {
            data: None,
            message: Some("not found".to_string()),
        };
        let json = serde_json::to_value(&empty).unwrap();
        assert!(json["data"].is_null());
    }
}
