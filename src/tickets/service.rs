use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;

use crate::shared::error::ApiError;
use crate::shared::models::schema::{messages, tickets, users};
use crate::shared::models::{
    Message, MessageView, NewMessage, NewTicket, SortOrder, Ticket, TicketChanges, TicketStatus,
    TicketView, User, UserView,
};
use crate::users::service as user_service;

use super::{CreateMessageRequest, CreateTicketRequest, UpdateTicketRequest};

pub fn create_ticket(
    conn: &mut PgConnection,
    request: &CreateTicketRequest,
    default_creator: i32,
) -> Result<TicketView, ApiError> {
    validate_new_ticket(request)?;

    let creator_id = request.creator_id.unwrap_or(default_creator);
    let creator = user_service::find_user(conn, creator_id)?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", creator_id)))?;

    let ticket: Ticket = diesel::insert_into(tickets::table)
        .values(&NewTicket {
            subject: &request.subject,
            description: &request.description,
            creator_id,
        })
        .get_result(conn)?;

    to_ticket_view(ticket, creator, None)
}

pub fn list_tickets(
    conn: &mut PgConnection,
    status: Option<TicketStatus>,
    sort: SortOrder,
) -> Result<Vec<TicketView>, ApiError> {
    let mut query = tickets::table.into_boxed();
    if let Some(status) = status {
        query = query.filter(tickets::status.eq(status.as_str()));
    }
    // id as tiebreaker keeps the order stable for identical timestamps
    query = match sort {
        SortOrder::CreatedAtAsc => query.order((tickets::created_at.asc(), tickets::id.asc())),
        SortOrder::CreatedAtDesc => query.order((tickets::created_at.desc(), tickets::id.desc())),
    };
    let rows: Vec<Ticket> = query.load(conn)?;

    let mut ids: Vec<i32> = rows.iter().map(|t| t.creator_id).collect();
    ids.extend(rows.iter().filter_map(|t| t.operator_id));
    let user_map = load_user_views(conn, &ids)?;

    rows.into_iter()
        .map(|ticket| {
            let creator = resolve(&user_map, ticket.creator_id, ticket.id)?;
            let operator = ticket
                .operator_id
                .map(|id| resolve(&user_map, id, ticket.id))
                .transpose()?;
            to_ticket_view(ticket, creator, operator)
        })
        .collect()
}

pub fn get_ticket(conn: &mut PgConnection, id: i32) -> Result<Option<TicketView>, ApiError> {
    let Some(ticket) = tickets::table.find(id).first::<Ticket>(conn).optional()? else {
        return Ok(None);
    };
    hydrate_ticket(conn, ticket).map(Some)
}

pub fn update_ticket(
    conn: &mut PgConnection,
    id: i32,
    request: &UpdateTicketRequest,
) -> Result<TicketView, ApiError> {
    tickets::table
        .find(id)
        .first::<Ticket>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("ticket {} not found", id)))?;

    if let Some(operator_id) = request.operator_id {
        user_service::find_user(conn, operator_id)?
            .ok_or_else(|| ApiError::NotFound(format!("user {} not found", operator_id)))?;
    }

    let updated: Ticket = diesel::update(tickets::table.find(id))
        .set(&TicketChanges {
            status: request.status.map(|s| s.as_str().to_string()),
            operator_id: request.operator_id,
            updated_at: Utc::now(),
        })
        .get_result(conn)?;

    hydrate_ticket(conn, updated)
}

pub fn create_message(
    conn: &mut PgConnection,
    ticket_id: i32,
    request: &CreateMessageRequest,
    default_author: i32,
) -> Result<MessageView, ApiError> {
    validate_new_message(request)?;

    tickets::table
        .find(ticket_id)
        .first::<Ticket>(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("ticket {} not found", ticket_id)))?;

    let author_id = request.author_id.unwrap_or(default_author);
    let author = user_service::find_user(conn, author_id)?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", author_id)))?;

    let message: Message = diesel::insert_into(messages::table)
        .values(&NewMessage {
            text: &request.text,
            ticket_id,
            author_id,
        })
        .get_result(conn)?;

    Ok(to_message_view(message, author))
}

pub fn list_messages(conn: &mut PgConnection, ticket_id: i32) -> Result<Vec<MessageView>, ApiError> {
    let rows: Vec<Message> = messages::table
        .filter(messages::ticket_id.eq(ticket_id))
        .order((messages::created_at.asc(), messages::id.asc()))
        .load(conn)?;

    let ids: Vec<i32> = rows.iter().map(|m| m.author_id).collect();
    let user_map = load_user_views(conn, &ids)?;

    rows.into_iter()
        .map(|message| {
            let author = resolve(&user_map, message.author_id, message.ticket_id)?;
            Ok(to_message_view(message, author))
        })
        .collect()
}

pub fn validate_new_ticket(request: &CreateTicketRequest) -> Result<(), ApiError> {
    if request.subject.trim().is_empty() || request.description.trim().is_empty() {
        return Err(ApiError::Validation(
            "subject and description must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_new_message(request: &CreateMessageRequest) -> Result<(), ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }
    Ok(())
}

// ===== Relation hydration =====

fn hydrate_ticket(conn: &mut PgConnection, ticket: Ticket) -> Result<TicketView, ApiError> {
    let mut ids = vec![ticket.creator_id];
    ids.extend(ticket.operator_id);
    let user_map = load_user_views(conn, &ids)?;

    let creator = resolve(&user_map, ticket.creator_id, ticket.id)?;
    let operator = ticket
        .operator_id
        .map(|id| resolve(&user_map, id, ticket.id))
        .transpose()?;
    to_ticket_view(ticket, creator, operator)
}

fn load_user_views(
    conn: &mut PgConnection,
    ids: &[i32],
) -> Result<HashMap<i32, UserView>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<User> = users::table.filter(users::id.eq_any(ids)).load(conn)?;
    Ok(rows
        .into_iter()
        .map(|user| (user.id, UserView::from(user)))
        .collect())
}

fn resolve(
    user_map: &HashMap<i32, UserView>,
    user_id: i32,
    ticket_id: i32,
) -> Result<UserView, ApiError> {
    user_map.get(&user_id).cloned().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!(
            "ticket {} references missing user {}",
            ticket_id,
            user_id
        ))
    })
}

fn to_ticket_view(
    ticket: Ticket,
    creator: UserView,
    operator: Option<UserView>,
) -> Result<TicketView, ApiError> {
    let status = TicketStatus::parse(&ticket.status).ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!(
            "ticket {} has unknown status {:?}",
            ticket.id,
            ticket.status
        ))
    })?;
    Ok(TicketView {
        id: ticket.id,
        subject: ticket.subject,
        description: ticket.description,
        status,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
        creator,
        operator,
    })
}

fn to_message_view(message: Message, author: UserView) -> MessageView {
    MessageView {
        id: message.id,
        text: message.text,
        created_at: message.created_at,
        author,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ticket_request(subject: &str, description: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            subject: subject.to_string(),
            description: description.to_string(),
            creator_id: None,
        }
    }

    #[test]
    fn test_ticket_validation() {
        assert!(validate_new_ticket(&ticket_request("", "desc")).is_err());
        assert!(validate_new_ticket(&ticket_request("subj", "")).is_err());
        assert!(validate_new_ticket(&ticket_request("  ", "desc")).is_err());
        assert!(validate_new_ticket(&ticket_request("Printer broken", "Won't turn on")).is_ok());
    }

    #[test]
    fn test_message_validation() {
        let empty = CreateMessageRequest {
            text: "".to_string(),
            author_id: None,
        };
        assert!(validate_new_message(&empty).is_err());

        let ok = CreateMessageRequest {
            text: "Check the power cable".to_string(),
            author_id: Some(1),
        };
        assert!(validate_new_message(&ok).is_ok());
    }

    #[test]
    fn test_partial_changeset_skips_absent_fields() {
        let request = UpdateTicketRequest {
            status: Some(TicketStatus::Closed),
            operator_id: None,
        };
        let changes = TicketChanges {
            status: request.status.map(|s| s.as_str().to_string()),
            operator_id: request.operator_id,
            updated_at: Utc::now(),
        };
        assert_eq!(changes.status.as_deref(), Some("closed"));
        assert_eq!(changes.operator_id, None);
    }

    #[test]
    fn test_to_ticket_view_rejects_unknown_status() {
        let now = Utc::now();
        let creator = UserView {
            id: 1,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let ticket = Ticket {
            id: 5,
            subject: "s".to_string(),
            description: "d".to_string(),
            status: "pending".to_string(),
            created_at: now,
            updated_at: now,
            creator_id: 1,
            operator_id: None,
        };
        assert!(to_ticket_view(ticket, creator, None).is_err());
    }

    #[test]
    fn test_resolve_reports_dangling_reference() {
        let map = HashMap::new();
        let err = resolve(&map, 9, 3).unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
