pub mod service;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::bridge;
use crate::shared::error::ApiError;
use crate::shared::models::{ApiResponse, MessageView, SortOrder, TicketStatus, TicketView};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub creator_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: Option<TicketStatus>,
    pub operator_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub text: String,
    #[serde(default)]
    pub author_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<TicketStatus>,
    pub sort_by: Option<SortOrder>,
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/:id", get(get_ticket).patch(update_ticket))
        .route(
            "/api/tickets/:id/messages",
            get(list_messages).post(create_message),
        )
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TicketView>>), ApiError> {
    let default_creator = state.config.bridge.user_id;
    let ticket = blocking(&state.conn, move |conn| {
        service::create_ticket(conn, &request, default_creator)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ticket, "ticket created")),
    ))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<ApiResponse<Vec<TicketView>>>, ApiError> {
    let sort = query.sort_by.unwrap_or_default();
    let tickets = blocking(&state.conn, move |conn| {
        service::list_tickets(conn, query.status, sort)
    })
    .await?;

    Ok(Json(ApiResponse::ok(tickets, "tickets listed")))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<TicketView>>, ApiError> {
    let ticket = blocking(&state.conn, move |conn| service::get_ticket(conn, id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("ticket {} not found", id)))?;

    Ok(Json(ApiResponse::ok(ticket, "ticket found")))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Json<ApiResponse<TicketView>>, ApiError> {
    let ticket = blocking(&state.conn, move |conn| {
        service::update_ticket(conn, id, &request)
    })
    .await?;

    Ok(Json(ApiResponse::ok(ticket, "ticket updated")))
}

pub async fn create_message(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageView>>), ApiError> {
    let default_author = state.config.bridge.user_id;
    let text = request.text.clone();

    let (message, ticket) = blocking(&state.conn, move |conn| {
        let message = service::create_message(conn, ticket_id, &request, default_author)?;
        let ticket = service::get_ticket(conn, ticket_id)?;
        Ok((message, ticket))
    })
    .await?;

    // Best-effort reply to the ticket creator. The message is already
    // committed; a lost email never fails this response.
    if let Some(ticket) = ticket {
        bridge::send_email_task(
            &state,
            ticket.creator.email.clone(),
            format!("Re: {}", ticket.subject),
            text,
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(message, "message created")),
    ))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<MessageView>>>, ApiError> {
    let messages = blocking(&state.conn, move |conn| {
        service::list_messages(conn, ticket_id)
    })
    .await?;

    Ok(Json(ApiResponse::ok(messages, "messages listed")))
}
