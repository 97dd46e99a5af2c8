//! Background worker syncing the ticket store with the mail channel:
//! outbound replies go out as email, unseen inbox email comes back in as
//! new tickets.

use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use crate::mail::InboundEmail;
use crate::shared::error::ApiError;
use crate::shared::state::AppState;
use crate::shared::utils::blocking;
use crate::tickets::{service as ticket_service, CreateTicketRequest};

const ACK_BODY: &str = "Your request has been received and will be handled shortly.";

/// Fire-and-forget outbound email. Spawned off the calling task so a slow
/// or failing SMTP session never blocks the caller.
pub fn send_email_task(state: &Arc<AppState>, to: String, subject: String, body: String) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let result =
            tokio::task::spawn_blocking(move || state.mail.send(&to, &subject, &body)).await;
        if let Err(e) = result {
            error!("email send task panicked: {}", e);
        }
    });
}

/// One poll: fetch unseen inbox email and convert each into a ticket plus
/// an acknowledgement reply.
pub async fn fetch_emails_task(state: &Arc<AppState>) {
    let mail = state.mail.clone();
    let inbound = match tokio::task::spawn_blocking(move || mail.fetch_unseen()).await {
        Ok(emails) => emails,
        Err(e) => {
            error!("inbox poll task panicked: {}", e);
            return;
        }
    };
    if inbound.is_empty() {
        return;
    }
    info!("Fetched {} new email(s) from inbox", inbound.len());

    convert_batch(inbound, |email| convert_email(state, email)).await;
}

/// Runs the per-item conversion over a batch. Items are independent: a
/// failure is logged and the rest of the batch continues. Returns the
/// number of tickets created.
async fn convert_batch<F, Fut>(inbound: Vec<InboundEmail>, mut convert: F) -> usize
where
    F: FnMut(InboundEmail) -> Fut,
    Fut: std::future::Future<Output = Result<i32, ApiError>>,
{
    let mut created = 0;
    for email in inbound {
        let from = email.from.clone();
        match convert(email).await {
            Ok(ticket_id) => {
                info!("Created ticket {} from email by {}", ticket_id, from);
                created += 1;
            }
            Err(e) => error!("Failed to convert email from {}: {}", from, e),
        }
    }
    created
}

async fn convert_email(state: &Arc<AppState>, email: InboundEmail) -> Result<i32, ApiError> {
    let request = CreateTicketRequest {
        subject: email.subject,
        description: email.body,
        creator_id: None,
    };
    // Reject undecodable-as-ticket email before touching the pool.
    ticket_service::validate_new_ticket(&request)?;

    let creator = state.config.bridge.user_id;
    let reply = reply_subject(&request.subject);
    let ticket = blocking(&state.conn, move |conn| {
        ticket_service::create_ticket(conn, &request, creator)
    })
    .await?;

    send_email_task(state, email.from, reply, ACK_BODY.to_string());
    Ok(ticket.id)
}

fn reply_subject(subject: &str) -> String {
    format!("Re: {}", subject)
}

/// Spawns the polling loop. Polls run on one task, so fetch-and-mark-seen
/// sessions never overlap.
pub fn spawn_bridge(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.bridge.poll_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Email bridge polling inbox every {}s", period.as_secs());
        loop {
            ticker.tick().await;
            fetch_emails_task(&state).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_subject() {
        assert_eq!(reply_subject("Printer broken"), "Re: Printer broken");
        assert_eq!(reply_subject(""), "Re: ");
    }

    fn inbound(from: &str, subject: &str, body: &str) -> InboundEmail {
        InboundEmail {
            from: from.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_bad_email_does_not_stop_the_batch() {
        let batch = vec![
            inbound("ada@example.com", "", ""),
            inbound("grace@example.com", "Printer broken", "Won't turn on"),
        ];

        let mut attempted = Vec::new();
        let created = convert_batch(batch, |email| {
            attempted.push(email.from.clone());
            async move {
                let request = CreateTicketRequest {
                    subject: email.subject,
                    description: email.body,
                    creator_id: None,
                };
                ticket_service::validate_new_ticket(&request)?;
                Ok(42)
            }
        })
        .await;

        assert_eq!(created, 1);
        assert_eq!(attempted, vec!["ada@example.com", "grace@example.com"]);
    }
}
