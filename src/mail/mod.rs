use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{info, warn};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};

use crate::config::{ImapConfig, SmtpConfig};

/// A decoded inbound email: bare sender address, subject, plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEmail {
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Outbound SMTP and inbound IMAP in one place. Both directions are
/// best-effort: failures are logged, never propagated to callers.
#[derive(Clone)]
pub struct MailClient {
    smtp: SmtpConfig,
    imap: ImapConfig,
}

impl MailClient {
    pub fn new(smtp: SmtpConfig, imap: ImapConfig) -> Self {
        MailClient { smtp, imap }
    }

    pub fn send(&self, to: &str, subject: &str, body: &str) {
        match self.try_send(to, subject, body) {
            Ok(()) => info!("Email sent to {}", to),
            Err(e) => warn!("Failed to send email to {}: {:#}", to, e),
        }
    }

    fn try_send(&self, to: &str, subject: &str, body: &str) -> Result<(), anyhow::Error> {
        let email = Message::builder()
            .from(self.smtp.from_email.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .body(body.to_string())?;

        let creds = Credentials::new(self.smtp.user.clone(), self.smtp.password.clone());
        let mailer = SmtpTransport::relay(&self.smtp.host)?
            .port(self.smtp.port)
            .credentials(creds)
            .build();

        mailer.send(&email)?;
        Ok(())
    }

    /// Fetches all unseen inbox messages and marks them seen. A failure
    /// anywhere in the session discards the partial batch and yields an
    /// empty result for this poll.
    pub fn fetch_unseen(&self) -> Vec<InboundEmail> {
        match self.try_fetch_unseen() {
            Ok(emails) => emails,
            Err(e) => {
                warn!("Failed to fetch inbox: {:#}", e);
                Vec::new()
            }
        }
    }

    fn try_fetch_unseen(&self) -> Result<Vec<InboundEmail>, anyhow::Error> {
        let tls = native_tls::TlsConnector::builder().build()?;
        let client = imap::connect(
            (self.imap.host.as_str(), self.imap.port),
            &self.imap.host,
            &tls,
        )?;
        let mut session = client
            .login(&self.imap.user, &self.imap.password)
            .map_err(|(e, _)| e)?;

        session.select("INBOX")?;
        let unseen = session.search("UNSEEN")?;

        let mut emails = Vec::new();
        for seq in &unseen {
            // PEEK leaves the \Seen flag alone; the explicit store below
            // only runs once the whole batch decoded, so a session failure
            // leaves every message unseen for the next poll.
            let fetches = session.fetch(seq.to_string(), "BODY.PEEK[]")?;
            for fetch in fetches.iter() {
                let Some(raw) = fetch.body() else { continue };
                match decode_email(raw) {
                    Ok(email) => emails.push(email),
                    Err(e) => warn!("Skipping undecodable message {}: {:#}", seq, e),
                }
            }
        }

        if !unseen.is_empty() {
            let set = unseen
                .iter()
                .map(|seq| seq.to_string())
                .collect::<Vec<_>>()
                .join(",");
            session.store(set, "+FLAGS (\\Seen)")?;
        }

        session.logout().ok();
        Ok(emails)
    }
}

fn decode_email(raw: &[u8]) -> Result<InboundEmail, anyhow::Error> {
    let parsed = parse_mail(raw)?;
    let headers = parsed.get_headers();
    let from = extract_address(&headers.get_first_value("From").unwrap_or_default());
    let subject = headers.get_first_value("Subject").unwrap_or_default();
    let body = plain_text_body(&parsed)?;
    Ok(InboundEmail {
        from,
        subject,
        body,
    })
}

fn plain_text_body(parsed: &ParsedMail) -> Result<String, anyhow::Error> {
    if let Some(part) = parsed
        .subparts
        .iter()
        .find(|p| p.ctype.mimetype == "text/plain")
    {
        Ok(part.get_body()?)
    } else {
        Ok(parsed.get_body()?)
    }
}

/// Reduces `Display Name <user@host>` to `user@host`.
fn extract_address(header: &str) -> String {
    match (header.rfind('<'), header.rfind('>')) {
        (Some(start), Some(end)) if start < end => header[start + 1..end].to_string(),
        _ => header.trim().to_string(),
    }
}
