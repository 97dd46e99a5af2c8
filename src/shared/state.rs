use crate::config::AppConfig;
use crate::mail::MailClient;
use crate::shared::utils::DbPool;

/// Services constructed once at startup and shared across request handlers
/// and the email bridge.
#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub mail: MailClient,
}
