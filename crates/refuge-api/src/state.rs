use std::sync::Arc;

use refuge_auth::{AccountService, AuthConfig, Guard, MagicLinkService, SessionManager};
use refuge_db::Database;
use refuge_privacy::{Anonymizer, AuditRecorder};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub guard: Guard,
    pub magic_links: MagicLinkService,
    pub sessions: SessionManager,
    pub accounts: AccountService,
    pub anonymizer: Anonymizer,
    pub audit: AuditRecorder,
    pub config: AuthConfig,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        notifier: Arc<dyn refuge_auth::Notifier>,
        config: AuthConfig,
    ) -> Self {
        let audit = AuditRecorder::new(db.clone());
        let sessions = SessionManager::new(db.clone(), config.clone());
        let magic_links = MagicLinkService::new(
            db.clone(),
            sessions.clone(),
            notifier,
            audit.clone(),
            config.clone(),
        );
        let accounts = AccountService::new(db.clone(), sessions.clone(), audit.clone());
        let anonymizer = Anonymizer::new(db.clone(), audit.clone());
        let guard = Guard::new(db.clone(), config.clone());

        Self {
            db,
            guard,
            magic_links,
            sessions,
            accounts,
            anonymizer,
            audit,
            config,
        }
    }
}
