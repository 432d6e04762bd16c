pub mod accounts;
pub mod config;
pub mod guard;
pub mod magic_link;
pub mod notify;
pub mod session;
pub mod token;

pub use accounts::AccountService;
pub use config::AuthConfig;
pub use guard::{Guard, require_role};
pub use magic_link::{MagicLinkService, VerifiedLogin};
pub use notify::{LogNotifier, Notifier};
pub use session::{SessionManager, SessionTokens};
