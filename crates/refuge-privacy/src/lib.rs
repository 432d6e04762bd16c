pub mod anonymize;
pub mod audit;
pub mod enforce;
pub mod hash;
pub mod report;

pub use anonymize::{AnonymizeOptions, Anonymizer};
pub use audit::{AuditEvent, AuditRecorder};
