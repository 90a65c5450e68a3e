pub mod principal;
pub mod signature;

pub use principal::{ApprovalStatus, Principal, Role};
pub use signature::VerifiedWebhook;
