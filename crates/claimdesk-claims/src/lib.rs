mod accounts;
pub mod screening;
mod service;

pub use screening::{ScreenedReceipt, screen_uploads};
pub use service::ClaimService;
