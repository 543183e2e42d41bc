pub mod auth;
pub mod client;
pub mod messages;
pub mod target;

pub use auth::issue_token;
pub use client::{TranslatorClient, TranslatorStream};
pub use messages::TranslationResult;
pub use target::{output_extension, TranslationTarget};
