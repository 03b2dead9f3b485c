pub mod signature;

pub use signature::{generate_webhook_signature, verify_webhook_signature};
