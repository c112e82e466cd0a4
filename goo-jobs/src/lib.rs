//! Concrete job handlers for the Goo newsletter service.
//!
//! # Job Types
//!
//! - `confirmation_email` - Send the double opt-in link after a signup
//! - `welcome_email` - Greet a subscriber after they confirmed
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use goo_email::{Emailer, EmailerConfig, SenderConfig};
//! use goo_job_queue::HandlerRegistry;
//!
//! # fn main() -> Result<(), goo_email::EmailError> {
//! let config = EmailerConfig {
//!     transactional: SenderConfig {
//!         email_address: "hello@example.com".to_string(),
//!         email_name: "Goo".to_string(),
//!         ..SenderConfig::default()
//!     },
//!     marketing: SenderConfig {
//!         email_address: "news@example.com".to_string(),
//!         email_name: "Goo".to_string(),
//!         ..SenderConfig::default()
//!     },
//!     ..EmailerConfig::default()
//! };
//! let emailer = Arc::new(Emailer::new(config)?);
//! let mut registry = HandlerRegistry::new();
//! goo_jobs::register_all(&mut registry, emailer);
//! # Ok(())
//! # }
//! ```

mod email;
mod sender;

use std::sync::Arc;

use goo_job_queue::HandlerRegistry;

pub use email::{ConfirmationEmailJob, WelcomeEmailJob};
pub use sender::{ConfirmationEmailSender, WelcomeEmailSender};

/// Job type constants for type-safe job references.
pub mod job_types {
    pub const CONFIRMATION_EMAIL: &str = "confirmation_email";
    pub const WELCOME_EMAIL: &str = "welcome_email";
}

pub use job_types::{CONFIRMATION_EMAIL, WELCOME_EMAIL};

/// Register all job handlers with the registry.
pub fn register_all<S>(registry: &mut HandlerRegistry, sender: Arc<S>)
where
    S: ConfirmationEmailSender + WelcomeEmailSender + 'static,
{
    registry.register_handler(CONFIRMATION_EMAIL, ConfirmationEmailJob::new(sender.clone()));
    registry.register_handler(WELCOME_EMAIL, WelcomeEmailJob::new(sender));
}
