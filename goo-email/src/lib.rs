//! Email addresses, templated newsletter emails and SMTP delivery.

mod address;
mod emailer;
mod error;
mod templates;

pub use address::{Email, InvalidEmail};
pub use emailer::{
    confirmation_email, welcome_email, Emailer, EmailerConfig, SenderConfig, DEFAULT_SMTP_PORT,
};
pub use error::EmailError;
pub use templates::{render_template, EmailContent};
