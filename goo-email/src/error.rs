use thiserror::Error;

/// Errors that may occur while composing or sending an email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email template {0} not found")]
    TemplateMissing(String),

    #[error("email template {0} is not valid utf-8")]
    TemplateEncoding(String),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("could not send email: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}
