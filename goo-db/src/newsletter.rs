use goo_email::Email;
use rand::RngCore;
use serde::Serialize;

use crate::database::Database;
use crate::error::DbError;

#[cfg(feature = "postgres")]
macro_rules! now {
    () => {
        "now()"
    };
}
#[cfg(feature = "sqlite")]
macro_rules! now {
    () => {
        "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')"
    };
}

/// A newsletter signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Subscriber {
    pub email: String,
    pub token: String,
    pub confirmed: bool,
}

/// 64 hex characters from 32 random bytes.
pub fn create_secret() -> String {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    hex::encode(secret)
}

impl Database {
    /// Store a signup and return its confirmation token.
    ///
    /// Signing up again replaces the token and resets the confirmation.
    pub async fn signup_for_newsletter(&self, email: &Email) -> Result<String, DbError> {
        let token = create_secret();
        sqlx::query(concat!(
            "insert into newsletter_subscribers (email, token) values ($1, $2) ",
            "on conflict (email) do update set token = excluded.token, confirmed = false, updated = ",
            now!()
        ))
        .bind(email.as_str())
        .bind(&token)
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    /// Confirm the signup owning `token`; `None` if no signup has it.
    pub async fn confirm_newsletter_signup(&self, token: &str) -> Result<Option<Email>, DbError> {
        let email: Option<String> = sqlx::query_scalar(concat!(
            "update newsletter_subscribers set confirmed = true, updated = ",
            now!(),
            " where token = $1 returning email"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(email.map(Email::new))
    }

    pub async fn get_subscriber(&self, email: &Email) -> Result<Option<Subscriber>, DbError> {
        let subscriber = sqlx::query_as::<_, Subscriber>(
            "select email, token, confirmed from newsletter_subscribers where email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_64_hex_chars_and_unique() {
        let a = create_secret();
        let b = create_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
