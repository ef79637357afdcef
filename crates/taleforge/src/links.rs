//! Email link composition.
//!
//! The core hands out tokens; delivering them is the caller's job. These
//! helpers turn a token into the link and message text a mail provider
//! needs, so every deployment words the emails the same way.

use std::time::Duration;

/// A ready-to-send link with its subject line and plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailLink {
    pub url: String,
    pub subject: String,
    pub body: String,
}

impl EmailLink {
    /// The account activation link for a registration token.
    pub fn activation(base_url: &str, token: &str, ttl: Duration) -> Self {
        let url = join(base_url, "activate", token);
        let body = format!(
            "Welcome to Taleforge!\n\n\
             Please click the following link to activate your account:\n\
             {url}\n\n\
             Note: This activation link will expire in {} minutes.\n\n\
             If you didn't request this registration, please ignore this email.",
            ttl.as_secs() / 60
        );
        Self {
            url,
            subject: "Activate your Taleforge account".to_owned(),
            body,
        }
    }

    /// The password reset link for a reset token.
    pub fn reset(base_url: &str, token: &str, ttl: Duration) -> Self {
        let url = join(base_url, "reset-password", token);
        let body = format!(
            "We received a request to reset your Taleforge password. \
             To proceed, please click the following link:\n\
             {url}\n\n\
             Note: This reset link will expire in {} minutes.\n\n\
             If you didn't request this password reset, please ignore this email.",
            ttl.as_secs() / 60
        );
        Self {
            url,
            subject: "Reset your Taleforge password".to_owned(),
            body,
        }
    }
}

fn join(base_url: &str, path: &str, token: &str) -> String {
    format!("{}/{path}/{token}", base_url.trim_end_matches('/'))
}
