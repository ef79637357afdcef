//! Identity configuration: token lifetimes and retry budgets.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::RetryPolicy;

// ---------------------------------------------------------------------------
// IdentityConfig
// ---------------------------------------------------------------------------

/// Configuration for the identity layer.
///
/// Controls how long issued tokens stay valid and how often an insert may
/// be retried after colliding on a generated identifier. Sensible defaults
/// are provided; override only the fields you care about:
///
/// ```
/// use std::time::Duration;
/// use taleforge_identity::IdentityConfig;
///
/// let config = IdentityConfig {
///     access_token_ttl: Duration::from_secs(3600),
///     ..IdentityConfig::default()
/// };
/// assert_eq!(config.email_token_ttl, Duration::from_secs(60 * 60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// How long a registration or password-reset link stays usable.
    ///
    /// Default: 60 minutes, matching the wording of the outgoing emails.
    pub email_token_ttl: Duration,

    /// How long an access token stays valid after issuance.
    ///
    /// Default: 24 hours.
    pub access_token_ttl: Duration,

    /// Attempts allowed when a generated user id collides.
    ///
    /// Default: 3.
    pub user_id_retry: RetryPolicy,

    /// Attempts allowed when an email-token insert collides. A repeat
    /// registration always collides once on the email column and needs
    /// the second attempt to replace the stale link.
    ///
    /// Default: 2.
    pub email_token_retry: RetryPolicy,

    /// Attempts allowed when an access-token insert collides.
    ///
    /// Default: 2.
    pub access_token_retry: RetryPolicy,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            email_token_ttl: Duration::from_secs(60 * 60),
            access_token_ttl: Duration::from_secs(24 * 60 * 60),
            user_id_retry: RetryPolicy::attempts(3),
            email_token_retry: RetryPolicy::attempts(2),
            access_token_retry: RetryPolicy::attempts(2),
        }
    }
}

impl IdentityConfig {
    /// [`email_token_ttl`](Self::email_token_ttl) as a calendar delta.
    pub(crate) fn email_token_delta(&self) -> TimeDelta {
        to_delta(self.email_token_ttl)
    }

    /// [`access_token_ttl`](Self::access_token_ttl) as a calendar delta.
    pub(crate) fn access_token_delta(&self) -> TimeDelta {
        to_delta(self.access_token_ttl)
    }
}

/// Saturates instead of failing: a TTL beyond chrono's range means "never".
fn to_delta(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}
