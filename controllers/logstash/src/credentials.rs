//! Credentials for the operator-managed Secret

use crds::Logstash;
use k8s_openapi::api::core::v1::Secret;

/// Username written by [`RandomCredentials`]
pub const DEFAULT_USERNAME: &str = "logstash";
/// Secret key holding the username
pub const USERNAME_KEY: &str = "username";
/// Secret key holding the password
pub const PASSWORD_KEY: &str = "password";

/// A username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name
    pub username: String,
    /// Secret value, never logged
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Strategy for minting credentials when none exist yet
pub trait CredentialSource: Send + Sync {
    /// New credentials for `instance`
    fn generate(&self, instance: &Logstash) -> Credentials;
}

/// Fixed username with a random v4 UUID as password
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCredentials;

impl CredentialSource for RandomCredentials {
    fn generate(&self, _instance: &Logstash) -> Credentials {
        Credentials {
            username: DEFAULT_USERNAME.to_string(),
            password: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Credentials stored in `secret`, if both keys are present and non-empty
pub fn read_credentials(secret: &Secret) -> Option<Credentials> {
    let data = secret.data.as_ref()?;
    let field = |key: &str| {
        data.get(key)
            .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
            .filter(|value| !value.is_empty())
    };
    Some(Credentials {
        username: field(USERNAME_KEY)?,
        password: field(PASSWORD_KEY)?,
    })
}

/// Keeps already-set credentials, otherwise asks `source` for new ones
pub fn preserve_or_generate(
    existing: Option<&Secret>,
    source: &dyn CredentialSource,
    instance: &Logstash,
) -> Credentials {
    existing
        .and_then(read_credentials)
        .unwrap_or_else(|| source.generate(instance))
}
