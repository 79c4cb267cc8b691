use serde::{Deserialize, Serialize};

pub const USER_ID_ENV: &str = "GEMTYPE_USER_ID";
pub const TOKEN_ENV: &str = "GEMTYPE_TOKEN";

/// The signed-in user results are saved for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Bearer token presented to a remote persistence endpoint
    #[serde(default)]
    pub token: Option<String>,
}

/// Answers "who is signed in right now", if anyone
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;
}

/// Identity from the config file, overridable through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    identity: Option<Identity>,
}

impl ConfiguredIdentity {
    pub fn new(account: Option<Identity>) -> Self {
        Self { identity: account }
    }

    /// Apply `GEMTYPE_USER_ID` / `GEMTYPE_TOKEN` on top of the configured account
    pub fn from_env(account: Option<Identity>) -> Self {
        Self::with_overrides(
            account,
            std::env::var(USER_ID_ENV).ok(),
            std::env::var(TOKEN_ENV).ok(),
        )
    }

    fn with_overrides(
        account: Option<Identity>,
        user_id: Option<String>,
        token: Option<String>,
    ) -> Self {
        let user_id = user_id.filter(|s| !s.trim().is_empty());
        let token = token.filter(|s| !s.trim().is_empty());

        let identity = match (account, user_id) {
            (Some(mut id), Some(uid)) => {
                id.user_id = uid;
                Some(id)
            }
            (Some(id), None) => Some(id),
            (None, Some(uid)) => Some(Identity {
                user_id: uid,
                email: None,
                token: None,
            }),
            (None, None) => None,
        }
        .filter(|id| !id.user_id.trim().is_empty())
        .map(|mut id| {
            if token.is_some() {
                id.token = token;
            }
            id
        });

        Self { identity }
    }
}

impl IdentityProvider for ConfiguredIdentity {
    fn current(&self) -> Option<Identity> {
        self.identity.clone()
    }
}
