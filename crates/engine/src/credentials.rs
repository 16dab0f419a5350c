//! Database credentials applied to new universes.

use std::fmt;

/// Password given to the YSQL and YCQL superusers when the caller supplies
/// none. Universes created with it should have their passwords rotated.
pub const DEFAULT_DATABASE_PASSWORD: &str = "Password#123";

/// YSQL and YCQL superuser passwords for a new universe.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub ysql_password: String,
    pub ycql_password: String,
}

impl DatabaseCredentials {
    /// Use the same password for both APIs.
    pub fn shared(password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            ysql_password: password.clone(),
            ycql_password: password,
        }
    }

    pub fn is_default(&self) -> bool {
        self.ysql_password == DEFAULT_DATABASE_PASSWORD || self.ycql_password == DEFAULT_DATABASE_PASSWORD
    }
}

impl Default for DatabaseCredentials {
    fn default() -> Self {
        Self::shared(DEFAULT_DATABASE_PASSWORD)
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("ysql_password", &"<redacted>")
            .field("ycql_password", &"<redacted>")
            .finish()
    }
}
