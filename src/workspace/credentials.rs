//! Administrative credential for the control API.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// User name the control API authenticates as.
pub const ADMIN_USER: &str = "haproxy";

/// Userlist section the credential is declared in.
pub const ADMIN_USERLIST: &str = "controller";

/// Raw entropy in the generated password.
pub const PASSWORD_BYTES: usize = 32;

/// User/password pair shared between the proxy and its control API.
///
/// Generated once per workspace. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    user: &'static str,
    password: String,
}

impl Credentials {
    /// Generate a fresh credential from the OS random source.
    pub fn generate() -> Self {
        let mut raw = [0u8; PASSWORD_BYTES];
        OsRng.fill_bytes(&mut raw);
        Self {
            user: ADMIN_USER,
            password: URL_SAFE.encode(raw),
        }
    }

    pub fn user(&self) -> &str {
        self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_decodes_to_full_entropy() {
        let creds = Credentials::generate();
        let raw = URL_SAFE.decode(creds.password()).unwrap();
        assert_eq!(raw.len(), PASSWORD_BYTES);
        assert_eq!(creds.user(), ADMIN_USER);
    }

    #[test]
    fn passwords_are_not_reused() {
        assert_ne!(Credentials::generate().password(), Credentials::generate().password());
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::generate();
        let shown = format!("{creds:?}");
        assert!(!shown.contains(creds.password()));
        assert!(shown.contains("<redacted>"));
    }
}
