//! Parameters accepted by the drivers.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ExpectError, Result};

/// A master passphrase.
///
/// The value is only ever sent to the tool as one line of input. It is never
/// displayed, and its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::InvalidArgument`] if the value contains a line
    /// break or NUL, which cannot be sent as a single line.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.contains(['\n', '\r', '\0']) {
            return Err(ExpectError::invalid_argument(
                "passphrase",
                "must be a single line without NUL bytes",
            ));
        }
        Ok(Self(value))
    }

    /// The raw passphrase.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

impl FromStr for Passphrase {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Key server registration details.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    /// Key Trustee Server host name or address.
    pub server: String,
    /// Key Trustee Server port.
    pub port: u16,
    /// Organization name on the key server.
    pub org: String,
    /// Organization auth secret. Passed as a secret argument.
    pub auth: String,
    /// Name for this client node.
    pub client_name: String,
}

impl Registration {
    /// Collect registration details.
    pub fn new(
        server: impl Into<String>,
        port: u16,
        org: impl Into<String>,
        auth: impl Into<String>,
        client_name: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            org: org.into(),
            auth: auth.into(),
            client_name: client_name.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_text("server", &self.server)?;
        check_text("org", &self.org)?;
        check_text("auth", &self.auth)?;
        check_text("client_name", &self.client_name)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("org", &self.org)
            .field("auth", &"***")
            .field("client_name", &self.client_name)
            .finish()
    }
}

/// Enforcement mode of the navencrypt access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Deny access not allowed by a rule.
    Enforcing,
    /// Log access not allowed by a rule, but permit it.
    Permissive,
}

impl Mode {
    /// The name the tool uses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enforcing => "enforcing",
            Self::Permissive => "permissive",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforcing" => Ok(Self::Enforcing),
            "permissive" => Ok(Self::Permissive),
            other => Err(ExpectError::invalid_argument(
                "mode",
                format!("'{other}' is neither enforcing nor permissive"),
            )),
        }
    }
}

/// Reject values that cannot be passed as one argument.
pub(crate) fn check_text(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExpectError::invalid_argument(name, "must not be empty"));
    }
    if value.contains('\0') {
        return Err(ExpectError::invalid_argument(name, "must not contain NUL bytes"));
    }
    Ok(())
}

/// A path as an argument string.
pub(crate) fn path_arg(name: &str, path: &Path) -> Result<String> {
    let text = path
        .to_str()
        .ok_or_else(|| ExpectError::invalid_argument(name, "path is not valid UTF-8"))?;
    check_text(name, text)?;
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_debug_is_redacted() {
        let passphrase = Passphrase::new("correct horse battery staple").unwrap();
        let shown = format!("{passphrase:?}");
        assert_eq!(shown, "Passphrase(***)");
        assert_eq!(passphrase.expose(), "correct horse battery staple");
    }

    #[test]
    fn passphrase_must_be_one_line() {
        assert!(Passphrase::new("two\nlines").is_err());
        assert!(Passphrase::new("carriage\rreturn").is_err());
        assert!(Passphrase::new("nul\0byte").is_err());
        assert!("short".parse::<Passphrase>().is_ok());
    }

    #[test]
    fn registration_debug_hides_auth() {
        let reg = Registration::new("kts.example.com", 11371, "acme", "s3cr3t-auth", "node01");
        let shown = format!("{reg:?}");
        assert!(!shown.contains("s3cr3t-auth"));
        assert!(shown.contains("node01"));
    }

    #[test]
    fn registration_rejects_empty_fields() {
        let reg = Registration::new("kts", 11371, "", "auth", "node");
        let err = reg.validate().unwrap_err();
        assert!(err.to_string().contains("org"));
    }

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!("Enforcing".parse::<Mode>().unwrap(), Mode::Enforcing);
        assert_eq!(" permissive ".parse::<Mode>().unwrap(), Mode::Permissive);
        assert!("audit".parse::<Mode>().is_err());
        assert_eq!(Mode::Permissive.to_string(), "permissive");
    }

    #[test]
    fn path_arg_checks() {
        assert_eq!(path_arg("mount", Path::new("/mnt/enc")).unwrap(), "/mnt/enc");
        assert!(path_arg("mount", Path::new("")).is_err());
    }
}
