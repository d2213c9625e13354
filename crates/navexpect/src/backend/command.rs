//! Command lines with secret arguments.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// One argument of a [`CommandLine`].
#[derive(Clone, PartialEq, Eq)]
pub struct Arg {
    value: String,
    secret: bool,
}

impl Arg {
    /// A plain argument.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    /// An argument that must never be displayed or logged.
    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
        }
    }

    /// The raw value passed to the child.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this argument is secret.
    #[must_use]
    pub const fn is_secret(&self) -> bool {
        self.secret
    }
}

impl fmt::Display for Arg {
    /// Secret `--key=value` options keep their key; anything else secret is
    /// masked entirely.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.secret {
            return f.write_str(&self.value);
        }
        match self.value.split_once('=') {
            Some((key, _)) if key.starts_with('-') => write!(f, "{key}=***"),
            _ => f.write_str("***"),
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

/// A program and its arguments. No shell is involved.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<Arg>,
}

impl CommandLine {
    /// Start a command line for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a plain argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::plain(value));
        self
    }

    /// Append several plain arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Arg::plain));
        self
    }

    /// Append a secret argument.
    #[must_use]
    pub fn secret_arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::secret(value));
        self
    }

    /// The program to run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The program as displayed in errors and logs.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// The arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }

    /// Raw argument values, secrets included, as passed to the child.
    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(|a| OsStr::new(a.value()))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLine")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_redacts_secret_values() {
        let cmd = CommandLine::new("navencrypt")
            .arg("register")
            .arg("--server=keytrustee.example.com:11371")
            .secret_arg("--auth=s3cr3t")
            .arg("--skip-ssl-check");

        let shown = cmd.to_string();
        assert_eq!(
            shown,
            "navencrypt register --server=keytrustee.example.com:11371 --auth=*** --skip-ssl-check"
        );
        assert!(!format!("{cmd:?}").contains("s3cr3t"));
    }

    #[test]
    fn bare_secret_is_fully_masked() {
        let cmd = CommandLine::new("tool").secret_arg("hunter2");
        assert_eq!(cmd.to_string(), "tool ***");
    }

    #[test]
    fn argv_keeps_raw_values() {
        let cmd = CommandLine::new("navencrypt")
            .args(["acl", "--list"])
            .secret_arg("--auth=x");
        let argv: Vec<_> = cmd.argv().collect();
        assert_eq!(argv, ["acl", "--list", "--auth=x"]);
        assert!(cmd.arguments()[2].is_secret());
        assert_eq!(cmd.program(), Path::new("navencrypt"));
    }
}
