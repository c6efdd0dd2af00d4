//! Azure CLI command construction.
//!
//! Commands are kept as an argument vector and handed to the process without a
//! shell, so values such as JSON settings payloads need no escaping. The
//! [`Display`](std::fmt::Display) form is the space-joined fragment as it
//! would be typed after `az`, used for logging and by [`crate::MockAz`] for
//! matching.

use std::fmt;

/// An `az` command fragment, e.g. `vm extension list --vm-name worker-1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AzCommand {
    args: Vec<String>,
}

impl AzCommand {
    /// Start a command from its leading words (`["vm", "start"]`).
    #[must_use]
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a bare argument or switch.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a `--name value` pair.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(name.into());
        self.args.push(value.into());
        self
    }

    /// Append a `--name value` pair only when a value is present.
    #[must_use]
    pub fn flag_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.flag(name, value),
            None => self,
        }
    }

    /// The argument vector.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns true if the given switch or flag name appears in the command.
    #[must_use]
    pub fn has_arg(&self, name: &str) -> bool {
        self.args.iter().any(|a| a == name)
    }
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '{' | '}' | '$' | '&' | '|'))
}

impl fmt::Display for AzCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if needs_quoting(arg) {
                write!(f, "'{}'", arg.replace('\'', r"'\''"))?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_fragment() {
        let cmd = AzCommand::new(["vm", "extension", "list"])
            .flag("--resource-group", "rg")
            .flag("--vm-name", "vm-1");
        assert_eq!(cmd.to_string(), "vm extension list --resource-group rg --vm-name vm-1");
    }

    #[test]
    fn quotes_json_payloads() {
        let cmd = AzCommand::new(["vm", "extension", "set"]).flag("--settings", r#"{"a":1}"#);
        assert_eq!(cmd.to_string(), r#"vm extension set --settings '{"a":1}'"#);
        assert_eq!(cmd.args()[4], r#"{"a":1}"#);
    }

    #[test]
    fn optional_flag_skipped_when_absent() {
        let cmd = AzCommand::new(["account", "show"]).flag_opt("--subscription", None::<String>);
        assert_eq!(cmd.to_string(), "account show");
        let cmd = cmd.flag_opt("--subscription", Some("s1"));
        assert!(cmd.has_arg("--subscription"));
        assert_eq!(cmd.to_string(), "account show --subscription s1");
    }
}
