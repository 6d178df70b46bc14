//! Defines the command-line arguments shared by the daemon and its clients.
//!
//! Both binaries flatten [`ServiceArgs`] into their own `clap` parser so the
//! control socket address is spelled the same way everywhere. The flags are
//! optional so the daemon can tell an explicit flag apart from a default and
//! layer it over its settings file.

use crate::config::{ServiceConfig, DEFAULT_HOST, DEFAULT_PORT};
use clap::Args;

/// Address of the control socket.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceArgs {
    /// Host the control socket binds to (daemon) or connects to (clients) [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// Control socket port; 0 lets the daemon pick a free port [default: 4156]
    #[arg(short, long)]
    port: Option<u16>,
}

impl ServiceArgs {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Converts the parsed flags into a [`ServiceConfig`], defaults filled in.
    pub fn to_config(&self) -> ServiceConfig {
        ServiceConfig::new(self.host(), self.port())
    }

    /// Overrides the fields of `base` that were given on the command line.
    pub fn apply_to(&self, base: &ServiceConfig) -> ServiceConfig {
        ServiceConfig::new(
            self.host.as_deref().unwrap_or(base.host()),
            self.port.unwrap_or(base.port()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        service: ServiceArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.service.to_config(), ServiceConfig::default());
    }

    #[test]
    fn test_explicit_address() {
        let cli = TestCli::parse_from(["test", "--host", "0.0.0.0", "-p", "0"]);
        assert_eq!(cli.service.host(), "0.0.0.0");
        assert_eq!(cli.service.port(), 0);
    }

    #[test]
    fn test_apply_only_overrides_given_flags() {
        let cli = TestCli::parse_from(["test", "--port", "7000"]);
        let base = ServiceConfig::new("10.0.0.1", 4156);

        assert_eq!(cli.service.apply_to(&base), ServiceConfig::new("10.0.0.1", 7000));
    }
}
