use crate::error::Result;
use crate::timeouts::Timeouts;
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4156;

/// Prefix of the environment variables overriding settings.
pub const ENV_PREFIX: &str = "FORKING";

/// Bind address of the control socket. Port 0 picks any free port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    host: String,
    port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl ServiceConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<SocketAddr> for ServiceConfig {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Which payload a forked worker runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkerSettings {
    /// Read one line, acknowledge with `ok\x01<n>`.
    #[default]
    Echo,
    /// Replace the child with `program args... <n>`.
    Exec {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default = "std::env::temp_dir")]
    pub child_root: PathBuf,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    #[serde(default)]
    pub worker: WorkerSettings,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            timeouts: Timeouts::default(),
            child_root: std::env::temp_dir(),
            pid_file: None,
            worker: WorkerSettings::default(),
        }
    }
}

impl DaemonSettings {
    /// Loads settings from defaults, an optional TOML file and `FORKING_*`
    /// environment variables, in increasing precedence.
    ///
    /// # Arguments
    ///
    /// * `file` - Optional settings file. A missing file is an error when given explicitly.
    ///
    /// # Returns
    ///
    /// * `Ok(DaemonSettings)` with every layer applied.
    /// * `Err(ServiceError::Settings)` on unreadable or ill-typed input.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, environment())
    }

    fn load_with_env(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }
}

/// `FORKING_<SECTION>__<KEY>`, e.g. `FORKING_SERVICE__PORT`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        environment().source(Some(vars))
    }

    fn no_env() -> Environment {
        env_with(&[])
    }

    #[test]
    fn test_defaults_without_layers() {
        let settings = DaemonSettings::load_with_env(None, no_env()).unwrap();
        assert_eq!(settings, DaemonSettings::default());
        assert_eq!(settings.service.address(), "127.0.0.1:4156");
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
child_root = "/var/tmp/forking"

[service]
host = "0.0.0.0"
port = 0

[timeouts]
socket_timeout = 0.25
wait_for_children = 10

[worker]
kind = "exec"
program = "/usr/bin/cat"
"#
        )
        .unwrap();

        let settings = DaemonSettings::load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.service, ServiceConfig::new("0.0.0.0", 0));
        assert_eq!(settings.child_root, PathBuf::from("/var/tmp/forking"));
        assert_eq!(settings.timeouts.socket_timeout(), Duration::from_millis(250));
        assert_eq!(settings.timeouts.wait_for_children(), Duration::from_secs(10));
        assert_eq!(
            settings.timeouts.sleep_for_children(),
            crate::timeouts::SLEEP_FOR_CHILDREN_TIMEOUT
        );
        assert_eq!(
            settings.worker,
            WorkerSettings::Exec {
                program: PathBuf::from("/usr/bin/cat"),
                args: Vec::new(),
            }
        );
    }

    #[test]
    fn test_env_layer_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[service]\nhost = \"localhost\"\nport = 9000").unwrap();

        let env = env_with(&[("FORKING_SERVICE__PORT", "9100")]);

        let settings = DaemonSettings::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(settings.service.host(), "localhost");
        assert_eq!(settings.service.port(), 9100);
    }

    #[test]
    fn test_env_alone_sets_a_single_field() {
        let env = env_with(&[
            ("FORKING_SERVICE__PORT", "0"),
            ("FORKING_TIMEOUTS__WAIT_FOR_CHILDREN", "2.5"),
        ]);

        let settings = DaemonSettings::load_with_env(None, env).unwrap();
        assert_eq!(settings.service, ServiceConfig::new(DEFAULT_HOST, 0));
        assert_eq!(
            settings.timeouts.wait_for_children(),
            Duration::from_millis(2500)
        );
        assert_eq!(settings.worker, WorkerSettings::Echo);
    }

    #[test]
    fn test_partial_service_section_in_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[service]\nport = 0").unwrap();

        let settings = DaemonSettings::load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.service, ServiceConfig::new(DEFAULT_HOST, 0));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = Path::new("/nonexistent/forking.toml");
        let result = DaemonSettings::load_with_env(Some(missing), no_env());
        assert!(result.is_err());
    }
}
