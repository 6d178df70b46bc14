use crate::error::Result;

/// Installs `env_logger` as the global logger.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
///
/// # Returns
///
/// * `Err(ServiceError::Logger)` if a logger was already installed.
pub fn init(default_filter: &str) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init()?;
    Ok(())
}
