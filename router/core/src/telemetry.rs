//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_directive` is used
/// (e.g. `"router_core=info"`). Calling this again after a subscriber is
/// installed is a no-op.
///
/// # Errors
///
/// Returns an error if `default_directive` is not a valid filter.
pub fn init(default_directive: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init("router_core=debug").is_ok());
        assert!(init("router_core=debug").is_ok());
    }

    #[test]
    fn test_invalid_directive_rejected() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(init("router_core=verbose").is_err());
        }
    }
}
