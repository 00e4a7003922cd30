//! Log output.
//!
//! `LOG_LEVEL` sets the default directive and `RUST_LOG` replaces it
//! entirely. `RUN_ENV=dev` prints human-readable lines; anything else
//! prints JSON.

use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

pub fn init() -> anyhow::Result<()> {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if is_dev(std::env::var("RUN_ENV").ok().as_deref()) {
        builder.pretty().try_init()
    } else {
        builder.json().with_current_span(true).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!(e))
}

fn is_dev(run_env: Option<&str>) -> bool {
    matches!(run_env, Some(env) if env.eq_ignore_ascii_case("dev"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dev_selects_pretty_output() {
        assert!(is_dev(Some("dev")));
        assert!(is_dev(Some("DEV")));
        assert!(!is_dev(Some("production")));
        assert!(!is_dev(None));
    }
}
