use std::path::PathBuf;

use clap::Parser;
use iris_core::IrisConfig;

/// Command-line arguments for `iris-server`.
///
/// Everything else lives in the TOML configuration and its `ONEIMAGE__*`
/// environment overrides.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "iris-server",
    version,
    about = "Image ingestion gateway: validate, identify and store uploads"
)]
pub struct CliArgs {
    /// Configuration file.
    ///
    /// When unset, `config.toml`, `config/config.toml` and `/app/config.toml`
    /// are tried in that order.
    ///
    /// Environment variable: `IRIS_CONFIG`
    #[arg(short, long, env = "IRIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding `server.host` and `server.port`.
    ///
    /// Example: "127.0.0.1:8080"
    ///
    /// Environment variable: `IRIS_LISTEN`
    #[arg(long, env = "IRIS_LISTEN")]
    pub listen: Option<String>,
}

impl CliArgs {
    pub fn listen_addr(&self, config: &IrisConfig) -> String {
        match &self.listen {
            Some(addr) => addr.clone(),
            None => format!("{}:{}", config.server.host, config.server.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_flag_wins_over_config() {
        let config = IrisConfig::default();

        let args = CliArgs::try_parse_from(["iris-server"]).unwrap();
        assert_eq!(args.listen_addr(&config), "0.0.0.0:8080");

        let args =
            CliArgs::try_parse_from(["iris-server", "--listen", "127.0.0.1:9000", "-c", "x.toml"])
                .unwrap();
        assert_eq!(args.listen_addr(&config), "127.0.0.1:9000");
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }
}
