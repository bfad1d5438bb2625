//! Command-line argument parsing for the parley client
//!
//! Uses clap for argument parsing with derive macros. Flags left unset fall
//! back to the config file.

use clap::Parser;

use crate::config::ClientConfig;

/// parley - line-oriented chat client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server host
    #[arg(long, short = 'H', env = "PARLEY_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = "PARLEY_PORT")]
    pub port: Option<u16>,

    /// Server address (host:port) or a remote name from the config file
    ///
    /// Overrides --host and --port if provided.
    #[arg(long, env = "PARLEY_ADDR")]
    pub addr: Option<String>,

    /// Transport to use: tcp or udp
    #[arg(long, short = 't', conflicts_with = "udp")]
    pub transport: Option<String>,

    /// Shorthand for --transport udp
    #[arg(long, default_value_t = false)]
    pub udp: bool,

    /// Seconds to wait for each reply
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Log in as this user after connecting
    #[arg(long, short = 'u', env = "PARLEY_USER")]
    pub user: Option<String>,

    /// Debug logging, copied to stderr as well as the log file
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Fold these flags over the config file values
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.udp {
            config.transport = "udp".into();
        } else if let Some(transport) = &self.transport {
            config.transport = transport.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(user) = &self.user {
            config.username = Some(user.clone());
        }
        config
    }

    /// Address to connect to, resolving remote names through the config
    pub fn address(&self, config: &ClientConfig) -> String {
        match &self.addr {
            Some(addr) => config
                .resolve_remote(addr)
                .map(str::to_string)
                .unwrap_or_else(|| addr.clone()),
            None => config.address(),
        }
    }
}
