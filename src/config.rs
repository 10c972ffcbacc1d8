//! Configuration and CLI argument handling

use std::time::Duration;
use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "surge-timer")]
#[command(about = "A focus/break countdown daemon that survives host suspension")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20525")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Interval between countdown ticks in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Interval between host suspension checks in seconds
    #[arg(long, default_value = "5")]
    pub resync_secs: u64,

    /// URL a notification click opens when no window is attached
    /// [default: http://<host>:<port>/]
    #[arg(long)]
    pub app_url: Option<String>,

    /// Raw PCM player used for the alert and keepalive streams
    #[arg(long, default_value = "aplay")]
    pub audio_player: String,

    /// Command that holds the wake-lock while it runs
    #[arg(long, default_value = "systemd-inhibit")]
    pub inhibit_command: String,

    /// Command used to open a new application window
    #[arg(long, default_value = "xdg-open")]
    pub open_command: String,

    /// Disable the alert and keepalive audio
    #[arg(long)]
    pub no_audio: bool,

    /// Never show desktop notifications
    #[arg(long)]
    pub no_notifications: bool,

    /// Do not hold a wake-lock while running
    #[arg(long)]
    pub no_wake_lock: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Scope of the application's windows
    pub fn app_url(&self) -> String {
        self.app_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/", self.address()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs.max(1))
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["surge-timer"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20525");
        assert_eq!(config.app_url(), "http://127.0.0.1:20525/");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.log_level(), "info");
        assert!(!config.no_audio);
    }

    #[test]
    fn overrides() {
        let config = Config::try_parse_from([
            "surge-timer",
            "--port",
            "8080",
            "--tick-ms",
            "0",
            "--app-url",
            "http://localhost:3000/",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert_eq!(config.app_url(), "http://localhost:3000/");
        assert_eq!(config.log_level(), "debug");
    }
}
