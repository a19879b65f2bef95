//! Command line interface for the `openwire` probe binary.

use std::net::SocketAddr;

use clap::Parser;

/// Connects to an OpenWire broker and reports the negotiated wire format.
#[derive(Debug, Parser)]
#[command(name = "openwire", version, about = "Probe an OpenWire broker")]
pub struct Cli {
    /// Broker URI, e.g. `tcp://localhost:61616?wireFormat.tightEncodingEnabled=true`.
    #[arg(default_value = "tcp://localhost:61616")]
    pub uri: String,

    /// Register a connection with the broker and time its response.
    #[arg(long)]
    pub register: bool,

    /// Serve Prometheus metrics on this address while connected.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn uri_defaults_to_local_broker() {
        let cli = Cli::parse_from(["openwire"]);
        assert_eq!(cli.uri, "tcp://localhost:61616");
        assert!(!cli.register);
        assert!(cli.metrics_addr.is_none());
    }

    #[test]
    fn parses_uri_and_flags() {
        let cli = Cli::parse_from([
            "openwire",
            "tcp://broker:61617",
            "--register",
            "--metrics-addr",
            "127.0.0.1:9000",
        ]);
        assert_eq!(cli.uri, "tcp://broker:61617");
        assert!(cli.register);
        assert_eq!(
            cli.metrics_addr.map(|a| a.port()),
            Some(9000)
        );
    }
}
