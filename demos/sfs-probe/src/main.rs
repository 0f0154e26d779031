//! sfs-probe: log into an SFS2X zone and optionally fire one extension
//! request, printing the reply as JSON.
//!
//! ```text
//! sfs-probe <host> <port> <zone> <user> [--password PW] [--cmd NAME]
//!           [--params JSON] [--chunked] [--timeout SECS]
//! ```
//!
//! `RUST_LOG=foxwire_client=debug` shows the correlation engine at work.

use std::time::Duration;

use clap::Parser;
use foxwire::prelude::*;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "sfs-probe")]
#[command(about = "Log into an SFS2X zone and fire one extension request")]
struct Args {
    /// Server host name or address
    host: String,

    /// Server TCP port
    port: u16,

    /// Zone to log into
    zone: String,

    /// User name
    user: String,

    /// Login password
    #[arg(long, default_value = "")]
    password: String,

    /// Extension command to send after login
    #[arg(long = "cmd")]
    command: Option<String>,

    /// Request parameters as a JSON object
    #[arg(long, value_parser = parse_params, default_value = "{}")]
    params: SfsObject,

    /// Expect a reply split into `numChunks` parts
    #[arg(long)]
    chunked: bool,

    /// Seconds to wait for each reply
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl Args {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn parse_params(json: &str) -> Result<SfsObject, ProtocolError> {
    SfsObject::from_json_str(json)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    foxwire::init_tracing();

    let args = Args::parse();
    let config = ClientConfig::default().with_request_timeout(args.timeout());

    eprintln!("connecting to {}:{}", args.host, args.port);
    let client = foxwire::connect_with(&args.host, args.port, config).await?;
    if let Some(token) = &client.handshake().session_token {
        tracing::info!(token = %token, "handshake ok");
    }

    let reply = client
        .login(&args.zone, &args.user, &args.password, SfsObject::new())
        .await?;
    println!("{}", reply.to_json_string()?);

    if let Some(command) = &args.command {
        if args.chunked {
            for part in client.request_chunked(command, args.params.clone()).await? {
                println!("{}", part.params.to_json_string()?);
            }
        } else {
            let response = client.request(command, args.params.clone()).await?;
            println!("{}", response.params.to_json_string()?);
        }
    }

    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("sfs-probe").chain(line.split_whitespace()))
    }

    #[test]
    fn test_positional_and_defaults() {
        let args = parse("localhost 9933 BasicExamples bob").unwrap();
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 9933);
        assert_eq!(args.zone, "BasicExamples");
        assert_eq!(args.user, "bob");
        assert_eq!(args.password, "");
        assert_eq!(args.command, None);
        assert!(args.params.is_empty());
        assert!(!args.chunked);
        assert_eq!(args.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_flags() {
        let args = parse(r#"h 1 z u --cmd sum --params {"values":[1,2]} --chunked --timeout 3"#)
            .unwrap();
        assert_eq!(args.command.as_deref(), Some("sum"));
        assert_eq!(args.params.get_byte_array("values").unwrap(), &[1, 2]);
        assert!(args.chunked);
        assert_eq!(args.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_errors() {
        assert!(parse("h 1 z").is_err());
        assert!(parse("h notaport z u").is_err());
        assert!(parse("h 1 z u --cmd").is_err());
        assert!(parse("h 1 z u --bogus").is_err());
        assert!(parse("h 1 z u --params [1]").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
