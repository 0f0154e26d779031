//! # foxwire
//!
//! Async client for the SFS2X binary game-server protocol.
//!
//! foxwire speaks the tagged binary format SFS2X servers use: it builds
//! typed objects, frames them, performs the handshake and login, and
//! correlates extension replies with the requests that asked for them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use foxwire::prelude::*;
//!
//! # async fn run() -> Result<(), FoxwireError> {
//! foxwire::init_tracing();
//!
//! let client = foxwire::connect("127.0.0.1", 9933).await?;
//! client.login("BasicExamples", "bob", "", SfsObject::new()).await?;
//!
//! let mut params = SfsObject::new();
//! params.put_int("n1", 26).put_int("n2", 16);
//! let reply = client.request("math", params).await?;
//! println!("sum = {}", reply.params.get_int("res")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | module        | crate               |
//! |---------------|---------------------|
//! | [`transport`] | `foxwire-transport` |
//! | [`protocol`]  | `foxwire-protocol`  |
//! | [`client`]    | `foxwire-client`    |

mod error;

pub use error::FoxwireError;
pub use foxwire_client as client;
pub use foxwire_protocol as protocol;
pub use foxwire_transport as transport;

use foxwire_client::{ClientConfig, SfsClient};
use foxwire_transport::TcpConnection;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Everything needed for typical client code.
pub mod prelude {
    pub use crate::FoxwireError;
    pub use foxwire_client::{
        ClientConfig, ClientError, HandshakeInfo, InboundMessage, Interest, SessionState,
        SfsClient,
    };
    pub use foxwire_protocol::{
        ExtensionResponse, ProtocolError, Request, SfsArray, SfsObject, TypeTag, Value,
    };
    pub use foxwire_transport::{Connection, StreamConnection, TcpConnection};
}

/// Connects over TCP with the default configuration and performs the
/// handshake.
pub async fn connect(host: &str, port: u16) -> Result<SfsClient<TcpConnection>, FoxwireError> {
    connect_with(host, port, ClientConfig::default()).await
}

/// Connects over TCP with an explicit configuration.
pub async fn connect_with(
    host: &str,
    port: u16,
    config: ClientConfig,
) -> Result<SfsClient<TcpConnection>, FoxwireError> {
    Ok(SfsClient::connect(host, port, config).await?)
}

/// Installs a `tracing` subscriber that logs to stderr.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Does nothing
/// if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
