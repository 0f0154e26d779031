//! The session client.

use std::sync::Arc;
use std::time::Duration;

use foxwire_protocol::envelope::{ACTION_HANDSHAKE, ACTION_LOGIN};
use foxwire_protocol::{
    Envelope, ExtensionResponse, ProtocolError, Request, SfsObject, Value, decompile_packet,
};
use foxwire_transport::{Connection, ConnectionId, TcpConnection};
use tokio::sync::watch;

use crate::dispatcher::{self, DispatcherHandle, Interest, PendingResponse, ResponseStream, Tasks};
use crate::reader::{FrameReader, Liveness, ReadEvent};
use crate::{ClientConfig, ClientError, HandshakeInfo, SessionState};

const CHUNK_PREALLOC: usize = 16;

/// A connected SFS2X session.
///
/// All methods take `&self`; wrap the client in an `Arc` to send from
/// one task while waiting in another. Dropping the client stops its
/// background tasks.
pub struct SfsClient<C: Connection> {
    conn: Arc<C>,
    config: ClientConfig,
    dispatcher: DispatcherHandle,
    state: Arc<watch::Sender<SessionState>>,
    handshake: HandshakeInfo,
    tasks: Tasks,
}

impl SfsClient<TcpConnection> {
    /// Opens a TCP connection and performs the handshake.
    pub async fn connect(host: &str, port: u16, config: ClientConfig) -> Result<Self, ClientError> {
        let conn = TcpConnection::connect(host, port).await?;
        Self::handshake_over(conn, config).await
    }
}

impl<C: Connection> SfsClient<C> {
    /// Performs the handshake over an established connection.
    ///
    /// Sends `{api, cl, bin}` and blocks for the first frame, which must
    /// be a system handshake reply. Only then are the reader and
    /// dispatcher started.
    pub async fn handshake_over(conn: C, config: ClientConfig) -> Result<Self, ClientError> {
        let conn = Arc::new(conn);
        let conn_id = conn.id();
        let (state, _) = watch::channel(SessionState::Connected);
        let state = Arc::new(state);

        let packet = Request::Handshake {
            api_version: config.api_version.clone(),
            client_type: config.client_type.clone(),
            binary: true,
        }
        .compile()?;
        conn.send(&packet).await?;
        tracing::debug!(%conn_id, api = %config.api_version, "handshake sent");

        let mut reader = FrameReader::new(Arc::clone(&conn), &config);
        let mut liveness = Liveness::new(config.liveness_threshold);
        let body = loop {
            let event = match reader.next_event().await {
                Ok(event) => event,
                Err(e) => {
                    let _ = conn.close().await;
                    return Err(e);
                }
            };
            match event {
                ReadEvent::Frame(body) => break body,
                ReadEvent::Empty | ReadEvent::Malformed(_) => {
                    if liveness.record_empty() {
                        tracing::warn!(%conn_id, "no handshake reply, closing connection");
                        let _ = conn.close().await;
                        return Err(ClientError::ConnectionClosed);
                    }
                }
            }
        };
        liveness.record_activity();

        let envelope = match decompile_packet(&body, config.decode_options())
            .and_then(Envelope::from_object)
        {
            Ok(envelope) => envelope,
            Err(e) => {
                let _ = conn.close().await;
                return Err(ClientError::Handshake(format!("undecodable reply: {e}")));
            }
        };
        if !envelope.is_system() || envelope.action != ACTION_HANDSHAKE {
            let _ = conn.close().await;
            return Err(ClientError::Handshake(format!(
                "expected handshake reply, got controller {} action {}",
                envelope.controller, envelope.action
            )));
        }

        let handshake = HandshakeInfo::from_payload(&envelope.payload);
        state.send_replace(SessionState::Handshaken);
        tracing::info!(
            %conn_id,
            token = handshake.session_token.is_some(),
            "handshake complete"
        );

        let (dispatcher, tasks) = dispatcher::spawn(
            reader,
            liveness,
            config.decode_options(),
            config.event_buffer,
            Arc::clone(&state),
        );

        Ok(Self {
            conn,
            config,
            dispatcher,
            state,
            handshake,
            tasks,
        })
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn handshake(&self) -> &HandshakeInfo {
        &self.handshake
    }

    pub fn session_state(&self) -> SessionState {
        *self.state.borrow()
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Logs into a zone and waits for the server's verdict.
    ///
    /// Returns the reply payload on success. A reply carrying an `ec`
    /// error code is `LoginRejected`.
    pub async fn login(
        &self,
        zone: &str,
        username: &str,
        password: &str,
        params: SfsObject,
    ) -> Result<SfsObject, ClientError> {
        let pending = self.subscribe(Interest::System { action: ACTION_LOGIN }).await?;
        self.send_login_request(zone, username, password, params).await?;
        let reply = pending.wait(self.config.request_timeout).await?;

        let payload = reply.envelope.payload;
        if let Some(code) = payload.get("ec").and_then(Value::as_integer) {
            let params = payload
                .get_utf_string_array("ep")
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            tracing::warn!(conn_id = %self.conn.id(), zone, username, code, "login rejected");
            return Err(ClientError::LoginRejected { code, params });
        }

        self.state.send_if_modified(|state| {
            let open = state.is_open();
            if open {
                *state = SessionState::Authenticated;
            }
            open
        });
        tracing::info!(conn_id = %self.conn.id(), zone, username, "logged in");
        Ok(payload)
    }

    /// Sends a login request without waiting for the reply.
    pub async fn send_login_request(
        &self,
        zone: &str,
        username: &str,
        password: &str,
        params: SfsObject,
    ) -> Result<(), ClientError> {
        self.send(Request::login(zone, username, password, params)).await
    }

    // -----------------------------------------------------------------------
    // Extension traffic
    // -----------------------------------------------------------------------

    /// Sends an extension request without waiting for a reply.
    pub async fn send_extension_request(
        &self,
        command: &str,
        room_id: Option<i32>,
        params: SfsObject,
    ) -> Result<(), ClientError> {
        self.send(Request::Extension {
            command: command.to_string(),
            room_id,
            params,
        })
        .await
    }

    /// Registers a wait. Register before sending the request it answers;
    /// messages that arrive with no waiter registered are dropped.
    pub async fn subscribe(&self, interest: Interest) -> Result<PendingResponse, ClientError> {
        self.dispatcher.register(interest).await
    }

    /// Registers a wait that receives every matching message.
    pub async fn subscribe_stream(&self, interest: Interest) -> Result<ResponseStream, ClientError> {
        self.dispatcher.register_stream(interest).await
    }

    /// Waits for the next reply to `command`.
    pub async fn wait_extension_response(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExtensionResponse, ClientError> {
        let pending = self.subscribe(Interest::command(command)).await?;
        pending.wait(timeout).await?.into_extension_response()
    }

    /// Waits for the next reply to any of `commands`. The response says
    /// which one it was.
    pub async fn wait_for_any<I, S>(
        &self,
        commands: I,
        timeout: Option<Duration>,
    ) -> Result<ExtensionResponse, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending = self.subscribe(Interest::any_of(commands)).await?;
        pending.wait(timeout).await?.into_extension_response()
    }

    /// Sends an extension request and waits for its reply.
    pub async fn request(
        &self,
        command: &str,
        params: SfsObject,
    ) -> Result<ExtensionResponse, ClientError> {
        let pending = self.subscribe(Interest::command(command)).await?;
        self.send_extension_request(command, None, params).await?;
        let reply = pending.wait(self.config.request_timeout).await?;
        reply.into_extension_response()
    }

    /// Sends an extension request whose reply may be split into parts.
    ///
    /// If the first reply carries an integer `numChunks` of N, waits for
    /// the remaining N - 1 replies to the same command and returns all N
    /// in arrival order. Otherwise returns just the first.
    pub async fn request_chunked(
        &self,
        command: &str,
        params: SfsObject,
    ) -> Result<Vec<ExtensionResponse>, ClientError> {
        let timeout = self.config.request_timeout;
        let mut stream = self.subscribe_stream(Interest::command(command)).await?;
        self.send_extension_request(command, None, params).await?;

        let first = stream.next(timeout).await?.into_extension_response()?;
        let total = match first.params.get_integer("numChunks").map(usize::try_from) {
            Ok(Ok(n)) if n > self.config.max_chunks => {
                stream.close().await;
                return Err(ProtocolError::InvalidMessage(format!(
                    "numChunks {n} exceeds limit {}",
                    self.config.max_chunks
                ))
                .into());
            }
            Ok(Ok(n)) => n.max(1),
            // Absent or negative: a single reply.
            _ => 1,
        };
        tracing::debug!(conn_id = %self.conn.id(), command, chunks = total, "chunked reply");

        let mut parts = Vec::with_capacity(total.min(CHUNK_PREALLOC));
        parts.push(first);
        while parts.len() < total {
            parts.push(stream.next(timeout).await?.into_extension_response()?);
        }
        stream.close().await;
        Ok(parts)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Shuts the session down. Outstanding waits fail with
    /// `ConnectionClosed`.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::info!(conn_id = %self.conn.id(), "closing session");
        self.state.send_replace(SessionState::Closed);
        self.dispatcher.shutdown().await;
        self.tasks.reader.abort();
        self.conn.close().await?;
        Ok(())
    }

    async fn send(&self, request: Request) -> Result<(), ClientError> {
        if !self.session_state().is_open() {
            return Err(ClientError::ConnectionClosed);
        }
        let packet = request.compile()?;
        tracing::trace!(conn_id = %self.conn.id(), len = packet.len(), "sending packet");
        if let Err(e) = self.conn.send(&packet).await {
            tracing::warn!(conn_id = %self.conn.id(), error = %e, "send failed, closing session");
            self.state.send_replace(SessionState::Closed);
            self.dispatcher.shutdown().await;
            self.tasks.reader.abort();
            let _ = self.conn.close().await;
            return Err(e.into());
        }
        Ok(())
    }
}

impl<C: Connection> Drop for SfsClient<C> {
    fn drop(&mut self) {
        self.tasks.abort();
    }
}
