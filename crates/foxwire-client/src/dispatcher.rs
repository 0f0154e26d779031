//! Response correlation.
//!
//! Two tasks run per connection:
//!
//! - the **reader** is the only thing that ever reads the socket. It
//!   turns bytes into frame bodies, applies the liveness heuristic and
//!   forwards frames over a channel.
//! - the **dispatcher** owns the table of waiters. It decodes each frame
//!   and hands it to the oldest waiter whose [`Interest`] matches.
//!
//! Callers never touch the socket. They register an interest, get a
//! [`PendingResponse`] (a `oneshot` receiver underneath) and await it,
//! with or without a timeout. A timed-out wait removes its own
//! registration and nothing else, so the reader stays in sync with the
//! stream no matter how many waits give up.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use foxwire_protocol::{
    DecodeOptions, Envelope, ExtensionResponse, ProtocolError, decompile_packet,
};
use foxwire_transport::{Connection, ConnectionId};
use tokio::sync::{mpsc, oneshot, watch};

use crate::reader::{FrameReader, Liveness, ReadEvent};
use crate::{ClientError, SessionState};

// ---------------------------------------------------------------------------
// Interest
// ---------------------------------------------------------------------------

/// Which inbound messages a waiter wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    /// Extension replies whose command (`p.c`) is one of these.
    Extension(BTreeSet<String>),

    /// System-controller messages with this action id.
    System { action: i16 },
}

impl Interest {
    /// Extension replies for a single command.
    pub fn command(command: impl Into<String>) -> Self {
        Interest::Extension(BTreeSet::from([command.into()]))
    }

    /// Extension replies for any of several commands.
    pub fn any_of<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Interest::Extension(commands.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, envelope: &Envelope) -> bool {
        match self {
            Interest::Extension(commands) => envelope
                .command()
                .is_some_and(|c| commands.contains(c)),
            Interest::System { action } => envelope.is_system() && envelope.action == *action,
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interest::Extension(commands) => {
                let names: Vec<&str> = commands.iter().map(String::as_str).collect();
                write!(f, "extension [{}]", names.join(", "))
            }
            Interest::System { action } => write!(f, "system action {action}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Delivered messages
// ---------------------------------------------------------------------------

/// A decoded inbound message plus the frame body it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub envelope: Envelope,
    pub raw: Bytes,
}

impl InboundMessage {
    /// Reads `p.c` and `p.p` out of an extension reply.
    pub fn into_extension_response(self) -> Result<ExtensionResponse, ClientError> {
        Ok(ExtensionResponse::from_envelope(self.envelope, self.raw)?)
    }
}

type Delivery = Result<InboundMessage, ClientError>;

/// Identifies one registration in the dispatcher's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitId(u64);

impl fmt::Display for WaitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait-{}", self.0)
    }
}

/// Where a matched frame goes.
enum Sink {
    /// Satisfied by one frame, then removed.
    Once(oneshot::Sender<Delivery>),
    /// Receives every matching frame until cancelled.
    Stream(mpsc::UnboundedSender<Delivery>),
}

impl Sink {
    fn is_closed(&self) -> bool {
        match self {
            Sink::Once(tx) => tx.is_closed(),
            Sink::Stream(tx) => tx.is_closed(),
        }
    }
}

struct Waiter {
    id: WaitId,
    interest: Interest,
    sink: Sink,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum Command {
    Register {
        interest: Interest,
        sink: Sink,
        reply: oneshot::Sender<WaitId>,
    },
    Cancel {
        id: WaitId,
    },
    Shutdown,
}

/// What the reader task sends to the dispatcher.
enum Inbound {
    Frame(Bytes),
    Closed,
}

// ---------------------------------------------------------------------------
// DispatcherHandle
// ---------------------------------------------------------------------------

/// Handle to a running dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Registers a one-shot wait.
    ///
    /// Returns only after the dispatcher has recorded it, so a request
    /// sent afterwards cannot race its own reply.
    pub async fn register(&self, interest: Interest) -> Result<PendingResponse, ClientError> {
        let (tx, rx) = oneshot::channel();
        let label = interest.to_string();
        let id = self.register_sink(interest, Sink::Once(tx)).await?;
        Ok(PendingResponse {
            id,
            interest: label,
            rx,
            handle: self.clone(),
            finished: false,
        })
    }

    /// Registers a wait that receives every matching frame until the
    /// returned stream is dropped or closed.
    pub async fn register_stream(&self, interest: Interest) -> Result<ResponseStream, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let label = interest.to_string();
        let id = self.register_sink(interest, Sink::Stream(tx)).await?;
        Ok(ResponseStream {
            id,
            interest: label,
            rx,
            handle: self.clone(),
            finished: false,
        })
    }

    async fn register_sink(&self, interest: Interest, sink: Sink) -> Result<WaitId, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Register {
                interest,
                sink,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| ClientError::ConnectionClosed)
    }

    /// Removes a registration. Unknown ids are ignored.
    pub async fn cancel(&self, id: WaitId) {
        let _ = self.sender.send(Command::Cancel { id }).await;
    }

    fn try_cancel(&self, id: WaitId) {
        let _ = self.sender.try_send(Command::Cancel { id });
    }

    /// Stops the dispatcher. Outstanding waits fail with
    /// `ConnectionClosed`.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// PendingResponse / ResponseStream
// ---------------------------------------------------------------------------

/// A registered one-shot wait.
///
/// Dropping it without waiting cancels the registration.
pub struct PendingResponse {
    id: WaitId,
    interest: String,
    rx: oneshot::Receiver<Delivery>,
    handle: DispatcherHandle,
    finished: bool,
}

impl PendingResponse {
    pub fn id(&self) -> WaitId {
        self.id
    }

    /// Waits for the matching message. `None` waits indefinitely.
    ///
    /// On timeout the registration is cancelled before this returns, so
    /// a reply that turns up later is not delivered to anyone.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<InboundMessage, ClientError> {
        let received = match timeout {
            None => (&mut self.rx).await,
            Some(after) => match tokio::time::timeout(after, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::debug!(wait = %self.id, interest = %self.interest, "wait timed out");
                    self.handle.cancel(self.id).await;
                    self.finished = true;
                    return Err(ClientError::Timeout {
                        waiting_for: std::mem::take(&mut self.interest),
                        after,
                    });
                }
            },
        };
        self.finished = true;
        received.map_err(|_| ClientError::ConnectionClosed)?
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if !self.finished {
            self.handle.try_cancel(self.id);
        }
    }
}

/// A registered multi-frame wait.
pub struct ResponseStream {
    id: WaitId,
    interest: String,
    rx: mpsc::UnboundedReceiver<Delivery>,
    handle: DispatcherHandle,
    finished: bool,
}

impl ResponseStream {
    pub fn id(&self) -> WaitId {
        self.id
    }

    /// Waits for the next matching message.
    pub async fn next(&mut self, timeout: Option<Duration>) -> Result<InboundMessage, ClientError> {
        let received = match timeout {
            None => self.rx.recv().await,
            Some(after) => tokio::time::timeout(after, self.rx.recv())
                .await
                .map_err(|_| ClientError::Timeout {
                    waiting_for: self.interest.clone(),
                    after,
                })?,
        };
        received.ok_or(ClientError::ConnectionClosed)?
    }

    /// Cancels the registration and waits for the dispatcher to see it.
    pub async fn close(mut self) {
        self.finished = true;
        self.handle.cancel(self.id).await;
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if !self.finished {
            self.handle.try_cancel(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Join handles for the reader and dispatcher tasks.
pub(crate) struct Tasks {
    pub reader: tokio::task::JoinHandle<()>,
    pub dispatcher: tokio::task::JoinHandle<()>,
}

impl Tasks {
    pub fn abort(&self) {
        self.reader.abort();
        self.dispatcher.abort();
    }
}

/// Spawns the reader and dispatcher for a connection that has finished
/// its handshake.
///
/// `reader` and `liveness` carry over from the handshake so that bytes
/// already buffered and empty reads already counted are not lost.
pub(crate) fn spawn<C: Connection>(
    reader: FrameReader<C>,
    liveness: Liveness,
    options: DecodeOptions,
    buffer: usize,
    state: Arc<watch::Sender<SessionState>>,
) -> (DispatcherHandle, Tasks) {
    let buffer = buffer.max(1);
    let conn_id = reader.connection().id();
    let (event_tx, event_rx) = mpsc::channel(buffer);
    let (command_tx, command_rx) = mpsc::channel(buffer);

    let reader = tokio::spawn(run_reader(reader, liveness, event_tx));

    let dispatcher = Dispatcher {
        conn_id,
        options,
        commands: command_rx,
        events: event_rx,
        waiters: VecDeque::new(),
        next_id: 1,
        state,
    };
    let dispatcher = tokio::spawn(dispatcher.run());

    (
        DispatcherHandle { sender: command_tx },
        Tasks { reader, dispatcher },
    )
}

async fn run_reader<C: Connection>(
    mut reader: FrameReader<C>,
    mut liveness: Liveness,
    events: mpsc::Sender<Inbound>,
) {
    let conn = Arc::clone(reader.connection());
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "reader started");

    loop {
        let event = match reader.next_event().await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "read failed, closing connection");
                break;
            }
        };

        let empty = match event {
            ReadEvent::Frame(body) => {
                liveness.record_activity();
                tracing::trace!(%conn_id, len = body.len(), "frame received");
                if events.send(Inbound::Frame(body)).await.is_err() {
                    // Dispatcher is gone; nobody is listening.
                    tracing::debug!(%conn_id, "reader stopped");
                    return;
                }
                false
            }
            ReadEvent::Empty => true,
            ReadEvent::Malformed(e) => {
                tracing::debug!(%conn_id, error = %e, "skipping malformed frame marker");
                true
            }
        };

        if empty && liveness.record_empty() {
            tracing::warn!(
                %conn_id,
                empty_reads = liveness.consecutive_empty(),
                "peer unresponsive, closing connection"
            );
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close after read loop failed");
    }
    let _ = events.send(Inbound::Closed).await;
    tracing::debug!(%conn_id, "reader stopped");
}

struct Dispatcher {
    conn_id: ConnectionId,
    options: DecodeOptions,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<Inbound>,
    /// Oldest registration first.
    waiters: VecDeque<Waiter>,
    next_id: u64,
    state: Arc<watch::Sender<SessionState>>,
}

impl Dispatcher {
    async fn run(mut self) {
        tracing::debug!(conn_id = %self.conn_id, "dispatcher started");

        loop {
            tokio::select! {
                // Registrations first, so a wait registered before its
                // request was sent is in the table before the reply is
                // routed.
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(Command::Register { interest, sink, reply }) => {
                        let id = WaitId(self.next_id);
                        self.next_id += 1;
                        tracing::debug!(conn_id = %self.conn_id, wait = %id, %interest, "wait registered");
                        self.waiters.push_back(Waiter { id, interest, sink });
                        if reply.send(id).is_err() {
                            // Caller went away before the ack.
                            self.waiters.pop_back();
                        }
                    }
                    Some(Command::Cancel { id }) => {
                        self.waiters.retain(|w| w.id != id);
                    }
                    Some(Command::Shutdown) | None => {
                        tracing::info!(conn_id = %self.conn_id, "dispatcher shutting down");
                        break;
                    }
                },

                event = self.events.recv() => match event {
                    Some(Inbound::Frame(body)) => self.route(body),
                    Some(Inbound::Closed) | None => {
                        tracing::info!(conn_id = %self.conn_id, "connection closed");
                        break;
                    }
                },
            }
        }

        self.state.send_replace(SessionState::Closed);
        self.fail_all();
        tracing::debug!(conn_id = %self.conn_id, "dispatcher stopped");
    }

    /// Delivers a frame to the oldest live waiter that wants it.
    fn route(&mut self, body: Bytes) {
        let envelope = match decode_envelope(&body, self.options) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(conn_id = %self.conn_id, error = %e, "dropping undecodable frame");
                return;
            }
        };

        self.waiters.retain(|w| !w.sink.is_closed());

        let Some(index) = self.waiters.iter().position(|w| w.interest.matches(&envelope)) else {
            tracing::debug!(
                conn_id = %self.conn_id,
                controller = envelope.controller,
                action = envelope.action,
                command = envelope.command().unwrap_or(""),
                "no waiter for frame, dropping"
            );
            return;
        };

        let Some(waiter) = self.waiters.remove(index) else {
            return;
        };
        tracing::trace!(conn_id = %self.conn_id, wait = %waiter.id, "frame matched");

        let message = InboundMessage { envelope, raw: body };
        if let Sink::Stream(tx) = &waiter.sink {
            let _ = tx.send(Ok(message));
            // Streams stay registered, in the same position.
            self.waiters.insert(index, waiter);
        } else if let Sink::Once(tx) = waiter.sink {
            let _ = tx.send(Ok(message));
        }
    }

    fn fail_all(&mut self) {
        for waiter in self.waiters.drain(..) {
            match waiter.sink {
                Sink::Once(tx) => {
                    let _ = tx.send(Err(ClientError::ConnectionClosed));
                }
                Sink::Stream(tx) => {
                    let _ = tx.send(Err(ClientError::ConnectionClosed));
                }
            }
        }
    }
}

fn decode_envelope(body: &[u8], options: DecodeOptions) -> Result<Envelope, ProtocolError> {
    Envelope::from_object(decompile_packet(body, options)?)
}
