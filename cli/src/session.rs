//! Host loop for one canvas engine on one room.
//!
//! The engine is sans-IO: every operation returns [`Action`]s and this module
//! carries them out. Envelopes go to a writer task that owns the socket sink.
//! Storage calls are spawned and report back on a completion channel, which
//! the event loop drains alongside inbound frames so the engine is only ever
//! touched from one place.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::time::Duration;

use canvas::doc::ShapeId;
use canvas::engine::{Action, Engine};
use canvas::input::Tool;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wire::{Envelope, Point, decode_envelope, encode_envelope};

use crate::CliError;
use crate::api::ApiClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Result of a spawned storage call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Updated(ShapeId),
    Deleted(ShapeId),
    Failed { id: ShapeId, error: String },
}

/// An engine plus the channels its actions are executed against.
pub struct Session {
    engine: Engine,
    api: ApiClient,
    outbound: mpsc::UnboundedSender<String>,
    completions: mpsc::UnboundedSender<Completion>,
    in_flight: usize,
    renders: usize,
}

impl Session {
    pub fn new(
        engine: Engine,
        api: ApiClient,
        outbound: mpsc::UnboundedSender<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, rx) = mpsc::unbounded_channel();
        let session = Self { engine, api, outbound, completions, in_flight: 0, renders: 0 };
        (session, rx)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Storage calls spawned but not yet reported.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// How many times the engine asked for a redraw.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// No creation awaits its echo and no storage call is outstanding.
    pub fn is_settled(&self) -> bool {
        self.in_flight == 0 && self.engine.doc.pending_count() == 0
    }

    /// Carry out engine actions in order.
    ///
    /// # Errors
    ///
    /// Fails if an envelope cannot be encoded or the writer task has gone.
    pub fn execute(&mut self, actions: Vec<Action>) -> Result<(), CliError> {
        for action in actions {
            match action {
                Action::Send(envelope) => {
                    let text = encode_envelope(&envelope)?;
                    self.outbound.send(text).map_err(|_| CliError::WsClosed)?;
                }
                Action::PersistUpdate { id, shape } => {
                    let api = self.api.clone();
                    let room = self.engine.room_id().to_owned();
                    self.spawn_persist(async move {
                        match api.update_shape(&room, id, &shape).await {
                            Ok(()) => Completion::Updated(id),
                            Err(error) => Completion::Failed { id, error: error.to_string() },
                        }
                    });
                }
                Action::PersistDelete { id } => {
                    let api = self.api.clone();
                    let room = self.engine.room_id().to_owned();
                    self.spawn_persist(async move {
                        match api.delete_shape(&room, id).await {
                            Ok(()) => Completion::Deleted(id),
                            Err(error) => Completion::Failed { id, error: error.to_string() },
                        }
                    });
                }
                Action::RenderNeeded => self.renders += 1,
            }
        }
        Ok(())
    }

    /// Decode one inbound text frame and apply it. Malformed frames are
    /// reported and skipped.
    ///
    /// # Errors
    ///
    /// Propagates failures from executing the resulting actions.
    pub fn on_text(&mut self, text: &str) -> Result<Option<Envelope>, CliError> {
        let envelope = match decode_envelope(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                eprintln!("ignoring malformed envelope: {error}");
                return Ok(None);
            }
        };
        let actions = self.engine.apply_envelope(&envelope);
        self.execute(actions)?;
        Ok(Some(envelope))
    }

    /// Feed a storage result back into the engine.
    ///
    /// # Errors
    ///
    /// Propagates failures from executing the resulting actions.
    pub fn on_completion(&mut self, done: Completion) -> Result<(), CliError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let actions = match done {
            Completion::Updated(id) => self.engine.on_update_persisted(id),
            Completion::Deleted(id) => self.engine.on_delete_persisted(id),
            Completion::Failed { id, error } => {
                eprintln!("storage call for shape {id} failed: {error}");
                Vec::new()
            }
        };
        self.execute(actions)
    }

    fn spawn_persist<F>(&mut self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let done = call.await;
            if tx.send(done).is_err() {
                eprintln!("session closed before a storage call finished");
            }
        });
    }
}

/// Drive a full pointer gesture from `from` to `to` with `tool`.
///
/// Drawing tools get one intermediate move at the midpoint so pencil strokes
/// carry a path. Returns the actions the engine emitted, unexecuted.
pub fn gesture(engine: &mut Engine, tool: Tool, from: Point, to: Point) -> Vec<Action> {
    engine.set_tool(tool);
    let mut actions = engine.on_pointer_down(from);
    if from != to {
        let mid = Point::new(f64::midpoint(from.x, to.x), f64::midpoint(from.y, to.y));
        actions.extend(engine.on_pointer_move(mid));
    }
    actions.extend(engine.on_pointer_up(to));
    actions
}

/// A session bound to a live relay socket.
pub struct LiveSession {
    session: Session,
    completions: mpsc::UnboundedReceiver<Completion>,
    inbound: SplitStream<WsStream>,
    writer: JoinHandle<Result<(), CliError>>,
}

impl LiveSession {
    /// Open the socket, load room history and join the room.
    ///
    /// A history failure is reported and the room starts empty.
    ///
    /// # Errors
    ///
    /// Fails if the websocket handshake is refused.
    pub async fn connect(api: ApiClient, ws_url: &str, room_id: &str) -> Result<Self, CliError> {
        let (stream, _) = connect_async(ws_url).await.map_err(|error| CliError::WsConnect(Box::new(error)))?;
        let (sink, inbound) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_outbound(sink, rx));

        let rows = match api.history(room_id, None).await {
            Ok(rows) => rows,
            Err(error) => {
                eprintln!("{error}; starting with an empty room");
                Vec::new()
            }
        };
        let (mut session, completions) = Session::new(Engine::new(room_id), api, tx);
        let loaded = session.engine.load_history(rows);
        session.execute(loaded)?;
        let join = session.engine.join();
        session.execute(join)?;

        Ok(Self { session, completions, inbound, writer })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Wait for one inbound frame or storage completion and apply it.
    /// Returns the envelope when the event was a decodable frame.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::WsClosed`] once the relay hangs up.
    pub async fn step(&mut self) -> Result<Option<Envelope>, CliError> {
        tokio::select! {
            frame = self.inbound.next() => match frame {
                None | Some(Ok(Message::Close(_))) => Err(CliError::WsClosed),
                Some(Err(error)) => Err(CliError::WsConnect(Box::new(error))),
                Some(Ok(Message::Text(text))) => self.session.on_text(text.as_str()),
                Some(Ok(_)) => Ok(None),
            },
            Some(done) = self.completions.recv() => {
                self.session.on_completion(done)?;
                Ok(None)
            }
        }
    }

    /// Step until every pending creation is echoed and every storage call
    /// has reported.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Timeout`] if that takes longer than `timeout`.
    pub async fn settle(&mut self, timeout: Duration) -> Result<(), CliError> {
        let wait = async {
            while !self.session.is_settled() {
                self.step().await?;
            }
            Ok::<(), CliError>(())
        };
        tokio::time::timeout(timeout, wait).await.map_err(|_| CliError::Timeout)?
    }

    /// Leave the room and flush everything queued for the socket.
    ///
    /// # Errors
    ///
    /// Fails if the writer task could not deliver the queued frames.
    pub async fn finish(self) -> Result<(), CliError> {
        let Self { mut session, writer, .. } = self;
        let leave = session.engine.leave();
        session.execute(leave)?;
        drop(session);
        writer.await?
    }
}

async fn write_outbound(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<String>,
) -> Result<(), CliError> {
    while let Some(text) = rx.recv().await {
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|error| CliError::WsConnect(Box::new(error)))?;
    }
    sink.close().await.map_err(|error| CliError::WsConnect(Box::new(error)))
}
