//! Engine actor: one Tokio task that owns every room.
//!
//! Connections, room clocks, and deferred questions all talk to the engine
//! through a single mpsc channel, and the actor processes one command at a
//! time. Two commands never interleave, so each one sees the state the
//! previous one left and re-checks everything it depends on.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use fillmath_clock::ClockEpoch;
use fillmath_identity::Identity;
use fillmath_protocol::{ClientEvent, Envelope, PlayerId, Recipient, Room, RoomId, ServerEvent};
use tokio::sync::{mpsc, oneshot};

use crate::controller::{now_ms, Outbox, SessionController};
use crate::{EngineConfig, RoomError};

/// Channel the engine pushes a player's outbound events into.
pub type OutboundSender = mpsc::UnboundedSender<Envelope>;

/// Commands processed by the engine actor.
pub(crate) enum EngineCommand {
    /// Register the outbound channel for a newly connected player.
    Connect {
        player_id: PlayerId,
        sender: OutboundSender,
    },

    /// The player's connection closed. Leaves their room, if any.
    Disconnect { player_id: PlayerId },

    /// A client event. The reply fires once the command's events have
    /// been queued for delivery.
    Event {
        player_id: PlayerId,
        identity: Option<Identity>,
        event: ClientEvent,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A room clock fired.
    Tick { room_id: RoomId, epoch: ClockEpoch },

    /// A post-action question coming due. `epoch` is the room clock that
    /// was running when it was scheduled.
    IssueQuestion {
        room_id: RoomId,
        player_id: PlayerId,
        epoch: ClockEpoch,
    },

    /// Snapshot one room.
    Inspect {
        room_id: RoomId,
        reply: oneshot::Sender<Option<Room>>,
    },

    Shutdown,
}

/// Handle to the running engine. Cheap to clone.
///
/// The engine stops when the last handle is dropped or
/// [`EngineHandle::shutdown`] is called.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Registers `player_id`'s outbound channel. Must precede any event
    /// from that player for them to receive replies.
    pub fn connect(&self, player_id: PlayerId, sender: OutboundSender) -> Result<(), RoomError> {
        self.sender
            .send(EngineCommand::Connect { player_id, sender })
            .map_err(|_| RoomError::Unavailable)
    }

    /// Reports a closed connection.
    pub fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.sender
            .send(EngineCommand::Disconnect { player_id })
            .map_err(|_| RoomError::Unavailable)
    }

    /// Runs one client event and waits for the engine to finish it.
    ///
    /// On error the player has already been sent an `error` event; the
    /// returned error is for the caller's logging.
    pub async fn dispatch(
        &self,
        player_id: PlayerId,
        identity: Option<Identity>,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        self.enqueue(player_id, identity, event)?.wait().await
    }

    /// Queues one client event without waiting for it.
    ///
    /// The event's place in the engine's order is fixed when this returns;
    /// the outcome arrives through the returned [`PendingReply`].
    pub fn enqueue(
        &self,
        player_id: PlayerId,
        identity: Option<Identity>,
        event: ClientEvent,
    ) -> Result<PendingReply, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Event {
                player_id,
                identity,
                event,
                reply: reply_tx,
            })
            .map_err(|_| RoomError::Unavailable)?;
        Ok(PendingReply { receiver: reply_rx })
    }

    /// A copy of the room as the engine currently sees it.
    pub async fn room_snapshot(&self, room_id: &RoomId) -> Result<Option<Room>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Inspect {
                room_id: room_id.clone(),
                reply: reply_tx,
            })
            .map_err(|_| RoomError::Unavailable)?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)
    }

    /// Stops the engine. Rooms and their clocks are dropped with it.
    pub fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(EngineCommand::Shutdown)
            .map_err(|_| RoomError::Unavailable)
    }

    /// `true` once the engine task has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Outcome of an event queued with [`EngineHandle::enqueue`].
#[must_use = "the outcome is lost unless awaited"]
pub struct PendingReply {
    receiver: oneshot::Receiver<Result<(), RoomError>>,
}

impl PendingReply {
    /// Waits for the engine to finish the event.
    pub async fn wait(self) -> Result<(), RoomError> {
        self.receiver.await.map_err(|_| RoomError::Unavailable)?
    }
}

struct Engine {
    controller: SessionController,
    connections: HashMap<PlayerId, OutboundSender>,
    receiver: mpsc::UnboundedReceiver<EngineCommand>,
}

impl Engine {
    async fn run(mut self) {
        tracing::info!("session engine started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                EngineCommand::Connect { player_id, sender } => {
                    tracing::debug!(%player_id, "player connected");
                    self.connections.insert(player_id, sender);
                }
                EngineCommand::Disconnect { player_id } => {
                    self.connections.remove(&player_id);
                    let _ = self.run_command("disconnect", |c| c.disconnect(player_id));
                    tracing::debug!(%player_id, "player disconnected");
                }
                EngineCommand::Event {
                    player_id,
                    identity,
                    event,
                    reply,
                } => {
                    let name = event.name();
                    let result = self.run_command(name, |c| c.handle(player_id, identity, event));
                    if let Err(err) = &result {
                        tracing::debug!(%player_id, event = name, code = err.code(), %err, "request refused");
                        self.send_to(
                            player_id,
                            &ServerEvent::error(err.code(), err.to_string()),
                            now_ms(),
                        );
                    }
                    let _ = reply.send(result);
                }
                EngineCommand::Tick { room_id, epoch } => {
                    let _ = self.run_command("tick", |c| c.tick(&room_id, epoch));
                }
                EngineCommand::IssueQuestion {
                    room_id,
                    player_id,
                    epoch,
                } => {
                    let _ = self.run_command("issue_question", |c| {
                        c.issue_question(&room_id, player_id, epoch)
                    });
                }
                EngineCommand::Inspect { room_id, reply } => {
                    let _ = reply.send(self.controller.store().room(&room_id).cloned());
                }
                EngineCommand::Shutdown => {
                    tracing::info!("session engine shutting down");
                    break;
                }
            }
        }

        tracing::info!(rooms = self.controller.store().len(), "session engine stopped");
    }

    /// Runs a controller command, delivers its events, and reports the
    /// outcome. A panic is contained here and becomes [`RoomError::Internal`].
    fn run_command<F>(&mut self, name: &'static str, f: F) -> Result<(), RoomError>
    where
        F: FnOnce(&mut SessionController) -> Result<Outbox, RoomError>,
    {
        let controller = &mut self.controller;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(controller)));
        match outcome {
            Ok(Ok(out)) => {
                self.deliver(out);
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(command = name, %reason, "engine command panicked");
                Err(RoomError::Internal)
            }
        }
    }

    /// Resolves each recipient against current room membership and queues
    /// the events. Every event from one command shares a timestamp.
    fn deliver(&self, out: Outbox) {
        let timestamp = now_ms();
        for (recipient, event) in out {
            match recipient {
                Recipient::Player(player_id) => self.send_to(player_id, &event, timestamp),
                Recipient::Players(players) => {
                    for player_id in players {
                        self.send_to(player_id, &event, timestamp);
                    }
                }
                Recipient::Room(room_id) => {
                    for player_id in self.members(&room_id) {
                        self.send_to(player_id, &event, timestamp);
                    }
                }
                Recipient::RoomExcept(room_id, excluded) => {
                    for player_id in self.members(&room_id) {
                        if player_id != excluded {
                            self.send_to(player_id, &event, timestamp);
                        }
                    }
                }
            }
        }
    }

    fn members(&self, room_id: &RoomId) -> Vec<PlayerId> {
        self.controller
            .store()
            .room(room_id)
            .map(Room::player_ids)
            .unwrap_or_default()
    }

    /// Queues one event for a player. Dropped silently if the player has no
    /// live connection.
    fn send_to(&self, player_id: PlayerId, event: &ServerEvent, timestamp: u64) {
        if let Some(sender) = self.connections.get(&player_id) {
            let _ = sender.send(Envelope {
                timestamp,
                event: event.clone(),
            });
        }
    }
}

/// Spawns the engine actor and returns a handle to it.
pub fn spawn_engine(config: EngineConfig) -> EngineHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = Engine {
        controller: SessionController::new(config, tx.downgrade()),
        connections: HashMap::new(),
        receiver: rx,
    };
    tokio::spawn(engine.run());
    EngineHandle { sender: tx }
}
