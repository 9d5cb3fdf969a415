//! Per-connection handler: decode, rate-limit, resolve identity, dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register an outbound channel with the engine
//!   2. Loop: inbound frames go through the gateway checks into the engine,
//!      outbound envelopes from the engine are encoded and sent
//!   3. On exit, a guard reports the disconnect and forgets rate-limit state

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fillmath_identity::{Identity, IdentityProvider};
use fillmath_protocol::{ClientEvent, Codec, Envelope, PlayerId, ServerEvent};
use fillmath_room::RoomError;
use fillmath_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::FillmathError;

/// Reports the disconnect to the engine when the handler exits, even if it
/// exits by panicking.
///
/// `Drop` is synchronous, so releasing the async rate-limit lock happens in
/// a spawned task.
struct ConnectionGuard<I: IdentityProvider, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<I, C>>,
}

impl<I: IdentityProvider, C: Codec> Drop for ConnectionGuard<I, C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        if self.state.engine.disconnect(player_id).is_err() {
            tracing::debug!(%player_id, "engine gone before disconnect");
        }
        let limiter = Arc::clone(&self.state.limiter);
        tokio::spawn(async move {
            limiter.release(player_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<I, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<I, C>>,
) -> Result<(), FillmathError>
where
    I: IdentityProvider,
    C: Codec,
{
    let conn_id = conn.id();
    let player_id = PlayerId(conn_id.into_inner());

    let (tx, mut outbound) = mpsc::unbounded_channel();
    state.engine.connect(player_id, tx)?;
    let _guard = ConnectionGuard {
        player_id,
        state: Arc::clone(&state),
    };
    tracing::info!(%conn_id, %player_id, peer = %conn.peer_addr(), "player connected");

    let result = pump(&conn, &state, player_id, &mut outbound).await;
    if let Err(e) = conn.close().await {
        tracing::trace!(%player_id, error = %e, "close after session end");
    }

    // _guard drops here → disconnect fires.
    result
}

/// Moves frames in both directions until the client goes away.
async fn pump<I, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<I, C>>,
    player_id: PlayerId,
    outbound: &mut mpsc::UnboundedReceiver<Envelope>,
) -> Result<(), FillmathError>
where
    I: IdentityProvider,
    C: Codec,
{
    loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => handle_frame(conn, state, player_id, &data).await?,
                Ok(None) => {
                    tracing::info!(%player_id, "connection closed cleanly");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(%player_id, error = %e, "recv error");
                    return Ok(());
                }
            },
            Some(envelope) = outbound.recv() => {
                send_envelope(conn, &state.codec, &envelope).await?;
            }
        }
    }
}

/// Runs one inbound frame through the gateway checks and into the engine.
///
/// Refusals are answered with an `error` event and are not fatal; only a
/// failed send or a stopped engine ends the connection.
async fn handle_frame<I, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<I, C>>,
    player_id: PlayerId,
    data: &[u8],
) -> Result<(), FillmathError>
where
    I: IdentityProvider,
    C: Codec,
{
    let event: ClientEvent = match state.codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "failed to decode client event");
            return send_error(conn, &state.codec, "BAD_REQUEST", &e.to_string()).await;
        }
    };
    let name = event.name();

    if !state.limiter.check(player_id, name).await {
        tracing::debug!(%player_id, event = name, "rate limited");
        return send_error(
            conn,
            &state.codec,
            "RATE_LIMITED",
            &format!("too many {name} events, slow down"),
        )
        .await;
    }

    let identity = match resolve_identity(state, player_id, &event).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(%player_id, event = name, error = %e, "identity refused");
            return send_error(conn, &state.codec, e.code(), &e.to_string()).await;
        }
    };

    if matches!(event, ClientEvent::SubmitAnswer { .. }) {
        let Some(flight) = state.flights.try_acquire(player_id) else {
            return send_error(
                conn,
                &state.codec,
                "ANSWER_IN_FLIGHT",
                "previous answer is still being processed",
            )
            .await;
        };
        // Queued now so later frames stay behind it; the guard is held
        // until the engine has finished with the answer.
        let pending = state.engine.enqueue(player_id, identity, event)?;
        tokio::spawn(async move {
            let _flight = flight;
            if let Err(err) = pending.wait().await {
                log_refusal(player_id, name, &err);
            }
        });
        return Ok(());
    }

    match state.engine.dispatch(player_id, identity, event).await {
        Ok(()) => Ok(()),
        Err(RoomError::Unavailable) => Err(RoomError::Unavailable.into()),
        Err(err) => {
            log_refusal(player_id, name, &err);
            Ok(())
        }
    }
}

/// Asks the identity provider about events that seat a player.
async fn resolve_identity<I, C>(
    state: &ServerState<I, C>,
    player_id: PlayerId,
    event: &ClientEvent,
) -> Result<Option<Identity>, fillmath_identity::IdentityError>
where
    I: IdentityProvider,
    C: Codec,
{
    match event.requested_username() {
        Some(name) => state.identity.resolve(player_id, name).await.map(Some),
        None => Ok(None),
    }
}

fn log_refusal(player_id: PlayerId, event: &'static str, err: &RoomError) {
    match err {
        RoomError::Internal => tracing::warn!(%player_id, event, "request failed internally"),
        _ => tracing::debug!(%player_id, event, code = err.code(), "request refused"),
    }
}

async fn send_envelope<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    envelope: &Envelope,
) -> Result<(), FillmathError> {
    let bytes = codec.encode(envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends an `error` event that originates in the gateway rather than the
/// engine.
async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    code: &str,
    message: &str,
) -> Result<(), FillmathError> {
    let envelope = Envelope {
        timestamp: now_ms(),
        event: ServerEvent::error(code, message),
    };
    send_envelope(conn, codec, &envelope).await
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
