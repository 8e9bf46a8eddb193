use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::protocol::{
    self, GatewayPayload, Hello, Identify, Interaction, MessageCreate, Ready,
};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Events surfaced from the gateway
#[derive(Debug)]
pub enum GatewayEvent {
    /// Session established
    Ready { application_id: u64, user_id: u64 },
    Interaction(Box<Interaction>),
    /// A message sent to the bot outside any guild
    DirectMessage(MessageCreate),
    /// Connection lost; a reconnect follows
    Disconnected,
}

/// Run the gateway connection with automatic reconnection. Events arrive on
/// `event_tx` until it is dropped.
pub fn run_gateway(config: BotConfig, event_tx: mpsc::Sender<GatewayEvent>) {
    tokio::spawn(async move {
        gateway_loop(config, event_tx).await;
    });
}

async fn gateway_loop(config: BotConfig, event_tx: mpsc::Sender<GatewayEvent>) {
    let mut attempt = 0u32;

    loop {
        let delay = reconnect_delay(&config, attempt);
        if attempt > 0 {
            info!("reconnecting in {:.1}s (attempt {})", delay.as_secs_f64(), attempt);
            time::sleep(delay).await;
        }

        match connect_and_run(&config, &event_tx).await {
            Ok(()) => {
                info!("gateway session ended");
                attempt = 0;
            }
            Err(e) => {
                error!("gateway error: {:#}", e);
                attempt = attempt.saturating_add(1);
            }
        }

        if event_tx.send(GatewayEvent::Disconnected).await.is_err() {
            info!("event channel closed, stopping gateway loop");
            break;
        }
    }
}

async fn connect_and_run(config: &BotConfig, event_tx: &mpsc::Sender<GatewayEvent>) -> Result<()> {
    info!("connecting to {}", GATEWAY_URL);

    let (ws_stream, _) = connect_async(GATEWAY_URL)
        .await
        .context("failed to connect WebSocket")?;

    info!("gateway connected");

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Hello carries the heartbeat interval
    let hello_timeout = Duration::from_secs(10);
    let hello = time::timeout(hello_timeout, async {
        while let Some(msg) = ws_stream.next().await {
            match msg? {
                WsMessage::Text(text) => {
                    let payload = GatewayPayload::decode(&text)?;
                    if payload.op == protocol::HELLO {
                        return Ok::<Hello, anyhow::Error>(payload.data()?);
                    }
                }
                WsMessage::Close(frame) => bail!("gateway closed before hello: {:?}", frame),
                _ => {}
            }
        }
        bail!("connection closed before hello")
    })
    .await
    .context("hello timeout")??;

    let identify = GatewayPayload::new(protocol::IDENTIFY, &Identify::new(&config.discord_token))?;
    ws_sink.send(WsMessage::Text(identify.encode()?.into())).await?;
    debug!("sent IDENTIFY");

    let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval);
    let first_beat = heartbeat_interval.mul_f64(rand_simple());
    let mut heartbeat_timer = time::interval_at(Instant::now() + first_beat, heartbeat_interval);

    let mut sequence: Option<u64> = None;
    let mut acked = true;

    loop {
        tokio::select! {
            ws_msg = ws_stream.next() => {
                match ws_msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let payload = match GatewayPayload::decode(&text) {
                            Ok(p) => p,
                            Err(e) => {
                                error!("gateway decode error: {}", e);
                                continue;
                            }
                        };
                        if payload.s.is_some() {
                            sequence = payload.s;
                        }
                        match payload.op {
                            protocol::DISPATCH => {
                                if !dispatch(payload, event_tx).await {
                                    info!("event channel closed");
                                    return Ok(());
                                }
                            }
                            protocol::HEARTBEAT_ACK => {
                                acked = true;
                                debug!("heartbeat ACK received");
                            }
                            protocol::HEARTBEAT => {
                                let beat = protocol::heartbeat(sequence).encode()?;
                                ws_sink.send(WsMessage::Text(beat.into())).await?;
                            }
                            protocol::RECONNECT => {
                                info!("gateway requested reconnect");
                                return Ok(());
                            }
                            protocol::INVALID_SESSION => {
                                warn!("gateway invalidated the session");
                                time::sleep(Duration::from_secs(1) + Duration::from_secs_f64(4.0 * rand_simple())).await;
                                return Ok(());
                            }
                            other => debug!("ignoring gateway op {}", other),
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        ws_sink.send(WsMessage::Pong(data)).await?;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!("gateway sent close frame: {:?}", frame);
                        return Ok(());
                    }
                    Some(Ok(_)) => {} // binary, pong
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("gateway stream ended");
                        return Ok(());
                    }
                }
            }

            _ = heartbeat_timer.tick() => {
                if !acked {
                    bail!("heartbeat not acknowledged, connection is stale");
                }
                let beat = protocol::heartbeat(sequence).encode()?;
                ws_sink.send(WsMessage::Text(beat.into())).await?;
                acked = false;
                debug!("sent heartbeat (seq {:?})", sequence);
            }
        }
    }
}

/// Forward a dispatch event. Returns false once the receiver is gone.
async fn dispatch(payload: GatewayPayload, event_tx: &mpsc::Sender<GatewayEvent>) -> bool {
    let event = match payload.t.as_deref() {
        Some("READY") => match payload.data::<Ready>() {
            Ok(ready) => {
                info!("gateway ready as {}", ready.user.username);
                GatewayEvent::Ready {
                    application_id: ready.application.id,
                    user_id: ready.user.id,
                }
            }
            Err(e) => {
                error!("bad READY payload: {}", e);
                return true;
            }
        },
        Some("INTERACTION_CREATE") => match payload.data::<Interaction>() {
            Ok(interaction) => GatewayEvent::Interaction(Box::new(interaction)),
            Err(e) => {
                error!("bad INTERACTION_CREATE payload: {}", e);
                return true;
            }
        },
        Some("MESSAGE_CREATE") => match payload.data::<MessageCreate>() {
            Ok(message) if message.is_direct() => GatewayEvent::DirectMessage(message),
            Ok(_) => return true,
            Err(e) => {
                debug!("unparsed MESSAGE_CREATE: {}", e);
                return true;
            }
        },
        _ => return true,
    };
    event_tx.send(event).await.is_ok()
}

fn reconnect_delay(config: &BotConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let base = config.reconnect_base_delay_secs as f64;
    let max = config.reconnect_max_delay_secs as f64;
    // base * 2^(attempt-1), capped at max
    let delay = (base * 2.0f64.powi(attempt as i32 - 1)).min(max);
    // ±25% jitter
    let jitter = delay * 0.25 * (2.0 * rand_simple() - 1.0);
    Duration::from_secs_f64((delay + jitter).max(base))
}

/// Time-derived value in [0, 1) for jitter
fn rand_simple() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
