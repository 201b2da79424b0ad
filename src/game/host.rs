//! Host connection lifecycle: off-actor `host` handshake, then a
//! connection-scoped read loop translating verbs into [`Action`]s.
//!
//! Grounded on `game/host.go`'s `Host.Run` read loop. The table of verbs
//! (`count`, `start`, `kick`, `next`) is exactly spec.md §4.4's host dispatch
//! table; the handshake itself is generalized to the same off-actor
//! phase A / on-actor phase B split used for players (spec §4.5/§9), even
//! though the original performs `ConnectHost` as a single step — a
//! deliberately consistent application of "never block the actor on I/O".

use tokio::sync::{mpsc, oneshot};

use super::client::{Client, ClientReader, WireStream, WireSink};
use super::{verbs, Action, HANDSHAKE_TIMEOUT};

/// Runs the full lifecycle of one incoming host connection: reads and
/// validates the `host` handshake frame, submits `ConnectHostReady` to the
/// actor, and — once accepted — drives the host's read loop until
/// disconnect.
pub async fn connect<Si, St>(sink: Si, stream: St, actions: mpsc::Sender<Action>, game_token: tokio_util::sync::CancellationToken)
where
    Si: WireSink,
    St: WireStream,
{
    let token = game_token.child_token();
    let client = Client::open(sink, token.clone());
    let mut reader = ClientReader::new(stream);

    let (verb, _data) = match reader.read_string_timeout(HANDSHAKE_TIMEOUT).await {
        Ok(frame) => frame,
        Err(_) => {
            client.close_reason("handshake timeout").await;
            return;
        }
    };

    if verb != verbs::HOST {
        client.close_reason("expected host").await;
        return;
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    if actions.send(Action::ConnectHostReady { client: client.clone(), reply: reply_tx }).await.is_err() {
        return;
    }

    match reply_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            client.close_reason(e.to_string()).await;
            return;
        }
        Err(_) => return,
    }

    run_read_loop(client, reader, actions, token).await;
}

async fn run_read_loop<St>(
    client: Client,
    mut reader: ClientReader<St>,
    actions: mpsc::Sender<Action>,
    token: tokio_util::sync::CancellationToken,
) where
    St: WireStream,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = reader.read_string() => {
                match frame {
                    Ok((verb, data)) if verb == verbs::COUNT => {
                        match data.trim().parse::<u32>() {
                            Ok(seconds) => {
                                let _ = actions.send(Action::StartGame { count: seconds }).await;
                            }
                            Err(_) => {
                                client.close_reason("invalid countdown length").await;
                                break;
                            }
                        }
                    }
                    Ok((verb, _)) if verb == verbs::START => {
                        let _ = actions.send(Action::StartGame { count: 0 }).await;
                    }
                    Ok((verb, data)) if verb == verbs::KICK => {
                        match data.trim().parse::<usize>() {
                            Ok(id) => {
                                let _ = actions.send(Action::KickPlayer { id }).await;
                            }
                            Err(_) => {
                                client.close_reason("invalid player identifier").await;
                                break;
                            }
                        }
                    }
                    Ok((verb, _)) if verb == verbs::NEXT => {
                        let _ = actions.send(Action::NextQuestion).await;
                    }
                    Ok(_) => {
                        client.close_reason("invalid command").await;
                        break;
                    }
                    Err(_) => break,
                }
            }
        }
    }

    tokio::select! {
        _ = actions.send(Action::EndGame { clean: false, reason: "host disconnected".to_string() }) => {}
        _ = token.cancelled() => {}
    }
    token.cancel();
}
