//! Player connection lifecycle: off-actor `ident` handshake, then a
//! connection-scoped read loop translating frames into [`Action`]s.
//!
//! Grounded on `game/player.go`'s `Player.Run` read loop shape (`Open`, loop
//! reading frames, on exit try-enqueue a disconnect notification then
//! cancel). The original's player join+handshake is folded into a single,
//! actor-blocking `ConnectPlayer.Perform` (see `game/action.go`); this
//! expansion splits it into the off-actor phase A / on-actor phase B pair
//! spec.md §4.5/§9 requires, so a stalled handshake can never stall the
//! actor.

use tokio::sync::{mpsc, oneshot};

use super::client::{Client, ClientReader, WireStream, WireSink};
use super::{verbs, Action, HANDSHAKE_TIMEOUT};

/// Runs the full lifecycle of one incoming player connection: reads and
/// validates the `ident <id>` handshake frame (bounded by
/// [`HANDSHAKE_TIMEOUT`]), submits `ConnectPlayerReady` to the actor, and —
/// once accepted — drives the player's read loop until disconnect.
pub async fn connect<Si, St>(sink: Si, stream: St, actions: mpsc::Sender<Action>, game_token: tokio_util::sync::CancellationToken)
where
    Si: WireSink,
    St: WireStream,
{
    let token = game_token.child_token();
    let client = Client::open(sink, token.clone());
    let mut reader = ClientReader::new(stream);

    let (verb, data) = match reader.read_string_timeout(HANDSHAKE_TIMEOUT).await {
        Ok(frame) => frame,
        Err(_) => {
            client.close_reason("handshake timeout").await;
            return;
        }
    };

    if verb != verbs::IDENT {
        client.close_reason("expected ident").await;
        return;
    }

    let id: usize = match data.trim().parse() {
        Ok(id) if id >= 1 => id,
        _ => {
            client.close_reason("invalid player identifier").await;
            return;
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if actions
        .send(Action::ConnectPlayerReady { id, client: client.clone(), reply: reply_tx })
        .await
        .is_err()
    {
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

    run_read_loop(id, client, reader, actions, token).await;
}

async fn run_read_loop<St>(
    id: usize,
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
                    Ok((verb, data)) if verb == verbs::ANSWER => {
                        match data.trim().parse::<i64>() {
                            Ok(n) if n > 0 => {
                                let _ = actions.send(Action::Answer { id, n: n as u32 }).await;
                            }
                            _ => {
                                client.close_reason("invalid answer ID").await;
                                break;
                            }
                        }
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
        _ = actions.send(Action::ConnectionUpdate { id, client: None }) => {}
        _ = token.cancelled() => {}
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::super::client::fake::pair;
    use super::*;

    #[tokio::test]
    async fn rejects_handshake_with_wrong_verb() {
        let (sink, mut observed, stream, inbound) = pair();
        let (actions, mut action_rx) = mpsc::channel(8);
        let token = tokio_util::sync::CancellationToken::new();

        inbound.send(super::super::WireMessage::Text("start ".to_string())).unwrap();
        connect(sink, stream, actions, token).await;

        assert!(action_rx.try_recv().is_err());
        assert_eq!(observed.recv().await.unwrap(), super::super::WireMessage::Close);
    }

    #[tokio::test]
    async fn forwards_answer_after_acceptance() {
        let (sink, _observed, stream, inbound) = pair();
        let (actions, mut action_rx) = mpsc::channel(8);
        let token = tokio_util::sync::CancellationToken::new();

        inbound.send(super::super::WireMessage::Text("ident 1".to_string())).unwrap();

        let handle = tokio::spawn(connect(sink, stream, actions, token));

        let action = action_rx.recv().await.unwrap();
        match action {
            Action::ConnectPlayerReady { id, reply, .. } => {
                assert_eq!(id, 1);
                let _ = reply.send(Ok(()));
            }
            _ => panic!("expected ConnectPlayerReady"),
        }

        inbound.send(super::super::WireMessage::Text("ans 2".to_string())).unwrap();
        let action = action_rx.recv().await.unwrap();
        match action {
            Action::Answer { id, n } => {
                assert_eq!(id, 1);
                assert_eq!(n, 2);
            }
            _ => panic!("expected Answer"),
        }

        drop(inbound);
        let _ = handle.await;
    }
}
