//! The closed set of messages the game actor accepts (spec §4.5, §9:
//! "Actions must never set the state function to nil directly").
//!
//! Grounded on `game/action.go`'s `GameAction` interface (`Perform(game
//! *Game)`); the original only implements `AddPlayer` and a blocking,
//! single-phase `ConnectPlayer`. Every other variant here, and the
//! two-phase split of `ConnectPlayer` itself, comes from spec.md §4.5/§9
//! (the corrected design replacing the original's noted `TODO` about
//! blocking the game goroutine).

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};

use super::{verbs, Client, EndKind, Game, Host, MIN_PLAYERS, Player};

/// A message submitted to the game actor. Perform runs exclusively inside
/// the actor's own task, so it never needs to lock `GameState`.
pub enum Action {
    ConnectHostReady { client: Client, reply: oneshot::Sender<Result<()>> },
    AddPlayer { nick: String, reply: oneshot::Sender<Result<usize>> },
    ConnectPlayerReady { id: usize, client: Client, reply: oneshot::Sender<Result<()>> },
    ConnectionUpdate { id: usize, client: Option<Client> },
    KickPlayer { id: usize },
    StartGame { count: u32 },
    NextQuestion,
    StartAnswer,
    EndAnswer,
    Answer { id: usize, n: u32 },
    EndGame { clean: bool, reason: String },
}

impl Action {
    pub async fn perform(self, game: &mut Game) {
        match self {
            Action::ConnectHostReady { client, reply } => connect_host_ready(game, client, reply).await,
            Action::AddPlayer { nick, reply } => add_player(game, nick, reply),
            Action::ConnectPlayerReady { id, client, reply } => {
                connect_player_ready(game, id, client, reply).await
            }
            Action::ConnectionUpdate { id, client } => connection_update(game, id, client).await,
            Action::KickPlayer { id } => kick_player(game, id).await,
            Action::StartGame { count } => start_game(game, count).await,
            Action::NextQuestion => next_question(game),
            Action::StartAnswer => start_answer(game).await,
            Action::EndAnswer => {
                game.state_mut().question_skipped = true;
            }
            Action::Answer { id, n } => answer(game, id, n).await,
            Action::EndGame { clean, reason } => end_game(game, clean, reason).await,
        }
    }
}

async fn connect_host_ready(game: &mut Game, client: Client, reply: oneshot::Sender<Result<()>>) {
    if game.state().host.is_some() {
        let _ = reply.send(Err(Error::DuplicateHost));
        return;
    }
    game.state_mut().host = Some(Host { client });
    let _ = reply.send(Ok(()));
}

fn add_player(game: &mut Game, nick: String, reply: oneshot::Sender<Result<usize>>) {
    if game.state().players.iter().any(|p| p.nick == nick) {
        let _ = reply.send(Err(Error::DuplicateNick));
        return;
    }

    let id = game.state().players.len() + 1;
    game.state_mut().players.push(Player::new(id, nick));
    let _ = reply.send(Ok(id));
}

async fn connect_player_ready(game: &mut Game, id: usize, client: Client, reply: oneshot::Sender<Result<()>>) {
    let outcome = {
        let state = game.state();
        if state.host.is_none() {
            Err(Error::HostNotConnected)
        } else if id < 1 || id > state.players.len() {
            Err(Error::InvalidPlayerId)
        } else if state.players[id - 1].banned {
            Err(Error::Banned)
        } else if state.players[id - 1].connected {
            Err(Error::AlreadyConnected)
        } else {
            Ok(())
        }
    };

    if let Err(e) = outcome {
        let _ = reply.send(Err(e));
        return;
    }

    {
        let state = game.state_mut();
        state.players[id - 1].connected = true;
        state.players[id - 1].client = Some(client);
    }
    let _ = reply.send(Ok(()));

    let info = game.state().players[id - 1].info();
    game.notify_host(verbs::PLAYER_JOINED, &info).await;
}

/// `client` is `Some` on (re)connect — carried so the player's record picks
/// up the fresh connection, spec §4.5's `ConnectionUpdate{id,conn}` — and
/// `None` on disconnect. The host is notified either way, as "plr" (joined
/// or rejoined) or "dcplr" (disconnected).
async fn connection_update(game: &mut Game, id: usize, client: Option<Client>) {
    if id < 1 || id > game.state().players.len() {
        return;
    }

    let connected = client.is_some();
    {
        let player = &mut game.state_mut().players[id - 1];
        player.connected = connected;
        if let Some(client) = client {
            player.client = Some(client);
        }
    }

    let info = game.state().players[id - 1].info();
    let verb = if connected { verbs::PLAYER_JOINED } else { verbs::PLAYER_DISCONNECTED };
    game.notify_host(verb, &info).await;
}

async fn kick_player(game: &mut Game, id: usize) {
    if id < 1 || id > game.state().players.len() {
        return;
    }

    let client = {
        let player = &mut game.state_mut().players[id - 1];
        player.connected = false;
        player.banned = true;
        player.client.clone()
    };
    if let Some(client) = client {
        client.close_reason("kicked by host").await;
        client.token.cancel();
    }

    let info = game.state().players[id - 1].info();
    game.notify_host(verbs::PLAYER_REMOVED, &info).await;
}

async fn start_game(game: &mut Game, count: u32) {
    if count > 0 {
        for player in &game.state().players {
            if let Some(client) = &player.client {
                client.send_value(verbs::GAME_COUNTDOWN, &serde_json::json!({"seconds": count})).await;
            }
        }
        return;
    }

    if game.state().players.len() < MIN_PLAYERS {
        tracing::warn!(pin = %game.pin, players = game.state().players.len(), "starting game with too few players");
    }

    game.state_mut().status = super::Status::Running;
    game.set_pending_question();

    if let Some(host) = &game.state().host {
        host.client.send_message::<()>(verbs::START_ACK, None).await;
    }
}

fn next_question(game: &mut Game) {
    game.state_mut().current_question += 1;
    let state = game.state_mut();
    state.countdown_done = false;
    state.accepting_answers = false;
    state.question_skipped = false;
    state.last_player = None;
    state.answers_at = None;
    for player in &mut state.players {
        player.can_answer = false;
        player.answer = 0;
        player.answered_at = None;
    }
    game.set_pending_question();
}

async fn start_answer(game: &mut Game) {
    let now = Instant::now();
    {
        let state = game.state_mut();
        state.countdown_done = true;
        state.answers_at = Some(now);
        for player in &mut state.players {
            player.can_answer = true;
        }
    }

    let question = game.quiz.questions.get(game.state().current_question).cloned();
    if let Some(question) = question {
        let allowed = std::time::Duration::from_secs(question.duration as u64);
        game.spawn_answer_timer(allowed);

        let answers: Vec<&str> = question.answers.iter().map(|a| a.title.as_str()).collect();
        let body = serde_json::json!({"title": question.title, "image_url": question.image_url, "answers": answers});

        if let Some(host) = &game.state().host {
            host.client.send_value(verbs::QUESTION, &body).await;
        }
        for player in &game.state().players {
            if let Some(client) = &player.client {
                client.send_value(verbs::QUESTION, &body).await;
            }
        }
    }
}

async fn answer(game: &mut Game, id: usize, n: u32) {
    if n < 1 {
        tracing::warn!(pin = %game.pin, id, n, "dropped answer: non-positive index");
        return;
    }
    if !game.state().accepting_answers {
        tracing::warn!(pin = %game.pin, id, "dropped answer: not accepting answers");
        return;
    }
    if id < 1 || id > game.state().players.len() {
        tracing::warn!(pin = %game.pin, id, "dropped answer: player out of range");
        return;
    }

    let client = {
        let player = &mut game.state_mut().players[id - 1];
        if !player.can_answer || player.answer != 0 {
            tracing::warn!(pin = %game.pin, id, "dropped answer: already answered or not accepting");
            return;
        }

        player.answer = n;
        player.answered_at = Some(Instant::now());
        player.client.clone()
    };

    if let Some(client) = client {
        client.send_message::<()>(verbs::ANSWER_ACK, None).await;
    }
}

/// Broadcasts the game-over frame and requests the corresponding
/// state-function transition. `pub(crate)` so [`super::tick_question`] can
/// drive the same clean-end path once the quiz runs out of questions —
/// there is no dedicated "end game" wire verb (spec.md never names one), so
/// that is the only other place a clean end originates.
pub(crate) async fn end_game(game: &mut Game, clean: bool, reason: String) {
    if clean {
        for player in &game.state().players {
            if let Some(client) = &player.client {
                client.send_value(verbs::GAME_END, &serde_json::json!({"reason": reason})).await;
            }
        }
        if let Some(host) = &game.state().host {
            host.client.send_value(verbs::GAME_END, &serde_json::json!({"reason": reason})).await;
        }
        game.set_pending_end(EndKind::Clean);
    } else {
        tracing::warn!(pin = %game.pin, reason = %reason, "terminating game");
        for player in &game.state().players {
            if let Some(client) = &player.client {
                client.token.cancel();
            }
        }
        if let Some(host) = &game.state().host {
            host.client.token.cancel();
        }
        game.set_pending_end(EndKind::Terminate);
        game.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Answer, Question, Quiz, Source};

    fn empty_quiz() -> Quiz {
        Quiz {
            title: "t".to_string(),
            description: String::new(),
            author: String::new(),
            category: String::new(),
            created: String::new(),
            questions: vec![Question {
                title: "q1".to_string(),
                duration: 20,
                image_url: None,
                answers: vec![
                    Answer { title: "a".to_string(), correct: true },
                    Answer { title: "b".to_string(), correct: false },
                ],
            }],
            source: Source::Upload,
        }
    }

    fn test_game() -> Game {
        let (reaper, _rx) = tokio::sync::mpsc::channel(1);
        Game::new(super::super::Pin(1_111_111_111), empty_quiz(), reaper, std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn add_player_assigns_sequential_ids() {
        let mut game = test_game();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();

        add_player(&mut game, "alice".to_string(), tx_a);
        add_player(&mut game, "bob".to_string(), tx_b);

        assert_eq!(rx_a.await.unwrap().unwrap(), 1);
        assert_eq!(rx_b.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn add_player_rejects_duplicate_nick() {
        let mut game = test_game();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();

        add_player(&mut game, "alice".to_string(), tx_a);
        add_player(&mut game, "alice".to_string(), tx_b);

        assert!(rx_a.await.unwrap().is_ok());
        assert!(matches!(rx_b.await.unwrap(), Err(Error::DuplicateNick)));
        assert_eq!(game.state().players.len(), 1);
    }

    #[tokio::test]
    async fn kicked_player_is_banned_and_disconnected() {
        let mut game = test_game();
        let (tx, rx) = oneshot::channel();
        add_player(&mut game, "alice".to_string(), tx);
        rx.await.unwrap().unwrap();

        kick_player(&mut game, 1).await;

        assert!(game.state().players[0].banned);
        assert!(!game.state().players[0].connected);
    }

    #[tokio::test]
    async fn answer_dropped_when_not_accepting() {
        let mut game = test_game();
        let (tx, _rx) = oneshot::channel();
        add_player(&mut game, "alice".to_string(), tx);

        answer(&mut game, 1, 1).await;

        assert_eq!(game.state().players[0].answer, 0);
    }

    #[tokio::test]
    async fn start_game_with_zero_count_transitions_to_running() {
        let mut game = test_game();
        start_game(&mut game, 0).await;

        assert_eq!(game.state().status, super::super::Status::Running);
    }

    #[tokio::test]
    async fn accepted_answer_sends_ansack_to_the_player() {
        let mut game = test_game();
        let (tx, rx) = oneshot::channel();
        add_player(&mut game, "alice".to_string(), tx);
        rx.await.unwrap().unwrap();

        let token = tokio_util::sync::CancellationToken::new();
        let (sink, mut observed, _stream, _inbound) = super::super::client::fake::pair();
        {
            let player = &mut game.state_mut().players[0];
            player.client = Some(Client::open(sink, token));
            player.can_answer = true;
        }
        game.state_mut().accepting_answers = true;

        answer(&mut game, 1, 2).await;

        assert_eq!(game.state().players[0].answer, 2);
        let frame = observed.recv().await.unwrap();
        assert!(matches!(&frame, super::super::WireMessage::Text(s) if s.starts_with(verbs::ANSWER_ACK)));
    }
}
