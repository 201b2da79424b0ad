//! Per-session game actor: PIN, state machine, scoring, leaderboard.
//!
//! Grounded on `game/game.go` for the actor shape (PIN/action-inbox/
//! request-inbox/reaper-channel/cancellable-context) and on spec.md §4.5 for
//! the state-function machine, which has no counterpart in the retrieved
//! original source (its `game.go` runs a flat `select`/`Perform` loop with no
//! state functions at all) — the state machine below is this expansion's
//! realization of that section, kept in the teacher's/original's
//! channel-actor idiom.

pub mod action;
pub mod client;
pub mod coordinator;
pub mod host;
pub mod player;
pub mod scoring;

pub use action::Action;
pub use client::{Client, ClientReader, TransportError, WireMessage, WireSink, WireStream};

use std::fmt;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::quiz::Quiz;

/// Lower bound of a valid PIN, inclusive.
pub const MIN_GAME_PIN: u32 = 1_111_111_111;
/// Upper bound of a valid PIN, inclusive.
pub const MAX_GAME_PIN: u32 = 4_294_967_295;
/// Below this many players, `StartGame` logs a warning but still proceeds —
/// preserved as observed in the original rather than turned into a hard
/// rejection (spec §9).
pub const MIN_PLAYERS: usize = 3;
/// Fixed pre-reveal countdown shown before a question's answers are
/// unlocked, independent of the question's own duration (spec §9 keeps this
/// as observed in the original).
pub const QUESTION_COUNTDOWN: Duration = Duration::from_secs(5);
/// Bound on the off-actor player-connect handshake (spec §4.5/§9).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default hard deadline for a game, reused by [`crate::config`].
pub const DEFAULT_GAME_TIMEOUT: Duration = Duration::from_secs(45 * 60);

/// The wire verbs exchanged over an open connection (spec §4.7).
pub mod verbs {
    // server -> client
    pub const GAME_COUNTDOWN: &str = "gcount";
    pub const QUESTION_COUNTDOWN: &str = "count";
    pub const QUESTION: &str = "ques";
    pub const ANSWER_ACK: &str = "ansack";
    pub const QUESTION_END: &str = "qend";
    pub const RESULTS: &str = "res";
    pub const GAME_END: &str = "end";
    pub const PLAYER_JOINED: &str = "plr";
    pub const PLAYER_REMOVED: &str = "rmplr";
    pub const PLAYER_DISCONNECTED: &str = "dcplr";
    pub const START_ACK: &str = "sack";

    // client -> server
    pub const IDENT: &str = "ident";
    pub const HOST: &str = "host";
    pub const ANSWER: &str = "ans";
    pub const KICK: &str = "kick";
    pub const COUNT: &str = "count";
    pub const START: &str = "start";
    pub const NEXT: &str = "next";
}

/// A 10-digit game identifier, uniform-random over
/// `[MIN_GAME_PIN, MAX_GAME_PIN]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pin(pub u32);

impl Pin {
    /// `true` for any value in the inclusive valid range. The original's
    /// `Validate` reads `p < MaxGamePin && p < MinGamePin`, which can never
    /// be true for a `p` at or above `MinGamePin` — spec §9 treats this as a
    /// bug and this implements the evidently-intended bound.
    pub fn validate(self) -> bool {
        self.0 >= MIN_GAME_PIN && self.0 <= MAX_GAME_PIN
    }

    pub fn generate() -> Pin {
        Pin(rand::rng().random_range(MIN_GAME_PIN..=MAX_GAME_PIN))
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    HostWaiting,
    Waiting,
    Running,
    Dead,
}

/// A single registered participant. `id` is this player's 1-based index
/// into `GameState::players`, fixed at join time.
pub struct Player {
    pub id: usize,
    pub nick: String,
    pub score: i64,
    pub correct: u32,
    pub streak: u32,
    pub banned: bool,
    pub connected: bool,
    pub client: Option<Client>,

    /// True only between `StartAnswer` and `EndAnswer` for the current
    /// question.
    pub can_answer: bool,
    /// 1-based selected answer index; 0 means "no answer yet". Reset to 0
    /// on `NextQuestion`.
    pub answer: u32,
    pub answered_at: Option<Instant>,
}

impl Player {
    fn new(id: usize, nick: String) -> Player {
        Player {
            id,
            nick,
            score: 0,
            correct: 0,
            streak: 0,
            banned: false,
            connected: false,
            client: None,
            can_answer: false,
            answer: 0,
            answered_at: None,
        }
    }

    fn info(&self) -> PlayerInfo {
        PlayerInfo { id: self.id, name: self.nick.clone(), score: self.score, correct: self.correct, streak: self.streak }
    }
}

/// Wire body for a player summary: `{id, name, score, correct, streak}`
/// (spec §4.7).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlayerInfo {
    pub id: usize,
    pub name: String,
    pub score: i64,
    pub correct: u32,
    pub streak: u32,
}

pub struct Host {
    pub client: Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndKind {
    Clean,
    Terminate,
}

/// Snapshot of [`GameState`] suitable for sending across the state-request
/// channel; a value copy so the requester never observes a mutation mid-way.
#[derive(Debug, Clone)]
pub struct GameStateSnapshot {
    pub status: Status,
    pub host_connected: bool,
    pub players: Vec<PlayerInfo>,
    pub current_question: usize,
}

/// Live game state, owned exclusively by the actor task; never touched from
/// outside (spec §3, §9).
pub struct GameState {
    pub status: Status,
    pub host: Option<Host>,
    pub players: Vec<Player>,
    pub current_question: usize,
    pub countdown_done: bool,
    pub accepting_answers: bool,
    pub question_skipped: bool,
    pub last_player: Option<usize>,
    pub answers_at: Option<Instant>,
}

impl GameState {
    fn new() -> GameState {
        GameState {
            status: Status::HostWaiting,
            host: None,
            players: Vec::new(),
            current_question: 0,
            countdown_done: false,
            accepting_answers: false,
            question_skipped: false,
            last_player: None,
            answers_at: None,
        }
    }

    fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            status: self.status,
            host_connected: self.host.is_some(),
            players: self.players.iter().map(Player::info).collect(),
            current_question: self.current_question,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateFn {
    WaitForHost,
    Sustain,
    Question,
    AcceptAnswers,
    GameEnding,
    GameTerminate,
}

/// One running game session. Construct via [`crate::game::coordinator::Coordinator::create_game`];
/// `run` is the actor's entire lifetime.
pub struct Game {
    pub pin: Pin,
    pub quiz: Quiz,
    pub actions: mpsc::Sender<Action>,
    action_rx: mpsc::Receiver<Action>,
    pub requests: mpsc::Sender<oneshot::Sender<GameStateSnapshot>>,
    request_rx: mpsc::Receiver<oneshot::Sender<GameStateSnapshot>>,
    reaper: mpsc::Sender<Pin>,
    pub token: CancellationToken,

    state: GameState,
    question_emitted: bool,
    pending_question: bool,
    pending_end: Option<EndKind>,
}

impl Game {
    pub fn new(pin: Pin, quiz: Quiz, reaper: mpsc::Sender<Pin>, deadline: Duration) -> Game {
        let (action_tx, action_rx) = mpsc::channel(64);
        let (request_tx, request_rx) = mpsc::channel(8);
        let token = CancellationToken::new();

        let deadline_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            deadline_token.cancel();
        });

        Game {
            pin,
            quiz,
            actions: action_tx,
            action_rx,
            requests: request_tx,
            request_rx,
            reaper,
            token,
            state: GameState::new(),
            question_emitted: false,
            pending_question: false,
            pending_end: None,
        }
    }

    /// The actor's entire lifetime: dispatch actions and state-requests,
    /// then drive the state-function chain to a fixpoint after each, until a
    /// terminal state or deadline is reached. Mirrors the original's flat
    /// `select`/`Perform` loop, generalized with the state-function tick
    /// spec.md §4.5 adds.
    ///
    /// A single inbox arrival may trigger more than one state transition in
    /// a row — e.g. `StartGame`/`NextQuestion` only flip `pending_question`,
    /// which `tick_sustain` consumes to move to `Question`, and `Question`'s
    /// own tick is what actually emits the question and spawns its
    /// countdown timer. Ticking only once per arrival would leave that
    /// transition requested but never acted on until some unrelated message
    /// happened to wake the actor again. So each iteration re-ticks until
    /// the returned state function stops changing (or goes terminal).
    pub async fn run(mut self) {
        let mut current = StateFn::WaitForHost;

        'outer: loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    break;
                }
                action = self.action_rx.recv() => {
                    match action {
                        Some(action) => action.perform(&mut self).await,
                        None => break,
                    }
                }
                request = self.request_rx.recv() => {
                    match request {
                        Some(reply) => { let _ = reply.send(self.state.snapshot()); }
                        None => break,
                    }
                }
            }

            loop {
                match self.tick(current).await {
                    Some(next) if next == current => {
                        current = next;
                        break;
                    }
                    Some(next) => current = next,
                    None => break 'outer,
                }
            }
        }

        self.state.status = Status::Dead;
        tracing::info!(pin = %self.pin, "game ended");
        let _ = self.reaper.send(self.pin).await;
        self.token.cancel();
    }

    pub(crate) fn state(&self) -> &GameState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub(crate) fn set_pending_question(&mut self) {
        self.pending_question = true;
    }

    pub(crate) fn set_pending_end(&mut self, kind: EndKind) {
        self.pending_end = Some(kind);
    }

    /// Sends `body` to the host under `verb`, if a host is connected.
    pub(crate) async fn notify_host<T: serde::Serialize>(&self, verb: &str, body: &T) {
        if let Some(host) = &self.state.host {
            host.client.send_message(verb, Some(body)).await;
        }
    }

    pub(crate) fn spawn_answer_timer(&self, allowed: Duration) {
        let actions = self.actions.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(allowed) => {
                    let _ = actions.send(Action::EndAnswer).await;
                }
                _ = token.cancelled() => {}
            }
        });
    }

    async fn tick(&mut self, current: StateFn) -> Option<StateFn> {
        match current {
            StateFn::WaitForHost => Some(self.tick_wait_for_host()),
            StateFn::Sustain => Some(self.tick_sustain()),
            StateFn::Question => Some(self.tick_question().await),
            StateFn::AcceptAnswers => Some(self.tick_accept_answers().await),
            StateFn::GameEnding => None,
            StateFn::GameTerminate => None,
        }
    }

    fn tick_wait_for_host(&mut self) -> StateFn {
        if self.state.host.is_some() {
            self.state.status = Status::Waiting;
            StateFn::Sustain
        } else {
            StateFn::WaitForHost
        }
    }

    fn tick_sustain(&mut self) -> StateFn {
        if let Some(kind) = self.pending_end.take() {
            return match kind {
                EndKind::Clean => StateFn::GameEnding,
                EndKind::Terminate => StateFn::GameTerminate,
            };
        }
        if self.pending_question {
            self.pending_question = false;
            return StateFn::Question;
        }
        StateFn::Sustain
    }

    async fn tick_question(&mut self) -> StateFn {
        if let Some(kind) = self.pending_end.take() {
            return match kind {
                EndKind::Clean => StateFn::GameEnding,
                EndKind::Terminate => StateFn::GameTerminate,
            };
        }

        // `NextQuestion` past the last index means the host has exhausted the
        // quiz; spec.md names no dedicated "end of quiz" verb, so running out
        // of questions is itself the signal to clean-end the game.
        if self.state.current_question >= self.quiz.questions.len() {
            action::end_game(self, true, "quiz complete".to_string()).await;
            return match self.pending_end.take() {
                Some(EndKind::Terminate) => StateFn::GameTerminate,
                _ => StateFn::GameEnding,
            };
        }

        if !self.state.countdown_done {
            if !self.question_emitted {
                self.question_emitted = true;
                self.emit_question_countdown().await;
                self.spawn_countdown_timer();
            }
            return StateFn::Question;
        }

        self.state.accepting_answers = true;
        self.question_emitted = false;
        StateFn::AcceptAnswers
    }

    async fn emit_question_countdown(&self) {
        let total = self.quiz.questions.len();
        let index = self.state.current_question;
        if let Some(question) = self.quiz.questions.get(index) {
            if let Some(host) = &self.state.host {
                host.client
                    .send_value(verbs::QUESTION, &serde_json::json!({"index": index, "total": total, "title": question.title}))
                    .await;
            }
            for player in &self.state.players {
                if let Some(client) = &player.client {
                    client
                        .send_value(verbs::QUESTION_COUNTDOWN, &serde_json::json!({"seconds": QUESTION_COUNTDOWN.as_secs()}))
                        .await;
                }
            }
        }
    }

    fn spawn_countdown_timer(&self) {
        let actions = self.actions.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(QUESTION_COUNTDOWN) => {
                    let _ = actions.send(Action::StartAnswer).await;
                }
                _ = token.cancelled() => {}
            }
        });
    }

    async fn tick_accept_answers(&mut self) -> StateFn {
        let pending: Vec<usize> = self
            .state
            .players
            .iter()
            .filter(|p| p.connected && p.can_answer && p.answer == 0)
            .map(|p| p.id)
            .collect();

        if pending.len() == 1 {
            self.state.last_player = pending.first().copied();
        }

        if !pending.is_empty() && !self.state.question_skipped {
            return StateFn::AcceptAnswers;
        }

        self.end_question().await;
        StateFn::Sustain
    }

    async fn end_question(&mut self) {
        let allowed = self
            .quiz
            .questions
            .get(self.state.current_question)
            .map(|q| q.duration)
            .unwrap_or(0);
        let answers_at = self.state.answers_at;

        self.state.accepting_answers = false;
        self.state.countdown_done = false;
        self.state.question_skipped = false;
        self.state.last_player = None;
        self.state.answers_at = None;

        let correct_answer = self
            .quiz
            .questions
            .get(self.state.current_question)
            .and_then(|q| q.answers.iter().position(|a| a.correct))
            .map(|i| i as u32 + 1);

        for player in &mut self.state.players {
            let was_correct = player.answer != 0 && Some(player.answer) == correct_answer;
            let taken = match (player.answered_at, answers_at) {
                (Some(at), Some(start)) => at.saturating_duration_since(start).as_secs() as u32,
                _ => allowed,
            };
            let taken = taken.min(allowed);

            if was_correct {
                player.streak += 1;
                player.correct += 1;
            } else {
                player.streak = 0;
            }

            let points = scoring::score(was_correct, taken, allowed, player.streak);
            player.score += points;

            player.can_answer = false;
            player.answer = 0;
            player.answered_at = None;

            if let Some(client) = &player.client {
                let info = player.info();
                client
                    .send_value(
                        verbs::QUESTION_END,
                        &serde_json::json!({"player": info, "correct": was_correct, "points": points}),
                    )
                    .await;
            }
        }

        if let Some(host) = &self.state.host {
            host.client.send_value(verbs::QUESTION_END, &serde_json::Value::Null).await;

            let mut board: Vec<PlayerInfo> = self.state.players.iter().map(Player::info).collect();
            board.sort_by(|a, b| b.score.cmp(&a.score));
            board.truncate(6);
            host.client.send_message(verbs::RESULTS, Some(&board)).await;
        }
    }
}
