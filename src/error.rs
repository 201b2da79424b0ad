//! Crate-wide error kinds, grouped the way spec §7 groups them: framing,
//! protocol, lifecycle, manager and config. Plain enum + hand-rolled
//! `Display`/`Error`, matching the rest of the corpus's avoidance of
//! `thiserror`/`anyhow`.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    // Framing
    BadMessageType,
    MalformedMessage,
    MessageTooLarge,
    DataSyntax(serde_json::Error),

    // Protocol
    UnexpectedVerb { expected: &'static str, got: String },
    DuplicateHost,
    InvalidPlayerId,
    AlreadyConnected,
    Banned,
    HostNotConnected,
    InvalidAnswer,
    DuplicateNick,

    // Lifecycle
    ConnectionClosed,
    HandshakeTimeout,
    GameDeadlineExceeded,
    GameExists,

    // Manager
    DuplicateQuiz,
    QuizTooLarge,
    QuizEmpty,
    QuizParse(String),

    // Config
    UnknownKey { key: String, line: usize },
    ArrayUnclosed { line: usize },
    ConfigParse { reason: String, line: usize },
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMessageType => write!(f, "client: binary message received"),
            Error::MalformedMessage => write!(f, "client: invalid message syntax"),
            Error::MessageTooLarge => write!(f, "client: message exceeds maximum frame size"),
            Error::DataSyntax(e) => write!(f, "client: data syntax: {e}"),
            Error::UnexpectedVerb { expected, got } => {
                write!(f, "protocol: expected verb {expected:?}, got {got:?}")
            }
            Error::DuplicateHost => write!(f, "protocol: host already connected"),
            Error::InvalidPlayerId => write!(f, "protocol: invalid player identifier"),
            Error::AlreadyConnected => write!(f, "protocol: given id already connected"),
            // Spec's seed scenario 3 expects this exact close-frame reason text.
            Error::Banned => write!(f, "ID banned"),
            Error::HostNotConnected => write!(f, "protocol: host not connected"),
            Error::InvalidAnswer => write!(f, "protocol: invalid answer id"),
            Error::DuplicateNick => write!(f, "protocol: nickname already taken"),
            Error::ConnectionClosed => write!(f, "client: connection closed"),
            Error::HandshakeTimeout => write!(f, "client: handshake timeout"),
            Error::GameDeadlineExceeded => write!(f, "game: deadline exceeded"),
            Error::GameExists => write!(f, "coordinator: pin space exhausted"),
            Error::DuplicateQuiz => write!(f, "quizman: duplicate entry"),
            Error::QuizTooLarge => write!(f, "quiz: load: too large"),
            Error::QuizEmpty => write!(f, "quiz: load: empty"),
            Error::QuizParse(e) => write!(f, "quiz: load: {e}"),
            Error::UnknownKey { key, line } => {
                write!(f, "config: unknown key {key:?}: line {line}")
            }
            Error::ArrayUnclosed { line } => write!(f, "config: unclosed array: line {line}"),
            Error::ConfigParse { reason, line } => {
                write!(f, "config: parse error: {reason}: line {line}")
            }
            Error::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
