//! Text configuration parser: `key: value` lines, with `proxies` spanning a
//! bracketed array across multiple lines.
//!
//! Grounded on the original `config/parse.go`, generalized the way spec §6
//! requires: the original never parsed arrays, so the array reader below
//! (`parse_array`) is new, but mirrors the original's line-scanning style
//! and its `"line %d"`-suffixed error reporting.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::game::DEFAULT_GAME_TIMEOUT;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub listen_addr: String,
    pub listen_port: u16,
    pub trusted_proxies: Vec<String>,
    pub game_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 3000,
            trusted_proxies: Vec::new(),
            game_timeout: DEFAULT_GAME_TIMEOUT,
        }
    }
}

impl Config {
    /// Full address in the form expected by a TCP listener.
    pub fn full_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    pub fn load(path: &str) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        parse(&text)
    }
}

/// Parses the text config format into a [`Config`], starting from
/// [`Config::default`] and overwriting each recognized key as encountered.
pub fn parse(text: &str) -> Result<Config> {
    let mut cfg = Config::default();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0usize;

    while i < lines.len() {
        let num = i + 1;
        let line = lines[i];
        i += 1;

        if line.trim_start().starts_with("//") {
            continue;
        }

        let Some((key_raw, trail_raw)) = line.split_once(':') else {
            continue;
        };
        let key = key_raw.trim().to_lowercase();
        let trail = trail_raw.trim_matches(|c| c == ' ' || c == '\t');

        match key.as_str() {
            "addr" => cfg.listen_addr = trail.to_string(),
            "port" => {
                let port: u64 = trail.parse().map_err(|_| parse_err("invalid port", num))?;
                if port < 1 || port > 65535 {
                    return Err(parse_err("port out of range", num));
                }
                cfg.listen_port = port as u16;
            }
            "game_timeout" => {
                let secs: i64 = trail
                    .parse()
                    .map_err(|_| parse_err("invalid game_timeout", num))?;
                cfg.game_timeout = if secs <= 0 {
                    DEFAULT_GAME_TIMEOUT
                } else {
                    Duration::from_secs(secs as u64)
                };
            }
            "proxies" => {
                let (arr, consumed) = parse_array(&lines[i..], trail, num)?;
                cfg.trusted_proxies = arr;
                i += consumed;
            }
            other => {
                return Err(Error::UnknownKey { key: other.to_string(), line: num });
            }
        }
    }

    Ok(cfg)
}

fn parse_err(reason: &str, line: usize) -> Error {
    Error::ConfigParse { reason: reason.to_string(), line }
}

/// Parses an array value, either inline (a bare scalar stands for a
/// single-element array) or bracketed:
///
/// ```text
/// proxies: [
/// 10.0.0.1
/// 10.0.0.2
/// ]
/// ```
///
/// `trail` is the text following `key:` on the opening line; `rest` is every
/// line following it. Returns the parsed elements and how many lines of
/// `rest` were consumed. If `trail` is exactly `[`, array elements are read
/// one per line until a line that is exactly `]`; running out of input, or
/// hitting a blank line, first is `ArrayUnclosed`.
fn parse_array(rest: &[&str], trail: &str, start_line: usize) -> Result<(Vec<String>, usize)> {
    if trail != "[" {
        if trail.is_empty() {
            return Ok((Vec::new(), 0));
        }
        return Ok((vec![trail.to_string()], 0));
    }

    let mut out = Vec::new();
    for (offset, line) in rest.iter().enumerate() {
        if *line == "]" {
            return Ok((out, offset + 1));
        }
        if line.is_empty() {
            return Err(Error::ArrayUnclosed { line: start_line + offset + 1 });
        }
        out.push((*line).to_string());
    }

    Err(Error::ArrayUnclosed { line: start_line })
}
