//! Wire frame codec: one-line text frames of the form `<verb> <json-body>`.
//!
//! Grounded on the original `game/client.go` `StringMessage`/`ParseMessage`/
//! `FormatMessage` trio; kept as free functions here since they carry no
//! state of their own.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Maximum size, in bytes, of a single inbound frame.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Splits a raw frame into its verb and the remaining JSON payload text.
///
/// Fails with [`Error::MessageTooLarge`] if the frame exceeds
/// [`MAX_MESSAGE_SIZE`] bytes, or [`Error::MalformedMessage`] if no space
/// separator is present.
pub fn parse(frame: &str) -> Result<(&str, &str)> {
    if frame.len() > MAX_MESSAGE_SIZE {
        return Err(Error::MessageTooLarge);
    }
    match frame.split_once(' ') {
        Some((verb, rest)) => Ok((verb, rest)),
        None => Err(Error::MalformedMessage),
    }
}

/// Splits a raw frame and JSON-decodes the payload into `T`.
///
/// Fails with [`Error::MalformedMessage`] on missing separator, or
/// [`Error::DataSyntax`] if the payload does not decode into `T`.
pub fn parse_into<T: DeserializeOwned>(frame: &str) -> Result<(&str, T)> {
    let (verb, rest) = parse(frame)?;
    let data = serde_json::from_str(rest).map_err(Error::DataSyntax)?;
    Ok((verb, data))
}

/// Encodes `verb` and `body` into a wire frame. A `None` body yields an
/// empty payload rather than the literal `null`.
pub fn format<T: Serialize>(verb: &str, body: Option<&T>) -> String {
    let payload = match body {
        Some(b) => serde_json::to_string(b).unwrap_or_default(),
        None => String::new(),
    };
    format!("{verb} {payload}")
}

/// Encodes a frame whose body is already a [`serde_json::Value`], treating
/// [`serde_json::Value::Null`] the same as no body.
pub fn format_value(verb: &str, body: &serde_json::Value) -> String {
    if body.is_null() {
        format!("{verb} ")
    } else {
        format!("{verb} {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Body {
        n: u32,
    }

    #[test]
    fn parse_splits_on_first_space() {
        let (verb, rest) = parse("ans {\"n\":1}").unwrap();
        assert_eq!(verb, "ans");
        assert_eq!(rest, "{\"n\":1}");
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(matches!(parse("start"), Err(Error::MalformedMessage)));
    }

    #[test]
    fn parse_into_decodes_body() {
        let (verb, body): (_, Body) = parse_into("foo {\"n\":7}").unwrap();
        assert_eq!(verb, "foo");
        assert_eq!(body, Body { n: 7 });
    }

    #[test]
    fn parse_into_rejects_bad_json() {
        let res: Result<(_, Body)> = parse_into("foo not-json");
        assert!(matches!(res, Err(Error::DataSyntax(_))));
    }

    #[test]
    fn format_round_trips() {
        let body = Body { n: 42 };
        let frame = format("foo", Some(&body));
        let (verb, decoded): (_, Body) = parse_into(&frame).unwrap();
        assert_eq!(verb, "foo");
        assert_eq!(decoded, body);
    }

    #[test]
    fn format_with_no_body_is_empty_payload() {
        let frame = format::<()>("start", None);
        assert_eq!(frame, "start ");
    }

    #[test]
    fn frame_of_exactly_max_size_is_accepted() {
        let filler = "a".repeat(MAX_MESSAGE_SIZE - "verb ".len());
        let frame = format!("verb {filler}");
        assert_eq!(frame.len(), MAX_MESSAGE_SIZE);
        assert!(parse(&frame).is_ok());
    }

    #[test]
    fn frame_one_byte_over_max_size_is_rejected() {
        let filler = "a".repeat(MAX_MESSAGE_SIZE - "verb ".len() + 1);
        let frame = format!("verb {filler}");
        assert_eq!(frame.len(), MAX_MESSAGE_SIZE + 1);
        assert!(matches!(parse(&frame), Err(Error::MessageTooLarge)));
    }
}
