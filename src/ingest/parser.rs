//! Notification line parser
//!
//! A notification is one text line carrying `username address port`.
//! Tokens are separated by runs of whitespace unless a single delimiter
//! character is configured, in which case every occurrence splits. The
//! username may not contain the delimiter; such lines are rejected rather
//! than guessed at.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// A structurally valid login notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub source_address: IpAddr,
    pub source_port: u16,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Address,
    Port,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Username => f.write_str("username"),
            Field::Address => f.write_str("address"),
            Field::Port => f.write_str("port"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("payload is empty")]
    Empty,
    #[error("payload is not valid UTF-8")]
    Encoding,
    #[error("missing {0} field")]
    MissingField(Field),
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("unexpected trailing token '{0}'")]
    UnexpectedToken(String),
}

/// Token grammar of the inbound line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadGrammar {
    /// `None` splits on any run of whitespace
    delimiter: Option<char>,
}

impl PayloadGrammar {
    pub fn whitespace() -> Self {
        Self { delimiter: None }
    }

    pub fn delimited(delimiter: char) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    pub fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    /// Render an event in this grammar (used by the notify CLI)
    pub fn format(&self, username: &str, address: &str, port: u16) -> String {
        let sep = self.delimiter.unwrap_or(' ');
        format!("{username}{sep}{address}{sep}{port}")
    }

    pub fn parse(&self, raw: &[u8]) -> Result<ParsedEvent, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::Encoding)?;
        let line = text.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let tokens: Vec<&str> = match self.delimiter {
            None => line.split_whitespace().collect(),
            Some(d) => line.split(d).map(str::trim).collect(),
        };
        let mut tokens = tokens.into_iter();

        let username = next_token(&mut tokens, Field::Username)?;
        let address = next_token(&mut tokens, Field::Address)?;
        let port = next_token(&mut tokens, Field::Port)?;

        if let Some(extra) = tokens.next() {
            return Err(ParseError::UnexpectedToken(extra.to_string()));
        }

        let source_address = address
            .parse::<IpAddr>()
            .map_err(|_| ParseError::InvalidAddress(address.to_string()))?;
        let source_port = match port.parse::<u16>() {
            Ok(p) if p != 0 => p,
            _ => return Err(ParseError::InvalidPort(port.to_string())),
        };

        Ok(ParsedEvent {
            source_address,
            source_port,
            username: username.to_string(),
        })
    }
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    field: Field,
) -> Result<&'a str, ParseError> {
    match tokens.next() {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ParseError::MissingField(field)),
    }
}

/// Parse with the default whitespace grammar
pub fn parse(raw: &[u8]) -> Result<ParsedEvent, ParseError> {
    PayloadGrammar::default().parse(raw)
}
