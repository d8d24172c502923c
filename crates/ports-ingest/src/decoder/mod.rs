//! Streaming port decoder
//!
//! Reads a document of the form `{"KEY": {...}, "KEY": {...}}` one member at
//! a time from an async buffered reader. Only the current key and value are
//! ever held in memory, in two scratch buffers reused across members, so the
//! document can be arbitrarily large.
//!
//! Each value is delimited structurally before it is handed to serde. A value
//! with the wrong shape therefore leaves the decoder sitting on a known
//! member boundary, and decoding can continue with the next port. Anything
//! that breaks the JSON structure, inside a value or between members (a
//! mismatched bracket, a stray token, a non-string key, a missing separator,
//! a truncated document), leaves the boundary in doubt and poisons the
//! decoder.

mod scanner;

use serde_json::error::Category;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::model::RawPort;
use scanner::{is_whitespace, ValueScanner};

/// Default upper bound for a single member value.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Decoder failures.
///
/// [`DecodeError::Value`] and [`DecodeError::RecordTooLarge`] concern a single
/// port and leave the decoder usable; everything else ends the stream.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Empty input")]
    EmptyInput,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid key: expected a string, found '{found}'")]
    KeyType { found: char },

    #[error("Port {key}: {source}")]
    Value {
        key: String,
        source: serde_json::Error,
    },

    #[error("Port {key}: record exceeds {limit} bytes")]
    RecordTooLarge { key: String, limit: usize },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder is unusable after an earlier fatal error")]
    Poisoned,

    #[error("No more ports in the input")]
    Exhausted,
}

impl DecodeError {
    /// Whether decoding may continue with the next port.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Value { .. } | DecodeError::RecordTooLarge { .. })
    }

    /// Key of the port the error belongs to, when known.
    pub fn key(&self) -> Option<&str> {
        match self {
            DecodeError::Value { key, .. } | DecodeError::RecordTooLarge { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Just after the opening `{`
    BeforeFirstKey,
    /// On the first byte of a key
    BeforeKey,
    /// After a value, before `,` or `}`
    AfterValue,
    /// The closing `}` has been consumed
    Finished,
    Poisoned,
}

/// Pull-based decoder over a single top-level JSON object of ports.
pub struct PortDecoder<R> {
    reader: R,
    position: Position,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    max_record_bytes: usize,
}

impl<R> std::fmt::Debug for PortDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortDecoder")
            .field("position", &self.position)
            .field("max_record_bytes", &self.max_record_bytes)
            .finish_non_exhaustive()
    }
}

impl<R> PortDecoder<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Open a decoder, consuming the opening `{`.
    pub async fn new(reader: R) -> Result<Self, DecodeError> {
        Self::with_max_record_bytes(reader, DEFAULT_MAX_RECORD_BYTES).await
    }

    pub async fn with_max_record_bytes(
        reader: R,
        max_record_bytes: usize,
    ) -> Result<Self, DecodeError> {
        let mut decoder = Self {
            reader,
            position: Position::BeforeFirstKey,
            key_buf: Vec::new(),
            value_buf: Vec::new(),
            max_record_bytes,
        };

        match decoder.skip_whitespace().await? {
            None => Err(DecodeError::EmptyInput),
            Some(b'{') => {
                decoder.reader.consume(1);
                Ok(decoder)
            },
            Some(other) => Err(DecodeError::MalformedInput(format!(
                "expected '{{' at start of input, found '{}'",
                other as char
            ))),
        }
    }

    /// Whether another port precedes the closing `}`.
    pub async fn has_next(&mut self) -> Result<bool, DecodeError> {
        let result = self.advance().await;
        self.settle(result)
    }

    /// Decode the next port. The member key becomes [`RawPort::key`].
    pub async fn next(&mut self) -> Result<RawPort, DecodeError> {
        let result = self.next_port().await;
        self.settle(result)
    }

    /// Combined size of the scratch buffers.
    pub fn scratch_capacity(&self) -> usize {
        self.key_buf.capacity() + self.value_buf.capacity()
    }

    /// Give back the reader. After the closing `}` it is positioned on the
    /// first byte following the document.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn settle<T>(&mut self, result: Result<T, DecodeError>) -> Result<T, DecodeError> {
        if let Err(ref e) = result {
            if !e.is_recoverable() && !matches!(e, DecodeError::Exhausted | DecodeError::Poisoned) {
                self.position = Position::Poisoned;
            }
        }
        result
    }

    async fn advance(&mut self) -> Result<bool, DecodeError> {
        match self.position {
            Position::Finished => Ok(false),
            Position::Poisoned => Err(DecodeError::Poisoned),
            Position::BeforeKey => Ok(true),
            Position::BeforeFirstKey => match self.skip_whitespace().await? {
                None => Err(DecodeError::UnexpectedEof),
                Some(b'}') => self.finish(),
                Some(_) => {
                    self.position = Position::BeforeKey;
                    Ok(true)
                },
            },
            Position::AfterValue => match self.skip_whitespace().await? {
                None => Err(DecodeError::UnexpectedEof),
                Some(b'}') => self.finish(),
                Some(b',') => {
                    self.reader.consume(1);
                    match self.skip_whitespace().await? {
                        None => Err(DecodeError::UnexpectedEof),
                        Some(b'}') => Err(DecodeError::MalformedInput(
                            "trailing comma before '}'".to_string(),
                        )),
                        Some(_) => {
                            self.position = Position::BeforeKey;
                            Ok(true)
                        },
                    }
                },
                Some(other) => Err(DecodeError::MalformedInput(format!(
                    "expected ',' or '}}' after a port, found '{}'",
                    other as char
                ))),
            },
        }
    }

    fn finish(&mut self) -> Result<bool, DecodeError> {
        self.reader.consume(1);
        self.position = Position::Finished;
        Ok(false)
    }

    async fn next_port(&mut self) -> Result<RawPort, DecodeError> {
        if !self.advance().await? {
            return Err(DecodeError::Exhausted);
        }

        let key = self.read_key().await?;

        match self.skip_whitespace().await? {
            Some(b':') => self.reader.consume(1),
            Some(other) => {
                return Err(DecodeError::MalformedInput(format!(
                    "expected ':' after key '{}', found '{}'",
                    key, other as char
                )))
            },
            None => return Err(DecodeError::UnexpectedEof),
        }

        if self.skip_whitespace().await?.is_none() {
            return Err(DecodeError::UnexpectedEof);
        }

        let fits = self.read_value(&key).await?;
        if fits && self.value_buf.is_empty() {
            return Err(DecodeError::MalformedInput(format!(
                "missing value for key '{}'",
                key
            )));
        }
        self.position = Position::AfterValue;

        if !fits {
            return Err(DecodeError::RecordTooLarge {
                key,
                limit: self.max_record_bytes,
            });
        }

        match serde_json::from_slice::<RawPort>(&self.value_buf) {
            Ok(mut port) => {
                port.key = key;
                Ok(port)
            },
            Err(source) if source.classify() == Category::Data => {
                Err(DecodeError::Value { key, source })
            },
            Err(source) => Err(DecodeError::MalformedInput(format!(
                "invalid JSON in port '{}': {}",
                key, source
            ))),
        }
    }

    async fn read_key(&mut self) -> Result<String, DecodeError> {
        match self.skip_whitespace().await? {
            Some(b'"') => {},
            Some(other) => return Err(DecodeError::KeyType { found: other as char }),
            None => return Err(DecodeError::UnexpectedEof),
        }

        self.key_buf.clear();
        let mut scanner = ValueScanner::new();
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Err(DecodeError::UnexpectedEof);
            }

            let step = scanner
                .feed(chunk)
                .map_err(|e| DecodeError::MalformedInput(format!("invalid key: {}", e)))?;
            if self.key_buf.len() + step.consumed > self.max_record_bytes {
                return Err(DecodeError::MalformedInput(format!(
                    "key exceeds {} bytes",
                    self.max_record_bytes
                )));
            }
            self.key_buf.extend_from_slice(&chunk[..step.consumed]);
            self.reader.consume(step.consumed);

            if step.complete {
                break;
            }
        }

        serde_json::from_slice::<String>(&self.key_buf)
            .map_err(|e| DecodeError::MalformedInput(format!("invalid key: {}", e)))
    }

    /// Copy the next value into `value_buf`. Returns false when the value
    /// was larger than the limit; it is then skipped rather than buffered.
    async fn read_value(&mut self, key: &str) -> Result<bool, DecodeError> {
        self.value_buf.clear();
        let mut scanner = ValueScanner::new();
        let mut fits = true;

        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                if scanner.is_open_scalar() {
                    break;
                }
                return Err(DecodeError::UnexpectedEof);
            }

            let step = scanner.feed(chunk).map_err(|e| {
                DecodeError::MalformedInput(format!("invalid JSON in port '{}': {}", key, e))
            })?;
            if fits {
                if self.value_buf.len() + step.consumed > self.max_record_bytes {
                    fits = false;
                    self.value_buf.clear();
                } else {
                    self.value_buf.extend_from_slice(&chunk[..step.consumed]);
                }
            }
            self.reader.consume(step.consumed);

            if step.complete {
                break;
            }
        }

        Ok(fits)
    }

    /// Skip JSON whitespace and peek at the next byte without consuming it.
    async fn skip_whitespace(&mut self) -> Result<Option<u8>, DecodeError> {
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(None);
            }

            match chunk.iter().position(|&b| !is_whitespace(b)) {
                Some(offset) => {
                    let byte = chunk[offset];
                    self.reader.consume(offset);
                    return Ok(Some(byte));
                },
                None => {
                    let len = chunk.len();
                    self.reader.consume(len);
                },
            }
        }
    }
}
