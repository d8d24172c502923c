//! JSON value boundary scanner
//!
//! Finds where a single JSON value ends without interpreting it. The decoder
//! feeds it whatever the reader has buffered, chunk by chunk, so a value can
//! be delimited (and skipped when oversized) before serde ever sees it.

/// Deepest nesting accepted inside one value, matching serde_json's own
/// recursion limit.
pub(crate) const MAX_DEPTH: usize = 128;

/// Bytes that end a bare scalar (number, `true`, `false`, `null`) without
/// being part of it.
fn ends_scalar(byte: u8) -> bool {
    matches!(byte, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r')
}

pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Structure errors that make the end of a value unknowable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ScanError {
    #[error("expected '{expected}', found '{found}'")]
    MismatchedCloser { expected: char, found: char },

    #[error("unexpected '{0}' inside a bare value")]
    OpenerInScalar(char),

    #[error("nesting deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `{...}` or `[...]`
    Container,
    /// `"..."`
    String,
    /// Anything else, terminated by a delimiter
    Scalar,
}

/// Outcome of feeding one chunk to the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    /// Bytes of the chunk that belong to the value
    pub consumed: usize,
    /// The value ended inside this chunk
    pub complete: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ValueScanner {
    shape: Option<Shape>,
    depth: usize,
    /// Bit `n` set when nesting level `n` was opened by `{`, clear for `[`.
    braces: u128,
    in_string: bool,
    escaped: bool,
}

impl ValueScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk. The first byte of the first chunk must be the
    /// first byte of the value (leading whitespace already skipped).
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Step, ScanError> {
        for (i, &byte) in chunk.iter().enumerate() {
            let shape = match self.shape {
                Some(shape) => shape,
                None => {
                    let shape = match byte {
                        b'{' | b'[' => {
                            self.open(byte)?;
                            Shape::Container
                        },
                        b'"' => {
                            self.in_string = true;
                            Shape::String
                        },
                        _ if ends_scalar(byte) => {
                            // Empty value such as `"key": ,`
                            return Ok(Step { consumed: i, complete: true });
                        },
                        _ => Shape::Scalar,
                    };
                    self.shape = Some(shape);
                    continue;
                },
            };

            match shape {
                Shape::Scalar => {
                    if ends_scalar(byte) {
                        return Ok(Step { consumed: i, complete: true });
                    }
                    if matches!(byte, b'{' | b'[' | b'"') {
                        return Err(ScanError::OpenerInScalar(byte as char));
                    }
                },
                Shape::String => {
                    if self.string_byte(byte) {
                        return Ok(Step { consumed: i + 1, complete: true });
                    }
                },
                Shape::Container => {
                    if self.in_string {
                        self.string_byte(byte);
                        continue;
                    }
                    match byte {
                        b'"' => self.in_string = true,
                        b'{' | b'[' => self.open(byte)?,
                        b'}' | b']' => {
                            self.close(byte)?;
                            if self.depth == 0 {
                                return Ok(Step { consumed: i + 1, complete: true });
                            }
                        },
                        _ => {},
                    }
                },
            }
        }

        Ok(Step {
            consumed: chunk.len(),
            complete: false,
        })
    }

    /// Whether a scalar may legitimately end at end of input.
    pub fn is_open_scalar(&self) -> bool {
        self.shape == Some(Shape::Scalar)
    }

    fn open(&mut self, opener: u8) -> Result<(), ScanError> {
        if self.depth == MAX_DEPTH {
            return Err(ScanError::TooDeep);
        }
        let bit = 1u128 << self.depth;
        if opener == b'{' {
            self.braces |= bit;
        } else {
            self.braces &= !bit;
        }
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self, closer: u8) -> Result<(), ScanError> {
        self.depth -= 1;
        let expected = if self.braces & (1u128 << self.depth) != 0 {
            b'}'
        } else {
            b']'
        };
        if closer != expected {
            return Err(ScanError::MismatchedCloser {
                expected: expected as char,
                found: closer as char,
            });
        }
        Ok(())
    }

    /// Advance string state by one byte; returns true on the closing quote.
    fn string_byte(&mut self, byte: u8) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match byte {
            b'\\' => {
                self.escaped = true;
                false
            },
            b'"' => {
                self.in_string = false;
                true
            },
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn scan_all(input: &[u8]) -> Step {
        ValueScanner::new().feed(input).unwrap()
    }

    #[test]
    fn test_object_with_nested_containers() {
        let input = br#"{"a": [1, {"b": 2}], "c": "}"} , "next""#;
        let step = scan_all(input);

        assert!(step.complete);
        assert_eq!(&input[..step.consumed], br#"{"a": [1, {"b": 2}], "c": "}"}"#);
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let input = br#"{"name": "say \"}\" twice"}rest"#;
        let step = scan_all(input);

        assert!(step.complete);
        assert_eq!(&input[..step.consumed], br#"{"name": "say \"}\" twice"}"#);
    }

    #[test]
    fn test_string_value() {
        let input = br#""a\\"  ,"#;
        let step = scan_all(input);

        assert!(step.complete);
        assert_eq!(&input[..step.consumed], br#""a\\""#);
    }

    #[test]
    fn test_scalar_stops_before_delimiter() {
        let step = scan_all(b"12.5e3}");
        assert_eq!(step, Step { consumed: 6, complete: true });

        let step = scan_all(b"null ,");
        assert_eq!(step, Step { consumed: 4, complete: true });
    }

    #[test]
    fn test_empty_value() {
        let step = scan_all(b", \"k\"");
        assert_eq!(step, Step { consumed: 0, complete: true });
    }

    #[test]
    fn test_value_split_across_chunks() {
        let mut scanner = ValueScanner::new();

        let first = scanner.feed(br#"{"name": "a\"#).unwrap();
        assert_eq!(first, Step { consumed: 12, complete: false });

        let second = scanner.feed(br#""b", "x": [1]} ,"#).unwrap();
        assert!(second.complete);
        assert_eq!(second.consumed, 14);
    }

    #[test]
    fn test_open_scalar_at_chunk_end() {
        let mut scanner = ValueScanner::new();
        let step = scanner.feed(b"123").unwrap();

        assert!(!step.complete);
        assert!(scanner.is_open_scalar());
    }

    #[test]
    fn test_key_scanner() {
        let input = br#""AE\"AB": {"#;
        let step = ValueScanner::new().feed(input).unwrap();

        assert!(step.complete);
        assert_eq!(&input[..step.consumed], br#""AE\"AB""#);
    }

    #[test]
    fn test_mismatched_closer() {
        let err = ValueScanner::new().feed(br#"{"x": [1}, "B": {}}"#).unwrap_err();
        assert_eq!(
            err,
            ScanError::MismatchedCloser {
                expected: ']',
                found: '}'
            }
        );
    }

    #[test]
    fn test_mismatched_closer_across_chunks() {
        let mut scanner = ValueScanner::new();
        assert!(!scanner.feed(b"[{\"a\": 1").unwrap().complete);
        assert!(scanner.feed(b"]]").is_err());
    }

    #[test]
    fn test_opener_inside_scalar() {
        let err = ValueScanner::new().feed(br#"t{"x":1}, "B""#).unwrap_err();
        assert_eq!(err, ScanError::OpenerInScalar('{'));

        assert!(ValueScanner::new().feed(br#"12"x", "#).is_err());
        assert!(ValueScanner::new().feed(b"nul[l]").is_err());
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let input = br#"{"a": "[}", "b": ["{"]} ,"#;
        let step = scan_all(input);

        assert!(step.complete);
        assert_eq!(&input[..step.consumed], br#"{"a": "[}", "b": ["{"]}"#);
    }

    #[test]
    fn test_nesting_limit() {
        let at_limit = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(scan_all(at_limit.as_bytes()).complete);

        let too_deep = "[".repeat(MAX_DEPTH + 1);
        assert_eq!(
            ValueScanner::new().feed(too_deep.as_bytes()),
            Err(ScanError::TooDeep)
        );
    }
}
