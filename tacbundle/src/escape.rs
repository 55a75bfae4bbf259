//! Layered quoting for values that cross nested interpreters.
//!
//! A value typed by the operator (a hostname, a path, an email address used
//! as an FTP password) often travels through several interpreters before it
//! reaches the program that consumes it: the EOS CLI hands the rest of a
//! `bash` line to a shell, which may hand a script to `sh -c`, which passes a
//! URL to `curl` or `copy`. Each hop has its own metacharacters.
//!
//! [`escape`] applies a list of [`Layer`]s innermost first, each layer
//! quoting the output of the previous one.
//!
//! ```rust
//! use tacbundle::escape::{escape, Layer};
//!
//! // a password inside an ftp:// URL, inside a shell word
//! let arg = escape("a@b.com", &[Layer::Url, Layer::Shell]).unwrap();
//! assert_eq!(arg, "a%40b.com");
//! ```

use std::borrow::Cow;
use std::fmt;

use crate::error::EncodingError;

/// A quoting convention of one interpreter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Percent-encoding for a URL component (userinfo, path segment).
    Url,

    /// A single POSIX shell word.
    Shell,

    /// Contents of an existing double-quoted shell string.
    DoubleQuoted,

    /// One EOS CLI command line.
    Cli,
}

impl Layer {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Url => "url",
            Layer::Shell => "shell",
            Layer::DoubleQuoted => "double-quoted",
            Layer::Cli => "cli",
        }
    }

    /// Quote `raw` for this layer.
    ///
    /// Values with no metacharacters for the layer are returned unchanged.
    pub fn encode<'a>(&self, raw: &'a str) -> Result<Cow<'a, str>, EncodingError> {
        self.reject_unrepresentable(raw)?;

        Ok(match self {
            Layer::Url => urlencoding::encode(raw),
            Layer::Shell => quote_word(raw),
            Layer::DoubleQuoted => {
                if raw.contains(DOUBLE_QUOTED_SPECIALS) {
                    let mut out = String::with_capacity(raw.len() + 4);
                    for c in raw.chars() {
                        if DOUBLE_QUOTED_SPECIALS.contains(&c) {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    Cow::Owned(out)
                } else {
                    Cow::Borrowed(raw)
                }
            }
            Layer::Cli => Cow::Borrowed(raw),
        })
    }

    /// Reverse [`encode`](Self::encode) the way the layer's own interpreter would.
    ///
    /// Returns `None` when `encoded` is not something this layer produces.
    pub fn decode(&self, encoded: &str) -> Option<String> {
        match self {
            Layer::Url => urlencoding::decode(encoded).ok().map(Cow::into_owned),
            Layer::Shell => {
                let mut words = shell_words::split(encoded).ok()?;
                match words.len() {
                    1 => words.pop(),
                    0 if encoded.is_empty() => Some(String::new()),
                    _ => None,
                }
            }
            Layer::DoubleQuoted => {
                let mut out = String::with_capacity(encoded.len());
                let mut chars = encoded.chars();
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        let next = chars.next()?;
                        if !DOUBLE_QUOTED_SPECIALS.contains(&next) {
                            out.push(c);
                        }
                        out.push(next);
                    } else {
                        out.push(c);
                    }
                }
                Some(out)
            }
            Layer::Cli => Some(encoded.to_string()),
        }
    }

    fn reject_unrepresentable(&self, raw: &str) -> Result<(), EncodingError> {
        let bad = raw.char_indices().find(|&(_, c)| match self {
            Layer::Cli => c.is_control(),
            _ => c == '\0',
        });

        match bad {
            Some((position, character)) => Err(EncodingError {
                layer: self.name(),
                character,
                position,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const DOUBLE_QUOTED_SPECIALS: &[char] = &['\\', '"', '$', '`'];

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '_' | '-')
}

fn quote_word(raw: &str) -> Cow<'_, str> {
    if !raw.is_empty() && raw.chars().all(is_shell_safe) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for c in raw.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    Cow::Owned(out)
}

/// Quote `raw` through every layer in `layers`, innermost first.
pub fn escape(raw: &str, layers: &[Layer]) -> Result<String, EncodingError> {
    let mut value = raw.to_string();
    for layer in layers {
        value = layer.encode(&value)?.into_owned();
    }
    Ok(value)
}

/// Undo [`escape`] by decoding `layers` outermost first.
pub fn unescape(encoded: &str, layers: &[Layer]) -> Option<String> {
    let mut value = encoded.to_string();
    for layer in layers.iter().rev() {
        value = layer.decode(&value)?;
    }
    Some(value)
}
