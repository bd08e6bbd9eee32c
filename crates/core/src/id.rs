// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compact work-item identifiers.
//!
//! Every id is `{kind}-{suffix}`: a 3-char kind tag, a dash, and a
//! 16-char nanoid. The whole id fits an inline 20-byte buffer, so ids are
//! `Copy` and hash like the `str` they render as (required for
//! `Borrow<str>` map lookups). Construction folds the input to ASCII and
//! clips at capacity instead of failing; malformed ids cannot exist.

/// Kind tag length ("wko", "mut", …).
pub const KIND_LEN: usize = 3;
/// Random suffix length.
pub const SUFFIX_LEN: usize = 16;
/// Full id capacity: kind + dash + suffix.
pub const ID_CAPACITY: usize = KIND_LEN + 1 + SUFFIX_LEN;

/// Clip a string to at most `max` bytes, backing off to a UTF-8 char
/// boundary. Safe for arbitrary text (error details, fetched bodies,
/// query previews).
pub fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Inline ASCII id: `{kind}-{suffix}`, at most [`ID_CAPACITY`] bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortId {
    buf: [u8; ID_CAPACITY],
    len: u8,
}

impl ShortId {
    /// Generate `{kind}-{random}` with a fresh [`SUFFIX_LEN`]-char nanoid.
    /// The kind tag is lowercased and clamped to [`KIND_LEN`] chars.
    pub fn generate(kind: &str) -> Self {
        let mut raw = String::with_capacity(ID_CAPACITY);
        for c in kind.chars().filter(|c| c.is_ascii_alphanumeric()).take(KIND_LEN) {
            raw.push(c.to_ascii_lowercase());
        }
        raw.push('-');
        raw.push_str(&nanoid::nanoid!(SUFFIX_LEN));
        Self::parse(&raw)
    }

    /// Parse an existing id. Input beyond [`ID_CAPACITY`] chars is clipped;
    /// non-ASCII chars are folded to `_` so the buffer is ASCII by
    /// construction and rendering never fails.
    pub fn parse(raw: &str) -> Self {
        let mut buf = [0u8; ID_CAPACITY];
        let mut len = 0u8;
        for c in raw.chars().take(ID_CAPACITY) {
            buf[len as usize] = if c.is_ascii() { c as u8 } else { b'_' };
            len += 1;
        }
        Self { buf, len }
    }

    pub fn as_str(&self) -> &str {
        // ASCII by construction, so UTF-8 validity is free.
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    /// The part after the kind tag's dash (the whole id if there is none).
    pub fn suffix(&self) -> &str {
        let s = self.as_str();
        s.split_once('-').map_or(s, |(_, rest)| rest)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::hash::Hash for ShortId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Must match str::hash so Borrow<str> map lookups resolve.
        self.as_str().hash(state);
    }
}

impl std::borrow::Borrow<str> for ShortId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ShortId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for ShortId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Owned decode: works from both raw JSON and Value trees.
        let s = String::deserialize(deserializer)?;
        Ok(ShortId::parse(&s))
    }
}

/// Define a newtype id with a fixed kind tag.
///
/// Generates `new()` (random), `from_string()` (lenient parse), `as_str()`,
/// `suffix()`, `short()`, plus `Display`, `From<&str>`, `From<String>`, and
/// `Borrow<str>`.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the id type.
///     pub struct WorkOrderId("wko");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($kind:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name($crate::id::ShortId);

        impl $name {
            /// Kind tag rendered ahead of the random suffix.
            pub const KIND: &'static str = $kind;

            /// Generate a new random id.
            pub fn new() -> Self {
                Self($crate::id::ShortId::generate($kind))
            }

            /// Adopt an existing id string (clipped and ASCII-folded).
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self($crate::id::ShortId::parse(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// The random suffix without the kind tag.
            pub fn suffix(&self) -> &str {
                self.0.suffix()
            }

            /// At most `n` chars of the suffix, for compact display.
            pub fn short(&self, n: usize) -> &str {
                $crate::id::clip(self.0.suffix(), n)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
