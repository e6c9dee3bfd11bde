#![forbid(unsafe_code)]

//! Connection configuration.

use std::env;

use crate::value::ObjectId;

/// Tunables for a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    /// Id of the server's root ("god") object.
    pub root_object: ObjectId,
    /// Drop server pushes that do not match the declared shape. When off,
    /// mismatches are still reported but the value is delivered.
    pub strict_shapes: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            root_object: ObjectId(1),
            strict_shapes: true,
        }
    }
}

impl ConnectionConfig {
    /// Set the root object id.
    #[must_use]
    pub fn with_root_object(mut self, id: ObjectId) -> Self {
        self.root_object = id;
        self
    }

    /// Set whether shape-mismatched pushes are dropped.
    #[must_use]
    pub fn with_strict_shapes(mut self, strict: bool) -> Self {
        self.strict_shapes = strict;
        self
    }

    /// Defaults overridden by `STARSCAPE_ROOT_OBJECT` and
    /// `STARSCAPE_STRICT_SHAPES`. Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("STARSCAPE_ROOT_OBJECT")
            && let Ok(n) = val.parse()
        {
            config.root_object = ObjectId(n);
        }
        if let Ok(val) = env::var("STARSCAPE_STRICT_SHAPES") {
            config.strict_shapes = parse_flag(&val).unwrap_or(config.strict_shapes);
        }
        config
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}
