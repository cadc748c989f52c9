use crate::error::{Error, Result};

/// Default key expression prefix for all emonlink payloads.
pub const KEY_PREFIX: &str = "emonlink";

/// Builder for payload key expressions.
///
/// Key expressions follow the pattern:
/// `<prefix>/<channel>/<node_id>`
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl Default for KeyExprBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExprBuilder {
    /// Create a builder using [`KEY_PREFIX`].
    pub fn new() -> Self {
        Self {
            prefix: KEY_PREFIX.to_string(),
        }
    }

    /// Create a builder with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix this builder prepends.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the key a node's payload is published to on one channel.
    ///
    /// # Example
    /// ```
    /// use emonlink_common::keyexpr::KeyExprBuilder;
    ///
    /// let key = KeyExprBuilder::new().build("ToEmonCMS", "10");
    /// assert_eq!(key, "emonlink/ToEmonCMS/10");
    /// ```
    pub fn build(&self, channel: &str, node_id: &str) -> String {
        format!("{}/{}/{}", self.prefix, channel, node_id)
    }

    /// Wildcard matching every node published on a channel.
    ///
    /// # Example
    /// ```
    /// use emonlink_common::keyexpr::KeyExprBuilder;
    ///
    /// assert_eq!(KeyExprBuilder::new().channel_wildcard("ToEmonCMS"), "emonlink/ToEmonCMS/*");
    /// ```
    pub fn channel_wildcard(&self, channel: &str) -> String {
        format!("{}/{}/*", self.prefix, channel)
    }

    /// Key for bridge status messages.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }

    /// Split a payload key built by this builder into channel and node id.
    ///
    /// Returns `None` for keys outside the prefix, status keys, and keys with
    /// the wrong number of segments.
    pub fn parse<'a>(&self, key: &'a str) -> Option<ParsedKeyExpr<'a>> {
        let rest = key.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        let (channel, node_id) = rest.split_once('/')?;

        if channel.is_empty() || channel == "@" || node_id.is_empty() || node_id.contains('/') {
            return None;
        }

        Some(ParsedKeyExpr { channel, node_id })
    }
}

/// Wildcard matching every payload under the default prefix.
///
/// # Example
/// ```
/// use emonlink_common::keyexpr::all_payloads_wildcard;
///
/// assert_eq!(all_payloads_wildcard(), "emonlink/**");
/// ```
pub fn all_payloads_wildcard() -> String {
    format!("{}/**", KEY_PREFIX)
}

/// Parse a payload key under the default prefix.
pub fn parse_key_expr(key: &str) -> Option<ParsedKeyExpr<'_>> {
    KeyExprBuilder::new().parse(key)
}

/// Check that a channel or node id can be used as a single key expression chunk.
pub fn validate_chunk(chunk: &str) -> Result<()> {
    if chunk.is_empty() {
        return Err(Error::KeyExpr("empty key expression chunk".to_string()));
    }

    if let Some(c) = chunk.chars().find(|c| matches!(c, '/' | '*' | '$' | '#' | '?')) {
        return Err(Error::KeyExpr(format!(
            "'{}' contains reserved character '{}'",
            chunk, c
        )));
    }

    Ok(())
}

/// Components of a payload key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKeyExpr<'a> {
    pub channel: &'a str,
    pub node_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builder() {
        let builder = KeyExprBuilder::new();

        assert_eq!(builder.build("ToEmonCMS", "10"), "emonlink/ToEmonCMS/10");
        assert_eq!(builder.channel_wildcard("ToEmonCMS"), "emonlink/ToEmonCMS/*");
        assert_eq!(builder.status_key(), "emonlink/@/status");
    }

    #[test]
    fn test_custom_prefix() {
        let builder = KeyExprBuilder::with_prefix("site/a");
        assert_eq!(builder.build("hub", "7"), "site/a/hub/7");

        let parsed = builder.parse("site/a/hub/7").unwrap();
        assert_eq!(parsed.channel, "hub");
        assert_eq!(parsed.node_id, "7");
    }

    #[test]
    fn test_parse_key_expr() {
        let parsed = parse_key_expr("emonlink/ToEmonCMS/10").unwrap();

        assert_eq!(parsed.channel, "ToEmonCMS");
        assert_eq!(parsed.node_id, "10");
    }

    #[test]
    fn test_parse_invalid_key() {
        assert!(parse_key_expr("invalid/key").is_none());
        assert!(parse_key_expr("emonlink/@/status").is_none());
        assert!(parse_key_expr("emonlink/ToEmonCMS/10/extra").is_none());
        assert!(parse_key_expr("emonlinkx/ToEmonCMS/10").is_none());
    }

    #[test]
    fn test_validate_chunk() {
        assert!(validate_chunk("ToEmonCMS").is_ok());
        assert!(validate_chunk("10").is_ok());
        assert!(validate_chunk("").is_err());
        assert!(validate_chunk("a/b").is_err());
        assert!(validate_chunk("node*").is_err());
    }
}
