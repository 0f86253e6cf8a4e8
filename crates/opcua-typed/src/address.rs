// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Namespace-qualified node addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// NodeAddress
// =============================================================================

/// Address of a server variable: a namespace index plus a string identifier.
///
/// The text form is the standard OPC UA notation `ns=<index>;s=<identifier>`.
/// Empty identifiers are legal; the server decides whether they resolve.
///
/// # Examples
///
/// ```
/// use opcua_typed::NodeAddress;
///
/// let address: NodeAddress = "ns=5;s=byte_test".parse().unwrap();
/// assert_eq!(address, NodeAddress::new(5, "byte_test"));
/// assert_eq!(address.to_string(), "ns=5;s=byte_test");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    namespace_index: u16,
    identifier: String,
}

impl NodeAddress {
    /// Creates an address.
    pub fn new(namespace_index: u16, identifier: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: identifier.into(),
        }
    }

    /// Builds one address per name, all in the same namespace, index-aligned.
    pub fn in_namespace<S: AsRef<str>>(namespace_index: u16, names: &[S]) -> Vec<Self> {
        names
            .iter()
            .map(|name| Self::new(namespace_index, name.as_ref()))
            .collect()
    }

    /// Returns the namespace index.
    #[inline]
    pub fn namespace_index(&self) -> u16 {
        self.namespace_index
    }

    /// Returns the string identifier.
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};s={}", self.namespace_index, self.identifier)
    }
}

impl FromStr for NodeAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace_index, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (index, rest) = tail.split_once(';').ok_or_else(|| {
                    ConfigError::invalid_address(s, "missing ';' after namespace index")
                })?;
                let index = index.parse::<u16>().map_err(|_| {
                    ConfigError::invalid_address(s, format!("invalid namespace index '{index}'"))
                })?;
                (index, rest)
            }
            None => (0, s),
        };

        if let Some(identifier) = rest.strip_prefix("s=") {
            return Ok(Self::new(namespace_index, identifier));
        }

        if ["i=", "g=", "b="].iter().any(|prefix| rest.starts_with(prefix)) {
            return Err(ConfigError::invalid_address(
                s,
                "only string identifiers (s=) are supported",
            ));
        }

        Ok(Self::new(namespace_index, rest))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(NodeAddress::new(5, "uint32a").to_string(), "ns=5;s=uint32a");
        assert_eq!(NodeAddress::new(0, "").to_string(), "ns=0;s=");
    }

    #[test]
    fn test_parse() {
        let address: NodeAddress = "ns=5;s=string_test".parse().unwrap();
        assert_eq!(address.namespace_index(), 5);
        assert_eq!(address.identifier(), "string_test");

        let bare: NodeAddress = "s=Temperature".parse().unwrap();
        assert_eq!(bare, NodeAddress::new(0, "Temperature"));

        let plain: NodeAddress = "Temperature".parse().unwrap();
        assert_eq!(plain, NodeAddress::new(0, "Temperature"));

        // Identifiers may themselves contain separators.
        let dotted: NodeAddress = "ns=2;s=Line1;Motor=3".parse().unwrap();
        assert_eq!(dotted.identifier(), "Line1;Motor=3");
    }

    #[test]
    fn test_parse_errors() {
        assert!("ns=abc;s=x".parse::<NodeAddress>().is_err());
        assert!("ns=70000;s=x".parse::<NodeAddress>().is_err());
        assert!("ns=5".parse::<NodeAddress>().is_err());
        assert!("ns=5;i=85".parse::<NodeAddress>().is_err());
    }

    #[test]
    fn test_equality_uses_both_fields() {
        assert_ne!(NodeAddress::new(5, "a"), NodeAddress::new(6, "a"));
        assert_ne!(NodeAddress::new(5, "a"), NodeAddress::new(5, "b"));
        assert_eq!(NodeAddress::new(5, "a"), NodeAddress::new(5, String::from("a")));
    }

    #[test]
    fn test_in_namespace_is_index_aligned() {
        let addresses = NodeAddress::in_namespace(5, &["a", "b", "c"]);
        assert_eq!(addresses.len(), 3);
        assert_eq!(addresses[1], NodeAddress::new(5, "b"));
    }
}
