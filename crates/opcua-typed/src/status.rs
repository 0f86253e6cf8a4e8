// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes.
//!
//! A status code is a 32-bit value. The top two bits carry the severity
//! (`00` good, `01` uncertain, `10`/`11` bad), the rest of the upper half
//! identifies the condition and the lower half holds info bits that this
//! crate ignores when classifying.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
const MAIN_CODE_MASK: u32 = 0xFFFF_0000;

// =============================================================================
// StatusCode
// =============================================================================

/// Numeric OPC UA status code as returned by the protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

macro_rules! status_codes {
    ($($konst:ident = $bits:literal => $name:literal;)*) => {
        impl StatusCode {
            $(
                #[doc = concat!("`", $name, "`")]
                pub const $konst: StatusCode = StatusCode($bits);
            )*
        }

        const KNOWN_CODES: &[(u32, &str)] = &[$(($bits, $name),)*];
    };
}

status_codes! {
    GOOD = 0x0000_0000 => "Good";
    UNCERTAIN = 0x4000_0000 => "Uncertain";
    BAD = 0x8000_0000 => "Bad";
    BAD_UNEXPECTED_ERROR = 0x8001_0000 => "BadUnexpectedError";
    BAD_INTERNAL_ERROR = 0x8002_0000 => "BadInternalError";
    BAD_OUT_OF_MEMORY = 0x8003_0000 => "BadOutOfMemory";
    BAD_RESOURCE_UNAVAILABLE = 0x8004_0000 => "BadResourceUnavailable";
    BAD_COMMUNICATION_ERROR = 0x8005_0000 => "BadCommunicationError";
    BAD_ENCODING_ERROR = 0x8006_0000 => "BadEncodingError";
    BAD_DECODING_ERROR = 0x8007_0000 => "BadDecodingError";
    BAD_ENCODING_LIMITS_EXCEEDED = 0x8008_0000 => "BadEncodingLimitsExceeded";
    BAD_UNKNOWN_RESPONSE = 0x8009_0000 => "BadUnknownResponse";
    BAD_TIMEOUT = 0x800A_0000 => "BadTimeout";
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000 => "BadServiceUnsupported";
    BAD_SHUTDOWN = 0x800C_0000 => "BadShutdown";
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000 => "BadServerNotConnected";
    BAD_SERVER_HALTED = 0x800E_0000 => "BadServerHalted";
    BAD_NOTHING_TO_DO = 0x800F_0000 => "BadNothingToDo";
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000 => "BadTooManyOperations";
    BAD_DATA_TYPE_ID_UNKNOWN = 0x8011_0000 => "BadDataTypeIdUnknown";
    BAD_CERTIFICATE_INVALID = 0x8012_0000 => "BadCertificateInvalid";
    BAD_SECURITY_CHECKS_FAILED = 0x8013_0000 => "BadSecurityChecksFailed";
    BAD_USER_ACCESS_DENIED = 0x801F_0000 => "BadUserAccessDenied";
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000 => "BadIdentityTokenInvalid";
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000 => "BadIdentityTokenRejected";
    BAD_SESSION_ID_INVALID = 0x8025_0000 => "BadSessionIdInvalid";
    BAD_SESSION_CLOSED = 0x8026_0000 => "BadSessionClosed";
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000 => "BadSessionNotActivated";
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000 => "BadSubscriptionIdInvalid";
    BAD_NO_COMMUNICATION = 0x8031_0000 => "BadNoCommunication";
    BAD_NODE_ID_INVALID = 0x8033_0000 => "BadNodeIdInvalid";
    BAD_NODE_ID_UNKNOWN = 0x8034_0000 => "BadNodeIdUnknown";
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000 => "BadAttributeIdInvalid";
    BAD_INDEX_RANGE_INVALID = 0x8036_0000 => "BadIndexRangeInvalid";
    BAD_INDEX_RANGE_NO_DATA = 0x8037_0000 => "BadIndexRangeNoData";
    BAD_NOT_READABLE = 0x803A_0000 => "BadNotReadable";
    BAD_NOT_WRITABLE = 0x803B_0000 => "BadNotWritable";
    BAD_OUT_OF_RANGE = 0x803C_0000 => "BadOutOfRange";
    BAD_NOT_SUPPORTED = 0x803D_0000 => "BadNotSupported";
    BAD_NOT_FOUND = 0x803E_0000 => "BadNotFound";
    BAD_NOT_IMPLEMENTED = 0x8040_0000 => "BadNotImplemented";
    BAD_WRITE_NOT_SUPPORTED = 0x8073_0000 => "BadWriteNotSupported";
    BAD_TYPE_MISMATCH = 0x8074_0000 => "BadTypeMismatch";
    BAD_TCP_ENDPOINT_URL_INVALID = 0x8083_0000 => "BadTcpEndpointUrlInvalid";
    BAD_REQUEST_TIMEOUT = 0x8085_0000 => "BadRequestTimeout";
    BAD_SECURE_CHANNEL_CLOSED = 0x8086_0000 => "BadSecureChannelClosed";
    BAD_INVALID_ARGUMENT = 0x80AB_0000 => "BadInvalidArgument";
    BAD_CONNECTION_REJECTED = 0x80AC_0000 => "BadConnectionRejected";
    BAD_DISCONNECT = 0x80AD_0000 => "BadDisconnect";
    BAD_CONNECTION_CLOSED = 0x80AE_0000 => "BadConnectionClosed";
    BAD_INVALID_STATE = 0x80AF_0000 => "BadInvalidState";
}

impl StatusCode {
    /// Wraps a raw 32-bit status code.
    #[inline]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw 32-bit value.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the code with its info bits cleared.
    #[inline]
    pub const fn main_code(self) -> Self {
        Self(self.0 & MAIN_CODE_MASK)
    }

    /// Returns `true` for the good severity.
    #[inline]
    pub const fn is_good(self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    /// Returns `true` for the uncertain severity.
    #[inline]
    pub const fn is_uncertain(self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }

    /// Returns `true` for the bad severity.
    #[inline]
    pub const fn is_bad(self) -> bool {
        self.0 & SEVERITY_BAD != 0
    }

    /// Compares main codes, ignoring info bits.
    #[inline]
    pub const fn matches(self, other: StatusCode) -> bool {
        self.0 & MAIN_CODE_MASK == other.0 & MAIN_CODE_MASK
    }

    /// Returns the symbolic name, e.g. `"BadNodeIdUnknown"`.
    ///
    /// Codes outside the known table report their severity instead
    /// (`"Good"`, `"Uncertain"`, `"Bad"`).
    pub fn name(self) -> &'static str {
        let main = self.0 & MAIN_CODE_MASK;
        KNOWN_CODES
            .iter()
            .find(|(bits, _)| *bits == main)
            .map(|(_, name)| *name)
            .unwrap_or_else(|| self.severity_name())
    }

    /// Looks up a code by its symbolic name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        KNOWN_CODES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|(bits, _)| Self(*bits))
    }

    /// Returns `true` if the main code is one this crate knows by name.
    pub fn is_known(self) -> bool {
        let main = self.0 & MAIN_CODE_MASK;
        KNOWN_CODES.iter().any(|(bits, _)| *bits == main)
    }

    fn severity_name(self) -> &'static str {
        if self.is_bad() {
            "Bad"
        } else if self.is_uncertain() {
            "Uncertain"
        } else {
            "Good"
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X} ({})", self.0, self.name())
    }
}

/// Parses either a symbolic name (`BadTimeout`), a hex literal
/// (`0x800A0000`) or a decimal value.
impl FromStr for StatusCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .map(Self)
                .map_err(|e| ConfigError::invalid_value("status_code", format!("{s}: {e}")));
        }
        if let Ok(bits) = s.parse::<u32>() {
            return Ok(Self(bits));
        }
        Self::from_name(s).ok_or_else(|| {
            ConfigError::invalid_value("status_code", format!("unknown status code '{s}'"))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::UNCERTAIN.is_uncertain());
        assert!(!StatusCode::UNCERTAIN.is_bad());
        assert!(StatusCode::BAD_NODE_ID_UNKNOWN.is_bad());
        assert!(StatusCode::new(0xC000_0000).is_bad());
    }

    #[test]
    fn test_names() {
        assert_eq!(StatusCode::BAD_NODE_ID_UNKNOWN.name(), "BadNodeIdUnknown");
        assert_eq!(StatusCode::BAD_TYPE_MISMATCH.name(), "BadTypeMismatch");
        assert_eq!(StatusCode::GOOD.name(), "Good");
        // Info bits do not change the name.
        assert_eq!(StatusCode::new(0x8034_0400).name(), "BadNodeIdUnknown");
        // Unknown bad codes fall back to the severity.
        assert_eq!(StatusCode::new(0x80FE_0000).name(), "Bad");
        assert!(!StatusCode::new(0x80FE_0000).is_known());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StatusCode::BAD_NODE_ID_UNKNOWN.to_string(),
            "0x80340000 (BadNodeIdUnknown)"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("BadTimeout".parse::<StatusCode>().unwrap(), StatusCode::BAD_TIMEOUT);
        assert_eq!("badtimeout".parse::<StatusCode>().unwrap(), StatusCode::BAD_TIMEOUT);
        assert_eq!("0x80740000".parse::<StatusCode>().unwrap(), StatusCode::BAD_TYPE_MISMATCH);
        assert_eq!("0".parse::<StatusCode>().unwrap(), StatusCode::GOOD);
        assert!("NotACode".parse::<StatusCode>().is_err());
        assert!("0xZZ".parse::<StatusCode>().is_err());
    }

    #[test]
    fn test_matches_ignores_info_bits() {
        assert!(StatusCode::new(0x8034_0400).matches(StatusCode::BAD_NODE_ID_UNKNOWN));
        assert!(!StatusCode::BAD_NOT_FOUND.matches(StatusCode::BAD_NODE_ID_UNKNOWN));
    }
}
