use thiserror::Error;

/// Error taxonomy for address resolution and classification.
///
/// Binding/library failures are absorbed at the binding layer and only show
/// up as capability flags; everything else propagates as a typed failure
/// through the worker protocol. No variant here may take down the host
/// process: native-boundary failures are caught at the boundary and
/// converted into these values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// A platform library or symbol could not be loaded. Degrades the
    /// matching capability flag; not fatal.
    #[error("native binding unavailable: {0}")]
    BindingUnavailable(String),

    /// A native call returned an error code or a null result pointer.
    #[error("native call '{call}' failed with code {code}")]
    NativeCallFailed { call: &'static str, code: i32 },

    /// Text failed normalization or validation. Never coerced into a
    /// default scope.
    #[error("malformed address: {0:?}")]
    MalformedAddress(String),

    /// No addresses were found for a hostname.
    #[error("no addresses found for {0:?}")]
    UnknownHost(String),

    /// The local machine reports no usable network addresses.
    #[error("host machine reports no network")]
    Offline,

    /// The lookup was intentionally skipped because the proxy for this URL
    /// resolves hostnames on the far end.
    #[error("DNS for this URL is resolved by the proxy; local lookup skipped")]
    ProxiedDns,

    /// The resolution worker has shut down; the message was not delivered.
    #[error("resolution worker is closed")]
    WorkerClosed,
}

impl LookupError {
    /// Build a [`LookupError::NativeCallFailed`] for the named entry point.
    pub fn native(call: &'static str, code: i32) -> Self {
        LookupError::NativeCallFailed { call, code }
    }

    /// Build a [`LookupError::MalformedAddress`] from any address text.
    pub fn malformed(text: impl Into<String>) -> Self {
        LookupError::MalformedAddress(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_call_display_includes_code() {
        let err = LookupError::native("getaddrinfo", -2);
        assert_eq!(
            err.to_string(),
            "native call 'getaddrinfo' failed with code -2"
        );
    }

    #[test]
    fn test_malformed_keeps_offending_text() {
        let err = LookupError::malformed("1::2::3");
        assert!(err.to_string().contains("1::2::3"));
    }
}
