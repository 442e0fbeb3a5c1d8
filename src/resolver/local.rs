//! Local interface-address enumeration.

use crate::addr::{dedup_addresses, IpAddress};
use crate::base::LookupError;
use crate::native::NativeBinding;
use crate::resolver::fallback::HostFacility;
use std::sync::Arc;

/// Enumerates the local machine's own addresses.
///
/// Uses the native interface walk when that capability survived init.
/// Otherwise resolves the machine's own hostname through the fallback
/// facility, which typically yields a subset of the interface addresses
/// (one per family rather than one per interface).
pub struct LocalResolver {
    binding: Arc<NativeBinding>,
    facility: Arc<dyn HostFacility>,
}

impl LocalResolver {
    pub fn new(binding: Arc<NativeBinding>, facility: Arc<dyn HostFacility>) -> Self {
        LocalResolver { binding, facility }
    }

    /// Enumerate local addresses, deduplicated, in enumeration order.
    pub async fn resolve(&self) -> Result<Vec<IpAddress>, LookupError> {
        let binding = Arc::clone(&self.binding);
        let facility = Arc::clone(&self.facility);
        let native = binding.capability().local_native;

        let addresses = tokio::task::spawn_blocking(move || {
            if native {
                binding.lookup_local()
            } else {
                // Hostname-based approximation. A machine that cannot name
                // itself still has a loopback interface.
                let hostname = facility.my_hostname().unwrap_or_else(|| {
                    tracing::warn!("cannot determine own hostname, using localhost");
                    "localhost".to_string()
                });
                tracing::debug!(
                    hostname = %hostname,
                    "native enumeration unavailable, resolving own hostname"
                );
                facility
                    .resolve_host(&hostname)
                    .map_err(|_| LookupError::Offline)
            }
        })
        .await
        .map_err(|_| LookupError::native("worker task", -1))??;

        if addresses.is_empty() {
            return Err(LookupError::Offline);
        }
        let addresses = dedup_addresses(addresses);
        tracing::debug!(count = addresses.len(), "local lookup complete");
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamelessFacility;

    impl HostFacility for NamelessFacility {
        fn resolve_host(&self, host: &str) -> Result<Vec<IpAddress>, LookupError> {
            assert_eq!(host, "localhost");
            Ok(vec![IpAddress::from_text("127.0.0.1").unwrap()])
        }

        fn my_hostname(&self) -> Option<String> {
            None
        }
    }

    struct DeadFacility;

    impl HostFacility for DeadFacility {
        fn resolve_host(&self, _host: &str) -> Result<Vec<IpAddress>, LookupError> {
            Err(LookupError::UnknownHost("self".into()))
        }

        fn my_hostname(&self) -> Option<String> {
            Some("self".into())
        }
    }

    #[tokio::test]
    async fn test_fallback_uses_localhost_when_nameless() {
        let resolver = LocalResolver::new(
            Arc::new(NativeBinding::init("beos")),
            Arc::new(NamelessFacility),
        );
        let addrs = resolver.resolve().await.unwrap();
        assert_eq!(addrs[0].canonical(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_fallback_failure_reports_offline() {
        let resolver = LocalResolver::new(
            Arc::new(NativeBinding::init("beos")),
            Arc::new(DeadFacility),
        );
        assert_eq!(resolver.resolve().await.unwrap_err(), LookupError::Offline);
    }
}
