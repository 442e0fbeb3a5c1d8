//! Remote hostname resolution.

use crate::addr::{dedup_addresses, IpAddress};
use crate::base::LookupError;
use crate::native::NativeBinding;
use crate::resolver::fallback::HostFacility;
use std::sync::Arc;

/// Resolves hostnames to deduplicated address lists, through the native
/// binding when the capability is present and the builtin fallback when not.
pub struct RemoteResolver {
    binding: Arc<NativeBinding>,
    facility: Arc<dyn HostFacility>,
}

impl RemoteResolver {
    pub fn new(binding: Arc<NativeBinding>, facility: Arc<dyn HostFacility>) -> Self {
        RemoteResolver { binding, facility }
    }

    /// Resolve `host` to its addresses, in resolver-returned order with
    /// duplicates removed.
    ///
    /// The blocking native call runs on the blocking pool so a slow or
    /// unresponsive resolver never stalls the async runtime.
    pub async fn resolve(&self, host: &str) -> Result<Vec<IpAddress>, LookupError> {
        if host.is_empty() {
            return Err(LookupError::malformed(host));
        }

        let binding = Arc::clone(&self.binding);
        let facility = Arc::clone(&self.facility);
        let host_owned = host.to_string();
        let native = binding.capability().remote_native;

        let addresses = tokio::task::spawn_blocking(move || {
            if native {
                binding.lookup_remote(&host_owned)
            } else {
                tracing::debug!(host = %host_owned, "native lookup unavailable, using fallback");
                facility.resolve_host(&host_owned)
            }
        })
        .await
        .map_err(|_| LookupError::native("worker task", -1))??;

        if addresses.is_empty() {
            return Err(LookupError::UnknownHost(host.to_string()));
        }
        let addresses = dedup_addresses(addresses);
        tracing::debug!(host, count = addresses.len(), "remote lookup complete");
        Ok(addresses)
    }
}
