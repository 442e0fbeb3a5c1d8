//! The classification engine: the crate's top-level surface.
//!
//! Ties the resolution worker and the proxy-DNS guard together and turns a
//! hostname into the classified picture a caller presents: remote addresses
//! with their scopes, the local machine's addresses with theirs, and a
//! verdict on whether a connection to that host is likely to use IPv6.

use crate::addr::{AddressFamily, AddressScope, IpAddress};
use crate::base::LookupError;
use crate::proxy::ProxyDnsGuard;
use crate::worker::protocol::Envelope;
use crate::worker::{ResolutionWorker, WorkerHandle};
use tokio::sync::mpsc;
use url::Url;

/// An address together with its routing scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAddress {
    pub address: IpAddress,
    pub scope: AddressScope,
}

impl ClassifiedAddress {
    fn new(address: IpAddress) -> Result<Self, LookupError> {
        let scope = address.scope()?;
        Ok(ClassifiedAddress { address, scope })
    }
}

/// The full classified picture for one hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub remote_addresses: Vec<ClassifiedAddress>,
    pub local_addresses: Vec<ClassifiedAddress>,
    /// True when the host offers IPv6 and this machine holds a globally
    /// routable IPv6 address to reach it from.
    pub likely_using_v6: bool,
}

/// Map the runtime platform name onto the identifier the layout tables use.
pub fn detect_os_id() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "winnt",
        other => other,
    }
}

/// Address resolution and classification, behind one handle.
pub struct ScopeEngine {
    worker: WorkerHandle,
    guard: ProxyDnsGuard,
}

impl ScopeEngine {
    /// Spawn a worker for the current platform and wrap it. Also returns
    /// the worker's unsolicited-notification stream.
    pub async fn connect() -> Result<(Self, mpsc::Receiver<Envelope>), LookupError> {
        let (worker, notifications) = ResolutionWorker::spawn();
        worker.init(detect_os_id()).await?;
        let engine = ScopeEngine::new(worker, ProxyDnsGuard::from_env());
        Ok((engine, notifications))
    }

    /// Wrap an already-initialized worker with a custom guard.
    pub fn new(worker: WorkerHandle, guard: ProxyDnsGuard) -> Self {
        ScopeEngine { worker, guard }
    }

    /// The underlying worker handle, for capability queries and shutdown.
    pub fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    /// Resolve and classify `host` against this machine's own addresses.
    pub async fn get_classification(&self, host: &str) -> Result<Classification, LookupError> {
        let remote = self
            .worker
            .remote_lookup(host)
            .await?
            .ok_or(LookupError::WorkerClosed)?;
        let local = self
            .worker
            .local_lookup()
            .await?
            .ok_or(LookupError::WorkerClosed)?;

        let remote_addresses = classify_all(remote)?;
        let local_addresses = classify_all(local)?;

        let remote_has_v6 = remote_addresses
            .iter()
            .any(|c| c.address.family() == AddressFamily::V6);
        let local_has_global_v6 = local_addresses
            .iter()
            .any(|c| c.address.family() == AddressFamily::V6 && c.scope.is_global());
        let likely_using_v6 = remote_has_v6 && local_has_global_v6;

        tracing::debug!(
            host,
            remote = remote_addresses.len(),
            local = local_addresses.len(),
            likely_using_v6,
            "classification complete"
        );
        Ok(Classification {
            remote_addresses,
            local_addresses,
            likely_using_v6,
        })
    }

    /// Like [`get_classification`](Self::get_classification), but refuses
    /// with [`LookupError::ProxiedDns`] when the proxy for this URL
    /// resolves hostnames remotely, since local answers would be wrong.
    pub async fn get_classification_for_url(
        &self,
        url_text: &str,
    ) -> Result<Classification, LookupError> {
        if self.guard.is_dns_proxied(url_text) {
            return Err(LookupError::ProxiedDns);
        }
        let url = Url::parse(url_text).map_err(|_| LookupError::malformed(url_text))?;
        let host = url
            .host_str()
            .ok_or_else(|| LookupError::malformed(url_text))?;
        self.get_classification(host).await
    }

    /// Stop the underlying worker.
    pub async fn shutdown(&self) -> Result<(), LookupError> {
        self.worker.shutdown().await
    }
}

fn classify_all(addresses: Vec<IpAddress>) -> Result<Vec<ClassifiedAddress>, LookupError> {
    addresses.into_iter().map(ClassifiedAddress::new).collect()
}
