//! End-to-end engine tests.
//!
//! Covers:
//! - Worker lifecycle (init, capability notifications, shutdown)
//! - Classification through the full engine surface
//! - Cancellation and stale-reply discard
//! - Native resolution on Linux hosts that carry glibc

use sixscope::addr::{AddressScope, IpAddress};
use sixscope::base::LookupError;
use sixscope::engine::{detect_os_id, ScopeEngine};
use sixscope::proxy::{ProxyDnsGuard, ProxyResolver, ProxySettings};
use sixscope::resolver::HostFacility;
use sixscope::worker::protocol::{opcode, Payload, NOTIFY};
use sixscope::worker::{CancelOutcome, ResolutionWorker};
use std::sync::Arc;
use url::Url;

struct MockFacility;

impl HostFacility for MockFacility {
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddress>, LookupError> {
        match host {
            "dual.example" => Ok(vec![
                IpAddress::from_text("2606:2800:220:1:248:1893:25c8:1946").unwrap(),
                IpAddress::from_text("93.184.216.34").unwrap(),
            ]),
            "testbox" => Ok(vec![
                IpAddress::from_text("2001:470:1f09:1a2b::2").unwrap(),
                IpAddress::from_text("fe80::fa1e:dfff:fee8:db18").unwrap(),
                IpAddress::from_text("10.1.2.3").unwrap(),
            ]),
            other => Err(LookupError::UnknownHost(other.to_string())),
        }
    }

    fn my_hostname(&self) -> Option<String> {
        Some("testbox".to_string())
    }
}

struct NoProxy;

impl ProxyResolver for NoProxy {
    fn proxy_for_url(&self, _target: &Url) -> Option<ProxySettings> {
        None
    }
}

async fn degraded_engine() -> ScopeEngine {
    // An unrecognized platform name drives everything down the fallback
    // paths, so these tests exercise the full stack without real FFI.
    let (worker, _notify) = ResolutionWorker::spawn_with_facility(Arc::new(MockFacility));
    worker.init("beos").await.unwrap();
    ScopeEngine::new(worker, ProxyDnsGuard::new(Box::new(NoProxy)))
}

#[tokio::test]
async fn test_init_notifies_degraded_capabilities() {
    let (worker, mut notify) = ResolutionWorker::spawn_with_facility(Arc::new(MockFacility));
    let capability = worker.init("beos").await.unwrap();
    assert!(!capability.remote_native);
    assert!(!capability.local_native);

    let remote_note = notify.recv().await.unwrap();
    assert_eq!(remote_note.correlation_id, NOTIFY);
    assert_eq!(remote_note.opcode, opcode::QUERY_REMOTE_CAPABILITY);
    assert_eq!(remote_note.payload, Payload::CapabilityFlag(false));
    let local_note = notify.recv().await.unwrap();
    assert_eq!(local_note.opcode, opcode::QUERY_LOCAL_CAPABILITY);
}

#[tokio::test]
async fn test_full_classification_via_fallback() {
    let engine = degraded_engine().await;
    let result = engine.get_classification("dual.example").await.unwrap();

    let remote: Vec<(String, AddressScope)> = result
        .remote_addresses
        .iter()
        .map(|c| (c.address.to_string(), c.scope))
        .collect();
    assert_eq!(
        remote,
        vec![
            (
                "2606:2800:220:1:248:1893:25c8:1946".to_string(),
                AddressScope::Global
            ),
            ("93.184.216.34".to_string(), AddressScope::Global),
        ]
    );

    let local_scopes: Vec<AddressScope> =
        result.local_addresses.iter().map(|c| c.scope).collect();
    assert_eq!(
        local_scopes,
        vec![
            AddressScope::Global,
            AddressScope::LinkLocal,
            AddressScope::Rfc1918
        ]
    );

    // Remote offers v6 and a global local v6 address exists.
    assert!(result.likely_using_v6);
}

#[tokio::test]
async fn test_unknown_host_propagates() {
    let engine = degraded_engine().await;
    let err = engine
        .get_classification("missing.example")
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::UnknownHost(_)));
}

#[tokio::test]
async fn test_cancel_marks_and_discards() {
    let (worker, _notify) = ResolutionWorker::spawn_with_facility(Arc::new(MockFacility));
    worker.init("beos").await.unwrap();

    let pending = worker.start_remote_lookup("dual.example").await.unwrap();
    assert_eq!(worker.cancel(pending.id()), CancelOutcome::Marked);
    assert_eq!(pending.outcome().await.unwrap(), None);

    // Later lookups are unaffected by the discarded one.
    let addrs = worker.remote_lookup("dual.example").await.unwrap().unwrap();
    assert_eq!(addrs.len(), 2);
}

#[tokio::test]
async fn test_shutdown_then_lookup_fails_closed() {
    let engine = degraded_engine().await;
    engine.shutdown().await.unwrap();
    assert_eq!(
        engine.get_classification("dual.example").await.unwrap_err(),
        LookupError::WorkerClosed
    );
}

#[tokio::test]
async fn test_proxied_dns_guard_blocks_url_path() {
    struct RemoteDns;
    impl ProxyResolver for RemoteDns {
        fn proxy_for_url(&self, _target: &Url) -> Option<ProxySettings> {
            ProxySettings::new("socks5h://proxy.example:1080")
        }
    }

    let (worker, _notify) = ResolutionWorker::spawn_with_facility(Arc::new(MockFacility));
    worker.init("beos").await.unwrap();
    let engine = ScopeEngine::new(worker, ProxyDnsGuard::new(Box::new(RemoteDns)));

    assert_eq!(
        engine
            .get_classification_for_url("https://dual.example/")
            .await
            .unwrap_err(),
        LookupError::ProxiedDns
    );
    // The hostname entry point stays usable; only the URL path is guarded.
    assert!(engine.get_classification("dual.example").await.is_ok());
}

// Real native resolution, where the host OS supports it. Skips itself on
// hosts where the platform library is absent (musl images).
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_native_lookup_on_this_machine() {
    let (worker, _notify) = ResolutionWorker::spawn();
    let capability = worker.init(detect_os_id()).await.unwrap();
    if !capability.local_native {
        println!("native local enumeration unavailable, skipping");
        return;
    }

    let addrs = worker.local_lookup().await.unwrap().unwrap();
    assert!(
        addrs.iter().any(|a| a.canonical() == "127.0.0.1"),
        "expected loopback among {addrs:?}"
    );
    worker.shutdown().await.unwrap();
}
