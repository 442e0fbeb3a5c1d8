//! The asynchronous resolution worker.
//!
//! One task owns the native binding and both resolvers and processes
//! requests strictly in arrival order. The host talks to it through
//! [`WorkerHandle`], which correlates replies to requests and supports
//! cooperative cancellation: a lookup already handed to the worker cannot
//! be aborted mid-call, but its reply can be marked stale and is then
//! silently discarded when it arrives.

pub mod protocol;

use crate::addr::IpAddress;
use crate::base::LookupError;
use crate::native::{NativeBinding, PlatformCapability};
use crate::resolver::{HostFacility, LocalResolver, RemoteResolver, SystemFacility};
use dashmap::DashSet;
use self::protocol::{opcode, CorrelationId, Envelope, Payload, Request, Verbosity, NOTIFY};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

struct Command {
    correlation_id: CorrelationId,
    request: Request,
    reply: oneshot::Sender<Envelope>,
}

struct WorkerState {
    binding: Arc<NativeBinding>,
    remote: RemoteResolver,
    local: LocalResolver,
}

struct Worker {
    commands: mpsc::Receiver<Command>,
    notifications: mpsc::Sender<Envelope>,
    facility: Arc<dyn HostFacility>,
    state: Option<WorkerState>,
    verbosity: Verbosity,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!("resolution worker started");
        while let Some(command) = self.commands.recv().await {
            let correlation_id = command.correlation_id;
            let op = command.request.opcode();
            if self.verbosity >= Verbosity::Verbose {
                tracing::debug!(correlation_id, opcode = op, "processing request");
            }

            let shutdown = matches!(command.request, Request::Shutdown);
            let payload = self.process(command.request).await;
            let envelope = Envelope {
                correlation_id,
                opcode: op,
                payload,
            };
            // A dropped reply receiver means the caller gave up; the work
            // is already done, so there is nothing further to unwind.
            let _ = command.reply.send(envelope);

            if shutdown {
                break;
            }
        }
        tracing::debug!("resolution worker stopped");
    }

    async fn process(&mut self, request: Request) -> Payload {
        match request {
            Request::Init { os_id } => self.init(os_id).await,
            Request::RemoteLookup { host } => match self.state.as_ref() {
                Some(state) => match state.remote.resolve(&host).await {
                    Ok(addresses) => Payload::Addresses(addresses),
                    Err(error) => Payload::Failed(error),
                },
                None => Payload::Failed(uninitialized()),
            },
            Request::LocalLookup => match self.state.as_ref() {
                Some(state) => match state.local.resolve().await {
                    Ok(addresses) => Payload::Addresses(addresses),
                    Err(error) => Payload::Failed(error),
                },
                None => Payload::Failed(uninitialized()),
            },
            Request::QueryRemoteCapability => {
                Payload::CapabilityFlag(self.capability().remote_native)
            }
            Request::QueryLocalCapability => {
                Payload::CapabilityFlag(self.capability().local_native)
            }
            Request::SetLogLevel(verbosity) => {
                tracing::info!(?verbosity, "worker verbosity changed");
                self.verbosity = verbosity;
                Payload::Ack(true)
            }
            Request::Shutdown => {
                if let Some(state) = self.state.take() {
                    let WorkerState { binding, .. } = state;
                    // Resolvers are gone; release the library handles now
                    // unless a blocking call still holds a reference.
                    if let Ok(mut binding) = Arc::try_unwrap(binding) {
                        binding.shutdown();
                    }
                }
                Payload::Ack(true)
            }
        }
    }

    async fn init(&mut self, os_id: String) -> Payload {
        if let Some(state) = self.state.as_ref() {
            // Repeat init reports the current state rather than reloading.
            return Payload::Capability(state.binding.capability());
        }

        let binding = match tokio::task::spawn_blocking(move || NativeBinding::init(&os_id)).await
        {
            Ok(binding) => Arc::new(binding),
            Err(_) => return Payload::Failed(LookupError::native("worker task", -1)),
        };
        let capability = binding.capability();

        self.state = Some(WorkerState {
            binding: Arc::clone(&binding),
            remote: RemoteResolver::new(Arc::clone(&binding), Arc::clone(&self.facility)),
            local: LocalResolver::new(binding, Arc::clone(&self.facility)),
        });

        // Announce what survived the probe before any lookup arrives.
        self.notify(opcode::QUERY_REMOTE_CAPABILITY, capability.remote_native);
        self.notify(opcode::QUERY_LOCAL_CAPABILITY, capability.local_native);

        Payload::Capability(capability)
    }

    fn capability(&self) -> PlatformCapability {
        self.state
            .as_ref()
            .map(|s| s.binding.capability())
            .unwrap_or_default()
    }

    fn notify(&self, op: u8, flag: bool) {
        let envelope = Envelope {
            correlation_id: NOTIFY,
            opcode: op,
            payload: Payload::CapabilityFlag(flag),
        };
        if self.notifications.try_send(envelope).is_err() {
            tracing::debug!(opcode = op, "capability notification dropped");
        }
    }
}

fn uninitialized() -> LookupError {
    LookupError::BindingUnavailable("resolver not initialized".into())
}

/// Outcome of a cancellation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The reply is still outstanding and will be discarded on arrival.
    Marked,
    /// The reply was already delivered; nothing to discard.
    TooLate,
}

/// An in-flight lookup whose reply has not been awaited yet.
pub struct PendingLookup {
    id: CorrelationId,
    rx: oneshot::Receiver<Envelope>,
    pending: Arc<DashSet<CorrelationId>>,
    stale: Arc<DashSet<CorrelationId>>,
}

impl PendingLookup {
    /// Correlation identifier of this lookup, usable with
    /// [`WorkerHandle::cancel`].
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Await the reply. `Ok(None)` means the lookup was cancelled and its
    /// reply discarded.
    pub async fn outcome(self) -> Result<Option<Vec<IpAddress>>, LookupError> {
        let envelope = self.rx.await.map_err(|_| LookupError::WorkerClosed)?;
        self.pending.remove(&self.id);
        if self.stale.remove(&self.id).is_some() {
            tracing::debug!(id = self.id, "discarding reply for cancelled lookup");
            return Ok(None);
        }
        match envelope.payload {
            Payload::Addresses(addresses) => Ok(Some(addresses)),
            Payload::Failed(error) => Err(error),
            other => {
                tracing::error!(?other, "protocol violation in lookup reply");
                Err(LookupError::WorkerClosed)
            }
        }
    }
}

/// Spawns and owns the resolution worker task.
pub struct ResolutionWorker;

impl ResolutionWorker {
    /// Spawn the worker with the real system facility. Returns the handle
    /// and the unsolicited-notification stream.
    pub fn spawn() -> (WorkerHandle, mpsc::Receiver<Envelope>) {
        Self::spawn_with_facility(Arc::new(SystemFacility))
    }

    /// Spawn with a substitute fallback facility. Lets tests script the
    /// portable paths without touching the network.
    pub fn spawn_with_facility(
        facility: Arc<dyn HostFacility>,
    ) -> (WorkerHandle, mpsc::Receiver<Envelope>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (notify_tx, notify_rx) = mpsc::channel(8);
        let worker = Worker {
            commands: command_rx,
            notifications: notify_tx,
            facility,
            state: None,
            verbosity: Verbosity::Normal,
        };
        tokio::spawn(worker.run());
        let handle = WorkerHandle {
            commands: command_tx,
            next_id: Arc::new(AtomicI64::new(0)),
            pending: Arc::new(DashSet::new()),
            stale: Arc::new(DashSet::new()),
        };
        (handle, notify_rx)
    }
}

/// Host-side handle to the resolution worker. Cheap to clone; all clones
/// talk to the same worker task.
#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicI64>,
    pending: Arc<DashSet<CorrelationId>>,
    stale: Arc<DashSet<CorrelationId>>,
}

impl WorkerHandle {
    async fn send(&self, request: Request) -> Result<Envelope, LookupError> {
        let (rx, _id) = self.dispatch(request).await?;
        rx.await.map_err(|_| LookupError::WorkerClosed)
    }

    async fn dispatch(
        &self,
        request: Request,
    ) -> Result<(oneshot::Receiver<Envelope>, CorrelationId), LookupError> {
        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command {
                correlation_id,
                request,
                reply,
            })
            .await
            .map_err(|_| LookupError::WorkerClosed)?;
        Ok((rx, correlation_id))
    }

    /// Initialize the worker for a platform. Returns the capability report;
    /// repeat calls report the current state without reloading.
    pub async fn init(&self, os_id: &str) -> Result<PlatformCapability, LookupError> {
        match self
            .send(Request::Init {
                os_id: os_id.to_string(),
            })
            .await?
            .payload
        {
            Payload::Capability(capability) => Ok(capability),
            Payload::Failed(error) => Err(error),
            _ => Err(LookupError::WorkerClosed),
        }
    }

    /// Start a remote lookup without awaiting it, for callers that may
    /// cancel. The common path is [`WorkerHandle::remote_lookup`].
    pub async fn start_remote_lookup(&self, host: &str) -> Result<PendingLookup, LookupError> {
        self.start(Request::RemoteLookup {
            host: host.to_string(),
        })
        .await
    }

    /// Start a local-address enumeration without awaiting it.
    pub async fn start_local_lookup(&self) -> Result<PendingLookup, LookupError> {
        self.start(Request::LocalLookup).await
    }

    async fn start(&self, request: Request) -> Result<PendingLookup, LookupError> {
        let (rx, id) = self.dispatch(request).await?;
        self.pending.insert(id);
        Ok(PendingLookup {
            id,
            rx,
            pending: Arc::clone(&self.pending),
            stale: Arc::clone(&self.stale),
        })
    }

    /// Resolve a hostname. `Ok(None)` means the lookup was cancelled from
    /// another task before the reply arrived.
    pub async fn remote_lookup(&self, host: &str) -> Result<Option<Vec<IpAddress>>, LookupError> {
        self.start_remote_lookup(host).await?.outcome().await
    }

    /// Enumerate the local machine's addresses.
    pub async fn local_lookup(&self) -> Result<Option<Vec<IpAddress>>, LookupError> {
        self.start_local_lookup().await?.outcome().await
    }

    /// Ask whether native remote resolution is available.
    pub async fn query_remote_capability(&self) -> Result<bool, LookupError> {
        self.query(Request::QueryRemoteCapability).await
    }

    /// Ask whether native local enumeration is available.
    pub async fn query_local_capability(&self) -> Result<bool, LookupError> {
        self.query(Request::QueryLocalCapability).await
    }

    async fn query(&self, request: Request) -> Result<bool, LookupError> {
        match self.send(request).await?.payload {
            Payload::CapabilityFlag(flag) => Ok(flag),
            Payload::Failed(error) => Err(error),
            _ => Err(LookupError::WorkerClosed),
        }
    }

    /// Change the worker's logging verbosity.
    pub async fn set_log_level(&self, verbosity: Verbosity) -> Result<(), LookupError> {
        match self.send(Request::SetLogLevel(verbosity)).await?.payload {
            Payload::Ack(_) => Ok(()),
            Payload::Failed(error) => Err(error),
            _ => Err(LookupError::WorkerClosed),
        }
    }

    /// Mark an outstanding lookup stale. Its reply, if still pending, is
    /// discarded on arrival; the request itself is not interrupted.
    pub fn cancel(&self, id: CorrelationId) -> CancelOutcome {
        if self.pending.contains(&id) {
            self.stale.insert(id);
            tracing::debug!(id, "lookup marked stale");
            CancelOutcome::Marked
        } else {
            CancelOutcome::TooLate
        }
    }

    /// Stop the worker. Acknowledged in order, after all queued requests;
    /// later sends fail with [`LookupError::WorkerClosed`].
    pub async fn shutdown(&self) -> Result<(), LookupError> {
        match self.send(Request::Shutdown).await?.payload {
            Payload::Ack(_) => Ok(()),
            Payload::Failed(error) => Err(error),
            _ => Err(LookupError::WorkerClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedFacility;

    impl HostFacility for ScriptedFacility {
        fn resolve_host(&self, host: &str) -> Result<Vec<IpAddress>, LookupError> {
            match host {
                "example.com" => Ok(vec![
                    IpAddress::from_text("2001:db8::1").unwrap(),
                    IpAddress::from_text("192.0.2.10").unwrap(),
                ]),
                "self.local" => Ok(vec![IpAddress::from_text("192.168.2.1").unwrap()]),
                other => Err(LookupError::UnknownHost(other.to_string())),
            }
        }

        fn my_hostname(&self) -> Option<String> {
            Some("self.local".to_string())
        }
    }

    fn spawn_degraded() -> (WorkerHandle, mpsc::Receiver<Envelope>) {
        ResolutionWorker::spawn_with_facility(Arc::new(ScriptedFacility))
    }

    #[tokio::test]
    async fn test_lookup_before_init_fails() {
        let (handle, _notify) = spawn_degraded();
        let err = handle.remote_lookup("example.com").await.unwrap_err();
        assert!(matches!(err, LookupError::BindingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_init_reports_and_notifies_capabilities() {
        let (handle, mut notify) = spawn_degraded();
        // Unknown platform: both capabilities degrade to the fallback.
        let capability = handle.init("beos").await.unwrap();
        assert!(!capability.remote_native);
        assert!(!capability.local_native);

        let first = notify.recv().await.unwrap();
        assert_eq!(first.correlation_id, NOTIFY);
        assert_eq!(first.opcode, opcode::QUERY_REMOTE_CAPABILITY);
        assert_eq!(first.payload, Payload::CapabilityFlag(false));
        let second = notify.recv().await.unwrap();
        assert_eq!(second.opcode, opcode::QUERY_LOCAL_CAPABILITY);

        assert!(!handle.query_remote_capability().await.unwrap());
        assert!(!handle.query_local_capability().await.unwrap());
    }

    #[tokio::test]
    async fn test_repeat_init_is_idempotent() {
        let (handle, _notify) = spawn_degraded();
        let first = handle.init("beos").await.unwrap();
        let second = handle.init("linux").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fallback_remote_lookup() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        let addrs = handle.remote_lookup("example.com").await.unwrap().unwrap();
        let texts: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
        assert_eq!(texts, vec!["2001:db8::1", "192.0.2.10"]);
    }

    #[tokio::test]
    async fn test_fallback_local_lookup_via_own_hostname() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        let addrs = handle.local_lookup().await.unwrap().unwrap();
        assert_eq!(addrs[0].canonical(), "192.168.2.1");
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        let err = handle
            .remote_lookup("no-such-host.invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::UnknownHost(_)));
    }

    #[tokio::test]
    async fn test_cancelled_lookup_reply_is_discarded() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        let pending = handle.start_remote_lookup("example.com").await.unwrap();
        assert_eq!(handle.cancel(pending.id()), CancelOutcome::Marked);
        assert_eq!(pending.outcome().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_too_late() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        let pending = handle.start_remote_lookup("example.com").await.unwrap();
        let id = pending.id();
        assert!(pending.outcome().await.unwrap().is_some());
        assert_eq!(handle.cancel(id), CancelOutcome::TooLate);
    }

    #[tokio::test]
    async fn test_shutdown_closes_worker() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        handle.shutdown().await.unwrap();
        let err = handle.remote_lookup("example.com").await.unwrap_err();
        assert_eq!(err, LookupError::WorkerClosed);
    }

    #[tokio::test]
    async fn test_replies_arrive_in_request_order() {
        let (handle, _notify) = spawn_degraded();
        handle.init("beos").await.unwrap();
        let a = handle.start_remote_lookup("example.com").await.unwrap();
        let b = handle.start_local_lookup().await.unwrap();
        assert!(a.id() < b.id());
        assert!(a.outcome().await.unwrap().is_some());
        assert!(b.outcome().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_log_level_acknowledged() {
        let (handle, _notify) = spawn_degraded();
        handle.set_log_level(Verbosity::Verbose).await.unwrap();
    }
}
