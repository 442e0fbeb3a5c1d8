//! Remote and local resolvers with per-capability fallback.

pub mod fallback;
pub mod local;
pub mod remote;

pub use fallback::{HostFacility, SystemFacility};
pub use local::LocalResolver;
pub use remote::RemoteResolver;
