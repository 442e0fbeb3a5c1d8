//! Builtin fallback host facilities.
//!
//! When the native binding lost a capability (missing library or symbol,
//! unrecognized platform), the resolvers fall back to these portable paths.
//! They see fewer addresses than the native calls do, particularly for the
//! local machine, where the fallback resolves the machine's own hostname
//! instead of enumerating interfaces. Degraded data beats no data.

use crate::addr::IpAddress;
use crate::base::LookupError;
use std::net::ToSocketAddrs;

/// Portable host facilities the fallback paths are built from.
///
/// Split out as a trait so the worker tests can substitute a scripted
/// implementation instead of touching the real network.
pub trait HostFacility: Send + Sync {
    /// Resolve a hostname to addresses through a portable path.
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddress>, LookupError>;

    /// The machine's own hostname, if it can be determined.
    fn my_hostname(&self) -> Option<String>;
}

/// The real facility: the standard resolver plus the OS hostname call.
#[derive(Debug, Default)]
pub struct SystemFacility;

impl HostFacility for SystemFacility {
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddress>, LookupError> {
        let addrs = (host, 0u16)
            .to_socket_addrs()
            .map_err(|_| LookupError::UnknownHost(host.to_string()))?;
        let mut out = Vec::new();
        for sa in addrs {
            match IpAddress::from_text(&sa.ip().to_string()) {
                Ok(ip) => out.push(ip),
                Err(error) => {
                    tracing::debug!(host, %error, "dropping unparseable resolver result");
                }
            }
        }
        Ok(out)
    }

    #[cfg(unix)]
    fn my_hostname(&self) -> Option<String> {
        let mut buf = [0u8; 256];
        // SAFETY: buf is writable for its full length; gethostname
        // NUL-terminates within the given size on success.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc != 0 {
            return None;
        }
        let end = buf.iter().position(|b| *b == 0)?;
        let name = String::from_utf8_lossy(&buf[..end]).into_owned();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    #[cfg(not(unix))]
    fn my_hostname(&self) -> Option<String> {
        std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .ok()
            .filter(|name| !name.is_empty())
    }
}
