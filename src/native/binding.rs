//! Native library binding and the raw lookup calls.
//!
//! Opens the per-OS resolver libraries at init, binds the entry points that
//! are actually present, and records what survived as capability flags.
//! A missing library or symbol disables only the capability that needed it;
//! it is an expected outcome, never a crash. All pointer walking over the
//! native linked lists happens here, driven by the platform layout table,
//! and every record is released through the native free routine before the
//! call returns.

use crate::addr::decode::{decode_sockaddr, family_code, required_len, DecodedAddress};
use crate::addr::IpAddress;
use crate::base::LookupError;
use crate::native::layout::{layout_for, PlatformLayout};
use libloading::Library;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

/// Which native facilities are usable on this platform.
///
/// Discovered once at init and immutable afterward; the resolvers read it
/// to pick the native or the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformCapability {
    pub remote_native: bool,
    pub local_native: bool,
}

type GetAddrInfoFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *const c_void, *mut *mut c_void) -> c_int;
type FreeAddrInfoFn = unsafe extern "C" fn(*mut c_void);
type GetIfAddrsFn = unsafe extern "C" fn(*mut *mut c_void) -> c_int;
type FreeIfAddrsFn = unsafe extern "C" fn(*mut c_void);
type GetAdaptersAddressesFn =
    unsafe extern "system" fn(u32, u32, *mut c_void, *mut u8, *mut u32) -> u32;

// Hints buffer handed to the remote-resolution call. Zeroed except for the
// flag and family words; sized and aligned to cover every platform's
// address-info record head.
#[repr(C, align(8))]
struct HintsBuf([u8; 48]);

const ERROR_BUFFER_OVERFLOW: u32 = 111;
// Skip anycast, multicast, DNS-server and friendly-name data in the
// adapter enumeration; only unicast addresses matter here.
const GAA_FLAGS: u32 = 0x0002 | 0x0004 | 0x0008 | 0x0020;

/// Handle to the native resolver entry points for the platform the process
/// was initialized on.
///
/// Owned exclusively by the resolution worker for its lifetime: opened once
/// at `init`, closed exactly once at `shutdown`.
pub struct NativeBinding {
    layout: Option<&'static PlatformLayout>,
    // Function pointers below stay valid only while these handles are held;
    // `shutdown` clears the pointers before releasing the handles.
    libraries: Vec<Library>,
    getaddrinfo: Option<GetAddrInfoFn>,
    freeaddrinfo: Option<FreeAddrInfoFn>,
    getifaddrs: Option<GetIfAddrsFn>,
    freeifaddrs: Option<FreeIfAddrsFn>,
    get_adapters_addresses: Option<GetAdaptersAddressesFn>,
    capability: PlatformCapability,
}

impl NativeBinding {
    /// Probe the platform and bind whatever entry points are available.
    ///
    /// Never fails hard: on an unrecognized platform, or when libraries or
    /// symbols are missing, the affected capability flags come back false
    /// and the builtin fallback paths take over. If neither capability
    /// survived, the library handles are released before returning.
    pub fn init(os_id: &str) -> NativeBinding {
        let Some(layout) = layout_for(os_id) else {
            tracing::info!(os = os_id, "unrecognized platform, native resolution disabled");
            return NativeBinding::disabled();
        };

        let mut opened: Vec<Option<Library>> = Vec::with_capacity(layout.libraries.len());
        for name in layout.libraries {
            // SAFETY: loading a system resolver library runs its
            // initializers; these are the OS's own networking libraries.
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    tracing::debug!(library = name, "opened native library");
                    opened.push(Some(lib));
                }
                Err(error) => {
                    tracing::warn!(library = name, %error, "cannot open native library");
                    opened.push(None);
                }
            }
        }

        let mut binding = NativeBinding {
            layout: Some(layout),
            libraries: Vec::new(),
            getaddrinfo: None,
            freeaddrinfo: None,
            getifaddrs: None,
            freeifaddrs: None,
            get_adapters_addresses: None,
            capability: PlatformCapability::default(),
        };

        let mut remote = false;
        if let Some(lib) = opened[layout.remote_library].as_ref() {
            if let (Some(ga), Some(fa)) = (
                bind::<GetAddrInfoFn>(lib, b"getaddrinfo\0"),
                bind::<FreeAddrInfoFn>(lib, b"freeaddrinfo\0"),
            ) {
                binding.getaddrinfo = Some(ga);
                binding.freeaddrinfo = Some(fa);
                remote = true;
            }
        }

        let mut local = false;
        if let Some(lib) = opened[layout.local_library].as_ref() {
            if layout.ifaddrs.is_some() {
                if let (Some(gi), Some(fi)) = (
                    bind::<GetIfAddrsFn>(lib, b"getifaddrs\0"),
                    bind::<FreeIfAddrsFn>(lib, b"freeifaddrs\0"),
                ) {
                    binding.getifaddrs = Some(gi);
                    binding.freeifaddrs = Some(fi);
                    local = true;
                }
            } else if layout.adapters.is_some() {
                if let Some(gaa) = bind::<GetAdaptersAddressesFn>(lib, b"GetAdaptersAddresses\0") {
                    binding.get_adapters_addresses = Some(gaa);
                    local = true;
                }
            }
        }

        binding.capability = PlatformCapability {
            remote_native: remote,
            local_native: local,
        };

        if remote || local {
            binding.libraries = opened.into_iter().flatten().collect();
        } else {
            // Nothing usable came out of the probe: release the handles now
            // and clear the bound pointers with them.
            drop(opened);
            binding.getaddrinfo = None;
            binding.freeaddrinfo = None;
            binding.getifaddrs = None;
            binding.freeifaddrs = None;
            binding.get_adapters_addresses = None;
        }

        tracing::info!(
            os = layout.os_id,
            remote_native = binding.capability.remote_native,
            local_native = binding.capability.local_native,
            "native binding initialized"
        );
        binding
    }

    fn disabled() -> NativeBinding {
        NativeBinding {
            layout: None,
            libraries: Vec::new(),
            getaddrinfo: None,
            freeaddrinfo: None,
            getifaddrs: None,
            freeifaddrs: None,
            get_adapters_addresses: None,
            capability: PlatformCapability::default(),
        }
    }

    pub fn capability(&self) -> PlatformCapability {
        self.capability
    }

    pub fn layout(&self) -> Option<&'static PlatformLayout> {
        self.layout
    }

    /// Release the library handles. Safe to call after a partial init, and
    /// idempotent; every bound pointer is cleared before the handles drop.
    pub fn shutdown(&mut self) {
        self.getaddrinfo = None;
        self.freeaddrinfo = None;
        self.getifaddrs = None;
        self.freeifaddrs = None;
        self.get_adapters_addresses = None;
        self.capability = PlatformCapability::default();
        self.libraries.clear();
    }

    /// Resolve a hostname through the native call, walking the returned
    /// linked list and decoding each record. The list is freed through the
    /// native routine before returning; no reference outlives this call.
    pub fn lookup_remote(&self, host: &str) -> Result<Vec<IpAddress>, LookupError> {
        let (getaddrinfo, freeaddrinfo, layout) =
            match (self.getaddrinfo, self.freeaddrinfo, self.layout) {
                (Some(ga), Some(fa), Some(l)) => (ga, fa, l),
                _ => {
                    return Err(LookupError::BindingUnavailable(
                        "remote-name-resolution".into(),
                    ))
                }
            };

        let c_host = CString::new(host).map_err(|_| LookupError::malformed(host))?;

        let mut hints = HintsBuf([0u8; 48]);
        hints.0[0..4].copy_from_slice(&layout.hint_flags.to_ne_bytes());
        // ai_family stays zero: unspecified, both families requested.

        let mut head: *mut c_void = ptr::null_mut();
        // SAFETY: hints is a zeroed record of sufficient size; the result
        // pointer is ours and the call only writes through it.
        let rc = unsafe {
            getaddrinfo(
                c_host.as_ptr(),
                ptr::null(),
                &hints as *const HintsBuf as *const c_void,
                &mut head,
            )
        };
        if rc != 0 || head.is_null() {
            if !head.is_null() {
                // SAFETY: head came from the paired allocation routine.
                unsafe { freeaddrinfo(head) };
            }
            tracing::debug!(host, code = rc, "getaddrinfo returned no results");
            return Err(LookupError::native("getaddrinfo", rc));
        }

        let mut addresses = Vec::new();
        let mut node = head as *const c_void;
        while !node.is_null() {
            // SAFETY: node points at a live list entry until the free call
            // below; offsets come from this platform's layout table.
            let sockaddr = unsafe { read_ptr(node, layout.addrinfo.addr_offset) };
            if !sockaddr.is_null() {
                if let Some(ip) = unsafe { decode_record(sockaddr as *const c_void, layout) } {
                    tracing::trace!(host, address = %ip, "decoded remote address");
                    addresses.push(ip);
                }
            }
            node = unsafe { read_ptr(node, layout.addrinfo.next_offset) } as *const c_void;
        }

        // SAFETY: head is the unmodified list head; freed exactly once.
        unsafe { freeaddrinfo(head) };
        Ok(addresses)
    }

    /// Enumerate this machine's own interface addresses through the native
    /// call for the platform.
    pub fn lookup_local(&self) -> Result<Vec<IpAddress>, LookupError> {
        let layout = self
            .layout
            .ok_or_else(|| LookupError::BindingUnavailable("local-interface-enumeration".into()))?;

        if let (Some(getifaddrs), Some(freeifaddrs), Some(ifa)) =
            (self.getifaddrs, self.freeifaddrs, layout.ifaddrs)
        {
            let mut head: *mut c_void = ptr::null_mut();
            // SAFETY: the call writes the list head through our pointer.
            let rc = unsafe { getifaddrs(&mut head) };
            if rc != 0 || head.is_null() {
                tracing::debug!(code = rc, "getifaddrs returned no results");
                return Err(LookupError::native("getifaddrs", rc));
            }

            let mut addresses = Vec::new();
            let mut node = head as *const c_void;
            while !node.is_null() {
                // SAFETY: node is a live entry until freeifaddrs below.
                let sockaddr = unsafe { read_ptr(node, ifa.addr_offset) };
                if sockaddr.is_null() {
                    tracing::trace!("null address on interface entry, skipping");
                } else if let Some(ip) = unsafe { decode_record(sockaddr as *const c_void, layout) }
                {
                    tracing::trace!(address = %ip, "decoded local address");
                    addresses.push(ip);
                }
                node = unsafe { read_ptr(node, ifa.next_offset) } as *const c_void;
            }

            // SAFETY: head freed exactly once, after the walk.
            unsafe { freeifaddrs(head) };
            return Ok(addresses);
        }

        if let (Some(gaa), Some(adapters)) = (self.get_adapters_addresses, layout.adapters) {
            let mut size: u32 = 16 * 1024;
            for _ in 0..2 {
                let mut buf = vec![0u8; size as usize];
                // SAFETY: buf is writable for `size` bytes; the call fills
                // it with the adapter list or asks for a bigger buffer.
                let rc = unsafe { gaa(0, GAA_FLAGS, ptr::null_mut(), buf.as_mut_ptr(), &mut size) };
                match rc {
                    0 => {
                        let mut addresses = Vec::new();
                        let mut adapter = buf.as_ptr() as *const c_void;
                        while !adapter.is_null() {
                            // SAFETY: adapter chains stay inside buf.
                            let if_type = unsafe { read_u32(adapter, adapters.if_type_offset) };
                            if if_type != adapters.loopback_if_type
                                && if_type != adapters.tunnel_if_type
                            {
                                let mut unicast =
                                    unsafe { read_ptr(adapter, adapters.first_unicast_offset) }
                                        as *const c_void;
                                while !unicast.is_null() {
                                    let sockaddr = unsafe {
                                        read_ptr(unicast, adapters.unicast_sockaddr_offset)
                                    };
                                    if !sockaddr.is_null() {
                                        if let Some(ip) = unsafe {
                                            decode_record(sockaddr as *const c_void, layout)
                                        } {
                                            addresses.push(ip);
                                        }
                                    }
                                    unicast =
                                        unsafe { read_ptr(unicast, adapters.unicast_next_offset) }
                                            as *const c_void;
                                }
                            }
                            adapter = unsafe { read_ptr(adapter, adapters.next_offset) }
                                as *const c_void;
                        }
                        return Ok(addresses);
                    }
                    ERROR_BUFFER_OVERFLOW => continue, // size was updated; retry once
                    code => {
                        tracing::debug!(code, "GetAdaptersAddresses failed");
                        return Err(LookupError::native("GetAdaptersAddresses", code as i32));
                    }
                }
            }
            return Err(LookupError::native(
                "GetAdaptersAddresses",
                ERROR_BUFFER_OVERFLOW as i32,
            ));
        }

        Err(LookupError::BindingUnavailable(
            "local-interface-enumeration".into(),
        ))
    }
}

impl std::fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBinding")
            .field("os", &self.layout.map(|l| l.os_id))
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Bind one symbol, logging and returning `None` on failure. A missing
/// symbol is an expected, first-class outcome here.
fn bind<T: Copy + 'static>(lib: &Library, name: &[u8]) -> Option<T> {
    // SAFETY: the caller pairs T with the C signature of the named symbol;
    // the copied pointer is used only while the library handle is held.
    match unsafe { lib.get::<T>(name) } {
        Ok(symbol) => Some(*symbol),
        Err(error) => {
            tracing::warn!(
                symbol = %String::from_utf8_lossy(&name[..name.len() - 1]),
                %error,
                "unable to bind native symbol, capability disabled"
            );
            None
        }
    }
}

/// # Safety
/// `base + offset` must point at a readable pointer-sized field.
unsafe fn read_ptr(base: *const c_void, offset: usize) -> *mut c_void {
    (base as *const u8)
        .add(offset)
        .cast::<*mut c_void>()
        .read_unaligned()
}

/// # Safety
/// `base + offset` must point at a readable 4-byte field.
unsafe fn read_u32(base: *const c_void, offset: usize) -> u32 {
    (base as *const u8)
        .add(offset)
        .cast::<u32>()
        .read_unaligned()
}

/// Decode one native socket-address record, dropping unknown families.
///
/// # Safety
/// `sockaddr` must point at a live record of at least the length the
/// platform requires for the family code it carries.
unsafe fn decode_record(sockaddr: *const c_void, layout: &PlatformLayout) -> Option<IpAddress> {
    let header = std::slice::from_raw_parts(sockaddr as *const u8, 2);
    let code = family_code(header, layout)?;
    let len = required_len(code, layout)?;
    let bytes = std::slice::from_raw_parts(sockaddr as *const u8, len);
    match decode_sockaddr(bytes, layout) {
        Ok(DecodedAddress::Ip(ip)) => Some(ip),
        Ok(DecodedAddress::Unrepresentable { family_code }) => {
            tracing::trace!(family_code, "dropping non-IP record");
            None
        }
        Err(error) => {
            tracing::debug!(%error, "undecodable socket-address record");
            None
        }
    }
}
