//! Per-platform native record layouts, described as data.
//!
//! Each supported OS gets one [`PlatformLayout`] table holding its raw
//! address-family codes, the byte offsets of the fields we read out of
//! socket-address / address-info / interface-address records, and the names
//! of the libraries hosting the native entry points. The table is chosen
//! once at init from the platform identifier string; the decoder and the
//! resolvers are generic over "the current platform's table" instead of
//! carrying three parallel copies of the walk code.
//!
//! Offsets are computed from the platform C headers for the native pointer
//! width. Getting these wrong is the classic failure mode of this kind of
//! code (the address-info record famously orders `ai_addr`/`ai_canonname`
//! differently between glibc and the BSD-derived platforms), so every
//! offset is derived from the struct definition it mirrors, not hardcoded.

const PTR_SIZE: usize = std::mem::size_of::<usize>();

const fn align_to(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) / alignment * alignment
}

/// Where the raw family code lives inside a socket-address record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyField {
    /// BSD-style: `u8 sa_len` then `u8 sa_family`.
    U8AtOffset1,
    /// SysV/Windows-style: `u16 sa_family` first, native byte order.
    U16AtOffset0,
}

/// Offsets inside one address-info node of the remote-lookup linked list.
#[derive(Debug, Clone, Copy)]
pub struct AddrInfoLayout {
    pub addr_offset: usize,
    pub next_offset: usize,
}

/// Offsets inside one interface-address node (unix local enumeration).
#[derive(Debug, Clone, Copy)]
pub struct IfAddrsLayout {
    pub next_offset: usize,
    pub name_offset: usize,
    pub addr_offset: usize,
}

/// Offsets for the adapter-list walk (Windows local enumeration).
#[derive(Debug, Clone, Copy)]
pub struct AdapterListLayout {
    pub next_offset: usize,
    pub first_unicast_offset: usize,
    pub if_type_offset: usize,
    pub unicast_next_offset: usize,
    pub unicast_sockaddr_offset: usize,
    /// IF_TYPE_SOFTWARE_LOOPBACK: adapters of this type are skipped.
    pub loopback_if_type: u32,
    /// IF_TYPE_TUNNEL: adapters of this type are skipped.
    pub tunnel_if_type: u32,
}

/// Everything the binding layer and decoder need to know about one OS.
#[derive(Debug, Clone, Copy)]
pub struct PlatformLayout {
    pub os_id: &'static str,
    /// Libraries to open, in order. Indexed by `remote_library` /
    /// `local_library` below.
    pub libraries: &'static [&'static str],
    pub remote_library: usize,
    pub local_library: usize,
    /// Raw address-family codes for this OS.
    pub af_inet: u16,
    pub af_inet6: u16,
    /// Link-layer family code, where the OS reports one. Records carrying
    /// it are not representable as IP addresses and are dropped.
    pub af_link: Option<u16>,
    pub family_field: FamilyField,
    /// Offset of the 4 address bytes inside a v4 socket-address record.
    pub v4_addr_offset: usize,
    /// Offset of the 16 address bytes inside a v6 socket-address record.
    pub v6_addr_offset: usize,
    /// Hint flags passed to the remote-resolution call.
    pub hint_flags: i32,
    pub addrinfo: AddrInfoLayout,
    pub ifaddrs: Option<IfAddrsLayout>,
    pub adapters: Option<AdapterListLayout>,
}

// addrinfo on Darwin/glibc: four C ints, then socklen_t, padded out to
// pointer alignment before the pointer members begin.
const AI_POINTERS_START: usize = align_to(4 * 4 + 4, PTR_SIZE);

// ifaddrs is identical on Darwin and Linux: next, name, flags (u32, padded),
// then the sockaddr pointer.
const IFA_LAYOUT: IfAddrsLayout = IfAddrsLayout {
    next_offset: 0,
    name_offset: PTR_SIZE,
    addr_offset: align_to(2 * PTR_SIZE + 4, PTR_SIZE),
};

static DARWIN: PlatformLayout = PlatformLayout {
    os_id: "darwin",
    libraries: &["/System/Library/Frameworks/CoreFoundation.framework/CoreFoundation"],
    remote_library: 0,
    local_library: 0,
    af_inet: 2,
    af_inet6: 30,
    af_link: Some(18),
    family_field: FamilyField::U8AtOffset1,
    v4_addr_offset: 4,
    v6_addr_offset: 8,
    hint_flags: 0,
    // Darwin orders ai_canonname before ai_addr.
    addrinfo: AddrInfoLayout {
        addr_offset: AI_POINTERS_START + PTR_SIZE,
        next_offset: AI_POINTERS_START + 2 * PTR_SIZE,
    },
    ifaddrs: Some(IFA_LAYOUT),
    adapters: None,
};

static LINUX: PlatformLayout = PlatformLayout {
    os_id: "linux",
    libraries: &["libc.so.6"],
    remote_library: 0,
    local_library: 0,
    af_inet: 2,
    af_inet6: 10,
    af_link: Some(17), // AF_PACKET
    family_field: FamilyField::U16AtOffset0,
    v4_addr_offset: 4,
    v6_addr_offset: 8,
    hint_flags: 0,
    // glibc orders ai_addr before ai_canonname.
    addrinfo: AddrInfoLayout {
        addr_offset: AI_POINTERS_START,
        next_offset: AI_POINTERS_START + 2 * PTR_SIZE,
    },
    ifaddrs: Some(IFA_LAYOUT),
    adapters: None,
};

// Windows addrinfo: four ints, then a size_t ai_addrlen at offset 16, then
// canonname / addr / next pointers.
const WIN_AI_POINTERS_START: usize = 16 + PTR_SIZE;

/// AI_ALL. Never AI_ADDRCONFIG on this platform: ADDRCONFIG is the default
/// there and forcing it makes loopback lookups fail on disconnected
/// machines, because the loopback address is not considered a valid global
/// address by that filter.
const WIN_HINT_FLAGS: i32 = 0x0100;

static WINDOWS: PlatformLayout = PlatformLayout {
    os_id: "winnt",
    libraries: &["iphlpapi.dll", "Ws2_32.dll"],
    remote_library: 1,
    local_library: 0,
    af_inet: 2,
    af_inet6: 23,
    af_link: None,
    family_field: FamilyField::U16AtOffset0,
    v4_addr_offset: 4,
    v6_addr_offset: 8,
    hint_flags: WIN_HINT_FLAGS,
    addrinfo: AddrInfoLayout {
        addr_offset: WIN_AI_POINTERS_START + PTR_SIZE,
        next_offset: WIN_AI_POINTERS_START + 2 * PTR_SIZE,
    },
    ifaddrs: None,
    // IP_ADAPTER_ADDRESSES: u64 alignment header, Next, AdapterName,
    // FirstUnicastAddress, six pointers we never read, 8 bytes of physical
    // address, three u32s, then IfType. Unicast entries: Length/Flags,
    // Next, then the SOCKET_ADDRESS pair.
    adapters: Some(AdapterListLayout {
        next_offset: 8,
        first_unicast_offset: 8 + 2 * PTR_SIZE,
        if_type_offset: 8 + 9 * PTR_SIZE + 8 + 12,
        unicast_next_offset: 8,
        unicast_sockaddr_offset: 8 + PTR_SIZE,
        loopback_if_type: 24,
        tunnel_if_type: 131,
    }),
};

/// Look up the layout table for a platform identifier string.
///
/// Returns `None` for unrecognized platforms; the caller degrades to the
/// builtin fallback paths rather than failing.
pub fn layout_for(os_id: &str) -> Option<&'static PlatformLayout> {
    match os_id {
        "darwin" | "macos" => Some(&DARWIN),
        "linux" => Some(&LINUX),
        "winnt" | "windows" => Some(&WINDOWS),
        _ => None,
    }
}
