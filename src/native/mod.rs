//! Native OS resolver access: per-platform layout tables and the dynamic
//! binding that loads and calls the real entry points.

pub mod binding;
pub mod layout;

pub use binding::{NativeBinding, PlatformCapability};
pub use layout::{layout_for, PlatformLayout};
