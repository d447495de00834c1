//! Module discovery port and adapters.

pub mod contract;
pub mod memory;
pub mod xdg;

pub use contract::ModuleDiscovery;
pub use memory::StaticDiscovery;
pub use xdg::DirectoryDiscovery;
