pub mod adapter;
pub mod wg_quick;

pub use adapter::TunnelAdapter;
pub use wg_quick::{select_backend, AdapterKind, WgQuickAdapter};
