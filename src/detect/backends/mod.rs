pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubRuntime;

#[cfg(feature = "backend-tract")]
pub use tract::{TractConfig, TractRuntime};
