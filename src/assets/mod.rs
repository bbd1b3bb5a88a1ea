pub mod lifecycle;
pub mod locator;

pub use lifecycle::{AssetLifecycleCoordinator, CleanupReport, FailedDelete};
pub use locator::{AssetLocator, Fidelity, Resolved};
