mod dashboard;
mod shutdown;

pub use dashboard::{Dashboard, DashboardDeps};
pub use shutdown::ShutdownGuard;
