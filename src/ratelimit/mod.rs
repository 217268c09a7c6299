//! Rate limiting logic and state management.

mod limiter;
mod middleware;
mod window;

pub use limiter::{Decision, SlidingWindowLimiter};
pub use middleware::enforce;
pub use window::ClientWindow;
