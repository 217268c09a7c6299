//! Travel requirement generation.

mod gemini;
mod report;

pub use gemini::GeminiAdvisor;
pub use report::TravelReport;

use async_trait::async_trait;

use crate::error::Result;

/// Source of structured travel requirement information.
///
/// The HTTP layer talks to this trait only, so tests can substitute a
/// scripted advisor and the real Gemini client stays behind the seam.
#[async_trait]
pub trait TravelAdvisor: Send + Sync {
    /// Answer `query` about traveling to `destination`, optionally from
    /// `origin`.
    async fn advise(
        &self,
        query: &str,
        destination: &str,
        origin: Option<&str>,
    ) -> Result<TravelReport>;
}
