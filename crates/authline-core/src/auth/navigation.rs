//! Seam for sending the user back to re-authentication.

use tracing::warn;

/// Receives the re-authentication entry point when a session ends.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, target: &str) {
        self(target)
    }
}

/// Fallback used when no navigator is injected: there is no page to
/// replace, so the redirect is reported through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardRedirect;

impl Navigator for HardRedirect {
    fn navigate(&self, target: &str) {
        warn!(login_path = target, "Session ended, re-authentication required");
    }
}
