use std::fmt;

/// Failure talking to a discovery driver's backing store (spec.md §4.10).
/// The concrete leasing/watch protocol behind a driver is out of scope for
/// the core (spec.md §1); this only wraps whatever a [`crate::Driver`]
/// implementation reports.
#[derive(Debug)]
pub struct DiscoveryError(pub Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "discovery backend error: {}", self.0)
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl DiscoveryError {
    pub fn new(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(e))
    }
}
