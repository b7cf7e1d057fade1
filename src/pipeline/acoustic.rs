//! Acoustic analyzer boundary.
//!
//! An optional collaborator that turns a raw audio sample (e.g. a cough
//! recording) into a short natural-language summary folded into the
//! danger-sign input. Failure never aborts the pipeline.

use std::future::Future;

use super::provider::ProviderError;

pub trait AcousticAnalyzer {
    fn analyze(
        &self,
        audio: &[u8],
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// Placeholder analyzer for deployments without acoustic capture.
pub struct NoopAnalyzer;

impl AcousticAnalyzer for NoopAnalyzer {
    async fn analyze(&self, _audio: &[u8]) -> Result<String, ProviderError> {
        Err(ProviderError::Connection("no acoustic analyzer configured".into()))
    }
}

#[cfg(test)]
pub struct MockAnalyzer {
    pub summary: Result<String, String>,
}

#[cfg(test)]
impl AcousticAnalyzer for MockAnalyzer {
    async fn analyze(&self, _audio: &[u8]) -> Result<String, ProviderError> {
        self.summary.clone().map_err(ProviderError::Connection)
    }
}
