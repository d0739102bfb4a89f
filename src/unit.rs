use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// The system under test, as seen by the runner.
///
/// `warm_up` and `run` are the measured operations. Their errors are
/// recorded and the run carries on. `begin` and `end` bracket the measured
/// phase and any error from them aborts the run.
///
/// Measured calls receive a [`CancellationToken`] that fires when the call
/// loses its timeout race. The runner does not stop the call itself;
/// implementations that hold scarce resources should watch the token and
/// bail out.
#[async_trait]
pub trait Unit: Send + Sync {
    /// Prime caches and connections. Defaults to a regular `run`.
    async fn warm_up(&self, cancel: CancellationToken) -> Result<()> {
        self.run(cancel).await
    }

    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    /// One measured operation.
    async fn run(&self, cancel: CancellationToken) -> Result<()>;

    async fn end(&self) -> Result<()> {
        Ok(())
    }
}
