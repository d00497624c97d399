use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::store::watermark::WatermarkStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Read,
    Write,
}

/// A scripted failure of one watermark store operation for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkFault {
    operation: Operation,
    stream_id: String,
    hang: bool,
}

impl WatermarkFault {
    /// Fails every read of `stream_id`.
    pub fn read(stream_id: &str) -> Self {
        Self {
            operation: Operation::Read,
            stream_id: stream_id.to_string(),
            hang: false,
        }
    }

    /// Fails every write of `stream_id`.
    pub fn write(stream_id: &str) -> Self {
        Self {
            operation: Operation::Write,
            stream_id: stream_id.to_string(),
            hang: false,
        }
    }

    /// Makes the operation never complete instead of failing.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    fn matches(&self, operation: Operation, stream_id: &str) -> bool {
        self.operation == operation && self.stream_id == stream_id
    }
}

/// [`WatermarkStore`] wrapper failing the operations matching its faults.
///
/// Operations without a matching fault are forwarded to the wrapped store.
#[derive(Debug, Clone)]
pub struct FaultInjectingWatermarkStore<S> {
    inner: S,
    faults: Vec<WatermarkFault>,
}

impl<S> FaultInjectingWatermarkStore<S> {
    pub fn wrap(store: S, fault: WatermarkFault) -> Self {
        Self {
            inner: store,
            faults: vec![fault],
        }
    }

    /// Adds another fault.
    pub fn and(mut self, fault: WatermarkFault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn fault(&self, operation: Operation, stream_id: &str) -> Option<&WatermarkFault> {
        self.faults
            .iter()
            .find(|fault| fault.matches(operation, stream_id))
    }
}

impl<S> WatermarkStore for FaultInjectingWatermarkStore<S>
where
    S: WatermarkStore + Sync,
{
    async fn get_watermark(&self, stream_id: &str) -> EtlResult<Option<String>> {
        if let Some(fault) = self.fault(Operation::Read, stream_id) {
            if fault.hang {
                std::future::pending::<()>().await;
            }

            bail!(
                ErrorKind::WatermarkReadFailed,
                "Injected watermark read failure",
                format!("stream `{stream_id}`")
            );
        }

        self.inner.get_watermark(stream_id).await
    }

    async fn put_watermark(&self, stream_id: &str, watermark: &str) -> EtlResult<()> {
        if let Some(fault) = self.fault(Operation::Write, stream_id) {
            if fault.hang {
                std::future::pending::<()>().await;
            }

            bail!(
                ErrorKind::WatermarkWriteFailed,
                "Injected watermark write failure",
                format!("stream `{stream_id}` at {watermark}")
            );
        }

        self.inner.put_watermark(stream_id, watermark).await
    }
}
