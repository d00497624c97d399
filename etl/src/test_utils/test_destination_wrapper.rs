use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::Record;

/// Failure scripted for the inserts into one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationFault {
    /// Every insert fails.
    Fail,
    /// Only the n-th insert (1-based) fails.
    FailOnCall(usize),
    /// Every insert hangs forever.
    Hang,
}

/// A single insert call received by the wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCall {
    pub table: String,
    pub records: Vec<Record>,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<InsertCall>,
    faults: HashMap<String, DestinationFault>,
}

/// Test wrapper for [`Destination`] implementations that records every insert call.
///
/// Calls are recorded before faults are applied, so a failed call still shows up in
/// [`TestDestinationWrapper::calls`] while its records never reach the wrapped destination.
#[derive(Debug, Clone)]
pub struct TestDestinationWrapper<D> {
    wrapped_destination: D,
    inner: Arc<RwLock<Inner>>,
}

impl<D> TestDestinationWrapper<D> {
    /// Creates a new test wrapper around any destination implementation.
    pub fn wrap(destination: D) -> Self {
        Self {
            wrapped_destination: destination,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Returns the wrapped destination.
    pub fn inner(&self) -> &D {
        &self.wrapped_destination
    }

    /// Scripts `fault` for every following insert into `table`.
    pub async fn inject_fault(&self, table: &str, fault: DestinationFault) {
        self.inner
            .write()
            .await
            .faults
            .insert(table.to_string(), fault);
    }

    /// Removes the fault scripted for `table`.
    pub async fn clear_fault(&self, table: &str) {
        self.inner.write().await.faults.remove(table);
    }

    /// Returns every insert call received so far, in arrival order.
    pub async fn calls(&self) -> Vec<InsertCall> {
        self.inner.read().await.calls.clone()
    }

    /// Returns the insert calls received for `table`.
    pub async fn calls_for(&self, table: &str) -> Vec<InsertCall> {
        self.inner
            .read()
            .await
            .calls
            .iter()
            .filter(|call| call.table == table)
            .cloned()
            .collect()
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync,
{
    fn name() -> &'static str {
        D::name()
    }

    async fn insert_records(&self, table: &str, records: Vec<Record>) -> EtlResult<()> {
        let fault = {
            let mut inner = self.inner.write().await;
            inner.calls.push(InsertCall {
                table: table.to_string(),
                records: records.clone(),
            });
            let call_number = inner.calls.iter().filter(|call| call.table == table).count();

            match inner.faults.get(table) {
                Some(DestinationFault::FailOnCall(n)) if *n == call_number => {
                    Some(DestinationFault::Fail)
                }
                Some(DestinationFault::FailOnCall(_)) => None,
                other => other.copied(),
            }
        };

        match fault {
            Some(DestinationFault::Hang) => std::future::pending().await,
            Some(_) => Err(etl_error!(
                ErrorKind::DestinationQueryFailed,
                "Injected destination failure",
                format!("insert into `{table}` failed")
            )),
            None => {
                self.wrapped_destination
                    .insert_records(table, records)
                    .await
            }
        }
    }
}
