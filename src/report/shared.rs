use std::sync::Arc;

use parking_lot::Mutex;

use super::{PayloadSchema, ReportSnapshot, ReportStore};
use crate::error::ReportError;
use crate::model::{CanaryConfig, KvMap, MetricSetPair, UpstreamPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Ingested(PayloadSchema),
    MetricPairsInstalled,
    ConfigResolved,
    RunSelected(String),
    MetricSelected(String),
    OverviewShown,
}

type Listener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// A report store shared between callers.
///
/// Mutations and snapshot reads go through one mutex, so a snapshot never
/// mixes indices from two states. Listeners run with no lock held and may
/// read, mutate or subscribe to the store again.
#[derive(Clone, Default)]
pub struct SharedReportStore {
    store: Arc<Mutex<ReportStore>>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl SharedReportStore {
    pub fn subscribe(&self, listener: impl Fn(&StateChange) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    pub fn snapshot(&self) -> ReportSnapshot {
        self.store.lock().snapshot()
    }

    pub fn read<R>(&self, reader: impl FnOnce(&ReportStore) -> R) -> R {
        reader(&self.store.lock())
    }

    pub fn ingest(&self, payload: &UpstreamPayload) -> Result<(), ReportError> {
        let schema = match payload {
            UpstreamPayload::SingleRun(_) => PayloadSchema::SingleRun,
            UpstreamPayload::RunBatch(_) => PayloadSchema::RunBatch,
        };
        self.store.lock().ingest(payload)?;
        self.notify(&StateChange::Ingested(schema));
        Ok(())
    }

    pub fn set_metric_pair_list(&self, list: Vec<MetricSetPair>) {
        self.store.lock().set_metric_pair_list(list);
        self.notify(&StateChange::MetricPairsInstalled);
    }

    pub fn set_metric_pair_list_map(&self, lists: KvMap<Vec<MetricSetPair>>) {
        self.store.lock().set_metric_pair_list_map(lists);
        self.notify(&StateChange::MetricPairsInstalled);
    }

    pub fn set_config(&self, config: CanaryConfig) {
        self.store.lock().set_config(config);
        self.notify(&StateChange::ConfigResolved);
    }

    pub fn select_run(&self, run_id: &str) -> Result<(), ReportError> {
        self.store.lock().select_run(run_id)?;
        self.notify(&StateChange::RunSelected(run_id.to_string()));
        Ok(())
    }

    pub fn select_metric(&self, metric_id: &str) {
        self.store.lock().select_metric(metric_id);
        self.notify(&StateChange::MetricSelected(metric_id.to_string()));
    }

    pub fn show_overview(&self) {
        self.store.lock().show_overview();
        self.notify(&StateChange::OverviewShown);
    }

    fn notify(&self, change: &StateChange) {
        // Listeners subscribed during this pass see the next change only.
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener(change);
        }
    }
}
