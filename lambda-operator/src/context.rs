//! Shared reconcile context (spec.md §9 "Global singletons": initialized
//! explicitly at process start, threaded through constructors).
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kube::runtime::events::{Recorder, Reporter};
use kube::{Client, Resource};
use lambda_runtime::ReconcileQueue;
use parking_lot::RwLock;

use crate::config::Config;
use crate::metrics::Metrics;

const REPORTER_NAME: &str = "lambda-operator";

/// Diagnostics read by the health server (spec.md SPEC_FULL ambient
/// stack: health/readiness surface).
#[derive(Clone)]
pub struct Diagnostics {
    pub last_reconcile: DateTime<Utc>,
    pub reporter: Reporter,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_reconcile: Utc::now(),
            reporter: REPORTER_NAME.into(),
        }
    }
}

impl Diagnostics {
    pub fn recorder<K: Resource<DynamicType = ()>>(&self, client: Client, obj: &K) -> Recorder {
        Recorder::new(client, self.reporter.clone(), obj.object_ref(&()))
    }
}

/// Context passed to every reconcile and cleanup closure.
pub struct Context {
    pub client: Client,
    pub config: Config,
    pub metrics: Metrics,
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Per-key backoff and in-flight tracking layered atop `Controller`
    /// (spec.md §4.8), shared by both reconcilers.
    pub queue: ReconcileQueue,
}

impl Context {
    pub fn new(client: Client, config: Config, metrics: Metrics) -> Arc<Self> {
        let queue = ReconcileQueue::new(config.backoff_min, config.backoff_max);
        Arc::new(Self {
            client,
            config,
            metrics,
            diagnostics: Arc::new(RwLock::new(Diagnostics::default())),
            queue,
        })
    }

    pub fn record_reconcile(&self) {
        self.diagnostics.write().last_reconcile = Utc::now();
    }
}
