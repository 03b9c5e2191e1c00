//! Event distribution.
//!
//! A bounded `tokio::mpsc` channel sits between tick production and
//! subscriber dispatch so a slow subscriber back-pressures the producer
//! instead of letting emitted events pile up unbounded in memory, the same
//! discipline a metrics-broadcaster fan-out applies, generalized from a
//! websocket broadcast to a subscriber-callback model.

use crate::adapters::OpportunitySubscriber;
use crate::evaluator::ComprehensiveEvaluation;
use crate::types::AssetPrice;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Clone)]
pub enum EngineEvent {
    PriceUpdate(AssetPrice),
    OpportunityDetected(Box<ComprehensiveEvaluation>),
    ExecutionRequested(String),
}

impl std::fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::PriceUpdate(p) => write!(f, "PriceUpdate({}/{})", p.chain, p.asset),
            EngineEvent::OpportunityDetected(e) => {
                write!(f, "OpportunityDetected({})", e.opportunity_id)
            }
            EngineEvent::ExecutionRequested(id) => write!(f, "ExecutionRequested({id})"),
        }
    }
}

/// Bounded producer side. `try_send` never blocks the detection tick
/// indefinitely; a full channel drops the oldest-style event with a warning
/// rather than stall the happens-before chain.
#[derive(Clone)]
pub struct EventProducer {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventProducer {
    pub fn emit_price_update(&self, price: AssetPrice) {
        if let Err(e) = self.tx.try_send(EngineEvent::PriceUpdate(price)) {
            warn!("event channel full or closed, dropping price update: {e}");
        }
    }

    pub fn emit_opportunity(&self, evaluation: ComprehensiveEvaluation) {
        if let Err(e) = self
            .tx
            .try_send(EngineEvent::OpportunityDetected(Box::new(evaluation)))
        {
            warn!("event channel full or closed, dropping opportunity event: {e}");
        }
    }

    pub fn emit_execution_requested(&self, opportunity_id: String) {
        if let Err(e) = self
            .tx
            .try_send(EngineEvent::ExecutionRequested(opportunity_id))
        {
            warn!("event channel full or closed, dropping execution request: {e}");
        }
    }
}

/// The consumer side: drains the bounded channel and fans out to registered
/// subscribers. Runs as a single background task; `stop()` drops the sender
/// half so the task drains remaining events and exits.
pub struct EventBus {
    producer: EventProducer,
    subscribers: Arc<parking_lot::RwLock<Vec<Arc<dyn OpportunitySubscriber>>>>,
    dispatcher: Option<tokio::task::JoinHandle<()>>,
}

impl EventBus {
    /// `capacity` bounds how many undelivered events may queue before producers
    /// start dropping (with a warning) rather than grow without limit.
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<EngineEvent>(capacity);
        let subscribers: Arc<parking_lot::RwLock<Vec<Arc<dyn OpportunitySubscriber>>>> =
            Arc::new(parking_lot::RwLock::new(Vec::new()));

        let dispatch_subscribers = subscribers.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let EngineEvent::OpportunityDetected(evaluation) = event {
                    let subs = dispatch_subscribers.read().clone();
                    for sub in subs {
                        sub.on_opportunity((*evaluation).clone());
                    }
                } else {
                    debug!("event dispatched: {event:?}");
                }
            }
        });

        Self {
            producer: EventProducer { tx },
            subscribers,
            dispatcher: Some(dispatcher),
        }
    }

    pub fn producer(&self) -> EventProducer {
        self.producer.clone()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn OpportunitySubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Stop-safety: once every `EventProducer` clone (including
    /// this bus's own) is dropped, the dispatcher drains remaining events and
    /// exits, after which no further events reach subscribers. Callers that
    /// handed producer clones to other components must drop those first.
    pub async fn stop(self) {
        let EventBus {
            producer,
            dispatcher,
            ..
        } = self;
        drop(producer);
        if let Some(handle) = dispatcher {
            let _ = handle.await;
        }
    }
}
