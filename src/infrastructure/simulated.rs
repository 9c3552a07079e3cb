use crate::domain::charge::{ChargeHandle, ChargeRequest};
use crate::domain::ports::PaymentProcessor;
use crate::error::ProcessorError;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    next_intent: u64,
    requests: Vec<ChargeRequest>,
    create_failures: VecDeque<ProcessorError>,
    cancel_failures: VecDeque<ProcessorError>,
    canceled: HashSet<String>,
}

/// In-process stand-in for the payment processor.
///
/// Intent ids are sequential (`pi_1`, `pi_2`, ...) so runs are reproducible.
/// Failures can be queued up front and are consumed one call at a time.
#[derive(Default, Clone)]
pub struct SimulatedProcessor {
    state: Arc<Mutex<State>>,
}

impl SimulatedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create_charge` call fail with `error`.
    pub async fn fail_next_create(&self, error: ProcessorError) {
        self.state.lock().await.create_failures.push_back(error);
    }

    /// Makes the next `cancel_charge` call fail with `error`.
    pub async fn fail_next_cancel(&self, error: ProcessorError) {
        self.state.lock().await.cancel_failures.push_back(error);
    }

    /// Every charge request received so far, failed ones included.
    pub async fn requests(&self) -> Vec<ChargeRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn is_canceled(&self, intent_id: &str) -> bool {
        self.state.lock().await.canceled.contains(intent_id)
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeHandle, ProcessorError> {
        let mut state = self.state.lock().await;
        state.requests.push(request);
        if let Some(err) = state.create_failures.pop_front() {
            return Err(err);
        }
        state.next_intent += 1;
        let intent_id = format!("pi_{}", state.next_intent);
        Ok(ChargeHandle {
            client_secret: format!("{}_secret", intent_id),
            intent_id,
        })
    }

    async fn cancel_charge(&self, intent_id: &str) -> Result<(), ProcessorError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.cancel_failures.pop_front() {
            return Err(err);
        }
        if !state.canceled.insert(intent_id.to_string()) {
            return Err(ProcessorError::AlreadyFinal);
        }
        Ok(())
    }
}
