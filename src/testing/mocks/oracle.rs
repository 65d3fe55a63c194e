//! Scripted oracles
//!
//! Answers are handed out in order. Once the script runs out every call
//! reports the oracle as unavailable.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::oracle::{Disambiguator, Estimator, OracleError, OracleResult, SelectionAnswer};
use crate::storage::{Candidate, FoodId};

pub struct ScriptedDisambiguator {
    answers: Mutex<VecDeque<OracleResult<SelectionAnswer>>>,
    calls: Mutex<Vec<(String, Vec<Candidate>)>>,
    delay: Option<Duration>,
}

impl ScriptedDisambiguator {
    pub fn new(answers: Vec<OracleResult<SelectionAnswer>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_offered_ids(&self) -> Vec<FoodId> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, offered)| offered.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    pub fn last_context(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(context, _)| context.clone())
    }
}

#[async_trait]
impl Disambiguator for ScriptedDisambiguator {
    async fn disambiguate(
        &self,
        context: &str,
        candidates: &[Candidate],
    ) -> OracleResult<SelectionAnswer> {
        self.calls
            .lock()
            .unwrap()
            .push((context.to_string(), candidates.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(OracleError::unavailable("script exhausted")))
    }
}

pub struct ScriptedEstimator {
    answers: Mutex<VecDeque<OracleResult<serde_json::Value>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEstimator {
    pub fn new(answers: Vec<OracleResult<serde_json::Value>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Names passed to `estimate`, in call order
    pub fn estimated_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Estimator for ScriptedEstimator {
    async fn estimate(
        &self,
        name: &str,
        _quantity: f64,
        _unit: &str,
    ) -> OracleResult<serde_json::Value> {
        self.calls.lock().unwrap().push(name.to_string());
        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(OracleError::unavailable("script exhausted")))
    }
}
