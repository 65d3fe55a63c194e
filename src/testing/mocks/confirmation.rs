//! Confirmation handler with canned answers

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::agent::{ConfirmationHandler, ConfirmationRequest, ConfirmationResponse};
use crate::error::Result;

/// Answers in order; declines once the answers run out
pub struct ScriptedConfirmation {
    answers: Mutex<VecDeque<bool>>,
    seen: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedConfirmation {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn approving(count: usize) -> Self {
        Self::new(vec![true; count])
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ConfirmationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmationHandler for ScriptedConfirmation {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        self.seen.lock().unwrap().push(request.clone());
        let approved = self.answers.lock().unwrap().pop_front().unwrap_or(false);
        Ok(ConfirmationResponse { approved })
    }
}
