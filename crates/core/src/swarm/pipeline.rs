//! # Pipeline Stages
//!
//! Defines the stages one request passes through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Request accepted, session not yet analyzed
    Received,
    /// Context analyzer reading the text
    Analyzing,
    /// Planner choosing domains and priority
    Planning,
    /// Domain workers running
    Dispatching,
    /// Evaluator composing the answer
    Evaluating,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Planning => "planning",
            PipelineStage::Dispatching => "dispatching",
            PipelineStage::Evaluating => "evaluating",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Current stage
    pub stage: PipelineStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Received,
        }
    }
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage, returning it
    pub fn advance(&mut self) -> PipelineStage {
        self.stage = match self.stage {
            PipelineStage::Received => PipelineStage::Analyzing,
            PipelineStage::Analyzing => PipelineStage::Planning,
            PipelineStage::Planning => PipelineStage::Dispatching,
            PipelineStage::Dispatching => PipelineStage::Evaluating,
            PipelineStage::Evaluating => PipelineStage::Complete,
            PipelineStage::Complete => PipelineStage::Complete,
            PipelineStage::Failed => PipelineStage::Failed,
        };
        self.stage
    }

    /// Fail the pipeline
    pub fn fail(&mut self) {
        self.stage = PipelineStage::Failed;
    }

    /// Check if pipeline is complete
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, PipelineStage::Complete | PipelineStage::Failed)
    }

    /// Check if pipeline succeeded
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Complete
    }
}
