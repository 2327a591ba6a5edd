// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hand-off types between the pipeline compiler and the runtime.

use crate::evaluation::OperationKind;
use crate::pin::PinType;
use serde::{Deserialize, Serialize};

/// Reference from an operation to the results it consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationInput {
    /// Result of one earlier operation
    Single(usize),
    /// Results of several earlier operations, in order
    Many(Vec<usize>),
}

/// One operation executed by the runtime every frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOperation {
    /// What to execute
    pub kind: OperationKind,
    /// Debug name
    pub name: String,
    /// Type of the value the operation produces
    pub result_type: PinType,
    /// Indices of earlier operations in the same pipeline
    pub inputs: Vec<OperationInput>,
}

/// Receiver of compiled operations, in execution order
pub trait PipelineSink {
    /// Append an operation
    fn add_operation(&mut self, operation: RuntimeOperation);
}

/// Ordered list of runtime operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    operations: Vec<RuntimeOperation>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[RuntimeOperation] {
        &self.operations
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the pipeline has no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Log every operation at debug level
    pub fn log_pipeline(&self) {
        tracing::debug!(operations = self.operations.len(), "Pipeline");
        for (index, operation) in self.operations.iter().enumerate() {
            tracing::debug!(
                "[{index:02}] {:<20} {:<30} {:?}",
                operation.kind.name(),
                operation.name,
                operation.inputs
            );
        }
    }
}

impl PipelineSink for Pipeline {
    fn add_operation(&mut self, operation: RuntimeOperation) {
        self.operations.push(operation);
    }
}
