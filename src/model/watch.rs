//! Watch expressions: ad hoc expressions evaluated in the context of a suspended frame.

use crate::error::{Error, EvalError};
use crate::event::ModelRequest;
use crate::model::hook::ModelElement;
use crate::model::value::{RawValue, Value};
use crate::model::Parent;
use std::sync::Arc;

/// Receiver of an evaluation result.
pub trait WatchListener: Send + Sync {
    fn watch_evaluation_finished(&self, result: WatchExpressionResult);
}

impl<F: Fn(WatchExpressionResult) + Send + Sync> WatchListener for F {
    fn watch_evaluation_finished(&self, result: WatchExpressionResult) {
        self(result)
    }
}

/// Result of a watch expression evaluation, either a value or an interpreter error.
pub struct WatchExpressionResult {
    expression: String,
    value: RawValue,
    error: Option<EvalError>,
    context: Parent,
}

impl WatchExpressionResult {
    pub fn new(expression: String, result: Result<RawValue, EvalError>, context: Parent) -> Self {
        let (value, error) = match result {
            Ok(value) => (value, None),
            Err(e) => (RawValue::Null, Some(e)),
        };
        Self {
            expression,
            value,
            error,
            context,
        }
    }

    pub fn expression_text(&self) -> &str {
        &self.expression
    }

    /// Evaluated value, a null value if evaluation failed.
    pub fn value(&self) -> Arc<Value> {
        Value::new(self.context.clone(), self.value.clone())
    }

    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.error
            .iter()
            .map(|e| e.display_message().to_string())
            .collect()
    }

    pub fn error(&self) -> Option<Error> {
        self.error.clone().map(Error::Evaluation)
    }
}

/// Entry point for watch expression evaluation.
#[derive(Default)]
pub struct WatchExpressionDelegate {}

impl WatchExpressionDelegate {
    /// Request evaluation of an expression in a stack frame context. The result is
    /// delivered to the listener asynchronously.
    pub fn evaluate(
        &self,
        expression: &str,
        context: &ModelElement,
        listener: Arc<dyn WatchListener>,
    ) -> Result<(), Error> {
        let frame = context.as_frame().ok_or(Error::UnsupportedContext)?;
        let target = frame.target().ok_or(Error::SessionTerminated)?;

        target.post(ModelRequest::EvaluateExpression {
            expression: expression.to_string(),
            frame: frame.clone(),
            thread: frame.thread_handle().clone(),
            listener,
        });
        Ok(())
    }
}
