use crate::error::ApiError;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

type StageFn<S> = dyn Fn(&mut S, Vec<u8>) -> Result<Vec<u8>, ApiError> + Send + Sync;

/// Turns a stage failure into the bytes returned by [`Pipeline::run`]. Must not fail.
pub type Renderer<S> = Arc<dyn Fn(&S, &PipelineError) -> Vec<u8> + Send + Sync>;

/// One named `bytes -> bytes` step.
pub struct Stage<S> {
    name: &'static str,
    func: Box<StageFn<S>>,
}

impl<S> Stage<S> {
    pub fn new<F>(name: &'static str, func: F) -> Self
    where
        F: Fn(&mut S, Vec<u8>) -> Result<Vec<u8>, ApiError> + Send + Sync + 'static,
    {
        Self {
            name,
            func: Box::new(func),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S> fmt::Debug for Stage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stage").field(&self.name).finish()
    }
}

/// The failure that short-circuited a run.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {error}")]
pub struct PipelineError {
    pub stage: &'static str,
    /// Zero-based position of the failing stage
    pub index: usize,
    #[source]
    pub error: ApiError,
}

impl PipelineError {
    /// Category of the underlying error, for renderers that want machine-readable codes.
    #[must_use]
    pub fn category(&self) -> &'static str {
        self.error.category()
    }
}

/// Ordered stages plus the error renderer.
pub struct Pipeline<S> {
    stages: Vec<Stage<S>>,
    renderer: Renderer<S>,
}

impl<S> Pipeline<S> {
    pub fn new(renderer: Renderer<S>, stages: Vec<Stage<S>>) -> Self {
        Self { stages, renderer }
    }

    /// Append a stage.
    #[must_use]
    pub fn stage<F>(mut self, name: &'static str, func: F) -> Self
    where
        F: Fn(&mut S, Vec<u8>) -> Result<Vec<u8>, ApiError> + Send + Sync + 'static,
    {
        self.stages.push(Stage::new(name, func));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(Stage::name)
    }

    /// Run every stage in order, stopping at the first error.
    pub fn try_run(&self, state: &mut S, input: Vec<u8>) -> Result<Vec<u8>, PipelineError> {
        let mut bytes = input;
        for (index, stage) in self.stages.iter().enumerate() {
            let start = Instant::now();
            match (stage.func)(state, bytes) {
                Ok(out) => {
                    debug!(
                        stage = stage.name,
                        index = index,
                        elapsed_us = start.elapsed().as_micros() as u64,
                        output_len = out.len(),
                        "Pipeline stage completed"
                    );
                    bytes = out;
                }
                Err(error) => {
                    debug!(
                        stage = stage.name,
                        index = index,
                        category = error.category(),
                        error = %error,
                        "Pipeline short-circuited"
                    );
                    return Err(PipelineError {
                        stage: stage.name,
                        index,
                        error,
                    });
                }
            }
        }
        Ok(bytes)
    }

    /// Render a failure with this pipeline's renderer.
    pub fn render(&self, state: &S, error: &PipelineError) -> Vec<u8> {
        (self.renderer)(state, error)
    }

    /// Run the stages; on failure the renderer's output is returned instead.
    pub fn run(&self, state: &mut S, input: Vec<u8>) -> Vec<u8> {
        match self.try_run(state, input) {
            Ok(bytes) => bytes,
            Err(error) => self.render(state, &error),
        }
    }
}

impl<S> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}
