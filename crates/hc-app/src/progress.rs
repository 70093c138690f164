use std::fmt;

/// Stages of one evaluation attempt.
///
/// `Pending → ModelRun → MetricCompute → Scored` on success; any
/// failure in `ModelRun` or `MetricCompute` ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStage {
    Pending,
    ModelRun,
    MetricCompute,
    Scored,
    Failed,
}

impl EvalStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, EvalStage::Scored | EvalStage::Failed)
    }

    /// Legal successor on success. Terminal stages have none.
    pub fn next(self) -> Option<EvalStage> {
        match self {
            EvalStage::Pending => Some(EvalStage::ModelRun),
            EvalStage::ModelRun => Some(EvalStage::MetricCompute),
            EvalStage::MetricCompute => Some(EvalStage::Scored),
            EvalStage::Scored | EvalStage::Failed => None,
        }
    }
}

impl fmt::Display for EvalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvalStage::Pending => "pending",
            EvalStage::ModelRun => "model_run",
            EvalStage::MetricCompute => "metric_compute",
            EvalStage::Scored => "scored",
            EvalStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct EvalProgressEvent {
    pub stage: EvalStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

impl EvalProgressEvent {
    pub fn stage(stage: EvalStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path_ends_scored() {
        let mut stage = EvalStage::Pending;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                EvalStage::Pending,
                EvalStage::ModelRun,
                EvalStage::MetricCompute,
                EvalStage::Scored
            ]
        );
        assert!(stage.is_terminal());
        assert_eq!(EvalStage::Failed.next(), None);
    }
}
