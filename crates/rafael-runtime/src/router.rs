//! Per-step backend routing.
//!
//! Routing is a pure function of the task type over a fixed table. Nothing is
//! cached: the loop asks again every step.

use rafael_core::routing::{ModelRoute, ModelVariant, TaskType};

/// Fixed task-type → backend table.
pub struct ModelRouter;

impl ModelRouter {
    /// Route for a task type. Unlisted types get the default variant.
    pub fn route(task: TaskType) -> ModelRoute {
        match task {
            TaskType::ComplexReasoning | TaskType::DomAnalysis => route(
                ModelVariant::ClaudeSonnet,
                "Superior judgment for ambiguous UI state",
                2000,
                0.015,
            ),
            TaskType::IntentClassification | TaskType::FastLookup => route(
                ModelVariant::ClaudeHaiku,
                "10x cheaper, sub-second classification",
                500,
                0.001,
            ),
            TaskType::VisualAnalysis | TaskType::ScreenshotAnalysis => route(
                ModelVariant::Gemini,
                "Sub-second visual triage",
                1500,
                0.010,
            ),
            TaskType::DocProcessing | TaskType::ContextLoading => route(
                ModelVariant::Kimi,
                "Massive context window for docs",
                3000,
                0.020,
            ),
            TaskType::Other => route(
                ModelVariant::ClaudeSonnet,
                "Default to most capable model",
                2000,
                0.015,
            ),
        }
    }

    /// Route for the `step`th backend call of a run (one-based).
    pub fn route_step(step: u32) -> ModelRoute {
        Self::route(TaskType::for_step(step))
    }
}

fn route(model: ModelVariant, reason: &str, latency_ms: u64, cost: f64) -> ModelRoute {
    ModelRoute {
        model,
        reason: reason.to_owned(),
        estimated_latency_ms: latency_ms,
        estimated_cost: cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries() {
        let cases = [
            (TaskType::ComplexReasoning, ModelVariant::ClaudeSonnet, 2000, 0.015),
            (TaskType::DomAnalysis, ModelVariant::ClaudeSonnet, 2000, 0.015),
            (TaskType::IntentClassification, ModelVariant::ClaudeHaiku, 500, 0.001),
            (TaskType::FastLookup, ModelVariant::ClaudeHaiku, 500, 0.001),
            (TaskType::VisualAnalysis, ModelVariant::Gemini, 1500, 0.010),
            (TaskType::ScreenshotAnalysis, ModelVariant::Gemini, 1500, 0.010),
            (TaskType::DocProcessing, ModelVariant::Kimi, 3000, 0.020),
            (TaskType::ContextLoading, ModelVariant::Kimi, 3000, 0.020),
        ];
        for (task, model, latency, cost) in cases {
            let r = ModelRouter::route(task);
            assert_eq!(r.model, model, "{task:?}");
            assert_eq!(r.estimated_latency_ms, latency);
            assert!((r.estimated_cost - cost).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn default_is_sonnet() {
        let r = ModelRouter::route(TaskType::Other);
        assert_eq!(r.model, ModelVariant::ClaudeSonnet);
        assert_eq!(r.reason, "Default to most capable model");
    }

    #[test]
    fn routing_is_stable() {
        assert_eq!(ModelRouter::route_step(4), ModelRouter::route_step(4));
        assert_eq!(
            ModelRouter::route_step(1).reason,
            "Superior judgment for ambiguous UI state"
        );
    }
}
