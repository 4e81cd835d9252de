//! Scorer hand-off (spec §4.3 step 4 / §6.1): once a CollectorResult has a
//! usable answer and the originating request did not suppress scoring, fire
//! the external scorer. `Scorer::score_brand_async` is synchronous by
//! design (`answer_types::collaborators`), so this never awaits it.

use crate::core::state::SharedState;
use answer_types::ids::ExecutionId;

pub async fn maybe_handoff(state: &SharedState, execution_id: ExecutionId) {
    let Some(scorer) = state.scorer.as_ref() else {
        return;
    };

    let Ok(Some(execution)) = state.store.get_execution(execution_id).await else {
        return;
    };
    let suppressed = execution
        .metadata
        .get("suppress_scoring")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if suppressed {
        return;
    }

    let Ok(Some(result)) = state.store.get_collector_result_by_execution(execution_id).await else {
        return;
    };
    if !result.is_ready() {
        return;
    }

    scorer.score_brand_async(execution.brand_id, execution.customer_id);
}
