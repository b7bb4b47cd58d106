use crate::{FailureMode, HarvestEffect, HarvestMsg, HarvestState, Page, PageFailure, Phase};

/// Pure update function: applies a message to the harvest state and returns
/// the effects the scheduler must carry out.
pub fn update(mut state: HarvestState, msg: HarvestMsg) -> (HarvestState, Vec<HarvestEffect>) {
    let effects = match msg {
        HarvestMsg::Start => {
            if state.phase() != Phase::Init {
                return (state, Vec::new());
            }
            state.set_phase(Phase::FetchingFirst);
            vec![HarvestEffect::FetchFirst]
        }
        HarvestMsg::Dispatched => {
            if state.phase() == Phase::Dispatching {
                state.set_phase(Phase::Collecting);
            }
            Vec::new()
        }
        HarvestMsg::PageFetched(page) => match state.phase() {
            Phase::FetchingFirst if page.offset == 0 => on_first_page(&mut state, page),
            Phase::Dispatching | Phase::Collecting => on_page(&mut state, page),
            // Late arrivals after an abort are drained and dropped.
            _ => Vec::new(),
        },
        HarvestMsg::PageFailed(failure) => match state.phase() {
            Phase::FetchingFirst if failure.offset == 0 => {
                // No partial result without the first page, whatever the mode.
                state.record_failure(failure.clone());
                state.set_phase(Phase::Aborted);
                vec![HarvestEffect::Aborted(failure)]
            }
            Phase::Dispatching | Phase::Collecting => on_failure(&mut state, failure),
            _ => Vec::new(),
        },
    };

    (state, effects)
}

fn on_first_page(state: &mut HarvestState, page: Page) -> Vec<HarvestEffect> {
    let offsets = state.apply_first_page(page);
    let mut effects = vec![progress(state)];
    if offsets.is_empty() {
        state.set_phase(Phase::Complete);
        effects.push(HarvestEffect::Completed);
    } else {
        state.set_phase(Phase::Dispatching);
        effects.push(HarvestEffect::Dispatch { offsets });
    }
    effects
}

fn on_page(state: &mut HarvestState, page: Page) -> Vec<HarvestEffect> {
    if !state.take_outstanding(page.offset) {
        return Vec::new();
    }
    let mut effects = Vec::with_capacity(3);
    if let Some(warning) = state.apply_page(page) {
        effects.push(HarvestEffect::Warn(warning));
    }
    effects.push(progress(state));
    complete_if_drained(state, &mut effects);
    effects
}

fn on_failure(state: &mut HarvestState, failure: PageFailure) -> Vec<HarvestEffect> {
    if !state.take_outstanding(failure.offset) {
        return Vec::new();
    }
    state.record_failure(failure.clone());
    match state.mode() {
        FailureMode::Abort => {
            state.cancel_outstanding();
            state.set_phase(Phase::Aborted);
            vec![HarvestEffect::StopDispatch, HarvestEffect::Aborted(failure)]
        }
        FailureMode::BestEffort => {
            let mut effects = Vec::new();
            complete_if_drained(state, &mut effects);
            effects
        }
    }
}

fn complete_if_drained(state: &mut HarvestState, effects: &mut Vec<HarvestEffect>) {
    if state.outstanding() == 0 {
        state.set_phase(Phase::Complete);
        effects.push(HarvestEffect::Completed);
    }
}

fn progress(state: &HarvestState) -> HarvestEffect {
    HarvestEffect::Progress {
        fetched: state.records_fetched(),
        total: state.progress_total(),
    }
}
