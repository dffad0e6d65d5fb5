//! Entry points that wire a survey and configuration into a search run.

use crate::schema::{
    GridSpec, LocateConfig, SearchError, SearchOutcome, SearchPhase, SearchProgress, Survey,
    TimeWindow,
};

use super::brightness::BrightnessEvaluator;
use super::search::{GeneticSearch, GridSearch, ProgressReporter, SourceSearch};
use super::space::SearchSpace;
use super::window::estimate_event_window;

/// Exhaustive search over `grid` and the padded `window`.
pub fn run_grid_search<F>(
    survey: &Survey,
    window: TimeWindow,
    grid: &GridSpec,
    config: &LocateConfig,
    progress_cb: F,
) -> Result<SearchOutcome, SearchError>
where
    F: FnMut(&SearchProgress) -> bool,
{
    let mut progress = ProgressReporter::new(progress_cb);
    run_search(
        survey,
        window,
        grid,
        config,
        &mut GridSearch::new(),
        &mut progress,
    )
}

/// Genetic search over the bounding box of `grid` and the padded `window`.
pub fn run_genetic_search<F>(
    survey: &Survey,
    window: TimeWindow,
    grid: &GridSpec,
    config: &LocateConfig,
    produce_heatmap: bool,
    progress_cb: F,
) -> Result<SearchOutcome, SearchError>
where
    F: FnMut(&SearchProgress) -> bool,
{
    let mut progress = ProgressReporter::new(progress_cb);
    let mut search = GeneticSearch::new(config.genetic.clone()).with_heatmap(produce_heatmap);
    run_search(survey, window, grid, config, &mut search, &mut progress)
}

/// Run any strategy. Structural failures are reported as an `Error` event
/// before being returned.
pub fn run_search(
    survey: &Survey,
    window: TimeWindow,
    grid: &GridSpec,
    config: &LocateConfig,
    search: &mut dyn SourceSearch,
    progress: &mut ProgressReporter<'_>,
) -> Result<SearchOutcome, SearchError> {
    let outcome = prepare(survey, window, grid, config)
        .and_then(|(evaluator, space)| search.optimize(&evaluator, &space, progress));

    if let Err(err) = &outcome {
        log::warn!("{} search failed: {err}", search.name());
        progress.report(SearchProgress::new(SearchPhase::Error, 0, 0, "error"));
    }
    outcome
}

fn prepare(
    survey: &Survey,
    window: TimeWindow,
    grid: &GridSpec,
    config: &LocateConfig,
) -> Result<(BrightnessEvaluator, SearchSpace), SearchError> {
    config.validate()?;
    survey.validate()?;
    let space = SearchSpace::new(grid, config.padded_window(window))?;
    let evaluator = BrightnessEvaluator::new(survey, &config.velocity, &config.evaluator)?;
    Ok((evaluator, space))
}

/// The configured time window, or one estimated from trace onsets.
pub fn resolve_window(survey: &Survey, config: &LocateConfig) -> Result<TimeWindow, SearchError> {
    match config.time_window {
        Some(window) => Ok(window),
        None => Ok(estimate_event_window(
            survey,
            config.evaluator.baseline_samples,
        )?),
    }
}
