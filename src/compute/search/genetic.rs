//! Genetic search over continuous (x, y, z, t) candidates.

use crate::compute::brightness::BrightnessEvaluator;
use crate::compute::space::SearchSpace;
use crate::schema::{
    Axis, BestPoint, CancelledSearch, ConfigError, GeneticConfig, Point, SearchError,
    SearchHistory, SearchOutcome, SearchPhase, SearchProgress, SearchResult, SearchStats,
    StopReason, percent_of,
};

use super::heatmap::project_heatmap;
use super::population::{Individual, PopulationRng};
use super::progress::ProgressReporter;
use super::{RunMeter, SourceSearch};

/// Progress events emitted while scoring one generation.
const EVALUATION_CHUNKS: usize = 10;

/// `candidate` beats `incumbent` by more than `threshold` relative to it.
pub fn is_significant_improvement(candidate: f64, incumbent: f64, threshold: f64) -> bool {
    candidate > incumbent && candidate - incumbent > threshold * incumbent.abs()
}

/// Genetic search strategy.
#[derive(Debug, Clone)]
pub struct GeneticSearch {
    config: GeneticConfig,
    produce_heatmap: bool,
}

impl GeneticSearch {
    /// Search with the given hyperparameters and no heatmap.
    pub fn new(config: GeneticConfig) -> Self {
        Self {
            config,
            produce_heatmap: false,
        }
    }

    /// Also project a brightness slice through the optimum.
    pub fn with_heatmap(mut self, produce_heatmap: bool) -> Self {
        self.produce_heatmap = produce_heatmap;
        self
    }

    /// Hyperparameters used by `optimize`.
    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }
}

impl Default for GeneticSearch {
    fn default() -> Self {
        Self::new(GeneticConfig::default())
    }
}

impl SourceSearch for GeneticSearch {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn optimize(
        &mut self,
        evaluator: &BrightnessEvaluator,
        space: &SearchSpace,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<SearchOutcome, SearchError> {
        self.config.validate()?;
        let meter = RunMeter::start(self.name(), evaluator);
        let mut engine = GeneticEngine::new(&self.config, evaluator, space);

        log::info!(
            "Genetic search: population {}, generations {}, mutation rate {}",
            self.config.population_size,
            self.config.generations,
            self.config.mutation_rate
        );

        let stop_reason = engine.run(progress);
        let generations = engine.history.best_brightness.len();

        if stop_reason == StopReason::Cancelled {
            let stats = meter.stats(evaluator, generations, StopReason::Cancelled);
            return Ok(engine.into_cancelled(stats));
        }

        // Unreachable in practice: validation guarantees a non-empty population,
        // and the first scored generation always sets a best.
        let Some(best) = engine.best else {
            return Err(
                ConfigError::InvalidGenetic("population produced no candidates".into()).into(),
            );
        };

        let heatmap = if self.produce_heatmap {
            match project_heatmap(
                evaluator,
                &best,
                space.axis(Axis::X),
                space.axis(Axis::Y),
                true,
                progress,
            ) {
                Some(heatmap) => Some(heatmap),
                None => {
                    let stats = meter.stats(evaluator, generations, StopReason::Cancelled);
                    return Ok(engine.into_cancelled(stats));
                }
            }
        } else {
            None
        };

        let stats = meter.stats(evaluator, generations, stop_reason);
        log::info!(
            "Genetic search finished ({:?}) after {} generations: brightness {:.6} at ({:.2}, {:.2}, {:.2}, {:.4})",
            stop_reason,
            generations,
            best.brightness,
            best.point.x,
            best.point.y,
            best.point.z,
            best.point.t
        );
        progress.report(
            SearchProgress::new(SearchPhase::Completed, 100, generations, "generation")
                .with_best(Some(best)),
        );

        Ok(SearchOutcome::Completed(SearchResult {
            best,
            heatmap,
            stats,
            history: engine.history,
        }))
    }
}

/// Mutable state of one genetic run.
struct GeneticEngine<'a> {
    config: &'a GeneticConfig,
    evaluator: &'a BrightnessEvaluator,
    space: &'a SearchSpace,
    rng: PopulationRng,
    population: Vec<Individual>,
    best: Option<BestPoint>,
    history: SearchHistory,
    generation: usize,
    total_generations: usize,
    stagnation_count: usize,
    mutation_rate: f64,
}

impl<'a> GeneticEngine<'a> {
    fn new(
        config: &'a GeneticConfig,
        evaluator: &'a BrightnessEvaluator,
        space: &'a SearchSpace,
    ) -> Self {
        let rng = match config.random_seed {
            Some(seed) => PopulationRng::new(seed),
            None => PopulationRng::random(),
        };
        Self {
            config,
            evaluator,
            space,
            rng,
            population: Vec::new(),
            best: None,
            history: SearchHistory::default(),
            generation: 0,
            total_generations: config.generations.max(1),
            stagnation_count: 0,
            mutation_rate: config.mutation_rate,
        }
    }

    fn into_cancelled(self, stats: SearchStats) -> SearchOutcome {
        SearchOutcome::Cancelled(CancelledSearch {
            best: self.best,
            stats,
            history: self.history,
        })
    }

    /// Seed the population.
    fn initialize(&mut self) {
        self.population =
            self.rng
                .seed_population(self.space, self.evaluator.receivers(), self.config);
        self.generation = 0;
        self.stagnation_count = 0;
        self.mutation_rate = self.config.mutation_rate;
    }

    fn run(&mut self, progress: &mut ProgressReporter<'_>) -> StopReason {
        self.initialize();
        if !progress.report(SearchProgress::new(SearchPhase::Init, 0, 0, "individual")) {
            return StopReason::Cancelled;
        }

        loop {
            if progress.is_cancelled() || !self.evaluate_population(progress) {
                return StopReason::Cancelled;
            }

            self.update_best();
            self.record_history();

            let completed = self.generation + 1;
            let boundary = SearchProgress::new(
                SearchPhase::Generations,
                percent_of(completed, self.total_generations),
                completed,
                "generation",
            )
            .with_best(self.best);
            if !progress.report(boundary) {
                return StopReason::Cancelled;
            }

            if let Some(reason) = self.should_stop() {
                return reason;
            }

            self.adapt_mutation_rate();
            self.reproduce();
            self.refine();
            self.generation += 1;
        }
    }

    /// Score the population in chunks, reporting after each.
    fn evaluate_population(&mut self, progress: &mut ProgressReporter<'_>) -> bool {
        let n = self.population.len();
        for chunk in 0..EVALUATION_CHUNKS {
            if progress.is_cancelled() {
                return false;
            }
            let start = chunk * n / EVALUATION_CHUNKS;
            let end = (chunk + 1) * n / EVALUATION_CHUNKS;

            let points: Vec<Point> = self.population[start..end]
                .iter()
                .map(|i| i.point)
                .collect();
            let fitness = self.evaluator.evaluate_batch(&points);
            for (individual, value) in self.population[start..end].iter_mut().zip(fitness) {
                individual.fitness = value;
            }

            let done = self.generation * EVALUATION_CHUNKS + chunk + 1;
            let event = SearchProgress::new(
                SearchPhase::Evaluating,
                percent_of(done, self.total_generations * EVALUATION_CHUNKS),
                end,
                "individual",
            )
            .with_best(self.best);
            if !progress.report(event) {
                return false;
            }
        }
        true
    }

    /// Adopt the generation's fittest individual if it significantly beats
    /// the global best.
    fn update_best(&mut self) {
        let Some(fittest) = self
            .population
            .iter()
            .reduce(|a, b| if b.fitness > a.fitness { b } else { a })
        else {
            return;
        };

        let improved = match self.best {
            None => true,
            Some(best) => is_significant_improvement(
                fittest.fitness,
                best.brightness,
                self.config.improvement_threshold,
            ),
        };

        if improved {
            self.best = Some(BestPoint {
                point: fittest.point,
                brightness: fittest.fitness,
            });
            self.stagnation_count = 0;
            log::debug!(
                "Generation {}: new best {:.6} at {:?}",
                self.generation,
                fittest.fitness,
                fittest.point
            );
        } else {
            self.stagnation_count += 1;
        }
    }

    fn record_history(&mut self) {
        let n = self.population.len().max(1) as f64;
        let mean = self.population.iter().map(|i| i.fitness).sum::<f64>() / n;
        self.history
            .best_brightness
            .push(self.best.map_or(0.0, |b| b.brightness));
        self.history.mean_brightness.push(mean);
        self.history.mutation_rate.push(self.mutation_rate);
    }

    fn should_stop(&self) -> Option<StopReason> {
        if self.generation + 1 >= self.total_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(limit) = self.config.early_stop_limit
            && self.stagnation_count >= limit
        {
            log::info!(
                "No significant improvement for {} generations, stopping early",
                self.stagnation_count
            );
            return Some(StopReason::Stagnation);
        }

        None
    }

    fn adapt_mutation_rate(&mut self) {
        let next = self.config.adaptive.next_rate(
            self.mutation_rate,
            self.config.mutation_rate,
            self.stagnation_count,
        );
        if next != self.mutation_rate {
            log::debug!(
                "Generation {}: mutation rate {} -> {} after {} stagnant generations",
                self.generation,
                self.mutation_rate,
                next,
                self.stagnation_count
            );
        }
        self.mutation_rate = next;
    }

    /// Build the next generation: elites, tournament winners, then mutated
    /// offspring of the winners.
    fn reproduce(&mut self) {
        let n = self.population.len();
        let fitness: Vec<f64> = self.population.iter().map(|i| i.fitness).collect();

        let mut ranked: Vec<usize> = (0..n).collect();
        ranked.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

        let elite_count = self.config.elite_count().min(n);
        let parent_count = (n / 2).min(n - elite_count);
        let offspring_count = n - elite_count - parent_count;

        let mut next: Vec<Individual> = ranked[..elite_count]
            .iter()
            .map(|&i| self.population[i])
            .collect();

        let parents: Vec<Point> = (0..parent_count)
            .map(|_| {
                let winner = self.rng.tournament(&fitness, self.config.tournament_size);
                self.population[winner].point
            })
            .collect();
        next.extend(parents.iter().map(|&p| Individual::new(p)));

        let pool: Vec<Point> = if parents.is_empty() {
            next.iter().map(|i| i.point).collect()
        } else {
            parents
        };
        let scales = self.space.perturbation_scales();
        let shrink = 1.0 - 0.5 * self.generation as f64 / self.total_generations as f64;

        for _ in 0..offspring_count {
            let a = pool[self.rng.index(pool.len())];
            let b = pool[self.rng.index(pool.len())];
            let mut child = self.rng.crossover(&a, &b);
            self.rng
                .mutate(&mut child, self.mutation_rate, scales, shrink);
            next.push(Individual::new(self.space.clamp(child)));
        }

        self.population = next;
    }

    /// Sample around the best point and adopt any sample that beats it.
    fn refine(&mut self) {
        let refinement = &self.config.refinement;
        if self.generation % refinement.every != 0 || refinement.samples == 0 {
            return;
        }
        let Some(best) = self.best else {
            return;
        };

        let shrink = (1.0 - self.generation as f64 / self.total_generations as f64).max(0.0);
        let radii = self
            .space
            .perturbation_scales()
            .map(|s| s * refinement.radius * shrink);
        let samples: Vec<Point> = (0..refinement.samples)
            .map(|_| self.space.clamp(self.rng.perturb(&best.point, radii)))
            .collect();
        let values = self.evaluator.evaluate_batch(&samples);

        let Some((idx, &value)) = values
            .iter()
            .enumerate()
            .reduce(|a, b| if b.1 > a.1 { b } else { a })
        else {
            return;
        };

        if value > best.brightness {
            let point = samples[idx];
            log::debug!(
                "Generation {}: refinement improved best {:.6} -> {:.6}",
                self.generation,
                best.brightness,
                value
            );
            self.best = Some(BestPoint {
                point,
                brightness: value,
            });
            if let Some(last) = self.population.last_mut() {
                *last = Individual {
                    point,
                    fitness: value,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        AxisRange, EvaluatorConfig, GridSpec, Position, Survey, TimeWindow, VelocityConfig,
    };

    /// Four receivers on a 1 km square with a spike where a source at
    /// (500, 500, 0) with origin 0.1 s would arrive at 3000 m/s.
    fn square() -> (Survey, SearchSpace) {
        let source = Position::new(500.0, 500.0, 0.0);
        let corners = [
            Position::new(0.0, 0.0, 0.0),
            Position::new(1000.0, 0.0, 0.0),
            Position::new(0.0, 1000.0, 0.0),
            Position::new(1000.0, 1000.0, 0.0),
        ];
        let channels = corners
            .iter()
            .map(|p| {
                let mut trace = vec![0.0; 1000];
                let arrival = 0.1 + source.distance(p) / 3000.0;
                trace[(arrival / 0.001).round() as usize] = 1.0;
                (*p, trace)
            })
            .collect();
        let survey = Survey::from_channels(0.001, channels);
        let grid = GridSpec {
            x: AxisRange::new(0.0, 1000.0, 100.0),
            y: AxisRange::new(0.0, 1000.0, 100.0),
            z: AxisRange::new(0.0, 500.0, 100.0),
            time_step: 0.01,
        };
        let space = SearchSpace::new(&grid, TimeWindow::new(0.0, 0.3)).unwrap();
        (survey, space)
    }

    fn evaluator(survey: &Survey) -> BrightnessEvaluator {
        BrightnessEvaluator::new(survey, &VelocityConfig::default(), &EvaluatorConfig::default())
            .unwrap()
    }

    fn config(seed: u64) -> GeneticConfig {
        GeneticConfig {
            population_size: 60,
            generations: 12,
            random_seed: Some(seed),
            ..Default::default()
        }
    }

    fn run(config: GeneticConfig) -> SearchOutcome {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let mut progress = ProgressReporter::silent();
        GeneticSearch::new(config)
            .optimize(&eval, &space, &mut progress)
            .unwrap()
    }

    #[test]
    fn test_significant_improvement() {
        assert!(is_significant_improvement(1.01, 1.0, 0.001));
        assert!(!is_significant_improvement(1.0005, 1.0, 0.001));
        assert!(!is_significant_improvement(1.0, 1.0, 0.0));
        assert!(is_significant_improvement(0.1, 0.0, 0.001));
    }

    #[test]
    fn test_finds_bright_point() {
        let outcome = run(GeneticConfig {
            population_size: 120,
            generations: 15,
            ..config(42)
        });
        let result = outcome.completed().unwrap();
        assert!(result.best.brightness >= 0.75);
        assert!(result.heatmap.is_none());
        assert_eq!(result.stats.algorithm, "genetic");
    }

    #[test]
    fn test_deterministic_with_seed() {
        let a = run(config(7)).completed().unwrap();
        let b = run(config(7)).completed().unwrap();
        assert_eq!(a.best.point, b.best.point);
        assert_eq!(a.best.brightness.to_bits(), b.best.brightness.to_bits());
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_best_is_monotonic() {
        let outcome = run(config(3));
        let history = &outcome.history().best_brightness;
        assert!(!history.is_empty());
        assert!(history.windows(2).all(|w| w[1] >= w[0]));
        let mutation = &outcome.history().mutation_rate;
        assert!(mutation.iter().all(|&r| (0.0..=0.5).contains(&r)));
    }

    #[test]
    fn test_zero_generations_evaluates_initial_population_only() {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let mut progress = ProgressReporter::silent();
        let outcome = GeneticSearch::new(GeneticConfig {
            population_size: 20,
            generations: 0,
            random_seed: Some(1),
            ..Default::default()
        })
        .optimize(&eval, &space, &mut progress)
        .unwrap();

        let stats: &SearchStats = outcome.stats();
        assert_eq!(stats.generations, 1);
        assert_eq!(stats.evaluations, 20);
        assert_eq!(stats.stop_reason, StopReason::MaxGenerations);
    }

    #[test]
    fn test_progress_contract() {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let mut events = Vec::new();
        let mut progress = ProgressReporter::new(|e: &SearchProgress| {
            events.push(e.clone());
            true
        });
        let outcome = GeneticSearch::new(GeneticConfig {
            population_size: 30,
            generations: 4,
            early_stop_limit: None,
            random_seed: Some(5),
            ..Default::default()
        })
        .optimize(&eval, &space, &mut progress)
        .unwrap();
        drop(progress);

        assert!(!outcome.is_cancelled());
        let evaluating = events
            .iter()
            .filter(|e| e.phase == SearchPhase::Evaluating)
            .count();
        let boundaries: Vec<usize> = events
            .iter()
            .filter(|e| e.phase == SearchPhase::Generations)
            .map(|e| e.index)
            .collect();
        assert_eq!(evaluating, 4 * EVALUATION_CHUNKS);
        assert_eq!(boundaries, vec![1, 2, 3, 4]);
        assert!(
            events
                .iter()
                .filter(|e| e.phase == SearchPhase::Generations)
                .all(|e| e.best.is_some())
        );
        assert_eq!(events.last().map(|e| e.phase), Some(SearchPhase::Completed));
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent
            || w[1].phase == SearchPhase::Completed));
    }

    #[test]
    fn test_cancel_at_generation_boundary() {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let mut progress = ProgressReporter::new(|e: &SearchProgress| {
            !(e.phase == SearchPhase::Generations && e.index == 2)
        });
        let outcome = GeneticSearch::new(GeneticConfig {
            population_size: 30,
            generations: 10,
            early_stop_limit: None,
            random_seed: Some(2),
            ..Default::default()
        })
        .optimize(&eval, &space, &mut progress)
        .unwrap();

        let SearchOutcome::Cancelled(cancelled) = outcome else {
            panic!("expected cancellation");
        };
        assert_eq!(cancelled.stats.generations, 2);
        assert_eq!(cancelled.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(cancelled.history.best_brightness.len(), 2);
        let best = cancelled.best.unwrap();
        assert_eq!(best.brightness, cancelled.history.best_brightness[1]);
        // No evaluation of a third generation happened.
        assert_eq!(cancelled.stats.evaluations, 60 + 10);
    }

    #[test]
    fn test_elites_survive_reproduction() {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let config = config(9);
        let mut engine = GeneticEngine::new(&config, &eval, &space);
        engine.initialize();
        let mut progress = ProgressReporter::silent();
        assert!(engine.evaluate_population(&mut progress));

        let mut before: Vec<Individual> = engine.population.clone();
        before.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        let elites = &before[..config.elite_count()];

        engine.reproduce();
        assert_eq!(engine.population.len(), config.population_size);
        assert_eq!(&engine.population[..config.elite_count()], elites);
        assert!(engine.population.iter().all(|i| space.contains(&i.point)));
    }

    #[test]
    fn test_flat_survey_stops_on_stagnation() {
        let (_, space) = square();
        let silent = Survey::from_channels(
            0.001,
            (0..4)
                .map(|i| (Position::new(i as f64 * 300.0, 0.0, 0.0), vec![0.0; 1000]))
                .collect(),
        );
        let eval = evaluator(&silent);
        let mut progress = ProgressReporter::silent();
        let result = GeneticSearch::new(GeneticConfig {
            population_size: 20,
            generations: 50,
            early_stop_limit: Some(3),
            random_seed: Some(11),
            ..Default::default()
        })
        .optimize(&eval, &space, &mut progress)
        .unwrap()
        .completed()
        .unwrap();

        // The first generation sets the best; three flat ones follow.
        assert_eq!(result.stats.stop_reason, StopReason::Stagnation);
        assert_eq!(result.stats.generations, 4);
        assert_eq!(result.best.brightness, 0.0);
    }

    /// Engine with an evaluated population and a best point just past the
    /// edge of the spike window in origin time, where brightness is zero.
    fn engine_beside_spike<'a>(
        config: &'a GeneticConfig,
        eval: &'a BrightnessEvaluator,
        space: &'a SearchSpace,
    ) -> GeneticEngine<'a> {
        let mut engine = GeneticEngine::new(config, eval, space);
        engine.initialize();
        let point = Point::new(500.0, 500.0, 0.0, 0.1515);
        let brightness = eval.evaluate(&point);
        assert_eq!(brightness, 0.0);
        engine.best = Some(BestPoint { point, brightness });
        eval.clear_cache();
        engine
    }

    #[test]
    fn test_refinement_adopts_better_sample() {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let config = config(21);
        let mut engine = engine_beside_spike(&config, &eval, &space);

        engine.refine();

        let best = engine.best.unwrap();
        assert!(best.brightness > 0.0);
        assert!(space.contains(&best.point));
        assert_eq!(
            engine.population.last().copied(),
            Some(Individual {
                point: best.point,
                fitness: best.brightness,
            })
        );
        assert_eq!(engine.population.len(), config.population_size);
        assert_eq!(eval.evaluations(), config.refinement.samples as u64);
    }

    #[test]
    fn test_refinement_skipped_off_schedule() {
        let (survey, space) = square();
        let eval = evaluator(&survey);
        let config = config(21);
        let mut engine = engine_beside_spike(&config, &eval, &space);
        engine.generation = config.refinement.every + 1;
        let before = engine.population.clone();

        engine.refine();

        assert_eq!(engine.best.unwrap().brightness, 0.0);
        assert_eq!(engine.population, before);
        assert_eq!(eval.evaluations(), 0);
    }

    #[test]
    fn test_heatmap_marks_best() {
        let outcome = run(GeneticConfig {
            population_size: 40,
            generations: 3,
            random_seed: Some(4),
            ..Default::default()
        });
        let best = *outcome.best().unwrap();

        let (survey, space) = square();
        let eval = evaluator(&survey);
        let mut progress = ProgressReporter::silent();
        let result = GeneticSearch::new(GeneticConfig {
            population_size: 40,
            generations: 3,
            random_seed: Some(4),
            ..Default::default()
        })
        .with_heatmap(true)
        .optimize(&eval, &space, &mut progress)
        .unwrap()
        .completed()
        .unwrap();

        assert_eq!(result.best, best);
        let heatmap = result.heatmap.unwrap();
        assert_eq!(heatmap.shape(), (11, 11));
        let (iy, ix) = heatmap.nearest_cell(best.point.x, best.point.y).unwrap();
        assert_eq!(heatmap.values[iy][ix], best.brightness);
        assert_eq!((heatmap.z, heatmap.t), (best.point.z, best.point.t));
    }
}
