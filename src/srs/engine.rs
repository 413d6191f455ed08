//! Pure FSRS state transitions.
//!
//! The stability/difficulty arithmetic is delegated to the `fsrs` crate;
//! this module owns everything around it: the learning and relearning step
//! tables, phase transitions, interval clamping, and fuzzing. No other
//! component inspects or mutates card fields.
//!
//! Short intra-day steps govern the Learning and Relearning phases; a card
//! graduates to the Review phase when it clears its step table, and from
//! then on intervals come from the FSRS memory model. A lapse in Review
//! drops the card into Relearning at step 0.

use chrono::{DateTime, Duration, Utc};
use fsrs::{DEFAULT_PARAMETERS, FSRS, ItemState, MemoryState};
use rand::Rng;

use crate::domain::{Card, CardPhase, Rating};

/// Scheduling knobs. Defaults mirror the FSRS reference scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Target recall probability at the next review, in (0, 1]
    pub desired_retention: f64,
    /// Intra-day intervals for the initial Learning phase
    pub learning_steps: Vec<Duration>,
    /// Intervals after a lapse
    pub relearning_steps: Vec<Duration>,
    /// Hard cap on scheduled intervals, in days
    pub maximum_interval_days: i64,
    /// Bounded jitter on Review intervals to avoid clustering
    pub enable_fuzzing: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: 0.9,
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
            maximum_interval_days: 36_500,
            enable_fuzzing: true,
        }
    }
}

/// Outcome record handed back with the updated card.
#[derive(Debug, Clone)]
pub struct ReviewLog {
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
}

pub struct SrsEngine {
    config: SchedulerConfig,
    fsrs: FSRS,
}

impl SrsEngine {
    pub fn new(config: SchedulerConfig) -> Self {
        let fsrs = FSRS::new(Some(&DEFAULT_PARAMETERS)).expect("Failed to initialize FSRS");
        Self { config, fsrs }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Compute the card state after one review. Deterministic when fuzzing
    /// is disabled; otherwise jitter comes from `rng`.
    pub fn next_card<R: Rng>(
        &self,
        card: &Card,
        rating: Rating,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> (Card, ReviewLog) {
        let memory = match (card.stability, card.difficulty) {
            (Some(stability), Some(difficulty)) => Some(MemoryState {
                stability: stability as f32,
                difficulty: difficulty as f32,
            }),
            _ => None,
        };
        let elapsed_days = card
            .last_review
            .map(|last| (now - last).num_days().max(0) as u32)
            .unwrap_or(0);

        let next_states = self
            .fsrs
            .next_states(memory, self.config.desired_retention as f32, elapsed_days)
            .expect("Failed to calculate FSRS next states");
        let scheduled = match rating {
            Rating::Again => &next_states.again,
            Rating::Hard => &next_states.hard,
            Rating::Good => &next_states.good,
            Rating::Easy => &next_states.easy,
        };

        let mut next = card.clone();
        next.stability = Some(scheduled.memory.stability as f64);
        next.difficulty = Some(scheduled.memory.difficulty as f64);
        next.last_review = Some(now);

        match card.state {
            CardPhase::Learning => {
                self.advance_steps(&mut next, rating, now, scheduled, rng, StepTable::Learning);
            }
            CardPhase::Relearning => {
                self.advance_steps(&mut next, rating, now, scheduled, rng, StepTable::Relearning);
            }
            CardPhase::Review => match rating {
                Rating::Again if !self.config.relearning_steps.is_empty() => {
                    next.state = CardPhase::Relearning;
                    next.step = 0;
                    next.due = now + self.config.relearning_steps[0];
                }
                _ => self.graduate(&mut next, now, scheduled, rng),
            },
        }

        (
            next,
            ReviewLog {
                rating,
                reviewed_at: now,
            },
        )
    }

    /// Step-table walk shared by the Learning and Relearning phases.
    fn advance_steps<R: Rng>(
        &self,
        next: &mut Card,
        rating: Rating,
        now: DateTime<Utc>,
        scheduled: &ItemState,
        rng: &mut R,
        table: StepTable,
    ) {
        let steps = match table {
            StepTable::Learning => &self.config.learning_steps,
            StepTable::Relearning => &self.config.relearning_steps,
        };
        if steps.is_empty() {
            return self.graduate(next, now, scheduled, rng);
        }

        match rating {
            Rating::Again => {
                next.step = 0;
                next.due = now + steps[0];
            }
            Rating::Hard => {
                // Hold the step; step 0 uses the midpoint of the first two steps
                let step = next.step as usize;
                let interval = if step == 0 && steps.len() == 1 {
                    steps[0] * 3 / 2
                } else if step == 0 {
                    (steps[0] + steps[1]) / 2
                } else {
                    steps[step.min(steps.len() - 1)]
                };
                next.due = now + interval;
            }
            Rating::Good => {
                let advanced = next.step as usize + 1;
                if advanced >= steps.len() {
                    self.graduate(next, now, scheduled, rng);
                } else {
                    next.step = advanced as u32;
                    next.due = now + steps[advanced];
                }
            }
            Rating::Easy => self.graduate(next, now, scheduled, rng),
        }
    }

    /// Enter (or stay in) the Review phase with a memory-model interval.
    fn graduate<R: Rng>(
        &self,
        next: &mut Card,
        now: DateTime<Utc>,
        scheduled: &ItemState,
        rng: &mut R,
    ) {
        next.state = CardPhase::Review;
        next.step = 0;

        let mut days = (scheduled.interval.round() as i64).clamp(1, self.config.maximum_interval_days);
        if self.config.enable_fuzzing {
            days = fuzzed_interval(days, self.config.maximum_interval_days, rng);
        }
        next.due = now + Duration::days(days);
    }
}

enum StepTable {
    Learning,
    Relearning,
}

/// Reference fuzz: piecewise-widening band around the computed interval.
/// Intervals under 2.5 days are never fuzzed; results stay within
/// [2, maximum] days.
fn fuzzed_interval<R: Rng>(days: i64, maximum: i64, rng: &mut R) -> i64 {
    const FUZZ_RANGES: [(f64, f64, f64); 3] = [
        (2.5, 7.0, 0.15),
        (7.0, 20.0, 0.10),
        (20.0, f64::MAX, 0.05),
    ];

    let interval = days as f64;
    if interval < 2.5 {
        return days;
    }

    let mut delta = 1.0;
    for (start, end, factor) in FUZZ_RANGES {
        delta += factor * (interval.min(end) - start).max(0.0);
    }

    let min = ((interval - delta).round() as i64).max(2);
    let max = ((interval + delta).round() as i64).min(maximum);
    if min >= max {
        return min.min(maximum);
    }
    rng.random_range(min..=max)
}
