use serde::Serialize;

use crate::catalog::Catalog;
use crate::encoder::FeatureEncoder;
use crate::error::{Category, PlannerError};
use crate::models::{
    round_cents, ItineraryCombination, PackageRecord, PlanEntry, PlanRejection, TravelCompanion,
    TripRequest,
};
use crate::predictor::{BudgetPredictor, FeatureRow};
use crate::sampling::RandomSource;

pub const DEFAULT_MAX_OPTIONS: usize = 3;
/// Candidates drawn per location per trial.
pub const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownLocation,
    NoCandidates,
    DayOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationResolution {
    Resolved { location: String, candidates: usize },
    Skipped { location: String, reason: SkipReason },
}

impl LocationResolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// A catalog row with its predicted cost attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    pub record: &'a PackageRecord,
    pub predicted_budget: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPackage {
    pub package_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct LocationSelection<'a> {
    pub accepted: Vec<Candidate<'a>>,
    pub skipped: Vec<SkippedPackage>,
    pub days_used: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialReport {
    pub allocation: Vec<u32>,
    pub accepted: usize,
    pub skipped: Vec<SkippedPackage>,
    pub discarded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Combinations(Vec<ItineraryCombination>),
    Rejected(PlanRejection),
}

impl PlanOutcome {
    pub fn into_result(self) -> Result<Vec<ItineraryCombination>, PlanRejection> {
        match self {
            Self::Combinations(combinations) => Ok(combinations),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub outcome: PlanOutcome,
    pub locations: Vec<LocationResolution>,
    pub trials: Vec<TrialReport>,
}

impl GenerationReport {
    fn rejected(rejection: PlanRejection, locations: Vec<LocationResolution>) -> Self {
        Self {
            outcome: PlanOutcome::Rejected(rejection),
            locations,
            trials: Vec::new(),
        }
    }
}

/// Builds randomized multi-location itineraries from a shared catalog.
pub struct ItineraryAssembler<'a, P: ?Sized> {
    catalog: &'a Catalog,
    encoder: &'a FeatureEncoder,
    predictor: &'a P,
}

impl<'a, P> ItineraryAssembler<'a, P>
where
    P: BudgetPredictor + ?Sized,
{
    pub fn new(catalog: &'a Catalog, encoder: &'a FeatureEncoder, predictor: &'a P) -> Self {
        Self {
            catalog,
            encoder,
            predictor,
        }
    }

    pub fn generate<R>(
        &self,
        request: &TripRequest,
        max_options: usize,
        rng: &mut R,
    ) -> Result<GenerationReport, PlannerError>
    where
        R: RandomSource + ?Sized,
    {
        let Some(companion) = TravelCompanion::parse(&request.travel_companion) else {
            return Ok(GenerationReport::rejected(
                PlanRejection::InvalidCompanion,
                Vec::new(),
            ));
        };
        request.validate()?;

        let package_code = self.encoder.encode(Category::PackageType, &request.package)?;
        let companion_rows = self.catalog.for_companion(companion).collect::<Vec<_>>();

        let mut resolutions = Vec::with_capacity(request.locations.len());
        let mut pools: Vec<Option<Vec<Candidate<'a>>>> =
            Vec::with_capacity(request.locations.len());

        for location in &request.locations {
            let Ok(location_code) = self.encoder.encode(Category::Location, location) else {
                resolutions.push(LocationResolution::Skipped {
                    location: location.clone(),
                    reason: SkipReason::UnknownLocation,
                });
                pools.push(None);
                continue;
            };

            let matching = companion_rows
                .iter()
                .copied()
                .filter(|record| {
                    record.location_code == location_code
                        && record.package_type_code == package_code
                        && record.days <= request.total_days
                        && request.rating_range.contains(record.avg_rating)
                })
                .collect::<Vec<_>>();

            if matching.is_empty() {
                resolutions.push(LocationResolution::Skipped {
                    location: location.clone(),
                    reason: SkipReason::NoCandidates,
                });
                pools.push(None);
                continue;
            }

            let candidates = self.price(&matching)?;
            resolutions.push(LocationResolution::Resolved {
                location: location.clone(),
                candidates: candidates.len(),
            });
            pools.push(Some(candidates));
        }

        if pools.iter().all(Option::is_none) {
            return Ok(GenerationReport::rejected(PlanRejection::NoMatch, resolutions));
        }

        let mut combinations = Vec::with_capacity(max_options);
        let mut trials = Vec::with_capacity(max_options);

        for _ in 0..max_options {
            let allocation = allocate_days(request.total_days, request.locations.len(), rng);
            let mut entries = Vec::new();
            let mut skipped = Vec::new();
            let mut total_days = 0_u32;
            let mut total_budget = 0.0_f64;

            for (pool, day_budget) in pools.iter().zip(allocation.iter().copied()) {
                let Some(candidates) = pool else {
                    continue;
                };

                let selection = select_packages(candidates, day_budget, rng);
                for candidate in &selection.accepted {
                    total_days = total_days.saturating_add(candidate.record.days);
                    total_budget += candidate.predicted_budget;
                    entries.push(self.plan_entry(candidate)?);
                }
                skipped.extend(selection.skipped);
            }

            let discarded = entries.is_empty();
            trials.push(TrialReport {
                allocation,
                accepted: entries.len(),
                skipped,
                discarded,
            });

            if !discarded {
                combinations.push(ItineraryCombination {
                    plan: entries,
                    total_days,
                    total_budget: round_cents(total_budget),
                    travel_companion: request.travel_companion.clone(),
                });
            }
        }

        Ok(GenerationReport {
            outcome: PlanOutcome::Combinations(combinations),
            locations: resolutions,
            trials,
        })
    }

    fn price(&self, records: &[&'a PackageRecord]) -> Result<Vec<Candidate<'a>>, PlannerError> {
        let rows = records
            .iter()
            .map(|record| FeatureRow::from(*record))
            .collect::<Vec<_>>();
        let estimates = self
            .predictor
            .predict(&rows)
            .map_err(PlannerError::Prediction)?;

        if estimates.len() != records.len() {
            return Err(PlannerError::PredictionCount {
                expected: records.len(),
                actual: estimates.len(),
            });
        }

        Ok(records
            .iter()
            .zip(estimates)
            .map(|(record, estimate)| Candidate {
                record: *record,
                predicted_budget: round_cents(estimate.max(0.0)),
            })
            .collect())
    }

    fn plan_entry(&self, candidate: &Candidate<'_>) -> Result<PlanEntry, PlannerError> {
        let record = candidate.record;
        Ok(PlanEntry {
            location: self
                .encoder
                .decode(Category::Location, record.location_code)?,
            package_id: record.package_id.clone(),
            package_type: self
                .encoder
                .decode(Category::PackageType, record.package_type_code)?,
            days: record.days,
            accommodation: record.accommodation.clone(),
            food_transport: record.food_transport.clone(),
            avg_rating: record.avg_rating,
            activities: record.activities.iter().cloned().collect(),
            predicted_budget: format!("{:.2}", candidate.predicted_budget),
        })
    }
}

/// Splits `total_days` across `slots` locations: an even share with a floor of
/// one day, plus one extra day for randomly chosen slots until the remainder
/// is used up. With fewer days than slots the floor makes the sum exceed
/// `total_days`.
pub fn allocate_days<R>(total_days: u32, slots: usize, rng: &mut R) -> Vec<u32>
where
    R: RandomSource + ?Sized,
{
    if slots == 0 {
        return Vec::new();
    }

    let share = (total_days / slots as u32).max(1);
    let mut allocation = vec![share; slots];
    let allocated = share as usize * slots;
    let remainder = (total_days as usize).saturating_sub(allocated);

    for slot in rng.permutation(slots).into_iter().take(remainder) {
        allocation[slot] += 1;
    }

    allocation
}

/// One greedy pass over a random sample of at most [`SAMPLE_SIZE`] candidates.
/// Rows that would overflow `day_budget` are skipped, and the pass stops once
/// the budget is met.
pub fn select_packages<'a, R>(
    candidates: &[Candidate<'a>],
    day_budget: u32,
    rng: &mut R,
) -> LocationSelection<'a>
where
    R: RandomSource + ?Sized,
{
    let mut selection = LocationSelection::default();

    for idx in rng.sample(candidates.len(), SAMPLE_SIZE) {
        let candidate = candidates[idx];
        let days_used = match selection.days_used.checked_add(candidate.record.days) {
            Some(days_used) if days_used <= day_budget => days_used,
            _ => {
                selection.skipped.push(SkippedPackage {
                    package_id: candidate.record.package_id.clone(),
                    reason: SkipReason::DayOverflow,
                });
                continue;
            }
        };

        selection.days_used = days_used;
        selection.accepted.push(candidate);

        if selection.days_used >= day_budget {
            break;
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;

    use super::*;
    use crate::models::{RatingRange, RawPackageRow};
    use crate::predictor::FEATURE_DAYS;
    use crate::sampling::RngSource;

    /// Replays fixed draws; falls back to identity order when exhausted.
    #[derive(Default)]
    struct ScriptedSource {
        permutations: VecDeque<Vec<usize>>,
        samples: VecDeque<Vec<usize>>,
    }

    impl RandomSource for ScriptedSource {
        fn permutation(&mut self, len: usize) -> Vec<usize> {
            self.permutations
                .pop_front()
                .unwrap_or_else(|| (0..len).collect())
        }

        fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
            self.samples
                .pop_front()
                .unwrap_or_else(|| (0..len.min(amount)).collect())
        }
    }

    #[derive(Default)]
    struct PerDayPredictor {
        calls: AtomicUsize,
    }

    impl BudgetPredictor for PerDayPredictor {
        fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(rows
                .iter()
                .map(|row| row.get(FEATURE_DAYS) * 1000.125)
                .collect())
        }
    }

    fn raw(id: &str, location: &str, days: u32, rating: f64, companion: &str) -> RawPackageRow {
        RawPackageRow {
            package_id: id.to_string(),
            location_id: location.to_string(),
            package_type: "Moderate".to_string(),
            duration_days: days,
            budget: 10_000.0,
            avg_rating: rating,
            accommodation: "Guest House".to_string(),
            food_transport: "Half Board".to_string(),
            activities: "Hiking, Wildlife".to_string(),
            travel_companion: companion.to_string(),
        }
    }

    fn fixture() -> (Catalog, FeatureEncoder) {
        let mut rows = Vec::new();
        for loc in 1..=3 {
            for (idx, days) in [1, 1, 2, 2, 3, 4].into_iter().enumerate() {
                rows.push(raw(
                    &format!("P{loc}-{idx}"),
                    &format!("LOC_{loc}"),
                    days,
                    3.0 + idx as f64 * 0.3,
                    "Family",
                ));
            }
        }
        rows.push(raw("S-1", "LOC_1", 1, 4.0, "Solo"));
        let mut premium = raw("X-1", "LOC_3", 1, 4.0, "Family");
        premium.package_type = "Premium".to_string();
        rows.push(premium);

        let encoder = FeatureEncoder::fit(&rows);
        let catalog = Catalog::build(&rows, &encoder).unwrap();
        (catalog, encoder)
    }

    fn request(locations: &[&str], total_days: u32, companion: &str) -> TripRequest {
        TripRequest {
            locations: locations.iter().map(|loc| loc.to_string()).collect(),
            package: "Moderate".to_string(),
            total_days,
            rating_range: RatingRange::new(3.0, 5.0).unwrap(),
            travel_companion: companion.to_string(),
        }
    }

    #[test]
    fn allocation_sums_to_total_when_days_cover_locations() {
        let mut rng = RngSource::seeded(3);
        for slots in 1..=6_usize {
            for total in slots as u32..=20 {
                let allocation = allocate_days(total, slots, &mut rng);
                assert_eq!(allocation.len(), slots);
                assert_eq!(allocation.iter().sum::<u32>(), total);
                assert!(allocation.iter().all(|days| *days >= 1));
            }
        }
    }

    #[test]
    fn allocation_floor_can_exceed_total_days() {
        let mut rng = RngSource::seeded(1);
        let allocation = allocate_days(1, 3, &mut rng);
        assert_eq!(allocation, vec![1, 1, 1]);
        assert_eq!(allocation.iter().sum::<u32>(), 3);
    }

    #[test]
    fn remainder_goes_to_shuffled_slots() {
        let mut rng = ScriptedSource {
            permutations: VecDeque::from([vec![2, 0, 1]]),
            ..Default::default()
        };
        assert_eq!(allocate_days(5, 3, &mut rng), vec![2, 1, 2]);
    }

    #[test]
    fn selection_skips_overflowing_rows_in_one_pass() {
        let (catalog, _) = fixture();
        let candidates = catalog
            .records()
            .iter()
            .filter(|record| record.package_id.starts_with("P1-"))
            .map(|record| Candidate {
                record,
                predicted_budget: 100.0,
            })
            .collect::<Vec<_>>();

        // days in draw order: 4, 2, 1, 3, 1
        let mut rng = ScriptedSource {
            samples: VecDeque::from([vec![5, 2, 0, 4, 1]]),
            ..Default::default()
        };
        let selection = select_packages(&candidates, 3, &mut rng);

        let accepted = selection
            .accepted
            .iter()
            .map(|c| c.record.package_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(accepted, vec!["P1-2", "P1-0"]);
        assert_eq!(selection.days_used, 3);
        assert_eq!(selection.skipped.len(), 1);
        assert_eq!(selection.skipped[0].package_id, "P1-5");
        assert_eq!(selection.skipped[0].reason, SkipReason::DayOverflow);
    }

    #[test]
    fn selection_treats_day_overflow_past_u32_as_skip() {
        let rows = vec![
            raw("L-1", "LOC_1", u32::MAX - 1, 4.0, "Family"),
            raw("L-2", "LOC_1", 5, 4.0, "Family"),
        ];
        let encoder = FeatureEncoder::fit(&rows);
        let catalog = Catalog::build(&rows, &encoder).unwrap();
        let candidates = catalog
            .records()
            .iter()
            .map(|record| Candidate {
                record,
                predicted_budget: 1.0,
            })
            .collect::<Vec<_>>();

        let selection = select_packages(&candidates, u32::MAX, &mut ScriptedSource::default());
        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.days_used, u32::MAX - 1);
        assert_eq!(
            selection.skipped,
            vec![SkippedPackage {
                package_id: "L-2".to_string(),
                reason: SkipReason::DayOverflow,
            }]
        );
    }

    #[test]
    fn empty_trials_are_discarded_from_combinations() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);

        // One day per location; the first trial only draws the 2-day rows.
        let mut rng = ScriptedSource {
            samples: VecDeque::from([vec![2, 3], vec![3, 2]]),
            ..Default::default()
        };
        let report = assembler
            .generate(&request(&["LOC_1", "LOC_2"], 2, "Family"), 3, &mut rng)
            .unwrap();

        assert_eq!(report.trials.len(), 3);
        assert_eq!(report.trials[0].allocation, vec![1, 1]);
        assert!(report.trials[0].discarded);
        assert_eq!(report.trials[0].accepted, 0);
        assert_eq!(report.trials[0].skipped.len(), 4);
        assert!(report.trials[1..].iter().all(|trial| !trial.discarded));

        let PlanOutcome::Combinations(combinations) = report.outcome else {
            panic!("expected combinations, got {:?}", report.outcome);
        };
        assert_eq!(combinations.len(), 2);
        for combo in &combinations {
            assert_eq!(combo.total_days, 2);
            assert!(combo.plan.iter().all(|entry| entry.days == 1));
        }
    }

    #[test]
    fn generates_combinations_within_constraints() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let req = request(&["LOC_1", "LOC_2"], 5, "Family");

        for seed in 0..20 {
            let mut rng = RngSource::seeded(seed);
            let report = assembler.generate(&req, DEFAULT_MAX_OPTIONS, &mut rng).unwrap();
            assert_eq!(report.trials.len(), DEFAULT_MAX_OPTIONS);
            for trial in &report.trials {
                assert_eq!(trial.allocation.iter().sum::<u32>(), 5);
            }

            let combinations = report.outcome.into_result().unwrap();
            assert!(combinations.len() <= DEFAULT_MAX_OPTIONS);
            for combo in combinations {
                assert_eq!(combo.travel_companion, "Family");
                assert!(combo.total_days <= 5);
                assert!(combo.total_budget > 0.0);
                assert_eq!(
                    combo.total_days,
                    combo.plan.iter().map(|entry| entry.days).sum::<u32>()
                );
                let summed = combo
                    .plan
                    .iter()
                    .map(|entry| entry.predicted_budget.parse::<f64>().unwrap())
                    .sum::<f64>();
                assert!((summed - combo.total_budget).abs() <= 0.01);
                for entry in &combo.plan {
                    assert!((3.0..=5.0).contains(&entry.avg_rating));
                    assert_eq!(entry.package_type, "Moderate");
                    assert_eq!(entry.activities, vec!["Hiking", "Wildlife"]);
                    assert!(entry.location == "LOC_1" || entry.location == "LOC_2");
                }
            }
        }
        assert_eq!(predictor.calls.load(Ordering::Relaxed), 40);
    }

    #[test]
    fn predicted_budget_is_formatted_to_cents() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = ScriptedSource::default();

        let report = assembler
            .generate(&request(&["LOC_1"], 1, "Family"), 1, &mut rng)
            .unwrap();
        let combinations = report.outcome.into_result().unwrap();
        assert_eq!(combinations[0].plan[0].predicted_budget, "1000.13");
        assert_eq!(combinations[0].total_budget, 1000.13);
    }

    #[test]
    fn invalid_companion_is_rejected_before_filtering() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(0);

        let report = assembler
            .generate(&request(&["LOC_1"], 3, "Pets"), 3, &mut rng)
            .unwrap();
        assert_eq!(
            report.outcome,
            PlanOutcome::Rejected(PlanRejection::InvalidCompanion)
        );
        assert!(report.locations.is_empty());
        assert_eq!(predictor.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn unknown_only_location_is_no_match() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(0);

        let report = assembler
            .generate(&request(&["LOC_999"], 3, "Family"), 3, &mut rng)
            .unwrap();
        assert_eq!(report.outcome, PlanOutcome::Rejected(PlanRejection::NoMatch));
        assert_eq!(
            report.locations,
            vec![LocationResolution::Skipped {
                location: "LOC_999".to_string(),
                reason: SkipReason::UnknownLocation,
            }]
        );
    }

    #[test]
    fn unknown_location_is_skipped_among_known_ones() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(8);

        let report = assembler
            .generate(&request(&["LOC_999", "LOC_2"], 4, "Family"), 3, &mut rng)
            .unwrap();
        assert!(!report.locations[0].is_resolved());
        assert!(report.locations[1].is_resolved());
        for combo in report.outcome.into_result().unwrap() {
            assert!(combo.plan.iter().all(|entry| entry.location == "LOC_2"));
        }
    }

    #[test]
    fn location_without_candidates_is_reported() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(2);

        let mut req = request(&["LOC_3"], 3, "Family");
        req.rating_range = RatingRange::new(0.0, 1.0).unwrap();
        let report = assembler.generate(&req, 3, &mut rng).unwrap();

        assert_eq!(report.outcome, PlanOutcome::Rejected(PlanRejection::NoMatch));
        assert_eq!(
            report.locations,
            vec![LocationResolution::Skipped {
                location: "LOC_3".to_string(),
                reason: SkipReason::NoCandidates,
            }]
        );
    }

    #[test]
    fn single_day_across_three_locations_keeps_floor() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(21);

        let report = assembler
            .generate(&request(&["LOC_1", "LOC_2", "LOC_3"], 1, "Family"), 3, &mut rng)
            .unwrap();
        for trial in &report.trials {
            assert_eq!(trial.allocation, vec![1, 1, 1]);
        }
        for combo in report.outcome.into_result().unwrap() {
            assert!(combo.total_days <= 3);
            assert!(combo.plan.iter().all(|entry| entry.days == 1));
        }
    }

    #[test]
    fn duplicate_locations_are_drawn_independently() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(4);

        let report = assembler
            .generate(&request(&["LOC_1", "LOC_1"], 4, "Family"), 1, &mut rng)
            .unwrap();
        assert_eq!(report.locations.len(), 2);
        assert!(report.locations.iter().all(LocationResolution::is_resolved));
        assert_eq!(report.trials[0].allocation.len(), 2);
        assert_eq!(predictor.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn unknown_package_tier_is_an_error() {
        let (catalog, encoder) = fixture();
        let predictor = PerDayPredictor::default();
        let assembler = ItineraryAssembler::new(&catalog, &encoder, &predictor);
        let mut rng = RngSource::seeded(0);

        let mut req = request(&["LOC_1"], 3, "Family");
        req.package = "Luxury".to_string();
        assert!(matches!(
            assembler.generate(&req, 3, &mut rng),
            Err(PlannerError::Encoding(_))
        ));
    }
}
