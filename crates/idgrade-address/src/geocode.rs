//! Bounded access to an external geocoding collaborator.
//!
//! Geocoding is the only operation in a round that talks to the outside world
//! and the only one that can block. All calls of a round go through a single
//! [`GeocodeGate`] shared by every worker being scored:
//!
//! - **Rate limit**: call starts are spaced at least `min_interval_ms` apart,
//!   round-wide.
//! - **Timeout**: each call runs on a detached thread; if it does not answer
//!   within `timeout_ms` it is abandoned and reported as
//!   [`CallOutcome::TimedOut`].
//! - **Backoff**: a [`GeocodeResponse::RateLimited`] answer is retried after
//!   `backoff_base_ms × 2^attempt`, at most `max_retries` times.
//! - **Cooldown**: after `rejection_threshold` consecutive rejections, calls
//!   are skipped (reported as [`CallOutcome::Failed`]) for `cooldown_ms`.
//! - **Deadline**: nothing starts or finishes after the round deadline, if
//!   there is one.
//!
//! None of these failures is fatal: the address pipeline turns them into the
//! soft-fail score.

use std::{
    sync::{Arc, Mutex, MutexGuard, mpsc},
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

const EARTH_METERS_PER_DEGREE: f64 = 111_320.0;

/// Stand-in for waits too long to represent as an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Approximate area in square meters (equirectangular projection).
    #[must_use]
    pub fn area_m2(&self) -> f64 {
        let height = (self.north - self.south).abs() * EARTH_METERS_PER_DEGREE;
        let mid_latitude = f64::midpoint(self.north, self.south).to_radians();
        let width = (self.east - self.west).abs() * EARTH_METERS_PER_DEGREE * mid_latitude.cos();
        height * width.abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub place_rank: u32,
    pub name: String,
    pub display_name: String,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "status", content = "matches", rename_all = "snake_case")]
pub enum GeocodeResponse {
    Matches(Vec<GeocodeMatch>),
    NoResults,
    RateLimited,
    Failed,
}

/// Free-form address in, candidate places out.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, query: &str) -> GeocodeResponse;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Success {
        score: f64,
        bounding_area_m2: Option<f64>,
    },
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Addresses geocoded per worker.
    pub sample_size: usize,
    pub min_interval_ms: u64,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Consecutive rejections that trigger a cooldown.
    pub rejection_threshold: u32,
    pub cooldown_ms: u64,
    pub min_place_rank: u32,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            sample_size: 3,
            min_interval_ms: 1000,
            timeout_ms: 5000,
            max_retries: 3,
            backoff_base_ms: 1000,
            rejection_threshold: 5,
            cooldown_ms: 60_000,
            min_place_rank: 20,
        }
    }
}

/// Whether `candidate` is specific enough and consistent with `query`.
///
/// The match name must appear in the query, and every digit sequence of the
/// match must also appear in the query.
#[must_use]
pub fn accepts_match(query: &str, candidate: &GeocodeMatch, min_place_rank: u32) -> bool {
    if candidate.place_rank < min_place_rank {
        return false;
    }
    let name = candidate.name.trim().to_lowercase();
    if name.is_empty() || !query.to_lowercase().contains(&name) {
        return false;
    }
    let query_numbers = digit_sequences(query);
    digit_sequences(&candidate.display_name)
        .iter()
        .all(|n| query_numbers.contains(n))
}

fn digit_sequences(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Score for the precision of a bounding box: smaller areas mean a more
/// specific (and more plausible) address.
#[must_use]
pub fn area_score(area_m2: f64) -> f64 {
    match area_m2 {
        a if a < 100.0 => 1.0,
        a if a < 1_000.0 => 0.9,
        a if a < 10_000.0 => 0.8,
        a if a < 100_000.0 => 0.7,
        _ => 0.3,
    }
}

/// Scores a successful response by its smallest accepted bounding box.
#[must_use]
pub fn score_response(query: &str, response: &GeocodeResponse, min_place_rank: u32) -> CallOutcome {
    let smallest = match response {
        GeocodeResponse::Matches(matches) => matches
            .iter()
            .filter(|m| accepts_match(query, m, min_place_rank))
            .map(|m| m.bounding_box.area_m2())
            .min_by(f64::total_cmp),
        GeocodeResponse::NoResults => None,
        GeocodeResponse::RateLimited | GeocodeResponse::Failed => return CallOutcome::Failed,
    };
    CallOutcome::Success {
        score: smallest.map_or(0.0, area_score),
        bounding_area_m2: smallest,
    }
}

#[derive(Debug)]
struct GateState {
    next_start: Instant,
    consecutive_rejections: u32,
    cooldown_until: Option<Instant>,
}

/// Rate-limited, time-bounded access to a [`Geocoder`], shared by a round.
pub struct GeocodeGate {
    geocoder: Arc<dyn Geocoder>,
    config: GeocodeConfig,
    deadline: Option<Instant>,
    state: Mutex<GateState>,
}

impl std::fmt::Debug for GeocodeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodeGate")
            .field("config", &self.config)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

enum Attempt {
    Answered(GeocodeResponse),
    TimedOut,
}

impl GeocodeGate {
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        config: GeocodeConfig,
        deadline: impl Into<Option<Instant>>,
    ) -> Self {
        let now = Instant::now();
        Self {
            geocoder,
            config,
            deadline: deadline.into(),
            state: Mutex::new(GateState {
                next_start: now,
                consecutive_rejections: 0,
                cooldown_until: None,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GeocodeConfig {
        &self.config
    }

    /// Geocodes `query` and scores the answer.
    pub fn call(&self, query: &str) -> CallOutcome {
        for attempt in 0..=self.config.max_retries {
            if self.in_cooldown() {
                tracing::debug!(query, "geocoder cooling down, call skipped");
                return CallOutcome::Failed;
            }
            let Some(start) = self.reserve_start() else {
                tracing::warn!(query, "round deadline reached before geocoding");
                return CallOutcome::TimedOut;
            };
            sleep_until(start);

            let response = match self.attempt(query) {
                Attempt::Answered(response) => response,
                Attempt::TimedOut => {
                    tracing::warn!(query, "geocoding timed out");
                    return CallOutcome::TimedOut;
                }
            };

            if !response.is_rate_limited() {
                self.lock_state().consecutive_rejections = 0;
                let outcome = score_response(query, &response, self.config.min_place_rank);
                tracing::debug!(query, ?outcome, "geocoded");
                return outcome;
            }

            self.record_rejection();
            if attempt == self.config.max_retries {
                break;
            }
            let backoff = Duration::from_millis(
                self.config
                    .backoff_base_ms
                    .saturating_mul(1_u64 << attempt.min(32)),
            );
            let resume = later(Instant::now(), backoff);
            if self.is_past_deadline(resume) {
                return CallOutcome::TimedOut;
            }
            tracing::debug!(query, attempt, ?backoff, "rate limited, backing off");
            sleep_until(resume);
        }
        tracing::warn!(query, "geocoding rejected after retries");
        CallOutcome::Failed
    }

    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        // the state stays consistent even if a holder panicked
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn is_past_deadline(&self, instant: Instant) -> bool {
        self.deadline.is_some_and(|deadline| instant >= deadline)
    }

    fn in_cooldown(&self) -> bool {
        let mut state = self.lock_state();
        match state.cooldown_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                state.cooldown_until = None;
                false
            }
            None => false,
        }
    }

    /// Reserves the next rate-limit slot, or `None` if it is past the deadline.
    fn reserve_start(&self) -> Option<Instant> {
        let mut state = self.lock_state();
        let start = state.next_start.max(Instant::now());
        if self.is_past_deadline(start) {
            return None;
        }
        state.next_start = later(start, Duration::from_millis(self.config.min_interval_ms));
        Some(start)
    }

    fn record_rejection(&self) {
        let mut state = self.lock_state();
        state.consecutive_rejections += 1;
        if state.consecutive_rejections >= self.config.rejection_threshold {
            state.consecutive_rejections = 0;
            state.cooldown_until = Some(later(
                Instant::now(),
                Duration::from_millis(self.config.cooldown_ms),
            ));
            tracing::warn!(
                cooldown_ms = self.config.cooldown_ms,
                "geocoder rejected too many calls, cooling down"
            );
        }
    }

    fn attempt(&self, query: &str) -> Attempt {
        let mut timeout = Duration::from_millis(self.config.timeout_ms);
        if let Some(deadline) = self.deadline {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }

        let (tx, rx) = mpsc::channel();
        let geocoder = Arc::clone(&self.geocoder);
        let query = query.to_owned();
        // detached: a hung call is abandoned, its result dropped
        thread::spawn(move || {
            let _ = tx.send(geocoder.geocode(&query));
        });
        match rx.recv_timeout(timeout) {
            Ok(response) => Attempt::Answered(response),
            Err(_) => Attempt::TimedOut,
        }
    }
}

/// `instant + wait`, capped at [`FAR_FUTURE`] instead of overflowing.
fn later(instant: Instant, wait: Duration) -> Instant {
    instant
        .checked_add(wait.min(FAR_FUTURE))
        .unwrap_or(instant)
}

fn sleep_until(instant: Instant) {
    let wait = instant.saturating_duration_since(Instant::now());
    if !wait.is_zero() {
        thread::sleep(wait);
    }
}

/// Replays recorded responses keyed by normalized query.
///
/// Unknown queries answer [`GeocodeResponse::NoResults`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureGeocoder {
    responses: std::collections::BTreeMap<String, GeocodeResponse>,
}

impl FixtureGeocoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(mut self, query: &str, response: GeocodeResponse) -> Self {
        self.responses.insert(fixture_key(query), response);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

fn fixture_key(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl Geocoder for FixtureGeocoder {
    fn geocode(&self, query: &str) -> GeocodeResponse {
        self.responses
            .get(&fixture_key(query))
            .or_else(|| {
                // fixtures loaded from JSON keep their original spelling
                self.responses
                    .iter()
                    .find(|(key, _)| fixture_key(key) == fixture_key(query))
                    .map(|(_, response)| response)
            })
            .cloned()
            .unwrap_or(GeocodeResponse::NoResults)
    }
}

/// A geocoder that is never reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGeocoder;

impl Geocoder for UnavailableGeocoder {
    fn geocode(&self, _query: &str) -> GeocodeResponse {
        GeocodeResponse::Failed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    const QUERY: &str = "12 Elm Street, Springfield, 12345, Example Country";

    fn fast_config() -> GeocodeConfig {
        GeocodeConfig {
            min_interval_ms: 0,
            timeout_ms: 200,
            backoff_base_ms: 1,
            cooldown_ms: 60_000,
            ..GeocodeConfig::default()
        }
    }

    fn building(name: &str, display_name: &str, place_rank: u32) -> GeocodeMatch {
        // roughly 10 m × 10 m at the equator
        GeocodeMatch {
            place_rank,
            name: name.to_owned(),
            display_name: display_name.to_owned(),
            bounding_box: BoundingBox {
                south: 0.0,
                north: 0.00008,
                west: 0.0,
                east: 0.00008,
            },
        }
    }

    fn gate(geocoder: impl Geocoder + 'static, config: GeocodeConfig) -> GeocodeGate {
        GeocodeGate::new(
            Arc::new(geocoder),
            config,
            Instant::now() + Duration::from_secs(30),
        )
    }

    struct Counting {
        calls: AtomicU32,
        response: GeocodeResponse,
    }

    impl Geocoder for Counting {
        fn geocode(&self, _query: &str) -> GeocodeResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    struct Hanging;

    impl Geocoder for Hanging {
        fn geocode(&self, _query: &str) -> GeocodeResponse {
            thread::sleep(Duration::from_secs(5));
            GeocodeResponse::NoResults
        }
    }

    #[test]
    fn test_area_score_thresholds() {
        assert_eq!(area_score(50.0), 1.0);
        assert_eq!(area_score(500.0), 0.9);
        assert_eq!(area_score(5_000.0), 0.8);
        assert_eq!(area_score(50_000.0), 0.7);
        assert_eq!(area_score(5_000_000.0), 0.3);
    }

    #[test]
    fn test_bounding_box_area() {
        let area = building("Elm Street", "", 30).bounding_box.area_m2();
        assert!((area - 79.3).abs() < 1.0, "area = {area}");
    }

    #[test]
    fn test_match_acceptance() {
        let good = building("Elm Street", "12, Elm Street, Springfield, 12345", 30);
        assert!(accepts_match(QUERY, &good, 20));

        let coarse = building("Elm Street", "Elm Street, Springfield", 16);
        assert!(!accepts_match(QUERY, &coarse, 20));

        let wrong_name = building("Oak Avenue", "Oak Avenue, Springfield", 30);
        assert!(!accepts_match(QUERY, &wrong_name, 20));

        let foreign_number = building("Elm Street", "99, Elm Street, Springfield, 12345", 30);
        assert!(!accepts_match(QUERY, &foreign_number, 20));
    }

    #[test]
    fn test_no_accepted_match_scores_zero() {
        let response = GeocodeResponse::Matches(vec![building("Oak Avenue", "", 30)]);
        assert_eq!(
            score_response(QUERY, &response, 20),
            CallOutcome::Success {
                score: 0.0,
                bounding_area_m2: None
            }
        );
    }

    #[test]
    fn test_fixture_success() {
        let fixture = FixtureGeocoder::new().with_response(
            QUERY,
            GeocodeResponse::Matches(vec![building("Elm Street", "12, Elm Street", 30)]),
        );
        let outcome = gate(fixture, fast_config()).call(&QUERY.to_uppercase());
        assert!(matches!(outcome, CallOutcome::Success { score, .. } if score == 1.0));
    }

    #[test]
    fn test_fixture_json_keys_are_normalized() {
        let fixture: FixtureGeocoder = serde_json::from_str(
            r#"{"12 Elm Street,  Springfield, 12345, Example Country": {"status": "no_results"}}"#,
        )
        .unwrap();
        assert_eq!(fixture.geocode(QUERY), GeocodeResponse::NoResults);
        assert_eq!(fixture.len(), 1);
    }

    #[test]
    fn test_unavailable_geocoder_fails() {
        assert_eq!(gate(UnavailableGeocoder, fast_config()).call(QUERY), CallOutcome::Failed);
    }

    #[test]
    fn test_hung_call_times_out() {
        let started = Instant::now();
        let outcome = gate(Hanging, fast_config()).call(QUERY);
        assert_eq!(outcome, CallOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_rate_limited_calls_are_retried() {
        let counting = Arc::new(Counting {
            calls: AtomicU32::new(0),
            response: GeocodeResponse::RateLimited,
        });
        let gate = GeocodeGate::new(
            Arc::clone(&counting) as Arc<dyn Geocoder>,
            GeocodeConfig {
                rejection_threshold: 100,
                ..fast_config()
            },
            Instant::now() + Duration::from_secs(30),
        );
        assert_eq!(gate.call(QUERY), CallOutcome::Failed);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cooldown_skips_calls() {
        let counting = Arc::new(Counting {
            calls: AtomicU32::new(0),
            response: GeocodeResponse::RateLimited,
        });
        let gate = GeocodeGate::new(
            Arc::clone(&counting) as Arc<dyn Geocoder>,
            GeocodeConfig {
                max_retries: 0,
                rejection_threshold: 2,
                ..fast_config()
            },
            Instant::now() + Duration::from_secs(30),
        );
        for _ in 0..5 {
            assert_eq!(gate.call(QUERY), CallOutcome::Failed);
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_calls_are_spaced() {
        let gate = gate(
            FixtureGeocoder::new(),
            GeocodeConfig {
                min_interval_ms: 50,
                ..fast_config()
            },
        );
        let started = Instant::now();
        for _ in 0..3 {
            gate.call(QUERY);
        }
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_past_deadline_times_out() {
        let gate = GeocodeGate::new(
            Arc::new(FixtureGeocoder::new()),
            fast_config(),
            Instant::now(),
        );
        assert_eq!(gate.call(QUERY), CallOutcome::TimedOut);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let counting = Arc::new(Counting {
            calls: AtomicU32::new(0),
            response: GeocodeResponse::RateLimited,
        });
        let gate = GeocodeGate::new(
            Arc::clone(&counting) as Arc<dyn Geocoder>,
            GeocodeConfig {
                max_retries: 0,
                rejection_threshold: 1,
                cooldown_ms: u64::MAX,
                timeout_ms: u64::MAX,
                ..fast_config()
            },
            None::<Instant>,
        );
        assert_eq!(gate.call(QUERY), CallOutcome::Failed);
        assert_eq!(gate.call(QUERY), CallOutcome::Failed);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }
}
