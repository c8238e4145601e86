use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use idgrade_address::{
    gazetteer::StaticGazetteer,
    geocode::{
        BoundingBox, FixtureGeocoder, GeocodeConfig, GeocodeMatch, GeocodeResponse, Geocoder,
        UnavailableGeocoder,
    },
    pipeline::{AddressStage, SOFT_FAIL_SCORE},
};
use idgrade_core::{
    BandDistribution, Round, RuleId, ScoringSpec, SeedIdentity, SpecError, Submission, Variation,
    WorkerId,
};
use idgrade_round::{GradingConfig, RoundError, grade_round};

const WELL_DISTRIBUTED: [&str; 9] = [
    "John Smth",
    "John Smit",
    "Jon Smith",
    "Johnn Smeeth",
    "Joan Smythe",
    "Jown Smeyth",
    "Jonh Smoyth",
    "Jonn Smuyth",
    "Johm Smeuyth",
];

const UNIQUE: [&str; 9] = [
    "Jahn Smeth",
    "Johan Smit",
    "Jonathan Smithe",
    "Jo Smith",
    "John Smithson",
    "Jean Smith",
    "Juan Smith",
    "Ivan Smith",
    "Sean Smith",
];

const DOBS: [&str; 9] = [
    "1990-06-16",
    "1990-06-13",
    "1990-07-01",
    "1990-08-20",
    "1991-01-10",
    "1990-06",
    "1990-06-14",
    "1990-06-17",
    "1990-06-20",
];

fn spec() -> ScoringSpec {
    ScoringSpec {
        variation_count: 9,
        phonetic_distribution: BandDistribution::new(0.3, 0.6, 0.1),
        orthographic_distribution: BandDistribution::new(0.3, 0.6, 0.1),
        rule_set: vec![RuleId::DeleteLetter],
        rule_percentage: 0.3,
    }
}

fn street_address(street: &str, number: usize) -> String {
    format!("{number} {street}, Springfield, 12345, Example Country")
}

fn submission(names: &[&str], street: &str) -> Submission {
    let variations = names
        .iter()
        .zip(DOBS)
        .enumerate()
        .map(|(i, (name, dob))| Variation::new(*name, dob, street_address(street, i + 1)))
        .collect();
    [("John Smith".to_owned(), variations)].into_iter().collect()
}

fn round(seed_address: &str, submissions: Vec<(&str, Submission)>) -> Round {
    Round {
        seeds: vec![SeedIdentity::new("John Smith", "1990-06-15", seed_address)],
        spec: spec(),
        submissions: submissions
            .into_iter()
            .map(|(id, s)| (WorkerId::new(id), s))
            .collect(),
    }
}

/// Resolves every house on the test streets to a ~9 m × 9 m building.
fn geocoder() -> Arc<FixtureGeocoder> {
    Arc::new(fixture())
}

fn fixture() -> FixtureGeocoder {
    let mut fixture = FixtureGeocoder::new();
    for street in ["Elm Street", "Oak Avenue", "Pine Road"] {
        for number in 1..=9 {
            fixture = fixture.with_response(
                &street_address(street, number),
                GeocodeResponse::Matches(vec![GeocodeMatch {
                    place_rank: 30,
                    name: street.to_owned(),
                    display_name: format!("{number}, {street}, Springfield, 12345"),
                    bounding_box: BoundingBox {
                        south: 0.0,
                        north: 0.00008,
                        west: 0.0,
                        east: 0.00008,
                    },
                }]),
            );
        }
    }
    fixture
}

/// Never answers queries on one street; answers the rest from the fixture.
struct HangsOnStreet {
    street: &'static str,
    fixture: FixtureGeocoder,
}

impl Geocoder for HangsOnStreet {
    fn geocode(&self, query: &str) -> GeocodeResponse {
        if query.contains(self.street) {
            thread::sleep(Duration::from_secs(30));
        }
        self.fixture.geocode(query)
    }
}

fn config() -> GradingConfig {
    GradingConfig {
        round_seed: 42,
        parallelism: Some(4),
        round_deadline_ms: 60_000,
        geocode: GeocodeConfig {
            min_interval_ms: 0,
            timeout_ms: 1_000,
            backoff_base_ms: 1,
            ..GeocodeConfig::default()
        },
    }
}

#[test]
fn test_well_distributed_worker_scores_high() {
    let round = round(
        "Example Country",
        vec![
            ("good", submission(&WELL_DISTRIBUTED, "Elm Street")),
            ("copies", submission(&["John Smith"; 9], "Oak Avenue")),
        ],
    );
    let report = grade_round(&round, &config(), geocoder(), &StaticGazetteer::builtin()).unwrap();

    let good = report.worker(&WorkerId::new("good")).unwrap();
    assert!(good.name_score > 0.8, "name score = {}", good.name_score);
    assert_eq!(good.dob_score, 1.0);
    assert_eq!(good.address_score, 1.0);
    assert_eq!(good.completeness, 1.0);
    assert!(good.raw_reward > 0.9, "raw reward = {}", good.raw_reward);
    assert_eq!(good.anti_collusion_penalty, 0.0);

    let copies = report.worker(&WorkerId::new("copies")).unwrap();
    assert!(copies.name_score < 0.2, "name score = {}", copies.name_score);
    assert!(copies.raw_reward < good.raw_reward);
}

#[test]
fn test_grading_is_deterministic() {
    let round = round(
        "Example Country",
        vec![
            ("a", submission(&WELL_DISTRIBUTED, "Elm Street")),
            ("b", submission(&UNIQUE, "Oak Avenue")),
        ],
    );
    let gazetteer = StaticGazetteer::builtin();
    let first = grade_round(&round, &config(), geocoder(), &gazetteer).unwrap();
    let second = grade_round(&round, &config(), geocoder(), &gazetteer).unwrap();
    assert_eq!(first.workers, second.workers);
    assert_eq!(first.signals, second.signals);
    assert_eq!(first.addresses, second.addresses);
}

#[test]
fn test_identical_submissions_are_penalized() {
    let round = round(
        "Example Country",
        vec![
            ("original", submission(&WELL_DISTRIBUTED, "Elm Street")),
            ("copy", submission(&WELL_DISTRIBUTED, "Elm Street")),
            ("unique", submission(&UNIQUE, "Pine Road")),
        ],
    );
    let report = grade_round(&round, &config(), geocoder(), &StaticGazetteer::builtin()).unwrap();

    for id in ["original", "copy"] {
        let worker = report.worker(&WorkerId::new(id)).unwrap();
        assert!(worker.raw_reward > 0.0);
        assert_eq!(worker.anti_collusion_penalty, 1.0);
        assert_eq!(worker.final_reward, 0.0);
    }
    let unique = report.worker(&WorkerId::new("unique")).unwrap();
    assert_eq!(unique.anti_collusion_penalty, 0.0);
    assert_eq!(unique.final_reward, unique.raw_reward);
    assert_eq!(report.summary.penalized_workers, 2);
}

#[test]
fn test_city_seed_matches_its_own_region() {
    let round = round(
        "Springfield, Example Country",
        vec![("a", submission(&WELL_DISTRIBUTED, "Elm Street"))],
    );
    let report = grade_round(&round, &config(), geocoder(), &StaticGazetteer::builtin()).unwrap();
    let address = &report.addresses[&WorkerId::new("a")];
    assert_eq!(address.decided_by, AddressStage::Geocode);
    assert!(address.verdicts.iter().all(|v| v.region_match));
    assert_eq!(address.score, 1.0);
}

#[test]
fn test_foreign_seed_region_zeroes_addresses() {
    let round = round("Germany", vec![("a", submission(&WELL_DISTRIBUTED, "Elm Street"))]);
    let report = grade_round(&round, &config(), geocoder(), &StaticGazetteer::builtin()).unwrap();
    assert_eq!(report.addresses[&WorkerId::new("a")].decided_by, AddressStage::Region);
    assert_eq!(report.workers[0].address_score, 0.0);
}

#[test]
fn test_unreachable_geocoder_soft_fails() {
    let round = round(
        "Example Country",
        vec![("a", submission(&WELL_DISTRIBUTED, "Elm Street"))],
    );
    let report = grade_round(
        &round,
        &config(),
        Arc::new(UnavailableGeocoder),
        &StaticGazetteer::builtin(),
    )
    .unwrap();
    assert_eq!(report.workers[0].address_score, SOFT_FAIL_SCORE);
}

#[test]
fn test_missing_answers_reduce_completeness() {
    let mut round = round(
        "Example Country",
        vec![("a", submission(&WELL_DISTRIBUTED, "Elm Street"))],
    );
    round
        .seeds
        .push(SeedIdentity::new("Anna Lopez", "1985-01-02", "Example Country"));
    let report = grade_round(&round, &config(), geocoder(), &StaticGazetteer::builtin()).unwrap();
    let worker = &report.workers[0];
    assert_eq!(worker.completeness, 0.5);
    assert!(!worker.seeds[1].answered);
}

#[test]
fn test_invalid_spec_is_rejected() {
    let mut round = round("Example Country", vec![]);
    round.spec.variation_count = 0;
    let result = grade_round(&round, &config(), geocoder(), &StaticGazetteer::builtin());
    assert_eq!(
        result.unwrap_err(),
        RoundError::InvalidSpec(SpecError::NonPositiveVariationCount)
    );
}

#[test]
fn test_round_round_trips_through_json() {
    let round = round(
        "Example Country",
        vec![("a", submission(&WELL_DISTRIBUTED, "Elm Street"))],
    );
    let json = serde_json::to_string(&round).unwrap();
    let back: Round = serde_json::from_str(&json).unwrap();
    assert_eq!(back.submissions, round.submissions);
}

#[test]
fn test_hung_geocoder_only_affects_its_worker() {
    let round = round(
        "Example Country",
        vec![
            ("fast", submission(&WELL_DISTRIBUTED, "Elm Street")),
            ("slow", submission(&UNIQUE, "Oak Avenue")),
        ],
    );
    let mut config = config();
    config.geocode.timeout_ms = 200;
    let geocoder = Arc::new(HangsOnStreet {
        street: "Oak Avenue",
        fixture: fixture(),
    });

    let started = Instant::now();
    let report = grade_round(&round, &config, geocoder, &StaticGazetteer::builtin()).unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    let fast = &report.addresses[&WorkerId::new("fast")];
    assert_eq!(fast.decided_by, AddressStage::Geocode);
    assert_eq!(fast.score, 1.0);

    let slow = &report.addresses[&WorkerId::new("slow")];
    assert_eq!(slow.decided_by, AddressStage::Geocode);
    assert_eq!(slow.score, SOFT_FAIL_SCORE);
}

#[test]
fn test_unrepresentable_deadline_means_no_deadline() {
    let round = round(
        "Example Country",
        vec![("a", submission(&WELL_DISTRIBUTED, "Elm Street"))],
    );
    let config = GradingConfig {
        round_deadline_ms: u64::MAX,
        ..config()
    };
    let report = grade_round(&round, &config, geocoder(), &StaticGazetteer::builtin()).unwrap();
    assert_eq!(report.workers[0].address_score, 1.0);
}
