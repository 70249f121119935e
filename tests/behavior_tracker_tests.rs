//! BehaviorTracker profile accumulation, decay and lifecycle
//!
//! Run with: `cargo test --test behavior_tracker_tests`

use std::sync::Arc;

use recipe_engine::chrono::Duration;
use recipe_engine::clock::{Clock, ManualClock};
use recipe_engine::personalization::{
    BehaviorAction, BehaviorEvent, BehaviorTracker, Difficulty, Mood, Rating, RecipeAttributes,
    TrackerConfig,
};

fn tracker(config: TrackerConfig) -> (BehaviorTracker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_epoch());
    (BehaviorTracker::new(config, clock.clone()), clock)
}

fn italian() -> RecipeAttributes {
    RecipeAttributes::new("lasagna", "italian")
        .with_ingredients(["tomatoes", "mozzarella"])
        .with_difficulty(Difficulty::Medium)
}

fn event(clock: &ManualClock, user: &str, action: BehaviorAction) -> BehaviorEvent {
    BehaviorEvent::new(user, action, italian(), clock.now())
}

#[test]
fn favorited_outweighs_viewed() {
    let (viewed, clock_a) = tracker(TrackerConfig::default());
    let (favorited, clock_b) = tracker(TrackerConfig::default());

    viewed.record(&event(&clock_a, "u", BehaviorAction::Viewed)).unwrap();
    favorited
        .record(&event(&clock_b, "u", BehaviorAction::Favorited))
        .unwrap();

    let v = viewed.get_profile("u").cuisine_affinity.get("italian");
    let f = favorited.get_profile("u").cuisine_affinity.get("italian");
    assert!(v > 0.0);
    assert!(f > v, "favorited {f} should exceed viewed {v}");
}

#[test]
fn rating_scales_with_stars() {
    let (tracker, clock) = tracker(TrackerConfig::default());
    let low = BehaviorAction::Rated {
        rating: Rating::new(1).unwrap(),
    };
    let high = BehaviorAction::Rated {
        rating: Rating::new(5).unwrap(),
    };
    tracker.record(&event(&clock, "low", low)).unwrap();
    tracker.record(&event(&clock, "high", high)).unwrap();

    let low = tracker.get_profile("low").cuisine_affinity.get("italian");
    let high = tracker.get_profile("high").cuisine_affinity.get("italian");
    assert!(high > low);
}

#[test]
fn affinities_halve_after_one_half_life() {
    let config = TrackerConfig {
        half_life_hours: 24.0,
        ..TrackerConfig::default()
    };
    let (tracker, clock) = tracker(config);
    tracker.record(&event(&clock, "u", BehaviorAction::Viewed)).unwrap();
    let before = tracker.get_profile("u").cuisine_affinity.get("italian");

    clock.advance(Duration::hours(24));
    let after = tracker.get_profile("u").cuisine_affinity.get("italian");

    assert!((after - before / 2.0).abs() < 1e-9, "{before} -> {after}");
}

#[test]
fn strong_signals_decay_slower() {
    let config = TrackerConfig {
        half_life_hours: 24.0,
        ..TrackerConfig::default()
    };
    let (tracker, clock) = tracker(config);
    tracker.record(&event(&clock, "weak", BehaviorAction::Viewed)).unwrap();
    tracker.record(&event(&clock, "strong", BehaviorAction::Saved)).unwrap();

    let weak_0 = tracker.get_profile("weak").cuisine_affinity.get("italian");
    let strong_0 = tracker.get_profile("strong").cuisine_affinity.get("italian");
    clock.advance(Duration::hours(72));
    let weak_ratio = tracker.get_profile("weak").cuisine_affinity.get("italian") / weak_0;
    let strong_ratio = tracker.get_profile("strong").cuisine_affinity.get("italian") / strong_0;

    assert!(strong_ratio > weak_ratio);
    assert!(tracker.get_profile("strong").cuisine_affinity.is_potentiated("italian"));
}

#[test]
fn profile_tracks_moods_and_recent_events() {
    let config = TrackerConfig {
        recent_event_window: 2,
        ..TrackerConfig::default()
    };
    let (tracker, clock) = tracker(config);
    for (i, mood) in [Mood::Comfort, Mood::Comfort, Mood::Quick].into_iter().enumerate() {
        clock.advance(Duration::minutes(i as i64 + 1));
        tracker
            .record(&event(&clock, "u", BehaviorAction::Viewed).with_mood(Some(mood)))
            .unwrap();
    }

    let profile = tracker.get_profile("u");
    assert_eq!(profile.event_count, 3);
    assert_eq!(profile.recent_events.len(), 2);
    assert_eq!(profile.recent_moods.first(), Some(&Mood::Quick));
    assert_eq!(profile.dominant_mood(), Some(Mood::Comfort));
}

#[test]
fn unknown_user_gets_empty_profile() {
    let (tracker, _clock) = tracker(TrackerConfig::default());
    let profile = tracker.get_profile("nobody");
    assert!(profile.is_empty());
    assert_eq!(profile.event_count, 0);
    assert!(profile.last_updated.is_none());
    assert_eq!(tracker.active_profiles(), 0);
}

#[test]
fn idle_profiles_read_back_empty() {
    let config = TrackerConfig {
        idle_horizon: Duration::hours(48),
        ..TrackerConfig::default()
    };
    let (tracker, clock) = tracker(config);
    tracker.record(&event(&clock, "u", BehaviorAction::Favorited)).unwrap();

    clock.advance(Duration::hours(49));
    assert!(tracker.get_profile("u").is_empty());
    assert_eq!(tracker.active_profiles(), 0);
}

#[test]
fn sweep_removes_only_idle_profiles() {
    let config = TrackerConfig {
        idle_horizon: Duration::hours(10),
        ..TrackerConfig::default()
    };
    let (tracker, clock) = tracker(config);
    tracker.record(&event(&clock, "old", BehaviorAction::Viewed)).unwrap();
    clock.advance(Duration::hours(8));
    tracker.record(&event(&clock, "fresh", BehaviorAction::Viewed)).unwrap();
    clock.advance(Duration::hours(3));

    assert_eq!(tracker.sweep_idle(), 1);
    assert_eq!(tracker.active_profiles(), 1);
    assert!(!tracker.get_profile("fresh").is_empty());
}

#[test]
fn max_profiles_evicts_least_recently_updated() {
    let config = TrackerConfig {
        max_profiles: 2,
        ..TrackerConfig::default()
    };
    let (tracker, clock) = tracker(config);
    for user in ["a", "b", "c"] {
        tracker.record(&event(&clock, user, BehaviorAction::Viewed)).unwrap();
        clock.advance(Duration::minutes(1));
    }

    assert_eq!(tracker.active_profiles(), 2);
    assert!(tracker.get_profile("a").is_empty());
    assert!(!tracker.get_profile("c").is_empty());
}

#[test]
fn blank_ids_are_rejected_without_side_effects() {
    let (tracker, clock) = tracker(TrackerConfig::default());
    let bad = BehaviorEvent::new(
        "  ",
        BehaviorAction::Viewed,
        RecipeAttributes::new("r1", "thai"),
        clock.now(),
    );
    let err = tracker.record(&bad).unwrap_err();
    assert_eq!(err.code(), "INVALID_EVENT");
    assert_eq!(tracker.active_profiles(), 0);
}
