//! Integration tests for the gesture classifier.
//!
//! Each test drives a complete contact (first finger down to last finger up)
//! through the public API.  The property tests sweep deterministic grids of
//! paths and timings instead of sampling randomly, so a failure always names
//! the exact input that broke.

use touchpad_core::{
    GestureClassifier, GestureConfig, PointerIntent, PointerSample, SwipeDirection, TouchAction,
};

fn s(id: u32, x: f32, y: f32, t: u64) -> PointerSample {
    PointerSample::new(id, x, y, t)
}

/// Feeds a whole script and returns every intent in order.
fn run(script: &[(TouchAction, Vec<PointerSample>)]) -> Vec<PointerIntent> {
    let mut classifier = GestureClassifier::default();
    let mut intents = Vec::new();
    for (action, samples) in script {
        intents.extend(classifier.feed(*action, samples));
    }
    assert!(
        classifier.state().is_idle(),
        "every complete contact must end idle"
    );
    intents
}

fn count(intents: &[PointerIntent], pred: impl Fn(&PointerIntent) -> bool) -> usize {
    intents.iter().filter(|i| pred(i)).count()
}

fn is_move(i: &PointerIntent) -> bool {
    matches!(i, PointerIntent::Move { .. })
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_scenario_single_tap_is_one_click() {
    let intents = run(&[
        (TouchAction::Down, vec![s(0, 0.0, 0.0, 0)]),
        (TouchAction::Up, vec![s(0, 0.0, 0.0, 50)]),
    ]);

    assert_eq!(intents, vec![PointerIntent::Click]);
}

#[test]
fn test_scenario_hold_then_second_finger_drags() {
    // Arrange – first finger rests at the origin; second lands 300 ms later
    let script = vec![
        (TouchAction::Down, vec![s(0, 0.0, 0.0, 0)]),
        (
            TouchAction::PointerDown,
            vec![s(0, 0.0, 0.0, 300), s(1, 1.0, 0.0, 300)],
        ),
        (
            TouchAction::Move,
            vec![s(0, 0.0, 0.0, 320), s(1, 1.0, -20.0, 320)],
        ),
        (
            TouchAction::PointerUp,
            vec![s(0, 0.0, 0.0, 340), s(1, 1.0, -20.0, 340)],
        ),
        (TouchAction::Up, vec![s(0, 0.0, 0.0, 350)]),
    ];

    // Act
    let intents = run(&script);

    // Assert
    assert_eq!(
        intents,
        vec![
            PointerIntent::DragStart,
            PointerIntent::Move {
                dx: 0.0,
                dy: -30.0
            },
            PointerIntent::DragEnd,
        ]
    );
}

#[test]
fn test_scenario_two_finger_vertical_scroll_sums_exactly() {
    // Arrange – two fingers 100 px apart move up together by 40 px in 5 px steps
    let mut script = vec![
        (TouchAction::Down, vec![s(0, 100.0, 500.0, 0)]),
        (
            TouchAction::PointerDown,
            vec![s(0, 100.0, 500.0, 10), s(1, 200.0, 500.0, 10)],
        ),
    ];
    for step in 1..=8u64 {
        let y = 500.0 - 5.0 * step as f32;
        script.push((
            TouchAction::Move,
            vec![s(0, 100.0, y, 10 + step * 16), s(1, 200.0, y, 10 + step * 16)],
        ));
    }
    script.push((TouchAction::Up, vec![s(0, 100.0, 460.0, 200)]));

    // Act
    let intents = run(&script);

    // Assert
    let total: f32 = intents
        .iter()
        .map(|i| match i {
            PointerIntent::Scroll { amount } => *amount,
            other => panic!("unexpected intent {other:?}"),
        })
        .sum();
    let expected = 40.0 * GestureConfig::default().scroll_sensitivity;
    assert!((total - expected).abs() < 1e-4, "total {total}, expected {expected}");
}

#[test]
fn test_slow_deliberate_move_then_quick_second_finger_is_not_drag() {
    // The hold check uses the first finger's elapsed time since down; a slow
    // move that leaves the tap window counts as motion and blocks the drag.
    let intents = run(&[
        (TouchAction::Down, vec![s(0, 0.0, 0.0, 0)]),
        (TouchAction::Move, vec![s(0, 20.0, 0.0, 260)]),
        (
            TouchAction::PointerDown,
            vec![s(0, 20.0, 0.0, 300), s(1, 80.0, 0.0, 300)],
        ),
        (
            TouchAction::PointerUp,
            vec![s(0, 20.0, 0.0, 340), s(1, 80.0, 0.0, 340)],
        ),
        (TouchAction::Up, vec![s(0, 20.0, 0.0, 350)]),
    ]);

    assert_eq!(count(&intents, |i| *i == PointerIntent::DragStart), 0);
    assert_eq!(count(&intents, |i| *i == PointerIntent::DragEnd), 0);
    assert_eq!(count(&intents, is_move), 1);
}

#[test]
fn test_cancel_mid_scroll_emits_nothing_further() {
    let mut c = GestureClassifier::default();
    c.feed(TouchAction::Down, &[s(0, 0.0, 100.0, 0)]);
    c.feed(
        TouchAction::PointerDown,
        &[s(0, 0.0, 100.0, 5), s(1, 50.0, 100.0, 5)],
    );
    let scrolled = c.feed(
        TouchAction::Move,
        &[s(0, 0.0, 80.0, 30), s(1, 50.0, 80.0, 30)],
    );

    let cancelled = c.feed(TouchAction::Cancel, &[]);
    let after = c.feed(TouchAction::Up, &[s(0, 0.0, 80.0, 60)]);

    assert_eq!(count(&scrolled, |i| matches!(i, PointerIntent::Scroll { .. })), 1);
    assert!(cancelled.is_empty());
    assert!(after.is_empty());
}

// ── Properties ────────────────────────────────────────────────────────────────

#[test]
fn test_property_short_small_contacts_click_exactly_once() {
    let offsets = [(0.0, 0.0), (5.0, -3.0), (-20.0, 10.0), (0.0, 29.0), (-21.0, -20.0)];
    for &(ox, oy) in &offsets {
        for duration in [1u64, 50, 120, 199] {
            let mid = duration / 2;
            let intents = run(&[
                (TouchAction::Down, vec![s(0, 300.0, 300.0, 0)]),
                (
                    TouchAction::Move,
                    vec![s(0, 300.0 + ox / 2.0, 300.0 + oy / 2.0, mid)],
                ),
                (TouchAction::Move, vec![s(0, 300.0 + ox, 300.0 + oy, mid)]),
                (TouchAction::Up, vec![s(0, 300.0 + ox, 300.0 + oy, duration)]),
            ]);

            assert_eq!(
                intents,
                vec![PointerIntent::Click],
                "offset ({ox}, {oy}) over {duration} ms"
            );
        }
    }
}

#[test]
fn test_property_large_single_contacts_move_and_never_click() {
    let offsets = [(30.0, 0.0), (0.0, -30.0), (25.0, 25.0), (-200.0, 40.0), (3.0, 90.0)];
    for &(ox, oy) in &offsets {
        for duration in [40u64, 150, 400] {
            let intents = run(&[
                (TouchAction::Down, vec![s(0, 500.0, 500.0, 0)]),
                (TouchAction::Move, vec![s(0, 500.0 + ox, 500.0 + oy, duration / 2)]),
                (TouchAction::Up, vec![s(0, 500.0 + ox, 500.0 + oy, duration)]),
            ]);

            assert!(
                count(&intents, is_move) >= 1,
                "offset ({ox}, {oy}) over {duration} ms must move"
            );
            assert_eq!(
                count(&intents, |i| *i == PointerIntent::Click),
                0,
                "offset ({ox}, {oy}) over {duration} ms must not click"
            );
        }
    }
}

#[test]
fn test_property_early_span_change_stays_pinch_for_whole_gesture() {
    for spread in [31.0f32, 45.0, 120.0, -35.0, -60.0] {
        for drift in [2.0f32, 15.0, -40.0] {
            // Arrange – fingers spread horizontally with no vertical drift,
            // then drift vertically together.
            let half = spread / 2.0;
            let script = vec![
                (TouchAction::Down, vec![s(0, 300.0, 400.0, 0)]),
                (
                    TouchAction::PointerDown,
                    vec![s(0, 300.0, 400.0, 10), s(1, 500.0, 400.0, 10)],
                ),
                (
                    TouchAction::Move,
                    vec![s(0, 300.0 - half, 400.0, 30), s(1, 500.0 + half, 400.0, 30)],
                ),
                (
                    TouchAction::Move,
                    vec![
                        s(0, 300.0 - half, 400.0 + drift, 50),
                        s(1, 500.0 + half, 400.0 + drift, 50),
                    ],
                ),
                (
                    TouchAction::Move,
                    vec![
                        s(0, 300.0 - half, 400.0 + 2.0 * drift, 70),
                        s(1, 500.0 + half, 400.0 + 2.0 * drift, 70),
                    ],
                ),
                (TouchAction::Up, vec![s(0, 300.0 - half, 400.0, 90)]),
            ];

            // Act
            let intents = run(&script);

            // Assert
            assert_eq!(
                count(&intents, |i| matches!(i, PointerIntent::Scroll { .. })),
                0,
                "spread {spread}, drift {drift}"
            );
            assert_eq!(
                count(&intents, |i| matches!(i, PointerIntent::PinchZoom { .. })),
                1,
                "spread {spread}, drift {drift}"
            );
            assert_eq!(count(&intents, |i| *i == PointerIntent::RightClick), 0);
        }
    }
}

#[test]
fn test_property_three_or_more_fingers_emit_at_most_one_swipe() {
    let displacements = [
        (150.0f32, 20.0f32, Some(SwipeDirection::Right)),
        (-150.0, 149.0, Some(SwipeDirection::Left)),
        (30.0, -101.0, Some(SwipeDirection::Up)),
        (-99.0, 130.0, Some(SwipeDirection::Down)),
        (60.0, -60.0, None),
        (0.0, 0.0, None),
    ];
    for fingers in [3u32, 4, 5] {
        for &(dx, dy, expected) in &displacements {
            // Arrange
            let at = |t: u64, ox: f32, oy: f32| -> Vec<PointerSample> {
                (0..fingers)
                    .map(|id| s(id, 100.0 + 40.0 * id as f32 + ox, 600.0 + oy, t))
                    .collect()
            };
            let mut script = vec![(TouchAction::Down, at(0, 0.0, 0.0)[..1].to_vec())];
            for n in 2..=fingers as usize {
                script.push((TouchAction::PointerDown, at(5, 0.0, 0.0)[..n].to_vec()));
            }
            script.push((TouchAction::Move, at(40, dx / 2.0, dy / 2.0)));
            script.push((TouchAction::Move, at(80, dx, dy)));
            for n in (2..=fingers as usize).rev() {
                script.push((TouchAction::PointerUp, at(120, dx, dy)[..n].to_vec()));
            }
            script.push((TouchAction::Up, at(130, dx, dy)[..1].to_vec()));

            // Act
            let intents = run(&script);

            // Assert
            let swipes: Vec<_> = intents
                .iter()
                .filter_map(|i| match i {
                    PointerIntent::Swipe(d) => Some(*d),
                    _ => None,
                })
                .collect();
            assert_eq!(
                swipes,
                expected.into_iter().collect::<Vec<_>>(),
                "{fingers} fingers moved ({dx}, {dy})"
            );
            assert_eq!(
                swipes.len(),
                intents.len(),
                "{fingers} fingers must emit nothing but a swipe"
            );
        }
    }
}
