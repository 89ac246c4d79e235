//! Property tests over the gesture state machine and coordinate mapper.
//!
//! Event sequences are generated with `proptest`, which shrinks a failing
//! sequence down to a minimal one before reporting it.

use mirror_core::{
    CoordinateMapper, DisplayGeometry, GestureSession, GestureState, InputEvent, Point,
    PointerCommand,
};
use proptest::collection::vec;
use proptest::prelude::*;

/// Viewer points, including some off the canvas.
fn viewer_point() -> impl Strategy<Value = Point> {
    (-100i32..1100, -100i32..700).prop_map(|(x, y)| Point::new(x, y))
}

fn input_event() -> impl Strategy<Value = InputEvent> {
    prop_oneof![
        viewer_point().prop_map(InputEvent::Down),
        viewer_point().prop_map(InputEvent::Move),
        Just(InputEvent::Up),
        viewer_point().prop_map(InputEvent::Click),
    ]
}

fn malformed_message() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "bogus",
        "down:abc,3",
        "jump:1,2",
        "move:1",
        "click:1,2,3",
        "up:a,b",
        "",
    ])
}

fn mapper(dw: u32, dh: u32, width: u32) -> CoordinateMapper {
    let mut m = CoordinateMapper::new();
    m.establish(DisplayGeometry::new(dw, dh), width)
        .expect("geometry must be valid");
    m
}

/// Applies `events` from `Idle`, returning the final session.
fn replay(events: &[InputEvent], m: &CoordinateMapper) -> GestureSession {
    events.iter().fold(GestureSession::new(), |session, event| {
        session.apply(*event, m).expect("valid events must apply").0
    })
}

proptest! {
    #[test]
    fn test_drag_only_between_down_and_up(events in vec(input_event(), 0..100)) {
        let m = mapper(1440, 900, 960);
        let mut session = GestureSession::new();
        // What the actuator has seen: a press not yet released.
        let mut pressed = false;

        for (step, event) in events.into_iter().enumerate() {
            let (next, cmd) = session.apply(event, &m).expect("valid events must apply");

            match cmd {
                Some(PointerCommand::Down(_)) => pressed = true,
                Some(PointerCommand::Drag(_)) => {
                    prop_assert!(pressed, "step {}: drag emitted without an open press", step);
                }
                Some(PointerCommand::Up) => {
                    prop_assert!(pressed, "step {}: up without press", step);
                    pressed = false;
                }
                // A click is a self-contained press+release; it also closes
                // any stroke that was open.
                Some(PointerCommand::Click(_)) => pressed = false,
                None => {}
            }

            prop_assert_eq!(
                pressed,
                next.is_active(),
                "step {}: press state diverged from gesture state",
                step
            );
            session = next;
        }
    }

    #[test]
    fn test_click_always_returns_to_idle(prefix in vec(input_event(), 0..20)) {
        let m = mapper(1920, 1080, 960);
        let session = replay(&prefix, &m);

        let (next, cmd) = session
            .apply(InputEvent::Click(Point::new(200, 200)), &m)
            .expect("click must apply");

        prop_assert_eq!(cmd, Some(PointerCommand::Click(Point::new(400, 400))));
        prop_assert_eq!(next.state(), GestureState::Idle);
    }

    #[test]
    fn test_malformed_messages_do_not_disturb_the_stroke(
        prefix in vec(input_event(), 0..10),
        garbage in vec(malformed_message(), 1..6),
        follow_up in input_event(),
    ) {
        let m = mapper(960, 600, 960);
        let session = replay(&prefix, &m);
        let expected = session.apply(follow_up, &m).expect("valid events must apply");

        // Rejected messages leave the caller's session as it was.
        for text in garbage {
            prop_assert!(
                session.apply_message(text, &m).is_err(),
                "{:?} must be rejected",
                text
            );
        }

        let replayed = session.apply(follow_up, &m).expect("valid events must apply");
        prop_assert_eq!(replayed, expected);
    }
}

#[test]
fn test_scenario_stroke_at_scale_one() {
    let m = mapper(960, 600, 960);
    let mut session = GestureSession::new();
    let mut emitted = Vec::new();

    for text in ["down:100,100", "move:150,100", "up:0,0"] {
        let (next, cmd) = session.apply_message(text, &m).unwrap();
        emitted.extend(cmd);
        session = next;
    }

    assert_eq!(
        emitted,
        vec![
            PointerCommand::Down(Point::new(100, 100)),
            PointerCommand::Drag(Point::new(150, 100)),
            PointerCommand::Up,
        ]
    );
    assert_eq!(session.state(), GestureState::Idle);
}

#[test]
fn test_viewer_round_trip_within_one_pixel_when_downscaling() {
    let displays = [(1440, 900), (1920, 1080), (2560, 1600), (1366, 768), (3840, 2160)];
    let widths = [320, 640, 960, 1280];

    for (dw, dh) in displays {
        for width in widths.into_iter().filter(|w| *w <= dw) {
            let m = mapper(dw, dh, width);
            let stream = m.stream_geometry().unwrap();
            for x in (0..stream.width as i32).step_by(7) {
                for y in (0..stream.height as i32).step_by(11) {
                    let viewer = Point::new(x, y);
                    let back = m.to_viewer(m.to_display(viewer).unwrap()).unwrap();
                    assert!(
                        (back.x - x).abs() <= 1 && (back.y - y).abs() <= 1,
                        "{dw}x{dh}@{width}: {viewer:?} came back as {back:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_display_round_trip_within_one_pixel() {
    let cases = [(1440, 900, 960), (1920, 1080, 960), (800, 600, 960), (1280, 800, 640)];

    for (dw, dh, width) in cases {
        let m = mapper(dw, dh, width);
        for x in (0..dw as i32).step_by(13) {
            for y in (0..dh as i32).step_by(17) {
                let display = Point::new(x, y);
                let back = m.to_display(m.to_viewer(display).unwrap()).unwrap();
                assert!(
                    (back.x - x).abs() <= 1 && (back.y - y).abs() <= 1,
                    "{dw}x{dh}@{width}: {display:?} came back as {back:?}"
                );
            }
        }
    }
}
