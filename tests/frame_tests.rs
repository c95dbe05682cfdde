//! Frame Pipeline Tests
//!
//! Tests for the preanim/anim/egress triple buffer rotation and its
//! resize operations.

use freyr::{Frame, Led};

#[test]
fn leds_added_grows_preanim_with_black() {
    let mut frame = Frame::new();
    frame.leds_added(4);
    assert_eq!(frame.len(), 4);
    assert!(frame.preanim.iter().all(|&p| p == Led::BLACK));
    // the other buffers follow at the next copies
    assert!(frame.anim.is_empty());
    frame.flush_anim();
    assert_eq!(frame.anim.len(), 4);
}

#[test]
fn leds_removed_splices_and_clamps() {
    let mut frame = Frame::new();
    frame.leds_added(10);
    for (i, p) in frame.preanim.iter_mut().enumerate() {
        p.r = i as f32;
    }
    frame.leds_removed(4, 3);
    assert_eq!(frame.len(), 7);
    let reds: Vec<f32> = frame.preanim.iter().map(|p| p.r).collect();
    assert_eq!(reds, vec![0.0, 1.0, 2.0, 3.0, 7.0, 8.0, 9.0]);

    // beyond-range removal is a no-op, partial overlap clamps
    frame.leds_removed(100, 5);
    assert_eq!(frame.len(), 7);
    frame.leds_removed(5, 100);
    assert_eq!(frame.len(), 5);
}

#[test]
fn flush_egress_publishes_and_restores_preanim() {
    let mut frame = Frame::new();
    frame.leds_added(3);
    frame.flush_anim();
    frame.anim[1] = Led::new(0.5, 0.25, 1.0);

    frame.flush_egress();
    assert_eq!(frame.egress, frame.anim);
    assert_eq!(frame.preanim, frame.anim);

    // animations observe the blended output as next frame's input
    frame.flush_anim();
    assert_eq!(frame.anim[1], Led::new(0.5, 0.25, 1.0));
}

#[test]
fn flush_order_preserves_stable_snapshots() {
    let mut frame = Frame::new();
    frame.leds_added(2);
    frame.flush_anim();

    // render writes into anim only
    frame.anim[0] = Led::new(1.0, 0.0, 0.0);
    assert_eq!(frame.preanim[0], Led::BLACK);

    frame.flush_egress();
    frame.anim[0] = Led::new(0.0, 1.0, 0.0);
    // egress holds the published frame, untouched by later renders
    assert_eq!(frame.egress[0], Led::new(1.0, 0.0, 0.0));
}
