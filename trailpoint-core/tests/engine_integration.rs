//! End-to-end engine behavior over scripted collaborators: scheduling,
//! payload composition, retry, outcome handling, and the sleep hooks.

mod common;

use std::sync::{Arc, Mutex};

use serde_json::json;

use common::Harness;
use trailpoint_core::{
    FixKind, LocationConfig, LocationConfigUpdate, LocationPoint, PublishStatus, TrackerError,
    TriggerKind,
};

fn tracking_config() -> LocationConfig {
    LocationConfig {
        interval_min_seconds: 10,
        interval_max_seconds: 60,
        ..Default::default()
    }
}

#[test]
fn boot_publish_goes_out_with_lock() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();

    h.step(0);

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with(r#"{"cmd":"loc","loc":{"lck":1"#));
    assert!(sent[0].contains(r#""lat":37.42341234"#));

    // GNSS came up via config reconciliation and the fix became the way point
    let provider = h.provider.lock().unwrap();
    assert_eq!(provider.starts, 1);
    assert_eq!(provider.way_point, Some((37.42341234, -122.08123456)));
}

#[test]
fn timer_publish_carries_time_trigger() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.step(59);
    assert_eq!(h.sent_count(), 1);

    h.step(1);
    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains(r#""trig":["time"]"#));
}

#[test]
fn trigger_publish_held_until_min_interval() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.engine.handle().trigger(TriggerKind::Normal, "radius");
    h.step(5);
    assert_eq!(h.sent_count(), 1);

    h.step(5);
    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains(r#""trig":["radius"]"#));
}

#[test]
fn busy_transport_parks_payload_and_retries_verbatim() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.transport.lock().unwrap().busy = true;
    h.engine.handle().trigger(TriggerKind::Normal, "radius");
    h.step(10);
    assert_eq!(h.sent_count(), 1);

    h.transport.lock().unwrap().busy = false;
    h.step(1);
    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    // The parked payload went out unchanged, triggers included
    assert!(sent[1].contains(r#""trig":["radius"]"#));
}

#[test]
fn failure_outcome_resends_the_same_payload() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.engine.outcome_sender().send(PublishStatus::Failure).unwrap();
    h.step(1);

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[test]
fn publish_callbacks_fire_exactly_once() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    h.engine
        .handle()
        .register_publish_callback(Box::new(move |status| {
            sink.lock().unwrap().push(status);
        }));

    h.step(0);
    h.engine.outcome_sender().send(PublishStatus::Success).unwrap();
    h.step(1);
    assert_eq!(&*statuses.lock().unwrap(), &[PublishStatus::Success]);

    // A second outcome finds no callbacks left to drain
    h.engine.outcome_sender().send(PublishStatus::Success).unwrap();
    h.step(1);
    assert_eq!(statuses.lock().unwrap().len(), 1);
}

#[test]
fn stale_parked_payload_is_dropped_with_timeout() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    h.engine
        .handle()
        .register_publish_callback(Box::new(move |status| {
            sink.lock().unwrap().push(status);
        }));

    // Boot publish parks because the transport stays busy
    h.transport.lock().unwrap().busy = true;
    h.step(0);
    assert_eq!(h.sent_count(), 0);

    // By the next due publish the parked payload is a cycle old
    h.step(60);
    assert_eq!(&*statuses.lock().unwrap(), &[PublishStatus::Timeout]);
    assert_eq!(h.sent_count(), 0);
}

#[test]
fn get_loc_command_publishes_immediately() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.engine
        .handle_cloud_command(&json!({"cmd": "get_loc"}))
        .unwrap();
    // One second later is well inside the min interval; immediate overrides it
    h.step(1);

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains(r#""trig":["imm"]"#));
}

#[test]
fn enhanced_location_fans_out_to_callbacks() {
    let mut h = Harness::new(tracking_config());

    let received: Arc<Mutex<Vec<LocationPoint>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    h.engine
        .register_enhanced_callback(Box::new(move |point| {
            sink.lock().unwrap().push(*point);
        }));

    h.engine
        .handle_cloud_command(&json!({
            "loc-enhanced": {"lat": 37.0, "lon": -122.0, "h_acc": 200.0, "src": ["cell"]}
        }))
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].kind, FixKind::Cloud);
    assert!((received[0].latitude - 37.0).abs() < 1e-9);
}

#[test]
fn unknown_command_is_rejected() {
    let mut h = Harness::new(tracking_config());
    assert_eq!(
        h.engine.handle_cloud_command(&json!({"cmd": "reboot"})),
        Err(TrackerError::NotSupported {
            what: "cloud command"
        })
    );
}

#[test]
fn unlocked_fix_waits_then_publishes_without_position() {
    let mut h = Harness::new(tracking_config());
    h.provider.lock().unwrap().fix = Some(LocationPoint::default());

    // Inside the connect window the boot publish holds for a lock
    h.step(0);
    assert_eq!(h.sent_count(), 0);

    // The window (90s) expires and the publish goes out unlocked
    h.step(90);
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains(r#""lck":0"#));
    assert!(!sent[0].contains(r#""lat""#));
}

#[test]
fn disconnected_publish_defers_until_reconnect() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.transport.lock().unwrap().connected = false;
    h.step(60);
    assert_eq!(h.sent_count(), 1);

    h.transport.lock().unwrap().connected = true;
    h.step(1);
    assert_eq!(h.sent_count(), 2);
}

#[test]
fn geofence_exit_raises_radius_trigger() {
    let mut config = tracking_config();
    config.radius = 100.0;
    config.interval_min_seconds = 0;

    let mut h = Harness::new(config);
    h.give_stable_fix();
    h.step(0);

    h.provider.lock().unwrap().outside = true;
    h.step(1);

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains(r#""trig":["radius"]"#));
    // The radius threshold reached the provider through reconciliation
    assert_eq!(h.provider.lock().unwrap().radius, 100.0);
}

#[test]
fn enrichment_lands_in_the_payload() {
    let mut config = tracking_config();
    config.tower = true;
    config.wps = true;
    config.enhance_loc = true;
    config.loc_cb = true;

    let mut h = Harness::new(config);
    h.give_stable_fix();
    {
        let mut script = h.cellular.lock().unwrap();
        script.serving_lines.push(
            " +QENG: \"servingcell\",\"NOCONN\",\"LTE\",\"FDD\",310,260,1A2B3C,158,5110,12,5,5,5A,-75"
                .to_string(),
        );
        script.neighbor_lines.push(
            " +QENG: \"neighbourcell intra\",\"LTE\",5110,218,-12,-80,-55".to_string(),
        );
    }
    h.wifi.lock().unwrap().aps.push(trailpoint_core::radio::WifiAccessPoint {
        bssid: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
        channel: 6,
        rssi: -48,
    });

    h.step(0);

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains(r#""loc_cb":true"#));
    assert!(sent[0].contains(r#""towers":[{"rat":"lte","mcc":310"#));
    assert!(sent[0].contains(r#""nid":218"#));
    assert!(sent[0].contains(r#""wps":[{"bssid":"aa:bb:cc:dd:ee:ff","ch":6,"str":-48}]"#));
    assert_eq!(h.wifi.lock().unwrap().scans, 1);
}

#[test]
fn gnss_disabled_publishes_unlocked_without_powering_up() {
    let mut config = tracking_config();
    config.gnss = false;

    let mut h = Harness::new(config);
    h.step(0);

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains(r#""lck":0"#));
    assert_eq!(h.provider.lock().unwrap().starts, 0);
}

#[test]
fn ack_mode_suppresses_repeat_bootstrap_publishes() {
    let mut config = tracking_config();
    config.process_ack = true;

    let mut h = Harness::new(config);
    h.give_stable_fix();
    h.step(0);
    assert_eq!(h.sent_count(), 1);
    assert!(h.transport.lock().unwrap().sent[0].1, "full ack requested");

    // Unacknowledged: no bootstrap flood on subsequent ticks
    h.step(1);
    h.step(1);
    assert_eq!(h.sent_count(), 1);

    // The ack lands; the next publish is the ordinary timer one
    h.engine.outcome_sender().send(PublishStatus::Success).unwrap();
    h.step(58);
    assert_eq!(h.sent_count(), 2);
}

#[test]
fn first_tick_powers_wifi_for_scanning() {
    let mut config = tracking_config();
    config.enhance_loc = true;
    config.wps = true;

    let mut h = Harness::new(config);
    h.give_stable_fix();
    h.step(0);

    assert!(h.wifi.lock().unwrap().on);
}

#[test]
fn disabling_wps_powers_wifi_off() {
    let mut config = tracking_config();
    config.enhance_loc = true;
    config.wps = true;

    let mut h = Harness::new(config);
    h.give_stable_fix();
    h.step(0);
    assert!(h.wifi.lock().unwrap().on);

    h.engine
        .commit_config(&LocationConfigUpdate {
            wps: Some(false),
            ..Default::default()
        })
        .unwrap();
    h.step(1);

    assert!(!h.wifi.lock().unwrap().on);
}

#[test]
fn payload_overflow_delivers_failure() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    h.engine
        .handle()
        .register_publish_callback(Box::new(move |status| {
            sink.lock().unwrap().push(status);
        }));

    // A generator writing far more than the publish buffer can hold
    h.engine.register_location_callback(Box::new(|writer, _| {
        for i in 0..200u64 {
            let _ = writer.name("pad");
            let _ = writer.value_u64(i);
        }
    }));

    assert!(h.engine.tick().is_err());
    assert_eq!(&*statuses.lock().unwrap(), &[PublishStatus::Failure]);
    assert_eq!(h.sent_count(), 0);
}

#[test]
fn config_commit_rejection_keeps_prior_config() {
    let mut h = Harness::new(tracking_config());

    let update = LocationConfigUpdate {
        interval_min_seconds: Some(120),
        interval_max_seconds: Some(60),
        ..Default::default()
    };
    assert_eq!(
        h.engine.commit_config(&update),
        Err(TrackerError::IntervalOrder { min: 120, max: 60 })
    );
    assert_eq!(h.engine.config().interval_min_seconds, 10);
}

#[test]
fn sleep_prepare_schedules_an_early_wake() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.engine.on_sleep_prepare();

    // Woke at 100s (minus 3s overhead), locked at 100s: wake-to-lock 3s,
    // variance 0, margin 4s ahead of the 60s deadline
    assert_eq!(h.sleep.lock().unwrap().wake_at, Some(100 + 60 - 4));
}

#[test]
fn wake_far_from_deadline_votes_early_shutdown() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    h.clock.advance(1000);
    h.engine.on_wake();

    let sleep = h.sleep.lock().unwrap();
    assert_eq!(sleep.forced_full_wake, 0);
    assert_eq!(sleep.extensions, vec![(2, true)]);
}

#[test]
fn resumed_wake_honors_carried_early_margin() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);

    // Pause/resume cycle with no prior margin: the planner seeds the
    // carried margin from the 90s connection budget
    h.sleep.lock().unwrap().full_wake = false;
    h.engine.on_sleep_prepare();
    assert_eq!(h.sleep.lock().unwrap().wake_at, Some(100 + 60 - 90));

    // At wake the evaluator must see that same margin: 30s into the 60s
    // interval is already inside the widened network window
    h.clock.advance(30_000);
    h.engine.on_wake();

    let sleep = h.sleep.lock().unwrap();
    assert_eq!(sleep.forced_full_wake, 1);
    assert!(sleep.extensions.is_empty());
}

#[test]
fn wake_near_deadline_powers_the_network() {
    let mut h = Harness::new(tracking_config());
    h.give_stable_fix();
    h.step(0);
    h.sleep.lock().unwrap().full_wake = false;
    let starts_before = h.provider.lock().unwrap().starts;

    h.clock.advance(60_000);
    h.engine.on_wake();

    let sleep = h.sleep.lock().unwrap();
    assert_eq!(sleep.forced_full_wake, 1);
    assert!(sleep.extensions.is_empty());
    assert_eq!(h.provider.lock().unwrap().starts, starts_before + 1);
}
