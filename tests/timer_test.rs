mod common;

use std::time::{Duration, Instant};

use common::Latch;

#[test]
fn test_set_timeout_fires() {
    let engine = common::new_engine();
    let latch = Latch::listen(&engine, "fired");

    let start = Instant::now();
    engine
        .evaluate(
            "setTimeout(function (value) { _triggerEvent('fired', value); }, 20, 'payload')",
            None,
        )
        .unwrap();

    assert_eq!(latch.wait(), vec!["payload"]);
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert_eq!(engine.parked_value_groups(), 0);
}

#[test]
fn test_timers_fire_in_delay_order() {
    let engine = common::new_engine();
    let latch = Latch::listen(&engine, "fired");

    engine
        .evaluate(
            r#"
            setTimeout(function () { _triggerEvent('fired', 'slow'); }, 200);
            setTimeout(function () { _triggerEvent('fired', 'fast'); }, 10);
            "#,
            None,
        )
        .unwrap();

    assert_eq!(latch.wait(), vec!["fast"]);
    assert_eq!(latch.wait(), vec!["slow"]);
}

#[test]
fn test_nested_timeout() {
    let engine = common::new_engine();
    let latch = Latch::listen(&engine, "fired");

    engine
        .evaluate(
            r#"
            var ticks = 0;
            function tick() {
                ticks++;
                if (ticks < 3) {
                    setTimeout(tick, 1);
                } else {
                    _triggerEvent('fired', ticks);
                }
            }
            setTimeout(tick, 0);
            "#,
            None,
        )
        .unwrap();

    assert_eq!(latch.wait(), vec!["3"]);
}

#[test]
fn test_timeout_with_host_callback() {
    let engine = common::new_engine();
    let latch = Latch::listen(&engine, "fired");

    let callback = engine
        .evaluate("(function (a, b) { _triggerEvent('fired', a + b); })", None)
        .unwrap();
    let args = [engine.new_value(40).unwrap(), engine.new_value(2).unwrap()];

    engine
        .schedule_delayed(Duration::from_millis(5), &callback, &args)
        .unwrap();

    assert_eq!(latch.wait(), vec!["42"]);
}

#[test]
fn test_schedule_non_function() {
    let engine = common::new_engine();
    let not_a_function = engine.new_object();

    let err = engine
        .schedule_delayed(Duration::ZERO, &not_a_function, &[])
        .unwrap_err();

    assert!(matches!(err, jsengine_v8::Error::Type(_)));
    assert_eq!(engine.parked_value_groups(), 0);
}
