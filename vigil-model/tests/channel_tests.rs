use std::sync::{Arc, Mutex};
use vigil_model::{EventChannel, HandlerFault, Veto};

/// Args type with a veto slot, mirroring the save/delete argument shapes.
struct GuardedArgs {
    payload: i64,
    veto: Veto,
}

fn shared_log() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

// ── Subscription & publish order ──────────────────────────────────

#[test]
fn handlers_run_in_subscription_order() {
    let log = shared_log();
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();

    for name in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        channel.observe(move |_| log.lock().unwrap().push(name));
    }

    let mut args = GuardedArgs { payload: 0, veto: Veto::new() };
    channel.publish(&mut args).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn handlers_share_mutable_args() {
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();
    channel.observe(|args| args.payload += 1);
    channel.observe(|args| args.payload *= 10);

    let mut args = GuardedArgs { payload: 2, veto: Veto::new() };
    channel.publish(&mut args).unwrap();
    assert_eq!(args.payload, 30);
}

#[test]
fn publish_with_no_subscribers_is_ok() {
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();
    assert!(channel.is_empty());
    let mut args = GuardedArgs { payload: 0, veto: Veto::new() };
    channel.publish(&mut args).unwrap();
}

// ── Unsubscribe ───────────────────────────────────────────────────

#[test]
fn unsubscribe_removes_only_that_handler() {
    let log = shared_log();
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();

    let keep_log = Arc::clone(&log);
    channel.observe(move |_| keep_log.lock().unwrap().push("keep"));
    let drop_log = Arc::clone(&log);
    let dropped = channel.observe(move |_| drop_log.lock().unwrap().push("drop"));

    assert!(channel.unsubscribe(dropped));
    assert_eq!(channel.subscriber_count(), 1);

    let mut args = GuardedArgs { payload: 0, veto: Veto::new() };
    channel.publish(&mut args).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["keep"]);
}

#[test]
fn unsubscribe_unknown_id_returns_false() {
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();
    let id = channel.observe(|_| {});
    assert!(channel.unsubscribe(id));
    assert!(!channel.unsubscribe(id));
}

// ── Cancellation does not short-circuit ───────────────────────────

#[test]
fn cancel_lets_later_handlers_run() {
    let log = shared_log();
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();

    let first = Arc::clone(&log);
    channel.observe(move |args: &mut GuardedArgs| {
        first.lock().unwrap().push("canceler");
        args.veto.cancel("not today");
    });
    let second = Arc::clone(&log);
    channel.observe(move |args: &mut GuardedArgs| {
        // Later subscribers see the cancellation but still run.
        assert!(args.veto.is_canceled());
        second.lock().unwrap().push("witness");
    });

    let mut args = GuardedArgs { payload: 0, veto: Veto::new() };
    channel.publish(&mut args).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["canceler", "witness"]);
    assert!(args.veto.is_canceled());
    assert_eq!(args.veto.message(), Some("not today"));
}

// ── Handler faults short-circuit ──────────────────────────────────

#[test]
fn fault_aborts_remaining_handlers() {
    let log = shared_log();
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();

    let first = Arc::clone(&log);
    channel.observe(move |_| first.lock().unwrap().push("ran"));
    channel.subscribe(|_| Err(HandlerFault::new("subscriber broke")));
    let third = Arc::clone(&log);
    channel.observe(move |_| third.lock().unwrap().push("never"));

    let mut args = GuardedArgs { payload: 0, veto: Veto::new() };
    let fault = channel.publish(&mut args).unwrap_err();

    assert_eq!(fault.reason(), "subscriber broke");
    assert_eq!(*log.lock().unwrap(), vec!["ran"]);
}

#[test]
fn channel_recovers_after_fault() {
    let mut channel: EventChannel<GuardedArgs> = EventChannel::new();
    let mut fail_once = true;
    channel.subscribe(move |_| {
        if fail_once {
            fail_once = false;
            Err(HandlerFault::new("transient"))
        } else {
            Ok(())
        }
    });

    let mut args = GuardedArgs { payload: 0, veto: Veto::new() };
    assert!(channel.publish(&mut args).is_err());
    assert!(channel.publish(&mut args).is_ok());
}
