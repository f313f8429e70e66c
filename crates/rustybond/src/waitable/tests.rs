//! Unit tests for waitables

use super::*;
use crate::error::SmpError;
use crate::event::EventSource;
use crate::gap::{AddressType, PeerAddress};
use crate::scan::ScanReport;
use crate::smp::TimeoutSource;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_wait_returns_notified_value() {
    let (waitable, notifier) = Waitable::channel("test");
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        notifier.notify(42u32)
    });

    assert_eq!(waitable.wait(Some(Duration::from_secs(5)), true).unwrap(), Some(42));
    assert!(sender.join().unwrap());
}

#[test]
fn test_wait_timeout_returns_none_or_error() {
    let (waitable, _notifier) = Waitable::<u32>::channel("never");
    let start = Instant::now();
    assert_eq!(waitable.wait(Some(Duration::from_millis(50)), false).unwrap(), None);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2));

    let (waitable, _notifier) = Waitable::<u32>::channel("never");
    assert!(matches!(
        waitable.wait(Some(Duration::from_millis(10)), true),
        Err(SmpError::Timeout(_))
    ));
}

#[test]
fn test_late_notification_after_timeout_is_dropped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (waitable, notifier) = Waitable::<u32>::channel("late");
    let c = Arc::clone(&calls);
    let waitable = waitable.then(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(waitable.wait(Some(Duration::from_millis(10)), false).unwrap(), None);
    assert!(!notifier.notify(1));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_only_first_notification_counts() {
    let (waitable, notifier) = Waitable::channel("first");
    assert!(notifier.notify(1u32));
    assert!(!notifier.notify(2u32));
    assert_eq!(waitable.wait(None, true).unwrap(), Some(1));
}

#[test]
fn test_then_runs_on_notify_and_when_already_fired() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (waitable, notifier) = Waitable::channel("then");
    let s = Arc::clone(&seen);
    let waitable = waitable.then(move |v: u32| s.lock().push(v));
    notifier.notify(7);
    assert!(!waitable.is_pending());

    let s = Arc::clone(&seen);
    Waitable::completed(9u32).then(move |v| s.lock().push(v));

    assert_eq!(*seen.lock(), vec![7, 9]);
}

#[test]
fn test_completed_waitable_resolves_immediately() {
    let waitable = Waitable::completed("done");
    assert_eq!(waitable.wait(Some(Duration::ZERO), true).unwrap(), Some("done"));
}

#[test]
fn test_generic_waitable() {
    let waitable = GenericWaitable::new("generic");
    let notifier = waitable.notifier();
    thread::spawn(move || notifier.notify(String::from("hello")));
    assert_eq!(
        waitable.wait(Some(Duration::from_secs(5)), true).unwrap().as_deref(),
        Some("hello")
    );
}

#[test]
fn test_generic_waitable_into_waitable() {
    let generic = GenericWaitable::new("converted");
    let notifier = generic.notifier();
    let waitable = generic.into_waitable();
    assert!(waitable.is_pending());

    assert!(notifier.notify(5u8));
    assert_eq!(waitable.wait(Some(Duration::from_secs(1)), true).unwrap(), Some(5));
}

#[test]
fn test_event_waitable_unregisters_after_firing() {
    let source: EventSource<u32> = EventSource::new("source");
    let waitable = Waitable::from_event(&source);
    assert_eq!(source.listener_count(), 1);

    source.notify(&3);
    assert_eq!(source.listener_count(), 0);
    assert_eq!(waitable.wait(Some(Duration::from_secs(1)), true).unwrap(), Some(3));
}

#[test]
fn test_event_waitable_unregisters_on_timeout_and_drop() {
    let source: EventSource<u32> = EventSource::new("source");

    let waitable = Waitable::from_event(&source);
    assert_eq!(waitable.wait(Some(Duration::from_millis(10)), false).unwrap(), None);
    assert_eq!(source.listener_count(), 0);

    let waitable = Waitable::from_event(&source);
    drop(waitable);
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn test_event_waitable_map_filters() {
    let source: EventSource<u32> = EventSource::new("filtered");
    let waitable = Waitable::from_event_map(&source, |v: &u32| (*v > 10).then_some(*v * 2));

    source.notify(&1);
    assert!(waitable.is_pending());
    source.notify(&11);
    assert_eq!(waitable.wait(Some(Duration::from_secs(1)), true).unwrap(), Some(22));
}

#[test]
fn test_scan_finished_waitable() {
    let timeouts: EventSource<TimeoutSource> = EventSource::new("timeouts");
    let report = Arc::new(Mutex::new(ScanReport::new()));
    let peer = PeerAddress::new(AddressType::RandomStatic, [0xC1, 0, 0, 0, 0, 1]);
    let waitable = ScanFinishedWaitable::new(&timeouts, Arc::clone(&report));

    report.lock().add_report(peer, -50, &[0x02, 0x01, 0x06]);
    timeouts.notify(&TimeoutSource::SecurityRequest);
    timeouts.notify(&TimeoutSource::Scan);

    let result = waitable.wait(Some(Duration::from_secs(1)), true).unwrap().unwrap();
    assert_eq!(result.entries().len(), 1);
    assert_eq!(result.entries()[0].peer_address, peer);
    assert_eq!(timeouts.listener_count(), 0);
}
