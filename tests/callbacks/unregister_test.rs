/*!
 * Callback Unregister Tests
 * Unregister waits for in-flight calls and no call starts afterwards
 */

use refcore::callback::Callback;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_eight_invokers_with_mid_run_unregister() {
    const THREADS: usize = 8;
    const CALLS: usize = 1000;

    let bus: Arc<Callback<usize>> = Arc::new(Callback::new());
    let f1_running = Arc::new(AtomicUsize::new(0));
    let f1_unregistered = Arc::new(AtomicBool::new(false));
    let f1_late_calls = Arc::new(AtomicUsize::new(0));
    let f2_calls = Arc::new(AtomicUsize::new(0));

    let f1 = {
        let running = f1_running.clone();
        let unregistered = f1_unregistered.clone();
        let late = f1_late_calls.clone();
        bus.register(move |_: &usize| {
            running.fetch_add(1, Ordering::SeqCst);
            if unregistered.load(Ordering::SeqCst) {
                late.fetch_add(1, Ordering::SeqCst);
            }
            thread::yield_now();
            running.fetch_sub(1, Ordering::SeqCst);
        })
    };
    let _f2 = {
        let calls = f2_calls.clone();
        bus.register(move |_: &usize| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    let start = Arc::new(Barrier::new(THREADS + 1));
    let invokers: Vec<_> = (0..THREADS)
        .map(|_| {
            let bus = bus.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for i in 0..CALLS {
                    bus.invoke(&i);
                }
            })
        })
        .collect();

    let unregisterer = {
        let bus = bus.clone();
        let start = start.clone();
        let running = f1_running.clone();
        let unregistered = f1_unregistered.clone();
        let f2_calls = f2_calls.clone();
        thread::spawn(move || {
            start.wait();
            while f2_calls.load(Ordering::SeqCst) < THREADS * CALLS / 4 {
                thread::yield_now();
            }

            assert!(bus.unregister(f1));
            // Nothing of f1 may be running once unregister has returned
            assert_eq!(running.load(Ordering::SeqCst), 0);
            unregistered.store(true, Ordering::SeqCst);
        })
    };

    for invoker in invokers {
        invoker.join().expect("invoker panicked");
    }
    unregisterer.join().expect("unregisterer panicked");

    assert_eq!(f1_late_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f2_calls.load(Ordering::SeqCst), THREADS * CALLS);
    assert_eq!(bus.len(), 1);
}

#[test]
fn test_unregister_blocks_until_slow_call_finishes() {
    let bus: Arc<Callback<()>> = Arc::new(Callback::new());
    let entered = Arc::new(Barrier::new(2));
    let finished = Arc::new(AtomicBool::new(false));

    let registration = {
        let entered = entered.clone();
        let finished = finished.clone();
        bus.register(move |_: &()| {
            entered.wait();
            thread::sleep(Duration::from_millis(50));
            finished.store(true, Ordering::SeqCst);
        })
    };

    let invoker = {
        let bus = bus.clone();
        thread::spawn(move || bus.invoke(&()))
    };

    entered.wait();
    assert!(bus.unregister(registration));
    assert!(finished.load(Ordering::SeqCst), "unregister returned during a call");

    assert_eq!(invoker.join().expect("invoker panicked"), 1);
    assert_eq!(bus.stats().drain_waits, 1);
    assert_eq!(bus.invoke(&()), 0);
}

#[test]
fn test_same_registration_runs_concurrently() {
    let bus: Arc<Callback<()>> = Arc::new(Callback::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let together = Arc::new(Barrier::new(4));

    let registration = {
        let inside = inside.clone();
        let peak = peak.clone();
        let together = together.clone();
        bus.register(move |_: &()| {
            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            together.wait();
            inside.fetch_sub(1, Ordering::SeqCst);
        })
    };

    let invokers: Vec<_> = (0..4)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || bus.invoke(&()))
        })
        .collect();
    for invoker in invokers {
        invoker.join().expect("invoker panicked");
    }

    assert_eq!(peak.load(Ordering::SeqCst), 4);
    assert!(bus.unregister(registration));
}

#[test]
fn test_unregister_other_subscriber_from_callback() {
    let bus: Arc<Callback<()>> = Arc::new(Callback::new());
    let victim_calls = Arc::new(AtomicUsize::new(0));

    let victim = {
        let calls = victim_calls.clone();
        bus.register(move |_: &()| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    let pending = Arc::new(parking_lot::Mutex::new(Some(victim)));
    let _remover = {
        let bus_inner = Arc::downgrade(&bus);
        let pending = pending.clone();
        bus.register(move |_: &()| {
            if let (Some(bus), Some(victim)) = (bus_inner.upgrade(), pending.lock().take()) {
                assert!(bus.unregister(victim));
            }
        })
    };

    bus.invoke(&());
    bus.invoke(&());

    // victim ran once before the remover took it out
    assert_eq!(victim_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.len(), 1);
}

#[test]
fn test_invoke_skips_subscriber_while_draining() {
    let bus: Arc<Callback<()>> = Arc::new(Callback::new());
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let first = Arc::new(AtomicBool::new(true));
    let calls = Arc::new(AtomicUsize::new(0));

    let registration = {
        let entered = entered.clone();
        let release = release.clone();
        let first = first.clone();
        let calls = calls.clone();
        bus.register(move |_: &()| {
            calls.fetch_add(1, Ordering::SeqCst);
            if first.swap(false, Ordering::SeqCst) {
                entered.wait();
                release.wait();
            }
        })
    };

    let holder = {
        let bus = bus.clone();
        thread::spawn(move || bus.invoke(&()))
    };
    entered.wait();

    let unregistered = Arc::new(AtomicBool::new(false));
    let unregisterer = {
        let bus = bus.clone();
        let unregistered = unregistered.clone();
        thread::spawn(move || {
            let removed = bus.unregister(registration);
            unregistered.store(true, Ordering::SeqCst);
            removed
        })
    };

    // Calls go through until the unregistering flag is set, then stop
    let deadline = Instant::now() + Duration::from_secs(5);
    while bus.invoke(&()) != 0 {
        assert!(Instant::now() < deadline, "subscriber still called while draining");
        thread::yield_now();
    }
    let calls_while_draining = calls.load(Ordering::SeqCst);

    assert_eq!(bus.invoke(&()), 0);
    assert!(bus.stats().skipped >= 2);
    assert!(!unregistered.load(Ordering::SeqCst), "unregister returned during a call");
    assert_eq!(bus.len(), 1);

    release.wait();
    assert!(unregisterer.join().expect("unregisterer panicked"));
    assert_eq!(holder.join().expect("holder panicked"), 1);
    assert_eq!(calls.load(Ordering::SeqCst), calls_while_draining);
    assert!(bus.is_empty());
}

#[test]
fn test_unregister_after_subscriber_panicked() {
    let bus: Arc<Callback<()>> = Arc::new(Callback::new());
    let registration = bus.register(|_: &()| panic!("subscriber failed"));

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.invoke(&())));
    assert!(outcome.is_err());

    let (done_tx, done_rx) = flume::bounded(1);
    let unregisterer = {
        let bus = bus.clone();
        thread::spawn(move || {
            let _ = done_tx.send(bus.unregister(registration));
        })
    };

    let removed = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("unregister blocked after a subscriber panicked");
    assert!(removed);
    unregisterer.join().expect("unregisterer panicked");
    assert!(bus.is_empty());
}

#[test]
fn test_guard_drop_after_subscriber_panicked() {
    let bus: Callback<u32> = Callback::new();
    let survivor_calls = Arc::new(AtomicUsize::new(0));

    let guard = bus.register_guarded(|value: &u32| {
        if *value == 13 {
            panic!("unlucky value");
        }
    });
    let _survivor = {
        let calls = survivor_calls.clone();
        bus.register(move |_: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.invoke(&13)));
    assert!(outcome.is_err());

    drop(guard);
    assert_eq!(bus.len(), 1);
    assert_eq!(bus.invoke(&13), 1);
    assert_eq!(survivor_calls.load(Ordering::SeqCst), 1);
}
