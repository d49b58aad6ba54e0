//! Contract tests for the closure lock: exclusive execution, panic-safe
//! release, and owner suspension over wait/pulse.

mod common;

use common::{init_test_logging, spin_until, OBSERVE};
use pulselock::ClosureLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn closure_runs_are_mutually_exclusive() {
    init_test_logging();
    test_phase!("closure_runs_are_mutually_exclusive");

    let lock = Arc::new(ClosureLock::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let threads = 8;
    let iterations = 250;

    let mut handles = Vec::new();
    for _ in 0..threads {
        let lock = Arc::clone(&lock);
        let counter = Arc::clone(&counter);
        handles.push(thread::spawn(move || {
            for _ in 0..iterations {
                lock.run(|| {
                    // Unsynchronized read-modify-write: exactness proves
                    // exclusive execution.
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                });
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let total = counter.load(Ordering::SeqCst);
    let expected = threads * iterations;
    assert_with_log!(total == expected, "no lost updates", expected, total);
    test_complete!("closure_runs_are_mutually_exclusive", total = total);
}

#[test]
fn panic_inside_run_releases_the_lock_promptly() {
    init_test_logging();
    test_phase!("panic_inside_run_releases_the_lock_promptly");

    let lock = Arc::new(ClosureLock::new());

    let lock2 = Arc::clone(&lock);
    let propagated = thread::spawn(move || {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            lock2.run(|| panic!("deliberate failure"));
        }))
        .is_err()
    })
    .join()
    .expect("panic escaped catch_unwind");
    assert_with_log!(propagated, "panic reached the run caller", true, propagated);

    // A fresh thread acquires without delay.
    let lock3 = Arc::clone(&lock);
    let reacquired = Arc::new(AtomicBool::new(false));
    let reacquired2 = Arc::clone(&reacquired);
    let handle = thread::spawn(move || {
        lock3.run(|| {
            reacquired2.store(true, Ordering::SeqCst);
        });
    });
    let prompt = spin_until(OBSERVE, || reacquired.load(Ordering::SeqCst));
    assert_with_log!(prompt, "lock released after panic", true, prompt);
    handle.join().expect("thread panicked");
    test_complete!("panic_inside_run_releases_the_lock_promptly");
}

#[test]
fn wait_suspends_the_owner_until_pulsed() {
    init_test_logging();
    test_phase!("wait_suspends_the_owner_until_pulsed");

    let lock = Arc::new(ClosureLock::new());
    let suspended = Arc::new(AtomicBool::new(false));
    let resumed = Arc::new(AtomicBool::new(false));

    let waiter = {
        let lock = Arc::clone(&lock);
        let suspended = Arc::clone(&suspended);
        let resumed = Arc::clone(&resumed);
        thread::spawn(move || {
            lock.run(|| {
                suspended.store(true, Ordering::SeqCst);
                lock.wait();
                resumed.store(true, Ordering::SeqCst);
            });
        })
    };

    let parked = spin_until(OBSERVE, || suspended.load(Ordering::SeqCst));
    assert!(parked, "waiter never reached wait");

    // While the owner is suspended, the lock is free for other work.
    let observed = Arc::new(AtomicBool::new(false));
    {
        let lock = Arc::clone(&lock);
        let observed = Arc::clone(&observed);
        let interloper = thread::spawn(move || {
            lock.run(|| {
                observed.store(true, Ordering::SeqCst);
            });
        });
        interloper.join().expect("interloper panicked");
    }
    assert_with_log!(
        observed.load(Ordering::SeqCst),
        "lock usable during wait",
        true,
        observed.load(Ordering::SeqCst)
    );
    assert_with_log!(
        !resumed.load(Ordering::SeqCst),
        "waiter still suspended without pulse",
        false,
        resumed.load(Ordering::SeqCst)
    );

    lock.pulse();
    waiter.join().expect("waiter panicked");
    assert_with_log!(
        resumed.load(Ordering::SeqCst),
        "pulse resumed the waiter",
        true,
        resumed.load(Ordering::SeqCst)
    );
    test_complete!("wait_suspends_the_owner_until_pulsed");
}

#[test]
fn wait_for_gives_up_after_the_deadline() {
    init_test_logging();
    test_phase!("wait_for_gives_up_after_the_deadline");

    let lock = ClosureLock::new();

    let start = std::time::Instant::now();
    let pulsed = lock.run(|| lock.wait_for(Duration::from_millis(50)));
    let elapsed = start.elapsed();

    assert_with_log!(!pulsed, "no pulse was issued", false, pulsed);
    assert_with_log!(
        elapsed >= Duration::from_millis(40) && elapsed < Duration::from_secs(2),
        "deadline approximately honored",
        "40ms..2s",
        elapsed
    );
    test_complete!("wait_for_gives_up_after_the_deadline");
}

#[test]
fn nested_run_on_the_owner_enters_immediately() {
    init_test_logging();
    test_phase!("nested_run_on_the_owner_enters_immediately");

    let lock = ClosureLock::new();
    let result = lock.run(|| lock.run(|| lock.run(|| "deep")));
    assert_with_log!(result == "deep", "nested runs complete", "deep", result);
    test_complete!("nested_run_on_the_owner_enters_immediately");
}

#[test]
fn results_and_state_flow_through_run() {
    init_test_logging();
    test_phase!("results_and_state_flow_through_run");

    let lock = Arc::new(ClosureLock::new());
    let mut totals = Vec::new();

    let mut handles = Vec::new();
    for index in 0..4u64 {
        let lock = Arc::clone(&lock);
        handles.push(thread::spawn(move || lock.run(move || index * 10)));
    }
    for handle in handles {
        totals.push(handle.join().expect("worker panicked"));
    }
    totals.sort_unstable();

    assert_with_log!(
        totals == vec![0, 10, 20, 30],
        "each run returned its closure's value",
        vec![0u64, 10, 20, 30],
        totals
    );
    test_complete!("results_and_state_flow_through_run");
}
