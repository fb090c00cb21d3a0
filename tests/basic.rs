use rotella::{BuildError, TimerWheel, TimerWheelBuilder};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Recorded callback invocation: key, value, and when it fired.
type FiredLog = Arc<Mutex<Vec<(String, String, Instant)>>>;

fn make_wheel(base_ms: u64, slots: usize) -> (TimerWheel<String>, FiredLog) {
    let log: FiredLog = Arc::new(Mutex::new(Vec::new()));
    let log2 = Arc::clone(&log);
    let wheel = TimerWheelBuilder::new(Duration::from_millis(base_ms), slots)
        .on_expire(move |key, value| {
            log2.lock().unwrap().push((key, value, Instant::now()));
        })
        .build()
        .expect("wheel should build");
    (wheel, log)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn build_rejects_invalid_parameters() {
    let err = TimerWheelBuilder::<String>::new(Duration::ZERO, 10)
        .on_expire(|_, _| {})
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::ZeroBaseInterval));

    let err = TimerWheelBuilder::<String>::new(ms(100), 1)
        .on_expire(|_, _| {})
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::TooFewSlots(1)));

    let err = TimerWheelBuilder::<String>::new(ms(100), 10)
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::MissingCallback));
}

#[test]
fn clone_handles_drive_the_same_wheel() {
    let (w1, _log) = make_wheel(50, 10);
    let w2 = w1.clone();
    w1.schedule("shared", "yes".to_string(), ms(400));
    assert!(w2.contains("shared"), "cloned handle must see the same timers");
    assert!(w2.cancel("shared"));
    assert!(w1.is_empty());
    w1.stop();
}

// ---------------------------------------------------------------------------
// Single-timer firing window
// ---------------------------------------------------------------------------

#[test]
fn timer_fires_once_within_its_window() {
    let (wheel, log) = make_wheel(50, 10);
    let t0 = Instant::now();
    wheel.schedule("a", "x".to_string(), ms(150));

    thread::sleep(ms(500));

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1, "expected exactly one callback");
    let (key, value, fired_at) = &events[0];
    assert_eq!(key, "a");
    assert_eq!(value, "x");
    let elapsed = fired_at.duration_since(t0);
    // Deadlines are quantized to the base tick: never more than one tick
    // early, and not unreasonably late.
    assert!(
        elapsed >= ms(100) && elapsed <= ms(350),
        "fired at {elapsed:?}, expected ~150 ms"
    );
    wheel.stop();
}

#[test]
fn sub_tick_delay_fires_immediately() {
    let (wheel, log) = make_wheel(50, 10);
    wheel.schedule("zero", "a".to_string(), Duration::ZERO);
    wheel.schedule("tiny", "b".to_string(), ms(10));

    thread::sleep(ms(150));

    let events = log.lock().unwrap();
    let keys: HashSet<&str> = events.iter().map(|(k, _, _)| k.as_str()).collect();
    assert_eq!(events.len(), 2);
    assert!(keys.contains("zero") && keys.contains("tiny"));
    assert!(wheel.is_empty(), "immediate fires must not leave entries behind");
    wheel.stop();
}

// ---------------------------------------------------------------------------
// Cancellation, replacement, flush
// ---------------------------------------------------------------------------

#[test]
fn cancel_before_deadline_suppresses_the_callback() {
    let (wheel, log) = make_wheel(50, 10);
    wheel.schedule("a", "x".to_string(), ms(200));
    thread::sleep(ms(50));
    assert!(wheel.cancel("a"));

    thread::sleep(ms(600));
    assert!(
        log.lock().unwrap().is_empty(),
        "cancelled timer must never fire"
    );
    assert!(!wheel.cancel("a"), "second cancel must report absence");
    wheel.stop();
}

#[test]
fn replacement_fires_once_with_the_latest_value() {
    let (wheel, log) = make_wheel(50, 10);
    let t0 = Instant::now();
    wheel.schedule("k", "v1".to_string(), ms(300));
    thread::sleep(ms(100));
    wheel.schedule("k", "v2".to_string(), ms(150));

    thread::sleep(ms(500));

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1, "replacement must suppress the first install");
    let (key, value, fired_at) = &events[0];
    assert_eq!(key, "k");
    assert_eq!(value, "v2", "the replaced value must never fire");
    let elapsed = fired_at.duration_since(t0);
    assert!(
        elapsed >= ms(200) && elapsed <= ms(450),
        "fired at {elapsed:?}, expected ~250 ms"
    );
    wheel.stop();
}

#[test]
fn clear_suppresses_everything_scheduled_before_it() {
    let (wheel, log) = make_wheel(50, 10);
    wheel.schedule("a", "1".to_string(), ms(100));
    wheel.schedule("b", "2".to_string(), ms(200));
    thread::sleep(ms(20));
    wheel.clear();
    assert!(wheel.is_empty());

    thread::sleep(ms(500));
    assert!(
        log.lock().unwrap().is_empty(),
        "flushed timers must never fire"
    );
    wheel.stop();
}

// ---------------------------------------------------------------------------
// Rescheduling
// ---------------------------------------------------------------------------

#[test]
fn reschedule_extends_the_deadline() {
    let (wheel, log) = make_wheel(50, 10);
    let t0 = Instant::now();
    wheel.schedule("a", "x".to_string(), ms(200));
    thread::sleep(ms(150));
    wheel.reschedule("a", ms(200));

    thread::sleep(ms(600));

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1, "rescheduling must not duplicate the fire");
    let elapsed = events[0].2.duration_since(t0);
    assert!(
        elapsed >= ms(280) && elapsed <= ms(550),
        "fired at {elapsed:?}, expected ~350 ms after the original schedule"
    );
    wheel.stop();
}

#[test]
fn reschedule_of_unknown_key_does_not_create_a_timer() {
    let (wheel, log) = make_wheel(50, 10);
    wheel.reschedule("ghost", ms(100));
    assert!(wheel.is_empty());

    thread::sleep(ms(300));
    assert!(log.lock().unwrap().is_empty());
    wheel.stop();
}

// ---------------------------------------------------------------------------
// Hierarchy traversal
// ---------------------------------------------------------------------------

#[test]
fn coarse_timer_demotes_through_the_layers_before_firing() {
    // base 10 ms, 4 slots → layer spans 10 / 40 / 160 ms.  A 235 ms delay
    // parks on layer 2, then steps down through layer 1 and layer 0.
    let (wheel, log) = make_wheel(10, 4);
    let t0 = Instant::now();
    wheel.schedule("a", "x".to_string(), ms(235));

    thread::sleep(ms(500));

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1);
    let elapsed = events[0].2.duration_since(t0);
    assert!(
        elapsed >= ms(200) && elapsed <= ms(350),
        "fired at {elapsed:?}, expected ~225 ms"
    );

    let stats = wheel.stats();
    assert!(
        stats.demotions >= 2,
        "expected at least two demotions (layer 2 → 1 → 0), saw {}",
        stats.demotions
    );
    assert_eq!(stats.fired, 1);
    wheel.stop();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stop_halts_future_firing_and_abandons_entries() {
    let (wheel, log) = make_wheel(50, 10);
    wheel.schedule("a", "x".to_string(), ms(200));
    wheel.stop();
    wheel.stop(); // double stop is a no-op

    thread::sleep(ms(500));
    assert!(
        log.lock().unwrap().is_empty(),
        "no tick may run after stop()"
    );
    assert_eq!(wheel.len(), 1, "stop abandons entries without firing them");
}

// ---------------------------------------------------------------------------
// Callback behavior
// ---------------------------------------------------------------------------

#[test]
fn callback_may_reenter_the_wheel() {
    let slot: Arc<OnceLock<TimerWheel<u32>>> = Arc::new(OnceLock::new());
    let count = Arc::new(AtomicUsize::new(0));
    let slot2 = Arc::clone(&slot);
    let count2 = Arc::clone(&count);

    let wheel = TimerWheelBuilder::new(ms(20), 10)
        .on_expire(move |key, generation| {
            count2.fetch_add(1, Ordering::SeqCst);
            if generation == 0 {
                if let Some(wheel) = slot2.get() {
                    wheel.schedule(key, 1, ms(60));
                }
            }
        })
        .build()
        .expect("wheel should build");
    let _ = slot.set(wheel.clone());

    wheel.schedule("ping", 0u32, ms(60));
    thread::sleep(ms(400));

    assert_eq!(
        count.load(Ordering::SeqCst),
        2,
        "the callback must be able to reschedule from inside itself"
    );
    wheel.stop();
}

#[test]
fn panicking_callback_is_isolated() {
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = Arc::clone(&fired);
    let wheel = TimerWheelBuilder::new(ms(50), 10)
        .on_expire(move |key, _value: String| {
            if key == "boom" {
                panic!("callback exploded");
            }
            fired2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .expect("wheel should build");

    wheel.schedule("boom", "x".to_string(), ms(100));
    wheel.schedule("ok", "y".to_string(), ms(200));
    thread::sleep(ms(400));

    assert_eq!(
        fired.load(Ordering::SeqCst),
        1,
        "a panicking callback must not silence later callbacks"
    );

    // The wheel itself must stay usable.
    wheel.schedule("again", "z".to_string(), ms(100));
    thread::sleep(ms(300));
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    wheel.stop();
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_schedule_and_cancel_storm() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 125;

    let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let fired2 = Arc::clone(&fired);
    let wheel = TimerWheelBuilder::new(ms(20), 10)
        .on_expire(move |key, _value: String| {
            fired2.lock().unwrap().push(key);
        })
        .build()
        .expect("wheel should build");

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let wheel = wheel.clone();
        handles.push(thread::spawn(move || {
            for j in 0..PER_THREAD {
                let i = t * PER_THREAD + j;
                let key = format!("k_{i}");
                // Delays span 100–480 ms so same-thread cancels always win.
                let delay = ms((((i % 20) + 5) * 20) as u64);
                wheel.schedule(key.clone(), i.to_string(), delay);
                if i % 2 == 0 {
                    assert!(wheel.cancel(&key));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("no scheduler thread may panic");
    }

    thread::sleep(ms(800));

    let fired = fired.lock().unwrap();
    let unique: HashSet<&str> = fired.iter().map(String::as_str).collect();
    assert_eq!(fired.len(), unique.len(), "no key may fire twice");
    assert_eq!(
        fired.len(),
        THREADS * PER_THREAD / 2,
        "every odd key fires, every even key was cancelled"
    );
    for key in fired.iter() {
        let i: usize = key.trim_start_matches("k_").parse().unwrap();
        assert_eq!(i % 2, 1, "cancelled (even) key {key} must not fire");
    }
    assert!(wheel.is_empty());

    let stats = wheel.stats();
    assert_eq!(stats.scheduled, (THREADS * PER_THREAD) as u64);
    assert_eq!(stats.cancelled, (THREADS * PER_THREAD / 2) as u64);
    assert_eq!(stats.fired, (THREADS * PER_THREAD / 2) as u64);
    wheel.stop();
}
