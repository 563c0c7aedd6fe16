use anyhow::Result;
use keyscout::{
    CancellationSignal, CoordinatorConfig, Executor, SearchCoordinator, SearchError,
    SearchObserver, SearchPhase, DEBOUNCE_DELAY,
};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Results { items: Vec<String>, more: bool },
    Complete { query: String, count: usize },
    Failed { query: String, message: String },
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn completed_queries(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Complete { query, .. } => Some(query),
                _ => None,
            })
            .collect()
    }
}

impl SearchObserver<String> for Recorder {
    fn display_results(&self, results: &[String], more_available: bool) {
        self.events.lock().unwrap().push(Event::Results {
            items: results.to_vec(),
            more: more_available,
        });
    }

    fn search_complete(&self, query: &str, results: &[String], _elapsed: Duration) {
        self.events.lock().unwrap().push(Event::Complete {
            query: query.to_string(),
            count: results.len(),
        });
    }

    fn search_failed(&self, query: &str, error: &SearchError, _elapsed: Duration) {
        self.events.lock().unwrap().push(Event::Failed {
            query: query.to_string(),
            message: error.to_string(),
        });
    }
}

/// Remembers every (query, max_results) an executor was called with
#[derive(Default, Clone)]
struct CallLog(Arc<Mutex<Vec<(String, usize)>>>);

impl CallLog {
    fn record(&self, query: &str, max_results: usize) {
        self.0.lock().unwrap().push((query.to_string(), max_results));
    }

    fn calls(&self) -> Vec<(String, usize)> {
        self.0.lock().unwrap().clone()
    }

    fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.0.lock().unwrap().len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        thread_count: NonZeroUsize::new(4).unwrap(),
        ..CoordinatorConfig::default()
    }
}

fn echo_executor(log: &CallLog) -> Executor<String> {
    let log = log.clone();
    Executor::from_fn(move |query, max_results, _| {
        log.record(query, max_results);
        Ok(vec![format!("{}-result", query)])
    })
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_debounce_collapses_burst() -> Result<()> {
    let log = CallLog::default();
    let recorder = Arc::new(Recorder::default());
    let coordinator =
        SearchCoordinator::new(echo_executor(&log), Arc::clone(&recorder), &test_config())?;

    coordinator.notify_input("a", 50)?;
    thread::sleep(Duration::from_millis(100));
    coordinator.notify_input("ab", 50)?;
    thread::sleep(Duration::from_millis(100));
    coordinator.notify_input("abc", 50)?;
    assert_eq!(coordinator.phase(), SearchPhase::Pending);

    assert!(coordinator.wait_idle(SETTLE));
    assert_eq!(log.calls(), vec![("abc".to_string(), 50)]);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Results {
                items: vec!["abc-result".to_string()],
                more: false,
            },
            Event::Complete {
                query: "abc".to_string(),
                count: 1,
            },
        ]
    );

    let stats = coordinator.metrics().get_stats();
    assert_eq!(stats.notifications, 3);
    assert_eq!(stats.started, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.collapsed_notifications(), 2);
    Ok(())
}

#[test]
fn test_debounce_waits_for_quiet_period() -> Result<()> {
    let log = CallLog::default();
    let coordinator =
        SearchCoordinator::new(echo_executor(&log), Arc::new(Recorder::default()), &test_config())?;

    let started = Instant::now();
    coordinator.notify_input("ab", 50)?;
    thread::sleep(Duration::from_millis(100));
    coordinator.notify_input("abc", 50)?;
    assert!(coordinator.wait_idle(SETTLE));

    // The countdown restarted on the second notification
    assert!(started.elapsed() >= Duration::from_millis(100) + DEBOUNCE_DELAY);
    assert_eq!(log.calls(), vec![("abc".to_string(), 50)]);
    Ok(())
}

#[test]
fn test_immediate_trigger_skips_delay() -> Result<()> {
    let log = CallLog::default();
    let recorder = Arc::new(Recorder::default());
    let coordinator =
        SearchCoordinator::new(echo_executor(&log), Arc::clone(&recorder), &test_config())?;

    let started = Instant::now();
    coordinator.trigger_immediate("x", 10)?;
    assert!(log.wait_for(1, SETTLE));
    assert!(started.elapsed() < DEBOUNCE_DELAY);

    assert!(coordinator.wait_idle(SETTLE));
    assert_eq!(recorder.completed_queries(), vec!["x".to_string()]);
    Ok(())
}

#[test]
fn test_immediate_trigger_cancels_pending_input() -> Result<()> {
    let log = CallLog::default();
    let recorder = Arc::new(Recorder::default());
    let coordinator =
        SearchCoordinator::new(echo_executor(&log), Arc::clone(&recorder), &test_config())?;

    coordinator.notify_input("typed", 5)?;
    coordinator.trigger_immediate("entered", 5)?;
    assert!(coordinator.wait_idle(SETTLE));

    // Give the disarmed timer every chance to fire anyway
    thread::sleep(DEBOUNCE_DELAY + Duration::from_millis(200));
    assert_eq!(log.calls(), vec![("entered".to_string(), 5)]);
    assert_eq!(recorder.completed_queries(), vec!["entered".to_string()]);
    Ok(())
}

#[test]
fn test_more_available_tracks_limit() -> Result<()> {
    // The query is the number of results to produce
    let executor: Executor<String> = Executor::from_fn(|query, _, _| {
        let count: usize = query.parse().map_err(|_| SearchError::executor("not a number"))?;
        Ok((0..count).map(|i| i.to_string()).collect())
    });
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &test_config())?;

    coordinator.trigger_immediate("10", 10)?;
    assert!(coordinator.wait_idle(SETTLE));
    coordinator.trigger_immediate("9", 10)?;
    assert!(coordinator.wait_idle(SETTLE));

    let flags: Vec<bool> = recorder
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Results { more, .. } => Some(more),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
    Ok(())
}

#[test]
fn test_reset_prevents_pending_execution() -> Result<()> {
    let log = CallLog::default();
    let recorder = Arc::new(Recorder::default());
    let coordinator =
        SearchCoordinator::new(echo_executor(&log), Arc::clone(&recorder), &test_config())?;

    coordinator.notify_input("y", 5)?;
    thread::sleep(Duration::from_millis(100));
    coordinator.reset();
    assert_eq!(coordinator.phase(), SearchPhase::Idle);

    thread::sleep(DEBOUNCE_DELAY + Duration::from_millis(200));
    assert!(log.calls().is_empty());
    assert!(recorder.events().is_empty());

    // Idempotent
    coordinator.reset();
    assert_eq!(coordinator.metrics().get_stats().resets, 2);
    Ok(())
}

#[test]
fn test_superseded_result_is_never_delivered() -> Result<()> {
    let log = CallLog::default();
    let slow_finished = Arc::new(AtomicBool::new(false));

    let executor = {
        let log = log.clone();
        let slow_finished = Arc::clone(&slow_finished);
        Executor::from_fn(move |query, max_results, _| {
            log.record(query, max_results);
            if query == "a" {
                // Ignores cancellation on purpose
                thread::sleep(Duration::from_millis(800));
                slow_finished.store(true, Ordering::SeqCst);
            }
            Ok(vec![format!("{}-result", query)])
        })
    };
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &test_config())?;

    coordinator.notify_input("a", 5)?;
    assert!(log.wait_for(1, SETTLE));
    thread::sleep(Duration::from_millis(50));
    coordinator.notify_input("b", 5)?;

    assert!(coordinator.wait_idle(SETTLE));
    assert!(wait_until(SETTLE, || slow_finished.load(Ordering::SeqCst)));
    assert!(wait_until(SETTLE, || {
        coordinator.metrics().get_stats().discarded == 1
    }));

    assert_eq!(
        log.calls(),
        vec![("a".to_string(), 5), ("b".to_string(), 5)]
    );
    assert_eq!(recorder.completed_queries(), vec!["b".to_string()]);
    assert!(!recorder.events().contains(&Event::Results {
        items: vec!["a-result".to_string()],
        more: false,
    }));
    Ok(())
}

#[test]
fn test_stale_searches_do_not_delay_newest() -> Result<()> {
    let config = CoordinatorConfig {
        thread_count: NonZeroUsize::new(1).unwrap(),
        ..CoordinatorConfig::default()
    };
    let origin = Instant::now();
    let starts: Arc<Mutex<Vec<(String, Duration)>>> = Arc::default();

    let executor = {
        let starts = Arc::clone(&starts);
        Executor::from_fn(move |query, _, _| {
            starts
                .lock()
                .unwrap()
                .push((query.to_string(), origin.elapsed()));
            if query == "a" {
                // Holds the only pooled worker and ignores cancellation
                thread::sleep(Duration::from_secs(2));
            }
            Ok(vec![format!("{}-result", query)])
        })
    };
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &config)?;

    coordinator.trigger_immediate("a", 5)?;
    thread::sleep(Duration::from_millis(50));
    let notified = origin.elapsed();
    coordinator.notify_input("b", 5)?;

    assert!(wait_until(SETTLE, || starts.lock().unwrap().len() == 2));
    let (query, started) = starts.lock().unwrap()[1].clone();
    assert_eq!(query, "b");
    assert!(started >= notified + DEBOUNCE_DELAY);
    assert!(
        started < notified + DEBOUNCE_DELAY + Duration::from_millis(700),
        "b started {:?} after the notification",
        started - notified
    );

    assert!(wait_until(SETTLE, || recorder.completed_queries()
        == vec!["b".to_string()]));
    assert!(wait_until(SETTLE, || {
        coordinator.metrics().get_stats().discarded == 1
    }));
    assert_eq!(recorder.completed_queries(), vec!["b".to_string()]);
    assert_eq!(coordinator.metrics().get_stats().overflow_threads, 1);
    Ok(())
}

#[test]
fn test_cooperative_cancellation_is_discarded_not_failed() -> Result<()> {
    let log = CallLog::default();
    let executor = {
        let log = log.clone();
        Executor::from_fn(move |query: &str, max_results: usize, signal: &CancellationSignal| {
            log.record(query, max_results);
            if query == "slow" {
                let deadline = Instant::now() + Duration::from_secs(5);
                while Instant::now() < deadline {
                    signal.check()?;
                    thread::sleep(Duration::from_millis(5));
                }
            }
            Ok(vec![query.to_string()])
        })
    };
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &test_config())?;

    coordinator.trigger_immediate("slow", 5)?;
    assert!(log.wait_for(1, SETTLE));
    coordinator.trigger_immediate("fast", 5)?;

    assert!(coordinator.wait_idle(SETTLE));
    assert!(wait_until(SETTLE, || {
        coordinator.metrics().get_stats().discarded == 1
    }));

    assert_eq!(recorder.completed_queries(), vec!["fast".to_string()]);
    let stats = coordinator.metrics().get_stats();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.delivered, 1);
    Ok(())
}

#[test]
fn test_executor_error_reports_failure_only() -> Result<()> {
    let executor: Executor<String> =
        Executor::from_fn(|_, _, _| Err(SearchError::executor("index offline")));
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &test_config())?;

    coordinator.trigger_immediate("q", 5)?;
    assert!(coordinator.wait_idle(SETTLE));

    assert_eq!(
        recorder.events(),
        vec![Event::Failed {
            query: "q".to_string(),
            message: "Search executor failed: index offline".to_string(),
        }]
    );
    assert_eq!(coordinator.metrics().get_stats().failed, 1);
    Ok(())
}

#[test]
fn test_panicking_executor_is_reported_and_coordinator_recovers() -> Result<()> {
    let executor = Executor::from_fn(|query, _, _| {
        if query == "boom" {
            panic!("lookup exploded");
        }
        Ok(vec![query.to_string()])
    });
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &test_config())?;

    coordinator.trigger_immediate("boom", 5)?;
    assert!(coordinator.wait_idle(SETTLE));
    coordinator.trigger_immediate("ok", 5)?;
    assert!(coordinator.wait_idle(SETTLE));

    let events = recorder.events();
    assert!(matches!(&events[0], Event::Failed { query, .. } if query == "boom"));
    assert_eq!(recorder.completed_queries(), vec!["ok".to_string()]);
    Ok(())
}

/// Panics when asked to show the results of "boom"
#[derive(Default)]
struct FragileObserver {
    completed: Mutex<Vec<String>>,
}

impl SearchObserver<String> for FragileObserver {
    fn display_results(&self, results: &[String], _more_available: bool) {
        if results.iter().any(|entry| entry == "boom") {
            panic!("results pane crashed");
        }
    }

    fn search_complete(&self, query: &str, _results: &[String], _elapsed: Duration) {
        self.completed.lock().unwrap().push(query.to_string());
    }
}

#[test]
fn test_panicking_observer_does_not_wedge_workers() -> Result<()> {
    let config = CoordinatorConfig {
        thread_count: NonZeroUsize::new(1).unwrap(),
        ..CoordinatorConfig::default()
    };
    let executor = Executor::from_fn(|query, _, _| Ok(vec![query.to_string()]));
    let observer = Arc::new(FragileObserver::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&observer), &config)?;

    coordinator.trigger_immediate("boom", 5)?;
    assert!(coordinator.wait_idle(SETTLE));

    for query in ["one", "two"] {
        coordinator.trigger_immediate(query, 5)?;
        assert!(coordinator.wait_idle(SETTLE));
    }

    assert!(wait_until(SETTLE, || observer.completed.lock().unwrap().len() == 2));
    assert_eq!(
        *observer.completed.lock().unwrap(),
        vec!["one".to_string(), "two".to_string()]
    );
    assert_eq!(coordinator.metrics().get_stats().delivered, 2);
    Ok(())
}

#[test]
fn test_unconfigured_executor_does_nothing() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::<String>::new(
        Executor::Unconfigured,
        Arc::clone(&recorder),
        &test_config(),
    )?;

    for query in ["a", "ab", "abc", "abcd", "abcde"] {
        coordinator.notify_input(query, 10)?;
    }
    coordinator.trigger_immediate("x", 10)?;
    coordinator.trigger_immediate("y", 10)?;
    assert_eq!(coordinator.phase(), SearchPhase::Idle);

    thread::sleep(DEBOUNCE_DELAY + Duration::from_millis(200));
    assert!(recorder.events().is_empty());

    let stats = coordinator.metrics().get_stats();
    assert_eq!(stats.dispatched, 0);
    assert_eq!(stats.started, 0);
    Ok(())
}

#[test]
fn test_shutdown_discards_in_flight_search() -> Result<()> {
    let log = CallLog::default();
    let executor = {
        let log = log.clone();
        Executor::from_fn(move |query, max_results, _| {
            log.record(query, max_results);
            thread::sleep(Duration::from_millis(300));
            Ok(vec![query.to_string()])
        })
    };
    let recorder = Arc::new(Recorder::default());
    let coordinator = SearchCoordinator::new(executor, Arc::clone(&recorder), &test_config())?;

    coordinator.trigger_immediate("late", 5)?;
    assert!(log.wait_for(1, SETTLE));
    coordinator.shutdown();
    assert_eq!(coordinator.phase(), SearchPhase::Idle);

    thread::sleep(Duration::from_millis(600));
    assert!(recorder.events().is_empty());
    assert!(matches!(
        coordinator.notify_input("again", 5),
        Err(SearchError::ShutDown)
    ));
    Ok(())
}

#[test]
fn test_drop_stops_pending_timer() -> Result<()> {
    let log = CallLog::default();
    let recorder = Arc::new(Recorder::default());
    {
        let coordinator =
            SearchCoordinator::new(echo_executor(&log), Arc::clone(&recorder), &test_config())?;
        coordinator.notify_input("never", 5)?;
    }

    thread::sleep(DEBOUNCE_DELAY + Duration::from_millis(200));
    assert!(log.calls().is_empty());
    assert!(recorder.events().is_empty());
    Ok(())
}

#[test]
fn test_concurrent_triggers_settle_on_latest_request() -> Result<()> {
    let executor = Executor::from_fn(|query, _, _| {
        thread::sleep(Duration::from_millis(2));
        Ok(vec![query.to_string()])
    });
    let recorder = Arc::new(Recorder::default());
    let coordinator = Arc::new(SearchCoordinator::new(
        executor,
        Arc::clone(&recorder),
        &test_config(),
    )?);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                for i in 0..25 {
                    let query = format!("{}-{}", worker, i);
                    if i % 2 == 0 {
                        coordinator.trigger_immediate(query, 5).unwrap();
                    } else {
                        coordinator.notify_input(query, 5).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // The last call may have been a notify; finish with a known trigger
    coordinator.trigger_immediate("final", 5)?;
    assert!(coordinator.wait_idle(SETTLE));
    // Superseded workers may still be draining from the pool
    assert!(wait_until(SETTLE, || {
        let stats = coordinator.metrics().get_stats();
        stats.delivered + stats.discarded + stats.failed == stats.started
            && stats.dispatched == stats.started + stats.superseded_before_start
    }));

    assert_eq!(coordinator.metrics().get_stats().failed, 0);
    assert_eq!(
        recorder.completed_queries().last().map(String::as_str),
        Some("final")
    );
    assert_eq!(coordinator.pending_request().query, "final");
    Ok(())
}
