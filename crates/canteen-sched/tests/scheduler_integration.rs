//! Integration tests for the worker pool and scheduler facade

use canteen_sched::{
    Lifecycle, SchedError, Scheduler, SchedulerConfig, ShutdownMode, WorkerState,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn scheduler_with(workers: usize) -> Scheduler {
    Scheduler::new(SchedulerConfig::with_workers(workers)).expect("Failed to start scheduler")
}

#[test]
fn test_doubling_tasks_resolve_after_graceful_shutdown() {
    let scheduler = scheduler_with(4);

    let futures: Vec<_> = (0..10i64)
        .map(|i| {
            scheduler
                .submit(format!("double-{}", i), |x: i64| Ok::<_, String>(x * 2), i)
                .expect("Failed to submit task")
        })
        .collect();

    scheduler.shutdown(ShutdownMode::Graceful);
    assert_eq!(scheduler.pending_count(), 0);

    for (i, future) in futures.into_iter().enumerate() {
        assert!(future.is_ready());
        assert_eq!(future.wait(), Ok(i as i64 * 2));
    }
}

#[test]
fn test_failing_task_does_not_affect_next_task() {
    let scheduler = scheduler_with(2);

    let divide = scheduler
        .submit(
            "divide",
            |(a, b): (i32, i32)| a.checked_div(b).ok_or("division by zero"),
            (10, 0),
        )
        .unwrap();
    match divide.wait() {
        Err(SchedError::TaskFailure { task, message }) => {
            assert_eq!(task, "divide");
            assert_eq!(message, "division by zero");
        }
        other => panic!("expected TaskFailure, got {:?}", other),
    }

    let echo = scheduler
        .submit("echo", |s: String| Ok::<_, String>(s), "hello".to_string())
        .unwrap();
    assert_eq!(echo.wait(), Ok("hello".to_string()));

    let stats = scheduler.stats();
    assert_eq!(stats.tasks_failed, 1);
    assert_eq!(stats.tasks_completed, 1);
}

#[test]
fn test_panicking_task_keeps_every_worker_alive() {
    let scheduler = scheduler_with(2);

    let panics: Vec<_> = (0..4)
        .map(|_| {
            scheduler
                .submit(
                    "panic",
                    |_: ()| -> Result<(), String> { panic!("callable bug") },
                    (),
                )
                .unwrap()
        })
        .collect();
    for future in panics {
        assert!(matches!(
            future.wait(),
            Err(SchedError::TaskPanicked { .. })
        ));
    }

    let followups: Vec<_> = (0..4)
        .map(|i| scheduler.submit("after", |x: u32| Ok::<_, String>(x), i).unwrap())
        .collect();
    for (i, future) in followups.into_iter().enumerate() {
        assert_eq!(future.wait(), Ok(i as u32));
    }
    assert_eq!(scheduler.worker_count(), 2);
}

#[test]
fn test_submit_after_shutdown_returns_pool_closed() {
    let scheduler = scheduler_with(2);
    scheduler.shutdown(ShutdownMode::Graceful);

    let pending_before = scheduler.pending_count();
    let submitted_before = scheduler.stats().tasks_submitted;

    let result = scheduler.submit("late", |x: u8| Ok::<_, String>(x), 0);
    assert_eq!(result.unwrap_err(), SchedError::PoolClosed);
    assert_eq!(scheduler.pending_count(), pending_before);
    assert_eq!(scheduler.stats().tasks_submitted, submitted_before);
}

#[test]
fn test_concurrent_submitters_exactly_once() {
    let scheduler = scheduler_with(4);
    let executions = Arc::new(AtomicUsize::new(0));

    let results: Vec<u64> = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..8u64)
            .map(|caller| {
                let scheduler = &scheduler;
                let executions = executions.clone();
                s.spawn(move |_| {
                    let futures: Vec<_> = (0..125u64)
                        .map(|n| {
                            let executions = executions.clone();
                            scheduler
                                .submit(
                                    "tag",
                                    move |id: u64| {
                                        executions.fetch_add(1, Ordering::SeqCst);
                                        Ok::<_, String>(id)
                                    },
                                    caller * 1000 + n,
                                )
                                .unwrap()
                        })
                        .collect();
                    futures
                        .into_iter()
                        .map(|f| f.wait().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    })
    .unwrap();

    assert_eq!(results.len(), 1000);
    let unique: HashSet<u64> = results.iter().copied().collect();
    assert_eq!(unique.len(), 1000);
    for caller in 0..8u64 {
        for n in 0..125u64 {
            assert!(unique.contains(&(caller * 1000 + n)));
        }
    }

    scheduler.shutdown(ShutdownMode::Graceful);
    assert_eq!(executions.load(Ordering::SeqCst), 1000);

    let stats = scheduler.stats();
    assert_eq!(stats.tasks_submitted, 1000);
    assert_eq!(stats.tasks_completed, 1000);
    assert_eq!(stats.tasks_resolved(), stats.tasks_submitted);
}

#[test]
fn test_fifo_start_order_single_worker() {
    let scheduler = scheduler_with(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let futures: Vec<_> = (0..50usize)
        .map(|i| {
            let started = started.clone();
            scheduler
                .submit(
                    "ordered",
                    move |i: usize| {
                        started.lock().push(i);
                        Ok::<_, String>(())
                    },
                    i,
                )
                .unwrap()
        })
        .collect();

    scheduler.shutdown(ShutdownMode::Graceful);
    for future in futures {
        future.wait().unwrap();
    }
    assert_eq!(*started.lock(), (0..50).collect::<Vec<_>>());
}

#[test]
fn test_pending_count_drains_monotonically() {
    let scheduler = scheduler_with(2);
    for i in 0..40u64 {
        scheduler
            .submit(
                "slow",
                |x: u64| {
                    thread::sleep(Duration::from_millis(2));
                    Ok::<_, String>(x)
                },
                i,
            )
            .unwrap();
    }

    let done = AtomicBool::new(false);
    let samples = thread::scope(|s| {
        let sampler = s.spawn(|| {
            let mut samples = Vec::new();
            while !done.load(Ordering::Acquire) {
                samples.push(scheduler.pending_count());
                thread::sleep(Duration::from_micros(200));
            }
            samples.push(scheduler.pending_count());
            samples
        });

        scheduler.shutdown(ShutdownMode::Graceful);
        done.store(true, Ordering::Release);
        sampler.join().unwrap()
    });

    assert!(samples.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(samples.last().copied(), Some(0));
}

#[test]
fn test_discard_shutdown_resolves_queued_with_pool_closed() {
    let scheduler = scheduler_with(1);
    let gate = Arc::new((Mutex::new(false), parking_lot::Condvar::new()));

    let in_flight = {
        let gate = gate.clone();
        scheduler
            .submit(
                "in-flight",
                move |_: ()| {
                    let (open, cvar) = &*gate;
                    let mut open = open.lock();
                    while !*open {
                        cvar.wait(&mut open);
                    }
                    Ok::<_, String>("finished")
                },
                (),
            )
            .unwrap()
    };

    // Wait until the only worker has picked up the in-flight task
    while scheduler.worker_states() != vec![WorkerState::Active] {
        thread::yield_now();
    }

    let queued: Vec<_> = (0..3)
        .map(|i| scheduler.submit("queued", |x: i32| Ok::<_, String>(x), i).unwrap())
        .collect();

    thread::scope(|s| {
        s.spawn(|| scheduler.shutdown(ShutdownMode::Discard));
        while scheduler.lifecycle() == Lifecycle::Running || scheduler.pending_count() > 0 {
            thread::yield_now();
        }
        let (open, cvar) = &*gate;
        *open.lock() = true;
        cvar.notify_all();
    });

    assert_eq!(scheduler.lifecycle(), Lifecycle::Terminated);
    assert_eq!(in_flight.wait(), Ok("finished"));
    for future in queued {
        assert_eq!(future.wait(), Err(SchedError::PoolClosed));
    }
    assert_eq!(scheduler.stats().tasks_aborted, 3);
}

#[test]
fn test_no_worker_left_running_after_shutdown() {
    let scheduler = scheduler_with(4);
    for i in 0..16u32 {
        scheduler.submit("noop", |x: u32| Ok::<_, String>(x), i).unwrap();
    }
    scheduler.shutdown(ShutdownMode::Graceful);

    let states = scheduler.worker_states();
    assert_eq!(states.len(), 4);
    assert!(states.iter().all(|s| *s == WorkerState::Terminated));
    assert_eq!(scheduler.stats().active_workers, 0);
}

#[test]
fn test_future_timeout_is_caller_driven() {
    let scheduler = scheduler_with(1);
    let future = scheduler
        .submit(
            "sleepy",
            |ms: u64| {
                thread::sleep(Duration::from_millis(ms));
                Ok::<_, String>(ms)
            },
            100,
        )
        .unwrap();

    assert!(!future.wait_timeout(Duration::from_millis(5)));
    assert_eq!(future.wait(), Ok(100));
}

#[test]
fn test_large_buffer_is_moved_to_worker() {
    let scheduler = scheduler_with(2);
    let buffer = vec![7u8; 64 * 1024];
    let ptr = buffer.as_ptr() as usize;

    let future = scheduler
        .submit(
            "checksum",
            move |buf: Vec<u8>| {
                let same_allocation = buf.as_ptr() as usize == ptr;
                let sum: u64 = buf.iter().map(|b| u64::from(*b)).sum();
                Ok::<_, String>((same_allocation, sum))
            },
            buffer,
        )
        .unwrap();

    assert_eq!(future.wait(), Ok((true, 7 * 64 * 1024)));
}

#[test]
fn test_task_reading_stats_during_shutdown_does_not_block_it() {
    let scheduler = Arc::new(scheduler_with(1));
    let inner = Arc::clone(&scheduler);

    let future = scheduler
        .submit(
            "observer",
            move |_: ()| {
                while inner.is_running() {
                    thread::sleep(Duration::from_millis(1));
                }
                let stats = inner.stats();
                let states = inner.worker_states();
                Ok::<_, String>((stats.active_workers, states))
            },
            (),
        )
        .unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let shutter = Arc::clone(&scheduler);
    thread::spawn(move || {
        shutter.shutdown(ShutdownMode::Graceful);
        let _ = done_tx.send(());
    });

    assert!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "shutdown blocked by a task reading stats"
    );
    assert_eq!(future.wait(), Ok((1, vec![WorkerState::Active])));
    assert_eq!(scheduler.lifecycle(), Lifecycle::Terminated);
    assert_eq!(scheduler.worker_states(), vec![WorkerState::Terminated]);
}
