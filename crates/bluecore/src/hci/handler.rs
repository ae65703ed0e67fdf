//! Single-threaded dispatcher and command timeout alarm
//!
//! All core layer state is mutated from tasks posted to one [`Handler`].
//! Tasks run strictly FIFO, each to completion; there are no suspension
//! points inside a task. A task that panics is treated as a fatal fault and
//! brings the process down so a supervisor can observe the crash.

use log::error;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Serialized task queue backed by one dispatcher thread
#[derive(Clone)]
pub(crate) struct Handler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Handler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Task>();
        let thread = thread::spawn(move || {
            while let Ok(task) = receiver.recv() {
                if let Err(cause) = catch_unwind(AssertUnwindSafe(task)) {
                    error!("fatal error on HCI dispatcher: {}", panic_message(&cause));
                    std::process::abort();
                }
            }
        });

        Self {
            inner: Arc::new(HandlerInner {
                sender: Mutex::new(Some(sender)),
                thread: Mutex::new(Some(thread)),
            }),
        }
    }

    /// Post a task to the dispatcher. Posts after [`Handler::stop`] are
    /// silently dropped.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        let sender = self.inner.sender.lock().unwrap();
        if let Some(sender) = sender.as_ref() {
            let _ = sender.send(Box::new(task));
        }
    }

    /// Drain remaining tasks and join the dispatcher thread
    pub fn stop(&self) {
        let sender = self.inner.sender.lock().unwrap().take();
        drop(sender);
        let thread = self.inner.thread.lock().unwrap().take();
        if let Some(thread) = thread {
            let _ = thread.join();
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// One-shot deadline timer bound to a [`Handler`]
///
/// At most one callback is scheduled at a time; re-scheduling replaces the
/// previous one. Expiry posts the callback onto the handler, and a
/// generation counter guarantees that a cancelled or replaced schedule never
/// fires, even when cancellation races with expiry.
pub(crate) struct Alarm {
    inner: Arc<AlarmInner>,
    worker: Option<thread::JoinHandle<()>>,
}

struct AlarmInner {
    state: Mutex<AlarmState>,
    changed: Condvar,
}

struct AlarmState {
    scheduled: Option<Scheduled>,
    generation: u64,
    shutdown: bool,
}

struct Scheduled {
    deadline: Instant,
    task: Task,
    posted: bool,
}

impl Alarm {
    pub fn new(handler: Handler) -> Self {
        let inner = Arc::new(AlarmInner {
            state: Mutex::new(AlarmState {
                scheduled: None,
                generation: 0,
                shutdown: false,
            }),
            changed: Condvar::new(),
        });

        let worker = {
            let inner = Arc::clone(&inner);
            thread::spawn(move || Alarm::run(inner, handler))
        };

        Self {
            inner,
            worker: Some(worker),
        }
    }

    fn run(inner: Arc<AlarmInner>, handler: Handler) {
        let mut guard = inner.state.lock().unwrap();
        loop {
            if guard.shutdown {
                return;
            }

            let state = &mut *guard;
            let mut wait_for = None;
            if let Some(scheduled) = state.scheduled.as_mut() {
                if !scheduled.posted {
                    let now = Instant::now();
                    if scheduled.deadline <= now {
                        scheduled.posted = true;
                        let generation = state.generation;
                        let fire_inner = Arc::clone(&inner);
                        handler.post(move || Alarm::fire(fire_inner, generation));
                        continue;
                    }
                    wait_for = Some(scheduled.deadline - now);
                }
            }

            guard = match wait_for {
                Some(timeout) => inner.changed.wait_timeout(guard, timeout).unwrap().0,
                None => inner.changed.wait(guard).unwrap(),
            };
        }
    }

    // Runs on the handler thread. The generation check makes cancellation
    // synchronous with respect to handler tasks.
    fn fire(inner: Arc<AlarmInner>, generation: u64) {
        let task = {
            let mut state = inner.state.lock().unwrap();
            if state.generation != generation {
                return;
            }
            state.scheduled.take().map(|scheduled| scheduled.task)
        };
        if let Some(task) = task {
            task();
        }
    }

    /// Schedule the task to run on the handler after `delay`, replacing any
    /// previously scheduled task
    pub fn schedule(&self, delay: Duration, task: Task) {
        let mut state = self.inner.state.lock().unwrap();
        state.generation += 1;
        state.scheduled = Some(Scheduled {
            deadline: Instant::now() + delay,
            task,
            posted: false,
        });
        self.inner.changed.notify_one();
    }

    /// Cancel the scheduled task, if any
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.generation += 1;
        state.scheduled = None;
        self.inner.changed.notify_one();
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
            state.scheduled = None;
            self.inner.changed.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handler_runs_tasks_in_post_order() {
        let handler = Handler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            handler.post(move || order.lock().unwrap().push(i));
        }
        handler.stop();

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn handler_drains_pending_tasks_on_stop() {
        let handler = Handler::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let count = Arc::clone(&count);
            handler.post(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        handler.stop();

        assert_eq!(count.load(Ordering::SeqCst), 100);
        // Posts after stop are dropped, not an error
        handler.post(|| unreachable!());
    }

    #[test]
    fn alarm_fires_after_delay() {
        let handler = Handler::new();
        let alarm = Alarm::new(handler.clone());
        let (tx, rx) = mpsc::channel();

        alarm.schedule(
            Duration::from_millis(20),
            Box::new(move || tx.send(()).unwrap()),
        );

        rx.recv_timeout(Duration::from_secs(5))
            .expect("alarm did not fire");
        drop(alarm);
        handler.stop();
    }

    #[test]
    fn cancelled_alarm_does_not_fire() {
        let handler = Handler::new();
        let alarm = Alarm::new(handler.clone());
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = Arc::clone(&fired);
        alarm.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        alarm.cancel();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        drop(alarm);
        handler.stop();
    }

    #[test]
    fn reschedule_replaces_previous_task() {
        let handler = Handler::new();
        let alarm = Alarm::new(handler.clone());
        let (tx, rx) = mpsc::channel();

        let tx_first = tx.clone();
        alarm.schedule(
            Duration::from_millis(20),
            Box::new(move || tx_first.send("first").unwrap()),
        );
        alarm.schedule(
            Duration::from_millis(40),
            Box::new(move || tx.send("second").unwrap()),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "second");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(alarm);
        handler.stop();
    }
}
