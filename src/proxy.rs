//! # Owner Proxy
//!
//! Single-worker task queue that owns the owner runtime's object. The object
//! is built on the worker thread by a factory and never leaves it; every
//! access goes through a job submitted with [`OwnerProxy::notify`] (or the
//! closure helpers built on it). Jobs run one at a time in FIFO order.
//!
//! ```text
//! host threads ──notify(dispatch, discard, ctx)──→ bounded queue ──→ owner thread
//!                     │                                                │
//!                     └─ Rejected { ctx } on failure    dispatch(&mut owner, ctx)
//!                                                       or, after shutdown,
//!                                                       discard(&mut owner, ctx)
//! ```
//!
//! A rejected submission hands its context back to the caller unrun, so the
//! caller decides where the context is released. An accepted submission
//! always reaches the owner exactly once: through `dispatch` while the proxy
//! runs, or through `discard` when the owner thread shuts down before the job
//! got its turn.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("owner proxy is no longer accepting work")]
    Closed,
    #[error("owner queue is full")]
    QueueFull,
    #[error("owner thread did not reply in time")]
    Timeout,
    #[error("blocking call issued from the owner thread")]
    Reentrant,
}

impl ProxyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProxyError::Closed => ErrorCode::SessionClosed,
            ProxyError::QueueFull | ProxyError::Timeout => ErrorCode::Timeout,
            ProxyError::Reentrant => ErrorCode::Generic,
        }
    }
}

/// A submission the proxy refused, carrying the unrun context back.
#[derive(Debug)]
pub struct Rejected<C> {
    pub error: ProxyError,
    pub context: C,
}

trait Job<O>: Send {
    fn run(self: Box<Self>, owner: &mut O);
    fn discard(self: Box<Self>, owner: &mut O);
    fn into_context(self: Box<Self>) -> Box<dyn Any + Send>;
}

struct Notification<O, C> {
    dispatch: fn(&mut O, C),
    discard: fn(&mut O, C),
    context: C,
}

impl<O: 'static, C: Send + 'static> Job<O> for Notification<O, C> {
    fn run(self: Box<Self>, owner: &mut O) {
        (self.dispatch)(owner, self.context)
    }

    fn discard(self: Box<Self>, owner: &mut O) {
        (self.discard)(owner, self.context)
    }

    fn into_context(self: Box<Self>) -> Box<dyn Any + Send> {
        Box::new(self.context)
    }
}

enum Envelope<O> {
    Job(Box<dyn Job<O>>),
    Stop,
}

impl<C: 'static> Rejected<C> {
    fn recover<O>(error: ProxyError, envelope: Envelope<O>) -> Self {
        let context = match envelope {
            Envelope::Job(job) => job.into_context().downcast::<C>(),
            Envelope::Stop => unreachable!("stop marker is never submitted through notify"),
        };
        match context {
            Ok(context) => Rejected {
                error,
                context: *context,
            },
            Err(_) => unreachable!("rejected job carries the submitted context type"),
        }
    }
}

struct ProxyShared {
    name: String,
    accepting: AtomicBool,
    stop_requested: AtomicBool,
    // Held shared across the accepting check and the enqueue; taken exclusively
    // before the final drain so nothing lands behind it.
    submit_gate: RwLock<()>,
    owner_thread: OnceLock<ThreadId>,
}

/// Owner-side handle to the proxy state.
///
/// Handed to the owner factory so the owner runtime can stop accepting work
/// on its own, e.g. when it is tearing down.
#[derive(Clone)]
pub struct ProxyControl {
    shared: Arc<ProxyShared>,
}

impl ProxyControl {
    pub fn stop_accepting(&self) {
        if self.shared.accepting.swap(false, Ordering::AcqRel) {
            info!(proxy = %self.shared.name, "Owner proxy stopped accepting work");
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::Acquire)
    }

    pub fn is_owner_thread(&self) -> bool {
        self.shared.owner_thread.get() == Some(&thread::current().id())
    }
}

impl std::fmt::Debug for ProxyControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyControl")
            .field("proxy", &self.shared.name)
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

pub struct OwnerProxy<O: 'static> {
    sender: Sender<Envelope<O>>,
    control: ProxyControl,
    worker: Mutex<Option<JoinHandle<()>>>,
    notify_timeout: Duration,
    call_timeout: Duration,
}

impl<O: 'static> OwnerProxy<O> {
    /// Start the owner thread and build the owner object on it.
    pub fn spawn<F>(config: &BridgeConfig, factory: F) -> Result<Self, BridgeError>
    where
        F: FnOnce(ProxyControl) -> O + Send + 'static,
    {
        config.validate()?;

        let (sender, receiver) = channel::bounded(config.queue_capacity);
        let control = ProxyControl {
            shared: Arc::new(ProxyShared {
                name: config.owner_thread_name.clone(),
                accepting: AtomicBool::new(true),
                stop_requested: AtomicBool::new(false),
                submit_gate: RwLock::new(()),
                owner_thread: OnceLock::new(),
            }),
        };

        let worker_control = control.clone();
        let worker = thread::Builder::new()
            .name(config.owner_thread_name.clone())
            .spawn(move || run_owner_loop(worker_control, receiver, factory))?;

        debug!(
            proxy = %config.owner_thread_name,
            queue_capacity = config.queue_capacity,
            "Owner proxy spawned"
        );

        Ok(Self {
            sender,
            control,
            worker: Mutex::new(Some(worker)),
            notify_timeout: config.notify_timeout(),
            call_timeout: config.call_timeout(),
        })
    }

    /// Submit `dispatch(owner, context)` for execution on the owner thread.
    ///
    /// Blocks at most `notify_timeout` when the queue is full. On failure
    /// neither function will ever run and the context is returned. On
    /// success exactly one of them runs on the owner thread: `dispatch` in
    /// queue order, or `discard` if the owner thread stops first.
    pub fn notify<C: Send + 'static>(
        &self,
        dispatch: fn(&mut O, C),
        discard: fn(&mut O, C),
        context: C,
    ) -> Result<(), Rejected<C>> {
        let _gate = self.control.shared.submit_gate.read();
        if !self.control.is_accepting() {
            return Err(Rejected {
                error: ProxyError::Closed,
                context,
            });
        }

        let job: Box<dyn Job<O>> = Box::new(Notification {
            dispatch,
            discard,
            context,
        });
        match self.sender.send_timeout(Envelope::Job(job), self.notify_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(envelope)) => {
                warn!(
                    proxy = %self.control.shared.name,
                    timeout_ms = self.notify_timeout.as_millis(),
                    "Owner queue full, submission rejected"
                );
                Err(Rejected::recover(ProxyError::QueueFull, envelope))
            }
            Err(SendTimeoutError::Disconnected(envelope)) => {
                Err(Rejected::recover(ProxyError::Closed, envelope))
            }
        }
    }

    /// Run a closure on the owner thread without waiting for it.
    pub fn execute<F>(&self, f: F) -> Result<(), ProxyError>
    where
        F: FnOnce(&mut O) + Send + 'static,
    {
        self.notify(|owner: &mut O, f: F| f(owner), |_: &mut O, f: F| drop(f), f)
            .map_err(|rejected| rejected.error)
    }

    /// Run a closure on the owner thread and wait for its result.
    pub fn call<R, F>(&self, f: F) -> Result<R, ProxyError>
    where
        R: Send + 'static,
        F: FnOnce(&mut O) -> R + Send + 'static,
    {
        if self.control.is_owner_thread() {
            return Err(ProxyError::Reentrant);
        }

        let (reply_tx, reply_rx) = channel::bounded(1);
        self.execute(move |owner| {
            let _ = reply_tx.send(f(owner));
        })?;

        reply_rx
            .recv_timeout(self.call_timeout)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => ProxyError::Timeout,
                // The job was discarded unrun during shutdown.
                RecvTimeoutError::Disconnected => ProxyError::Closed,
            })
    }

    pub fn is_accepting(&self) -> bool {
        self.control.is_accepting()
    }

    pub fn is_owner_thread(&self) -> bool {
        self.control.is_owner_thread()
    }

    pub fn control(&self) -> ProxyControl {
        self.control.clone()
    }

    /// Stop accepting work and shut the owner thread down.
    ///
    /// Jobs already queued run before the thread exits. Called from the owner
    /// thread itself, the loop stops after the current job and the rest of the
    /// queue is discarded.
    pub fn close(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        self.control.shared.accepting.store(false, Ordering::Release);

        if self.control.is_owner_thread() {
            self.control
                .shared
                .stop_requested
                .store(true, Ordering::Release);
            debug!(
                proxy = %self.control.shared.name,
                "Owner proxy closed from the owner thread"
            );
            return;
        }

        // The worker keeps draining, so this send always makes progress.
        let _ = self.sender.send(Envelope::Stop);
        if worker.join().is_err() {
            error!(
                proxy = %self.control.shared.name,
                "Owner thread panicked before shutdown"
            );
        }
    }
}

impl<O: 'static> Drop for OwnerProxy<O> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<O: 'static> std::fmt::Debug for OwnerProxy<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerProxy")
            .field("proxy", &self.control.shared.name)
            .field("accepting", &self.control.is_accepting())
            .field("queued", &self.sender.len())
            .finish()
    }
}

fn run_owner_loop<O, F>(control: ProxyControl, receiver: Receiver<Envelope<O>>, factory: F)
where
    F: FnOnce(ProxyControl) -> O,
{
    let shared = Arc::clone(&control.shared);
    let _ = shared.owner_thread.set(thread::current().id());

    let mut owner = factory(control);
    info!(proxy = %shared.name, "Owner thread started");

    let mut executed: u64 = 0;
    while !shared.stop_requested.load(Ordering::Acquire) {
        match receiver.recv() {
            Ok(Envelope::Job(job)) => {
                job.run(&mut owner);
                executed += 1;
            }
            Ok(Envelope::Stop) | Err(_) => break,
        }
    }

    {
        let _gate = shared.submit_gate.write();
        shared.accepting.store(false, Ordering::Release);
    }

    let mut discarded = 0usize;
    while let Ok(envelope) = receiver.try_recv() {
        if let Envelope::Job(job) = envelope {
            job.discard(&mut owner);
            discarded += 1;
        }
    }
    if discarded > 0 {
        warn!(
            proxy = %shared.name,
            discarded,
            "Discarded jobs left in the queue at shutdown"
        );
    }

    drop(owner);
    info!(proxy = %shared.name, executed, "Owner thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        seen: Vec<u32>,
        thread: Option<ThreadId>,
    }

    fn test_config() -> BridgeConfig {
        BridgeConfig::default()
            .with_owner_thread_name("proxy-test-owner")
            .with_call_timeout(Duration::from_secs(2))
    }

    fn spawn_counter(config: &BridgeConfig) -> OwnerProxy<Counter> {
        OwnerProxy::spawn(config, |_| Counter {
            thread: Some(thread::current().id()),
            ..Counter::default()
        })
        .unwrap()
    }

    fn push(counter: &mut Counter, value: u32) {
        counter.seen.push(value);
    }

    fn skip(_: &mut Counter, _: u32) {}

    fn report_run(_: &mut Counter, tx: channel::Sender<&'static str>) {
        let _ = tx.send("ran");
    }

    fn report_discard(_: &mut Counter, tx: channel::Sender<&'static str>) {
        let _ = tx.send("discarded");
    }

    #[test]
    fn jobs_run_in_submission_order_on_owner_thread() {
        let proxy = spawn_counter(&test_config());
        for i in 0..10 {
            proxy.notify(push, skip, i).unwrap();
        }

        let (seen, owner_thread, observed) = proxy
            .call(|c| (c.seen.clone(), c.thread, thread::current().id()))
            .unwrap();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(owner_thread, Some(observed));
        assert_ne!(observed, thread::current().id());
        assert!(!proxy.is_owner_thread());
    }

    #[test]
    fn notify_after_close_returns_context() {
        let proxy = spawn_counter(&test_config());
        proxy.close();
        assert!(!proxy.is_accepting());

        let rejected = proxy.notify(push, skip, 7).unwrap_err();
        assert_eq!(rejected.error, ProxyError::Closed);
        assert_eq!(rejected.context, 7);
    }

    #[test]
    fn owner_can_stop_accepting() {
        let proxy = spawn_counter(&test_config());
        let control = proxy.control();
        control.stop_accepting();

        let rejected = proxy.notify(push, skip, 1).unwrap_err();
        assert_eq!(rejected.error, ProxyError::Closed);
        assert_eq!(proxy.call(|_| ()), Err(ProxyError::Closed));
    }

    #[test]
    fn full_queue_rejects_after_timeout() {
        let config = test_config()
            .with_queue_capacity(1)
            .with_notify_timeout(Duration::from_millis(200));
        let proxy = spawn_counter(&config);

        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let (started_tx, started_rx) = channel::bounded::<()>(0);
        proxy
            .execute(move |_| {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            })
            .unwrap();
        started_rx.recv().unwrap();

        // Fills the single slot while the owner is blocked.
        proxy.notify(push, skip, 1).unwrap();
        let rejected = proxy.notify(push, skip, 2).unwrap_err();
        assert_eq!(rejected.error, ProxyError::QueueFull);
        assert_eq!(rejected.context, 2);

        release_tx.send(()).unwrap();
        assert_eq!(proxy.call(|c| c.seen.clone()).unwrap(), vec![1]);
    }

    #[test]
    fn queued_jobs_run_before_shutdown() {
        let proxy = spawn_counter(&test_config());
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            proxy
                .execute(move |_| {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        proxy.close();
        assert_eq!(ran.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn owner_is_dropped_on_owner_thread() {
        struct Tracked(crossbeam::channel::Sender<ThreadId>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                let _ = self.0.send(thread::current().id());
            }
        }

        let (tx, rx) = channel::unbounded();
        let proxy = OwnerProxy::spawn(&test_config(), move |_| Tracked(tx)).unwrap();
        let owner_thread = proxy.call(|_| thread::current().id()).unwrap();
        drop(proxy);

        assert_eq!(rx.recv().unwrap(), owner_thread);
    }

    #[test]
    fn close_from_owner_thread_does_not_deadlock() {
        let proxy = Arc::new(spawn_counter(&test_config()));
        let inner = Arc::clone(&proxy);
        let (done_tx, done_rx) = channel::bounded(1);
        proxy
            .execute(move |_| {
                inner.close();
                assert_eq!(inner.call(|_| ()), Err(ProxyError::Reentrant));
                let _ = done_tx.send(());
            })
            .unwrap();

        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!proxy.is_accepting());
    }

    #[test]
    fn jobs_queued_behind_owner_side_close_are_discarded_once() {
        let proxy = Arc::new(spawn_counter(&test_config()));
        let inner = Arc::clone(&proxy);
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let (started_tx, started_rx) = channel::bounded::<()>(0);
        proxy
            .execute(move |_| {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
                inner.close();
            })
            .unwrap();
        started_rx.recv().unwrap();

        let (tx, rx) = channel::unbounded();
        proxy.notify(report_run, report_discard, tx).unwrap();
        release_tx.send(()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok("discarded"));
        // The context was consumed by the discard hook, so its sender is gone.
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
    }

    #[test]
    fn accepted_jobs_run_before_host_side_close() {
        let proxy = spawn_counter(&test_config());
        let (tx, rx) = channel::unbounded();
        for _ in 0..3 {
            proxy.notify(report_run, report_discard, tx.clone()).unwrap();
        }
        drop(tx);
        proxy.close();

        assert_eq!(rx.iter().collect::<Vec<_>>(), vec!["ran"; 3]);
    }
}
