//! Batched update scheduling.
//!
//! Every reactive side effect (a binding observer announcing a change, an
//! array observer flushing splices) is queued here and drained in one pass,
//! normally once per animation frame. Tasks run in FIFO order; a task queued
//! while a drain is running joins that drain.

use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use trellis_core::{Error, Result};

/// Drained slots are compacted away once this many have been consumed.
const UPDATE_QUEUE_CAPACITY: usize = 1024;

/// A reusable unit of work that can be queued more than once.
pub trait Callable {
    fn call(&self) -> Result<()>;
}

/// A queued unit of work.
pub enum Task {
    Shared(Rc<dyn Callable>),
    Once(Box<dyn FnOnce() -> Result<()>>),
}

impl Task {
    fn run(self) -> Result<()> {
        match self {
            Task::Shared(callable) => callable.call(),
            Task::Once(f) => f(),
        }
    }
}

/// How queued work is drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    /// Drain on the next frame requested from the update host.
    #[default]
    Async,
    /// Drain immediately when the first task of a batch is queued.
    Sync,
}

/// The environment that drives draining and surfaces task errors.
pub trait UpdateHost {
    /// Arranges for [`process_updates`] to run on the next frame.
    fn request_frame(&self);

    /// Called for each error captured during a drain, after it has been
    /// added to the pending list.
    fn report_error(&self, _error: &Error) {}
}

/// Host for native embedders, which call [`process_updates`] themselves.
#[derive(Debug, Default)]
pub struct ManualHost;

impl UpdateHost for ManualHost {
    fn request_frame(&self) {
        tracing::trace!("frame requested; waiting for process_updates");
    }
}

#[cfg(target_arch = "wasm32")]
mod frame {
    use super::{process_updates, throw_first_error, UpdateHost};
    use trellis_core::Error;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;

    /// Drives draining from `requestAnimationFrame` and rethrows task
    /// errors from `setTimeout` callbacks.
    pub struct AnimationFrameHost {
        on_frame: Closure<dyn FnMut(f64)>,
        on_timeout: Closure<dyn FnMut()>,
    }

    impl AnimationFrameHost {
        pub fn new() -> Self {
            Self {
                on_frame: Closure::new(|_: f64| process_updates()),
                on_timeout: Closure::new(|| {
                    if let Err(error) = throw_first_error() {
                        let error = js_sys::Error::new(&error.to_string());
                        wasm_bindgen::throw_val(error.into());
                    }
                }),
            }
        }
    }

    impl Default for AnimationFrameHost {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UpdateHost for AnimationFrameHost {
        fn request_frame(&self) {
            if let Some(window) = web_sys::window() {
                let _ = window.request_animation_frame(self.on_frame.as_ref().unchecked_ref());
            }
        }

        fn report_error(&self, _error: &Error) {
            if let Some(window) = web_sys::window() {
                let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                    self.on_timeout.as_ref().unchecked_ref(),
                    0,
                );
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use frame::AnimationFrameHost;

thread_local! {
    static QUEUE: RefCell<Vec<Option<Task>>> = const { RefCell::new(Vec::new()) };
    static PENDING_ERRORS: RefCell<Vec<Error>> = const { RefCell::new(Vec::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
    static MODE: Cell<UpdateMode> = const { Cell::new(UpdateMode::Async) };
    static HOST: RefCell<Option<Rc<dyn UpdateHost>>> = const { RefCell::new(None) };
}

fn default_host() -> Rc<dyn UpdateHost> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(AnimationFrameHost::new())
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(ManualHost)
    }
}

fn host() -> Rc<dyn UpdateHost> {
    HOST.with(|host| host.borrow_mut().get_or_insert_with(default_host).clone())
}

/// Replaces the host used to request frames and report errors.
pub fn set_update_host(host: Rc<dyn UpdateHost>) {
    HOST.with(|slot| *slot.borrow_mut() = Some(host));
}

/// Switches between frame-batched and immediate draining.
pub fn set_update_mode(mode: UpdateMode) {
    MODE.with(|m| m.set(mode));
}

pub fn update_mode() -> UpdateMode {
    MODE.with(Cell::get)
}

/// Queues a one-shot task.
pub fn queue_update<F>(task: F)
where
    F: FnOnce() -> Result<()> + 'static,
{
    enqueue(Task::Once(Box::new(task)));
}

/// Queues a shared callable.
pub fn queue_callable(callable: Rc<dyn Callable>) {
    enqueue(Task::Shared(callable));
}

fn enqueue(task: Task) {
    let was_empty = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        let was_empty = queue.is_empty();
        queue.push(Some(task));
        was_empty
    });

    if !was_empty || DRAINING.with(Cell::get) {
        return;
    }

    match update_mode() {
        UpdateMode::Sync => process_updates(),
        UpdateMode::Async => host().request_frame(),
    }
}

/// Number of tasks waiting to run.
pub fn pending_update_count() -> usize {
    QUEUE.with(|queue| queue.borrow().iter().filter(|t| t.is_some()).count())
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|d| d.set(false));
    }
}

/// Runs every queued task, including tasks queued while draining.
///
/// A failing task does not stop the drain; its error is kept in the
/// pending list and handed to the update host.
pub fn process_updates() {
    if DRAINING.with(Cell::get) {
        return;
    }
    DRAINING.with(|d| d.set(true));
    let _guard = DrainGuard;

    let mut index = 0;
    let mut ran = 0usize;
    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().get_mut(index).map(Option::take));
        let task = match next {
            Some(Some(task)) => task,
            Some(None) => {
                index += 1;
                continue;
            }
            None => break,
        };

        if let Err(error) = task.run() {
            record_error(error);
        }
        index += 1;
        ran += 1;

        if index > UPDATE_QUEUE_CAPACITY {
            QUEUE.with(|queue| {
                queue.borrow_mut().drain(..index);
            });
            index = 0;
        }
    }

    QUEUE.with(|queue| queue.borrow_mut().clear());
    tracing::trace!(tasks = ran, "processed updates");
}

fn record_error(error: Error) {
    tracing::error!(%error, "update task failed");
    PENDING_ERRORS.with(|pending| pending.borrow_mut().push(error.clone()));
    host().report_error(&error);
}

/// Removes and returns the oldest pending task error.
pub fn throw_first_error() -> Result<()> {
    let first = PENDING_ERRORS.with(|pending| {
        let mut pending = pending.borrow_mut();
        if pending.is_empty() {
            None
        } else {
            Some(pending.remove(0))
        }
    });
    match first {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Removes and returns every pending task error.
pub fn take_pending_errors() -> Vec<Error> {
    PENDING_ERRORS.with(|pending| std::mem::take(&mut *pending.borrow_mut()))
}

/// Resolves after the next drain reaches this point in the queue.
pub fn next_update() -> impl Future<Output = ()> {
    let (sender, receiver) = oneshot::channel();
    queue_update(move || {
        let _ = sender.send(());
        Ok(())
    });
    async move {
        let _ = receiver.await;
    }
}
