//! "now" and "later" task queues
//!
//! `now` runs a task immediately; `later` defers it to the next
//! [`TaskQueues::tick`]. Errors from both are collected and reported once
//! per tick, after every deferred task has run.

use crate::notify::{Level, Notifier};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// All errors collected during one tick.
#[derive(Debug, Error)]
#[error("{}", describe(errors))]
pub struct DeferredErrors {
    pub errors: Vec<anyhow::Error>,
}

fn describe(errors: &[anyhow::Error]) -> String {
    let mut out = format!("{} deferred task(s) failed", errors.len());
    for error in errors {
        out.push_str(&format!("\n  {error:#}"));
    }
    out
}

#[derive(Default)]
struct Queues {
    later: VecDeque<Task>,
    errors: Vec<anyhow::Error>,
}

/// Shared handle to the two queues.
///
/// Clones refer to the same queues, so tasks can enqueue more tasks.
/// Single-threaded: it lives on the host loop.
#[derive(Clone, Default)]
pub struct TaskQueues {
    inner: Rc<RefCell<Queues>>,
}

impl fmt::Debug for TaskQueues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TaskQueues")
            .field("later", &inner.later.len())
            .field("errors", &inner.errors.len())
            .finish()
    }
}

impl TaskQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` right away, keeping its error for the next report.
    pub fn now(&self, task: impl FnOnce() -> anyhow::Result<()>) {
        if let Err(e) = task() {
            self.inner.borrow_mut().errors.push(e);
        }
    }

    /// Queue `task` for the next tick.
    pub fn later(&self, task: impl FnOnce() -> anyhow::Result<()> + 'static) {
        self.inner.borrow_mut().later.push_back(Box::new(task));
    }

    /// Number of tasks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.inner.borrow().later.len()
    }

    /// Drain the later queue and report collected errors.
    ///
    /// Tasks queued while draining wait for the next tick.
    pub fn tick(&self, notifier: &mut dyn Notifier) -> Result<(), DeferredErrors> {
        let batch = std::mem::take(&mut self.inner.borrow_mut().later);

        for task in batch {
            // No borrow is held here; tasks may use this handle
            if let Err(e) = task() {
                self.inner.borrow_mut().errors.push(e);
            }
        }

        let errors = std::mem::take(&mut self.inner.borrow_mut().errors);
        if errors.is_empty() {
            return Ok(());
        }

        let report = DeferredErrors { errors };
        notifier.notify(&report.to_string(), Level::Error);
        Err(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;

    #[test]
    fn test_now_runs_inline() {
        let queues = TaskQueues::new();
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);
        queues.now(move || {
            *flag.borrow_mut() = true;
            Ok(())
        });
        assert!(*ran.borrow());
    }

    #[test]
    fn test_later_runs_in_fifo_order_on_tick() {
        let queues = TaskQueues::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            queues.later(move || {
                order.borrow_mut().push(i);
                Ok(())
            });
        }
        assert!(order.borrow().is_empty());

        let mut sink = MemoryNotifier::new();
        queues.tick(&mut sink).unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_failing_task_does_not_stop_others_and_reports_once() {
        let queues = TaskQueues::new();
        let ran = Rc::new(RefCell::new(0));

        queues.now(|| anyhow::bail!("inline"));
        let count = Rc::clone(&ran);
        queues.later(move || {
            *count.borrow_mut() += 1;
            anyhow::bail!("first")
        });
        let count = Rc::clone(&ran);
        queues.later(move || {
            *count.borrow_mut() += 1;
            Ok(())
        });

        let mut sink = MemoryNotifier::new();
        let err = queues.tick(&mut sink).unwrap_err();

        assert_eq!(*ran.borrow(), 2);
        assert_eq!(err.errors.len(), 2);
        let reported = sink.at(Level::Error);
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("inline"));
        assert!(reported[0].contains("first"));

        // Errors do not carry over
        assert!(queues.tick(&mut sink).is_ok());
        assert_eq!(sink.at(Level::Error).len(), 1);
    }

    #[test]
    fn test_tasks_queued_during_drain_run_next_tick() {
        let queues = TaskQueues::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let handle = queues.clone();
        let outer = Rc::clone(&order);
        queues.later(move || {
            outer.borrow_mut().push("outer");
            let inner = Rc::clone(&outer);
            handle.later(move || {
                inner.borrow_mut().push("inner");
                Ok(())
            });
            Ok(())
        });

        let mut sink = MemoryNotifier::new();
        queues.tick(&mut sink).unwrap();
        assert_eq!(*order.borrow(), vec!["outer"]);
        assert_eq!(queues.pending(), 1);

        queues.tick(&mut sink).unwrap();
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
    }
}
