// src/notify.rs

//! Failure notifications.
//!
//! Delivery is an external collaborator concern; the engine only
//! decides *when* to notify and hands the run to a [`Notifier`]. The
//! default implementation records the dispatch in the log, which is
//! where operators without a configured mail relay will look anyway.

use crate::db::models::{WorkflowRun, WorkflowSchedule};
use crate::error::Result;
use tracing::warn;

/// Capability interface for dispatching failure notifications
pub trait Notifier {
    fn notify_failure(&self, schedule: &WorkflowSchedule, run: &WorkflowRun) -> Result<()>;
}

/// Notifier that records the dispatch in the engine log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, schedule: &WorkflowSchedule, run: &WorkflowRun) -> Result<()> {
        warn!(
            schedule = %schedule.name,
            run_id = run.id.unwrap_or(0),
            status = run.status.as_str(),
            email = schedule.notify_email.as_deref().unwrap_or("<none>"),
            error = run.error_message.as_deref().unwrap_or(""),
            "workflow run failed; notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Notifier that records every dispatch for assertions
    pub struct RecordingNotifier {
        pub notified: RefCell<Vec<(i64, String)>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self {
                notified: RefCell::new(Vec::new()),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify_failure(&self, schedule: &WorkflowSchedule, run: &WorkflowRun) -> Result<()> {
            self.notified
                .borrow_mut()
                .push((schedule.id.unwrap_or(0), run.status.as_str().to_string()));
            Ok(())
        }
    }
}
