//! Observer hooks and their fault isolation.
//!
//! Hooks are plain closures supplied by the caller. A hook that panics is
//! caught, logged and counted; it never changes how the item that triggered
//! it is classified, and it never stops the run.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::operation::OperationError;
use crate::progress::MigrationProgress;

/// Invoked after every settled item with a snapshot of the summary.
pub type ProgressHook = Arc<dyn Fn(&MigrationProgress) + Send + Sync>;

/// Invoked once per item that exhausted its retries.
pub type ErrorHook = Arc<dyn Fn(&OperationError, &Value) + Send + Sync>;

#[derive(Default)]
pub(crate) struct CallbackDispatch {
    on_progress: Option<ProgressHook>,
    on_error: Option<ErrorHook>,
    faults: usize,
}

impl CallbackDispatch {
    pub(crate) fn new(on_progress: Option<ProgressHook>, on_error: Option<ErrorHook>) -> Self {
        Self {
            on_progress,
            on_error,
            faults: 0,
        }
    }

    pub(crate) fn progress(&mut self, snapshot: &MigrationProgress) {
        if let Some(hook) = &self.on_progress {
            let hook = Arc::clone(hook);
            let snapshot = *snapshot;
            self.isolate("on_progress", || hook(&snapshot));
        }
    }

    pub(crate) fn error(&mut self, error: &OperationError, item: &Value) {
        if let Some(hook) = &self.on_error {
            let hook = Arc::clone(hook);
            self.isolate("on_error", || hook(error, item));
        }
    }

    pub(crate) fn faults(&self) -> usize {
        self.faults
    }

    fn isolate(&mut self, hook: &'static str, call: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(call)) {
            self.faults += 1;
            warn!(
                hook,
                panic = %panic_message(payload.as_ref()),
                "migration hook panicked; continuing"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[test]
    fn test_progress_hook_receives_snapshot() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_hook = Arc::clone(&seen);
        let hook: ProgressHook = Arc::new(move |progress: &MigrationProgress| {
            seen_hook.store(progress.processed, Ordering::SeqCst);
        });

        let mut dispatch = CallbackDispatch::new(Some(hook), None);
        let mut progress = MigrationProgress::new(4);
        progress.processed = 2;
        progress.successful = 2;
        dispatch.progress(&progress);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(dispatch.faults(), 0);
    }

    #[test]
    fn test_panicking_hooks_are_counted_not_propagated() {
        let progress_hook: ProgressHook = Arc::new(|_: &MigrationProgress| panic!("boom"));
        let error_hook: ErrorHook =
            Arc::new(|_: &OperationError, _: &Value| panic!("{}", String::from("owned boom")));

        let mut dispatch = CallbackDispatch::new(Some(progress_hook), Some(error_hook));
        dispatch.progress(&MigrationProgress::new(1));
        dispatch.error(&OperationError::Timeout, &json!({"id": 1}));

        assert_eq!(dispatch.faults(), 2);
    }

    #[test]
    fn test_missing_hooks_are_noops() {
        let mut dispatch = CallbackDispatch::default();
        dispatch.progress(&MigrationProgress::new(1));
        dispatch.error(&OperationError::Timeout, &json!(null));
        assert_eq!(dispatch.faults(), 0);
    }
}
