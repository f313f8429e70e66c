use super::core::Waitable;
use crate::error::SmpResult;
use crate::event::EventSource;
use crate::scan::ScanReport;
use crate::smp::TimeoutSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Resolves with the collected [`ScanReport`] once the scan times out
#[derive(Debug)]
pub struct ScanFinishedWaitable {
    waitable: Waitable<ScanReport>,
}

impl ScanFinishedWaitable {
    pub fn new(timeouts: &EventSource<TimeoutSource>, report: Arc<Mutex<ScanReport>>) -> Self {
        let waitable = Waitable::from_event_map(timeouts, move |src: &TimeoutSource| {
            if *src == TimeoutSource::Scan {
                Some(report.lock().clone())
            } else {
                None
            }
        });
        Self { waitable }
    }

    pub fn wait(self, timeout: Option<Duration>, fail_on_timeout: bool) -> SmpResult<Option<ScanReport>> {
        self.waitable.wait(timeout, fail_on_timeout)
    }

    pub fn then<F>(self, callback: F) -> Self
    where
        F: FnOnce(ScanReport) + Send + 'static,
    {
        Self {
            waitable: self.waitable.then(callback),
        }
    }
}
