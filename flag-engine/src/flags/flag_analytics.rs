use std::sync::Mutex;

/// A caller was shown a variant of a multivariate flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureEvent {
    pub flag_key: String,
    pub variant: String,
    pub identifier: String,
}

/// Receives experiment exposure events. Implementations must not block: the
/// engine calls this on the evaluation hot path.
pub trait ExposureSink: Send + Sync {
    fn record_exposure(&self, event: ExposureEvent);
}

#[derive(Debug, Default)]
pub struct NoopExposureSink;

impl ExposureSink for NoopExposureSink {
    fn record_exposure(&self, _event: ExposureEvent) {}
}

/// Keeps every event in memory. Handy for tests and for batching callers that
/// drain it periodically.
#[derive(Debug, Default)]
pub struct BufferedExposureSink {
    events: Mutex<Vec<ExposureEvent>>,
}

impl BufferedExposureSink {
    pub fn drain(&self) -> Vec<ExposureEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ExposureSink for BufferedExposureSink {
    fn record_exposure(&self, event: ExposureEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
