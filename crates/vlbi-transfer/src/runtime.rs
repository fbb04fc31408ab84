use std::sync::{mpsc, Mutex};

use crate::{error::ModeError, mode::TransferMode, submode::TransferSubmode};

/// A worker panic, converted from a `catch_unwind` at the top of a chain
/// step's closure into an event on the runtime's error channel instead of
/// tearing down the process.
#[derive(Debug, Clone)]
pub struct StepFault {
    pub step: u32,
    pub step_name: String,
    pub message: String,
}

/// Owns the current [`TransferMode`] and [`TransferSubmode`], the
/// admission rule that guards transitions, and the error channel chain
/// workers report panics to. Building and starting the actual `Chain` for
/// a mode is the caller's job (it depends on the mode); `Runtime` only
/// tracks the state machine around it. A handler is expected to:
/// 1. call `request` (the admission rule),
/// 2. configure its own runtime parameters,
/// 3. build and start its chain,
/// 4. call `begin`/`run`/`pause` to record the submode transition,
/// 5. register `finish` as the chain's finalizer so the mode clears back
///    to idle exactly once the chain's workers have all joined.
pub struct Runtime {
    mode: Mutex<TransferMode>,
    submode: Mutex<TransferSubmode>,
    fault_tx: mpsc::Sender<StepFault>,
    fault_rx: Mutex<mpsc::Receiver<StepFault>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        let (fault_tx, fault_rx) = mpsc::channel();
        Self { mode: Mutex::new(TransferMode::NoTransfer), submode: Mutex::new(TransferSubmode::empty()), fault_tx, fault_rx: Mutex::new(fault_rx) }
    }

    pub fn mode(&self) -> TransferMode {
        *self.mode.lock().unwrap()
    }

    pub fn submode(&self) -> TransferSubmode {
        *self.submode.lock().unwrap()
    }

    pub fn is_idle(&self) -> bool {
        self.mode() == TransferMode::NoTransfer
    }

    /// Admission rule: a request for `requested` is granted iff the
    /// runtime is idle, or the request is a query (queries don't touch
    /// the shared resource a running mode holds), or `requested` is the
    /// currently running mode's own continuation command.
    pub fn request(&self, requested: TransferMode, is_query: bool) -> Result<(), ModeError> {
        let current = self.mode();
        if current == TransferMode::NoTransfer || is_query || requested == current {
            return Ok(());
        }
        Err(ModeError::Busy { current })
    }

    /// `open`: admits the transition, sets the mode, and marks the
    /// submode `CONNECTED | WAIT`.
    pub fn begin(&self, requested: TransferMode) -> Result<(), ModeError> {
        self.request(requested, false)?;
        *self.mode.lock().unwrap() = requested;
        *self.submode.lock().unwrap() = TransferSubmode::CONNECTED | TransferSubmode::WAIT;
        Ok(())
    }

    /// `on`: moves a connected, waiting transfer into `RUN`.
    pub fn run(&self) -> Result<(), ModeError> {
        if self.is_idle() {
            return Err(ModeError::AlreadyIdle);
        }
        let mut sm = self.submode.lock().unwrap();
        sm.remove(TransferSubmode::WAIT);
        sm.insert(TransferSubmode::RUN);
        Ok(())
    }

    /// `pause`: suspends a running transfer without releasing the mode.
    pub fn pause(&self) -> Result<(), ModeError> {
        if self.is_idle() {
            return Err(ModeError::AlreadyIdle);
        }
        let mut sm = self.submode.lock().unwrap();
        sm.remove(TransferSubmode::RUN);
        sm.insert(TransferSubmode::PAUSE);
        Ok(())
    }

    /// `off`/`close`: releases the mode back to idle. Safe to call as a
    /// chain finalizer even after a `close` command already did so.
    pub fn finish(&self) {
        *self.mode.lock().unwrap() = TransferMode::NoTransfer;
        *self.submode.lock().unwrap() = TransferSubmode::empty();
    }

    /// Marks the submode `BROKEN` without releasing the mode, so `error?`
    /// can report a live fault on a transfer that's still technically
    /// open until the user issues `close`.
    pub fn mark_broken(&self) {
        self.submode.lock().unwrap().insert(TransferSubmode::BROKEN);
    }

    pub fn fault_sender(&self) -> mpsc::Sender<StepFault> {
        self.fault_tx.clone()
    }

    /// Drains the most recent fault without blocking, for the control
    /// protocol's `error?` query.
    pub fn last_fault(&self) -> Option<StepFault> {
        self.fault_rx.lock().unwrap().try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rule_allows_queries_and_continuations_while_busy() {
        let rt = Runtime::new();
        rt.begin(TransferMode::Disk2Net).unwrap();

        assert!(rt.request(TransferMode::Net2Disk, true).is_ok());
        assert!(rt.request(TransferMode::Disk2Net, false).is_ok());
        assert!(matches!(rt.request(TransferMode::Net2Disk, false), Err(ModeError::Busy { .. })));
    }

    #[test]
    fn full_lifecycle_returns_to_idle() {
        let rt = Runtime::new();
        rt.begin(TransferMode::Net2File).unwrap();
        assert!(rt.submode().contains(TransferSubmode::CONNECTED | TransferSubmode::WAIT));

        rt.run().unwrap();
        assert!(rt.submode().contains(TransferSubmode::RUN));
        assert!(!rt.submode().contains(TransferSubmode::WAIT));

        rt.finish();
        assert!(rt.is_idle());
        assert_eq!(rt.submode(), TransferSubmode::empty());
    }

    #[test]
    fn on_while_idle_is_rejected() {
        let rt = Runtime::new();
        assert!(matches!(rt.run(), Err(ModeError::AlreadyIdle)));
    }

    #[test]
    fn fault_reported_through_the_error_channel_survives_the_mode() {
        let rt = Runtime::new();
        rt.begin(TransferMode::Disk2Net).unwrap();
        rt.fault_sender()
            .send(StepFault { step: 2, step_name: "writer".into(), message: "disk full".into() })
            .unwrap();
        rt.mark_broken();

        assert!(rt.submode().contains(TransferSubmode::BROKEN));
        let fault = rt.last_fault().unwrap();
        assert_eq!(fault.message, "disk full");
        assert!(rt.last_fault().is_none());
    }
}
