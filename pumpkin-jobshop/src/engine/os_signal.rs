use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use pumpkin_solver::termination::TerminationCondition;

/// A [`TerminationCondition`] which triggers once the process receives SIGINT or SIGTERM.
///
/// Clones share the same flag, so one installation can serve every group of a decomposition.
#[derive(Clone, Debug)]
pub struct OsSignal {
    signal_received: Arc<AtomicBool>,
}

impl OsSignal {
    /// Create a termination and install the event listeners.
    pub fn install() -> std::io::Result<OsSignal> {
        // The signals to listen to for termination.
        const TERMINATION_SIGNALS: &[std::ffi::c_int] =
            &[signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM];

        let signal_termination = OsSignal::default();

        for &signal in TERMINATION_SIGNALS {
            let _ = signal_hook::flag::register(
                signal,
                Arc::clone(&signal_termination.signal_received),
            )?;
        }

        Ok(signal_termination)
    }

    /// Whether a termination signal has been received.
    pub fn is_triggered(&self) -> bool {
        self.signal_received.load(Ordering::Relaxed)
    }

    /// Trigger the condition as if a signal was received.
    pub fn trigger(&self) {
        self.signal_received.store(true, Ordering::Relaxed);
    }
}

impl Default for OsSignal {
    /// A condition without listeners, which only triggers through [`OsSignal::trigger`].
    fn default() -> Self {
        OsSignal {
            signal_received: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl TerminationCondition for OsSignal {
    fn should_stop(&mut self) -> bool {
        self.is_triggered()
    }
}
