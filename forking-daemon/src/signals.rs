use crate::state::TerminationFlag;
use log::info;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::io;

/// Makes SIGTERM and SIGINT set the termination flag.
///
/// The handlers only store into the atomic; the supervisor notices on its next
/// loop iteration, at most one socket timeout later.
pub fn register_termination_signals(termination: &TerminationFlag) -> io::Result<()> {
    for signal in [SIGTERM, SIGINT] {
        signal_hook::flag::register(signal, termination.shared())?;
    }
    info!("Signals: SIGTERM and SIGINT request a drain");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_succeeds() {
        let flag = TerminationFlag::new();
        register_termination_signals(&flag).unwrap();
        assert!(!flag.is_requested());
    }
}
