//! Maps `Box<dyn Error>` from trait boundaries to typed `ChangerError`.
//!
//! `changer_traits::Transport` uses `Box<dyn Error + Send + Sync>`; this module
//! converts those to the transport error kind, with an optional feature-gated
//! path for `changer_hardware::HwError` downcasting.

use crate::error::{ChangerError, ErrorKind};

/// Map a trait-boundary error to a typed `ChangerError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ChangerError {
    #[cfg(feature = "hardware-errors")]
    {
        use changer_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            let msg = match hw {
                HwError::NotOpen => "serial port not open (initialize the link first)".to_string(),
                HwError::Disconnected => "bridge disconnected".to_string(),
                HwError::Timeout => "bridge did not answer in time".to_string(),
                other => other.to_string(),
            };
            return ChangerError::new(ErrorKind::Transport(msg));
        }
    }

    ChangerError::new(ErrorKind::Transport(e.to_string()))
}
