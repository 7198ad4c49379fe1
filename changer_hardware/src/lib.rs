pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;
pub mod util;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use serial::SerialLineTransport;
pub use sim::{SimHandle, SimulatedChanger};
