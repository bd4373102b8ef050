pub mod calibration;
pub mod checksum;
pub mod command;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod i2c;
pub mod packet;
pub mod session;
pub mod timer;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-export the main entry points for easy access
pub use config::SessionConfig;
pub use device::{U3, WriteMode};
pub use error::LjError;
pub use session::DacSession;
pub use transport::{Transport, UsbTransport};
