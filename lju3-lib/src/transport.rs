//! Byte-level link to a device.
//!
//! The protocol layer only needs "write these bytes" and "read up to this many
//! bytes". Short transfers are reported through the returned length and judged
//! by the caller.

use crate::constants::{ENDPOINT_IN, ENDPOINT_OUT, VID};
use crate::error::LjError;
use async_trait::async_trait;
use bytes::Bytes;
use nusb::{Interface, transfer::RequestBuffer};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Transport: Send {
    /// Write `data`, returning how many bytes went out.
    async fn write(&mut self, data: &[u8]) -> Result<usize, LjError>;

    /// Read at most `max_len` bytes.
    async fn read(&mut self, max_len: usize) -> Result<Bytes, LjError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, data: &[u8]) -> Result<usize, LjError> {
        (**self).write(data).await
    }

    async fn read(&mut self, max_len: usize) -> Result<Bytes, LjError> {
        (**self).read(max_len).await
    }
}

/// Bulk-endpoint transport to a LabJack over USB.
pub struct UsbTransport {
    interface: Interface,
    timeout: Duration,
}

impl UsbTransport {
    /// Open the first LabJack with the given product id.
    pub fn open(product_id: u16) -> Result<Self, LjError> {
        info!("Searching for LabJack product {}...", product_id);
        let mut matching: Vec<_> = nusb::list_devices()?
            .filter(|d| d.vendor_id() == VID && d.product_id() == product_id)
            .collect();
        if matching.len() > 1 {
            info!("Found {} matching devices, using the first.", matching.len());
        }
        if matching.is_empty() {
            return Err(LjError::DeviceNotFound(product_id));
        }
        let device_info = matching.swap_remove(0);

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );
        if let Some(serial) = device_info.serial_number() {
            debug!(serial, "USB serial string");
        }

        let device = device_info.open()?;
        let interface = device.detach_and_claim_interface(0)?;
        info!("Interface claimed successfully.");

        Ok(Self {
            interface,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Per-transfer timeout. Expiry surfaces as [`LjError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for UsbTransport {
    async fn write(&mut self, data: &[u8]) -> Result<usize, LjError> {
        debug!(bytes = hex::encode(data), "USB Write");
        let transfer = self.interface.bulk_out(ENDPOINT_OUT, data.to_vec());
        let completion = timeout(self.timeout, transfer).await?;
        let sent = completion.into_result()?;
        Ok(sent.actual_length())
    }

    async fn read(&mut self, max_len: usize) -> Result<Bytes, LjError> {
        let transfer = self.interface.bulk_in(ENDPOINT_IN, RequestBuffer::new(max_len));
        let completion = timeout(self.timeout, transfer).await?;
        let data = completion.into_result()?;
        debug!(bytes = hex::encode(&data), "USB Read");
        Ok(Bytes::from(data))
    }
}
