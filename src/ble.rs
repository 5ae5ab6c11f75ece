//! BLE GATT transport.
//!
//! The printers expose a transparent-UART style service with a single
//! write+notify characteristic. Outbound frames must be fragmented to the
//! default ATT payload (MTU 23 − 3); inbound data arrives as notifications
//! which are drained into the router's parse buffer.

use std::pin::Pin;

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
    WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::future::FutureExt;
use futures::stream::{Stream, StreamExt};
use log::{debug, info};
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::router::POLL_INTERVAL;

/// Transparent-UART service the printers advertise.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2);
/// Write+notify data characteristic inside [`SERVICE_UUID`].
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xbef8d6c9_9c21_4c9e_b632_bd58c1009f9f);

/// Largest write the default ATT MTU of 23 can carry.
pub const MTU_CHUNK: usize = 20;

const SCAN_ROUNDS: u32 = 25;
const SCAN_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct BleConfig {
    /// Match by advertised name prefix (e.g. `"B1"`); when `None`, match
    /// by the advertised service instead.
    pub name_prefix: Option<String>,
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            name_prefix: None,
            service: SERVICE_UUID,
            characteristic: CHARACTERISTIC_UUID,
        }
    }
}

pub struct BleTransport {
    peripheral: Peripheral,
    characteristic: Characteristic,
    notifications: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
}

impl BleTransport {
    pub async fn open(config: &BleConfig) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::TransportUnavailable)?;

        adapter
            .start_scan(ScanFilter {
                services: vec![config.service],
            })
            .await?;
        let found = Self::discover(&adapter, config).await;
        adapter.stop_scan().await.ok();
        let peripheral = found.ok_or(Error::TransportUnavailable)?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == config.characteristic)
            .ok_or(Error::TransportUnavailable)?;
        peripheral.subscribe(&characteristic).await?;
        let notifications = peripheral.notifications().await?;
        info!("connected to {:?}", peripheral.id());

        Ok(BleTransport {
            peripheral,
            characteristic,
            notifications,
        })
    }

    async fn discover(
        adapter: &impl Central<Peripheral = Peripheral>,
        config: &BleConfig,
    ) -> Option<Peripheral> {
        for _ in 0..SCAN_ROUNDS {
            sleep(SCAN_INTERVAL).await;
            for peripheral in adapter.peripherals().await.ok()? {
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };
                let matched = match &config.name_prefix {
                    Some(prefix) => props
                        .local_name
                        .as_deref()
                        .is_some_and(|name| name.starts_with(prefix.as_str())),
                    None => props.services.contains(&config.service),
                };
                if matched {
                    debug!("found {:?}", props.local_name);
                    return Some(peripheral);
                }
            }
        }
        None
    }

    /// Write a frame as sequential MTU-sized fragments; the printer
    /// reassembles by its own framing.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        for chunk in bytes.chunks(MTU_CHUNK) {
            self.peripheral
                .write(&self.characteristic, chunk, WriteType::WithoutResponse)
                .await?;
        }
        Ok(())
    }

    /// Wait up to one polling interval for a notification, then sweep up
    /// anything else already queued.
    pub async fn drain(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if let Ok(Some(first)) = timeout(POLL_INTERVAL, self.notifications.next()).await {
            out.extend_from_slice(&first.value);
            while let Some(Some(more)) = self.notifications.next().now_or_never() {
                out.extend_from_slice(&more.value);
            }
        }
        Ok(out)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.peripheral.unsubscribe(&self.characteristic).await.ok();
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet;

    #[test]
    fn image_row_frame_fragments_as_20_20_20_18() {
        // 65 row bytes plus the 6-byte row header frame to 78 wire bytes.
        let payload = vec![0u8; 71];
        let frame = packet::encode(0x85, &payload).unwrap();
        assert_eq!(frame.len(), 78);
        let sizes: Vec<usize> = frame.chunks(MTU_CHUNK).map(<[u8]>::len).collect();
        assert_eq!(sizes, [20, 20, 20, 18]);
    }
}
