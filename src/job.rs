//! The print job sequence.
//!
//! A job walks the printer through density, label type, start-print,
//! start-page, dimensions, optional quantity, the row stream, end-page and
//! the end-print handshake. Every control step requires an explicit ack;
//! image rows are fire-and-forget so the stream is limited only by
//! transport write latency. The first end-print reply usually reports the
//! paper still advancing, so the command is re-issued until the printer
//! confirms completion.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use tokio::time::{sleep, Duration, Instant};

use crate::error::{Error, Result};
use crate::model::LabelType;
use crate::packet::RequestCode;
use crate::raster::{Bitmap, Rotation, Threshold};
use crate::router::Channel;

/// Settle time between the last page and the end-print handshake.
const END_PRINT_SETTLE: Duration = Duration::from_millis(300);
const END_PRINT_INTERVAL: Duration = Duration::from_millis(100);
const END_PRINT_CAP: Duration = Duration::from_secs(20);

/// Parameters of one print job.
#[derive(Debug, Clone)]
pub struct PrintOptions {
    /// Thermal head darkness, 1..=max for the model.
    pub density: u8,
    pub label_type: LabelType,
    pub copies: u16,
    pub rotation: Rotation,
    pub threshold: Threshold,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            density: 3,
            label_type: LabelType::Gap,
            copies: 1,
            rotation: Rotation::None,
            threshold: Threshold::default(),
        }
    }
}

/// The step a printer rejection occurred at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStep {
    SetDensity,
    SetLabelType,
    StartPrint,
    StartPage,
    SetDimension,
    SetQuantity,
    EndPage,
    EndPrint,
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetDensity => "set-density",
            Self::SetLabelType => "set-label-type",
            Self::StartPrint => "start-print",
            Self::StartPage => "start-page",
            Self::SetDimension => "set-dimension",
            Self::SetQuantity => "set-quantity",
            Self::EndPage => "end-page",
            Self::EndPrint => "end-print",
        };
        f.write_str(name)
    }
}

/// Run one job to completion. On cancellation the printer is walked
/// through a best-effort end-page/end-print cleanup before returning.
pub(crate) async fn run(
    channel: &mut Channel,
    cancel: &Arc<AtomicBool>,
    bitmap: &Bitmap,
    options: &PrintOptions,
) -> Result<()> {
    match drive(channel, cancel, bitmap, options).await {
        Err(Error::Cancelled) => {
            // Clear the flag so the release commands still go out.
            cancel.store(false, Ordering::Relaxed);
            cleanup(channel).await;
            Err(Error::Cancelled)
        }
        other => other,
    }
}

async fn drive(
    channel: &mut Channel,
    cancel: &Arc<AtomicBool>,
    bitmap: &Bitmap,
    options: &PrintOptions,
) -> Result<()> {
    info!(
        "printing {}x{} at density {}, {} copies",
        bitmap.width, bitmap.height, options.density, options.copies
    );

    step(
        channel,
        cancel,
        RequestCode::SetLabelDensity,
        &[options.density],
        JobStep::SetDensity,
    )
    .await?;
    step(
        channel,
        cancel,
        RequestCode::SetLabelType,
        &[options.label_type as u8],
        JobStep::SetLabelType,
    )
    .await?;
    step(
        channel,
        cancel,
        RequestCode::StartPrint,
        &[0x01],
        JobStep::StartPrint,
    )
    .await?;
    step(
        channel,
        cancel,
        RequestCode::StartPagePrint,
        &[0x01],
        JobStep::StartPage,
    )
    .await?;

    let mut dimension = [0u8; 4];
    dimension[..2].copy_from_slice(&(bitmap.height as u16).to_be_bytes());
    dimension[2..].copy_from_slice(&(bitmap.width as u16).to_be_bytes());
    step(
        channel,
        cancel,
        RequestCode::SetDimension,
        &dimension,
        JobStep::SetDimension,
    )
    .await?;

    if options.copies > 1 {
        step(
            channel,
            cancel,
            RequestCode::SetQuantity,
            &options.copies.to_be_bytes(),
            JobStep::SetQuantity,
        )
        .await?;
    }

    for row in bitmap.rows() {
        check_cancel(cancel)?;
        channel.send(row.typ, &row.payload).await?;
    }
    debug!("streamed {} rows", bitmap.height);

    step(
        channel,
        cancel,
        RequestCode::EndPagePrint,
        &[0x01],
        JobStep::EndPage,
    )
    .await?;

    sleep(END_PRINT_SETTLE).await;
    end_print(channel, cancel).await
}

/// The printer acks end-print with zero while paper is still moving; keep
/// asking until it confirms, within a hard cap.
async fn end_print(channel: &mut Channel, cancel: &Arc<AtomicBool>) -> Result<()> {
    let deadline = Instant::now() + END_PRINT_CAP;
    loop {
        check_cancel(cancel)?;
        let reply = channel.transceive(RequestCode::EndPrint, &[0x01]).await?;
        if reply.ack() {
            info!("print complete");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::EndPrintTimeout);
        }
        sleep(END_PRINT_INTERVAL).await;
    }
}

async fn step(
    channel: &mut Channel,
    cancel: &Arc<AtomicBool>,
    req: RequestCode,
    payload: &[u8],
    at: JobStep,
) -> Result<()> {
    check_cancel(cancel)?;
    let reply = channel.transceive(req, payload).await?;
    if reply.ack() {
        Ok(())
    } else {
        Err(Error::Rejected(at))
    }
}

fn check_cancel(cancel: &Arc<AtomicBool>) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

async fn cleanup(channel: &mut Channel) {
    debug!("cancelled, releasing printer");
    let _ = channel.transceive(RequestCode::EndPagePrint, &[0x01]).await;
    let _ = channel.transceive(RequestCode::EndPrint, &[0x01]).await;
}
