use std::time::Duration;

use skyhand_fc::{FlightLink, LinkError, Refusal, SafetyGate, Verdict};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not connect to {link}: {source}")]
    ConnectionFailure {
        link: String,
        #[source]
        source: LinkError,
    },
    #[error("cannot fly: {0}")]
    CriticalBattery(Refusal),
    #[error("could not start the video stream: {0}")]
    Stream(#[source] LinkError),
    #[error("startup cancelled")]
    Cancelled,
}

/// Connect, check the battery, start video and wait out the calibration
/// delay. Returns the battery level read at connect, if any.
pub async fn startup(
    link: &mut dyn FlightLink,
    gate: &SafetyGate,
    calibration: Duration,
    cancel: &CancellationToken,
) -> Result<Option<u8>, StartupError> {
    info!("connecting to {}", link.describe());
    link.connect()
        .await
        .map_err(|source| StartupError::ConnectionFailure { link: link.describe(), source })?;

    let battery = match link.get_battery().await {
        Ok(b) => {
            info!("connected, battery {}%", b);
            Some(b)
        }
        Err(e) => {
            warn!("connected, battery unknown: {}", e);
            None
        }
    };

    if let Verdict::Refuse(r) = gate.check_connect(battery) {
        warn!("{}; charge the battery before flying", r);
        return Err(StartupError::CriticalBattery(r));
    }
    for w in gate.warnings(battery, None) {
        warn!("{}", w);
    }

    link.streamon().await.map_err(StartupError::Stream)?;
    info!("video stream on");

    if !calibration.is_zero() {
        info!("waiting {}s for sensor calibration", calibration.as_secs());
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = link.streamoff().await {
                    warn!("streamoff: {}", e);
                }
                return Err(StartupError::Cancelled);
            }
            _ = tokio::time::sleep(calibration) => {}
        }
    }

    info!("ready");
    Ok(battery)
}
