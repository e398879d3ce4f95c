use std::net::UdpSocket;

use crate::classifier::PauseReason;
use crate::config::constants;
use crate::error::error_kind;

/// Identity of the machine running the monitor, included in every email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// `user@hostname`
    pub name: String,
    /// Local address of the outbound interface, or "Unavailable".
    pub ip: String,
}

impl DeviceInfo {
    /// Detect the current user, hostname and outbound IP address.
    ///
    /// Never fails: an unknown hostname is reported as "unknown" and an
    /// undeterminable address as "Unavailable".
    pub fn detect() -> Self {
        let user = whoami::username();
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            name: format!("{}@{}", user, host),
            ip: local_ip(constants::IP_PROBE_ADDR),
        }
    }
}

/// Best-effort local IP address of the interface that routes to `probe`.
///
/// A UDP socket is connected toward `probe` and its local endpoint is read
/// back. UDP `connect` only selects a route, so no packet leaves the host.
pub fn local_ip(probe: &str) -> String {
    let lookup = || -> std::io::Result<String> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(probe)?;
        Ok(socket.local_addr()?.ip().to_string())
    };
    lookup().unwrap_or_else(|_| constants::IP_UNAVAILABLE.to_string())
}

/// Current local time as `YYYY-MM-DD HH:MM:SS`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A rendered email: subject and plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    /// Sent when a print finishes.
    pub fn print_complete(device: &DeviceInfo, line: &str) -> Self {
        Self {
            subject: "✅ Klipper Print Finished".to_string(),
            body: format!(
                "Your printer has completed a print.\n\n{}\nLog line:\n{}\n",
                device_block(device),
                line
            ),
        }
    }

    /// Sent on the first pause after start-up or after a resume.
    pub fn print_paused(device: &DeviceInfo, reason: PauseReason, line: &str) -> Self {
        Self {
            subject: "🛑 Klipper Print Paused".to_string(),
            body: format!(
                "Your printer has paused.\n\n{}\nLikely reason: {}\n\nLog line:\n{}\n",
                device_block(device),
                reason,
                line
            ),
        }
    }

    /// Sent once the shutdown collection window closes.
    pub fn print_failed(device: &DeviceInfo, lines: &[String]) -> Self {
        Self {
            subject: "❌ Klipper Print Failed".to_string(),
            body: format!(
                "Your printer has stopped due to an error.\n\n{}\nCollected log lines:\n{}\n",
                device_block(device),
                lines.join("\n")
            ),
        }
    }

    /// Sent for every line matching a custom keyword.
    pub fn custom_match(device: &DeviceInfo, line: &str) -> Self {
        Self {
            subject: "❓ Klipper Log Match (Custom Keyword)".to_string(),
            body: format!(
                "Your printer log matched a custom keyword.\n\n{}\nMatched line:\n{}\n",
                device_block(device),
                line
            ),
        }
    }

    /// Report an error that stopped the monitor itself.
    pub fn script_error(device: &DeviceInfo, error: &anyhow::Error) -> Self {
        Self {
            subject: "⚠️ Printer Monitor Script Error".to_string(),
            body: format!(
                "The printer monitor stopped because of an error and is no longer watching the log.\n\n{}\nError: {}: {}\n\nDetails:\n{:?}\n",
                device_block(device),
                error_kind(error),
                error,
                error
            ),
        }
    }
}

fn device_block(device: &DeviceInfo) -> String {
    format!(
        "Device: {}\nIP: {}\nTime: {}\n",
        device.name,
        device.ip,
        timestamp()
    )
}
