use anyhow::Result;
use log::info;

use printer_monitor::{
    CategoriesConfig, Config, DeviceInfo, EventLog, LogTailer, Monitor, Outcome, SmtpNotifier,
    SystemClock, report_fatal,
};

/// Printer Monitor - email alerts from a Klipper log.
///
/// Follows the Klipper log from its current end and reports, per the
/// category document, print completions, pauses, resumes, shutdowns and
/// custom keyword matches. Monitoring stops after the first completion or
/// shutdown; run it under a service manager to start it again.
///
/// # Environment Variables
///
/// Required:
/// * `SMTP_EMAIL` - SMTP login, also used as the sender address
/// * `SMTP_PASS` - SMTP password
/// * `SMTP_TO` - Recipient of every notification
///
/// Optional (with defaults):
/// * `KLIPPY_LOG` - Klipper log to follow (default: "printer_data/logs/klippy.log")
/// * `MONITOR_CONFIG` - Category document (default: "printer_monitor_config.toml")
/// * `MONITOR_EVENT_LOG` - Event log (default: "monitor_events.log")
/// * `SMTP_SERVER` - SMTP relay (default: "smtp.gmail.com")
/// * `SMTP_PORT` - SMTP port (default: "587")
///
/// # Usage
///
/// ```bash
/// export SMTP_EMAIL="printer@gmail.com"
/// export SMTP_PASS="app-password"
/// export SMTP_TO="me@example.com"
/// export KLIPPY_LOG="$HOME/printer_data/logs/klippy.log"
/// ./printer-monitor
/// ```
fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    info!("Printer monitor starting...");

    // Startup failures abort before monitoring begins
    let config = Config::load()?;
    let categories = CategoriesConfig::load(&config.categories_file)?;
    let notifier = SmtpNotifier::new(&config.smtp)?;
    let event_log = EventLog::new(config.event_log_file.clone());
    let device = DeviceInfo::detect();

    info!("Device: {} ({})", device.name, device.ip);
    info!("Using category config: {}", config.categories_file.display());
    info!("Recording events to: {}", config.event_log_file.display());

    let result = LogTailer::open(&config.log_file).and_then(|tailer| {
        info!("Following {}", tailer.path().display());
        Monitor::new(
            tailer,
            &categories,
            &notifier,
            &event_log,
            device.clone(),
            SystemClock,
        )
        .run()
    });

    match result {
        Ok(Outcome::Completed { line }) => {
            info!("Monitoring finished after print completion: {}", line);
            Ok(())
        }
        Ok(Outcome::Failed { lines }) => {
            info!(
                "Monitoring finished after printer shutdown ({} line(s) reported)",
                lines.len()
            );
            Ok(())
        }
        Err(err) => {
            report_fatal(&err, &event_log, &notifier, &device);
            Err(err)
        }
    }
}
