use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use printer_monitor::*;

/// Line source fed from a script; `None` entries simulate "nothing new yet".
#[derive(Clone, Default)]
struct ScriptedSource {
    items: Rc<RefCell<VecDeque<Option<String>>>>,
}

impl ScriptedSource {
    fn line(self, line: &str) -> Self {
        self.items.borrow_mut().push_back(Some(line.to_string()));
        self
    }

    fn gaps(self, count: usize) -> Self {
        for _ in 0..count {
            self.items.borrow_mut().push_back(None);
        }
        self
    }

    fn remaining(&self) -> usize {
        self.items.borrow().len()
    }
}

impl LineSource for ScriptedSource {
    fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        Ok(self.items.borrow_mut().pop_front().flatten())
    }
}

/// Clock that only moves when slept on.
#[derive(Clone)]
struct ManualClock {
    start: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
    }
}

/// Records every message; fails category emails when `fail` is set.
#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn subjects(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|(s, _)| s.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_email(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .borrow_mut()
            .push((subject.to_string(), body.to_string()));
        if self.fail && !subject.contains("Script Error") {
            anyhow::bail!("smtp relay unreachable");
        }
        Ok(())
    }
}

fn rule(keywords: &[&str], notify: bool, log: bool) -> CategoryRule {
    CategoryRule {
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        notify,
        log,
    }
}

fn categories() -> CategoriesConfig {
    CategoriesConfig {
        complete: rule(&["complete"], true, true),
        pause: rule(&["paused"], true, true),
        resume: rule(&["resuming"], false, true),
        error: rule(&["shutdown"], true, true),
        custom: rule(&["timer too close"], true, true),
    }
}

fn device() -> DeviceInfo {
    DeviceInfo {
        name: "tester@bench".to_string(),
        ip: "Unavailable".to_string(),
    }
}

fn event_lines(log: &EventLog) -> Vec<String> {
    match std::fs::read_to_string(log.path()) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

fn tagged(log: &EventLog, tag: &str) -> Vec<String> {
    let marker = format!("] [{}] ", tag);
    event_lines(log)
        .into_iter()
        .filter_map(|l| l.split_once(&marker).map(|(_, m)| m.to_string()))
        .collect()
}

fn event_log_in(dir: &Path) -> EventLog {
    EventLog::new(dir.join("monitor_events.log"))
}

#[test]
fn test_shutdown_line_sends_one_email_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let source = ScriptedSource::default().line("Klippy Shutdown");
    let clock = ManualClock::new();

    let outcome = Monitor::new(source, &categories(), &notifier, &log, device(), clock.clone())
        .run()
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Failed {
            lines: vec!["Klippy Shutdown".to_string()]
        }
    );
    assert_eq!(notifier.subjects(), ["❌ Klipper Print Failed"]);
    assert_eq!(tagged(&log, "ERROR"), ["Klippy Shutdown"]);
    assert_eq!(clock.elapsed(), Duration::from_secs(5));
}

#[test]
fn test_complete_notifies_once_and_stops_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let source = ScriptedSource::default()
        .line("Stats 10.0: gcodein=0")
        .line("print complete")
        .line("print complete")
        .line("MCU timer too close");

    let outcome = Monitor::new(
        source.clone(),
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    )
    .run()
    .unwrap();

    assert_eq!(
        outcome,
        Outcome::Completed {
            line: "print complete".to_string()
        }
    );
    let subjects = notifier.subjects();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("Finished"));
    assert_eq!(source.remaining(), 2, "no line after the completion is read");
    assert_eq!(tagged(&log, "COMPLETE"), ["print complete"]);
}

#[test]
fn test_resume_rearms_pause_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let source = ScriptedSource::default()
        .line("paused for user")
        .line("resuming print")
        .line("paused for user");

    let mut monitor = Monitor::new(
        source,
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    );
    for _ in 0..3 {
        assert_eq!(monitor.step().unwrap(), None);
    }
    assert!(monitor.state().paused_sent);

    let subjects = notifier.subjects();
    assert_eq!(subjects.len(), 2);
    assert!(subjects.iter().all(|s| s == "🛑 Klipper Print Paused"));
    assert_eq!(tagged(&log, "RESUME"), ["resuming print"]);
    assert_eq!(tagged(&log, "PAUSE").len(), 2);
}

#[test]
fn test_repeated_pause_is_debounced() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let source = ScriptedSource::default()
        .line("// action: paused by macro")
        .line("paused again")
        .line("still paused");

    let mut monitor = Monitor::new(
        source,
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    );
    for _ in 0..3 {
        monitor.step().unwrap();
    }

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Likely reason: Klipper pause command"));
    assert_eq!(tagged(&log, "PAUSE"), ["// action: paused by macro"]);
}

#[test]
fn test_resume_without_pause_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let source = ScriptedSource::default().line("resuming print");

    let mut monitor = Monitor::new(
        source,
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    );
    assert_eq!(monitor.step().unwrap(), None);
    assert_eq!(monitor.state(), TailState::default());
    assert!(notifier.subjects().is_empty());
}

#[test]
fn test_suppressed_pause_line_is_not_reclassified() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let source = ScriptedSource::default()
        .line("paused")
        .line("paused during shutdown");

    let mut monitor = Monitor::new(
        source,
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    );
    assert_eq!(monitor.step().unwrap(), None);
    assert_eq!(monitor.step().unwrap(), None);
    assert_eq!(notifier.subjects().len(), 1);
    assert!(tagged(&log, "ERROR").is_empty());
}

#[test]
fn test_collection_window_keeps_shutdown_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let clock = ManualClock::new();
    let source = ScriptedSource::default()
        .line("MCU 'mcu' shutdown: Timer too close")
        .line("Transition to shutdown state: MCU 'mcu' shutdown")
        .line("Stats 200.1: gcodein=0")
        .gaps(1)
        .line("Klippy SHUTDOWN state reached")
        .line("Dumping gcode input")
        .gaps(49)
        .line("shutdown seen after the window");

    let outcome = Monitor::new(
        source.clone(),
        &categories(),
        &notifier,
        &log,
        device(),
        clock.clone(),
    )
    .run()
    .unwrap();

    let expected = vec![
        "MCU 'mcu' shutdown: Timer too close".to_string(),
        "Transition to shutdown state: MCU 'mcu' shutdown".to_string(),
        "Klippy SHUTDOWN state reached".to_string(),
    ];
    assert_eq!(
        outcome,
        Outcome::Failed {
            lines: expected.clone()
        }
    );
    assert_eq!(clock.elapsed(), Duration::from_secs(5));
    assert_eq!(source.remaining(), 1);

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains(&format!("Collected log lines:\n{}\n", expected.join("\n"))));
    assert_eq!(tagged(&log, "ERROR"), expected);
}

#[test]
fn test_error_with_reporting_disabled_skips_window() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let clock = ManualClock::new();
    let mut config = categories();
    config.error.notify = false;
    config.error.log = false;
    let source = ScriptedSource::default().line("Klippy Shutdown");

    let outcome = Monitor::new(source, &config, &notifier, &log, device(), clock.clone())
        .run()
        .unwrap();

    assert!(matches!(outcome, Outcome::Failed { .. }));
    assert_eq!(clock.elapsed(), Duration::ZERO);
    assert!(notifier.subjects().is_empty());
    assert!(event_lines(&log).is_empty());
}

#[test]
fn test_custom_matches_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let mut config = categories();
    config.custom.notify = false;
    let source = ScriptedSource::default()
        .line("Timer too close")
        .line("timer TOO close")
        .line("ok 1")
        .line("timer too close");

    let mut monitor = Monitor::new(
        source,
        &config,
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    );
    for _ in 0..4 {
        assert_eq!(monitor.step().unwrap(), None);
    }

    assert!(notifier.subjects().is_empty());
    assert_eq!(tagged(&log, "CUSTOM").len(), 3);
}

#[test]
fn test_idle_poll_sleeps_half_a_second() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::default();
    let clock = ManualClock::new();
    let source = ScriptedSource::default().gaps(2);

    let mut monitor = Monitor::new(source, &categories(), &notifier, &log, device(), clock.clone());
    monitor.step().unwrap();
    monitor.step().unwrap();

    assert_eq!(clock.elapsed(), Duration::from_millis(1000));
}

#[test]
fn test_send_failure_reaches_fatal_report() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let notifier = RecordingNotifier::failing();
    let source = ScriptedSource::default().line("MCU timer too close");

    let err = Monitor::new(
        source,
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    )
    .run()
    .unwrap_err();

    // The failed send happens before the CUSTOM record is written.
    assert!(tagged(&log, "CUSTOM").is_empty());

    report_fatal(&err, &log, &notifier, &device());

    assert_eq!(
        tagged(&log, "SCRIPT_ERROR"),
        ["Exception occurred: Error: smtp relay unreachable"]
    );
    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].0.contains("Script Error"));
    assert!(sent[1].1.contains("smtp relay unreachable"));
    assert!(sent[1].1.contains("Device: tester@bench"));
}

#[test]
fn test_tails_real_file_from_its_end() {
    let dir = tempfile::tempdir().unwrap();
    let log = event_log_in(dir.path());
    let klippy = dir.path().join("klippy.log");
    std::fs::write(&klippy, "print complete (from an earlier run)\n").unwrap();

    let notifier = RecordingNotifier::default();
    let tailer = LogTailer::open(&klippy).unwrap();
    let mut monitor = Monitor::new(
        tailer,
        &categories(),
        &notifier,
        &log,
        device(),
        ManualClock::new(),
    );
    assert_eq!(monitor.step().unwrap(), None);

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&klippy)
        .unwrap();
    writeln!(file, "Filament runout! paused").unwrap();
    writeln!(file, "Done: print complete").unwrap();

    assert_eq!(monitor.step().unwrap(), None);
    assert_eq!(
        monitor.step().unwrap(),
        Some(Outcome::Completed {
            line: "Done: print complete".to_string()
        })
    );

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("Likely reason: Filament runout detected"));
    assert!(sent[1].0.contains("Finished"));
}
