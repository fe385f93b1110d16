//! What the bridge logs when the board prints something it cannot route.
mod common;

use boardlink::bridge::{DataEvent, UiBridge};
use boardlink::protocol::{Envelope, EnvelopeKind};
use common::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;

struct CapturedLog {
    records: Mutex<Vec<(Level, String, String)>>,
}

impl Log for CapturedLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {}
}

static CAPTURED: CapturedLog = CapturedLog {
    records: Mutex::new(Vec::new()),
};

fn warnings_mentioning(text: &str) -> Vec<String> {
    CAPTURED
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, target, msg)| {
            *level == Level::Warn && target.starts_with("boardlink::bridge") && msg.contains(text)
        })
        .map(|(_, _, msg)| msg.clone())
        .collect()
}

#[tokio::test]
async fn malformed_line_logs_exactly_one_warning() {
    log::set_logger(&CAPTURED).expect("only logger in this binary");
    log::set_max_level(LevelFilter::Warn);

    let dev = MockDevice::new(true);
    let (manager, lines, metrics) = spawn_mock_link(&dev, fast_options(3_600_000));
    let (bridge, _pump) = UiBridge::start(manager.handle(), lines, metrics.clone());
    let mut status = bridge.on_connection_status();
    assert!(wait_for_status(&mut status, true).await);
    let mut data = bridge.on_data();

    dev.feed_line("not valid json");
    dev.feed_line(r#"{"type":"telemetry","message":"ignored"}"#);
    dev.feed_line(r#"{"type":"info","message":"after"}"#);

    // Lines are routed in order, so both bad ones are done once this arrives.
    assert_eq!(
        next(&mut data).await,
        Some(DataEvent::Envelope(Envelope::new(EnvelopeKind::Info, "after")))
    );

    let warned = warnings_mentioning("not valid json");
    assert_eq!(warned.len(), 1, "{:?}", warned);
    assert!(warned[0].contains("malformed"), "{}", warned[0]);
    // Unknown types are skipped quietly.
    assert!(warnings_mentioning("telemetry").is_empty());
    assert_eq!(metrics.snapshot().lines_discarded, 2);

    manager.shutdown().await;
}
