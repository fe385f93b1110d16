//! Test utilities & fixtures.
//! An in-memory serial device standing in for the board, a counting port enumerator,
//! and small async helpers for waiting on subscriptions.
#![allow(dead_code)] // Each test binary uses a different subset.

use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardlink::events::Subscription;
use boardlink::metrics::LinkMetrics;
use boardlink::serial::{
    DeviceDescriptor, Discovery, DiscoveryError, LinkHalves, LinkHandle, LinkManager,
    LinkOptions, LinkState, MatchPolicy, PortEnumerator, PortOpener,
};
use tokio::sync::mpsc;

pub const MOCK_PATH: &str = "/dev/ttyMOCK0";

type Chunk = Result<Vec<u8>, ErrorKind>;

/// Fake board. `present` controls whether opens succeed; each successful open gets a
/// fresh inbound feed that [`MockDevice::feed`] writes into.
#[derive(Default)]
pub struct MockDevice {
    present: AtomicBool,
    fail_writes: AtomicBool,
    feed: Mutex<Option<std_mpsc::Sender<Chunk>>>,
    written: Mutex<Vec<u8>>,
    opens: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    open_delay: Mutex<Duration>,
}

impl MockDevice {
    pub fn new(present: bool) -> Arc<Self> {
        let dev = MockDevice::default();
        dev.present.store(present, Ordering::SeqCst);
        Arc::new(dev)
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Push raw bytes to the reader of the current connection.
    pub fn feed(&self, bytes: &[u8]) {
        if let Some(tx) = self.feed.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(bytes.to_vec()));
        }
    }

    pub fn feed_line(&self, line: &str) {
        self.feed(format!("{}\n", line).as_bytes());
    }

    /// Make the current connection's next read fail with a hard error.
    pub fn fail_read(&self) {
        if let Some(tx) = self.feed.lock().unwrap().as_ref() {
            let _ = tx.send(Err(ErrorKind::BrokenPipe));
        }
    }

    /// Drop the inbound feed so the reader sees EOF. The board stays openable.
    pub fn close_stream(&self) {
        self.feed.lock().unwrap().take();
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub struct MockOpener {
    pub device: Arc<MockDevice>,
}

impl PortOpener for MockOpener {
    fn open(&self, path: &str, _baud_rate: u32) -> io::Result<LinkHalves> {
        let dev = &self.device;
        dev.opens.fetch_add(1, Ordering::SeqCst);
        let now = dev.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        dev.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *dev.open_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        dev.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !dev.present.load(Ordering::SeqCst) {
            return Err(io::Error::new(ErrorKind::NotFound, format!("{} not present", path)));
        }
        let (tx, rx) = std_mpsc::channel();
        *dev.feed.lock().unwrap() = Some(tx);
        Ok(LinkHalves {
            reader: Box::new(MockReader {
                rx,
                pending: Vec::new(),
            }),
            writer: Box::new(MockWriter {
                device: dev.clone(),
            }),
        })
    }
}

struct MockReader {
    rx: std_mpsc::Receiver<Chunk>,
    pending: Vec<u8>,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_millis(20)) {
                Ok(Ok(bytes)) => self.pending = bytes,
                Ok(Err(kind)) => return Err(io::Error::new(kind, "mock read failure")),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(ErrorKind::TimedOut, "no data"))
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct MockWriter {
    device: Arc<MockDevice>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.device.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "mock write failure"));
        }
        self.device.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Enumerator with a fixed port list that counts how often it is asked.
#[derive(Default)]
pub struct StaticEnumerator {
    pub ports: Vec<DeviceDescriptor>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl StaticEnumerator {
    pub fn new(ports: Vec<DeviceDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            ports,
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortEnumerator for StaticEnumerator {
    fn list(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DiscoveryError::Backend("udev unavailable".into()));
        }
        Ok(self.ports.clone())
    }
}

pub fn usb_port(path: &str, manufacturer: &str, vid: &str, pid: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        path: path.to_string(),
        manufacturer: Some(manufacturer.to_string()),
        vendor_id: Some(vid.to_string()),
        product_id: Some(pid.to_string()),
    }
}

/// Link options with a short poll so reconnect behaviour shows up quickly.
pub fn fast_options(interval_ms: u64) -> LinkOptions {
    LinkOptions {
        reconnect_interval: Duration::from_millis(interval_ms),
        ..LinkOptions::default()
    }
}

/// Spawn a link pointed at the mock device through an override path.
pub fn spawn_mock_link(
    device: &Arc<MockDevice>,
    options: LinkOptions,
) -> (LinkManager, mpsc::UnboundedReceiver<String>, Arc<LinkMetrics>) {
    let metrics = Arc::new(LinkMetrics::new());
    let discovery = Discovery::new(
        Some(MOCK_PATH.to_string()),
        MatchPolicy::default(),
        StaticEnumerator::new(Vec::new()),
    );
    let opener = Arc::new(MockOpener {
        device: device.clone(),
    });
    let (manager, lines) = LinkManager::spawn(options, discovery, opener, metrics.clone());
    (manager, lines, metrics)
}

/// Spawn a link that finds the mock device through port enumeration.
pub fn spawn_discovering_link(
    device: &Arc<MockDevice>,
    enumerator: Arc<StaticEnumerator>,
    options: LinkOptions,
) -> (LinkManager, mpsc::UnboundedReceiver<String>, Arc<LinkMetrics>) {
    let metrics = Arc::new(LinkMetrics::new());
    let discovery = Discovery::new(None, MatchPolicy::default(), enumerator);
    let opener = Arc::new(MockOpener {
        device: device.clone(),
    });
    let (manager, lines) = LinkManager::spawn(options, discovery, opener, metrics.clone());
    (manager, lines, metrics)
}

/// Next value from a subscription, or `None` after two seconds.
pub async fn next<T>(sub: &mut Subscription<T>) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .ok()
        .flatten()
}

/// Wait for `want` on a status subscription, skipping other values.
pub async fn wait_for_status(sub: &mut Subscription<bool>, want: bool) -> bool {
    while let Some(v) = next(sub).await {
        if v == want {
            return true;
        }
    }
    false
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Wait until no connect attempt is in flight.
pub async fn settle(link: &LinkHandle) -> LinkState {
    loop {
        let state = link.state().await;
        if state != LinkState::Opening {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
