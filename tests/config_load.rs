//! Config file loading through the async API.
use boardlink::config::{Config, MatchPolicyKind};
use boardlink::serial::{Delimiter, MatchPolicy};

fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[tokio::test]
async fn create_default_then_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(&dir, "config.toml");

    tokio_test::assert_ok!(Config::create_default(&path).await);
    let cfg = tokio_test::assert_ok!(Config::load(&path).await);
    assert_eq!(cfg.device.port, None);
    assert_eq!(cfg.device.match_policy, MatchPolicyKind::Manufacturer);
    assert_eq!(cfg.device.line_ending, Delimiter::Lf);
    assert_eq!(cfg.logging.level, "info");
}

#[tokio::test]
async fn load_reads_device_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(&dir, "board.toml");
    std::fs::write(
        &path,
        r#"
[device]
port = "/dev/ttyACM3"
match_policy = "usb_id"
vendor_id = "2341"
product_id = "0043"
line_ending = "crlf"

[logging]
level = "debug"
file = "boardlink.log"
"#,
    )
    .unwrap();

    let cfg = Config::load(&path).await.expect("load");
    assert_eq!(cfg.device.port.as_deref(), Some("/dev/ttyACM3"));
    assert_eq!(cfg.device.line_ending, Delimiter::Crlf);
    assert_eq!(cfg.logging.file.as_deref(), Some("boardlink.log"));
    assert_eq!(
        cfg.match_policy(),
        MatchPolicy::UsbId {
            vendor_id: "2341".into(),
            product_id: "0043".into()
        }
    );
}

#[tokio::test]
async fn missing_file_is_an_error_for_load_but_not_for_load_or_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(&dir, "absent.toml");

    let err = Config::load(&path).await.unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));

    let (cfg, from_file) = Config::load_or_default(&path).await.expect("defaults");
    assert!(!from_file);
    assert_eq!(cfg.device.manufacturer, "Arduino");
}

#[tokio::test]
async fn load_or_default_reports_an_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(&dir, "config.toml");
    std::fs::write(&path, "[device]\nmanufacturer = \"Elegoo\"\n").unwrap();

    let (cfg, from_file) = tokio_test::assert_ok!(Config::load_or_default(&path).await);
    assert!(from_file);
    assert_eq!(cfg.device.manufacturer, "Elegoo");
}

#[tokio::test]
async fn bad_files_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");

    let garbled = path_in(&dir, "garbled.toml");
    std::fs::write(&garbled, "[device\nport = ").unwrap();
    let err = Config::load_or_default(&garbled).await.unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));

    let invalid = path_in(&dir, "invalid.toml");
    std::fs::write(&invalid, "[device]\nline_ending = \"cr\"\n").unwrap();
    assert!(Config::load(&invalid).await.is_err());

    let bad_id = path_in(&dir, "bad_id.toml");
    std::fs::write(&bad_id, "[device]\nmatch_policy = \"usb_id\"\nvendor_id = \"zz\"\n").unwrap();
    assert!(Config::load(&bad_id).await.is_err());
}
