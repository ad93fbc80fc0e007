//! Configuration loading and validation tests
//!
//! Tests focus on observable outcomes of loading a file: accepted values,
//! applied defaults and the error reported for each kind of bad input.

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use vss_actuator::config::{ActuatorConfig, ConfigError, OutputBackend};
use vss_actuator::transport::mqtt::SessionMode;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[device]
id = "horn-actuator"

[bus]
mode = "client"
locator = "tcp/192.168.1.10:1883#iface=wlan0"
key_expr = "Vehicle/Body/Horn/IsActive"

[link]
ssid_env = "WIFI_SSID"
password_env = "WIFI_PASSWORD"
max_retries = 5

[output]
backend = "log"
pin = 25
"#,
    );

    let config = ActuatorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.id, "horn-actuator");
    assert_eq!(config.bus.mode, SessionMode::Client);
    assert_eq!(config.bus.key_expr, "Vehicle/Body/Horn/IsActive");
    assert_eq!(config.link.ssid_env.as_deref(), Some("WIFI_SSID"));
    assert_eq!(config.output.backend, OutputBackend::Log);

    let locator = config.locator().unwrap().unwrap();
    assert_eq!(locator.host(), "192.168.1.10");
    assert_eq!(locator.port(), 1883);
    assert_eq!(config.link_interface().unwrap(), "wlan0");
}

#[test]
fn test_config_applies_defaults() {
    let temp_file = write_config("[device]\nid = \"horn\"");

    let config = ActuatorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.bus.locator, "");
    assert_eq!(config.bus.channel_capacity, 32);
    assert_eq!(config.link.max_retries, 5);
    assert_eq!(config.poll_interval(), Duration::from_secs(1));
    assert_eq!(config.output.pin, 25);

    let session = config.session_config().unwrap();
    assert_eq!(session.endpoint(), ("127.0.0.1", 1883));
    assert_eq!(session.connect_timeout, Duration::from_secs(10));
}

#[test]
fn test_missing_device_section_fails() {
    let temp_file = write_config("[bus]\nlocator = \"\"");
    assert!(matches!(
        ActuatorConfig::load_from_file(temp_file.path()),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_bad_locator_is_reported() {
    for locator in [
        "tcp/192.168.1.10:1883",
        "tcp/192.168.1:1883#iface=wlan0",
        "tcp/192.168.1.10:#iface=wlan0",
        "tcp/192.168.1.10:1883#iface=wlan 0",
    ] {
        let temp_file = write_config(&format!(
            "[device]\nid = \"horn\"\n\n[bus]\nlocator = \"{locator}\""
        ));
        assert!(
            matches!(
                ActuatorConfig::load_from_file(temp_file.path()),
                Err(ConfigError::InvalidLocator(_))
            ),
            "locator should be rejected: {locator}"
        );
    }
}

#[test]
fn test_out_of_range_octets_are_accepted() {
    let temp_file = write_config(
        "[device]\nid = \"horn\"\n\n[bus]\nlocator = \"tcp/999.999.999.999:1883#iface=wlan0\"",
    );
    assert!(ActuatorConfig::load_from_file(temp_file.path()).is_ok());
}

#[test]
fn test_unknown_output_backend_fails() {
    let temp_file = write_config("[device]\nid = \"horn\"\n\n[output]\nbackend = \"pwm\"");
    assert!(matches!(
        ActuatorConfig::load_from_file(temp_file.path()),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_invalid_device_id_fails() {
    let temp_file = write_config("[device]\nid = \"horn actuator\"");
    assert!(matches!(
        ActuatorConfig::load_from_file(temp_file.path()),
        Err(ConfigError::InvalidDeviceId(_))
    ));
}

#[test]
fn test_missing_file_fails() {
    assert!(matches!(
        ActuatorConfig::load_from_file(std::path::Path::new("/nonexistent/actuator.toml")),
        Err(ConfigError::FileRead(_))
    ));
}
