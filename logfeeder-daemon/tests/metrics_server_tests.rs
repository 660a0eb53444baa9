//! Integration tests for metrics server functionality.
//!
//! The global recorder can only be installed once per process, so the
//! successful install and the duplicate-install check share one test.

use logfeeder_core::config::MetricsConfig;
use logfeeder_daemon::metrics_server;
use serial_test::serial;

fn metrics_config(listen_addr: &str, port: u16, endpoint: &str) -> MetricsConfig {
    MetricsConfig {
        enabled: true,
        listen_addr: listen_addr.to_owned(),
        port,
        endpoint: endpoint.to_owned(),
    }
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    let config = metrics_config("999.999.999.999", 9108, "/metrics");

    let result = metrics_server::install_metrics_recorder(&config);

    assert!(
        result.is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_custom_endpoint() {
    let config = metrics_config("127.0.0.1", 9108, "/custom");

    let err = metrics_server::install_metrics_recorder(&config)
        .expect_err("custom endpoint should be rejected");
    assert!(err.to_string().contains("unsupported metrics endpoint"));
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_once_per_process() {
    // Port 0 lets the OS pick a free port.
    let config = metrics_config("127.0.0.1", 0, "/metrics");

    let first = metrics_server::install_metrics_recorder(&config);
    assert!(
        first.is_ok(),
        "first install should succeed: {:?}",
        first.err()
    );

    let second = metrics_server::install_metrics_recorder(&config);
    assert!(second.is_err(), "second install should fail");
}
