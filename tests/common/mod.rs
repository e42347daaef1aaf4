//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use fleet_control::error::FleetError;
use fleet_control::fleet::{ProvisionedInstance, Provisioner};

/// Start a simple mock instance that returns a fixed 200 response on every
/// path (health and readiness alike). Returns its address.
#[allow(dead_code)]
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock instance whose status code is switchable at runtime, for
/// driving probe streaks.
#[allow(dead_code)]
pub async fn start_status_backend(status: Arc<AtomicU16>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let status = status.load(Ordering::Relaxed);
                    tokio::spawn(async move {
                        let status_text = match status {
                            200 => "200 OK",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                            status_text
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Poll a condition until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Scriptable provisioning collaborator: hands out loopback addresses,
/// instantly ready.
#[allow(dead_code)]
pub struct MockProvisioner {
    next_port: AtomicU16,
    fail_first: AtomicU32,
}

#[allow(dead_code)]
impl MockProvisioner {
    pub fn new() -> Self {
        Self {
            next_port: AtomicU16::new(9500),
            fail_first: AtomicU32::new(0),
        }
    }

    pub fn failing(times: u32) -> Self {
        let mock = Self::new();
        mock.fail_first.store(times, Ordering::Relaxed);
        mock
    }
}

impl Provisioner for MockProvisioner {
    async fn provision(&self) -> Result<ProvisionedInstance, FleetError> {
        let remaining = self.fail_first.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::Relaxed);
            return Err(FleetError::TransientProvisioning(
                "simulated API throttle".to_string(),
            ));
        }
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        Ok(ProvisionedInstance {
            addr: format!("127.0.0.1:{}", port).parse().unwrap(),
        })
    }

    async fn await_ready(&self, _instance: ProvisionedInstance) -> Result<(), FleetError> {
        Ok(())
    }

    async fn terminate(&self, _instance: ProvisionedInstance) -> Result<(), FleetError> {
        Ok(())
    }
}
