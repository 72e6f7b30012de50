//! Runs the built binary and stops it with a real SIGTERM.
#![cfg(unix)]

use std::fs;
use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_multiport-status");

/// Three distinct ports that were free a moment ago.
fn free_ports() -> [u16; 3] {
    let sockets: Vec<TcpListener> = (0..3)
        .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap())
        .collect();
    let ports: Vec<u16> = sockets
        .iter()
        .map(|s| s.local_addr().unwrap().port())
        .collect();
    [ports[0], ports[1], ports[2]]
}

/// Scratch directory so the child does not pick up a stray `.env`.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "multiport-status-{}-{}",
        name,
        std::process::id()
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn spawn(dir: &Path, ports: [u16; 3]) -> Child {
    Command::new(BIN)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env("BIND_HOST", "127.0.0.1")
        .env("GATEWAY_PORT", ports[0].to_string())
        .env("METRICS_PORT", ports[1].to_string())
        .env("ADMIN_PORT", ports[2].to_string())
        .env("SHUTDOWN_TIMEOUT_SECS", "5")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

fn wait_until_listening(child: &mut Child, ports: [u16; 3]) {
    let deadline = Instant::now() + Duration::from_secs(10);
    for port in ports {
        while TcpStream::connect(addr(port)).is_err() {
            assert!(child.try_wait().unwrap().is_none(), "binary exited during startup");
            assert!(Instant::now() < deadline, "port {port} never accepted");
            thread::sleep(Duration::from_millis(20));
        }
    }
}

fn sigterm(child: &Child) {
    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            panic!("binary still running {timeout:?} after SIGTERM");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn stdout_of(child: &mut Child) -> String {
    let mut out = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut out).unwrap();
    }
    out
}

#[test]
fn sigterm_closes_every_listener_and_exits_zero() {
    let dir = scratch_dir("sigterm");
    let ports = free_ports();
    let mut child = spawn(&dir, ports);
    wait_until_listening(&mut child, ports);

    sigterm(&child);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));

    assert_eq!(status.code(), Some(0));
    for port in ports {
        assert!(TcpStream::connect(addr(port)).is_err(), "port {port} still open");
    }
    let out = stdout_of(&mut child);
    assert!(out.contains("SIGTERM received. Shutting down gracefully"), "{out}");
    fs::remove_dir_all(dir).ok();
}

#[test]
fn log_filter_from_dotenv_applies() {
    let dir = scratch_dir("dotenv");
    fs::write(dir.join(".env"), "RUST_LOG=error\n").unwrap();
    let ports = free_ports();
    let mut child = spawn(&dir, ports);
    wait_until_listening(&mut child, ports);

    sigterm(&child);
    let status = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));

    let out = stdout_of(&mut child);
    assert!(!out.contains("Server running on port"), "{out}");
    fs::remove_dir_all(dir).ok();
}
