//! TAN generation and out-of-band delivery
//!
//! A TAN is five random characters from `A-Z0-9`. Delivery goes
//! through external commands (address as argv[1], TAN on stdin) for the
//! SMS and EMAIL channels, or to a well-known file for the FILE
//! channel. Command execution is bounded: 10 s grace, SIGTERM, 5 s
//! more, SIGKILL.

use ledger_core::types::TanChannel;
use rand::Rng;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

/// TAN length in characters.
pub const TAN_LENGTH: usize = 5;

/// Default path of the FILE-channel TAN drop.
pub const DEFAULT_TAN_FILE: &str = "/tmp/libeufin-cashout-tan.txt";

/// Environment variable short-circuiting TAN checks in tests.
pub const TEST_TAN_ENV: &str = "LIBEUFIN_CASHOUT_TEST_TAN";

const COMMAND_GRACE: Duration = Duration::from_secs(10);
const KILL_GRACE: Duration = Duration::from_secs(5);

/// TAN delivery failures.
#[derive(Error, Debug)]
pub enum TanError {
    /// The channel has no configured transport
    #[error("Channel not configured: {0}")]
    ChannelUnavailable(&'static str),

    /// Spawning or driving the delivery command failed
    #[error("Delivery command failed: {0}")]
    Command(String),

    /// Writing the TAN file failed
    #[error("TAN file write failed: {0}")]
    File(#[from] std::io::Error),
}

/// Generate a fresh TAN.
pub fn generate_tan() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..TAN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// TAN delivery service, created once at process start.
#[derive(Debug, Clone)]
pub struct TanSender {
    email_command: Option<String>,
    sms_command: Option<String>,
    file_path: PathBuf,
}

impl Default for TanSender {
    fn default() -> Self {
        Self {
            email_command: None,
            sms_command: None,
            file_path: PathBuf::from(DEFAULT_TAN_FILE),
        }
    }
}

impl TanSender {
    /// Build a sender with explicit transports.
    pub fn new(
        email_command: Option<String>,
        sms_command: Option<String>,
        file_path: PathBuf,
    ) -> Self {
        Self {
            email_command,
            sms_command,
            file_path,
        }
    }

    /// Deliver `tan` to `address` over `channel`.
    pub async fn deliver(
        &self,
        channel: TanChannel,
        address: &str,
        tan: &str,
    ) -> Result<(), TanError> {
        match channel {
            TanChannel::Email => {
                let command = self
                    .email_command
                    .as_deref()
                    .ok_or(TanError::ChannelUnavailable("EMAIL"))?;
                run_delivery_command(command, address, tan).await
            }
            TanChannel::Sms => {
                let command = self
                    .sms_command
                    .as_deref()
                    .ok_or(TanError::ChannelUnavailable("SMS"))?;
                run_delivery_command(command, address, tan).await
            }
            TanChannel::File => {
                // Single writer: truncate and rewrite.
                std::fs::write(&self.file_path, tan)?;
                info!(path = %self.file_path.display(), "TAN written to file");
                Ok(())
            }
        }
    }
}

async fn run_delivery_command(command: &str, address: &str, tan: &str) -> Result<(), TanError> {
    let mut child = Command::new(command)
        .arg(address)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| TanError::Command(format!("{}: {}", command, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(tan.as_bytes())
            .await
            .map_err(|e| TanError::Command(format!("stdin: {}", e)))?;
        drop(stdin);
    }

    match timeout(COMMAND_GRACE, child.wait()).await {
        Ok(Ok(status)) if status.success() => {
            info!(command, "TAN delivered");
            Ok(())
        }
        Ok(Ok(status)) => Err(TanError::Command(format!("{}: exit {}", command, status))),
        Ok(Err(e)) => Err(TanError::Command(format!("{}: {}", command, e))),
        Err(_) => {
            warn!(command, "TAN command timed out, terminating");
            terminate(&mut child, command).await;
            Err(TanError::Command(format!("{}: timed out", command)))
        }
    }
}

/// SIGTERM, grace period, then SIGKILL.
async fn terminate(child: &mut tokio::process::Child, command: &str) {
    if let Some(pid) = child.id() {
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .status()
            .await;
    }
    if timeout(KILL_GRACE, child.wait()).await.is_err() {
        warn!(command, "TAN command ignored SIGTERM, killing");
        let _ = child.kill().await;
    }
}
