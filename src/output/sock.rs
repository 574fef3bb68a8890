// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Unix-domain-socket result broadcast.
//!
//! Every connected client receives one JSON line per finished target.
//! Slow readers are disconnected rather than back-pressuring the scan.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tracing::{debug, error};

use crate::errors::{ScannerError, ScannerResult};

pub struct SockBroadcaster {
    connections: Arc<Mutex<Vec<OwnedWriteHalf>>>,
}

impl SockBroadcaster {
    /// Bind the socket path (replacing any stale file) and start accepting
    /// clients in the background.
    pub fn bind(sock_path: &str) -> ScannerResult<Self> {
        if let Some(parent) = Path::new(sock_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ScannerError::Output(format!("create socket dir: {}", e)))?;
            }
        }
        let _ = std::fs::remove_file(sock_path);

        let listener = UnixListener::bind(sock_path)
            .map_err(|e| ScannerError::Output(format!("bind unix socket: {}", e)))?;

        let connections: Arc<Mutex<Vec<OwnedWriteHalf>>> = Arc::new(Mutex::new(Vec::new()));
        let accept_pool = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        debug!("unix socket client connected");
                        let (_read_half, write_half) = stream.into_split();
                        accept_pool.lock().push(write_half);
                    }
                    Err(err) => {
                        error!(error = %err, "unix socket accept failed");
                        break;
                    }
                }
            }
        });

        Ok(Self { connections })
    }

    /// Queue one JSON line to every connected client. Writes happen on a
    /// background task; clients whose write fails are dropped.
    pub fn broadcast(&self, json_line: String) {
        let connections = Arc::clone(&self.connections);
        tokio::spawn(async move {
            let mut writers = {
                let mut pool = connections.lock();
                std::mem::take(&mut *pool)
            };

            let mut alive = Vec::with_capacity(writers.len());
            let payload = format!("{}\n", json_line);
            for mut writer in writers.drain(..) {
                match writer.write_all(payload.as_bytes()).await {
                    Ok(()) => alive.push(writer),
                    Err(err) => {
                        debug!(error = %err, "dropping slow/closed socket client");
                    }
                }
            }

            connections.lock().extend(alive);
        });
    }

    pub fn client_count(&self) -> usize {
        self.connections.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::io::BufReader;
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn test_broadcast_reaches_client() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("scan.sock");
        let sock_str = sock_path.display().to_string();

        let broadcaster = SockBroadcaster::bind(&sock_str).unwrap();

        let client = UnixStream::connect(&sock_path).await.unwrap();
        // let the accept loop register the client
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(broadcaster.client_count(), 1);

        broadcaster.broadcast(r#"{"url":"http://example.test"}"#.to_string());

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            reader.read_line(&mut line),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(line.contains("example.test"));
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("scan.sock");
        let sock_str = sock_path.display().to_string();

        let first = SockBroadcaster::bind(&sock_str).unwrap();
        drop(first);
        // stale file on disk; rebinding must succeed
        let second = SockBroadcaster::bind(&sock_str);
        assert!(second.is_ok());
    }
}
