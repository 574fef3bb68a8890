// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Raw TCP/UDP/TLS probes for non-HTTP rule transports.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;
use tracing::debug;

use crate::errors::{NetworkError, ScannerError, ScannerResult};
use crate::proto::{Request, Response, UrlRecord};

/// Unified stream type that can be either plain TCP or TLS-wrapped
enum ProbeStream {
    Plain(TcpStream),
    Tls(Box<tokio_native_tls::TlsStream<TcpStream>>),
}

impl ProbeStream {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            ProbeStream::Plain(s) => s.write_all(buf).await,
            ProbeStream::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            ProbeStream::Plain(s) => s.flush().await,
            ProbeStream::Tls(s) => s.flush().await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ProbeStream::Plain(s) => s.read(buf).await,
            ProbeStream::Tls(s) => s.read(buf).await,
        }
    }
}

/// Socket probe parameters from the rule template.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub read_size: usize,
    pub read_timeout: Duration,
    pub dial_timeout: Duration,
    pub use_tls: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            read_size: 2048,
            read_timeout: Duration::from_secs(3),
            dial_timeout: Duration::from_secs(5),
            use_tls: false,
        }
    }
}

fn split_host_port(address: &str) -> ScannerResult<(String, u16)> {
    let trimmed = address.trim();
    let (host, port) = trimmed.rsplit_once(':').ok_or_else(|| {
        ScannerError::Network(NetworkError::InvalidUrl {
            url: trimmed.to_string(),
        })
    })?;
    let port: u16 = port.parse().map_err(|_| {
        ScannerError::Network(NetworkError::InvalidUrl {
            url: trimmed.to_string(),
        })
    })?;
    Ok((host.to_string(), port))
}

async fn connect_stream(host: &str, port: u16, config: &SocketConfig) -> ScannerResult<ProbeStream> {
    let tcp_stream = timeout(config.dial_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            ScannerError::Network(NetworkError::ConnectionTimeout {
                url: format!("{}:{}", host, port),
                timeout: config.dial_timeout,
            })
        })?
        .map_err(|e| {
            ScannerError::Network(NetworkError::ConnectionRefused {
                url: format!("{}:{} ({})", host, port, e),
            })
        })?;

    if config.use_tls {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ScannerError::Network(NetworkError::Other(e.to_string())))?;
        let connector = TlsConnector::from(connector);
        let tls_stream = connector.connect(host, tcp_stream).await.map_err(|e| {
            ScannerError::Network(NetworkError::Other(format!(
                "TLS handshake failed for {}: {}",
                host, e
            )))
        })?;
        debug!(host = host, port = port, "TLS socket connected");
        Ok(ProbeStream::Tls(Box::new(tls_stream)))
    } else {
        debug!(host = host, port = port, "TCP socket connected");
        Ok(ProbeStream::Plain(tcp_stream))
    }
}

/// Write `data`, read up to `read_size` bytes under `read_timeout`, close.
pub async fn tcp_exchange(
    address: &str,
    data: &[u8],
    config: &SocketConfig,
) -> ScannerResult<Vec<u8>> {
    let (host, port) = split_host_port(address)?;
    let mut stream = connect_stream(&host, port, config).await?;

    stream
        .write_all(data)
        .await
        .map_err(|e| ScannerError::Network(NetworkError::Other(e.to_string())))?;
    stream
        .flush()
        .await
        .map_err(|e| ScannerError::Network(NetworkError::Other(e.to_string())))?;

    let mut received = Vec::new();
    let mut buffer = vec![0u8; 4096];
    let deadline = Instant::now() + config.read_timeout;

    while received.len() < config.read_size {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, stream.read(&mut buffer)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                received.extend_from_slice(&buffer[..n]);
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }

    received.truncate(config.read_size);
    Ok(received)
}

/// One-shot UDP exchange: send the datagram, read a single reply.
pub async fn udp_exchange(
    address: &str,
    data: &[u8],
    config: &SocketConfig,
) -> ScannerResult<Vec<u8>> {
    let (host, port) = split_host_port(address)?;

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| ScannerError::Network(NetworkError::Other(e.to_string())))?;
    timeout(config.dial_timeout, socket.connect((host.as_str(), port)))
        .await
        .map_err(|_| {
            ScannerError::Network(NetworkError::ConnectionTimeout {
                url: format!("{}:{}", host, port),
                timeout: config.dial_timeout,
            })
        })?
        .map_err(|e| ScannerError::Network(NetworkError::Other(e.to_string())))?;

    socket
        .send(data)
        .await
        .map_err(|e| ScannerError::Network(NetworkError::Other(e.to_string())))?;

    let mut buffer = vec![0u8; config.read_size.max(512)];
    let n = match timeout(config.read_timeout, socket.recv(&mut buffer)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            return Err(ScannerError::Network(NetworkError::Other(e.to_string())))
        }
        Err(_) => 0,
    };

    buffer.truncate(n.min(config.read_size));
    Ok(buffer)
}

/// Build environment records for a completed socket exchange. The raws are
/// the exact bytes written and read; headers stay empty.
pub fn build_socket_records(
    transport: &str,
    address: &str,
    sent: &[u8],
    received: &[u8],
    latency: Duration,
) -> (Arc<Request>, Arc<Response>) {
    let (domain, port) = address
        .rsplit_once(':')
        .map(|(h, p)| (h.to_string(), p.to_string()))
        .unwrap_or_else(|| (address.to_string(), String::new()));

    let url = UrlRecord {
        scheme: transport.to_string(),
        host: address.to_string(),
        port,
        domain,
        path: String::new(),
        query: String::new(),
        fragment: String::new(),
    };

    let request = Request {
        method: transport.to_uppercase(),
        url: url.clone(),
        headers: HashMap::new(),
        content_type: String::new(),
        body: sent.to_vec(),
        raw: sent.to_vec(),
        raw_header: Vec::new(),
    };

    let response = Response {
        status: 0,
        url,
        headers: HashMap::new(),
        content_type: String::new(),
        body: received.to_vec(),
        raw: received.to_vec(),
        raw_header: Vec::new(),
        latency: latency.as_millis() as i64,
        icon_hash: "0".to_string(),
    };

    (Arc::new(request), Arc::new(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("example.test:6379").unwrap(),
            ("example.test".to_string(), 6379)
        );
        assert!(split_host_port("no-port").is_err());
        assert!(split_host_port("bad:port:x").is_err());
    }

    #[tokio::test]
    async fn test_tcp_exchange_reads_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"+PONG\r\n").await.unwrap();
        });

        let config = SocketConfig {
            read_size: 64,
            read_timeout: Duration::from_millis(500),
            dial_timeout: Duration::from_secs(1),
            use_tls: false,
        };
        let reply = tcp_exchange(&addr.to_string(), b"PING\r\n", &config)
            .await
            .unwrap();
        assert_eq!(reply, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_tcp_exchange_read_size_cap() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&[b'x'; 256]).await.unwrap();
        });

        let config = SocketConfig {
            read_size: 16,
            read_timeout: Duration::from_millis(500),
            dial_timeout: Duration::from_secs(1),
            use_tls: false,
        };
        let reply = tcp_exchange(&addr.to_string(), b"", &config).await.unwrap();
        assert_eq!(reply.len(), 16);
    }

    #[tokio::test]
    async fn test_tcp_exchange_refused() {
        // Port 1 is essentially never listening.
        let config = SocketConfig::default();
        let result = tcp_exchange("127.0.0.1:1", b"hi", &config).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_build_socket_records_raws() {
        let (req, resp) = build_socket_records(
            "tcp",
            "db.example.test:6379",
            b"PING\r\n",
            b"+PONG\r\n",
            Duration::from_millis(3),
        );
        assert_eq!(req.raw, b"PING\r\n");
        assert_eq!(resp.raw, b"+PONG\r\n");
        assert_eq!(req.url.domain, "db.example.test");
        assert_eq!(resp.url.port, "6379");
    }
}
