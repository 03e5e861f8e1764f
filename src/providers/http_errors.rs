use std::error::Error as StdError;
use std::fmt;
use std::io::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionRefused,
    Connect,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection_refused",
            Self::Connect => "connect",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::ConnectionRefused
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("connection refused")
        {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::TimedOut
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("timed out")
        {
            return true;
        }

        current = source.source();
    }

    false
}

pub(crate) fn classify_transport_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() || error_chain_has_timeout(err) {
        return TransportErrorKind::Timeout;
    }
    if error_chain_has_connection_refused(err) {
        return TransportErrorKind::ConnectionRefused;
    }
    if err.is_connect() {
        return TransportErrorKind::Connect;
    }
    TransportErrorKind::Other
}

/// Joins an error and its sources with ": ". reqwest's own message hides the
/// underlying cause, which is the part a caller actually needs.
pub(crate) fn describe_error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        let text = source.to_string();
        if !text.is_empty() && !parts.iter().any(|part| part.contains(&text)) {
            parts.push(text);
        }
        current = source.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::{
        TransportErrorKind, classify_transport_error, describe_error_chain,
        error_chain_has_timeout,
    };
    use reqwest::Client;
    use std::fmt;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn free_local_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        drop(listener);
        addr
    }

    #[derive(Debug)]
    struct Wrapped {
        message: &'static str,
        source: std::io::Error,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.source)
        }
    }

    #[tokio::test]
    async fn classifies_connection_refused() {
        let addr = free_local_addr();
        let api_url = format!("http://{}/v1/chat/completions", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with connection-refused");

        assert_eq!(
            classify_transport_error(&req_err),
            TransportErrorKind::ConnectionRefused
        );
        let detail = describe_error_chain(&req_err);
        assert!(
            detail.to_ascii_lowercase().contains("refused"),
            "unexpected detail: {detail}"
        );
    }

    #[tokio::test]
    async fn classifies_timeouts() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().expect("accept should succeed");
            thread::sleep(Duration::from_secs(1));
        });

        let api_url = format!("http://{}/v1/chat/completions", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with timeout");

        assert_eq!(
            classify_transport_error(&req_err),
            TransportErrorKind::Timeout
        );

        server.join().expect("server thread should join");
    }

    #[test]
    fn detects_timeout_from_error_kind() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(error_chain_has_timeout(&err));
    }

    #[test]
    fn describe_error_chain_joins_sources() {
        let err = Wrapped {
            message: "error sending request",
            source: std::io::Error::other("tls handshake eof"),
        };
        assert_eq!(
            describe_error_chain(&err),
            "error sending request: tls handshake eof"
        );
    }

    #[test]
    fn describe_error_chain_skips_repeated_messages() {
        let err = Wrapped {
            message: "connect failed: reset",
            source: std::io::Error::other("reset"),
        };
        assert_eq!(describe_error_chain(&err), "connect failed: reset");
    }
}
