use std::sync::Arc;

use broker_proto::{authenticate, read_request, write_response, FramingError, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::broker::Broker;

/// Binds the configured address and serves connections until the process is
/// asked to stop. One task per connection; each connection authenticates
/// once, then loops reading length-prefixed `Request`s and replying with
/// `Response`s until the client disconnects.
pub async fn run(broker: Arc<Broker>) -> std::io::Result<()> {
    let addr = format!("{}:{}", broker.config().listen_host, broker.config().listen_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "broker listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let broker = broker.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(broker, stream).await {
                warn!(%peer_addr, %error, "connection ended with an error");
            }
        });
    }
}

async fn handle_connection<S>(broker: Arc<Broker>, mut stream: S) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let max_message_size = broker.config().max_message_size;
    let auth_key = broker.config().auth_key.clone();

    if authenticate(&mut stream, max_message_size, &auth_key).await.is_err() {
        warn!("connection rejected: authentication failed");
        return Ok(());
    }

    loop {
        let request = match read_request(&mut stream, max_message_size).await {
            Ok(request) => request,
            // The connection itself is gone; nothing left to reply to.
            Err(FramingError::Io(_)) => return Ok(()),
            // Malformed JSON or the wrong arity/types: the client is still
            // there, so tell it rather than just hanging up.
            Err(error) => {
                warn!(%error, "rejecting malformed request");
                let response = Response::error("client_error", error.to_string());
                if write_response(&mut stream, &response).await.is_err() {
                    return Ok(());
                }
                continue;
            }
        };
        let response = broker.dispatch(request).await;
        if write_response(&mut stream, &response).await.is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_config::BrokerConfig;
    use broker_proto::{read_frame, write_frame, Request};

    fn test_broker() -> (Arc<Broker>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(Broker::new(BrokerConfig {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            base_path: dir.path().display().to_string(),
            auth_key: "secret".to_string(),
            max_message_size: 1 << 20,
            log_filter: "info".to_string(),
        }));
        (broker, dir)
    }

    #[tokio::test]
    async fn malformed_request_gets_a_client_error_reply_not_a_disconnect() {
        let (broker, _dir) = test_broker();
        let (mut client, server_side) = tokio::io::duplex(4096);
        tokio::spawn(handle_connection(broker, server_side));

        write_frame(&mut client, b"secret").await.unwrap();
        write_frame(&mut client, b"not valid json").await.unwrap();

        let body = read_frame(&mut client, 1 << 20).await.unwrap();
        let response: Response = serde_json::from_slice(&body).unwrap();
        match response {
            Response::Error { kind, .. } => assert_eq!(kind, "client_error"),
            Response::Ok { .. } => panic!("expected a client_error response"),
        }

        // the connection must still be usable afterwards.
        let body = serde_json::to_vec(&Request::List).unwrap();
        write_frame(&mut client, &body).await.unwrap();
        let body = read_frame(&mut client, 1 << 20).await.unwrap();
        let response: Response = serde_json::from_slice(&body).unwrap();
        assert!(matches!(response, Response::Ok { .. }));
    }
}
