//! Unit tests for the server runner.

use super::server::{ServerError, shutdown_channel};

#[test]
fn test_server_error_bind_failed_display() {
    let err = ServerError::BindFailed {
        port: 8080,
        message: "Address already in use".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("8080"));
    assert!(msg.contains("Address already in use"));
}

#[test]
fn test_server_error_transport_display() {
    let err = ServerError::Transport("Connection reset".to_string());
    assert!(err.to_string().contains("Connection reset"));
}

#[test]
fn test_server_error_io_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
    let err: ServerError = io_err.into();
    assert!(matches!(err, ServerError::Io(_)));
}

#[tokio::test]
async fn test_shutdown_channel_delivers_signal() {
    let (tx, rx) = shutdown_channel();

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let _ = tx.send(());
    });

    assert!(rx.await.is_ok(), "Should receive shutdown signal");
}

#[tokio::test]
async fn test_dropped_sender_also_ends_wait() {
    let (tx, rx) = shutdown_channel();
    drop(tx);
    assert!(rx.await.is_err());
}
