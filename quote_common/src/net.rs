//! Shared networking constants and helpers used by the stand-in engine.

/// TCP port the acceptor listens on when `SocketAcceptPort` is absent.
pub const DEFAULT_ACCEPT_PORT: u16 = 5001;
/// Heartbeat interval in seconds when `HeartBtInt` is absent.
pub const DEFAULT_HEART_BT_INT: u64 = 30;

/// Helper to format an address with a port like "host:port".
pub fn addr(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
