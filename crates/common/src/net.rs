//! One-shot outbound TCP send
//!
//! The notification protocol has no connection keep-alive: every frame is a
//! fresh connect, a single write, and a close. Both registration and the
//! listener's self-unblocking connection go through here.

use std::io::Write;
use std::net::TcpStream;

/// Connect to `address:port`, write `data`, and close the connection.
///
/// An empty `data` still makes the connection; the listener uses that to bump
/// its accept loop out of a blocking accept.
pub fn send(address: &str, port: u16, data: &[u8]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect((address, port))?;
    if !data.is_empty() {
        stream.write_all(data)?;
    }
    Ok(())
}
