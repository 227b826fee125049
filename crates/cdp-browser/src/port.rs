//! Port allocation (spec §4.F): bind to port 0, read back what the OS
//! assigned, then release it. Deliberately racy — acceptable because the
//! supervisor hands the port straight to the browser afterward.

use std::net::TcpListener;

pub fn allocate_port(bind_address: &str) -> std::io::Result<u16> {
    let listener = TcpListener::bind((bind_address, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_a_nonzero_port() {
        let port = allocate_port("127.0.0.1").unwrap();
        assert_ne!(port, 0);
    }
}
