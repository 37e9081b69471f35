//! TCP server that accepts connections and never answers.

use std::net::SocketAddr;
use tokio::{net::TcpListener, task::JoinHandle};

pub struct SilentServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SilentServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent server");
        let addr = listener.local_addr().expect("silent server address");
        let handle = tokio::spawn(async move {
            // connections stay open until the server is dropped
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        Self { addr, handle }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/dvote", self.addr)
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
