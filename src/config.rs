//! Command line configuration for the server and client binaries

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

/// Port used by both binaries unless overridden
pub const DEFAULT_PORT: u16 = 5555;

/// Server listen configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "room_chat_server")]
#[command(about = "Multi-room TCP chat server", long_about = None)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ServerArgs {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Client connect configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "room_chat_client")]
#[command(about = "Terminal client for the multi-room chat server", long_about = None)]
pub struct ClientArgs {
    /// Server host name or address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ClientArgs {
    /// `host:port` string suitable for `TcpStream::connect`
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
