mod config;
mod handler;
mod http;
mod net;
mod routing;

use async_std::task;
use config::{set_config, ServerConfig};
use net::server::Server;

fn main() -> std::io::Result<()> {
    env_logger::init();

    let cfg = ServerConfig::from_file("netweave.toml");
    set_config(cfg);

    let server = Server::new(handler::build_routes());
    task::block_on(server.run())
}
