//! HTTP job service: `maintainer serve`.

use anyhow::Result;

use maintainer::config::MaintainerConfig;

pub async fn cmd_serve(
    mut config: MaintainerConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let host = config.server.host.clone();
    let port = config.server.port;

    maintainer::maintainer::server::start_server(config, &host, port).await
}
