use crate::engine::RequesterError;
use crate::types::Proxy;
use reqwest::Client;
use std::time::Duration;

/// Builds the client a single step uses through a single proxy.
pub fn create_client(timeout: Duration, proxy: &Proxy) -> Result<Client, RequesterError> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .tcp_nodelay(true)
        .gzip(true)
        .brotli(true)
        .user_agent(format!(
            "volley/{} (load-testing-tool)",
            env!("CARGO_PKG_VERSION")
        ))
        .pool_max_idle_per_host(1)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60));

    builder = match proxy {
        Proxy::Direct => builder.no_proxy(),
        Proxy::Via(url) => {
            let proxy_cfg =
                reqwest::Proxy::all(url.as_str()).map_err(|source| RequesterError::InvalidProxy {
                    proxy: url.to_string(),
                    source,
                })?;
            builder.proxy(proxy_cfg)
        }
    };

    Ok(builder.build()?)
}
