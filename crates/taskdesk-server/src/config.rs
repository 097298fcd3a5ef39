use std::net::{IpAddr, SocketAddr};

use clap::Args;

pub const DEFAULT_PORT: u16 = 3720;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// HTTP and token settings, from flags or `TASKDESK_*` environment variables.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "TASKDESK_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    #[arg(long, env = "TASKDESK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// HS256 signing secret. A random one is generated when unset.
    #[arg(long, env = "TASKDESK_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in minutes.
    #[arg(long, env = "TASKDESK_JWT_TTL_MINUTES", default_value_t = 60)]
    pub jwt_ttl_minutes: u64,

    /// Base URL clients use to reach this server; prefixes attachment preview links.
    #[arg(long, env = "TASKDESK_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Largest accepted request body. Kept above the attachment limit so
    /// oversize uploads get a validation error instead of a transport error.
    #[arg(long, env = "TASKDESK_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn public_url(&self) -> String {
        if let Some(url) = self.public_url.as_deref().filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        let host = if self.bind.is_unspecified() {
            "localhost".to_string()
        } else {
            match self.bind {
                IpAddr::V4(ip) => ip.to_string(),
                IpAddr::V6(ip) => format!("[{ip}]"),
            }
        };
        format!("http://{host}:{}", self.port)
    }
}
