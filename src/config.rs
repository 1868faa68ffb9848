// src/config.rs

use byte_unit::Byte;
use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::{env, net::Ipv4Addr, time::Duration};

use crate::osrm::RoutingOptions;

#[derive(Clone, Debug)]
pub struct Config {
    pub routing_url: String,
    pub route_cache_size: u64,
    pub routing_timeout: Duration,
    pub max_post_size: Byte,
    pub port: u16,
    pub bind: Ipv4Addr,
}

// Initialize dotenv and config only once
pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok();
    Config::from_lookup(|key| env::var(key).ok())
});

impl Config {
    /// Builds a config from `lookup`, falling back to defaults for missing or
    /// unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Config {
            routing_url: lookup("ROUTING_URL")
                .unwrap_or_else(|| String::from("http://127.0.0.1:5000")),
            route_cache_size: lookup("ROUTE_CACHE")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(128),
            routing_timeout: lookup("ROUTING_TIMEOUT")
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(10)),
            max_post_size: lookup("MAX_POST_SIZE")
                .and_then(|s| Byte::parse_str(s, true).ok())
                .unwrap_or(Byte::from_u64(16_000)),
            port: lookup("PORT")
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(3000),
            bind: lookup("BIND")
                .and_then(|s| s.parse::<Ipv4Addr>().ok())
                .unwrap_or(Ipv4Addr::new(0, 0, 0, 0)),
        }
    }

    pub fn routing_options(&self) -> RoutingOptions {
        RoutingOptions {
            base_url: self.routing_url.clone(),
            cache_size: self.route_cache_size,
            timeout: self.routing_timeout,
        }
    }
}
