//! Version and build metadata reported by the status tool and banner

use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Local build counter from build.rs; 0 when built without it
pub fn build_number() -> u64 {
    parse_build_number(option_env!("NUTRISCAN_BUILD_NUMBER"))
}

/// UTC compile time from build.rs
pub fn build_timestamp() -> &'static str {
    option_env!("NUTRISCAN_BUILD_TIMESTAMP").unwrap_or("unknown")
}

fn parse_build_number(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub build_number: u64,
    pub build_timestamp: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: NAME,
            version: VERSION,
            build_number: build_number(),
            build_timestamp: build_timestamp(),
        }
    }

    pub fn describe(&self) -> String {
        format!("{} {} (build {}, {})", self.name, self.version, self.build_number, self.build_timestamp)
    }
}

/// Banner on stderr; stdout carries the MCP transport
pub fn print_startup_banner() {
    eprintln!("nutriscan: fruit & vegetable nutrition estimates");
    eprintln!("{}", BuildInfo::current().describe());
}
