use crate::constants::{
    DEFAULT_CLIENT_TIMEOUT, DEFAULT_LENGTH_MAX_MULTIPLIER, DEFAULT_LENGTH_MIN_MULTIPLIER,
};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw configuration input - all fields Optional for merging
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    pub source: Option<EndpointInput>,
    pub target: Option<EndpointInput>,
    pub settings: Option<SettingsInput>,
    pub length_check: Option<LengthCheckInput>,
    pub ddl: Option<DdlInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointInput {
    pub client_bin: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsInput {
    pub source_schemas: Option<Vec<String>>,
    pub remap_file: Option<String>,
    pub fixup_dir: Option<String>,
    pub report_dir: Option<String>,
    pub client_timeout_secs: Option<u64>,
    pub generate_fixup: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LengthCheckInput {
    pub min_multiplier: Option<f64>,
    pub max_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DdlInput {
    pub converter_bin: Option<String>,
    pub converter_from: Option<String>,
    pub converter_to: Option<String>,
    pub cache_dir: Option<String>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone)]
pub struct Config {
    pub source: Endpoint,
    pub target: Endpoint,
    /// Source schemas in scope, upper-cased, never empty.
    pub schemas: Vec<String>,
    pub remap_file: String,
    pub fixup_dir: String,
    pub report_dir: String,
    pub client_timeout: Duration,
    pub generate_fixup: bool,
    pub length_check: LengthWindow,
    pub ddl: DdlConverter,
}

#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    pub client_bin: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Acceptable growth window for VARCHAR lengths after character-set
/// conversion, as multiples of the source length.
#[derive(Debug, Clone, Copy)]
pub struct LengthWindow {
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for LengthWindow {
    fn default() -> Self {
        Self {
            min_multiplier: DEFAULT_LENGTH_MIN_MULTIPLIER,
            max_multiplier: DEFAULT_LENGTH_MAX_MULTIPLIER,
        }
    }
}

impl LengthWindow {
    pub fn bounds(&self, source_length: u32) -> (u32, u32) {
        let low = (source_length as f64 * self.min_multiplier).ceil() as u32;
        let high = (source_length as f64 * self.max_multiplier).ceil() as u32;
        (low, high)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DdlConverter {
    pub bin: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cache_dir: String,
}

impl ConfigInput {
    pub fn resolve(self) -> Result<Config> {
        let settings = self.settings.unwrap_or_default();

        let schemas: Vec<String> = settings
            .source_schemas
            .unwrap_or_default()
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if schemas.is_empty() {
            bail!("settings.source_schemas is missing or empty");
        }

        let length_input = self.length_check.unwrap_or_default();
        let defaults = LengthWindow::default();
        let length_check = LengthWindow {
            min_multiplier: length_input.min_multiplier.unwrap_or(defaults.min_multiplier),
            max_multiplier: length_input.max_multiplier.unwrap_or(defaults.max_multiplier),
        };
        if length_check.min_multiplier <= 0.0
            || length_check.max_multiplier < length_check.min_multiplier
        {
            bail!(
                "length_check multipliers are invalid: min={}, max={}",
                length_check.min_multiplier,
                length_check.max_multiplier
            );
        }

        let ddl_input = self.ddl.unwrap_or_default();

        Ok(Config {
            source: resolve_endpoint(self.source.unwrap_or_default()),
            target: resolve_endpoint(self.target.unwrap_or_default()),
            schemas,
            remap_file: settings.remap_file.unwrap_or_else(|| "remap.txt".to_string()),
            fixup_dir: settings.fixup_dir.unwrap_or_else(|| "fix_up".to_string()),
            report_dir: settings.report_dir.unwrap_or_else(|| "reports".to_string()),
            client_timeout: settings
                .client_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CLIENT_TIMEOUT),
            generate_fixup: settings.generate_fixup.unwrap_or(true),
            length_check,
            ddl: DdlConverter {
                bin: ddl_input.converter_bin.filter(|s| !s.trim().is_empty()),
                from: ddl_input.converter_from,
                to: ddl_input.converter_to,
                cache_dir: ddl_input
                    .cache_dir
                    .unwrap_or_else(|| "history/ddl_cache".to_string()),
            },
        })
    }
}

fn resolve_endpoint(input: EndpointInput) -> Endpoint {
    Endpoint {
        client_bin: input.client_bin.unwrap_or_default(),
        host: input.host.unwrap_or_else(|| "127.0.0.1".to_string()),
        port: input.port.unwrap_or(2881),
        user: input.user.unwrap_or_default(),
        password: input.password.unwrap_or_default(),
    }
}
