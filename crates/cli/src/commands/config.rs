use std::env;
use std::fs;
use std::path::Path;

use offerdesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    fn field(
        key_path: &'static str,
        env_keys: &'static [&'static str],
        value: String,
    ) -> ConfigField {
        ConfigField { key_path, env_keys, value }
    }

    vec![
        field("database.url", &["OFFERDESK_DATABASE_URL"], config.database.url.clone()),
        field(
            "database.max_connections",
            &["OFFERDESK_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            &["OFFERDESK_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            &["OFFERDESK_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["OFFERDESK_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["OFFERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "logging.level",
            &["OFFERDESK_LOGGING_LEVEL", "OFFERDESK_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["OFFERDESK_LOGGING_FORMAT", "OFFERDESK_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
        field(
            "pricing.default_margin_percent",
            &["OFFERDESK_PRICING_DEFAULT_MARGIN_PERCENT"],
            config.pricing.default_margin_percent.to_string(),
        ),
        field(
            "pricing.default_min_margin_percent",
            &["OFFERDESK_PRICING_DEFAULT_MIN_MARGIN_PERCENT"],
            config.pricing.default_min_margin_percent.to_string(),
        ),
        field(
            "pricing.default_max_discount_percent",
            &["OFFERDESK_PRICING_DEFAULT_MAX_DISCOUNT_PERCENT"],
            config.pricing.default_max_discount_percent.to_string(),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}


#[cfg(test)]
mod tests {
    use super::{contains_path, field_source};
    use std::path::Path;
    use toml::Value;

    #[test]
    fn nested_keys_resolve_against_file_document() {
        let doc: Value = "[pricing]\ndefault_margin_percent = 30\n".parse().expect("toml");

        assert!(contains_path(&doc, "pricing.default_margin_percent"));
        assert!(!contains_path(&doc, "pricing.default_max_discount_percent"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn file_source_names_the_file_and_unset_keys_fall_back_to_default() {
        let doc: Value = "[server]\nport = 9090\n".parse().expect("toml");
        let path = Path::new("offerdesk.toml");

        assert_eq!(
            field_source("server.port", &["OFFERDESK_TEST_UNSET_PORT"], Some(&doc), Some(path)),
            "file (offerdesk.toml)"
        );
        assert_eq!(
            field_source(
                "server.bind_address",
                &["OFFERDESK_TEST_UNSET_BIND"],
                Some(&doc),
                Some(path)
            ),
            "default"
        );
    }
}
