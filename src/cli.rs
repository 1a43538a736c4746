//! CLI argument parsing via clap.

use clap::{Parser, ValueEnum};
use payconnect::build_info::{HELP_BUILD_METADATA, LONG_VERSION};
use payconnect::config::{validate_config, Config};
use payconnect::error::ConfigError;
use payconnect::connector::{HttpMethod, HttpRequest, Request};
use serde_json::Value;

/// Send one request through the payments API connector pipeline.
#[derive(Debug, Parser)]
#[command(
    name = "payconnect",
    version,
    long_version = LONG_VERSION,
    after_help = HELP_BUILD_METADATA
)]
pub struct Args {
    /// HTTP method.
    #[arg(value_enum, ignore_case = true)]
    pub method: MethodArg,

    /// Path relative to the API base URL, e.g. `/invoices/iv_123`.
    pub path: String,

    /// Path to config file (default: ./payconnect.toml or the global config dir).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Override API base URL.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Authenticate with the project's private key.
    #[arg(long = "private")]
    pub private: bool,

    /// Merge device metadata into the JSON body.
    #[arg(long = "device-metadata")]
    pub device_metadata: bool,

    /// Send the request once, without retries.
    #[arg(long = "no-retry")]
    pub no_retry: bool,

    /// Log pipeline activity to stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Query parameter; may be repeated.
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE", value_parser = parse_query)]
    pub query: Vec<(String, String)>,

    /// Extra request header; may be repeated.
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Preferred response language.
    #[arg(long = "locale")]
    pub locale: Option<String>,

    /// JSON request body.
    #[arg(long = "body", value_name = "JSON", value_parser = parse_json)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Put,
    Delete,
}

impl From<MethodArg> for HttpMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Get => HttpMethod::Get,
            MethodArg::Post => HttpMethod::Post,
            MethodArg::Put => HttpMethod::Put,
            MethodArg::Delete => HttpMethod::Delete,
        }
    }
}

impl Args {
    /// The request described by the command line.
    pub fn request(&self) -> Request<Value> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let mut http = HttpRequest::new(self.method.into(), path);
        http.query = self.query.clone();
        for (name, value) in &self.headers {
            http.set_header(name.as_str(), value.as_str());
        }
        http.body = self.body.clone();
        http.locale = self.locale.clone();
        http.requires_private_key = self.private;
        http.includes_device_metadata = self.device_metadata;
        Request::from_http(http)
    }

    /// Apply command-line overrides on top of the loaded config and
    /// validate the result.
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(url) = &self.base_url {
            config.connector.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if self.no_retry {
            config.retry.enabled = false;
        }
        validate_config(config)
    }
}

fn parse_query(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty query key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_method_and_path() {
        let args = Args::parse_from(["payconnect", "GET", "invoices/iv_1"]);
        assert_eq!(args.method, MethodArg::Get);
        let request = args.request();
        assert_eq!(request.http().method, HttpMethod::Get);
        assert_eq!(request.http().path, "/invoices/iv_1");
        assert!(!request.http().requires_private_key);
    }

    #[test]
    fn base_url_override_is_validated() {
        let mut config = Config::default();
        let args = Args::parse_from([
            "payconnect",
            "GET",
            "/",
            "--base-url",
            "http://127.0.0.1:9000/",
            "--no-retry",
        ]);
        args.apply_overrides(&mut config).unwrap();
        assert_eq!(config.connector.base_url, "http://127.0.0.1:9000");
        assert!(!config.retry.enabled);

        for url in ["ftp://example.com", "", "/"] {
            let mut config = Config::default();
            let args = Args::parse_from(["payconnect", "GET", "/", "--base-url", url]);
            let err = args.apply_overrides(&mut config).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{url}: {err}");
        }
    }

    #[test]
    fn parses_request_options() {
        let args = Args::parse_from([
            "payconnect",
            "post",
            "/invoices",
            "--private",
            "--device-metadata",
            "-q",
            "expand=customer",
            "--query",
            "limit=10",
            "-H",
            "X-Trace: abc",
            "--locale",
            "fr",
            "--body",
            r#"{"amount":"10.00"}"#,
        ]);
        let request = args.request();
        let http = request.http();
        assert_eq!(http.method, HttpMethod::Post);
        assert_eq!(
            http.query,
            vec![
                ("expand".to_string(), "customer".to_string()),
                ("limit".to_string(), "10".to_string())
            ]
        );
        assert_eq!(http.header("x-trace"), Some("abc"));
        assert_eq!(http.locale.as_deref(), Some("fr"));
        assert_eq!(http.body, Some(json!({"amount": "10.00"})));
        assert!(http.requires_private_key);
        assert!(http.includes_device_metadata);
    }

    #[test]
    fn parses_global_flags() {
        let args = Args::parse_from([
            "payconnect",
            "-c",
            "dev.toml",
            "--base-url",
            "http://localhost:8080",
            "--no-retry",
            "-v",
            "delete",
            "/customers/cust_1",
        ]);
        assert_eq!(args.config.as_deref(), Some("dev.toml"));
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8080"));
        assert!(args.no_retry);
        assert!(args.verbose);
        assert_eq!(args.method, MethodArg::Delete);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Args::try_parse_from(["payconnect", "get", "/", "-q", "novalue"]).is_err());
        assert!(Args::try_parse_from(["payconnect", "post", "/", "--body", "{oops"]).is_err());
        assert!(Args::try_parse_from(["payconnect", "patch", "/"]).is_err());
        assert!(Args::try_parse_from(["payconnect", "get"]).is_err());
    }
}
