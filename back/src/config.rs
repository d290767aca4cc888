use std::path::PathBuf;

use clap::{builder::BoolishValueParser, ArgAction, Args, Parser, ValueEnum};

/// Everything the server needs, read once from flags and environment.
#[derive(Clone, Debug, Parser)]
#[command(
    name = "todo-server",
    version,
    about = "REST API for to-do items",
    args_override_self = true
)]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "SSL_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "SSL_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub db: DbConfig,

    #[command(flatten)]
    pub auth: AuthConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DbKind {
    Sqlite,
    Postgres,
}

#[derive(Clone, Debug, Args)]
pub struct DbConfig {
    #[arg(long, env = "DB_TYPE", value_enum, ignore_case = true)]
    pub db_type: DbKind,

    /// Connection string, may reference {host}, {port}, {database}, {user}
    /// and {pass}. The `{{.Host}}` spelling of older deployments also works.
    #[arg(long, env = "DB_DSN")]
    pub db_dsn: String,

    #[arg(long, env = "DB_HOST", default_value = "")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value = "")]
    pub db_port: String,

    #[arg(long, env = "DB_DATABASE", default_value = "")]
    pub db_database: String,

    #[arg(long, env = "DB_USER", default_value = "")]
    pub db_user: String,

    #[arg(long, env = "DB_PASS", default_value = "", hide_env_values = true)]
    pub db_pass: String,

    /// Accepts true/false, yes/no, on/off or 1/0 in any case.
    #[arg(
        long,
        env = "DB_AUTO_MIGRATE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub db_auto_migrate: bool,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,
}

impl DbConfig {
    /// Expands the placeholders in the DSN template.
    pub fn dsn(&self) -> eyre::Result<String> {
        let mut dsn = String::with_capacity(self.db_dsn.len());
        let mut rest = self.db_dsn.as_str();

        while let Some(start) = rest.find('{') {
            dsn.push_str(&rest[..start]);
            rest = &rest[start..];

            let (open, close) = if rest.starts_with("{{") {
                ("{{", "}}")
            } else {
                ("{", "}")
            };

            let Some(end) = rest.find(close) else {
                eyre::bail!("unterminated placeholder in DB_DSN");
            };

            let name = rest[open.len()..end].trim();
            let name = name.strip_prefix('.').unwrap_or(name);

            let Some(value) = self.placeholder(name) else {
                eyre::bail!("unknown placeholder {} in DB_DSN", &rest[..end + close.len()]);
            };

            dsn.push_str(value);
            rest = &rest[end + close.len()..];
        }

        dsn.push_str(rest);

        Ok(dsn)
    }

    fn placeholder(&self, name: &str) -> Option<&str> {
        let value = match name.to_ascii_lowercase().as_str() {
            "host" => &self.db_host,
            "port" => &self.db_port,
            "database" => &self.db_database,
            "user" => &self.db_user,
            "pass" => &self.db_pass,
            _ => return None,
        };

        Some(value)
    }
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Identity provider domain, e.g. `<instance>.zitadel.cloud`. Replaces
    /// ZITADEL_DOMAIN; the key file login is replaced by client credentials.
    #[arg(long, env = "AUTH_DOMAIN")]
    pub auth_domain: String,

    #[arg(long, env = "AUTH_PORT", default_value_t = 443)]
    pub auth_port: u16,

    /// Talk to the identity provider over plain http.
    #[arg(
        long,
        env = "AUTH_INSECURE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub auth_insecure: bool,

    #[arg(long, env = "AUTH_CLIENT_ID")]
    pub auth_client_id: String,

    #[arg(long, env = "AUTH_CLIENT_SECRET", hide_env_values = true)]
    pub auth_client_secret: String,
}

impl AuthConfig {
    pub fn introspection_url(&self) -> String {
        let scheme = if self.auth_insecure { "http" } else { "https" };
        format!(
            "{scheme}://{}:{}/oauth/v2/introspect",
            self.auth_domain, self.auth_port
        )
    }
}
