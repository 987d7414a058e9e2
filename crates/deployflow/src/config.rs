// Runtime configuration, read from the environment (and an optional .env file).

#[derive(Clone, Debug)]
pub struct Config {
    /// None runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub api_addr: String,
    pub migrate_on_startup: bool,
    pub log_level: String,
    /// When false, 500 responses carry a generic message only.
    pub expose_error_details: bool,
    pub notify_on_developers_change: bool,
    pub mail: MailConfig,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub override_recipients: Vec<String>,
    pub recipient_domain: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            from_address: "noreply@localhost".to_string(),
            from_name: "Deployment Manager".to_string(),
            override_recipients: Vec::new(),
            recipient_domain: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
        let get_or = |primary: &str, fallback: &str| get(primary).or_else(|| get(fallback));

        let database_url = get("DATABASE_URL");

        let api_addr = match get("DEPLOYFLOW_API_ADDR") {
            Some(addr) => addr,
            None => match get("PORT") {
                Some(port) => {
                    let port: u16 = port
                        .trim()
                        .parse()
                        .map_err(|_| anyhow::anyhow!("PORT must be a port number, got {port:?}"))?;
                    format!("0.0.0.0:{port}")
                }
                None => "0.0.0.0:5000".to_string(),
            },
        };

        let migrate_on_startup = get("DEPLOYFLOW_MIGRATE_ON_STARTUP")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let log_level = get_or("DEPLOYFLOW_LOG", "LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let production = get("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let expose_error_details = get("DEPLOYFLOW_EXPOSE_ERRORS")
            .map(|v| parse_bool(&v))
            .unwrap_or(!production);

        let notify_on_developers_change = get("DEPLOYFLOW_NOTIFY_ON_DEVELOPERS_CHANGE")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let defaults = MailConfig::default();
        let smtp_port = match get("SMTP_PORT") {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("SMTP_PORT must be a port number, got {p:?}"))?,
            None => defaults.smtp_port,
        };

        let mail = MailConfig {
            smtp_host: get("SMTP_HOST"),
            smtp_port,
            username: get("SMTP_EMAIL"),
            password: get("SMTP_PASSWORD"),
            from_address: get_or("FROM_EMAIL", "SMTP_EMAIL").unwrap_or(defaults.from_address),
            from_name: get("FROM_NAME").unwrap_or(defaults.from_name),
            override_recipients: get("NOTIFICATION_EMAIL")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            recipient_domain: get("NOTIFICATION_DOMAIN"),
        };

        Ok(Self {
            database_url,
            api_addr,
            migrate_on_startup,
            log_level,
            expose_error_details,
            notify_on_developers_change,
            mail,
        })
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
