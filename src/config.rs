use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket that hosts uploaded images.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Without a database the document store lives in memory.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
    pub reset_code_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "stylesync"),
            audience: env_or("JWT_AUDIENCE", "stylesync-app"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let endpoint = env_or("MEDIA_ENDPOINT", "http://localhost:9000");
        let media = MediaConfig {
            public_base_url: env_or("MEDIA_PUBLIC_BASE_URL", &endpoint),
            endpoint,
            bucket: env_or("MEDIA_BUCKET", "stylesync"),
            access_key: std::env::var("MEDIA_ACCESS_KEY")?,
            secret_key: std::env::var("MEDIA_SECRET_KEY")?,
            region: env_or("MEDIA_REGION", "us-east-1"),
        };
        Ok(Self {
            database_url,
            jwt,
            media,
            reset_code_ttl_minutes: env_parse("RESET_CODE_TTL_MINUTES", 30),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
