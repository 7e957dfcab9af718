use dotenv::dotenv;
use std::env;

/// Secrets that don't belong on a command line (§0 AMBIENT), loaded from
/// the process environment or a `.env` file.
#[allow(non_snake_case)]
pub struct EnvVars {
    pub FLEET_API_TOKEN: String,
}

impl EnvVars {
    pub fn load() -> Self {
        dotenv().ok();
        Self { FLEET_API_TOKEN: env::var("FLEET_API_TOKEN").unwrap_or_default() }
    }
}
