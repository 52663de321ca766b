use figment::providers::Env;
use figment::Figment;
use std::sync::OnceLock;

static CONFIG: OnceLock<Figment> = OnceLock::new();

/// Configuration from `OXIDUL_`-prefixed environment variables.
pub fn get_config() -> &'static Figment {
    CONFIG.get_or_init(|| {
        Figment::new()
            .merge(Env::prefixed("OXIDUL_").split("_"))
            .merge(Env::prefixed("OXIDUL_"))
    })
}
