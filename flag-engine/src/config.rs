use envconfig::Envconfig;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Comma separated role names, e.g. `admin, staff`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(pub BTreeSet<String>);

impl FromStr for RoleSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let roles: BTreeSet<String> = s
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(bad) = roles.iter().find(|role| role.contains(char::is_whitespace)) {
            return Err(format!("Invalid role name: {}", bad));
        }
        Ok(RoleSet(roles))
    }
}

impl Deref for RoleSet {
    type Target = BTreeSet<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "FLAGS_PATH", default = "flags.json")]
    pub flags_path: String,

    #[envconfig(from = "FLAGS_REFRESH_INTERVAL_SECONDS", default = "30")]
    pub flags_refresh_interval_seconds: u64,

    // 0 disables time-based expiry; entries then only go away on registry writes
    #[envconfig(from = "FLAG_CACHE_TTL_SECONDS", default = "60")]
    pub flag_cache_ttl_seconds: u64,

    #[envconfig(from = "FLAG_CACHE_MAX_ENTRIES", default = "100000")]
    pub flag_cache_max_entries: u64,

    #[envconfig(from = "INTERNAL_ROLES", default = "admin,staff")]
    pub internal_roles: RoleSet,

    #[envconfig(from = "QUALIFIED_MIN_COMPLETED_JOBS", default = "10")]
    pub qualified_min_completed_jobs: u32,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            flags_path: "flags.json".to_string(),
            flags_refresh_interval_seconds: 30,
            flag_cache_ttl_seconds: 60,
            flag_cache_max_entries: 10_000,
            internal_roles: RoleSet(["admin".to_string(), "staff".to_string()].into()),
            qualified_min_completed_jobs: 10,
            debug: FlexBool(false),
        }
    }

    pub fn flag_cache_ttl(&self) -> Option<Duration> {
        (self.flag_cache_ttl_seconds > 0).then(|| Duration::from_secs(self.flag_cache_ttl_seconds))
    }

    pub fn flags_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.flags_refresh_interval_seconds.max(1))
    }
}

pub static DEFAULT_TEST_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);
