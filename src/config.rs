use crate::cli::RunArgs;
use crate::report::DEFAULT_LIVE_INTERVAL;
use crate::types::{LoadConfig, Proxy, Scenario, Step, Target};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONCURRENCY: u32 = 10;
const DEFAULT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub load: LoadSettings,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoadSettings {
    pub concurrency: Option<u32>,
    pub iterations: Option<u64>,
    #[serde(default, with = "humantime_serde::option")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default, with = "humantime_serde::option")]
    pub live_interval: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub id: u16,
    #[serde(default)]
    pub name: String,
    pub url: String,
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub sleep: String,
    #[serde(default)]
    pub abort_on_failure: bool,
}

pub fn load_config(path: &Path) -> Result<TomlConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file: {}", e))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<TomlConfig, String> {
    let content = interpolate_env_vars(content)?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
}

/// Expands `${VAR}` and `${VAR:-default}` from the process environment.
fn interpolate_env_vars(content: &str) -> Result<String, String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| format!("Invalid interpolation pattern: {}", e))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        let (var_name, default) = match var_expr.as_str().split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr.as_str(), None),
        };

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => return Err(format!("Environment variable '{}' not set", var_name)),
            },
        };

        result = result.replace(full_match.as_str(), &value);
    }

    Ok(result)
}

fn build_scenario(steps: Vec<StepConfig>) -> Result<Scenario, String> {
    if steps.is_empty() {
        return Err("Scenario must define at least one [[steps]] entry".to_string());
    }

    let sleep_re = regex_lite::Regex::new(r"^\d+(-\d+)?$")
        .map_err(|e| format!("Invalid sleep pattern: {}", e))?;
    let mut seen = HashSet::new();
    let mut scenario = Scenario::default();

    for step in steps {
        if !seen.insert(step.id) {
            return Err(format!("Duplicate step id: {}", step.id));
        }

        let method_str = step.method.as_deref().unwrap_or("GET");
        let method: reqwest::Method = method_str
            .to_uppercase()
            .parse()
            .map_err(|_| format!("Step {}: invalid HTTP method: {}", step.id, method_str))?;

        if !step.sleep.is_empty() && !sleep_re.is_match(&step.sleep) {
            return Err(format!(
                "Step {}: invalid sleep '{}'. Expected '<ms>' or '<min>-<max>'",
                step.id, step.sleep
            ));
        }

        let timeout = step.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(format!("Step {}: timeout must be greater than zero", step.id));
        }

        scenario.steps.push(Step {
            id: step.id,
            name: step.name,
            target: Target {
                url: step.url,
                method,
                headers: step.headers.into_iter().collect(),
                body: step.body,
                timeout,
            },
            sleep: step.sleep,
            abort_on_failure: step.abort_on_failure,
        });
    }

    Ok(scenario)
}

pub fn merge_config(args: &RunArgs, toml: TomlConfig) -> Result<LoadConfig, String> {
    let scenario = build_scenario(toml.steps)?;

    let concurrency = args
        .concurrency
        .or(toml.load.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err("Concurrency must be at least 1".to_string());
    }

    let iterations = args.iterations.or(toml.load.iterations).unwrap_or(0);

    // Unlimited iterations need a bound, so fall back to the default duration.
    let duration = match args.duration.or(toml.load.duration) {
        Some(d) if d.is_zero() => return Err("Duration must be greater than zero".to_string()),
        Some(d) => Some(d),
        None if iterations == 0 => Some(DEFAULT_DURATION),
        None => None,
    };

    let proxy_urls = if args.proxies.is_empty() {
        &toml.load.proxies
    } else {
        &args.proxies
    };
    let mut proxies = proxy_urls
        .iter()
        .map(|p| Proxy::parse(p))
        .collect::<Result<Vec<_>, _>>()?;
    if proxies.is_empty() {
        proxies.push(Proxy::Direct);
    }

    let live_interval = if args.no_live {
        None
    } else {
        Some(toml.load.live_interval.unwrap_or(DEFAULT_LIVE_INTERVAL))
    };

    let mut config = LoadConfig {
        scenario,
        proxies,
        concurrency,
        iterations,
        duration,
        live_interval,
        debug: args.debug,
    };

    if config.debug {
        config.iterations = 1;
        config.concurrency = 1;
        config.duration = None;
        config.proxies.truncate(1);
    }

    Ok(config)
}
