use crate::config::Config;
use crate::kodi::KodiClient;

pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
        }
    }

    fn warning(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
        }
    }

    fn error(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        }
    }

    pub fn color(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "\x1b[32m",      // green
            CheckStatus::Warning => "\x1b[33m", // yellow
            CheckStatus::Error => "\x1b[31m",   // red
        }
    }
}

/// Show enough of a credential to recognize it, never the whole thing.
fn masked(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() >= 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "configured".to_string()
    }
}

pub async fn run_checks(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    results.push(check_adb_binary());
    results.push(check_device(config).await);
    results.push(check_tmdb(config));
    results.push(check_trakt(config));
    results.push(check_patcher(config));
    results.push(check_storage(config));

    results
}

fn check_adb_binary() -> CheckResult {
    match which::which("adb") {
        Ok(path) => CheckResult::ok("adb", &format!("found at {}", path.display())),
        Err(_) => CheckResult::error("adb", "'adb' not found in PATH - wake fallbacks and patching will fail"),
    }
}

async fn check_device(config: &Config) -> CheckResult {
    let kodi = KodiClient::new(
        &config.kodi_base_url(),
        config.kodi.user.clone(),
        config.kodi.pass.clone(),
    );

    if kodi.probe().await {
        CheckResult::ok("Device", &format!("Kodi answering at {}", config.kodi_base_url()))
    } else {
        // Not an error: the box is probably asleep and the gate will wake it.
        CheckResult::warning(
            "Device",
            &format!("no answer from {} (asleep?)", config.kodi_base_url()),
        )
    }
}

fn check_tmdb(config: &Config) -> CheckResult {
    CheckResult::ok("TMDB", &format!("API key {}", masked(&config.tmdb.apikey)))
}

fn check_trakt(config: &Config) -> CheckResult {
    if !config.trakt.enabled {
        return CheckResult::warning("Trakt", "disabled - resume requests will be refused");
    }
    CheckResult::ok("Trakt", "configured with access token")
}

fn check_patcher(config: &Config) -> CheckResult {
    if !config.patcher.enabled {
        return CheckResult::warning("Patcher", "disabled");
    }
    CheckResult::ok(
        "Patcher",
        &format!("active, every {}s", config.patcher.interval_secs),
    )
}

fn check_storage(config: &Config) -> CheckResult {
    let temp_dir = config.storage.temp_dir();

    if temp_dir.exists() {
        let test_file = temp_dir.join(".kodilink_test");
        match std::fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_file);
                CheckResult::ok("Storage", &format!("temp dir: {}", temp_dir.display()))
            }
            Err(e) => CheckResult::error("Storage", &format!("temp dir not writable: {}", e)),
        }
    } else {
        match std::fs::create_dir_all(&temp_dir) {
            Ok(_) => CheckResult::ok(
                "Storage",
                &format!("created temp dir: {}", temp_dir.display()),
            ),
            Err(e) => CheckResult::error("Storage", &format!("cannot create temp dir: {}", e)),
        }
    }
}

pub fn print_results(results: &[CheckResult]) {
    let reset = "\x1b[0m";

    println!("\nkodilink startup checks\n");

    for result in results {
        println!(
            "  {}{} {}{}  {}",
            result.color(),
            result.icon(),
            result.name,
            reset,
            result.message
        );
    }

    println!();

    let errors = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Error))
        .count();
    let warnings = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Warning))
        .count();

    if errors > 0 {
        println!("  {} error(s), {} warning(s)\n", errors, warnings);
    } else if warnings > 0 {
        println!("  {} warning(s) - running with limited features\n", warnings);
    } else {
        println!("  All checks passed\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_never_leaks_middle() {
        let m = masked("abcdef1234567890");
        assert_eq!(m, "abcd...7890");
        assert!(!m.contains("1234"));
        assert_eq!(masked("short"), "configured");
    }

    #[test]
    fn test_masked_handles_multibyte_credentials() {
        assert_eq!(masked("clé-secrète-12345"), "clé-...2345");
        assert_eq!(masked("émoji🔑"), "configured");
    }
}
