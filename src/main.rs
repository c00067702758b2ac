use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kodilink::adb::AdbTransport;
use kodilink::config::{Config, ConfigError};
use kodilink::device::{DeviceLink, GateConfig, ReachabilityGate, ShieldLink, parse_mac};
use kodilink::dispatch::Dispatcher;
use kodilink::doctor;
use kodilink::intent::{Intent, SpokenResponse};
use kodilink::kodi::KodiClient;
use kodilink::locale::Messages;
use kodilink::patcher::Patcher;
use kodilink::pipeline::Pipeline;
use kodilink::resolver::Resolver;
use kodilink::tmdb::TmdbClient;
use kodilink::trakt::TraktClient;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            if let ConfigError::NotFound(path) = &e {
                eprintln!("\nCreate a config file at: {}", path.display());
                eprintln!("\nExample config.toml:");
                eprintln!(
                    r#"
[device]
ip = "192.168.1.40"
mac = "AA:BB:CC:DD:EE:FF"

[kodi]
port = 8080

[tmdb]
apikey = "your-api-key"

[trakt]
enabled = true
client_id = "your-client-id"
access_token = "your-access-token"
"#
                );
            }
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if config.log.verbose { "debug" } else { "info" })
        }))
        .with_target(false)
        .init();

    let messages = match Messages::load() {
        Ok(messages) => Arc::new(messages),
        Err(e) => {
            eprintln!("Failed to load translations: {}", e);
            std::process::exit(1);
        }
    };

    let results = doctor::run_checks(&config).await;
    doctor::print_results(&results);

    // Config validation already checked the MAC.
    let Some(mac) = parse_mac(&config.device.mac) else {
        eprintln!("Invalid device.mac: {}", config.device.mac);
        std::process::exit(1);
    };

    let adb = Arc::new(AdbTransport::new(
        config.device.adb_host(),
        config.storage.temp_dir(),
    ));
    let kodi = KodiClient::new(
        &config.kodi_base_url(),
        config.kodi.user.clone(),
        config.kodi.pass.clone(),
    );
    let link: Arc<dyn DeviceLink> = Arc::new(ShieldLink::new(kodi.clone(), mac, adb.clone()));

    let history = match (&config.trakt.client_id, &config.trakt.access_token) {
        (Some(client_id), Some(access_token)) if config.trakt.enabled => {
            Some(TraktClient::new(client_id.clone(), access_token.clone()))
        }
        _ => None,
    };

    let pipeline = Arc::new(Pipeline::new(
        ReachabilityGate::new(link.clone(), GateConfig::default()),
        Resolver::new(TmdbClient::new(&config.tmdb.apikey)),
        history,
        Dispatcher::new(kodi, config.players.clone()),
        messages.clone(),
    ));

    let shutdown = CancellationToken::new();
    let scheduler = if config.patcher.enabled {
        let patcher = Arc::new(Patcher::new(
            ReachabilityGate::new(link.clone(), GateConfig::default()),
            adb.clone(),
            config.patcher.remote_path.clone(),
            config.patcher.marker.clone(),
        ));
        Some(patcher.spawn(
            Duration::from_secs(config.patcher.interval_secs),
            shutdown.clone(),
        ))
    } else {
        None
    };

    info!("ready, reading intents from stdin");

    // Front-end adapter: one JSON intent per line in, one JSON spoken
    // response per line out. The webhook layer lives outside this process.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Intent>(&line) {
                        Ok(intent) => {
                            // Requests may overlap; each runs its own pipeline.
                            let pipeline = pipeline.clone();
                            tokio::spawn(async move {
                                let response = pipeline.handle(&intent).await;
                                print_response(&response);
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "unparseable intent");
                            print_response(&SpokenResponse {
                                speech: messages.format("fr", "not_understood", &[]),
                                end_session: true,
                            });
                        }
                    }
                }
                Ok(None) => {
                    info!("stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    }

    shutdown.cancel();
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
}

fn print_response(response: &SpokenResponse) {
    match serde_json::to_string(response) {
        Ok(line) => println!("{}", line),
        Err(e) => error!(error = %e, "failed to serialize response"),
    }
}
