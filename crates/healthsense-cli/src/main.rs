use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use healthsense_core::{
    AgentOrchestrator, DiagnosticInfoAgent, DoctorInfoAgent, EmergencyServicesAgent,
    HospitalComparisonAgent, LlmProvider, ModelRouter, OpenAiProvider, SqlDatabase,
    classify_query, validate_message,
};
use healthsense_gateway::{GatewayServer, GatewayState, ServiceAgents};

mod config;

use config::{HealthConfig, LlmConfig, expand_path};

#[derive(Parser)]
#[command(name = "healthsense")]
#[command(version)]
#[command(about = "HealthSense, a multi-agent healthcare information service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Send a one-shot message through the dispatcher
    Ask {
        /// The message to send
        message: String,
    },

    /// Show which agent a message would be routed to
    Classify {
        message: String,
    },

    /// Write the default config to ~/.healthsense/config.toml
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Serve => cmd_serve(&cli.config).await,
        Commands::Ask { message } => cmd_ask(&cli.config, &message).await,
        Commands::Classify { message } => cmd_classify(&message),
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        tokio::fs::write(&config_path, config::DEFAULT_CONFIG).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("HealthSense initialized at {}", config_dir.display());
    println!(
        "Set OPENAI_API_KEY and edit {} to point at your datasets.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = HealthConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

fn cmd_classify(message: &str) -> Result<()> {
    let message = validate_message(message)?;
    println!("{}", classify_query(message));
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, message: &str) -> Result<()> {
    let message = validate_message(message)?;
    let cfg = HealthConfig::load(config_path)?;
    let agents = build_agents(&cfg)?;
    let orchestrator = AgentOrchestrator::new(agents.roster());

    let outcome = orchestrator.process_query(message, &[]).await;
    println!("[{}]", outcome.agent_used);
    println!("{}", outcome.response);
    Ok(())
}

async fn cmd_serve(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = HealthConfig::load(config_path)?;
    info!("Starting HealthSense (model: {})", cfg.llm.model);

    let bind: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid server address {}:{}",
                cfg.server.host, cfg.server.port
            )
        })?;

    let agents = build_agents(&cfg)?;
    let state = GatewayState::new(agents, cfg.llm.model.clone(), cfg.llm.api_key_set())
        .with_static_dir(expand_path(&cfg.server.static_dir));
    let server = GatewayServer::new(bind, state);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    server.run(cancel).await
}

/// One shared provider, then each agent independently; a failing agent is left out
fn build_agents(cfg: &HealthConfig) -> Result<ServiceAgents> {
    if !cfg.llm.api_key_set() {
        warn!("OPENAI_API_KEY is not set; all agents are disabled");
        return Ok(ServiceAgents::default());
    }

    let provider: Arc<dyn LlmProvider> = Arc::new(build_router(&cfg.llm)?);

    let runtime = cfg.agents.runtime();
    let data = &cfg.data;

    let emergency = init_agent("Emergency", || {
        let db = SqlDatabase::open(expand_path(&data.emergency_db))?;
        let agent = EmergencyServicesAgent::new(
            provider.clone(),
            Arc::new(db),
            &expand_path(&data.emergency_csv),
        )?;
        Ok(agent.with_config(runtime))
    });

    let doctor = init_agent("Doctor", || {
        let db = SqlDatabase::open(expand_path(&data.appointments_db))?;
        let agent = DoctorInfoAgent::new(
            provider.clone(),
            Arc::new(db),
            &expand_path(&data.doctors_csv),
            &expand_path(&data.slots_csv),
        )?;
        Ok(agent.with_config(runtime))
    });

    let diagnostic = init_agent("Diagnostic", || {
        let agent =
            DiagnosticInfoAgent::new(provider.clone(), &expand_path(&data.diagnostic_csv))?;
        Ok(agent.with_config(runtime))
    });

    let hospital = init_agent("Hospital", || {
        let agent =
            HospitalComparisonAgent::new(provider.clone(), &expand_path(&data.hospital_csv))?;
        Ok(agent.with_config(runtime))
    });

    Ok(ServiceAgents {
        emergency,
        doctor,
        diagnostic,
        hospital,
    })
}

/// Primary model first, then each configured fallback, behind one retrying router
fn build_router(llm: &LlmConfig) -> Result<ModelRouter> {
    let primary = OpenAiProvider::new(
        llm.api_key.clone(),
        llm.model.clone(),
        llm.base_url.clone(),
        llm.max_tokens,
        llm.request_timeout(),
    )?
    .with_temperature(llm.temperature);
    let mut providers: Vec<Arc<dyn LlmProvider>> = vec![Arc::new(primary)];

    for fallback in llm.resolved_fallbacks() {
        let provider = OpenAiProvider::new(
            fallback.api_key,
            fallback.model.clone(),
            fallback.base_url,
            llm.max_tokens,
            llm.request_timeout(),
        )
        .with_context(|| format!("Failed to configure fallback model {}", fallback.model))?
        .with_temperature(llm.temperature);
        providers.push(Arc::new(provider));
    }

    let router = if providers.len() == 1 {
        info!("OpenAI provider initialized (model: {})", llm.model);
        ModelRouter::single(providers.remove(0))
    } else {
        info!(
            "OpenAI provider initialized (model: {}, {} fallback(s))",
            llm.model,
            providers.len() - 1
        );
        ModelRouter::with_failover(providers)?
    };
    Ok(router
        .with_max_retries(llm.max_retries)
        .with_base_retry_delay(llm.retry_delay()))
}

fn init_agent<T>(label: &str, build: impl FnOnce() -> Result<T>) -> Option<Arc<T>> {
    match build() {
        Ok(agent) => {
            info!("{} agent initialized", label);
            Some(Arc::new(agent))
        }
        Err(e) => {
            warn!("Could not initialize {} agent: {:#}", label, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthsense_core::IntentCategory;

    fn config_with_data(dir: &tempfile::TempDir, api_key: &str) -> HealthConfig {
        let mut cfg = HealthConfig::builtin().unwrap();
        cfg.llm.api_key = api_key.to_string();
        let path = |name: &str| dir.path().join(name).display().to_string();
        cfg.data.emergency_db = path("emergency.db");
        cfg.data.appointments_db = path("appointments.db");
        cfg.data.emergency_csv = path("missing_emergency.csv");
        cfg.data.doctors_csv = path("missing_doctors.csv");
        cfg.data.slots_csv = path("missing_slots.csv");
        cfg.data.diagnostic_csv = path("missing_lab_tests.csv");
        cfg.data.hospital_csv = path("hospitals.csv");
        std::fs::write(dir.path().join("hospitals.csv"), "Name,City\nCity Care,Springfield\n")
            .unwrap();
        cfg
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["healthsense", "-d", "classify", "I need an ambulance"]);
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Classify { .. }));

        let cli = Cli::parse_from(["healthsense", "serve", "--config", "/tmp/hs.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/hs.toml")));
    }

    #[test]
    fn test_no_api_key_disables_agents() {
        let dir = tempfile::TempDir::new().unwrap();
        let agents = build_agents(&config_with_data(&dir, "")).unwrap();
        let roster = agents.roster();
        for category in IntentCategory::ALL {
            assert!(!roster.is_ready(category));
        }
    }

    #[test]
    fn test_agents_fail_independently() {
        let dir = tempfile::TempDir::new().unwrap();
        let agents = build_agents(&config_with_data(&dir, "sk-test-key-123456")).unwrap();

        // SQL-backed agents start with empty tables; dataframe agents need their CSV
        assert!(agents.emergency.is_some());
        assert!(agents.doctor.is_some());
        assert!(agents.diagnostic.is_none());
        assert!(agents.hospital.is_some());
    }

    #[test]
    fn test_router_includes_fallbacks() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = config_with_data(&dir, "sk-test-key-123456");
        assert_eq!(build_router(&cfg.llm).unwrap().provider_count(), 1);

        cfg.llm.fallbacks = vec![
            config::FallbackConfig {
                model: "gpt-4o-mini".to_string(),
                ..Default::default()
            },
            config::FallbackConfig {
                model: "llama3".to_string(),
                api_key: "ollama".to_string(),
                base_url: "http://localhost:11434".to_string(),
            },
        ];
        let router = build_router(&cfg.llm).unwrap();
        assert_eq!(router.provider_count(), 3);
        assert_eq!(router.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_classify_rejects_blank() {
        assert!(cmd_classify("   ").is_err());
        assert!(cmd_classify("Compare hospitals near me").is_ok());
    }
}
