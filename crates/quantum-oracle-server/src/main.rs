//! Quantum Oracle CLI entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use quantum_oracle::{Fetcher, HttpFetcher, RandomByteAcquirer};
use quantum_oracle_server::config::{
    parse_exhaustion_policy, parse_rate_limit_policy, parse_source_list, OracleConfig,
};
use quantum_oracle_server::Oracle;

#[derive(Parser)]
#[command(
    name = "quantum-oracle",
    about = "Quantum coin flip and Magic 8 Ball backed by remote QRNG sources",
    version
)]
struct Cli {
    /// Base URL of a relay server used by the `lfd_proxy` source.
    /// Also reads from QUANTUM_ORACLE_PROXY_URL.
    #[arg(long, global = true)]
    proxy_url: Option<String>,

    /// What to do when every source fails (fail, pseudo).
    #[arg(long, global = true)]
    fallback: Option<String>,

    /// What to do when a source rate limits (abort, continue).
    #[arg(long, global = true)]
    rate_limit: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Flip the quantum coin (default).
    Flip {
        /// Number of flips to perform.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask the Magic 8 Ball a question.
    Ask {
        /// The question (optional; the ball answers regardless).
        question: Vec<String>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Acquire one raw byte.
    Byte {
        /// Comma-separated source chain, e.g. `anu_json,lfd`.
        #[arg(long)]
        sources: Option<String>,
    },

    /// Start the HTTP server (relay, flip, ask, health).
    #[cfg(feature = "http")]
    Serve {
        /// Listen address (host:port).
        /// Also reads from QUANTUM_ORACLE_ADDR.
        #[arg(long)]
        addr: Option<String>,

        /// Serve a pseudo-random byte from the relay when LfD fails.
        #[arg(long)]
        relay_fallback: bool,
    },

    /// Print the configured source chains as JSON.
    Sources,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   quantum-oracle completions bash > ~/.local/share/bash-completion/completions/quantum-oracle
    ///   quantum-oracle completions zsh > ~/.zfunc/_quantum-oracle
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

fn load_config(cli: &Cli) -> anyhow::Result<OracleConfig> {
    let mut config = OracleConfig::from_env()?;
    if let Some(url) = &cli.proxy_url {
        config.proxy_url = Some(url.clone());
    }
    if let Some(policy) = &cli.fallback {
        config.exhaustion = parse_exhaustion_policy(policy)?;
    }
    if let Some(policy) = &cli.rate_limit {
        let policy = parse_rate_limit_policy(policy)?;
        config.coin_rate_limit = policy;
        config.ball_rate_limit = policy;
    }
    Ok(config)
}

fn chain_json(acquirer: &RandomByteAcquirer) -> serde_json::Value {
    serde_json::json!({
        "rate_limit": format!("{:?}", acquirer.rate_limit_policy()),
        "exhaustion": format!("{:?}", acquirer.exhaustion_policy()),
        "sources": acquirer.sources().iter().map(|e| serde_json::json!({
            "id": e.source.id(),
            "label": e.source.label(),
            "url": e.url,
            "timeout_secs": e.timeout.as_secs(),
        })).collect::<Vec<_>>(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);

    match cli.command.unwrap_or(Commands::Flip {
        count: 1,
        json: false,
    }) {
        Commands::Flip { count, json } => {
            let oracle = Oracle::from_config(&config, fetcher);
            for _ in 0..count.max(1) {
                let outcome = oracle.flip().await?;
                if json {
                    println!("{}", serde_json::to_string(&outcome)?);
                } else {
                    println!("{} ({} via {})", outcome.side, outcome.value, outcome.source);
                }
            }
            if count > 1 && !json {
                let stats = oracle.stats();
                println!("heads: {}  tails: {}", stats.heads, stats.tails);
            }
        }

        Commands::Ask { question, json } => {
            let oracle = Oracle::from_config(&config, fetcher);
            let question = question.join(" ");
            let outcome = oracle.ask(Some(&question)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.answer);
                tracing::debug!(value = outcome.value, source = %outcome.source, "answer source");
            }
        }

        Commands::Byte { sources } => {
            let sources = match sources {
                Some(list) => parse_source_list(&list)?,
                None => config.coin_sources.clone(),
            };
            let chain = OracleConfig {
                coin_sources: sources,
                ..config.clone()
            }
            .coin_chain();
            let acquirer = RandomByteAcquirer::new(fetcher, chain)
                .with_rate_limit_policy(config.coin_rate_limit)
                .with_exhaustion_policy(config.exhaustion);
            let acquisition = acquirer.acquire().await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "value": acquisition.value,
                "source": acquisition.label(),
                "fallback": acquisition.provenance.is_fallback(),
            }))?);
        }

        #[cfg(feature = "http")]
        Commands::Serve {
            addr,
            relay_fallback,
        } => {
            use quantum_oracle_server::{resolve_addr, HttpTransport, Relay};

            let addr = resolve_addr(addr.as_deref());
            let relay_fallback = relay_fallback || config.relay_fallback;
            let oracle = Arc::new(Oracle::from_config(&config, fetcher.clone()));
            let relay = Arc::new(Relay::new(fetcher, config.relay_upstream(), relay_fallback));

            tracing::info!("Quantum Oracle server");
            tracing::info!("Relay upstream: {}", relay.upstream().url);
            if relay_fallback {
                tracing::info!("Relay fallback: pseudo-random bytes flagged with X-Random-Fallback");
            }

            let transport = HttpTransport::new(oracle, relay);
            transport.run(&addr).await?;
        }

        Commands::Sources => {
            let oracle = Oracle::from_config(&config, fetcher);
            let info = serde_json::json!({
                "coin": chain_json(oracle.coin_acquirer()),
                "ball": chain_json(oracle.ball_acquirer()),
                "relay_upstream": config.relay_upstream().url,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "quantum-oracle", &mut std::io::stdout());
        }

        Commands::Repl => {
            let oracle = Arc::new(Oracle::from_config(&config, fetcher));
            let runtime = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || quantum_oracle_server::repl::run(oracle, runtime))
                .await??;
        }
    }

    Ok(())
}
