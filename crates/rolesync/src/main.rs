//! rolesync CLI
//!
//! Synchronizes PostgreSQL roles from an LDAP directory.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rolesync_core::SyncItem;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use rolesync::prelude::*;

/// Synchronize PostgreSQL roles from an LDAP directory.
#[derive(Parser)]
#[command(name = "rolesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, `-` for standard input.
    #[arg(short, long, env = "ROLESYNC_CONFIG")]
    config: PathBuf,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    dsn: Option<String>,

    /// LDAP server URI.
    #[arg(long, env = "LDAPURI")]
    ldap_uri: Option<String>,

    /// LDAP bind DN.
    #[arg(long, env = "LDAPBINDDN")]
    ldap_binddn: Option<String>,

    /// LDAP bind password.
    #[arg(long, env = "LDAPPASSWORD", hide_env_values = true)]
    ldap_password: Option<String>,

    /// Enable verbose output, including executed SQL.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and show compiled rules.
    Check,

    /// Connect to the directory and show the bound identity.
    Whoami,

    /// Show static roles with options rendered for the instance.
    Roles,

    /// Run reconciliation statements from a YAML file.
    Apply {
        /// Statements file, `-` for standard input.
        #[arg(short, long)]
        operations: PathBuf,

        /// Execute statements. Without this flag, only log them.
        #[arg(long)]
        real: bool,

        /// Channel capacity between reader and executor.
        #[arg(long, default_value_t = 64)]
        buffer: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let ansi = std::io::stderr().is_terminal();
    let subscriber = rolesync::logging::subscriber(log_level, std::io::stderr, ansi);
    tracing::subscriber::set_global_default(subscriber)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted.");
            on_signal.cancel();
        }
    });

    let mut config = Config::load(&cli.config)?;
    if cli.dsn.is_some() {
        config.postgres.dsn = cli.dsn;
    }
    let ldap = config
        .ldap
        .clone()
        .merge(cli.ldap_uri, cli.ldap_binddn, cli.ldap_password);

    match cli.command {
        Commands::Check => {
            print_rules(&config.rules);
            info!(items = config.rules.len(), "Configuration is valid.");
        }

        Commands::Whoami => {
            let session = DirectorySession::connect(
                ldap.uri()?,
                ldap.binddn.as_deref(),
                ldap.password.as_deref(),
                &Backoff::default(),
                &cancel,
            )
            .await?;
            println!("{}", session.authzid());
            session.close().await;
        }

        Commands::Roles => {
            let pool = DbPool::from_config(&config.postgres)?;
            let database = pool.default_database();
            let mut conn = pool.acquire(&cancel, &database).await?;
            let instance = InstanceInfo::fetch(&mut conn).await?;
            drop(conn);
            let registry = instance.registry();

            for rule in config.static_items().flat_map(|item| &item.roles) {
                let Some(role) = rule.generate_static() else {
                    continue;
                };
                let options = role.options.render(&registry);
                println!("{} {}", role.name, options);
                for parent in &role.parents {
                    println!("  member of {parent}");
                }
                println!("  comment: {}", role.comment);
            }
            pool.close().await;
        }

        Commands::Apply {
            operations,
            real,
            buffer,
        } => {
            let queries = read_operations(&operations)?;
            let total = queries.len();
            if !real {
                info!("Dry run mode - statements will be logged but not executed.");
            }

            let (tx, mut rx) = mpsc::channel(buffer.max(1));
            let producer = tokio::spawn(async move {
                for query in queries {
                    if tx.send(query).await.is_err() {
                        break;
                    }
                }
            });

            let pool = DbPool::from_config(&config.postgres)?;
            let mut watch = StopWatch::new();
            let result = apply(&cancel, &mut watch, &pool, &mut rx, real).await;
            drop(rx);
            producer.await?;
            pool.close().await;

            match result {
                Ok(count) => {
                    info!(
                        count,
                        elapsed_ms = watch.total().as_millis(),
                        "Synchronization complete."
                    );
                }
                Err(err) => {
                    let applied = match err.source {
                        Error::Execution { .. } => watch.count().saturating_sub(1),
                        _ => watch.count(),
                    };
                    error!(applied, observed = err.count, total, "Synchronization aborted.");
                    return Err(err.into());
                }
            }
        }
    }

    Ok(())
}

fn print_rules(items: &[SyncItem]) {
    for item in items {
        println!(
            "{}",
            item.description.as_deref().unwrap_or("(no description)")
        );
        if let Some(search) = &item.search {
            println!("  search: {} ({:?}) {}", search.base, search.scope, search.filter);
            let attributes: Vec<&str> = search.attributes.iter().map(String::as_str).collect();
            println!("  attributes: {}", attributes.join(", "));
            if let Some((join, sub)) = search.subsearch() {
                let attributes: Vec<&str> = sub.attributes.iter().map(String::as_str).collect();
                println!("  join {join}: {} {}", sub.filter, attributes.join(", "));
            }
        }
        for rule in &item.roles {
            let kind = if rule.is_static() { "static" } else { "dynamic" };
            println!("  {kind} role {}", rule.name);
        }
    }
}

fn read_operations(path: &Path) -> anyhow::Result<Vec<SyncQuery>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_yaml::from_str(&text)?)
}
