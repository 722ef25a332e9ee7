use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use mining_console::api::{ApiClient, Credentials, Host, LogoutAck};
use mining_console::config::{
	ConsoleConfig, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use mining_console::sync::{
	BlockchainSyncEngine, ChainView, EventDispatcher, LogStore, LogSyncEngine, SyncError,
	SyncEvent, SyncEventHandler, SyncMonitor,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mining-console")]
#[command(about = "Monitoring console for the mining backend", long_about = None)]
struct Cli {
	/// Base URI of the administration API
	#[arg(long, env = "CONSOLE_BASE_URI")]
	base_uri: String,

	/// Seconds before an API call is abandoned
	#[arg(long, env = "CONSOLE_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
	request_timeout_secs: u64,

	/// Seconds between two synchronization rounds
	#[arg(long, env = "CONSOLE_POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
	poll_interval_secs: u64,

	/// Account used to log in
	#[arg(short, long, env = "CONSOLE_USERNAME", default_value = "admin")]
	username: String,

	/// Password of the login account
	#[arg(long, env = "CONSOLE_PASSWORD", hide_env_values = true)]
	password: String,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Poll logs and chains of every host until interrupted
	Watch,
	/// Fetch the logs of one host once
	Logs {
		/// 1, 2, 3 or web
		#[arg(long)]
		host: Host,
	},
	/// Fetch the chain of one miner once
	Chain {
		/// 1, 2 or 3
		#[arg(long)]
		host: Host,
	},
	/// Change the password of the login account
	ChangePassword {
		#[arg(long, env = "CONSOLE_NEW_PASSWORD", hide_env_values = true)]
		new_password: String,
	},
	/// Create an account
	CreateAccount {
		#[arg(long)]
		account: String,
		#[arg(long, env = "CONSOLE_ACCOUNT_PASSWORD", hide_env_values = true)]
		account_password: String,
		/// Grant edit rights
		#[arg(long)]
		editor: bool,
	},
	/// Delete an account
	DeleteAccount {
		#[arg(long)]
		account: String,
	},
}

/// Prints merged log lines and chain updates as they arrive
struct ConsoleRenderer {
	logs: Arc<LogStore>,
}

#[async_trait::async_trait]
impl SyncEventHandler for ConsoleRenderer {
	async fn handle(&self, event: &SyncEvent) -> Result<(), SyncError> {
		match event {
			SyncEvent::LogsMerged { host, appended, .. } => {
				let entries = self.logs.entries(*host).await;
				for entry in &entries[entries.len().saturating_sub(*appended)..] {
					println!("[{}] #{} {}", host.label(), entry.no, entry.message);
				}
			}
			SyncEvent::ChainReplaced { host, blocks } => {
				println!("[{}] chain: {} blocks", host.label(), blocks);
			}
			SyncEvent::StaleEntriesDropped { .. } | SyncEvent::SyncFailed { .. } => {}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"ConsoleRenderer"
	}
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		error!("Failed to listen for Ctrl-C: {}", e);
		std::future::pending::<()>().await;
	}
}

async fn watch(client: &ApiClient, credentials: &Credentials, config: &ConsoleConfig) -> Result<()> {
	let logs = Arc::new(LogStore::new());
	let chains = Arc::new(ChainView::new());

	let mut dispatcher = EventDispatcher::new();
	dispatcher.register_handler(Box::new(ConsoleRenderer { logs: logs.clone() }));
	let dispatcher = Arc::new(dispatcher);

	let monitor = SyncMonitor::new(
		LogSyncEngine::with_events(client.clone(), logs.clone(), dispatcher.clone()),
		BlockchainSyncEngine::with_events(client.clone(), chains, dispatcher),
		config.poll_interval,
	);

	loop {
		match monitor.run(shutdown_signal()).await {
			Ok(()) => break,
			Err(e) if e.needs_login() => {
				warn!("Session lost, logging in again");
				client.login(credentials).await.context("login failed")?;
			}
			Err(e) => return Err(e.into()),
		}
	}

	for host in Host::ALL {
		info!("{}: {}", host, logs.stats(host).await.summary());
	}
	Ok(())
}

async fn execute(
	command: Commands,
	client: &ApiClient,
	credentials: &Credentials,
	config: &ConsoleConfig,
) -> Result<()> {
	match command {
		Commands::Watch => watch(client, credentials, config).await?,
		Commands::Logs { host } => {
			let store = Arc::new(LogStore::new());
			let engine = LogSyncEngine::new(client.clone(), store.clone());
			engine.poll(host).await?;
			print!("{}", store.render_host_text(host).await);
		}
		Commands::Chain { host } => {
			let view = Arc::new(ChainView::new());
			let engine = BlockchainSyncEngine::new(client.clone(), view.clone());
			engine.refresh(host).await?;
			for block in view.blocks(host).await.iter() {
				println!(
					"{} <- {} @{} {}",
					block.hash, block.previous_hash, block.timestamp, block.payload
				);
			}
		}
		Commands::ChangePassword { new_password } => {
			client
				.change_password(&credentials.password, &new_password)
				.await?;
		}
		Commands::CreateAccount {
			account,
			account_password,
			editor,
		} => {
			client
				.create_account(&Credentials::new(account, account_password), editor)
				.await?;
		}
		Commands::DeleteAccount { account } => {
			client.delete_account(&account).await?;
		}
	}
	Ok(())
}

async fn run(cli: Cli) -> Result<()> {
	let config = ConsoleConfig::new(
		&cli.base_uri,
		cli.request_timeout_secs,
		cli.poll_interval_secs,
	)?;
	let client = ApiClient::http(config.base_uri.clone(), config.request_timeout)?;
	let credentials = Credentials::new(cli.username, cli.password);

	client.login(&credentials).await.context("login failed")?;

	let outcome = execute(cli.command, &client, &credentials, &config).await;

	match client.logout().await {
		Ok(LogoutAck::Confirmed) => {}
		Ok(LogoutAck::LocalOnly(e)) => warn!("Logout not confirmed: {}", e),
		Err(e) => warn!("Logout skipped: {}", e),
	}

	outcome
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.init();

	info!("Starting mining console");
	run(Cli::parse()).await
}
