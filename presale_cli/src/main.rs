mod commands;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use commands::{Cli, Commands, ConfigCommands, OutputFormat};
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use log::{info, warn};
use presale_core::amount::format_fixed;
use presale_core::gas::GasPricePoller;
use presale_core::native::{EthersChainClient, FileDocumentStore, LocalWalletSigner};
use presale_core::referral::{fetch_uplines, list_downlines};
use presale_core::staking::{self, Compounding};
use presale_core::{
    BurnPreview, FlowReport, FlowState, InputAsset, LedgerWriter, PurchaseIntent, PurchasePreview, PurchaseService,
    RecordOutcome, Session, Settings, TransactionRecord,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

const STARTER_CONFIG: &str = include_str!("../../config.example.toml");

// How long a preview waits for the first gas price before showing it as unknown
const GAS_PRICE_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    if let Err(error) = handle_command(cli).await {
        eprintln!("{} {}", "ERROR:".red(), error);
        std::process::exit(1);
    }
}

async fn handle_command(cli: Cli) -> Result<(), String> {
    match &cli.command {
        Commands::Config { command } => handle_config_command(command, &cli),

        Commands::Completion { shell, output } => handle_completion_generation(*shell, output.clone()),

        Commands::History { limit, format } => {
            let settings = load_config(&cli.config)?;
            handle_history(&settings, *limit, *format).await
        }

        Commands::Uplines { address } => {
            let settings = load_config(&cli.config)?;
            handle_uplines(&settings, address.as_deref()).await
        }

        Commands::Referrals { format } => {
            let settings = load_config(&cli.config)?;
            handle_referrals(&settings, *format).await
        }

        Commands::Staking { apr, compounding } => {
            handle_staking(apr, (*compounding).into());
            Ok(())
        }

        Commands::Balances => {
            let (service, _) = build_service(load_config(&cli.config)?)?;
            handle_balances(&service).await
        }

        Commands::Quote { asset, amount, sponsor } => {
            let (service, chain) = build_service(load_config(&cli.config)?)?;
            let intent = read_intent(&service, (*asset).into(), amount, sponsor).await;
            let gas_price = current_gas_price(chain, service.settings()).await;
            let preview = service.preview(&intent, gas_price).await;
            print_preview(&service, &preview).await;
            Ok(())
        }

        Commands::Buy { asset, amount, sponsor } => {
            let (service, chain) = build_service(load_config(&cli.config)?)?;
            service.ensure_network().await.map_err(|e| e.to_string())?;

            let intent = read_intent(&service, (*asset).into(), amount, sponsor).await;
            let gas_price = current_gas_price(chain, service.settings()).await;
            let preview = service.preview(&intent, gas_price).await;
            print_preview(&service, &preview).await;

            if !preview.can_submit() {
                return Err("Purchase refused, see the checks above".to_string());
            }
            if cli.dry_run {
                println!("DRY RUN: purchase not submitted");
                return Ok(());
            }
            submit(service, Submission::Purchase(intent)).await
        }

        Commands::Burn { amount } => {
            let (service, chain) = build_service(load_config(&cli.config)?)?;
            service.ensure_network().await.map_err(|e| e.to_string())?;

            let gas_price = current_gas_price(chain, service.settings()).await;
            let preview = service.burn_preview(amount, gas_price).await.map_err(|e| e.to_string())?;
            print_burn_preview(service.settings(), &preview);

            if preview.amount.is_zero() {
                return Err("Amount must be greater than zero".to_string());
            }
            if !preview.can_submit() {
                return Err("Burn refused, see the checks above".to_string());
            }
            if cli.dry_run {
                println!("DRY RUN: burn not submitted");
                return Ok(());
            }
            submit(service, Submission::Burn(amount.clone())).await
        }
    }
}

fn resolve_config_path(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var("HOME")) {
        (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn load_config(path: &Path) -> Result<Settings, String> {
    let path = resolve_config_path(path);
    if !path.exists() {
        return Err(format!(
            "Configuration file not found: {} (create one with `presale config init`)",
            path.display()
        ));
    }
    let settings = Settings::from_file(&path.to_string_lossy()).map_err(|e| e.to_string())?;
    settings.validate().map_err(|e| e.to_string())?;
    Ok(settings)
}

fn connect(settings: &Settings) -> Result<(Provider<Http>, Arc<EthersChainClient>), String> {
    let addresses = settings.addresses().map_err(|e| e.to_string())?;
    let provider = Provider::<Http>::try_from(settings.rpc_url.as_str())
        .map_err(|e| format!("Invalid RPC URL {}: {}", settings.rpc_url, e))?;
    let chain = EthersChainClient::from_provider(Arc::new(provider.clone()), addresses.sale).map_err(|e| e.to_string())?;
    Ok((provider, Arc::new(chain)))
}

fn open_ledger(settings: &Settings) -> Arc<LedgerWriter> {
    let store = Arc::new(FileDocumentStore::new(PathBuf::from(&settings.ledger_dir)));
    Arc::new(LedgerWriter::new(store, settings.user_uid.clone()))
}

/// Wire the ethers client, the local wallet and the file ledger into a service.
fn build_service(settings: Settings) -> Result<(PurchaseService, Arc<EthersChainClient>), String> {
    let key = settings
        .wallet_private_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| "No wallet_private_key configured (set it in the config or PRESALE_WALLET_PRIVATE_KEY)".to_string())?;
    let (provider, chain) = connect(&settings)?;
    let wallet = LocalWalletSigner::new(provider, &key, settings.chain_id).map_err(|e| e.to_string())?;
    let ledger = open_ledger(&settings);
    let service = PurchaseService::new(chain.clone(), Arc::new(wallet), ledger, settings).map_err(|e| e.to_string())?;
    info!("Wallet {:?} ready", service.account());
    Ok((service, chain))
}

async fn read_intent(service: &PurchaseService, asset: InputAsset, amount: &str, sponsor: &str) -> PurchaseIntent {
    let intent = service.intent(asset, amount, sponsor).await;
    if intent.sponsor.is_rejected() {
        println!(
            "{} sponsor '{}' is not an address, continuing without a sponsor",
            "WARNING:".yellow(),
            sponsor.trim()
        );
    }
    intent
}

/// First price published by a short-lived poller, `None` if it never arrives.
async fn current_gas_price(chain: Arc<EthersChainClient>, settings: &Settings) -> Option<U256> {
    let session = Session::new();
    let poller = GasPricePoller::start(chain, Duration::from_secs(settings.gas_price_poll_secs), session.handle());
    let mut updates = poller.subscribe();
    if tokio::time::timeout(GAS_PRICE_WAIT, updates.wait_for(|p| p.is_some())).await.is_err() {
        warn!("No gas price within {:?}; gas cost shown as unknown", GAS_PRICE_WAIT);
    }
    poller.latest()
}

enum Submission {
    Purchase(PurchaseIntent),
    Burn(String),
}

/// Run a flow with live state output. Ctrl-C stops watching; the chain keeps going.
async fn submit(service: PurchaseService, submission: Submission) -> Result<(), String> {
    let settings = service.settings().clone();
    let session = Arc::new(Session::new());

    let (tx, mut rx) = mpsc::unbounded_channel::<FlowState>();
    let printer_settings = settings.clone();
    let printer = tokio::spawn(async move {
        while let Some(state) = rx.recv().await {
            print_state(&printer_settings, &state);
        }
    });
    let service = service.with_observer(tx);

    let watcher_session = session.clone();
    let shutdown = tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                warn!("Interrupted; no longer watching the transaction");
                watcher_session.disconnect();
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let result = match &submission {
        Submission::Purchase(intent) => service.purchase(intent, session.handle()).await,
        Submission::Burn(amount) => service.burn(amount, session.handle()).await,
    };
    shutdown.abort();
    drop(service);
    let _ = printer.await;

    let report = result.map_err(|e| e.to_string())?;
    report_outcome(&settings, &report)
}

/// Wait for an OS shutdown signal (SIGINT/Ctrl+C or SIGTERM) and return once received.
async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    #[cfg(unix)]
    {
        let mut sigint_stream = signal(SignalKind::interrupt())?;
        let mut sigterm_stream = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint_stream.recv() => {
                info!("SIGINT/Ctrl+C signal received");
            }
            _ = sigterm_stream.recv() => {
                info!("SIGTERM signal received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C signal received");
    }
    Ok(())
}

fn print_state(settings: &Settings, state: &FlowState) {
    match state {
        FlowState::Idle => {}
        FlowState::Submitting(stage) => println!("Submitting {} transaction...", stage),
        FlowState::Submitted { stage, hash } => println!("{} submitted: {}", stage, settings.tx_url(hash)),
        FlowState::Confirming { stage, .. } => println!("Waiting for {} confirmation...", stage),
        FlowState::Confirmed { stage, receipt } => println!(
            "{} {} confirmed in block {}",
            "OK".green(),
            stage,
            receipt.block_number.map(|b| b.to_string()).unwrap_or_else(|| "?".to_string())
        ),
        FlowState::Failed { stage, message } => println!("{} {} failed: {}", "FAILED".red(), stage, message),
    }
}

fn report_outcome(settings: &Settings, report: &FlowReport) -> Result<(), String> {
    let seq = report.outcome.sequencer();
    if report.outcome.is_disconnected() {
        println!("{} stopped watching; the transaction may still confirm", "NOTE:".yellow());
        if let Some(hash) = seq.main_hash().or_else(|| seq.approve_hash()) {
            println!("  {}", settings.tx_url(&hash));
        }
        return Ok(());
    }
    if let Some((stage, message)) = seq.failure() {
        return Err(format!("{} failed: {}", stage, message));
    }

    if let Some(record) = &report.record {
        println!(
            "{} {} {} confirmed: {}{}",
            "SUCCESS:".green(),
            record.input_amount,
            record.input_currency,
            settings.explorer_tx_url,
            record.hash
        );
        if let Some(net) = &record.quoted_net_output {
            println!("  quoted {} {} (advisory, credited amount is decided on-chain)", net, settings.token_symbol);
        }
    }
    match report.ledger {
        Some(RecordOutcome::Written) => println!("  recorded in transaction history"),
        Some(RecordOutcome::Duplicate) => println!("  already in transaction history"),
        Some(RecordOutcome::Skipped) => println!("  not recorded: no user_uid configured"),
        Some(RecordOutcome::Failed) => println!("  {} could not record the transaction, see the log", "WARNING:".yellow()),
        None => {}
    }
    Ok(())
}

fn fixed_or_unknown(value: Option<U256>, decimals: u32, dp: usize) -> String {
    match value {
        Some(v) => format_fixed(v, decimals, dp),
        None => "unavailable".to_string(),
    }
}

async fn print_preview(service: &PurchaseService, preview: &PurchasePreview) {
    let settings = service.settings();
    let intent = &preview.intent;
    let symbol = service.symbol(intent.asset);
    let token_decimals = service.token_decimals().await;

    println!("{:<24} {} {}", "Pay", format_fixed(intent.amount, intent.decimals, 8), symbol);
    println!(
        "{:<24} {} {}",
        "Balance",
        fixed_or_unknown(preview.balances.of(intent.asset), intent.decimals, 8),
        symbol
    );
    if let Some(cap) = &preview.spend_cap {
        println!("{:<24} {} {}", "Spend cap", format_fixed(cap.cap, intent.decimals, 8), symbol);
    }
    match &preview.quote {
        Some(quote) => {
            println!("{:<24} {} {}", "Quoted gross", format_fixed(quote.gross, token_decimals, 4), settings.token_symbol);
            println!("{:<24} {} {}", "Quoted net", format_fixed(quote.net, token_decimals, 4), settings.token_symbol);
            for (i, share) in quote.referral_splits().iter().enumerate() {
                println!("{:<24} {}", format!("Referral level {}", i + 1), format_fixed(*share, token_decimals, 4));
            }
        }
        None => println!("{:<24} {}", "Quote", "unavailable".yellow()),
    }
    println!(
        "{:<24} {}",
        "Remaining supply",
        fixed_or_unknown(preview.balances.available_supply, token_decimals, 4)
    );
    if let Some(max) = preview.max_spend_by_supply {
        println!("{:<24} {} {}", "Max spend by supply", format_fixed(max, intent.decimals, 8), symbol);
    }
    println!(
        "{:<24} {} {}",
        "Gas (padded)",
        fixed_or_unknown(preview.gas.padded_cost, 18, 8),
        settings.native_symbol
    );
    for violation in &preview.violations {
        println!("{} {}", "BLOCKED:".red(), violation);
    }
}

fn print_burn_preview(settings: &Settings, preview: &BurnPreview) {
    println!(
        "{:<24} {} {}",
        "Burn",
        format_fixed(preview.amount, preview.decimals, 4),
        settings.token_symbol
    );
    println!(
        "{:<24} {} {}",
        "Balance",
        fixed_or_unknown(preview.balance, preview.decimals, 4),
        settings.token_symbol
    );
    println!("{:<24} {}", "Sink", settings.burn_address);
    println!(
        "{:<24} {} {}",
        "Gas (padded)",
        fixed_or_unknown(preview.gas.padded_cost, 18, 8),
        settings.native_symbol
    );
    for violation in &preview.violations {
        println!("{} {}", "BLOCKED:".red(), violation);
    }
}

async fn handle_balances(service: &PurchaseService) -> Result<(), String> {
    let settings = service.settings();
    let balances = service.balances().await;
    let stable_decimals = service.asset_decimals(InputAsset::Stable).await;
    let token_decimals = service.token_decimals().await;

    println!("Wallet {:?}", service.account());
    println!("{:<24} {}", settings.native_symbol, fixed_or_unknown(balances.native, 18, 4));
    println!("{:<24} {}", settings.stable_symbol, fixed_or_unknown(balances.stable, stable_decimals, 4));
    println!("{:<24} {}", settings.token_symbol, fixed_or_unknown(balances.sale_token, token_decimals, 4));
    println!("{:<24} {}", "Remaining supply", fixed_or_unknown(balances.available_supply, token_decimals, 4));
    Ok(())
}

async fn handle_uplines(settings: &Settings, address: Option<&str>) -> Result<(), String> {
    let account = match address {
        Some(raw) => raw
            .trim()
            .parse::<Address>()
            .map_err(|e| format!("Invalid address {}: {}", raw, e))?,
        None => {
            let (service, _) = build_service(settings.clone())?;
            service.account()
        }
    };
    let (_, chain) = connect(settings)?;
    let uplines = fetch_uplines(account, &*chain).await.map_err(|e| e.to_string())?;

    println!("Uplines of {:?}", account);
    for (i, upline) in uplines.iter().enumerate() {
        let shown = if upline.is_zero() { "none".to_string() } else { format!("{:?}", upline) };
        println!("  level {}: {}", i + 1, shown);
    }
    Ok(())
}

async fn handle_referrals(settings: &Settings, format: Option<OutputFormat>) -> Result<(), String> {
    let uid = settings
        .user_uid
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| "No user_uid configured; referrals are kept per user".to_string())?;
    let store = FileDocumentStore::new(PathBuf::from(&settings.ledger_dir));
    let downlines = list_downlines(&store, uid).await.map_err(|e| e.to_string())?;

    match format {
        Some(OutputFormat::Json) => {
            let json = serde_json::to_string_pretty(&downlines).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        _ => {
            if downlines.is_empty() {
                println!("No referrals yet");
                return Ok(());
            }
            println!("{:<30} {:<24} {}", "User", "Name", "Email");
            println!("{}", "-".repeat(80));
            for d in &downlines {
                println!(
                    "{:<30} {:<24} {}",
                    d.uid,
                    d.display_name.as_deref().unwrap_or("-"),
                    d.email.as_deref().unwrap_or("-")
                );
            }
            println!("{} referral(s)", downlines.len());
        }
    }
    Ok(())
}

fn handle_staking(apr: &str, compounding: Compounding) {
    let estimate = staking::estimate(staking::parse_apr(apr), compounding);
    println!("{:<24} {:.2}%", "APR", estimate.apr_pct);
    println!("{:<24} {:.2}%", "APY", estimate.apy_pct);
    println!("{:<24} {} ({} times/year)", "Compounding", estimate.compounding, estimate.periods);
    println!(
        "{:<24} {:.2}",
        format!("{} tokens in 1y", staking::PROJECTION_PRINCIPAL),
        estimate.projected_balance
    );
    println!("{}", "Illustrative only; actual yields vary with validator performance and fees.".dimmed());
}

async fn handle_history(settings: &Settings, limit: Option<usize>, format: Option<OutputFormat>) -> Result<(), String> {
    let ledger = open_ledger(settings);
    if ledger.uid().is_none() {
        return Err("No user_uid configured; history is kept per user".to_string());
    }
    let records = ledger
        .recent(limit.unwrap_or(settings.recent_tx_limit))
        .await
        .map_err(|e| e.to_string())?;

    match format {
        Some(OutputFormat::Json) => {
            let json = serde_json::to_string_pretty(&records).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        _ => print_history_table(settings, &records),
    }
    Ok(())
}

fn print_history_table(settings: &Settings, records: &[TransactionRecord]) {
    if records.is_empty() {
        println!("No transactions yet");
        return;
    }
    println!("{:<20} {:<12} {:<24} {:<24} {}", "Date", "Type", "Paid", "Received", "Transaction");
    println!("{}", "-".repeat(100));
    for record in records {
        let kind = serde_json::to_value(record.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!(
            "{:<20} {:<12} {:<24} {:<24} {}{}",
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind,
            format!("{} {}", record.input_amount, record.input_currency),
            record.quoted_net_output.as_deref().unwrap_or("-"),
            settings.explorer_tx_url,
            record.hash
        );
    }
}

fn handle_config_command(command: &ConfigCommands, cli: &Cli) -> Result<(), String> {
    match command {
        ConfigCommands::Get { key } => handle_config_get(key, cli),
        ConfigCommands::Set { key, value } => handle_config_set(key, value, cli),
        ConfigCommands::Show { format, sensitive } => handle_config_show(format, *sensitive, cli),
        ConfigCommands::Validate { file } => handle_config_validate(file, cli),
        ConfigCommands::Init { output } => handle_config_init(output, cli),
    }
}

fn handle_config_get(key: &str, cli: &Cli) -> Result<(), String> {
    let settings = load_config(&cli.config)?;
    match settings.get_value(key).map_err(|e| e.to_string())? {
        Some(_) if key == "wallet_private_key" => println!("***redacted***"),
        Some(value) => println!("{}", value),
        None => println!("(unset)"),
    }
    Ok(())
}

/// Update one key in the config file. Environment overrides are not folded in,
/// so a key supplied only through the environment never lands on disk.
fn handle_config_set(key: &str, value: &str, cli: &Cli) -> Result<(), String> {
    if cli.dry_run {
        println!("DRY RUN: Configuration changes not applied");
        return Ok(());
    }
    let path = resolve_config_path(&cli.config);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("Cannot read configuration {}: {}", path.display(), e))?;
    let mut settings = Settings::from_toml_str(&text).map_err(|e| e.to_string())?;

    settings.set_value(key, value).map_err(|e| e.to_string())?;
    settings.validate().map_err(|e| e.to_string())?;
    settings.save_to_file(&path.to_string_lossy()).map_err(|e| e.to_string())?;

    println!("Configuration '{}' updated successfully", key);
    Ok(())
}

fn handle_config_show(format: &Option<OutputFormat>, sensitive: bool, cli: &Cli) -> Result<(), String> {
    let mut settings = load_config(&cli.config)?;
    if !sensitive {
        settings.wallet_private_key = settings.wallet_private_key.map(|_| "***redacted***".to_string());
    }

    match format {
        Some(OutputFormat::Json) => {
            let json = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        _ => print_config_table(&settings),
    }
    Ok(())
}

fn handle_config_validate(file: &Option<PathBuf>, cli: &Cli) -> Result<(), String> {
    let config_path = file.as_ref().unwrap_or(&cli.config);
    load_config(config_path)?;
    println!("Configuration validation passed");
    Ok(())
}

fn handle_config_init(output: &Path, cli: &Cli) -> Result<(), String> {
    if cli.dry_run {
        println!("DRY RUN: Would write starter configuration to '{}'", output.display());
        return Ok(());
    }
    if output.exists() {
        return Err(format!("Refusing to overwrite existing {}", output.display()));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(output, STARTER_CONFIG).map_err(|e| e.to_string())?;
    println!("Wrote starter configuration: {}", output.display());
    Ok(())
}

fn config_rows(settings: &Settings) -> Vec<(&'static str, String)> {
    vec![
        ("rpc_url", settings.rpc_url.clone()),
        ("chain_id", settings.chain_id.to_string()),
        ("sale_address", settings.sale_address.clone()),
        ("stable_token_address", settings.stable_token_address.clone()),
        ("sale_token_address", settings.sale_token_address.clone().unwrap_or_default()),
        ("burn_address", settings.burn_address.clone()),
        ("native_spend_cap_pct", settings.native_spend_cap_pct.to_string()),
        ("stable_spend_cap_pct", settings.stable_spend_cap_pct.to_string()),
        ("gas_pad_pct", settings.gas_pad_pct.to_string()),
        ("gas_price_poll_secs", settings.gas_price_poll_secs.to_string()),
        ("receipt_poll_millis", settings.receipt_poll_millis.to_string()),
        ("recent_tx_limit", settings.recent_tx_limit.to_string()),
        ("ledger_dir", settings.ledger_dir.clone()),
        ("user_uid", settings.user_uid.clone().unwrap_or_default()),
        ("wallet_private_key", settings.wallet_private_key.clone().unwrap_or_default()),
    ]
}

fn print_config_table(settings: &Settings) {
    println!("{} Configuration", settings.token_name);
    println!("{:<30} {:<20}", "Setting", "Value");
    println!("{}", "-".repeat(50));
    for (key, value) in config_rows(settings) {
        println!("{:<30} {:<20}", key, value);
    }
}

fn handle_completion_generation(shell: clap_complete::Shell, output: Option<PathBuf>) -> Result<(), String> {
    let mut cmd = Cli::command();

    let mut buf = Vec::new();
    generate(shell, &mut cmd, "presale", &mut buf);

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, buf).map_err(|e| e.to_string())?;
            println!("Completions written to: {}", output_path.display());
        }
        None => {
            print!("{}", String::from_utf8_lossy(&buf));
        }
    }
    Ok(())
}
