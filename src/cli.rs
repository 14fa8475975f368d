//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::LabelTraderError;
use crate::domain::label::RankingRule;

#[derive(Parser, Debug)]
#[command(name = "labeltrader", about = "Stock label ranking and label-universe backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load <SYMBOL>.csv price files into the store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv_dir: PathBuf,
    },
    /// Compute and save a label
    Label {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        rule: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_market_cap: Option<f64>,
    },
    /// List saved labels
    Labels {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the ranked members of a label
    Members {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        label: String,
    },
    /// Delete a label and its members
    DeleteLabel {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        label: String,
    },
    /// Run a backtest over a label's members
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        label: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List the ranking rules
    Rules,
    /// Show stored data range per symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Runs one command, returning the error instead of an exit code.
pub fn execute(command: Command) -> Result<(), LabelTraderError> {
    match command {
        Command::Rules => {
            run_rules();
            Ok(())
        }
        Command::Backtest {
            config,
            label,
            dry_run: true,
            ..
        } => run_dry_run(&config, label),
        other => run_with_store(other),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, LabelTraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn run_rules() {
    for rule in RankingRule::ALL {
        let marker = if rule.is_market_cap_proxy() { "*" } else { " " };
        println!("{:<20}{marker} {}", rule.name(), rule.description());
    }
}

pub fn run_dry_run(config_path: &Path, label: Option<String>) -> Result<(), LabelTraderError> {
    use crate::domain::config_validation::{BacktestOverrides, backtest_config_from_config};

    let config = load_config(config_path)?;
    let bt = backtest_config_from_config(&config, &BacktestOverrides { label })?;

    eprintln!("Config validated successfully");
    eprintln!("  label:           {}", bt.label_name);
    eprintln!("  strategy:        {}", bt.strategy_type);
    eprintln!("  rebalance:       {}", bt.rebalance_frequency);
    eprintln!("  top_k:           {}", bt.top_k);
    eprintln!("  lookback_period: {}", bt.lookback_period);
    eprintln!("  initial_capital: {:.2}", bt.initial_capital);
    eprintln!("  window:          {} to {}", bt.start_date, bt.end_date);
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_with_store(_command: Command) -> Result<(), LabelTraderError> {
    Err(LabelTraderError::invalid(
        "this command needs the sqlite feature",
    ))
}

#[cfg(feature = "sqlite")]
fn run_with_store(command: Command) -> Result<(), LabelTraderError> {
    match command {
        Command::Import { config, csv_dir } => store::import(&config, csv_dir),
        Command::Label {
            config,
            rule,
            start,
            end,
            top_k,
            min_market_cap,
        } => store::label(
            &config,
            crate::domain::config_validation::LabelOverrides {
                rule,
                start_date: start,
                end_date: end,
                top_k,
                min_market_cap,
            },
        ),
        Command::Labels { config } => store::labels(&config),
        Command::Members { config, label } => store::members(&config, &label),
        Command::DeleteLabel { config, label } => store::delete_label(&config, &label),
        Command::Backtest {
            config,
            label,
            output,
            ..
        } => store::backtest(&config, label, output),
        Command::Info { config, symbol } => store::info(&config, symbol.as_deref()),
        Command::Rules => {
            run_rules();
            Ok(())
        }
    }
}

#[cfg(feature = "sqlite")]
mod store {
    use super::load_config;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::adapters::console_progress_adapter::ConsoleProgress;
    use crate::adapters::csv_adapter::CsvAdapter;
    use crate::adapters::json_report_adapter::JsonReportAdapter;
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::domain::backtest::run_backtest;
    use crate::domain::config_validation::{
        BacktestOverrides, LabelOverrides, backtest_config_from_config, label_request_from_config,
    };
    use crate::domain::error::LabelTraderError;
    use crate::domain::ranking::LabelCalculator;
    use crate::domain::task::CancellationToken;
    use crate::domain::universe::parse_symbols;
    use crate::ports::config_port::ConfigPort;
    use crate::ports::label_port::LabelPort;
    use crate::ports::price_port::PricePort;
    use crate::ports::report_port::ReportPort;
    use std::path::{Path, PathBuf};

    const DEFAULT_REPORT_PATH: &str = "backtest_report.json";

    fn open_store(
        config_path: &Path,
    ) -> Result<(SqliteAdapter, FileConfigAdapter), LabelTraderError> {
        let config = load_config(config_path)?;
        let store = SqliteAdapter::from_config(&config)?;
        store.initialize_schema()?;
        Ok((store, config))
    }

    pub fn import(config_path: &Path, csv_dir: PathBuf) -> Result<(), LabelTraderError> {
        let (store, _) = open_store(config_path)?;
        eprintln!("Reading CSV files from {}", csv_dir.display());
        let csv = CsvAdapter::new(csv_dir);
        let symbols = csv.list_symbols()?;
        let bars = csv.load_all()?;
        let written = store.insert_bars(&bars)?;
        eprintln!("Imported {} bars for {} symbols", written, symbols.len());
        Ok(())
    }

    pub fn label(config_path: &Path, overrides: LabelOverrides) -> Result<(), LabelTraderError> {
        let (store, config) = open_store(config_path)?;
        let task_id = format!("label_{}", chrono::Local::now().format("%Y%m%d%H%M%S"));
        let request = label_request_from_config(&config, &overrides, &task_id)?;

        eprintln!(
            "Computing {} from {} to {} (top {})",
            request.rule, request.start_date, request.end_date, request.params.top_k
        );
        let calculator = LabelCalculator::new(&store, &store);
        let ranked =
            calculator.compute_label(&request, &ConsoleProgress::new(), &CancellationToken::new())?;

        println!("{}", ranked.definition.name);
        for member in &ranked.members {
            println!("{:>4}  {:<12} {:>14.4}", member.rank, member.symbol, member.score);
        }
        eprintln!(
            "{} of {} symbols ranked",
            ranked.members.len(),
            ranked.candidates
        );
        Ok(())
    }

    pub fn labels(config_path: &Path) -> Result<(), LabelTraderError> {
        let (store, _) = open_store(config_path)?;
        let labels = store.list_labels()?;
        if labels.is_empty() {
            eprintln!("No labels found");
            return Ok(());
        }
        for summary in &labels {
            let def = &summary.definition;
            println!(
                "{:<48} {:<20} {} to {}  {:>4} members  created {}",
                def.name,
                def.rule,
                def.start_date,
                def.end_date,
                summary.member_count,
                def.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        Ok(())
    }

    pub fn members(config_path: &Path, label: &str) -> Result<(), LabelTraderError> {
        let (store, _) = open_store(config_path)?;
        if store.get_label(label)?.is_none() {
            return Err(LabelTraderError::insufficient(format!(
                "label {label} not found"
            )));
        }
        for member in store.get_label_members(label)? {
            println!(
                "{:>4}  {:<12} {:>14.4}  {}",
                member.rank, member.symbol, member.score, member.metadata
            );
        }
        Ok(())
    }

    pub fn delete_label(config_path: &Path, label: &str) -> Result<(), LabelTraderError> {
        let (store, _) = open_store(config_path)?;
        if store.delete_label(label)? {
            eprintln!("Deleted label {label}");
        } else {
            eprintln!("Label {label} not found");
        }
        Ok(())
    }

    pub fn backtest(
        config_path: &Path,
        label: Option<String>,
        output: Option<PathBuf>,
    ) -> Result<(), LabelTraderError> {
        let (store, config) = open_store(config_path)?;
        let bt = backtest_config_from_config(&config, &BacktestOverrides { label })?;

        eprintln!(
            "Running {} backtest on {} ({} rebalance, top {}), {} to {}",
            bt.strategy_type,
            bt.label_name,
            bt.rebalance_frequency,
            bt.top_k,
            bt.start_date,
            bt.end_date
        );
        let result = run_backtest(&store, &store, &bt)?;
        let m = &result.metrics;

        eprintln!("\n=== Results ===");
        eprintln!("Final Value:      {:.2}", result.final_value());
        eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
        eprintln!("Annualized:       {:.2}%", m.annual_return * 100.0);
        eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
        eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
        eprintln!("Calmar Ratio:     {:.2}", m.calmar_ratio);
        eprintln!("Total Trades:     {}", m.total_trades);
        eprintln!("Round Trips:      {}", m.round_trips);
        eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
        eprintln!("Avg Trade Return: {:.2}%", m.avg_trade_return * 100.0);

        let output = output
            .map(|p| p.display().to_string())
            .or_else(|| config.get_string("report", "output"))
            .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string());
        JsonReportAdapter.write(&result, &output)?;
        eprintln!("\nReport written to: {output}");
        eprintln!("Result id: {}", result.result_id);
        Ok(())
    }

    pub fn info(config_path: &Path, symbol: Option<&str>) -> Result<(), LabelTraderError> {
        let (store, _) = open_store(config_path)?;
        let symbols = match symbol {
            Some(list) => parse_symbols(list)?,
            None => store.list_symbols()?,
        };
        if symbols.is_empty() {
            eprintln!("No symbols in the store");
            return Ok(());
        }
        for symbol in &symbols {
            match store.get_data_range(symbol)? {
                Some((first, last, count)) => {
                    println!("{symbol:<12} {first} to {last}  {count:>6} bars")
                }
                None => println!("{symbol:<12} no data"),
            }
        }
        Ok(())
    }
}
