//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::synthetic_adapter::SyntheticAdapter;
use crate::domain::backtest::{Backtest, BacktestConfig, BacktestResult, StrategyConfig};
use crate::domain::config_validation::{parse_datetime, parse_symbols, validate_config};
use crate::domain::error::BackloopError;
use crate::domain::event::OrderType;
use crate::domain::execution::ExecutionConfig;
use crate::domain::feed::HistoricalFeed;
use crate::domain::metrics::{DEFAULT_PERIODS_PER_YEAR, Metrics};
use crate::domain::portfolio::PortfolioConfig;
use crate::domain::strategy::MeanReversionParams;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDateTime;

#[derive(Parser, Debug)]
#[command(name = "backloop", about = "Event-driven market backtester")]
pub struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for the CSV exports
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
        /// Override [backtest] seed
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Synthetic,
    Csv(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub source: DataSource,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval_minutes: i64,
}

pub fn run(cli: Cli) -> ExitCode {
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("warning: logging not initialised: {e}");
    }

    match cli.command {
        Command::Backtest {
            config,
            output,
            seed,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, seed)
            } else {
                run_backtest(&config, &output, seed)
            }
        }
        Command::Validate { config } => run_validate(&config),
    }
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `level`.
pub fn init_logging(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BackloopError> {
    FileConfigAdapter::from_file(path).map_err(|e| BackloopError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BackloopError> {
    let symbols = match adapter.get_string("backtest", "symbols") {
        Some(s) => parse_symbols(&s)?,
        None => return Err(BackloopError::missing("backtest", "symbols")),
    };

    let order_type = match adapter
        .get_string("portfolio", "order_type")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("market") => OrderType::Market,
        Some("limit") => OrderType::Limit,
        Some(other) => {
            return Err(BackloopError::invalid(
                "portfolio",
                "order_type",
                format!("expected market or limit, got '{other}'"),
            ));
        }
    };

    let portfolio_defaults = PortfolioConfig::default();
    let execution_defaults = ExecutionConfig::default();
    let strategy_defaults = MeanReversionParams::default();

    let window = adapter.get_int("strategy", "window", strategy_defaults.window as i64);
    let window = usize::try_from(window)
        .map_err(|_| BackloopError::invalid("strategy", "window", "window must be at least 2"))?;

    let seed = match adapter.get_string("backtest", "seed") {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            BackloopError::invalid(
                "backtest",
                "seed",
                format!("expected a non-negative integer, got '{raw}'"),
            )
        })?,
        None => 42,
    };

    let config = BacktestConfig {
        symbols,
        portfolio: PortfolioConfig {
            initial_capital: adapter.get_double(
                "backtest",
                "initial_capital",
                portfolio_defaults.initial_capital,
            ),
            risk_fraction: adapter.get_double(
                "portfolio",
                "risk_fraction",
                portfolio_defaults.risk_fraction,
            ),
            default_price: adapter.get_double(
                "portfolio",
                "default_price",
                portfolio_defaults.default_price,
            ),
            order_type,
        },
        strategy: StrategyConfig::MeanReversion(MeanReversionParams {
            window,
            num_std: adapter.get_double("strategy", "num_std", strategy_defaults.num_std),
        }),
        execution: ExecutionConfig {
            slippage_pct: adapter.get_double(
                "execution",
                "slippage_pct",
                execution_defaults.slippage_pct,
            ),
            commission_pct: adapter.get_double(
                "execution",
                "commission_pct",
                execution_defaults.commission_pct,
            ),
            latency_min_ms: adapter.get_double(
                "execution",
                "latency_min_ms",
                execution_defaults.latency_min_ms,
            ),
            latency_max_ms: adapter.get_double(
                "execution",
                "latency_max_ms",
                execution_defaults.latency_max_ms,
            ),
        },
        seed,
        periods_per_year: adapter.get_double(
            "backtest",
            "periods_per_year",
            DEFAULT_PERIODS_PER_YEAR,
        ),
    };
    config.validate()?;
    Ok(config)
}

pub fn build_data_config(adapter: &dyn ConfigPort) -> Result<DataConfig, BackloopError> {
    let source = match adapter
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("synthetic") => DataSource::Synthetic,
        Some("csv") => match adapter.get_string("data", "path") {
            Some(p) if !p.trim().is_empty() => DataSource::Csv(PathBuf::from(p.trim())),
            _ => return Err(BackloopError::missing("data", "path")),
        },
        Some(other) => {
            return Err(BackloopError::invalid(
                "data",
                "source",
                format!("expected synthetic or csv, got '{other}'"),
            ));
        }
    };

    Ok(DataConfig {
        source,
        start: parse_datetime(adapter.get_string("data", "start").as_deref(), "start")?,
        end: parse_datetime(adapter.get_string("data", "end").as_deref(), "end")?,
        interval_minutes: adapter.get_int("data", "interval_minutes", 60),
    })
}

pub fn build_data_port(
    data: &DataConfig,
    seed: u64,
) -> Result<Box<dyn DataPort>, BackloopError> {
    match &data.source {
        DataSource::Synthetic => Ok(Box::new(SyntheticAdapter::new(seed, data.interval_minutes)?)),
        DataSource::Csv(path) => Ok(Box::new(CsvAdapter::new(path.clone()))),
    }
}

/// Load, validate and run the configured backtest end to end.
pub fn execute_backtest(
    adapter: &dyn ConfigPort,
    seed_override: Option<u64>,
) -> Result<(BacktestConfig, BacktestResult), BackloopError> {
    validate_config(adapter)?;
    let mut bt_config = build_backtest_config(adapter)?;
    if let Some(seed) = seed_override {
        bt_config.seed = seed;
    }
    let data_config = build_data_config(adapter)?;

    let port = build_data_port(&data_config, bt_config.seed)?;
    let feed = HistoricalFeed::load(
        port.as_ref(),
        &bt_config.symbols,
        data_config.start,
        data_config.end,
    )?;
    eprintln!(
        "Running backtest: {} symbols, {} bars, {} to {}",
        bt_config.symbols.len(),
        feed.len(),
        data_config.start,
        data_config.end,
    );

    let result = Backtest::new(&bt_config, feed)?.run();
    Ok((bt_config, result))
}

fn run_backtest(config_path: &Path, output: &Path, seed: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    let (bt_config, result) = match execute_backtest(&adapter, seed) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let metrics = Metrics::compute(
        &result.equity_curve,
        &result.trade_log,
        &result.closed_trades,
        bt_config.equity_points_per_year(),
    );
    print_summary(&result, &metrics);

    match CsvReportAdapter::new().write(&result, output) {
        Ok(()) => {
            eprintln!("\nResults written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    eprintln!("\n=== Results ({}) ===", result.strategy_name);
    eprintln!("Initial Capital:  {:.2}", result.portfolio.initial_capital);
    eprintln!("Final Equity:     {:.2}", result.portfolio.total_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.2}%", metrics.max_drawdown * 100.0);
    if let Some(dd) = &metrics.drawdown {
        eprintln!("  Peak:           {}", dd.peak_time);
        eprintln!("  Trough:         {}", dd.trough_time);
    }
    eprintln!("Volatility:       {:.2}%", metrics.volatility * 100.0);
    eprintln!("Total Fills:      {}", metrics.total_fills);
    eprintln!("Round Trips:      {}", metrics.round_trips);
    eprintln!("Hit Rate:         {:.1}%", metrics.hit_rate * 100.0);

    let mut open: Vec<_> = result
        .portfolio
        .positions
        .iter()
        .filter(|(_, qty)| **qty != 0)
        .collect();
    if !open.is_empty() {
        open.sort();
        eprintln!("\n=== Open Positions ===");
        for (symbol, qty) in open {
            eprintln!("  {symbol}: {qty}");
        }
    }
}

pub fn run_dry_run(config_path: &Path, seed: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }
    let mut bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Some(seed) = seed {
        bt_config.seed = seed;
    }
    let data_config = match build_data_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    eprintln!("Config validated successfully\n");
    eprintln!("Symbols:          {}", bt_config.symbols.join(", "));
    eprintln!("Initial Capital:  {:.2}", bt_config.portfolio.initial_capital);
    let StrategyConfig::MeanReversion(params) = &bt_config.strategy;
    eprintln!(
        "Strategy:         mean_reversion (window {}, num_std {})",
        params.window, params.num_std
    );
    eprintln!(
        "Execution:        slippage {}, commission {}, latency {}-{} ms",
        bt_config.execution.slippage_pct,
        bt_config.execution.commission_pct,
        bt_config.execution.latency_min_ms,
        bt_config.execution.latency_max_ms,
    );
    eprintln!("Seed:             {}", bt_config.seed);
    match &data_config.source {
        DataSource::Synthetic => eprintln!(
            "Data:             synthetic, every {} min",
            data_config.interval_minutes
        ),
        DataSource::Csv(path) => eprintln!("Data:             csv from {}", path.display()),
    }
    eprintln!("Range:            {} to {}", data_config.start, data_config.end);
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    let checked = validate_config(&adapter)
        .and_then(|_| build_backtest_config(&adapter))
        .and_then(|_| build_data_config(&adapter));
    match checked {
        Ok(_) => {
            eprintln!("Configuration is valid");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn fail(err: &BackloopError) -> ExitCode {
    tracing::error!(error = %err, "aborting");
    eprintln!("error: {err}");
    err.into()
}
