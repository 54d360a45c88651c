use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use corebalance::{
    compute_plan,
    error::{ConfigError, DataError, PlanError},
    portfolio::Portfolio,
    report,
    target::AccountTarget,
};
use directories::ProjectDirs;
use tracing::{Level, debug, warn};

mod cli;

const CONFIG_ERROR: u8 = 2;
const DATA_ERROR: u8 = 3;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(opts: cli::Cli) -> anyhow::Result<()> {
    if let Some(shell) = opts.completions {
        let mut cmd = cli::Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }
    let Some(current_allocations) = opts.current_allocations else {
        anyhow::bail!("No current allocation file given");
    };

    let targets_path = match opts.target {
        Some(path) => path,
        None => ProjectDirs::from("org", "quotidian", "corebalance")
            .map(|pdirs| pdirs.config_dir().join("target.yml"))
            .ok_or(ConfigError::NoDefaultPath)?,
    };
    let account_target = AccountTarget::load_from_file(&targets_path).with_context(|| {
        format!("Failed to load target allocations; create or edit {targets_path:?} or pass --target")
    })?;
    account_target.check_ignored(&opts.ignore)?;
    println!("{}", report::render_targets(&account_target)?);

    let portfolio = Portfolio::load_from_file(&current_allocations, opts.provider)
        .with_context(|| format!("Failed to read positions from {current_allocations:?}"))?;
    let account = portfolio.account(&account_target.account_number)?;
    let core_symbol = &account_target.core_position.symbol;
    if account
        .positions
        .iter()
        .any(|p| &p.symbol == core_symbol && !p.is_core)
    {
        warn!(symbol = %core_symbol, "Found position but it is not marked as the core position");
    }
    for pos in account.ignored(&opts.ignore) {
        println!("Ignoring {} ({})", pos.symbol, pos.current_value);
    }

    let holdings = account.holdings(&opts.ignore);
    debug!(?holdings, "got holdings");
    let plan = compute_plan(&holdings, &account_target)?;
    println!("{}", report::render(&account_target.account_number, &plan));
    println!();
    print!("{}", report::render_actions(&plan));
    if plan.unfunded().is_positive() {
        println!();
        println!(
            "Warning: selling every other position still leaves {} {} short of its {} minimum",
            core_symbol,
            plan.unfunded(),
            account_target.core_position.minimum
        );
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    let is_config = err.downcast_ref::<ConfigError>().is_some()
        || matches!(err.downcast_ref::<PlanError>(), Some(PlanError::Config(_)));
    let is_data = err.downcast_ref::<DataError>().is_some()
        || matches!(err.downcast_ref::<PlanError>(), Some(PlanError::Data(_)));
    if is_config {
        ExitCode::from(CONFIG_ERROR)
    } else if is_data {
        ExitCode::from(DATA_ERROR)
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let opts = cli::Cli::parse();
    init_logging(opts.verbose);
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            exit_code(&err)
        }
    }
}
