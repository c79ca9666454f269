//! Domain Blockcheck - Main CLI Application
//!
//! Diagnoses one domain and prints which network layer, if any, is
//! blocking it.

use anyhow::Context;
use clap::Parser;
use domain_blockcheck::{
    cli::Cli,
    config::{load_config, validate_config, EnvManager},
    diagnostics::{DiagnosticOrchestrator, LiveProbes},
    error::AppError,
    log_debug, log_info,
    logging::LoggerFactory,
    models::{Config, Report},
    output::OutputFormatterFactory,
    DiagnosticSession, PKG_NAME, VERSION,
};
use std::io::{self, IsTerminal};
use std::process;
use std::sync::Arc;

/// Exit status when the diagnosis attributes a block
const EXIT_BLOCKED: i32 = 10;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();

    match run_application(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            let code = match e.downcast_ref::<AppError>() {
                Some(app_error) => {
                    eprintln!("{}", app_error.format_for_console(io::stderr().is_terminal()));
                    print_error_suggestions(app_error);
                    app_error.exit_code()
                }
                None => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            };
            process::exit(code);
        }
    }
}

/// Main application logic; returns the process exit status
async fn run_application(cli: Cli) -> anyhow::Result<i32> {
    if cli.env_help {
        println!("{}", EnvManager::display_env_help());
        return Ok(0);
    }

    cli.validate().map_err(AppError::validation)?;

    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
        eprintln!("Debug mode enabled");
    }

    let config = load_config(cli.clone())?;
    for warning in validate_config(&config)? {
        eprintln!("{}", warning.format(config.enable_color));
    }

    let domain = config
        .target_domain
        .clone()
        .ok_or_else(|| AppError::validation("Please enter a domain"))?;

    let factory = LoggerFactory::new(config.clone());
    let app_logger = factory.create_logger("APP").await;
    app_logger.add_context_field("domain".to_string(), &domain).await;
    let error_logger = factory.create_error_logger();
    let stage_logger = factory.create_stage_logger().await;

    let probes = match LiveProbes::from_config(&config, stage_logger.clone()) {
        Ok(probes) => probes,
        Err(e) => {
            error_logger.log_error(&e, Some("Probe setup")).await;
            return Err(e).context("Failed to initialize the probe stages");
        }
    };
    log_debug!(app_logger, "Using resolver: {}", probes.resolver_description());

    let orchestrator = Arc::new(DiagnosticOrchestrator::new(Arc::new(probes), stage_logger));
    let session = DiagnosticSession::with_domain(orchestrator, domain.clone());

    let report = watch_run(&session, &config, &domain).await?;
    log_info!(app_logger, "{} is {}", report.domain, report.status);

    let formatter =
        OutputFormatterFactory::create_formatter(config.output_format, config.enable_color, config.verbose);
    println!("{}", formatter.format_report(&report)?);

    Ok(if report.status.is_blocked() { EXIT_BLOCKED } else { 0 })
}

/// Start the run and follow its snapshots until the verdict arrives
async fn watch_run(session: &DiagnosticSession, config: &Config, domain: &str) -> anyhow::Result<Report> {
    let progress = OutputFormatterFactory::create_formatter(
        config.output_format,
        config.enable_color,
        config.verbose,
    );
    let mut snapshots = session.subscribe();

    session
        .run_diagnostic(domain)
        .ok_or_else(|| AppError::validation("Please enter a domain"))?;

    loop {
        snapshots
            .changed()
            .await
            .context("Diagnostic session closed before the run finished")?;
        let report = snapshots.borrow_and_update().clone();

        if config.show_progress {
            eprintln!("{}", progress.format_progress(&report)?);
        }
        if report.status.is_terminal() {
            return Ok(report);
        }
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format");
            eprintln!("  - Timeouts are whole seconds between 1 and 60");
            eprintln!("  - Run with --env-help to list supported variables");
        }
        AppError::Validation(_) => {
            eprintln!();
            eprintln!("Enter a bare hostname such as example.com, without scheme, path or port.");
        }
        AppError::DnsResolution(_) | AppError::Network(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify /etc/resolv.conf lists a reachable resolver");
        }
        _ => {}
    }
}
