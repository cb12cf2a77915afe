use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use receiving_dash::cli::{Cli, Commands, ConfigCommands};
use receiving_dash::core::referral::{Avpu, Status, TriageColor};
use receiving_dash::core::seed::clock_seed;
use receiving_dash::core::{ExportFormat, ReceivingDesk, VitalsInput};
use receiving_dash::utils::logger::{init_cli_logger, init_tui_logger};
use receiving_dash::utils::{
    format_clock, format_minutes, format_timestamp, mask_sensitive, truncate_string, AppConfig,
    WEB_TOKEN_ENV,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::config_path()?,
    };
    let mut config = AppConfig::load_from(&config_path)?;
    config.apply_env();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.display().to_string());
    }
    if let Some(facility) = &cli.facility {
        config.facility = facility.clone();
    }

    let Some(command) = cli.command else {
        // No command - run interactive TUI
        #[cfg(feature = "tui")]
        {
            let _guard = init_tui_logger(&config.log_dir(), cli.verbose)
                .with_context(|| format!("Failed to open log directory {}", config.log_dir().display()))?;
            warn_invalid(&config);
            let desk = open_desk(&config).await?;
            let mut app = receiving_dash::app::App::new(desk, &config).await?;
            app.run().await?;
        }
        #[cfg(not(feature = "tui"))]
        {
            println!("This build has no dashboard. Run 'receiving-dash --help' for commands.");
        }
        return Ok(());
    };

    init_cli_logger(cli.verbose);

    if let Commands::Config { command } = &command {
        return handle_config(command, &config, &config_path);
    }

    warn_invalid(&config);
    let mut desk = open_desk(&config).await?;

    if let Some((id, action)) = command.action() {
        let referral = desk.apply(id, action).await?;
        println!(
            "{} {} is now {}",
            "✓".green(),
            referral.id.bold(),
            status_label(referral.status)
        );
        return Ok(());
    }

    match command {
        Commands::Queue => handle_queue(&desk, &config),
        Commands::Vitals {
            id,
            hr,
            sbp,
            rr,
            spo2,
            temp,
            avpu,
        } => {
            let avpu: Avpu = avpu.parse().map_err(anyhow::Error::msg)?;
            let input = VitalsInput { hr, sbp, rr, spo2, temp, avpu };
            let referral = desk.record_vitals(&id, input).await?;
            println!(
                "{} Vitals recorded for {} ({} sets)",
                "✓".green(),
                referral.id.bold(),
                referral.vitals_history.len()
            );
            Ok(())
        }
        Commands::Interventions { id, names } => {
            let referral = desk.record_interventions(&id, &names).await?;
            println!(
                "{} {} recorded for {}",
                "✓".green(),
                names.join(", "),
                referral.id.bold()
            );
            Ok(())
        }
        Commands::Isbar { id } => {
            println!("{}", desk.isbar(&id)?);
            Ok(())
        }
        Commands::Stats => handle_stats(&desk, &config),
        Commands::Export { format, output } => handle_export(&desk, &config, format.into(), output),
        Commands::Events { since, case_id, limit } => handle_events(&desk, since, case_id, limit).await,
        Commands::Icu { beds } => {
            let meta = desk.set_icu_open(&config.facility, beds).await?;
            println!(
                "{} {} now has {} ICU beds open",
                "✓".green(),
                config.facility.bold(),
                meta.icu_open.to_string().cyan()
            );
            Ok(())
        }
        Commands::NewDay { seed, count } => {
            let seed = seed.unwrap_or_else(clock_seed);
            let count = desk.new_day(seed, count.unwrap_or(config.seed_count)).await?;
            println!("{} Seeded {} referrals for today (seed {})", "✓".green(), count, seed);
            Ok(())
        }
        #[cfg(feature = "server")]
        Commands::Serve { port, host, cors } => {
            let host = host.unwrap_or_else(|| config.web_host.clone());
            let port = port.unwrap_or(config.web_port);
            receiving_dash::server::run(host, port, cors, desk, &config).await
        }
        // Handled above
        Commands::Accept { .. }
        | Commands::Enroute { .. }
        | Commands::Arrive { .. }
        | Commands::Handover { .. }
        | Commands::Reject { .. }
        | Commands::Config { .. } => Ok(()),
    }
}

async fn open_desk(config: &AppConfig) -> Result<ReceivingDesk> {
    ReceivingDesk::open(config)
        .await
        .with_context(|| format!("Failed to open data directory {}", config.data_dir().display()))
}

fn warn_invalid(config: &AppConfig) {
    for error in config.validate() {
        tracing::warn!("config: {}", error);
    }
}

fn triage_label(color: TriageColor) -> colored::ColoredString {
    let text = format!("● {:<6}", color.as_str());
    match color {
        TriageColor::Red => text.red().bold(),
        TriageColor::Yellow => text.yellow().bold(),
        TriageColor::Green => text.green().bold(),
    }
}

fn status_label(status: Status) -> colored::ColoredString {
    let text = status.as_str();
    match status {
        Status::Prealert => text.magenta(),
        Status::Accepted => text.cyan(),
        Status::Enroute => text.yellow(),
        Status::ArriveDest => text.green(),
        Status::Handover => text.normal(),
        Status::Rejected => text.red(),
    }
}

fn handle_queue(desk: &ReceivingDesk, config: &AppConfig) -> Result<()> {
    let queue = desk.incoming_queue(&config.facility);

    println!("{} · incoming queue\n", config.facility.bold());
    if queue.is_empty() {
        println!("No active referrals today.");
        return Ok(());
    }

    println!(
        "{:<10} {:<8} {:<6} {:<8} {:<9} {:<8} {:<12} {:<11} {:<7} {}",
        "ID", "Patient", "Age", "Triage", "Complaint", "Priority", "Status", "Ambulance", "ETA", "From"
    );
    println!("{}", "-".repeat(108));

    for r in queue {
        println!(
            "{:<10} {:<8} {:<6} {} {:<9} {:<8} {:<12} {:<11} {:<7} {}",
            r.id,
            r.patient.name,
            format!("{}{}", r.patient.age, r.patient.sex.to_string().chars().next().unwrap_or('?')),
            triage_label(r.triage_color()),
            r.triage.complaint.as_str(),
            r.transport.priority.as_str(),
            status_label(r.status),
            r.transport.ambulance.map(|a| a.as_str()).unwrap_or("—"),
            r.transport.eta_min.map(|m| format!("{}m", m)).unwrap_or_else(|| "—".to_string()),
            truncate_string(&r.referrer.facility, 28),
        );
    }

    Ok(())
}

fn handle_stats(desk: &ReceivingDesk, config: &AppConfig) -> Result<()> {
    let a = desk.analytics(&config.facility);
    let k = &a.kpis;

    println!("{} · today\n", config.facility.bold());
    println!("{}", "KPIs".yellow().bold());
    println!("  Referrals today:   {}", k.total.to_string().bold());
    println!("  Awaiting/Active:   {}", k.awaiting);
    println!("  En route:          {}", k.enroute);
    println!("  Arrived:           {}", k.arrived);
    println!("  Handover:          {}", k.handover);
    println!("  Rejected:          {}", k.rejected);
    println!("  Acceptance rate:   {:.0}%", k.acceptance_rate);
    println!("  Avg ETA:           {:.1} min", k.avg_eta_min);
    println!("  ICU beds open:     {}", k.icu_open);

    println!("\n{}", "Flow (medians)".yellow().bold());
    println!("  Decision→Dispatch: {}", format_minutes(a.flow.decision_to_dispatch_min));
    println!("  Dispatch→Arrival:  {}", format_minutes(a.flow.dispatch_to_arrival_min));
    println!("  Arrival→Handover:  {}", format_minutes(a.flow.arrival_to_handover_min));
    println!("  Critical load:     {:.0}% RED", a.flow.critical_load_pct);

    println!("\n{}", "Triage mix".yellow().bold());
    for b in &a.triage_mix {
        println!("  {} {}", triage_label(b.key), b.count);
    }

    println!("\n{}", "Case types".yellow().bold());
    for b in &a.case_types {
        println!("  {:<10} {}", b.key.as_str(), b.count);
    }

    println!("\n{}", "Status snapshot".yellow().bold());
    for b in &a.status_snapshot {
        println!("  {:<12} {}", status_label(b.key), b.count);
    }
    println!(
        "  Accepted/progressed {} vs rejected {}",
        a.accepted_or_progressed.to_string().green(),
        a.rejected.to_string().red()
    );

    println!("\n{}", "Hourly flow".yellow().bold());
    for b in a.hourly_flow.iter().filter(|b| b.count > 0) {
        println!("  {:02}:00 {} {}", b.key, "█".repeat(b.count).cyan(), b.count);
    }

    if !a.transport_by_ambulance.is_empty() {
        println!("\n{}", "Transport minutes (dispatch→arrival)".yellow().bold());
        println!(
            "  {:<10} {:>4} {:>6} {:>6} {:>6} {:>6} {:>6}",
            "Ambulance", "n", "min", "q1", "median", "q3", "max"
        );
        for t in &a.transport_by_ambulance {
            let m = &t.minutes;
            println!(
                "  {:<10} {:>4} {:>6.1} {:>6.1} {:>6.1} {:>6.1} {:>6.1}",
                t.ambulance.as_str(),
                m.count,
                m.min,
                m.q1,
                m.median,
                m.q3,
                m.max
            );
        }
    }

    Ok(())
}

fn handle_export(
    desk: &ReceivingDesk,
    config: &AppConfig,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(format.default_file_name()));
    let count = desk
        .export_to(&config.facility, format, &path)
        .with_context(|| format!("Failed to export to {}", path.display()))?;
    println!("{} Exported {} ({}) to {}", "✓".green(), count, format, path.display());
    Ok(())
}

async fn handle_events(desk: &ReceivingDesk, since: i64, case_id: Option<String>, limit: i64) -> Result<()> {
    let events = desk
        .events()
        .poll_events_since(since, case_id.as_deref(), limit.max(1))
        .await?;

    if events.is_empty() {
        println!("No events after #{}", since);
        return Ok(());
    }

    for e in events {
        println!(
            "{:>6} {} {:<14} {:<10} {:<18} {}",
            e.id,
            format_timestamp(e.ts),
            e.kind.cyan(),
            if e.case_id.is_empty() { "—" } else { e.case_id.as_str() },
            truncate_string(&e.actor, 18),
            e.payload
        );
    }
    Ok(())
}

fn handle_config(command: &ConfigCommands, config: &AppConfig, path: &std::path::Path) -> Result<()> {
    match command {
        ConfigCommands::View => {
            println!("Configuration ({}):\n", path.display());
            println!("{}: {}", "facility".cyan(), config.facility);
            println!("{}: {}", "actor".cyan(), config.actor);
            println!("{}: {}", "data_dir".cyan(), config.data_dir().display());
            println!("{}: {}", "seed".cyan(), config.seed);
            println!("{}: {}", "seed_count".cyan(), config.seed_count);
            println!(
                "{}: {} ({})",
                "refresh_interval".cyan(),
                config.refresh_interval,
                config.refresh_label()
            );
            println!("{}: {}:{}", "web".cyan(), config.web_host, config.web_port);
            let token = std::env::var(WEB_TOKEN_ENV)
                .map(|t| mask_sensitive(&t, 4))
                .unwrap_or_else(|_| "(not set)".to_string());
            println!("{}: {}", WEB_TOKEN_ENV.cyan(), token);
            println!(
                "\nSnapshot last written: {}",
                std::fs::metadata(config.snapshot_path())
                    .and_then(|m| m.modified())
                    .map(|t| format_clock(Some(t.into())))
                    .unwrap_or_else(|_| "never".to_string())
            );
        }
        ConfigCommands::Validate => {
            let errors = config.validate();

            if errors.is_empty() {
                println!("{} Configuration is valid", "✓".green());
            } else {
                println!("{} Configuration errors:", "✗".red());
                for error in errors {
                    println!("  - {}", error);
                }
            }
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppConfig::default().save_to(path)?;
            println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        }
    }

    Ok(())
}
