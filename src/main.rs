use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ticket_triage::assignment::engine::assign_property_batch;
use ticket_triage::assignment::{AssignmentSummary, TicketRef};
use ticket_triage::audit::writer::spawn_writer;
use ticket_triage::audit::AuditLogEntry;
use ticket_triage::config::{Config, ConfigOverrides};
use ticket_triage::dictionary::builtin::builtin;
use ticket_triage::dictionary::{DictionarySummary, SkillGroup};
use ticket_triage::output::csv::{assignments_to_csv, audit_to_csv, roster_to_csv};
use ticket_triage::output::json::render_json;
use ticket_triage::output::table::{
    render_assignment_table, render_audit_table, render_classification_table,
    render_dictionary_table, render_roster_table,
};
use ticket_triage::resolver::{ResolvePolicy, ResolvedClassification};
use ticket_triage::roster::WorkerSkillEntry;
use ticket_triage::server::{build_audit_sinks, build_resolver, run_server};
use ticket_triage::store::TriageStore;
use tracing::warn;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "ticket-triage",
    about = "Maintenance ticket classification and fair assignment"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(long = "gateway-endpoint")]
    gateway_endpoint: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify one ticket text into a skill group and issue code
    Classify {
        text: String,
        #[arg(long)]
        force_escalation: bool,
    },
    /// Assign a batch of classified tickets to workers at one property
    Assign {
        #[arg(long)]
        property: String,
        /// Comma-separated ticket list, e.g. "T-100=plumbing,T-101=technical"
        #[arg(long)]
        tickets: String,
    },
    /// Manage the worker roster
    #[command(subcommand)]
    Roster(RosterCommands),
    /// Show the built-in issue dictionary
    Dictionary,
    /// Show recent classification decisions
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RosterCommands {
    Add {
        #[arg(long)]
        worker: String,
        #[arg(long)]
        property: String,
        /// Comma-separated skill groups, e.g. "plumbing,technical"
        #[arg(long)]
        skills: String,
        #[arg(long)]
        available: Option<bool>,
        #[arg(long = "checked-in")]
        checked_in: Option<bool>,
    },
    List {
        #[arg(long)]
        property: String,
    },
    Presence {
        #[arg(long)]
        worker: String,
        #[arg(long)]
        property: String,
        #[arg(long = "checked-in")]
        checked_in: Option<bool>,
        #[arg(long)]
        available: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        gateway_endpoint: cli.gateway_endpoint.clone(),
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let db_path = config.resolved_db_path();

    match &cli.command {
        Commands::Classify {
            text,
            force_escalation,
        } => {
            let sinks = build_audit_sinks(&config, &db_path)?;
            let (audit, writer) = spawn_writer(sinks);
            let resolver = build_resolver(&config, audit)?;
            let policy = ResolvePolicy {
                force_escalation: *force_escalation || config.classifier.force_escalation,
            };
            let decision = resolver.resolve(text, &policy).await;
            drop(resolver);
            writer.await?;
            print_classification(&decision, cli.output)?;
        }
        Commands::Assign { property, tickets } => {
            let parsed = parse_ticket_list(tickets)?;
            let store = TriageStore::open(&db_path)?;
            let summary = assign_property_batch(&store, property, &parsed)?;
            print_assignments(&summary, cli.output)?;
        }
        Commands::Roster(roster_command) => match roster_command {
            RosterCommands::Add {
                worker,
                property,
                skills,
                available,
                checked_in,
            } => {
                let skill_groups = parse_skill_list(skills)?;
                let store = TriageStore::open(&db_path)?;
                for group in &skill_groups {
                    store.upsert_worker(&WorkerSkillEntry {
                        worker_id: worker.clone(),
                        property_id: property.clone(),
                        skill_group: *group,
                        is_available: available.unwrap_or(true),
                        is_checked_in: checked_in.unwrap_or(false),
                        last_assigned_at: None,
                    })?;
                }
                println!(
                    "Registered {} skill rows for {worker} at {property}",
                    skill_groups.len()
                );
            }
            RosterCommands::List { property } => {
                let store = TriageStore::open(&db_path)?;
                let workers = store.list_workers(property)?;
                print_roster(&workers, cli.output)?;
            }
            RosterCommands::Presence {
                worker,
                property,
                checked_in,
                available,
            } => {
                let store = TriageStore::open(&db_path)?;
                let rows = store.set_presence(worker, property, *checked_in, *available)?;
                if rows == 0 {
                    return Err(anyhow!(
                        "no roster rows for worker {worker} at property {property}"
                    ));
                }
                println!("Updated {rows} roster rows for {worker} at {property}");
            }
        },
        Commands::Dictionary => {
            let summary = builtin().summarize();
            print_dictionary(&summary, cli.output)?;
        }
        Commands::Audit { limit } => {
            let store = TriageStore::open(&db_path)?;
            let entries = store.recent_decisions((*limit).max(1))?;
            print_audit(&entries, cli.output)?;
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn parse_ticket_list(raw: &str) -> Result<Vec<TicketRef>> {
    let mut out = Vec::new();
    for piece in raw.split(',') {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((ticket_id, group)) = trimmed.split_once('=') else {
            return Err(anyhow!("expected ticket_id=skill_group, got: {trimmed}"));
        };
        let ticket_id = ticket_id.trim();
        if ticket_id.is_empty() {
            return Err(anyhow!("ticket id is empty in: {trimmed}"));
        }
        out.push(TicketRef {
            ticket_id: ticket_id.to_string(),
            skill_group: SkillGroup::from_str(group.trim())?,
        });
    }
    if out.is_empty() {
        return Err(anyhow!("ticket list is empty"));
    }
    Ok(out)
}

fn parse_skill_list(raw: &str) -> Result<Vec<SkillGroup>> {
    let mut out = Vec::new();
    for piece in raw.split(',') {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push(SkillGroup::from_str(trimmed)?);
    }
    if out.is_empty() {
        return Err(anyhow!("skill list is empty"));
    }
    out.sort();
    out.dedup();
    Ok(out)
}

fn print_classification(decision: &ResolvedClassification, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_classification_table(decision)),
        OutputFormat::Json => println!("{}", render_json(decision)?),
        OutputFormat::Csv => {
            warn!("CSV output for classify not implemented, using JSON");
            println!("{}", render_json(decision)?);
        }
    }
    Ok(())
}

fn print_assignments(summary: &AssignmentSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_assignment_table(summary)),
        OutputFormat::Json => println!("{}", render_json(summary)?),
        OutputFormat::Csv => println!("{}", assignments_to_csv(summary)?),
    }
    Ok(())
}

fn print_roster(workers: &[WorkerSkillEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_roster_table(workers)),
        OutputFormat::Json => println!("{}", render_json(workers)?),
        OutputFormat::Csv => println!("{}", roster_to_csv(workers)?),
    }
    Ok(())
}

fn print_dictionary(summary: &DictionarySummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_dictionary_table(summary)),
        OutputFormat::Json => println!("{}", render_json(summary)?),
        OutputFormat::Csv => {
            warn!("CSV output for dictionary not implemented, using JSON");
            println!("{}", render_json(summary)?);
        }
    }
    Ok(())
}

fn print_audit(entries: &[AuditLogEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_audit_table(entries)),
        OutputFormat::Json => println!("{}", render_json(entries)?),
        OutputFormat::Csv => println!("{}", audit_to_csv(entries)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_skill_list, parse_ticket_list};
    use ticket_triage::dictionary::SkillGroup;

    #[test]
    fn parses_ticket_list_pairs() {
        let tickets =
            parse_ticket_list("T-100=plumbing, T-101=technical").expect("failed to parse tickets");
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].ticket_id, "T-100");
        assert_eq!(tickets[0].skill_group, SkillGroup::Plumbing);
        assert_eq!(tickets[1].skill_group, SkillGroup::Technical);
    }

    #[test]
    fn rejects_ticket_without_skill_group() {
        assert!(parse_ticket_list("T-100").is_err());
        assert!(parse_ticket_list("=plumbing").is_err());
        assert!(parse_ticket_list("").is_err());
    }

    #[test]
    fn skill_list_dedupes_aliases() {
        let skills = parse_skill_list("plumbing,plumber,soft").expect("failed to parse skills");
        assert_eq!(
            skills,
            vec![SkillGroup::Plumbing, SkillGroup::SoftService]
        );
    }
}
