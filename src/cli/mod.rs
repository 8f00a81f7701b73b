use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::commands;
use crate::config::Settings;
use crate::inventory;
use crate::models::{Inventory, RunReport};
use crate::provision::{AutoGate, OperatorGate, Provisioner, StdinGate};
use crate::transcript::{FileTranscriptStore, NullTranscriptStore, TranscriptStore};
use crate::transport::SerialLinkFactory;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure every switch in the document over its serial console
    Provision(ProvisionArgs),

    /// Print each switch's command sequence without touching a console
    Render {
        #[command(flatten)]
        source: ConfigArg,

        /// Only render this switch
        #[arg(long)]
        switch: Option<String>,
    },

    /// Validate the document and build every sequence
    Check {
        #[command(flatten)]
        source: ConfigArg,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Switch document (defaults to CONFIG_FILE, then config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub source: ConfigArg,

    /// Move on to the next switch without waiting for the operator
    #[arg(long)]
    pub no_pause: bool,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[arg(long)]
    pub transcript_dir: Option<PathBuf>,

    /// Do not keep console transcripts
    #[arg(long)]
    pub no_transcripts: bool,

    #[arg(long)]
    pub command_delay_ms: Option<u64>,

    #[arg(long)]
    pub handshake_delay_ms: Option<u64>,
}

impl ProvisionArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(ref path) = self.source.config {
            settings.config_file = path.clone();
        }
        if let Some(ref dir) = self.transcript_dir {
            settings.transcript_dir = dir.clone();
        }
        if self.no_transcripts {
            settings.transcripts_enabled = false;
        }
        if let Some(ms) = self.command_delay_ms {
            settings.command_delay_ms = ms;
        }
        if let Some(ms) = self.handshake_delay_ms {
            settings.handshake_delay_ms = ms;
        }
    }
}

/// Run a subcommand. Returns false when any switch failed.
pub async fn dispatch(command: Commands, mut settings: Settings) -> Result<bool> {
    match command {
        Commands::Provision(args) => {
            args.apply(&mut settings);
            let inventory = load(&settings.config_file)?;
            provision(inventory, &settings, &args).await
        }
        Commands::Render { source, switch } => {
            let inventory = load(source.config.as_deref().unwrap_or(&settings.config_file))?;
            print!("{}", render(&inventory, switch.as_deref())?);
            Ok(true)
        }
        Commands::Check { source } => {
            let inventory = load(source.config.as_deref().unwrap_or(&settings.config_file))?;
            let (summary, ok) = check(&inventory);
            print!("{}", summary);
            Ok(ok)
        }
    }
}

fn load(path: &Path) -> Result<Inventory> {
    tracing::info!("Loading {}", path.display());
    inventory::load_file(path).with_context(|| format!("cannot load {}", path.display()))
}

async fn provision(inventory: Inventory, settings: &Settings, args: &ProvisionArgs) -> Result<bool> {
    let transcripts: Arc<dyn TranscriptStore> = if settings.transcripts_enabled {
        tracing::info!("Transcripts: {}", settings.transcript_dir.display());
        Arc::new(FileTranscriptStore::new(&settings.transcript_dir))
    } else {
        Arc::new(NullTranscriptStore)
    };
    let links = Arc::new(SerialLinkFactory {
        timeout: settings.serial_timeout(),
    });

    let provisioner = Provisioner::new(inventory.global, links, transcripts).with_pacing(settings.pacing());

    let mut gate: Box<dyn OperatorGate> = if args.no_pause {
        Box::new(AutoGate)
    } else {
        Box::new(StdinGate::stdin())
    };
    let report = provisioner.run(&inventory.switches, gate.as_mut()).await;

    if let Some(ref path) = args.report {
        write_report(&report, path)?;
        tracing::info!("Report written to {}", path.display());
    }

    for failure in report.failures() {
        tracing::error!(
            "{}: {}",
            failure.hostname,
            failure.error.as_deref().unwrap_or(&failure.status)
        );
    }
    Ok(!report.has_failures())
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json + "\n").with_context(|| format!("cannot write report {}", path.display()))
}

/// Every selected switch's sequence, one command per line, under a comment
/// header naming the switch and its console.
pub fn render(inventory: &Inventory, only: Option<&str>) -> Result<String> {
    let selected: Vec<_> = inventory
        .switches
        .iter()
        .filter(|s| only.map_or(true, |h| s.hostname.eq_ignore_ascii_case(h)))
        .collect();
    if let (Some(hostname), true) = (only, selected.is_empty()) {
        bail!("no switch named {} in the document", hostname);
    }

    let mut out = String::new();
    for switch in selected {
        let sequence = commands::build(switch, &inventory.global)
            .with_context(|| format!("switch {}: invalid configuration", switch.hostname))?;
        writeln!(out, "! {} via {}", switch.hostname, switch.endpoint(&inventory.global))?;
        for command in sequence.iter() {
            writeln!(out, "{}", command)?;
        }
        writeln!(out)?;
    }
    Ok(out)
}

/// One line per switch; false when any switch fails to build
pub fn check(inventory: &Inventory) -> (String, bool) {
    let mut out = String::new();
    let mut ok = true;
    for switch in &inventory.switches {
        let line = match commands::build(switch, &inventory.global) {
            Ok(sequence) => format!("ok     {} ({} commands)", switch.hostname, sequence.len()),
            Err(e) => {
                ok = false;
                format!("error  {}: {}", switch.hostname, e)
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    (out, ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::sample_inventory;
    use crate::models::VlanId;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_parse_provision_flags() {
        let cli = TestCli::try_parse_from([
            "switch-provisioner",
            "provision",
            "--config",
            "lab.json",
            "--no-pause",
            "--command-delay-ms",
            "250",
        ])
        .unwrap();
        let Commands::Provision(args) = cli.command else {
            panic!("expected provision");
        };
        assert!(args.no_pause);
        assert!(!args.no_transcripts);

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.config_file, PathBuf::from("lab.json"));
        assert_eq!(settings.command_delay_ms, 250);
        assert_eq!(settings.handshake_delay_ms, 3000);
        assert!(settings.transcripts_enabled);
    }

    #[test]
    fn test_parse_render() {
        let cli = TestCli::try_parse_from(["switch-provisioner", "render", "-c", "lab.json", "--switch", "Switch1"]).unwrap();
        match cli.command {
            Commands::Render { source, switch } => {
                assert_eq!(source.config, Some(PathBuf::from("lab.json")));
                assert_eq!(switch.as_deref(), Some("Switch1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_render() {
        let inventory = sample_inventory();
        let out = render(&inventory, None).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "! Switch1 via /dev/ttyUSB0@9600");
        assert_eq!(lines[3], "enable");
        assert_eq!(lines[4], "configure terminal");
        assert_eq!(lines[5], "hostname Switch1");
        assert!(out.contains("\nwr mem\n"));
    }

    #[test]
    fn test_render_unknown_switch() {
        let err = render(&sample_inventory(), Some("Switch9")).unwrap_err();
        assert!(err.to_string().contains("Switch9"));
    }

    #[test]
    fn test_check_reports_each_switch() {
        let mut inventory = sample_inventory();
        let mut broken = inventory.switches[0].clone();
        broken.hostname = "Switch2".to_string();
        broken.vlans.remove(&VlanId::new(10).unwrap());
        inventory.switches.push(broken);

        let (summary, ok) = check(&inventory);
        assert!(!ok);
        let lines: Vec<&str> = summary.lines().collect();
        assert!(lines[0].starts_with("ok     Switch1 ("));
        assert!(lines[1].starts_with("error  Switch2: "));
        assert!(lines[1].contains("VLAN 10"));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = RunReport::start();
        report.outcomes.push(crate::models::SwitchOutcome::not_attempted("Switch1"));
        report.finish();

        write_report(&report, &path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run_id"], report.run_id.as_str());
        assert_eq!(value["outcomes"][0]["status"], "not_attempted");
    }
}
