//! Run controller: walks the switches in document order, building and
//! delivering each sequence while isolating per-switch failures.

pub mod gate;

use anyhow::Context;
use std::sync::Arc;
use tracing::Instrument;

use crate::commands;
use crate::models::{outcome_status, GlobalConfig, RunReport, SwitchConfig, SwitchOutcome};
use crate::transcript::TranscriptStore;
use crate::transport::{self, LinkFactory, Pacing};

pub use gate::{AutoGate, OperatorGate, StdinGate};

/// Provisioner drives console delivery for every switch in a run
pub struct Provisioner {
    global: Arc<GlobalConfig>,
    pacing: Pacing,
    links: Arc<dyn LinkFactory>,
    transcripts: Arc<dyn TranscriptStore>,
}

impl Provisioner {
    pub fn new(global: GlobalConfig, links: Arc<dyn LinkFactory>, transcripts: Arc<dyn TranscriptStore>) -> Self {
        Self {
            global: Arc::new(global),
            pacing: Pacing::default(),
            links,
            transcripts,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Build and deliver one switch. Never fails: every error becomes the
    /// outcome's status and message.
    pub async fn provision_switch(&self, switch: &SwitchConfig) -> SwitchOutcome {
        let hostname = switch.hostname.as_str();

        let sequence = match commands::build(switch, &self.global)
            .with_context(|| format!("switch {}: invalid configuration", hostname))
        {
            Ok(sequence) => sequence,
            Err(e) => {
                tracing::error!("{:#}", e);
                return SwitchOutcome::failed(hostname, outcome_status::INVALID_CONFIG, 0, format!("{:#}", e));
            }
        };

        let endpoint = switch.endpoint(&self.global);
        tracing::info!("Sending {} commands to {} on {}", sequence.len(), hostname, endpoint);

        let result = transport::deliver(
            self.links.clone(),
            endpoint,
            self.transcripts.clone(),
            hostname.to_string(),
            self.pacing,
            sequence,
        )
        .await;

        match result {
            Ok(delivery) => {
                tracing::info!("{} configured ({} commands sent)", hostname, delivery.sent);
                SwitchOutcome::completed(hostname, delivery.sent, delivery.transcript)
            }
            Err(e) => {
                let sent = e.sent;
                let e = anyhow::Error::new(e).context(format!("switch {}: console delivery failed", hostname));
                tracing::error!("{:#}", e);
                SwitchOutcome::failed(hostname, outcome_status::TRANSPORT_FAILED, sent, format!("{:#}", e))
            }
        }
    }

    /// Provision `switches` in order. The gate is asked before each switch
    /// after the first; a refusal marks the rest as not attempted.
    pub async fn run(&self, switches: &[SwitchConfig], gate: &mut dyn OperatorGate) -> RunReport {
        let mut report = RunReport::start();
        let span = tracing::info_span!("run", run_id = %report.run_id);

        self.run_all(switches, gate, &mut report).instrument(span).await;
        report.finish();

        tracing::info!(
            "Run {} finished: {} completed, {} invalid, {} transport failures, {} not attempted",
            report.run_id,
            report.count(outcome_status::COMPLETED),
            report.count(outcome_status::INVALID_CONFIG),
            report.count(outcome_status::TRANSPORT_FAILED),
            report.count(outcome_status::NOT_ATTEMPTED),
        );
        report
    }

    async fn run_all(&self, switches: &[SwitchConfig], gate: &mut dyn OperatorGate, report: &mut RunReport) {
        let total = switches.len();

        for (i, switch) in switches.iter().enumerate() {
            tracing::info!("Switch {}/{}: {}", i + 1, total, switch.hostname);

            let outcome = self
                .provision_switch(switch)
                .instrument(tracing::info_span!("switch", hostname = %switch.hostname))
                .await;

            let proceed = match switches.get(i + 1) {
                Some(next) => match gate.confirm_next(&outcome, next).await {
                    Ok(proceed) => proceed,
                    Err(e) => {
                        tracing::warn!("Operator prompt failed: {:#}", e);
                        false
                    }
                },
                None => true,
            };
            report.outcomes.push(outcome);

            if !proceed {
                tracing::warn!("Run stopped by operator after {}", switch.hostname);
                report
                    .outcomes
                    .extend(switches[i + 1..].iter().map(|s| SwitchOutcome::not_attempted(&s.hostname)));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::sample_inventory;
    use crate::models::{ConsoleEndpoint, Inventory, VlanId};
    use crate::transcript::testing::MemoryTranscriptStore;
    use crate::transcript::FileTranscriptStore;
    use crate::transport::testing::{no_delay, MockLink, MockLinkFactory};
    use async_trait::async_trait;

    /// Answers from a script and remembers who it was asked about
    struct ScriptedGate {
        answers: Vec<bool>,
        asked: Vec<String>,
    }

    #[async_trait]
    impl OperatorGate for ScriptedGate {
        async fn confirm_next(&mut self, _finished: &SwitchOutcome, next: &SwitchConfig) -> anyhow::Result<bool> {
            self.asked.push(next.hostname.clone());
            Ok(if self.answers.is_empty() { true } else { self.answers.remove(0) })
        }
    }

    /// Three copies of the sample switch, each on its own console port
    fn three_switches() -> Inventory {
        let mut inventory = sample_inventory();
        let template = inventory.switches[0].clone();
        inventory.switches = (1..=3)
            .map(|n| {
                let mut switch = template.clone();
                switch.hostname = format!("Switch{}", n);
                switch.console = Some(ConsoleEndpoint {
                    serial_port: format!("/dev/ttyUSB{}", n),
                    baud_rate: 9600,
                });
                switch
            })
            .collect();
        inventory
    }

    fn provisioner(inventory: &Inventory, links: MockLinkFactory, transcripts: MemoryTranscriptStore) -> Provisioner {
        Provisioner::new(inventory.global.clone(), Arc::new(links), Arc::new(transcripts)).with_pacing(no_delay())
    }

    fn expected_len(inventory: &Inventory, switch: &SwitchConfig) -> usize {
        commands::build(switch, &inventory.global).unwrap().len()
    }

    #[tokio::test]
    async fn test_provision_switch_completed() {
        let inventory = sample_inventory();
        let link = MockLink::default();
        let links = MockLinkFactory::default().with_link("/dev/ttyUSB0", link.clone());
        let transcripts = MemoryTranscriptStore::default();
        let p = provisioner(&inventory, links, transcripts.clone());

        let outcome = p.provision_switch(&inventory.switches[0]).await;
        assert_eq!(outcome.status, outcome_status::COMPLETED);
        assert_eq!(outcome.commands_sent, expected_len(&inventory, &inventory.switches[0]));
        assert_eq!(outcome.transcript.as_deref(), Some("memory:Switch1"));

        let written = link.written();
        assert_eq!(written[2], "enable\r\n");
        assert_eq!(written[4], "hostname Switch1\r\n");
        assert_eq!(written.last().map(String::as_str), Some("wr mem\r\n"));
        assert_eq!(transcripts.entries("Switch1").len(), written.len());
    }

    #[tokio::test]
    async fn test_provision_switch_invalid_config_sends_nothing() {
        let mut inventory = sample_inventory();
        inventory.switches[0].vlans.remove(&VlanId::new(20).unwrap());
        let links = MockLinkFactory::default().with_link("/dev/ttyUSB0", MockLink::default());
        let p = provisioner(&inventory, links.clone(), MemoryTranscriptStore::default());

        let outcome = p.provision_switch(&inventory.switches[0]).await;
        assert_eq!(outcome.status, outcome_status::INVALID_CONFIG);
        assert_eq!(outcome.commands_sent, 0);
        let error = outcome.error.unwrap();
        assert!(error.starts_with("switch Switch1: invalid configuration: "), "{}", error);
        assert!(error.contains("VLAN 20"), "{}", error);
        assert!(links.opened().is_empty());
    }

    #[tokio::test]
    async fn test_provision_switch_transport_failure_keeps_partial_count() {
        let inventory = sample_inventory();
        let link = MockLink {
            fail_write_at: Some(7),
            ..MockLink::default()
        };
        let links = MockLinkFactory::default().with_link("/dev/ttyUSB0", link);
        let p = provisioner(&inventory, links, MemoryTranscriptStore::default());

        let outcome = p.provision_switch(&inventory.switches[0]).await;
        assert_eq!(outcome.status, outcome_status::TRANSPORT_FAILED);
        assert_eq!(outcome.commands_sent, 7);
        let error = outcome.error.unwrap();
        assert!(error.contains("switch Switch1: console delivery failed"), "{}", error);
        assert!(error.contains("console unplugged"), "{}", error);
    }

    #[tokio::test]
    async fn test_unreachable_console_leaves_no_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = sample_inventory();
        let p = Provisioner::new(
            inventory.global.clone(),
            Arc::new(MockLinkFactory::default()),
            Arc::new(FileTranscriptStore::new(dir.path())),
        )
        .with_pacing(no_delay());

        let outcome = p.provision_switch(&inventory.switches[0]).await;
        assert_eq!(outcome.status, outcome_status::TRANSPORT_FAILED);
        assert_eq!(outcome.transcript, None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_isolates_failures() {
        let mut inventory = three_switches();
        inventory.switches[0].vlans.remove(&VlanId::new(10).unwrap());
        // Switch2 has no console attached; Switch3 is healthy.
        let switch3 = MockLink::default();
        let links = MockLinkFactory::default().with_link("/dev/ttyUSB3", switch3.clone());
        let p = provisioner(&inventory, links, MemoryTranscriptStore::default());

        let mut gate = AutoGate;
        let report = p.run(&inventory.switches, &mut gate).await;

        let statuses: Vec<&str> = report.outcomes.iter().map(|o| o.status.as_str()).collect();
        assert_eq!(
            statuses,
            vec![
                outcome_status::INVALID_CONFIG,
                outcome_status::TRANSPORT_FAILED,
                outcome_status::COMPLETED
            ]
        );
        assert_eq!(switch3.written().len(), expected_len(&inventory, &inventory.switches[2]));
        assert!(report.has_failures());
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_run_stops_when_operator_declines() {
        let inventory = three_switches();
        let links = MockLinkFactory::default()
            .with_link("/dev/ttyUSB1", MockLink::default())
            .with_link("/dev/ttyUSB2", MockLink::default())
            .with_link("/dev/ttyUSB3", MockLink::default());
        let p = provisioner(&inventory, links.clone(), MemoryTranscriptStore::default());

        let mut gate = ScriptedGate {
            answers: vec![true, false],
            asked: Vec::new(),
        };
        let report = p.run(&inventory.switches, &mut gate).await;

        assert_eq!(gate.asked, vec!["Switch2", "Switch3"]);
        assert_eq!(report.count(outcome_status::COMPLETED), 2);
        assert_eq!(report.outcomes[2].hostname, "Switch3");
        assert_eq!(report.outcomes[2].status, outcome_status::NOT_ATTEMPTED);
        assert_eq!(links.opened().len(), 2);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_gate_not_consulted_for_single_switch() {
        let inventory = sample_inventory();
        let links = MockLinkFactory::default().with_link("/dev/ttyUSB0", MockLink::default());
        let p = provisioner(&inventory, links, MemoryTranscriptStore::default());

        let mut gate = ScriptedGate {
            answers: vec![false],
            asked: Vec::new(),
        };
        let report = p.run(&inventory.switches, &mut gate).await;
        assert!(gate.asked.is_empty());
        assert_eq!(report.count(outcome_status::COMPLETED), 1);
    }

    #[tokio::test]
    async fn test_run_with_no_switches() {
        let mut inventory = sample_inventory();
        inventory.switches.clear();
        let p = provisioner(&inventory, MockLinkFactory::default(), MemoryTranscriptStore::default());
        let report = p.run(&inventory.switches, &mut AutoGate).await;
        assert!(report.outcomes.is_empty());
        assert!(!report.has_failures());
    }
}
