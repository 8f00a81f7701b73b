use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::models::{SwitchConfig, SwitchOutcome};

/// OperatorGate decides whether the run moves on to the next switch.
/// Consulted after every switch except the last.
#[async_trait]
pub trait OperatorGate: Send {
    async fn confirm_next(&mut self, finished: &SwitchOutcome, next: &SwitchConfig) -> Result<bool>;
}

/// Always continues; used with --no-pause
pub struct AutoGate;

#[async_trait]
impl OperatorGate for AutoGate {
    async fn confirm_next(&mut self, _finished: &SwitchOutcome, _next: &SwitchConfig) -> Result<bool> {
        Ok(true)
    }
}

/// Prompts on stderr and waits for a line of input. Enter or `y` continues,
/// `n` or `q` stops. End of input stops the run.
pub struct PromptGate<R> {
    lines: Lines<R>,
}

pub type StdinGate = PromptGate<BufReader<Stdin>>;

impl StdinGate {
    pub fn stdin() -> Self {
        PromptGate::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> PromptGate<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines() }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> OperatorGate for PromptGate<R> {
    async fn confirm_next(&mut self, finished: &SwitchOutcome, next: &SwitchConfig) -> Result<bool> {
        eprintln!();
        eprintln!("{} finished: {}", finished.hostname, finished.status);
        loop {
            eprintln!(
                "Move the console cable to {} and press Enter to continue (q to stop):",
                next.hostname
            );

            let Some(line) = self.lines.next_line().await? else {
                tracing::info!("Operator input closed");
                return Ok(false);
            };
            match line.trim().to_ascii_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" | "q" | "quit" => return Ok(false),
                other => eprintln!("Unrecognised answer {:?}", other),
            }
        }
    }
}
