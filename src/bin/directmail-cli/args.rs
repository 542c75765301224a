use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use directmail::{HostFallback, SendContext, SendOptions};

#[derive(Parser)]
#[command(name = "directmail-cli", version)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// format: human|json
    #[arg(long, global = true, default_value = "human")]
    pub format: String,

    /// deadline for the whole operation (ms, 0 = none)
    #[arg(long = "timeout", global = true, default_value_t = 5_000)]
    pub timeout_ms: u64,

    /// diagnostic events on stderr (feature `with-tracing`)
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// send one message to the recipient's MX host
    Send(SendArgs),
    /// print the MX hosts of a domain, in the order they would be tried
    Mx { domain: String },
}

#[derive(Args)]
pub struct SendArgs {
    /// recipient address
    #[arg(long)]
    pub to: String,

    /// sender address (envelope and From header)
    #[arg(long, default_value = "")]
    pub from: String,

    #[arg(long, default_value = "")]
    pub subject: String,

    /// message body
    #[arg(long, conflicts_with_all = ["body_file", "stdin"])]
    pub body: Option<String>,

    /// read the body from a file
    #[arg(long = "body-file", conflicts_with = "stdin")]
    pub body_file: Option<PathBuf>,

    /// read the body from stdin
    #[arg(long)]
    pub stdin: bool,

    /// name announced in EHLO/HELO
    #[arg(long, default_value = "localhost")]
    pub helo: String,

    /// port to try on each host (repeatable, default 25, 2525, 587)
    #[arg(long = "port")]
    pub ports: Vec<u16>,

    /// stop once every port of the first host failed
    #[arg(long = "abort-on-exhausted-host")]
    pub abort_on_exhausted_host: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn context(&self) -> SendContext {
        if self.timeout_ms == 0 {
            SendContext::background()
        } else {
            SendContext::with_timeout(Duration::from_millis(self.timeout_ms))
        }
    }
}

impl SendArgs {
    pub fn options(&self) -> SendOptions {
        let mut options = SendOptions {
            helo_domain: self.helo.clone(),
            ..SendOptions::default()
        };
        if !self.ports.is_empty() {
            options.ports = self.ports.clone();
        }
        if self.abort_on_exhausted_host {
            options.host_fallback = HostFallback::AbortOnExhaustedHost;
        }
        options
    }

    pub fn read_body(&self) -> Result<String> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }
        if let Some(path) = &self.body_file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("read body from {}", path.display()));
        }
        if self.stdin {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("read stdin")?;
            return Ok(body);
        }
        Ok(String::new())
    }
}
