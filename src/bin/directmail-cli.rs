#[path = "directmail-cli/args.rs"]
mod args;
#[path = "directmail-cli/output.rs"]
mod output;

use anyhow::Result;
use directmail::{Message, lookup_mx};

use crate::args::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = cli.context();

    let ok = match &cli.cmd {
        Commands::Send(send) => {
            let message = Message::new(
                send.to.as_str(),
                send.from.as_str(),
                send.subject.as_str(),
                send.read_body()?,
            );
            let outcome = message.send_with_options(&ctx, &send.options());
            output::write_send(&cli.format, &message, &outcome)?;
            outcome.is_ok()
        }
        Commands::Mx { domain } => {
            let outcome = lookup_mx(domain, &ctx);
            output::write_mx(&cli.format, domain, &outcome)?;
            outcome.is_ok()
        }
    };

    // exit codes: 0 OK, 2 send/lookup failed, 1 fatal
    if !ok {
        std::process::exit(2);
    }
    Ok(())
}

#[cfg(feature = "with-tracing")]
fn init_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::TRACE)
            .init();
    }
}

#[cfg(not(feature = "with-tracing"))]
fn init_logging(verbose: bool) {
    if verbose {
        eprintln!("--verbose requires the 'with-tracing' feature");
    }
}
