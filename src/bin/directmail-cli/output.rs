use std::error::Error as _;

use anyhow::{Result, bail};
use directmail::{Message, MxError, MxRecord, SendError};

pub fn write_send(format: &str, message: &Message, outcome: &Result<(), SendError>) -> Result<()> {
    match format {
        "human" => {
            match outcome {
                Ok(()) => println!("[SENT]   {}", message.to),
                Err(err) => {
                    println!("[FAILED] {} :: {err}", message.to);
                    print_causes(err);
                }
            }
            Ok(())
        }
        "json" => write_send_json(message, outcome),
        other => bail!("unknown --format '{other}', use: human|json"),
    }
}

pub fn write_mx(format: &str, domain: &str, outcome: &Result<Vec<MxRecord>, MxError>) -> Result<()> {
    match format {
        "human" => {
            match outcome {
                Ok(records) => {
                    println!("[MX]     {domain}");
                    for record in records {
                        println!("        {:>5} {}", record.preference, record.exchange);
                    }
                }
                Err(err) => {
                    println!("[FAILED] {domain} :: {err}");
                    print_causes(err);
                }
            }
            Ok(())
        }
        "json" => write_mx_json(domain, outcome),
        other => bail!("unknown --format '{other}', use: human|json"),
    }
}

fn print_causes(err: &dyn std::error::Error) {
    let mut source = err.source();
    while let Some(cause) = source {
        println!("        caused by: {cause}");
        source = cause.source();
    }
}

#[cfg(feature = "with-serde")]
fn write_send_json(message: &Message, outcome: &Result<(), SendError>) -> Result<()> {
    #[derive(serde::Serialize)]
    struct SendReport<'a> {
        to: &'a str,
        sent: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<directmail::ErrorKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        cancelled: bool,
    }

    let report = SendReport {
        to: &message.to,
        sent: outcome.is_ok(),
        kind: outcome.as_ref().err().map(SendError::kind),
        error: outcome.as_ref().err().map(ToString::to_string),
        cancelled: outcome.as_ref().err().is_some_and(SendError::is_cancellation),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_send_json(_message: &Message, _outcome: &Result<(), SendError>) -> Result<()> {
    bail!("format=json requires the 'with-serde' feature")
}

#[cfg(feature = "with-serde")]
fn write_mx_json(domain: &str, outcome: &Result<Vec<MxRecord>, MxError>) -> Result<()> {
    #[derive(serde::Serialize)]
    struct MxReport<'a> {
        domain: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        records: Option<&'a [MxRecord]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    }

    let report = MxReport {
        domain,
        records: outcome.as_ref().ok().map(Vec::as_slice),
        error: outcome.as_ref().err().map(ToString::to_string),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_mx_json(_domain: &str, _outcome: &Result<Vec<MxRecord>, MxError>) -> Result<()> {
    bail!("format=json requires the 'with-serde' feature")
}
