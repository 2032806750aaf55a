//! Printing responses.

use acore::{Error, Provider};
use anyhow::Result;
use client::{PendingReply, ResponseStream, ServiceClient, SessionState, UsageStats};
use futures_util::StreamExt;
use std::io::Write;

/// Attach the remediation hint to a client error.
pub fn report(err: Error) -> anyhow::Error {
    anyhow::anyhow!("{err}\nhint: {}", err.hint())
}

/// Print a complete reply; Ctrl-C cancels it.
pub async fn print_reply<P: Provider>(client: &ServiceClient<P>, reply: PendingReply) -> Result<()> {
    let id = reply.id();
    let mut reply = reply;
    let result = loop {
        tokio::select! {
            result = &mut reply => break result,
            _ = tokio::signal::ctrl_c() => client.cancel(id),
        }
    };
    match result {
        Ok(completion) => {
            println!("{}", completion.text);
            Ok(())
        }
        Err(Error::Cancelled(reason)) => {
            eprintln!("request {reason}");
            Ok(())
        }
        Err(err) => Err(report(err)),
    }
}

/// Print chunks as they arrive; Ctrl-C cancels the stream.
pub async fn print_stream<P: Provider>(
    client: &ServiceClient<P>,
    mut stream: ResponseStream,
) -> Result<()> {
    let id = stream.id();
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    write!(stdout, "{}", chunk.text)?;
                    stdout.flush()?;
                }
                Some(Err(err)) => {
                    writeln!(stdout)?;
                    return Err(report(err));
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => client.cancel(id),
        }
    }
    writeln!(stdout)?;
    if let SessionState::Cancelled(reason) = stream.state() {
        eprintln!("request {reason}");
    }
    Ok(())
}

/// Print usage totals.
pub fn print_usage(stats: &UsageStats) {
    eprintln!(
        "requests: {}, attempts: {}, tokens: {} in / {} out",
        stats.requests, stats.attempts, stats.prompt_tokens, stats.output_tokens
    );
    for quota in &stats.quotas {
        eprintln!(
            "  {}: {}/{} requests, {}/{} tokens",
            quota.model,
            quota.requests_used,
            quota.requests_limit,
            quota.tokens_used,
            quota.tokens_limit
        );
    }
}
