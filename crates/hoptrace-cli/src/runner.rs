//! Per-family trace orchestration and console formatting.

use hoptrace_core::{
    HopReport, HopTracer, HostResolution, ProbeResult, Resolver, TraceError, TraceParams,
};
use hoptrace_dns::SystemNameService;
use hoptrace_icmp::IcmpProber;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Resolves the target and traces each qualifying address family,
/// IPv4 first, printing hop lines as they are produced.
pub async fn run(target: &str) -> ExitCode {
    let names = match SystemNameService::new() {
        Ok(names) => Arc::new(names),
        Err(err) => {
            eprintln!("hoptrace: {err}");
            return ExitCode::FAILURE;
        }
    };

    let resolution = match Resolver::new(Arc::clone(&names)).resolve(target).await {
        Ok(resolution) => resolution,
        Err(TraceError::NameNotFound { .. }) => {
            println!("Unable to resolve target system name {target}.");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("hoptrace: {err}");
            return ExitCode::FAILURE;
        }
    };

    let params = TraceParams::default();
    for family in resolution.traceable_families() {
        // Only the first resolved address per family is traced.
        let destination = match resolution.destination(family) {
            Some(addr) => addr,
            None => continue,
        };
        info!(%destination, %family, "starting trace");

        println!("{}", trace_header(&resolution, destination, params.max_hops));

        let prober = match IcmpProber::new(family) {
            Ok(prober) => prober,
            Err(err) => {
                eprintln!("hoptrace: {err}");
                return ExitCode::FAILURE;
            }
        };
        let mut tracer = HopTracer::new(prober, Arc::clone(&names), params.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                println!("{}", hop_line(&report));
            }
        });

        let outcome = tracer.trace(destination, Some(&tx)).await;
        drop(tx);
        // Let the printer drain whatever was emitted before returning.
        let _ = printer.await;

        if let Err(err) = outcome {
            eprintln!("hoptrace: {err}");
            return ExitCode::FAILURE;
        }
        debug!(%destination, %family, "trace finished");
        println!("\nTrace complete.");
    }

    ExitCode::SUCCESS
}

/// Header line for one family's trace.
fn trace_header(resolution: &HostResolution, destination: IpAddr, max_hops: u8) -> String {
    match resolution.display_name.as_deref() {
        Some(name) => {
            format!("Tracing route to {name} [{destination}] over a maximum of {max_hops} hops:")
        }
        None => format!("Tracing route to {destination} over a maximum of {max_hops} hops:"),
    }
}

/// One console line per hop report: the hop index, a latency cell per
/// attempt, then the responder (or the timeout notice).
fn hop_line(report: &HopReport) -> String {
    let mut line = format!(" {}\t", report.hop);
    for attempt in &report.attempts {
        line.push_str(&attempt_cell(attempt));
    }
    match report.responder {
        None => line.push_str("Request timed out."),
        Some(addr) => match report.hostname.as_deref() {
            Some(name) => line.push_str(&format!("{name} [{addr}]")),
            None => line.push_str(&addr.to_string()),
        },
    }
    line
}

/// Latency cell for a single attempt. Sub-millisecond round trips
/// render as "<1 ms".
fn attempt_cell(attempt: &ProbeResult) -> String {
    match attempt {
        ProbeResult::Timeout => "  *\t".to_string(),
        ProbeResult::Reply { rtt, .. } => {
            let millis = rtt.as_millis();
            if millis == 0 {
                "<1 ms\t".to_string()
            } else {
                format!("{millis} ms\t")
            }
        }
    }
}
