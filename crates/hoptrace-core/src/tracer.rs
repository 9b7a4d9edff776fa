//! Iterative TTL-escalation hop tracing.
//!
//! Sends one probe at a time and waits for its outcome before sending
//! the next; hop state depends on the order of prior attempts, so
//! attempts are never parallelized.

use crate::{
    EchoProber, HopReport, NameService, ProbeResult, TraceError, TraceParams, PROBES_PER_HOP,
};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Discovers the hop sequence toward a destination by sending echo
/// probes with increasing TTL values.
pub struct HopTracer<P, N> {
    prober: P,
    names: Arc<N>,
    params: TraceParams,
}

impl<P: EchoProber, N: NameService> HopTracer<P, N> {
    pub fn new(prober: P, names: Arc<N>, params: TraceParams) -> Self {
        Self {
            prober,
            names,
            params,
        }
    }

    /// Runs one trace toward `destination`.
    ///
    /// Each call is an independent run with its own TTL counter starting
    /// at 1. Reports are pushed into `reports` the moment they are
    /// produced and returned collected once the trace ends: at the first
    /// report from the destination itself, or after `max_hops` reports.
    /// A run that exhausts the hop ceiling is an incomplete trace, not
    /// an error.
    pub async fn trace(
        &mut self,
        destination: IpAddr,
        reports: Option<&mpsc::UnboundedSender<HopReport>>,
    ) -> Result<Vec<HopReport>, TraceError> {
        self.params.validate()?;

        let mut history = Vec::new();
        for hop in 1..=self.params.max_hops {
            let report = self.probe_hop(destination, hop).await?;
            let reached = report.is_destination;

            if let Some(tx) = reports {
                // The receiver may already be gone; the collected history
                // is still returned to the caller.
                let _ = tx.send(report.clone());
            }
            history.push(report);

            if reached {
                debug!(hop, %destination, "reached destination, stopping");
                break;
            }
        }
        Ok(history)
    }

    /// Probes a single hop index: exactly [`PROBES_PER_HOP`] sequential
    /// attempts. The last reply's source wins when attempts disagree.
    async fn probe_hop(&mut self, destination: IpAddr, hop: u8) -> Result<HopReport, TraceError> {
        let mut attempts = Vec::with_capacity(PROBES_PER_HOP);
        let mut responder = None;

        for attempt in 0..PROBES_PER_HOP {
            let result = self
                .prober
                .probe(destination, hop, self.params.probe_timeout)
                .await?;
            match &result {
                ProbeResult::Reply { responder: addr, rtt } => {
                    trace!(
                        hop,
                        attempt,
                        responder = %addr,
                        rtt_ms = rtt.as_millis() as u64,
                        "probe replied"
                    );
                    responder = Some(*addr);
                }
                ProbeResult::Timeout => trace!(hop, attempt, "probe timed out"),
            }
            attempts.push(result);
        }

        // Reverse lookup failure degrades to the raw address.
        let hostname = match responder {
            Some(addr) => self.names.reverse_lookup(addr).await,
            None => None,
        };

        let is_destination = responder == Some(destination);
        debug!(hop, responder = ?responder, is_destination, "hop complete");

        Ok(HopReport {
            hop,
            attempts,
            responder,
            hostname,
            is_destination,
        })
    }
}
