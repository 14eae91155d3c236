use crate::report::aggregate::AggregatedResult;
use crate::report::debug::write_transcript;
use crate::types::ScenarioResult;
use reqwest::StatusCode;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_LIVE_INTERVAL: Duration = Duration::from_millis(1500);

pub type Sink = Box<dyn Write + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Aggregate every run; `None` disables the periodic live line.
    Stream { live_interval: Option<Duration> },
    /// Print a full transcript of a single run, no aggregation.
    Debug,
}

/// Consumes the result stream and renders it to a sink.
pub struct Reporter {
    mode: ReportMode,
    result: Arc<Mutex<AggregatedResult>>,
    out: Arc<Mutex<Sink>>,
    done_tx: oneshot::Sender<()>,
}

impl Reporter {
    /// Returns the reporter and its completion signal, fired once the stream is
    /// drained and the final output written.
    pub fn new(mode: ReportMode, out: Sink) -> (Self, oneshot::Receiver<()>) {
        let (done_tx, done_rx) = oneshot::channel();
        let reporter = Self {
            mode,
            result: Arc::new(Mutex::new(AggregatedResult::new())),
            out: Arc::new(Mutex::new(out)),
            done_tx,
        };
        (reporter, done_rx)
    }

    pub fn result(&self) -> Arc<Mutex<AggregatedResult>> {
        self.result.clone()
    }

    pub async fn start(self, input: mpsc::Receiver<ScenarioResult>) {
        match self.mode {
            ReportMode::Debug => self.print_debug(input).await,
            ReportMode::Stream { live_interval } => self.stream(input, live_interval).await,
        }

        if self.done_tx.send(()).is_err() {
            tracing::debug!("Nobody waiting for report completion");
        }
    }

    async fn stream(
        &self,
        mut input: mpsc::Receiver<ScenarioResult>,
        live_interval: Option<Duration>,
    ) {
        let stop = CancellationToken::new();
        let ticker = live_interval.map(|interval| {
            tokio::spawn(live_print_loop(
                interval,
                self.result.clone(),
                self.out.clone(),
                stop.clone(),
            ))
        });

        while let Some(result) = input.recv().await {
            self.result.lock().await.merge(&result);
        }

        tracing::info!("Result stream closed, rendering report");

        if let Some(ticker) = ticker {
            // The loop drains its in-flight prints before returning, so
            // nothing it queued can land after the report.
            stop.cancel();
            if let Err(e) = ticker.await {
                tracing::warn!("Live print loop failed: {}", e);
            }
            live_print(&self.result, &self.out).await;
        }

        let result = self.result.lock().await;
        let mut out = self.out.lock().await;
        if let Err(e) = write_report(&mut *out, &result).and_then(|_| out.flush()) {
            tracing::warn!("Failed to write report: {}", e);
        }
    }

    async fn print_debug(&self, mut input: mpsc::Receiver<ScenarioResult>) {
        // A single run is expected here.
        while let Some(result) = input.recv().await {
            let mut out = self.out.lock().await;
            if let Err(e) = write_transcript(&mut *out, &result).and_then(|_| out.flush()) {
                tracing::warn!("Failed to write transcript: {}", e);
            }
        }
    }
}

async fn live_print_loop(
    period: Duration,
    result: Arc<Mutex<AggregatedResult>>,
    out: Arc<Mutex<Sink>>,
    stop: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Prints are fire-and-forget so a stalled sink never delays the next tick.
    let mut prints = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }
        while prints.try_join_next().is_some() {}

        let result = result.clone();
        let out = out.clone();
        prints.spawn(async move { live_print(&result, &out).await });
    }

    prints.shutdown().await;
}

async fn live_print(result: &Mutex<AggregatedResult>, out: &Mutex<Sink>) {
    let line = {
        let result = result.lock().await;
        format_live_line(&result)
    };

    let mut out = out.lock().await;
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        tracing::warn!("Failed to write live line: {}", e);
    }
}

pub fn format_live_line(result: &AggregatedResult) -> String {
    format!(
        "Successful Run: {:<6} {:>3}% {:5} Failed Run: {:<6} {:>3}% {:5} Avg. Duration: {:.5}s",
        result.success_count,
        result.success_percentage(),
        "",
        result.failed_count,
        result.failed_percentage(),
        "",
        result.avg_duration
    )
}

pub fn write_report<W: Write + ?Sized>(w: &mut W, result: &AggregatedResult) -> io::Result<()> {
    writeln!(w, "\n\nRESULT")?;
    writeln!(w, "-------------------------------------")?;

    let steps = result.sorted_steps();
    let with_headers = steps.len() > 1;

    for (id, summary) in steps {
        if with_headers {
            let header = if summary.name.is_empty() {
                format!("Step {}", id)
            } else {
                summary.name.clone()
            };
            writeln!(w, "\n{}. {}", id, header)?;
            writeln!(w, "---------------------------------")?;
        }

        writeln!(
            w,
            "{:<18}{:<5} ({}%)",
            "Success Count:",
            summary.success_count,
            summary.success_percentage()
        )?;
        writeln!(
            w,
            "{:<18}{:<5} ({}%)",
            "Failed Count:",
            summary.failed_count,
            summary.failed_percentage()
        )?;

        writeln!(w, "\nDurations (Avg):")?;
        // BTreeMap iteration follows the phase presentation order.
        for (phase, avg) in &summary.durations {
            writeln!(w, "  {:<21}:{:.4}s", phase.label(), avg.avg)?;
        }

        if !summary.status_codes.is_empty() {
            writeln!(w, "\nStatus Code (Message) :Count")?;
            for (code, count) in &summary.status_codes {
                let desc = format!("{:>3} ({})", code, status_text(*code));
                writeln!(w, "  {:<24}:{}", desc, count)?;
            }
        }

        if !summary.errors.is_empty() {
            writeln!(w, "\nError Distribution (Count:Reason):")?;
            for (reason, count) in summary.sorted_errors() {
                writeln!(w, "  {:<6} :{}", count, reason)?;
            }
        }
        writeln!(w)?;
    }

    Ok(())
}

fn status_text(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
