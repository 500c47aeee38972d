use std::collections::HashMap;
use std::time::Instant;

/// Observer for extraction events.
///
/// Keeps timing and summary output out of the extractor itself, so the CLI
/// can report per-stage cost while library callers stay silent.
pub trait ExtractionLogger: Send {
    /// Record how long a named stage (`capture`, `convert`, `inference`)
    /// took for one call.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record the outcome of one processed frame.
    fn frame(&mut self, face_found: bool);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullExtractionLogger;

impl ExtractionLogger for NullExtractionLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn frame(&mut self, _face_found: bool) {}
}

/// Logger that forwards timings to the `log` facade at debug level and
/// prints an aggregate report when the extractor closes.
pub struct LogExtractionLogger {
    timings: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames: usize,
    faces: usize,
}

impl LogExtractionLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
            faces: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Extraction summary ({} frames, {} with a face, {:.1}s total):",
            self.frames,
            self.faces,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        if self.frames > 0 && elapsed_ms > 0.0 {
            let fps = self.frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }
}

impl Default for LogExtractionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionLogger for LogExtractionLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        log::debug!("{stage}: {duration_ms:.1}ms");
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn frame(&mut self, face_found: bool) {
        self.frames += 1;
        if face_found {
            self.faces += 1;
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
