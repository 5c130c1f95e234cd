use log::{error, info, warn};
use std::fmt::{self, Display, Formatter};

/// Aggregate outcome of a run. The numeric value is the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Clean = 0,
    Recoverable = 1,
    Critical = 2,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        self as i32
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let descr = match self {
            Severity::Clean => "clean",
            Severity::Recoverable => "recoverable issues",
            Severity::Critical => "critical, system may not boot",
        };
        write!(f, "{}", descr)
    }
}

/// What a single stage reports back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Ok,
    Warn(String),
    Critical(String),
}

impl StageOutcome {
    pub fn severity(&self) -> Severity {
        match self {
            StageOutcome::Ok => Severity::Clean,
            StageOutcome::Warn(_) => Severity::Recoverable,
            StageOutcome::Critical(_) => Severity::Critical,
        }
    }

    pub fn warn(message: &str) -> StageOutcome {
        StageOutcome::Warn(String::from(message))
    }

    pub fn critical(message: &str) -> StageOutcome {
        StageOutcome::Critical(String::from(message))
    }

    /// Keeps the worse of two outcomes, the first one wins on a tie.
    pub fn worst(self, other: StageOutcome) -> StageOutcome {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug)]
pub struct StageRecord {
    pub stage: &'static str,
    pub outcome: StageOutcome,
}

/// Collects stage outcomes, the aggregate severity only ever goes up.
#[derive(Debug)]
pub struct RunReport {
    severity: Severity,
    stages: Vec<StageRecord>,
    notes: Vec<String>,
}

impl RunReport {
    pub fn new() -> RunReport {
        RunReport {
            severity: Severity::Clean,
            stages: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: &'static str, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Ok => info!("{}: ok", stage),
            StageOutcome::Warn(ref msg) => warn!("{}: {}", stage, msg),
            StageOutcome::Critical(ref msg) => error!("{}: {}", stage, msg),
        }
        self.raise(outcome.severity());
        self.stages.push(StageRecord { stage, outcome });
    }

    pub fn raise(&mut self, severity: Severity) {
        if severity > self.severity {
            self.severity = severity;
        }
    }

    pub fn add_note(&mut self, note: &str) {
        self.notes.push(String::from(note));
    }

    pub fn get_severity(&self) -> Severity {
        self.severity
    }

    pub fn get_stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn get_notes(&self) -> &[String] {
        &self.notes
    }

    pub fn outcome_of(&self, stage: &str) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .rev()
            .find(|rec| rec.stage == stage)
            .map(|rec| &rec.outcome)
    }

    pub fn log_summary(&self) {
        info!("*** run summary ***");
        for rec in &self.stages {
            match rec.outcome {
                StageOutcome::Ok => info!("  {:<24} ok", rec.stage),
                StageOutcome::Warn(ref msg) => warn!("  {:<24} warning: {}", rec.stage, msg),
                StageOutcome::Critical(ref msg) => error!("  {:<24} critical: {}", rec.stage, msg),
            }
        }
        for note in &self.notes {
            info!("  note: {}", note);
        }

        match self.severity {
            Severity::Clean => info!("finished: {}", self.severity),
            Severity::Recoverable => warn!("finished: {}", self.severity),
            Severity::Critical => error!("finished: {}", self.severity),
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        RunReport::new()
    }
}
