//! Haas protocol processor.
//!
//! One poll cycle walks the fixed [`CYCLE`] table: each [`Query`] names
//! the command to send and a pure function turning the reply (or its
//! absence) into observations. Nothing in a cycle can fail; a missing or
//! malformed reply only removes the observations that depended on it.

use crate::config::DataItemKeys;
use crate::grammar::{self, Fields, Grammar};
use crate::sink::ObservationSink;
use crate::transport::Transport;
use cncsight_common::{
    Availability, ControllerMode, EmergencyStop, Execution, Observation, SampleValue,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Zero-return condition message.
pub const ZERO_RETURN_MESSAGE: &str = "NO ZERO X";

/// Alarm condition message.
pub const ALARM_MESSAGE: &str = "Alarm on indicator";

/// Default bound on a single reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Macro variables read with `?Q600`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroVariable {
    XActual,
    YActual,
    ZActual,
    SpindleSpeed,
}

impl MacroVariable {
    /// Controller variable number.
    pub fn number(&self) -> u16 {
        match self {
            MacroVariable::XActual => 5041,
            MacroVariable::YActual => 5042,
            MacroVariable::ZActual => 5043,
            MacroVariable::SpindleSpeed => 3027,
        }
    }

    fn key<'k>(&self, keys: &'k DataItemKeys) -> &'k str {
        match self {
            MacroVariable::XActual => &keys.x_act,
            MacroVariable::YActual => &keys.y_act,
            MacroVariable::ZActual => &keys.z_act,
            MacroVariable::SpindleSpeed => &keys.speed,
        }
    }
}

/// One command of the poll cycle and how its reply is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// `?Q100`: machine serial number, used as a liveness check.
    Availability,
    /// `?Q104`: controller mode and zero-return state.
    Mode,
    /// `?Q500`: program, execution, alarm and part count.
    ProgramStatus,
    /// `?Q600 <n>`: one macro variable.
    Variable(MacroVariable),
}

/// The poll cycle, in send order.
pub const CYCLE: [Query; 7] = [
    Query::Availability,
    Query::Mode,
    Query::ProgramStatus,
    Query::Variable(MacroVariable::XActual),
    Query::Variable(MacroVariable::YActual),
    Query::Variable(MacroVariable::ZActual),
    Query::Variable(MacroVariable::SpindleSpeed),
];

impl Query {
    /// Command string sent to the controller (without line terminator).
    pub fn command(&self) -> String {
        match self {
            Query::Availability => "?Q100".to_string(),
            Query::Mode => "?Q104".to_string(),
            Query::ProgramStatus => "?Q500".to_string(),
            Query::Variable(var) => format!("?Q600 {}", var.number()),
        }
    }

    /// Short name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Query::Availability => "Q100",
            Query::Mode => "Q104",
            Query::ProgramStatus => "Q500",
            Query::Variable(_) => "Q600",
        }
    }

    /// Derive the observations for a reply. `None` means no reply.
    pub fn interpret(&self, response: Option<&str>, keys: &DataItemKeys) -> Vec<Observation> {
        match self {
            Query::Availability => interpret_availability(response, keys),
            Query::Mode => interpret_mode(response, keys),
            Query::ProgramStatus => interpret_program_status(response, keys),
            Query::Variable(var) => interpret_variable(*var, response, keys),
        }
    }
}

fn interpret_availability(response: Option<&str>, keys: &DataItemKeys) -> Vec<Observation> {
    let avail = match match_reply(&grammar::SERIAL_NUMBER, response) {
        Some(_) => Availability::Available,
        None => Availability::Unavailable,
    };
    vec![Observation::event(&keys.avail, avail)]
}

fn interpret_mode(response: Option<&str>, keys: &DataItemKeys) -> Vec<Observation> {
    let token = match_reply(&grammar::MODE, response).and_then(|fields| fields.get("mode"));

    let mut observations = Vec::with_capacity(2);

    if let Some(token) = token {
        observations.push(Observation::event(&keys.mode, controller_mode(token)));
    }

    // No reply or no match clears the condition as well.
    if token == Some("(ZERO RET)") {
        observations.push(Observation::fault(&keys.zero_ret, ZERO_RETURN_MESSAGE));
    } else {
        observations.push(Observation::normal(&keys.zero_ret));
    }

    observations
}

fn interpret_program_status(response: Option<&str>, keys: &DataItemKeys) -> Vec<Observation> {
    let program = response.and_then(|r| grammar::PROGRAM.matches(r));
    let status = response.and_then(|r| grammar::STATUS.matches(r));

    if let (Some(text), None, None) = (response, &program, &status) {
        debug!(
            grammars = ?[grammar::PROGRAM.name(), grammar::STATUS.name()],
            response = %text,
            "Reply matches no grammar"
        );
    }

    let mut observations = Vec::with_capacity(6);
    let state = program.as_ref().and_then(|fields| fields.get("state"));

    if let Some(execution) = state.and_then(execution_from_state) {
        observations.push(Observation::event(&keys.execution, execution));
    }

    if status.as_ref().and_then(|fields| fields.get("word")) == Some("BUSY") {
        observations.push(Observation::event(&keys.execution, Execution::Active));
    }

    if state == Some("ALARM ON") {
        observations.push(Observation::event(&keys.estop, EmergencyStop::Triggered));
        observations.push(Observation::fault(&keys.system, ALARM_MESSAGE));
    } else {
        observations.push(Observation::event(&keys.estop, EmergencyStop::Armed));
        observations.push(Observation::normal(&keys.system));
    }

    if let Some(fields) = &program {
        if let Some(name) = fields.get("name") {
            observations.push(Observation::event(&keys.program, program_name(name)));
        }
        if let Some(parts) = fields.get("parts") {
            observations.push(Observation::event(&keys.part_count, parts));
        }
    }

    observations
}

fn interpret_variable(
    var: MacroVariable,
    response: Option<&str>,
    keys: &DataItemKeys,
) -> Vec<Observation> {
    let value = match_reply(&grammar::MACRO, response).and_then(|fields| fields.get("value"));

    match value.and_then(SampleValue::parse) {
        Some(sample) => vec![Observation::sample(var.key(keys), sample)],
        None => {
            if let Some(raw) = value {
                debug!(variable = var.number(), value = %raw, "Non-numeric macro value");
            }
            Vec::new()
        }
    }
}

/// Match a reply against one grammar, logging a mismatch.
fn match_reply<'t>(grammar: &Grammar, response: Option<&'t str>) -> Option<Fields<'t>> {
    let text = response?;
    let fields = grammar.matches(text);
    if fields.is_none() {
        debug!(grammar = grammar.name(), response = %text, "Reply does not match grammar");
    }
    fields
}

/// Map a `?Q104` mode token to the controller mode.
pub fn controller_mode(token: &str) -> ControllerMode {
    match token {
        "(MDI)" => ControllerMode::ManualDataInput,
        "(JOG)" | "(ZERO RET)" => ControllerMode::Manual,
        _ => ControllerMode::Automatic,
    }
}

/// Map a `?Q500` program state to an execution state, if it has one.
pub fn execution_from_state(state: &str) -> Option<Execution> {
    match state {
        "IDLE" => Some(Execution::Ready),
        "FEED HOLD" => Some(Execution::Interrupted),
        "ALARM ON" => Some(Execution::Stopped),
        _ => None,
    }
}

/// Map a `?Q500` program name to the published name. MDI has no program.
pub fn program_name(name: &str) -> &str {
    if name == "MDI" { "" } else { name }
}

/// Outcome of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Commands that got a non-empty reply.
    pub responses: usize,
    /// Observations handed to the sink.
    pub emitted: usize,
}

/// Polls one controller and emits its observations.
pub struct HaasProcessor<T, S> {
    device_key: String,
    transport: T,
    sink: S,
    keys: DataItemKeys,
    response_timeout: Duration,
}

impl<T: Transport, S: ObservationSink> HaasProcessor<T, S> {
    /// Create a processor owning `transport` and emitting to `sink`.
    pub fn new(device_key: impl Into<String>, transport: T, sink: S) -> Self {
        Self {
            device_key: device_key.into(),
            transport,
            sink,
            keys: DataItemKeys::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Override the data item key names.
    #[must_use]
    pub fn with_keys(mut self, keys: DataItemKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Override the per-reply timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the transport. A failure is logged only; the first command of
    /// the next cycle retries.
    pub async fn open(&mut self) {
        if let Err(e) = self.transport.connect().await {
            warn!(
                device = %self.device_key,
                endpoint = %self.transport.endpoint(),
                error = %e,
                "Initial connect failed, will retry on next poll"
            );
        }
    }

    /// Close the transport.
    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    /// Run one full poll cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for query in CYCLE {
            let response = self.request(query).await;
            if response.is_some() {
                report.responses += 1;
            }

            for observation in query.interpret(response.as_deref(), &self.keys) {
                self.sink.emit(&self.device_key, observation);
                report.emitted += 1;
            }
        }

        debug!(
            device = %self.device_key,
            responses = report.responses,
            emitted = report.emitted,
            "Poll cycle complete"
        );

        report
    }

    /// Send one query, folding transport errors into "no reply".
    async fn request(&mut self, query: Query) -> Option<String> {
        let command = query.command();

        match self
            .transport
            .send_command(&command, self.response_timeout)
            .await
        {
            Ok(Some(response)) => {
                debug!(device = %self.device_key, command = %command, "{} : {}", query.label(), response);
                Some(response)
            }
            Ok(None) => {
                debug!(device = %self.device_key, command = %command, "No response");
                None
            }
            Err(e) => {
                warn!(
                    device = %self.device_key,
                    command = %command,
                    endpoint = %self.transport.endpoint(),
                    error = %e,
                    "Command failed"
                );
                None
            }
        }
    }
}
