use serde::{Deserialize, Serialize};

/// A single machine-state observation produced by an adapter.
///
/// Observations are handed to a sink as soon as they are derived; the
/// adapter never keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Data item key (e.g., "execution", "x_act", "system").
    pub key: String,

    /// The observed value.
    #[serde(flatten)]
    pub value: ObservationValue,
}

impl Observation {
    /// Create an event observation.
    pub fn event(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ObservationValue::Event(value.into()),
        }
    }

    /// Create a sample observation.
    pub fn sample(key: impl Into<String>, value: SampleValue) -> Self {
        Self {
            key: key.into(),
            value: ObservationValue::Sample(value),
        }
    }

    /// Create a condition observation with the given level and message.
    pub fn condition(
        key: impl Into<String>,
        level: ConditionLevel,
        message: Option<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: ObservationValue::Condition(ConditionState { level, message }),
        }
    }

    /// Create a NORMAL condition observation.
    pub fn normal(key: impl Into<String>) -> Self {
        Self::condition(key, ConditionLevel::Normal, None)
    }

    /// Create a FAULT condition observation.
    pub fn fault(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::condition(key, ConditionLevel::Fault, Some(message.into()))
    }

    /// Get the observation kind.
    pub fn kind(&self) -> ObservationKind {
        match self.value {
            ObservationValue::Event(_) => ObservationKind::Event,
            ObservationValue::Sample(_) => ObservationKind::Sample,
            ObservationValue::Condition(_) => ObservationKind::Condition,
        }
    }
}

/// Typed observation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ObservationValue {
    /// Discrete state change (controlled vocabulary or free text).
    Event(String),

    /// Numeric measurement.
    Sample(SampleValue),

    /// Fault channel state.
    Condition(ConditionState),
}

/// Observation kind, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Event,
    Sample,
    Condition,
}

/// A numeric sample kept as the decimal text reported by the controller.
///
/// The text is never reformatted, so no precision is lost between the
/// controller and the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleValue(String);

impl SampleValue {
    /// Wrap a decimal string, returning `None` if it is not a finite number.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(Self(text.to_string())),
            _ => None,
        }
    }

    /// The verbatim decimal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Condition severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionLevel {
    Normal,
    Warning,
    Fault,
}

impl ConditionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionLevel::Normal => "NORMAL",
            ConditionLevel::Warning => "WARNING",
            ConditionLevel::Fault => "FAULT",
        }
    }
}

/// State of a condition channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionState {
    pub level: ConditionLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Declares a controlled-vocabulary event enum with its wire names.
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Get the wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.as_str().to_string()
            }
        }
    };
}

vocabulary!(
    /// Whether the controller answers at all.
    Availability {
        Available => "AVAILABLE",
        Unavailable => "UNAVAILABLE",
    }
);

vocabulary!(
    /// Program execution state.
    Execution {
        Ready => "READY",
        Active => "ACTIVE",
        Interrupted => "INTERRUPTED",
        Stopped => "STOPPED",
    }
);

vocabulary!(
    /// Controller operating mode.
    ControllerMode {
        Automatic => "AUTOMATIC",
        Manual => "MANUAL",
        ManualDataInput => "MANUAL_DATA_INPUT",
    }
);

vocabulary!(
    /// Emergency stop state.
    EmergencyStop {
        Armed => "ARMED",
        Triggered => "TRIGGERED",
    }
);

/// Adapter identifier for observation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adapter {
    Haas,
}

impl Adapter {
    /// Get the string representation used in key expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Adapter::Haas => "haas",
        }
    }
}

impl std::fmt::Display for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An observation stamped with its origin, as published to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Unix epoch milliseconds when the observation was emitted.
    pub timestamp: i64,

    /// Device key from configuration.
    pub device: String,

    /// Adapter that produced the observation.
    pub adapter: Adapter,

    #[serde(flatten)]
    pub observation: Observation,
}

impl ObservationRecord {
    pub fn new(
        timestamp: i64,
        device: impl Into<String>,
        adapter: Adapter,
        observation: Observation,
    ) -> Self {
        Self {
            timestamp,
            device: device.into(),
            adapter,
            observation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_vocabulary() {
        let obs = Observation::event("execution", Execution::Interrupted);
        assert_eq!(obs.kind(), ObservationKind::Event);
        assert_eq!(
            obs.value,
            ObservationValue::Event("INTERRUPTED".to_string())
        );
    }

    #[test]
    fn test_sample_value_keeps_text() {
        let v = SampleValue::parse("12.3450").unwrap();
        assert_eq!(v.as_str(), "12.3450");
        assert_eq!(v.to_string(), "12.3450");
    }

    #[test]
    fn test_sample_value_rejects_garbage() {
        assert!(SampleValue::parse("").is_none());
        assert!(SampleValue::parse("N/A").is_none());
        assert!(SampleValue::parse("inf").is_none());
        assert_eq!(SampleValue::parse(" -0.5 ").unwrap().as_str(), "-0.5");
    }

    #[test]
    fn test_condition_constructors() {
        let fault = Observation::fault("zero_ret", "NO ZERO X");
        assert_eq!(
            fault.value,
            ObservationValue::Condition(ConditionState {
                level: ConditionLevel::Fault,
                message: Some("NO ZERO X".to_string()),
            })
        );

        let normal = Observation::normal("system");
        assert_eq!(normal.kind(), ObservationKind::Condition);
        assert_eq!(ConditionLevel::Normal.as_str(), "NORMAL");
    }

    #[test]
    fn test_vocabulary_strings() {
        assert_eq!(Availability::Unavailable.as_str(), "UNAVAILABLE");
        assert_eq!(ControllerMode::ManualDataInput.as_str(), "MANUAL_DATA_INPUT");
        assert_eq!(EmergencyStop::Triggered.to_string(), "TRIGGERED");
        assert_eq!(Adapter::Haas.as_str(), "haas");
    }

    #[test]
    fn test_condition_json_shape() {
        let obs = Observation::fault("system", "Alarm on indicator");
        let json = serde_json::to_value(&obs).unwrap();
        assert_eq!(json["key"], "system");
        assert_eq!(json["kind"], "condition");
        assert_eq!(json["value"]["level"], "FAULT");
        assert_eq!(json["value"]["message"], "Alarm on indicator");
    }
}
