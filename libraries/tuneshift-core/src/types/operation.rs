//! Operation requests and the transform stage they map to
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A transform stage request: registry name plus its textual arguments
///
/// This is the data that distinguishes one operation from another; the
/// source and sink stages are the same for every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSpec {
    /// Stage kind name in the registry (e.g. "tempo")
    pub kind: String,
    /// Arguments validated by the stage at configure time
    pub args: Vec<String>,
}

impl TransformSpec {
    /// Create a transform request
    pub fn new(kind: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }
}

/// One of the four operations the bridge exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    /// Transcode with unchanged signal characteristics
    Convert,
    /// Change tempo without changing pitch; factor as text (e.g. "1.25")
    Tempo { factor: String },
    /// Shift pitch without changing tempo; shift in cents as text (e.g. "200")
    Pitch { cents: String },
    /// Time-reverse the whole stream
    Reverse,
}

impl Operation {
    /// Tempo operation with the given factor string
    pub fn tempo(factor: impl Into<String>) -> Self {
        Self::Tempo {
            factor: factor.into(),
        }
    }

    /// Pitch operation with the given shift (cents) string
    pub fn pitch(cents: impl Into<String>) -> Self {
        Self::Pitch {
            cents: cents.into(),
        }
    }

    /// Operation name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::Tempo { .. } => "tempo",
            Self::Pitch { .. } => "pitch",
            Self::Reverse => "reverse",
        }
    }

    /// The transform stage this operation inserts between source and sink
    pub fn transform(&self) -> Option<TransformSpec> {
        match self {
            Self::Convert => None,
            Self::Tempo { factor } => Some(TransformSpec::new("tempo", vec![factor.clone()])),
            Self::Pitch { cents } => Some(TransformSpec::new("pitch", vec![cents.clone()])),
            Self::Reverse => Some(TransformSpec::new("reverse", Vec::new())),
        }
    }

    /// Human-readable description for edit histories
    pub fn description(&self) -> String {
        match self {
            Self::Convert => "convert".to_string(),
            Self::Tempo { factor } => format!("tempo: {factor}"),
            Self::Pitch { cents } => format!("pitch: {cents}"),
            Self::Reverse => "reverse".to_string(),
        }
    }

    /// Fragment appended to derived output file names
    pub fn file_name_modifier(&self) -> String {
        match self {
            Self::Convert => String::new(),
            Self::Tempo { factor } => format!("tempo_{factor}"),
            Self::Pitch { cents } => format!("pitch_{cents}"),
            Self::Reverse => "reverse".to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convert | Self::Reverse => f.write_str(self.name()),
            Self::Tempo { factor } => write!(f, "tempo:{factor}"),
            Self::Pitch { cents } => write!(f, "pitch:{cents}"),
        }
    }
}

/// Error parsing an `Operation` from `name[:argument]`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseOperationError {
    /// Name is not one of the four operations
    #[error("unknown operation '{0}' (expected convert, tempo:<factor>, pitch:<cents> or reverse)")]
    Unknown(String),
    /// Tempo/pitch without an argument
    #[error("operation '{0}' requires an argument, e.g. '{0}:1.5'")]
    MissingArgument(String),
    /// Convert/reverse with an argument
    #[error("operation '{0}' takes no argument")]
    UnexpectedArgument(String),
}

impl FromStr for Operation {
    type Err = ParseOperationError;

    /// Parse `convert`, `reverse`, `tempo:<factor>` or `pitch:<cents>`
    ///
    /// Only the shape is checked here; the argument itself is validated by
    /// the stage when the operation runs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s.trim(), None),
        };
        let name = name.to_ascii_lowercase();

        match (name.as_str(), arg) {
            ("convert", None) => Ok(Self::Convert),
            ("reverse", None) => Ok(Self::Reverse),
            ("tempo", Some(arg)) if !arg.is_empty() => Ok(Self::tempo(arg)),
            ("pitch", Some(arg)) if !arg.is_empty() => Ok(Self::pitch(arg)),
            ("convert" | "reverse", Some(_)) => Err(ParseOperationError::UnexpectedArgument(name)),
            ("tempo" | "pitch", _) => Err(ParseOperationError::MissingArgument(name)),
            _ => Err(ParseOperationError::Unknown(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_per_operation() {
        assert_eq!(Operation::Convert.transform(), None);
        assert_eq!(
            Operation::tempo("1.25").transform(),
            Some(TransformSpec::new("tempo", vec!["1.25".to_string()]))
        );
        assert_eq!(
            Operation::pitch("-300").transform(),
            Some(TransformSpec::new("pitch", vec!["-300".to_string()]))
        );
        assert_eq!(
            Operation::Reverse.transform(),
            Some(TransformSpec::new("reverse", Vec::new()))
        );
    }

    #[test]
    fn descriptions_and_modifiers() {
        let op = Operation::tempo("0.8");
        assert_eq!(op.description(), "tempo: 0.8");
        assert_eq!(op.file_name_modifier(), "tempo_0.8");
        assert_eq!(Operation::Reverse.file_name_modifier(), "reverse");
        assert_eq!(Operation::Convert.file_name_modifier(), "");
    }

    #[test]
    fn parse_round_trips_through_display() {
        for op in [
            Operation::Convert,
            Operation::Reverse,
            Operation::tempo("1.5"),
            Operation::pitch("200"),
        ] {
            assert_eq!(op.to_string().parse::<Operation>(), Ok(op));
        }
    }

    #[test]
    fn parse_is_lenient_about_case_and_spacing() {
        assert_eq!(" Tempo : 2 ".parse::<Operation>(), Ok(Operation::tempo("2")));
        assert_eq!("REVERSE".parse::<Operation>(), Ok(Operation::Reverse));
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert_eq!(
            "tempo".parse::<Operation>(),
            Err(ParseOperationError::MissingArgument("tempo".to_string()))
        );
        assert_eq!(
            "pitch:".parse::<Operation>(),
            Err(ParseOperationError::MissingArgument("pitch".to_string()))
        );
        assert_eq!(
            "reverse:1".parse::<Operation>(),
            Err(ParseOperationError::UnexpectedArgument("reverse".to_string()))
        );
        assert!(matches!(
            "echo:0.5".parse::<Operation>(),
            Err(ParseOperationError::Unknown(_))
        ));
    }

    #[test]
    fn parse_does_not_validate_numbers() {
        // Argument validation belongs to the stage, not the parser
        assert_eq!("tempo:abc".parse::<Operation>(), Ok(Operation::tempo("abc")));
    }
}
