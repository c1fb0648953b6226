use thiserror::Error;

/// A record field that was missing or unusable during ingestion.
///
/// Never fatal: the ingester substitutes a neutral value (0 pieces, no line)
/// and reports the problem alongside the normalised records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecordError {
    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("record {id}: missing numeric field '{field}', treated as 0")]
    MissingField { id: String, field: &'static str },

    #[error("record {id}: field '{field}' has unusable value {value}")]
    InvalidField {
        id: String,
        field: &'static str,
        value: String,
    },
}
