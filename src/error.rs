use crate::domain::ids::{AttemptId, BillId, MemberId, ParticipantId};
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BillSplitError>;

/// Where an error sits in the failure taxonomy.
///
/// Validation and conflict errors never mutate state. Infrastructure errors
/// may leave attempt rows behind in a terminal `FAILED` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Infrastructure,
}

#[derive(Error, Debug, Diagnostic)]
pub enum BillSplitError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(billsplit::validation))]
    ValidationError(String),

    #[error("Participant {0} not found")]
    #[diagnostic(code(billsplit::not_found))]
    ParticipantNotFound(ParticipantId),

    #[error("Bill {0} not found")]
    #[diagnostic(code(billsplit::not_found))]
    BillNotFound(BillId),

    #[error("Payment attempt {0} not found")]
    #[diagnostic(code(billsplit::not_found))]
    AttemptNotFound(AttemptId),

    #[error("{payer} is not the payer of share {participant}")]
    #[diagnostic(
        code(billsplit::validation),
        help("only the member a share belongs to may pay it")
    )]
    NotShareOwner {
        payer: MemberId,
        participant: ParticipantId,
    },

    #[error("Bill owner {0} cannot pay their own bill")]
    #[diagnostic(code(billsplit::conflict))]
    OwnerCannotPay(MemberId),

    #[error("A payment is already in progress for {0}")]
    #[diagnostic(
        code(billsplit::conflict),
        help("wait for the current payment to finish or cancel it first")
    )]
    AttemptInFlight(ParticipantId),

    #[error("Group payment spans more than one payee")]
    #[diagnostic(
        code(billsplit::validation),
        help("a group payment must target bills collected by the same owner")
    )]
    MixedPayees,

    #[error("Payment attempt {0} is already final")]
    #[diagnostic(code(billsplit::conflict))]
    AttemptFinal(AttemptId),

    #[error("Payment could not be started: {0}")]
    #[diagnostic(code(billsplit::processor))]
    ProcessorError(#[from] ProcessorError),

    #[error("CSV error: {0}")]
    #[diagnostic(code(billsplit::io))]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(billsplit::io))]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(billsplit::io))]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    #[diagnostic(code(billsplit::storage))]
    RocksDBError(#[from] rocksdb::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(billsplit::internal))]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl BillSplitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::NotShareOwner { .. } | Self::MixedPayees => {
                ErrorKind::Validation
            }
            Self::OwnerCannotPay(_) | Self::AttemptInFlight(_) | Self::AttemptFinal(_) => {
                ErrorKind::Conflict
            }
            Self::ParticipantNotFound(_) | Self::BillNotFound(_) | Self::AttemptNotFound(_) => {
                ErrorKind::NotFound
            }
            _ => ErrorKind::Infrastructure,
        }
    }

    /// Message safe to show to the member who triggered the operation.
    ///
    /// Processor diagnostics stay on the attempt row.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Infrastructure => "Payment could not be started".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Failure reported by the external payment processor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("charge declined ({code}): {message}")]
    Declined { code: String, message: String },
    #[error("charge is already final")]
    AlreadyFinal,
    #[error("processor unavailable: {0}")]
    Unavailable(String),
}

impl ProcessorError {
    pub fn code(&self) -> &str {
        match self {
            Self::Declined { code, .. } => code,
            Self::AlreadyFinal => "already_final",
            Self::Unavailable(_) => "processor_unavailable",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Declined { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
