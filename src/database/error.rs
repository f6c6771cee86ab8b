use std::fmt::{self, Display};

use potion::Error;
use warp::reject::Rejection;

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &str {
        &self.info
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// SQLSTATE of a value too long for its column.
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

/// Every way an action on the recipe store can fail.
///
/// All variants are recoverable by the caller; none of them are retried by
/// the SDK itself.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{field}: {info}")]
    Validation { field: &'static str, info: String },
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} is not present")]
    NotPresent(String),
    #[error("You can't subscribe to yourself")]
    SelfSubscription,
    #[error("You don't have permission to perform this action")]
    Forbidden,
    #[error("Authentication credentials were not provided")]
    Unauthenticated,
    #[error("No {0} exists with specified id")]
    NotFound(String),
    #[error("{0}")]
    Query(QueryError),
}

impl ActionError {
    pub fn validation(field: &'static str, info: &str) -> Self {
        Self::Validation {
            field,
            info: info.to_string(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::AlreadyExists(_)
            | Self::NotPresent(_)
            | Self::SelfSubscription => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::Query(_) => 500,
        }
    }

    /// Maps a database failure onto the taxonomy, using `what` to name the
    /// relation when a constraint was hit.
    pub fn from_sqlx(value: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db) = &value {
            if db.is_unique_violation() {
                log::debug!("Unique violation on {what}: {db}");
                return Self::AlreadyExists(what.to_string());
            }
            if db.is_check_violation() && db.constraint() == Some("prevent_self_subscription") {
                return Self::SelfSubscription;
            }
            if db.is_check_violation() {
                return Self::Validation {
                    field: "non_field_errors",
                    info: format!("{db}"),
                };
            }
            if db.is_foreign_key_violation() {
                return Self::Validation {
                    field: "non_field_errors",
                    info: format!("Referenced {what} does not exist"),
                };
            }
            if db.code().as_deref() == Some(STRING_DATA_RIGHT_TRUNCATION) {
                return Self::Validation {
                    field: "non_field_errors",
                    info: format!("A {what} field is too long"),
                };
            }
        }

        let error = QueryError::from(value);
        log::error!("Query on {what} failed: {error}");
        Self::Query(error)
    }
}

impl From<sqlx::Error> for ActionError {
    fn from(value: sqlx::Error) -> Self {
        Self::from_sqlx(value, "row")
    }
}

impl From<QueryError> for ActionError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<ActionError> for Error {
    fn from(value: ActionError) -> Self {
        Error {
            code: value.code().into(),
            info: Some(value.to_string()),
            redirect: None,
        }
    }
}

impl From<ActionError> for Rejection {
    fn from(value: ActionError) -> Self {
        Error::from(value).into()
    }
}
