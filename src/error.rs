use std::fmt;

/// The single message every rejected specification reports.
///
/// Malformed documents and unsupported versions are deliberately not told apart.
pub const INVALID_SPECIFICATION: &str =
    "'specification' parameter must contain a valid version 2.0 or 3.0.x or 3.1.x specification";

/// Setup-time failures.
///
/// Any of these aborts registration before a single route reaches the host.
#[derive(Debug)]
pub enum GlueError {
    /// The document failed parsing, the envelope check, reference resolution,
    /// or declares an unsupported version.
    SpecificationInvalid,
    /// Neither or both of service handlers / operation resolver were supplied.
    HandlerConfiguration(String),
    /// A route schema was rejected by the validator engine.
    SchemaCompile {
        /// Operation the schema belongs to
        operation_id: String,
        /// Input location (`params`, `body`, `response:200`, ...)
        location: String,
        /// Engine error text
        message: String,
    },
    /// The host refused a route.
    Registration(String),
    /// Reading or writing files failed.
    Io(std::io::Error),
    /// A scaffolder template failed to render.
    Render(String),
}

impl fmt::Display for GlueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlueError::SpecificationInvalid => f.write_str(INVALID_SPECIFICATION),
            GlueError::HandlerConfiguration(msg) => f.write_str(msg),
            GlueError::SchemaCompile {
                operation_id,
                location,
                message,
            } => write!(
                f,
                "failed to compile {location} schema of operation '{operation_id}': {message}"
            ),
            GlueError::Registration(msg) => write!(f, "route registration failed: {msg}"),
            GlueError::Io(err) => write!(f, "{err}"),
            GlueError::Render(msg) => write!(f, "template rendering failed: {msg}"),
        }
    }
}

impl std::error::Error for GlueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GlueError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GlueError {
    fn from(err: std::io::Error) -> Self {
        GlueError::Io(err)
    }
}

impl From<askama::Error> for GlueError {
    fn from(err: askama::Error) -> Self {
        GlueError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_specification_message_is_literal() {
        assert_eq!(
            GlueError::SpecificationInvalid.to_string(),
            "'specification' parameter must contain a valid version 2.0 or 3.0.x or 3.1.x specification"
        );
    }

    #[test]
    fn handler_configuration_displays_message() {
        let err = GlueError::HandlerConfiguration(
            "'serviceHandlers' and 'operationResolver' are mutually exclusive".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "'serviceHandlers' and 'operationResolver' are mutually exclusive"
        );
    }
}
