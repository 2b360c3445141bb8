//! Error types for maildeck.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mail(#[from] MailError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// IMAP transport errors. Read paths swallow these into empty results;
/// mutation paths surface them.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("IMAP configuration missing")]
    NotConfigured,

    #[error("Could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    #[error("IMAP login failed for {username}: {reason}")]
    Auth { username: String, reason: String },

    #[error("IMAP {command} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Message {id} not found")]
    NotFound { id: String },
}

/// Outbound mail errors. The first four are request validation failures
/// (HTTP 400), the rest are transport failures (HTTP 500).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Missing required email parameters: from, to, and subject are required")]
    MissingFields,

    #[error("Invalid sender email address")]
    InvalidSender,

    #[error("Invalid recipient email address: {0}")]
    InvalidRecipient(String),

    #[error("Email must have either text or HTML content")]
    NoContent,

    #[error("SMTP authentication failed. Please check your email credentials.")]
    AuthFailed,

    #[error("Failed to connect to SMTP server. Please check your SMTP host and port.")]
    ConnectFailed,

    #[error("SMTP connection timed out. Please check your network connection.")]
    TimedOut,

    #[error("Failed to send email: {0}")]
    Transport(String),
}

impl SendError {
    /// True for errors caused by the request itself rather than the transport.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SendError::MissingFields
                | SendError::InvalidSender
                | SendError::InvalidRecipient(_)
                | SendError::NoContent
        )
    }
}

/// Authentication and session errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

/// Chat gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("OpenRouter API key is missing")]
    MissingApiKey,

    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Completion provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Completion response contained no choices")]
    EmptyCompletion,
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
