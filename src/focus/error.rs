use thiserror::Error;

/// Programmer errors raised by the focus subsystem.
///
/// Layout races and unregistered containers are not errors: the former are
/// retried, the latter report `false` from the operation that probed them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FocusError {
    #[error("Unknown focusMode - \"{0}\"")]
    InvalidMode(String),

    #[error("All shortcuts need at least \"key\" specified.")]
    MissingShortcutKey,

    #[error("The key can't have a '-' in it (got \"{0}\")")]
    ReservedShortcutCharacter(String),

    #[error("Must specify units for position (got \"{0}\")")]
    MissingPositionUnits(String),

    #[error("Container {0} is not registered as a focus loop")]
    NotRegistered(String),

    #[error("Cannot invoke in the same window that was called from")]
    SelfInvoke,

    #[error("Malformed focusLoop message: {0}")]
    MalformedMessage(String),

    #[error("Invalid key path \"{0}\"")]
    InvalidKeyPath(String),

    #[error("Invalid selector \"{0}\"")]
    InvalidSelector(String),
}
