use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const HELLO_RESPONSE: &str = "yep, still alive";
pub const QUIT_RESPONSE: &str = "quit command requested... exiting";
pub const FAILURE_PREFIX: &str = "FAILURE: ";

/// Why a request line could not be turned into a [`ControlCommand`].
///
/// The `Display` text is what the client sees after `FAILURE: `.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{0} requires an integer argument")]
    MissingArgument(&'static str),

    #[error("invalid argument {0:?}, expected an integer")]
    InvalidArgument(String),

    #[error("unexpected arguments for {0}")]
    UnexpectedArguments(&'static str),

    #[error("request too long")]
    TooLong,

    #[error("request is not valid UTF-8")]
    NotUtf8,
}

/// A request sent over the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Heartbeat.
    Hello,
    /// Ask the service to stop accepting and drain.
    Quit,
    /// Spawn a worker with the given argument.
    Fork { argument: i64 },
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Hello => "hello",
            ControlCommand::Quit => "quit",
            ControlCommand::Fork { .. } => "fork",
        }
    }

    /// Wire form, newline terminated.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Fork { argument } => write!(f, "fork {}", argument),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ProtocolError;

    /// Parses one request line.
    ///
    /// The command name runs up to the first whitespace and is matched exactly.
    /// Only a trailing `\n` or `\r\n` is stripped.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "hello" if rest.is_empty() => Ok(ControlCommand::Hello),
            "hello" => Err(ProtocolError::UnexpectedArguments("hello")),
            "quit" if rest.is_empty() => Ok(ControlCommand::Quit),
            "quit" => Err(ProtocolError::UnexpectedArguments("quit")),
            "fork" => parse_fork_argument(rest).map(|argument| ControlCommand::Fork { argument }),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

fn parse_fork_argument(rest: &str) -> Result<i64, ProtocolError> {
    let mut tokens = rest.split_whitespace();
    let token = tokens.next().ok_or(ProtocolError::MissingArgument("fork"))?;
    if tokens.next().is_some() {
        return Err(ProtocolError::UnexpectedArguments("fork"));
    }
    token
        .parse()
        .map_err(|_| ProtocolError::InvalidArgument(token.to_string()))
}

/// A response line written back over the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// Answer to `hello`.
    Alive,
    /// Answer to `quit`.
    Quitting,
    /// Answer to a successful `fork`: the worker directory.
    Forked(PathBuf),
    /// Anything that went wrong, with a reason.
    Failure(String),
}

impl ControlResponse {
    pub fn failure(reason: impl fmt::Display) -> Self {
        ControlResponse::Failure(reason.to_string())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ControlResponse::Failure(_))
    }

    /// Wire form, newline terminated.
    pub fn to_line(&self) -> String {
        match self {
            ControlResponse::Alive => format!("{}\n", HELLO_RESPONSE),
            ControlResponse::Quitting => format!("{}\n", QUIT_RESPONSE),
            ControlResponse::Forked(path) => format!("{}\n", path.display()),
            ControlResponse::Failure(reason) => format!("{}{}\n", FAILURE_PREFIX, reason),
        }
    }

    /// Parses a response line. Any line that is neither a fixed answer nor a
    /// failure is taken to be a worker directory.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\n').unwrap_or(line);
        match line {
            HELLO_RESPONSE => ControlResponse::Alive,
            QUIT_RESPONSE => ControlResponse::Quitting,
            _ => match line.strip_prefix(FAILURE_PREFIX) {
                Some(reason) => ControlResponse::Failure(reason.to_string()),
                None if line.starts_with("FAILURE") => {
                    ControlResponse::Failure(line["FAILURE".len()..].trim().to_string())
                }
                None => ControlResponse::Forked(PathBuf::from(line)),
            },
        }
    }
}
