//! Slash command parsing for the interactive client
//!
//! Parses user input like `/send bob "see you at noon"` into a [`Command`]
//! that maps onto one client request.

use std::path::PathBuf;

/// Parsed client command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `/login <userid>`
    Login(String),
    /// `/who`
    Who,
    /// `/send <user> <message>`
    Send { recipient: String, message: String },
    /// `/broadcast <message>`
    Broadcast(String),
    /// `/share <user> <path>`
    Share { recipient: String, path: PathBuf },
    /// `/logout`
    Logout,
    /// `/help`
    Help,
    /// `/quit` or `/exit`
    Quit,
    /// Unknown or invalid command
    Unknown(String),
}

/// Error parsing a command
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Empty command
    Empty,
    /// Missing user id
    MissingUser,
    /// Missing message content
    MissingMessage,
    /// Missing file path
    MissingPath,
    /// Invalid syntax
    InvalidSyntax(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::MissingUser => write!(f, "missing user id"),
            ParseError::MissingMessage => write!(f, "missing message content"),
            ParseError::MissingPath => write!(f, "missing file path"),
            ParseError::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// One line per command, shown by `/help`
pub const HELP: &str = "\
/login <user>             log in as <user>
/who                      list logged in users
/send <user> <message>    message one user
/broadcast <message>      message everyone
/share <user> <path>      send a file to one user
/logout                   log out
/quit                     disconnect and exit";

/// Parse a command string into a Command
///
/// # Examples
///
/// ```
/// use parley_client::commands::{parse_command, Command};
///
/// let cmd = parse_command("/send bob hello there").unwrap();
/// assert_eq!(
///     cmd,
///     Command::Send {
///         recipient: "bob".into(),
///         message: "hello there".into()
///     }
/// );
/// ```
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let Some(body) = input.strip_prefix('/') else {
        return Err(ParseError::InvalidSyntax(
            "command must start with /".to_string(),
        ));
    };

    let (name, args) = split_first_token(body);
    let name = name.to_lowercase();
    let args = args.trim();

    match name.as_str() {
        "login" => parse_user(args).map(Command::Login),
        "who" => Ok(Command::Who),
        "send" | "msg" => {
            let (recipient, rest) = split_user(args)?;
            Ok(Command::Send {
                recipient,
                message: parse_message(rest)?,
            })
        }
        "broadcast" | "all" => Ok(Command::Broadcast(parse_message(args)?)),
        "share" => {
            let (recipient, rest) = split_user(args)?;
            let path = rest.trim();
            if path.is_empty() {
                return Err(ParseError::MissingPath);
            }
            Ok(Command::Share {
                recipient,
                path: PathBuf::from(parse_message(path)?),
            })
        }
        "logout" => Ok(Command::Logout),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Ok(Command::Unknown(name)),
    }
}

/// Exactly one user id token
fn parse_user(args: &str) -> Result<String, ParseError> {
    let (user, rest) = split_first_token(args);
    if user.is_empty() {
        return Err(ParseError::MissingUser);
    }
    if !rest.trim().is_empty() {
        return Err(ParseError::InvalidSyntax(
            "user ids cannot contain spaces".to_string(),
        ));
    }
    Ok(user.to_string())
}

fn split_user(args: &str) -> Result<(String, &str), ParseError> {
    let (user, rest) = split_first_token(args);
    if user.is_empty() {
        return Err(ParseError::MissingUser);
    }
    Ok((user.to_string(), rest))
}

/// Parse a message string (handles quoted and unquoted)
fn parse_message(input: &str) -> Result<String, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::MissingMessage);
    }

    for quote in ['"', '\''] {
        if let Some(stripped) = input.strip_prefix(quote) {
            return match stripped.find(quote) {
                Some(end) => Ok(stripped[..end].to_string()),
                None => Err(ParseError::InvalidSyntax(
                    "unclosed quote in message".to_string(),
                )),
            };
        }
    }
    Ok(input.to_string())
}

/// Split the first whitespace-delimited token from a string
fn split_first_token(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    if let Some(pos) = input.find(char::is_whitespace) {
        (&input[..pos], &input[pos..])
    } else {
        (input, "")
    }
}

/// Check if input looks like a command (starts with /)
pub fn is_command(input: &str) -> bool {
    input.trim().starts_with('/')
}
