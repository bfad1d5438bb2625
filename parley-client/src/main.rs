//! parley client - interactive chat over a parley server
//!
//! Reads slash commands from stdin, prints the reply to each, and prints
//! direct messages as they arrive. Shared files are saved to the download
//! directory.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use parley_client::cli::Args;
use parley_client::commands::{is_command, parse_command, Command, HELP};
use parley_client::config::load_config;
use parley_client::{parse_transport_kind, Client, PushHandler};
use parley_protocol::PushNotification;
use parley_utils::{download_dir, ensure_dir, init_logging, LogConfig, ParleyError, Result};

fn main() -> Result<()> {
    let args = Args::parse_args();

    // Log to a file; stdout is the chat
    let log_config = if args.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::client()
    };
    init_logging(&log_config)?;
    tracing::info!("parley client starting");
    tracing::debug!("CLI args: {:?}", args);

    match run(args) {
        Ok(()) => {
            tracing::info!("parley client exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("parley client error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.apply(load_config());
    let address = args.address(&config);
    let kind = parse_transport_kind(&config.transport)?;

    let client = Client::builder()
        .transport(kind)
        .timeout(config.timeout())
        .connect(address.as_str(), Printer::new(download_dir()))?;
    println!("connected to {} over {}", address, kind);

    if let Some(user) = &config.username {
        println!("{}", client.login(user)?);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if client.is_closed() {
            println!("connection closed by server");
            break;
        }
        if !is_command(&line) {
            println!("commands start with /, try /help");
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        match execute(&client, command) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(ParleyError::ConnectionClosed) => {
                println!("connection closed by server");
                break;
            }
            Err(e) if e.is_retryable() => println!("{}, try again", e),
            Err(e) => println!("error: {}", e),
        }
        io::stdout().flush()?;
    }

    client.close();
    Ok(())
}

/// Run one command and return what to print
fn execute(client: &Client, command: Command) -> Result<Option<String>> {
    let output = match command {
        Command::Login(user) => client.login(&user)?,
        Command::Who => {
            let users = client.who()?;
            if users.is_empty() {
                "nobody is logged in".to_string()
            } else {
                users.join("\n")
            }
        }
        Command::Send { recipient, message } => client.send(&recipient, message)?,
        Command::Broadcast(message) => client.broadcast(message)?,
        Command::Share { recipient, path } => {
            let file = std::fs::File::open(&path).map_err(|source| ParleyError::FileRead {
                path: path.clone(),
                source,
            })?;
            client.share_reader(&recipient, file)?
        }
        Command::Logout => {
            client.logout()?;
            "logged out".to_string()
        }
        Command::Help => HELP.to_string(),
        Command::Unknown(name) => format!("unknown command /{}, try /help", name),
        Command::Quit => return Ok(None),
    };
    Ok(Some(output))
}

/// Prints pushed messages and saves shared files
struct Printer {
    downloads: PathBuf,
}

impl Printer {
    fn new(downloads: PathBuf) -> Self {
        Self { downloads }
    }

    fn save(&self, sender: &str, data: &[u8]) -> Result<PathBuf> {
        ensure_dir(&self.downloads)?;
        let path = free_path(&self.downloads, sender);
        std::fs::write(&path, data).map_err(|source| ParleyError::FileWrite {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl PushHandler for Printer {
    fn handle(&mut self, push: PushNotification) {
        match &push {
            PushNotification::DirectMessage { sender, body } => {
                println!("[{}] {}", sender, String::from_utf8_lossy(body));
            }
            PushNotification::FileShare { sender, payload } => match self.save(sender, payload) {
                Ok(path) => println!(
                    "[{}] shared {} bytes, saved to {}",
                    sender,
                    payload.len(),
                    path.display()
                ),
                Err(e) => {
                    tracing::error!("failed to save file from {}: {}", sender, e);
                    println!("[{}] shared {} bytes, could not save: {}", sender, payload.len(), e);
                }
            },
        }
        let _ = io::stdout().flush();
    }

    fn on_disconnected(&mut self) {
        println!("server closed the connection");
    }
}

/// First `<sender>-<n>` name not already taken in `dir`
fn free_path(dir: &Path, sender: &str) -> PathBuf {
    let sender: String = sender
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    (1u32..)
        .map(|n| dir.join(format!("{}-{}", sender, n)))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(sender))
}
