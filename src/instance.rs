//! Single running instance per user.
//!
//! The first process binds a local socket. Later processes connect to it,
//! forward their command line command as one text line, and exit.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::normalize_sip_address;
use crate::error::InstanceError;

/// Sent when a second instance is started without a command
pub const DEFAULT_COMMAND: &str = "show";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Bring the main window to front
    Show,
    /// Place a call, e.g. `call sip:alice@example.org`
    Call(String),
    Unknown(String),
}

impl AppCommand {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (name, argument) = match text.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (text, ""),
        };

        match name {
            "" | "show" => AppCommand::Show,
            "call" if !argument.is_empty() => {
                let address = argument.strip_prefix("sip-address=").unwrap_or(argument);
                AppCommand::Call(normalize_sip_address(address))
            }
            _ => AppCommand::Unknown(text.to_string()),
        }
    }
}

/// Command given on the command line, `show` when there is none
pub fn command_from_args(args: impl IntoIterator<Item = String>) -> String {
    let words: Vec<String> = args
        .into_iter()
        .skip_while(|arg| arg.starts_with('-'))
        .collect();
    if words.is_empty() {
        DEFAULT_COMMAND.to_string()
    } else {
        words.join(" ")
    }
}

pub enum Instance {
    Primary(PrimaryInstance),
    Secondary(SecondaryInstance),
}

#[cfg(unix)]
type Listener = tokio::net::UnixListener;
#[cfg(unix)]
type Stream = tokio::net::UnixStream;
#[cfg(not(unix))]
type Listener = tokio::net::TcpListener;
#[cfg(not(unix))]
type Stream = tokio::net::TcpStream;

// Loopback port used where unix sockets are unavailable
#[cfg(not(unix))]
const INSTANCE_PORT: u16 = 47_061;

/// Connects to a running instance, or becomes the running instance
pub async fn acquire(socket_path: &Path) -> Result<Instance, InstanceError> {
    let socket_error = |source| InstanceError::Socket {
        path: socket_path.to_path_buf(),
        source,
    };

    if let Ok(stream) = connect(socket_path).await {
        debug!("Another instance listens on {}", socket_path.display());
        return Ok(Instance::Secondary(SecondaryInstance { stream }));
    }

    #[cfg(unix)]
    let listener = {
        // Nobody answered, the socket is a leftover of a crashed instance.
        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(socket_error)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(socket_error)?;
        }
        tokio::net::UnixListener::bind(socket_path).map_err(socket_error)?
    };
    #[cfg(not(unix))]
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", INSTANCE_PORT))
        .await
        .map_err(socket_error)?;

    info!("Instance listening on {}", socket_path.display());
    Ok(Instance::Primary(PrimaryInstance {
        listener,
        socket_path: socket_path.to_path_buf(),
    }))
}

#[cfg(unix)]
async fn connect(socket_path: &Path) -> std::io::Result<Stream> {
    tokio::net::UnixStream::connect(socket_path).await
}

#[cfg(not(unix))]
async fn connect(_socket_path: &Path) -> std::io::Result<Stream> {
    tokio::net::TcpStream::connect(("127.0.0.1", INSTANCE_PORT)).await
}

pub struct SecondaryInstance {
    stream: Stream,
}

impl SecondaryInstance {
    pub async fn send(mut self, command: &str) -> Result<(), InstanceError> {
        info!("Forwarding `{}` to the running instance", command);
        let mut line = command.trim().to_string();
        line.push('\n');
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(InstanceError::Forward)?;
        self.stream.flush().await.map_err(InstanceError::Forward)?;
        self.stream.shutdown().await.map_err(InstanceError::Forward)
    }
}

pub struct PrimaryInstance {
    listener: Listener,
    socket_path: PathBuf,
}

impl PrimaryInstance {
    /// Accepts forwarded commands until the returned listener is dropped
    pub fn listen(self) -> CommandListener {
        let (sender, commands) = mpsc::unbounded_channel();
        let task = tokio::spawn(accept_loop(self, sender));
        CommandListener { commands, task }
    }
}

pub struct CommandListener {
    commands: mpsc::UnboundedReceiver<AppCommand>,
    task: JoinHandle<()>,
}

impl CommandListener {
    pub async fn next(&mut self) -> Option<AppCommand> {
        self.commands.recv().await
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SocketCleanup(PathBuf);

impl Drop for SocketCleanup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Err(e) = std::fs::remove_file(&self.0) {
            debug!("Socket {} not removed: {}", self.0.display(), e);
        }
    }
}

async fn accept_loop(instance: PrimaryInstance, sender: mpsc::UnboundedSender<AppCommand>) {
    let _cleanup = SocketCleanup(instance.socket_path);
    loop {
        match instance.listener.accept().await {
            Ok((stream, _)) => {
                let sender = sender.clone();
                tokio::spawn(async move {
                    if let Err(e) = read_commands(stream, sender).await {
                        warn!("Instance connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                warn!("Instance accept error: {}", e);
            }
        }
    }
}

async fn read_commands(stream: Stream, sender: mpsc::UnboundedSender<AppCommand>) -> std::io::Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = AppCommand::parse(&line);
        info!("Received command {:?}", command);
        if sender.send(command).is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_commands() {
        assert_eq!(AppCommand::parse("show"), AppCommand::Show);
        assert_eq!(AppCommand::parse(""), AppCommand::Show);
        assert_eq!(
            AppCommand::parse("call alice@example.org"),
            AppCommand::Call("sip:alice@example.org".to_string())
        );
        assert_eq!(
            AppCommand::parse("call sip-address=sip:bob@example.org"),
            AppCommand::Call("sip:bob@example.org".to_string())
        );
        assert_eq!(AppCommand::parse("call"), AppCommand::Unknown("call".to_string()));
    }

    #[test]
    fn command_defaults_to_show() {
        assert_eq!(command_from_args(Vec::new()), "show");
        assert_eq!(
            command_from_args(vec!["--verbose".to_string(), "call".to_string(), "bob".to_string()]),
            "call bob"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_instance_forwards_command() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("test.sock");

        let Instance::Primary(primary) = acquire(&socket).await.unwrap() else {
            panic!("first instance must be primary");
        };
        let mut listener = primary.listen();

        let Instance::Secondary(secondary) = acquire(&socket).await.unwrap() else {
            panic!("second instance must be secondary");
        };
        secondary.send("call sip:carol@example.org").await.unwrap();

        assert_eq!(
            listener.next().await,
            Some(AppCommand::Call("sip:carol@example.org".to_string()))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("stale.sock");
        std::fs::write(&socket, b"").unwrap();

        assert!(matches!(acquire(&socket).await.unwrap(), Instance::Primary(_)));
    }
}
