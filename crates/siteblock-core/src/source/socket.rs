//! Local socket transport
//!
//! Each line a client sends is one JSON command; the agent answers each with
//! one line: `ok <outcome>` or `error: <message>`.

use super::{CommandReply, CommandRequest};
use crate::agent::CommandOutcome;
use crate::command::Command;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Accepts commands on a TCP socket
#[derive(Debug)]
pub struct SocketListener {
    listener: TcpListener,
}

impl SocketListener {
    /// Bind to `addr`
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        if !addr.ip().is_loopback() {
            warn!(%addr, "Command socket is reachable from other hosts");
        }
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the receiving side goes away
    pub async fn run(self, commands: mpsc::Sender<CommandRequest>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Listening for commands");
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept command connection: {}", e);
                    continue;
                }
            };

            if commands.is_closed() {
                debug!("Agent gone, stopping command socket");
                break;
            }

            debug!(%peer, "Command connection opened");
            tokio::spawn(serve_connection(stream, commands.clone()));
        }
    }
}

async fn serve_connection(stream: TcpStream, commands: mpsc::Sender<CommandRequest>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!("Command connection read failed: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let reply = match Command::from_json(&line) {
            Ok(command) => dispatch(command, &commands).await,
            Err(e) => Err(e.to_string()),
        };

        let text = match reply {
            Ok(outcome) => format!("ok {}\n", outcome.as_str()),
            Err(message) => format!("error: {}\n", message.replace('\n', " ")),
        };

        if writer.write_all(text.as_bytes()).await.is_err() {
            break;
        }
    }
}

async fn dispatch(command: Command, commands: &mpsc::Sender<CommandRequest>) -> CommandReply {
    let (request, reply) = CommandRequest::with_reply(command);
    if commands.send(request).await.is_err() {
        return Err("agent is shutting down".to_string());
    }
    reply
        .await
        .unwrap_or_else(|_| Err("agent dropped the command".to_string()))
}

/// Send one command to a running agent and wait for its reply
pub async fn send_command(addr: SocketAddr, command: &Command) -> Result<CommandReply> {
    let stream = TcpStream::connect(addr).await?;
    let (reader, mut writer) = stream.into_split();

    let mut line = command.to_json_line()?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;

    let mut lines = BufReader::new(reader).lines();
    let reply = lines
        .next_line()
        .await?
        .ok_or_else(|| Error::invalid_command("agent closed the connection without replying"))?;

    parse_reply(&reply)
}

fn parse_reply(reply: &str) -> Result<CommandReply> {
    if let Some(message) = reply.strip_prefix("error: ") {
        return Ok(Err(message.to_string()));
    }

    reply
        .strip_prefix("ok ")
        .and_then(CommandOutcome::parse)
        .map(Ok)
        .ok_or_else(|| Error::invalid_command(format!("unexpected reply: {reply}")))
}
