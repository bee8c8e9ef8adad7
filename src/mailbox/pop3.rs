//! POP3 mailbox over plain TCP or TLS (rustls).
//!
//! Only the commands the scan needs: USER/PASS, LIST, TOP n 0, RETR, QUIT.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{Mailbox, MailboxConnector, MessageId};
use crate::config::MailboxConfig;
use crate::error::MailboxError;

const IO_TIMEOUT: Duration = Duration::from_secs(30);

// ── Transport ───────────────────────────────────────────────────────

enum Transport {
    Plain(TcpStream),
    Tls(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::Tls(s) => s.flush(),
        }
    }
}

fn open_transport(host: &str, port: u16, tls: bool) -> Result<Transport, MailboxError> {
    let connect_err = |reason: String| MailboxError::Connect {
        host: host.to_string(),
        port,
        reason,
    };

    let tcp = TcpStream::connect((host, port)).map_err(|e| connect_err(e.to_string()))?;
    tcp.set_read_timeout(Some(IO_TIMEOUT))?;
    tcp.set_write_timeout(Some(IO_TIMEOUT))?;

    if !tls {
        return Ok(Transport::Plain(tcp));
    }

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| connect_err(e.to_string()))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| connect_err(e.to_string()))?;
    Ok(Transport::Tls(Box::new(rustls::StreamOwned::new(conn, tcp))))
}

// ── Session ─────────────────────────────────────────────────────────

/// An authenticated POP3 session.
pub struct Pop3Mailbox {
    stream: BufReader<Transport>,
    closed: bool,
}

impl Pop3Mailbox {
    /// Connect, read the greeting and log in.
    pub fn connect(
        host: &str,
        port: u16,
        tls: bool,
        user: &str,
        password: &SecretString,
    ) -> Result<Self, MailboxError> {
        let transport = open_transport(host, port, tls)?;
        let mut session = Self {
            stream: BufReader::new(transport),
            closed: false,
        };

        session.read_status()?;
        session.command(&format!("USER {user}"))?;
        session
            .command(&format!("PASS {}", password.expose_secret()))
            .map_err(|_| MailboxError::AuthFailed {
                user: user.to_string(),
            })?;

        tracing::info!(host, port, tls, "POP3 session opened");
        Ok(session)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, MailboxError> {
        let mut line = Vec::new();
        let n = self.stream.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Err(MailboxError::Protocol("connection closed".into()));
        }
        while line.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Read a single-line response, failing on `-ERR`.
    fn read_status(&mut self) -> Result<String, MailboxError> {
        let line = self.read_line()?;
        let text = String::from_utf8_lossy(&line).into_owned();
        if text.starts_with("+OK") {
            Ok(text)
        } else {
            Err(MailboxError::Protocol(text))
        }
    }

    /// Send one command and read its status line.
    fn command(&mut self, cmd: &str) -> Result<String, MailboxError> {
        let writer = self.stream.get_mut();
        writer.write_all(cmd.as_bytes())?;
        writer.write_all(b"\r\n")?;
        writer.flush()?;
        self.read_status()
    }

    /// Read a dot-terminated multi-line body, undoing dot-stuffing.
    fn read_multiline(&mut self) -> Result<Vec<Vec<u8>>, MailboxError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == b"." {
                return Ok(lines);
            }
            match line.strip_prefix(b".") {
                Some(rest) if rest.starts_with(b".") => lines.push(rest.to_vec()),
                _ => lines.push(line),
            }
        }
    }

    fn multiline_command(&mut self, cmd: &str) -> Result<Vec<u8>, MailboxError> {
        self.command(cmd)?;
        Ok(join_crlf(self.read_multiline()?))
    }
}

fn join_crlf(lines: Vec<Vec<u8>>) -> Vec<u8> {
    let mut raw = Vec::with_capacity(lines.iter().map(|l| l.len() + 2).sum());
    for line in lines {
        raw.extend_from_slice(&line);
        raw.extend_from_slice(b"\r\n");
    }
    raw
}

/// Parse `LIST` lines of the form `<id> <octets>`.
fn parse_list(raw: &[u8]) -> Result<Vec<MessageId>, MailboxError> {
    String::from_utf8_lossy(raw)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .next()
                .and_then(|id| id.parse::<MessageId>().ok())
                .ok_or_else(|| MailboxError::Protocol(format!("bad LIST line: {line}")))
        })
        .collect()
}

impl Mailbox for Pop3Mailbox {
    fn message_ids(&mut self) -> Result<Vec<MessageId>, MailboxError> {
        let raw = self.multiline_command("LIST")?;
        let mut ids = parse_list(&raw)?;
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_header(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError> {
        self.multiline_command(&format!("TOP {id} 0"))
    }

    fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError> {
        self.multiline_command(&format!("RETR {id}"))
    }

    fn close(&mut self) -> Result<(), MailboxError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.command("QUIT")?;
        tracing::debug!("POP3 session closed");
        Ok(())
    }
}

impl Drop for Pop3Mailbox {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Connects to the configured POP3 server.
pub struct Pop3Connector<'a> {
    config: &'a MailboxConfig,
}

impl<'a> Pop3Connector<'a> {
    pub fn new(config: &'a MailboxConfig) -> Self {
        Self { config }
    }
}

impl MailboxConnector for Pop3Connector<'_> {
    fn connect(&self) -> Result<Box<dyn Mailbox>, MailboxError> {
        let session = Pop3Mailbox::connect(
            &self.config.host,
            self.config.port(),
            self.config.tls,
            &self.config.user,
            &self.config.password,
        )?;
        Ok(Box::new(session))
    }
}
