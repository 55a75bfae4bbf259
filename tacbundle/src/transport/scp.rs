//! Sink side of the classic SCP protocol.
//!
//! The device runs `scp -f <path>` and streams the file; we acknowledge each
//! record with a NUL byte. Only single regular files are supported.

use std::path::Path;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, ParseError, Result, TransferError, TransportError};

/// A `C` record announcing a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpHeader {
    pub mode: u32,
    pub size: u64,
    pub name: String,
}

/// Parse a `C0644 1234 name` record (without the trailing newline).
pub fn parse_header(line: &str) -> std::result::Result<ScpHeader, ParseError> {
    let bad = || ParseError::ScpHeader(line.to_string());
    let body = line.strip_prefix('C').ok_or_else(bad)?;
    let mut parts = body.splitn(3, ' ');
    let mode = parts
        .next()
        .and_then(|m| u32::from_str_radix(m, 8).ok())
        .ok_or_else(bad)?;
    let size = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(bad)?;
    let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(bad)?;
    Ok(ScpHeader {
        mode,
        size,
        name: name.to_string(),
    })
}

async fn ack<S: AsyncWrite + Unpin>(stream: &mut S) -> Result<()> {
    stream.write_all(&[0]).await.map_err(TransportError::Io)?;
    stream.flush().await.map_err(TransportError::Io)?;
    Ok(())
}

async fn read_byte<S: AsyncRead + Unpin>(stream: &mut S) -> Result<u8> {
    match stream.read_u8().await {
        Ok(b) => Ok(b),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(TransportError::Disconnected.into())
        }
        Err(e) => Err(TransportError::Io(e).into()),
    }
}

async fn read_line<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String> {
    let mut line = Vec::new();
    loop {
        match read_byte(stream).await? {
            b'\n' => break,
            b => line.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn remote_failure(path: &str, message: String) -> Error {
    TransferError::ScpRemote {
        path: path.to_string(),
        message: message.trim().to_string(),
    }
    .into()
}

/// Remove a partially written download, if there is one.
pub(crate) async fn discard_partial(local_path: &Path) {
    match tokio::fs::remove_file(local_path).await {
        Ok(()) => debug!("removed partial download {}", local_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("cannot remove partial download {}: {e}", local_path.display()),
    }
}

/// Receive one file from an `scp -f` peer into `local_path`.
///
/// A partially written file is removed on failure.
pub async fn receive_file<S>(stream: &mut S, remote_path: &str, local_path: &Path) -> Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    ack(stream).await?;

    let header = loop {
        let kind = read_byte(stream).await?;
        let line = read_line(stream).await?;
        match kind {
            b'C' => break parse_header(&format!("C{line}"))?,
            // timestamps
            b'T' => {
                trace!("scp times record {}", line);
                ack(stream).await?;
            }
            1 | 2 => return Err(remote_failure(remote_path, line)),
            other => {
                return Err(ParseError::ScpHeader(format!("{}{}", other as char, line)).into());
            }
        }
    };
    debug!(
        "scp receiving {} ({} bytes, mode {:o})",
        header.name, header.size, header.mode
    );
    ack(stream).await?;

    let result = copy_body(stream, remote_path, local_path, header.size).await;
    if result.is_err() {
        discard_partial(local_path).await;
    }
    result
}

async fn copy_body<S>(stream: &mut S, remote_path: &str, local_path: &Path, size: u64) -> Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut file = tokio::fs::File::create(local_path)
        .await
        .map_err(|e| Error::io(local_path, e))?;

    let received = tokio::io::copy(&mut (&mut *stream).take(size), &mut file)
        .await
        .map_err(|e| Error::io(local_path, e))?;
    file.flush().await.map_err(|e| Error::io(local_path, e))?;

    if received < size {
        return Err(TransferError::Truncated {
            path: remote_path.to_string(),
            expected: size,
            received,
        }
        .into());
    }

    match read_byte(stream).await? {
        0 => {}
        _ => {
            let message = read_line(stream).await?;
            return Err(remote_failure(remote_path, message));
        }
    }
    ack(stream).await?;

    Ok(received)
}
