//! PTY channel for interactive device sessions.

use std::time::{Duration, Instant};

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::buffer::PatternBuffer;
use super::interactive::{InteractiveEvent, InteractiveResult, InteractiveStep};
use crate::error::{Result, TransportError};
use crate::platform::PlatformDefinition;

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Default timeout for operations.
    pub timeout: Duration,

    /// Search depth for pattern matching.
    pub search_depth: usize,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            search_depth: 1000,
        }
    }
}

/// Prompt-driven reader/writer over any byte stream.
///
/// The stream is a russh channel stream for remote sessions or the joined
/// stdin/stdout of a local `FastCli` process.
pub struct PtyChannel<S> {
    stream: S,
    config: PtyConfig,
    buffer: PatternBuffer,
}

impl<S> PtyChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream.
    pub fn new(stream: S, config: PtyConfig) -> Self {
        Self {
            buffer: PatternBuffer::new(config.search_depth),
            stream,
            config,
        }
    }

    /// Send one line of input.
    pub async fn send(&mut self, input: &str) -> Result<()> {
        self.stream
            .write_all(format!("{input}\n").as_bytes())
            .await
            .map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    /// Read until `pattern` matches in the buffer tail.
    ///
    /// Returns everything read up to and including the match.
    pub async fn read_until(&mut self, pattern: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(data) = self.buffer.take_through(pattern) {
                return Ok(data);
            }

            let n = tokio::time::timeout_at(deadline, self.stream.read(&mut chunk))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
                .map_err(TransportError::Io)?;

            if n == 0 {
                return Err(TransportError::Disconnected.into());
            }

            trace!("pty read {} bytes", n);
            self.buffer.extend(&chunk[..n]);
        }
    }

    /// Wait for the first prompt, escalate out of exec mode, and run the
    /// platform's on-open commands.
    pub async fn prepare(&mut self, platform: &PlatformDefinition) -> Result<()> {
        let timeout = self.config.timeout;
        let banner = self.read_until(&platform.prompt_pattern, timeout).await?;
        let banner = String::from_utf8_lossy(&banner);
        let prompt = banner.lines().last().unwrap_or_default();

        if platform.is_exec_prompt(prompt) {
            if let Some(enable) = &platform.enable_command {
                debug!("escalating from exec prompt {:?}", prompt.trim());
                self.send(enable).await?;
                self.read_until(&platform.prompt_pattern, timeout).await?;
            }
        }

        for command in &platform.on_open_commands {
            self.send(command).await?;
            self.read_until(&platform.prompt_pattern, timeout).await?;
        }

        Ok(())
    }

    /// Run an interactive sequence, checking each step's output against
    /// the platform's failure markers.
    ///
    /// The sequence stops after the first failed step. A hidden input only
    /// answers a prompt: if the shell is back at its CLI prompt instead, it
    /// is not sent and the sequence ends there.
    pub async fn run(
        &mut self,
        events: &[InteractiveEvent],
        platform: &PlatformDefinition,
    ) -> Result<InteractiveResult> {
        let start = Instant::now();
        let mut steps: Vec<InteractiveStep> = Vec::with_capacity(events.len());
        let mut at_prompt = true;

        for event in events {
            if steps.last().is_some_and(|s| s.failure_message.is_some()) {
                break;
            }
            if event.hidden && at_prompt {
                debug!("not sending hidden input at the CLI prompt");
                break;
            }

            let step_start = Instant::now();
            debug!("interactive send: {}", event.display_input());

            self.send(&event.input).await?;
            let data = self.read_until(&event.pattern, self.config.timeout).await?;
            let raw = String::from_utf8_lossy(&data);
            at_prompt = raw
                .lines()
                .last()
                .is_some_and(|line| platform.prompt_pattern.is_match(line.trim_end().as_bytes()));

            let echo = if event.hidden { "" } else { event.input.as_str() };
            let output = platform.normalize_output(&raw, echo);
            let failure_message = platform.detect_failure(&output).map(str::to_string);

            steps.push(InteractiveStep {
                input: event.display_input().to_string(),
                output,
                elapsed: step_start.elapsed(),
                failure_message,
            });
        }

        Ok(InteractiveResult::new(steps, start.elapsed()))
    }

    /// Shut down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::arista_eos;
    use tokio::io::AsyncBufReadExt;

    /// Plays a tiny EOS shell on the far end of a duplex pipe.
    async fn fake_switch(stream: tokio::io::DuplexStream, start_prompt: &'static str) {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = tokio::io::BufReader::new(read).lines();
        write.write_all(format!("Last login: today\r\n{start_prompt}").as_bytes()).await.unwrap();
        let mut prompt = start_prompt.replace('>', "#");

        while let Ok(Some(line)) = lines.next_line().await {
            let reply = match line.as_str() {
                "enable" => String::new(),
                "terminal length 0" | "terminal width 32767" => String::new(),
                "cli vrf MGMT" => {
                    prompt = "leaf1(vrf:MGMT)#".into();
                    String::new()
                }
                l if l.contains("unreachable") => {
                    format!("% Error copying {} (Connection refused)\r\n", &l[5..])
                }
                l if l.starts_with("copy ") => {
                    write.write_all(format!("{l}\r\nPassword: ").as_bytes()).await.unwrap();
                    continue;
                }
                "hunter2" => "\r\nCopy completed successfully.\r\n".into(),
                "bogus" => "% Invalid input\r\n".into(),
                _ => String::new(),
            };
            let echo = if line == "hunter2" { String::new() } else { format!("{line}\r\n") };
            write
                .write_all(format!("{echo}{reply}{prompt}").as_bytes())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_prepare_and_run_copy_with_password() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(fake_switch(server, "leaf1>"));

        let platform = arista_eos();
        let mut pty = PtyChannel::new(client, PtyConfig::default());
        pty.prepare(&platform).await.unwrap();

        let prompt = platform.prompt_pattern.as_str();
        let events = vec![
            InteractiveEvent::new("cli vrf MGMT", prompt).unwrap(),
            InteractiveEvent::new("copy file:/mnt/flash/a.zip scp://u@h/tmp/", r"(?i)password:\s*$").unwrap(),
            InteractiveEvent::new("hunter2", prompt).unwrap().hidden(),
        ];
        let result = pty.run(&events, &platform).await.unwrap();

        assert!(!result.failed());
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.steps[2].input, "********");
        assert!(result.final_output().unwrap().contains("Copy completed successfully."));
    }

    #[tokio::test]
    async fn test_failure_marker_flags_step() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(fake_switch(server, "leaf1#"));

        let platform = arista_eos();
        let mut pty = PtyChannel::new(client, PtyConfig::default());
        pty.prepare(&platform).await.unwrap();

        let events = vec![InteractiveEvent::new("bogus", platform.prompt_pattern.as_str()).unwrap()];
        let result = pty.run(&events, &platform).await.unwrap();
        assert!(result.failed());
        assert_eq!(
            result.first_failure().unwrap().failure_message.as_deref(),
            Some("% Invalid input")
        );
    }

    #[tokio::test]
    async fn test_hidden_input_never_sent_at_prompt() {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(fake_switch(server, "leaf1#"));

        let platform = arista_eos();
        let prompt = platform.prompt_pattern.as_str();
        let mut pty = PtyChannel::new(client, PtyConfig::default());
        pty.prepare(&platform).await.unwrap();

        // no password prompt appears, the shell is straight back at leaf1#
        let events = vec![
            InteractiveEvent::new("show clock", &format!(r"(?i)password:\s*$|{prompt}")).unwrap(),
            InteractiveEvent::new("hunter2", prompt).unwrap().hidden(),
        ];
        let result = pty.run(&events, &platform).await.unwrap();
        assert_eq!(result.steps.len(), 1);
        assert!(!result.failed());

        // a failed copy ends the sequence before the password
        let events = vec![
            InteractiveEvent::new(
                "copy file:/mnt/flash/a.zip scp://u@unreachable/tmp/",
                &format!(r"(?i)password:\s*$|{prompt}"),
            )
            .unwrap(),
            InteractiveEvent::new("hunter2", prompt).unwrap().hidden(),
        ];
        let result = pty.run(&events, &platform).await.unwrap();
        assert_eq!(result.steps.len(), 1);
        assert!(result.failed());
        assert!(result.steps[0].output.contains("Connection refused"));
    }

    #[tokio::test]
    async fn test_read_until_times_out() {
        let (client, _server) = tokio::io::duplex(64);
        let mut pty = PtyChannel::new(client, PtyConfig::default());
        let pattern = Regex::new(r"#\s*$").unwrap();
        let err = pty
            .read_until(&pattern, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_read_until_reports_disconnect() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut pty = PtyChannel::new(client, PtyConfig::default());
        let pattern = Regex::new(r"#\s*$").unwrap();
        let err = pty
            .read_until(&pattern, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Transport(TransportError::Disconnected)
        ));
    }
}
