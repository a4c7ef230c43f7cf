//! Line-oriented front end for the client driver.
//!
//! Reads one command per line, prints listings, per-chunk progress and a
//! line per downloaded file. All protocol work happens in [`Client`].

use crate::client::{Client, Reply};
use crate::error::{Error, Result};
use crate::protocol::Command;
use crate::transfer::{FileOutcome, Progress};
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite};
use tracing::warn;

const HELP: &str = "Commands: list, get <file1> <file2>..., quit";

/// Progress line printed after each chunk.
pub fn progress_line(p: &Progress<'_>) -> String {
    format!("Downloading {} part {} .... {}%", p.name, p.part, p.percent())
}

/// Line printed for each file once its response has been read.
pub fn outcome_line(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Downloaded { name, .. } => {
            format!("Download complete: {}", name).green().to_string()
        }
        FileOutcome::NotFound { name } => {
            format!("File '{}' does not exist.", name).red().to_string()
        }
        FileOutcome::Rejected { name, reason } => {
            format!("Refused to save '{}': {}", name, reason).red().to_string()
        }
        FileOutcome::Failed { name, reason } => {
            format!("Could not save '{}': {}", name, reason).red().to_string()
        }
    }
}

/// Drive `client` from `input` until `quit` or end of input.
///
/// Errors that end the session are returned; everything else is printed and
/// the loop continues.
pub async fn run<R, W, I, O>(mut client: Client<R, W>, mut input: I, out: &mut O) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: Write,
{
    writeln!(out, "\nClient ID: {}", client.client_id())?;
    writeln!(out, "Download directory: {}", client.download_dir().display())?;

    let mut line = String::new();
    loop {
        writeln!(out, "\n{}\n", HELP)?;
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            // End of input counts as quit so the server sees a clean close.
            writeln!(out)?;
            return client.quit().await;
        }

        let command = Command::parse(line.trim_end_matches(|c: char| c == '\r' || c == '\n'));
        if let Command::Get(names) = &command {
            if names.is_empty() {
                writeln!(out, "\nUsage: get <file1> <file2>...")?;
                continue;
            }
        }

        let reply = client
            .execute(command, |p| {
                if let Err(e) = writeln!(out, "{}", progress_line(p)) {
                    warn!("Failed to print progress: {}", e);
                }
            })
            .await;

        match reply {
            Ok(Reply::Listing(names)) => {
                writeln!(out, "\nAvailable files:")?;
                for name in names {
                    writeln!(out, "- {}", name)?;
                }
            }
            Ok(Reply::Files(outcomes)) => {
                for outcome in &outcomes {
                    writeln!(out, "{}", outcome_line(outcome))?;
                }
            }
            Ok(Reply::Quit) => return Ok(()),
            Err(Error::UnknownCommand(_)) => {
                writeln!(out, "\nUnknown command. Please try again.")?;
            }
            Err(e) if !e.is_fatal() => {
                warn!("{}", e);
                writeln!(out, "\n{}", e)?;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let p = Progress {
            name: "report.txt",
            part: 2,
            received: 2_097_152,
            total: 2_500_000,
        };
        assert_eq!(progress_line(&p), "Downloading report.txt part 2 .... 83%");
    }

    #[test]
    fn test_outcome_line() {
        colored::control::set_override(false);
        let missing = FileOutcome::NotFound {
            name: "x.txt".into(),
        };
        assert_eq!(outcome_line(&missing), "File 'x.txt' does not exist.");
    }
}
