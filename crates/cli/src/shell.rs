//! Interactive query loop.

use std::future::Future;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error};

use crate::error::Result;

const PROMPT: &str = "\nQuery: ";

/// Whether a line asks the shell to exit.
pub fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

/// Read queries from `input` until `quit` or EOF, answering each with `query`.
///
/// Failed queries are reported and the loop continues. A provider that went
/// away ends the loop with that error so the caller can tear everything down.
pub async fn run<R, W, F, Fut>(input: R, output: &mut W, mut query: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = runtime::Result<String>>,
{
    writeln!(output, "Type your queries or 'quit' to exit.")?;
    let mut lines = input.lines();

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            debug!("input closed");
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_quit(line) {
            break;
        }

        match query(line.to_string()).await {
            Ok(answer) => writeln!(output, "\n{answer}")?,
            Err(e @ runtime::Error::ProviderUnavailable { .. }) => {
                error!(error = %e, "provider lost, leaving shell");
                return Err(e.into());
            }
            Err(e) => writeln!(output, "\nError: {e}")?,
        }
    }

    Ok(())
}
