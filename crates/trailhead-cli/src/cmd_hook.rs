use std::io::Read;

/// `trailhead hook claude`: read hook JSON from stdin, print any output.
/// Always exits 0 so the host agent is never blocked.
pub fn hook_claude() -> anyhow::Result<()> {
    let mut stdin_buf = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut stdin_buf) {
        tracing::debug!("stdin read error: {e}");
        return Ok(());
    }
    tracing::debug!(bytes = stdin_buf.len(), "hook stdin");

    match trailhead_context::hook_entrypoint_from_stdin(&stdin_buf) {
        Ok(result) => {
            if let Some(output) = &result.stdout {
                tracing::debug!(bytes = output.len(), "hook output");
                print!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!("hook error: {e:#}");
            Ok(())
        }
    }
}
