//! JSON lines front end for [`RuleService`]
//!
//! One request per input line, one response per output line. Blank lines are
//! ignored; a line that does not parse yields an `error` response.

use eyre::{Result, WrapErr};
use ruledeck_api::{Request, Response};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::service::RuleService;

/// Serve requests from `reader` until end of input.
pub async fn serve<R, W>(service: &RuleService, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.wrap_err("Failed to read request")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let responses = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!(?request, "Handling request");
                service.handle(request).await
            }
            Err(e) => {
                warn!("Invalid request: {e}");
                vec![Response::error(format!("Invalid request: {e}"))]
            }
        };

        for response in &responses {
            let mut encoded = serde_json::to_vec(response)?;
            encoded.push(b'\n');
            writer
                .write_all(&encoded)
                .await
                .wrap_err("Failed to write response")?;
        }
        writer.flush().await?;
    }

    info!("Input closed, stopping");
    Ok(())
}

/// Serve on stdin/stdout.
pub async fn serve_stdio(service: &RuleService) -> Result<()> {
    info!("Serving JSON lines on stdio");
    serve(
        service,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}
