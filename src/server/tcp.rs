//! Newline-delimited JSON host endpoint over plain TCP.
//!
//! One [`Frame`] per line, 1 MiB per line at most. Bad lines are skipped
//! by the codec without dropping the connection.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::connection::HostSession;
use crate::agent::Registry;
use crate::transport::codec::FrameCodec;
use crate::Result;

/// Accept host connections on `listener` until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the local address cannot be read.
pub async fn serve_tcp(
    listener: TcpListener,
    registry: Arc<Registry>,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "tcp host endpoint listening");

    loop {
        tokio::select! {
            () = ct.cancelled() => {
                info!("tcp host endpoint shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let span = info_span!("host_tcp", %peer);
                        let registry = Arc::clone(&registry);
                        let ct = ct.child_token();
                        tokio::spawn(handle_connection(stream, registry, ct).instrument(span));
                    }
                    Err(err) => warn!(%err, "tcp accept failed"),
                }
            }
        }
    }

    Ok(())
}

/// Drive one host stream until it closes or `ct` fires.
pub async fn handle_connection<S>(stream: S, registry: Arc<Registry>, ct: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, FrameCodec::new());
    let mut writer = FramedWrite::new(write_half, FrameCodec::new());
    let (session, mut outbound) = HostSession::attach(registry);
    debug!(sid = session.sid(), "tcp host attached");

    loop {
        tokio::select! {
            biased;

            () = ct.cancelled() => break,

            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    debug!("outbound queue closed, connection replaced");
                    break;
                };
                if let Err(err) = writer.send(frame).await {
                    warn!(%err, "tcp write failed");
                    break;
                }
            }

            inbound = reader.next() => {
                match inbound {
                    Some(Ok(frame)) => session.receive(frame),
                    Some(Err(err)) => {
                        warn!(%err, "tcp read failed");
                        break;
                    }
                    None => {
                        debug!("host closed the stream");
                        break;
                    }
                }
            }
        }
    }

    session.close();
}
