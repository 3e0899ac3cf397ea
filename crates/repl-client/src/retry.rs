//! Bounded read loop: the reply has no length framing, so completion is inferred from the first
//! read timeout after data has arrived.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Read attempts, per-attempt timeout and chunk size for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    pub attempts: u32,
    pub read_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            read_timeout: Duration::from_millis(1000),
            chunk_size: 10 * 1024,
        }
    }
}

/// Bytes gathered by [`read_accumulated`]. `aborted` carries the hard I/O error that ended the
/// loop early, if any.
#[derive(Debug, Default)]
pub struct Accumulated {
    pub bytes: Vec<u8>,
    pub aborted: Option<io::Error>,
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Reads into one buffer for up to `policy.attempts` attempts. Timeouts are tolerated while the
/// buffer is empty; once bytes have arrived the next timeout ends the reply. End of stream stops
/// the loop quietly and any other error stops it and is returned in `aborted`.
pub async fn read_accumulated<R>(reader: &mut R, policy: &ReadPolicy) -> Accumulated
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut acc = Accumulated::default();
    let mut chunk = vec![0u8; policy.chunk_size.max(1)];

    for attempt in 1..=policy.attempts {
        match tokio::time::timeout(policy.read_timeout, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => {
                debug!(attempt, "End of stream while reading response");
                break;
            }
            Ok(Ok(n)) => acc.bytes.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) if is_transient(&e) => {
                if !acc.bytes.is_empty() {
                    break;
                }
            }
            Ok(Err(e)) => {
                warn!(attempt, error = %e, "Error while reading bytes");
                acc.aborted = Some(e);
                break;
            }
            Err(_elapsed) => {
                if !acc.bytes.is_empty() {
                    debug!(attempt, bytes = acc.bytes.len(), "Read window idle, reply complete");
                    break;
                }
            }
        }
    }

    acc
}
