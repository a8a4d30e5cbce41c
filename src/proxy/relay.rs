//! One-way byte relay.
//!
//! # Responsibilities
//! - Copy bytes from a source to a destination, verbatim and in order
//! - Stop on source EOF or on the first I/O error of either side
//! - Close both sides afterwards, whatever the outcome
//!
//! # Design Decisions
//! - Closing is a `shutdown` of the whole underlying socket, read and write;
//!   a split half closes the stream its sibling half still uses, so a read
//!   pending on that sibling returns EOF
//! - Close errors are discarded so a second close never fails the caller
//! - Nothing is logged here; callers report the returned result

use std::io;
use std::net::Shutdown;

use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite, Chain};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A stream handle that can close the stream for every holder at once.
pub trait Close {
    fn close(&self) -> io::Result<()>;
}

impl Close for TcpStream {
    fn close(&self) -> io::Result<()> {
        SockRef::from(self).shutdown(Shutdown::Both)
    }
}

impl Close for OwnedReadHalf {
    fn close(&self) -> io::Result<()> {
        AsRef::<TcpStream>::as_ref(self).close()
    }
}

impl Close for OwnedWriteHalf {
    fn close(&self) -> io::Result<()> {
        AsRef::<TcpStream>::as_ref(self).close()
    }
}

/// Bytes read ahead of the stream are replayed first; closing closes the stream.
impl<T, U> Close for Chain<T, U>
where
    T: AsyncRead,
    U: AsyncRead + Close,
{
    fn close(&self) -> io::Result<()> {
        self.get_ref().1.close()
    }
}

/// Copy everything from `source` into `destination`, then close both.
///
/// Returns the number of bytes copied, or the error that ended the copy.
pub async fn relay<R, W>(mut source: R, mut destination: W) -> io::Result<u64>
where
    R: AsyncRead + Close + Unpin,
    W: AsyncWrite + Close + Unpin,
{
    let copied = tokio::io::copy(&mut source, &mut destination).await;

    let _ = destination.close();
    let _ = source.close();

    copied
}
