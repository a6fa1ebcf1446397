use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::options::ConnectOptions;

/// The transport under a connection: TCP, or a Unix domain socket when the
/// URL names a socket path.
pub(crate) enum Socket {
    Tcp(TcpStream),

    #[cfg(unix)]
    Unix(UnixStream),

    #[cfg(test)]
    Mock(MockStream),
}

/// Scripted bytes standing in for a server in unit tests. Reads drain the
/// script and then report `WouldBlock`; writes are captured.
#[cfg(test)]
pub(crate) struct MockStream {
    pub(crate) input: io::Cursor<Vec<u8>>,
    pub(crate) written: Vec<u8>,
}

impl Socket {
    pub(crate) fn connect(options: &ConnectOptions) -> Result<Self> {
        if let Some(path) = &options.socket {
            #[cfg(unix)]
            {
                let stream = UnixStream::connect(path)?;
                return Ok(Socket::Unix(stream));
            }

            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(Error::Configuration(
                    "unix domain sockets are not supported on this platform".into(),
                ));
            }
        }

        let addrs = (options.host.as_str(), options.port).to_socket_addrs()?;
        let mut last_error = None;

        for addr in addrs {
            let connected = match options.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match connected {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    return Ok(Socket::Tcp(stream));
                }

                Err(error) => last_error = Some(error),
            }
        }

        Err(Error::Network(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("could not resolve {}:{}", options.host, options.port),
            )
        })))
    }

    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            Socket::Tcp(stream) => stream.set_read_timeout(timeout)?,

            #[cfg(unix)]
            Socket::Unix(stream) => stream.set_read_timeout(timeout)?,

            #[cfg(test)]
            Socket::Mock(_) => {}
        }

        Ok(())
    }

    pub(crate) fn set_nonblocking(&self, on: bool) -> Result<()> {
        match self {
            Socket::Tcp(stream) => stream.set_nonblocking(on)?,

            #[cfg(unix)]
            Socket::Unix(stream) => stream.set_nonblocking(on)?,

            #[cfg(test)]
            Socket::Mock(_) => {}
        }

        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        let _ = match self {
            Socket::Tcp(stream) => stream.shutdown(Shutdown::Both),

            #[cfg(unix)]
            Socket::Unix(stream) => stream.shutdown(Shutdown::Both),

            #[cfg(test)]
            Socket::Mock(_) => Ok(()),
        };
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(stream) => stream.read(buf),

            #[cfg(unix)]
            Socket::Unix(stream) => stream.read(buf),

            #[cfg(test)]
            Socket::Mock(mock) => match mock.input.read(buf) {
                Ok(0) => Err(io::ErrorKind::WouldBlock.into()),
                other => other,
            },
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(stream) => stream.write(buf),

            #[cfg(unix)]
            Socket::Unix(stream) => stream.write(buf),

            #[cfg(test)]
            Socket::Mock(mock) => {
                mock.written.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Socket::Tcp(stream) => stream.flush(),

            #[cfg(unix)]
            Socket::Unix(stream) => stream.flush(),

            #[cfg(test)]
            Socket::Mock(_) => Ok(()),
        }
    }
}
