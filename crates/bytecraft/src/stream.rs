//! Position-tracking byte streams over `std::io` readers and writers.
//!
//! Positions are absolute: bytes consumed or produced since the wrapper was created.

use std::io::{self, Read, Write};

use crate::errors::ErrorKind;

const ZEROS: [u8; 256] = [0; 256];

pub struct ByteReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fills `buf` completely. On a short stream the bytes that were available
    /// stay consumed.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        let mut filled = 0;

        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.position += filled as u64;
                    return Err(ErrorKind::TruncatedStream {
                        needed: buf.len(),
                        available: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.position += filled as u64;
                    return Err(e.into());
                }
            }
        }

        self.position += filled as u64;
        Ok(())
    }

    /// Appends the next `n` bytes to `buf`. The buffer grows only with bytes
    /// that arrive, so `n` may come straight from the stream.
    pub fn read_to_vec(&mut self, n: usize, buf: &mut Vec<u8>) -> Result<(), ErrorKind> {
        let got = self.inner.by_ref().take(n as u64).read_to_end(buf)?;
        self.position += got as u64;

        if got < n {
            return Err(ErrorKind::TruncatedStream {
                needed: n,
                available: got,
            });
        }

        Ok(())
    }

    /// Discards the next `n` bytes. Forward only.
    pub fn advance(&mut self, n: usize) -> Result<(), ErrorKind> {
        let skipped = io::copy(&mut self.inner.by_ref().take(n as u64), &mut io::sink())?;
        self.position += skipped;

        if skipped < n as u64 {
            return Err(ErrorKind::TruncatedStream {
                needed: n,
                available: skipped as usize,
            });
        }

        Ok(())
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

pub struct ByteWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_zeros(&mut self, mut n: usize) -> Result<(), ErrorKind> {
        while n > 0 {
            let chunk = n.min(ZEROS.len());
            self.write_all(&ZEROS[..chunk])?;
            n -= chunk;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ErrorKind> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
