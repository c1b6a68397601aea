//! Generated request bodies.
//!
//! Binary payloads are streamed from one 64 KiB slice of random bytes that
//! is filled once per process. Each reader walks the slice and restarts at
//! a random offset in its first half whenever it runs off the end, so
//! payloads of any size cost no more than the slice itself.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::io::{self, Read};
use std::sync::{Arc, OnceLock};

pub const SLICE_LEN: usize = 65535;

static RANDOM_SLICE: OnceLock<Arc<[u8]>> = OnceLock::new();

/// The process-wide random slice.
pub fn random_slice() -> Arc<[u8]> {
    Arc::clone(RANDOM_SLICE.get_or_init(|| {
        let mut bytes = vec![0u8; SLICE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes.into()
    }))
}

/// A reader yielding exactly `size` pseudo-random bytes.
pub struct RandomPayload {
    slice: Arc<[u8]>,
    remaining: u64,
    pos: usize,
    rng: StdRng,
}

impl RandomPayload {
    pub fn new(size: u64) -> Self {
        Self::from_slice(size, random_slice())
    }

    pub fn from_slice(size: u64, slice: Arc<[u8]>) -> Self {
        let mut rng = StdRng::from_entropy();
        let pos = restart_offset(&mut rng, slice.len());
        Self {
            slice,
            remaining: size,
            pos,
            rng,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

fn restart_offset(rng: &mut StdRng, len: usize) -> usize {
    let half = len / 2;
    if half == 0 {
        0
    } else {
        rng.gen_range(0..half)
    }
}

impl Read for RandomPayload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.slice.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        while written < buf.len() && self.remaining > 0 {
            if self.pos >= self.slice.len() {
                self.pos = restart_offset(&mut self.rng, self.slice.len());
            }
            let available = self.slice.len() - self.pos;
            let n = available
                .min(buf.len() - written)
                .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
            buf[written..written + n].copy_from_slice(&self.slice[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
            self.remaining -= n as u64;
        }
        Ok(written)
    }
}

/// Alphanumeric text of `size` characters, for property values.
pub fn random_text(size: u64) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(usize::try_from(size).unwrap_or(usize::MAX))
        .map(char::from)
        .collect()
}
