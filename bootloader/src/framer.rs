// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reassembles escaped request frames from the received byte stream.

use consts::FRAME_BUFFER_SIZE;
use host_protocol::{FRAME_END, FRAME_ESCAPE, FRAME_START};

/// Opcode and unescaped payload of a complete frame.
///
/// `"@\n"` completes a frame too, with no opcode. It is acknowledged like
/// any other but carries nothing to execute.
#[derive(Debug, Eq, PartialEq)]
pub struct Frame<'a> {
    pub opcode: Option<u8>,
    pub payload: &'a [u8],
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Normal,
    Escaped,
}

/// Byte-at-a-time frame accumulator.
///
/// The buffer holds `@`, the opcode and the payload, unescaped. The final `\n`
/// is not stored. Overflowing the buffer silently drops what was collected
/// so far, the stream then resynchronizes on the next `@`.
pub struct Framer<const N: usize = FRAME_BUFFER_SIZE> {
    buf: [u8; N],
    index: usize,
    state: State,
}

impl<const N: usize> Default for Framer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Framer<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            index: 0,
            state: State::Normal,
        }
    }

    /// Forget any partial frame.
    pub fn clear(&mut self) {
        self.index = 0;
        self.state = State::Normal;
    }

    /// Feed one received byte, returning the frame it completes, if any.
    ///
    /// The accumulator is reset before the frame is handed out, so the next
    /// byte starts a new one.
    pub fn feed(&mut self, byte: u8) -> Option<Frame<'_>> {
        if self.state == State::Escaped {
            self.state = State::Normal;
            self.store(byte);
            return None;
        }

        match byte {
            FRAME_ESCAPE => {
                self.state = State::Escaped;
                None
            }
            FRAME_START if self.index > 0 => {
                trace!("frame restarted after {} bytes", self.index);
                self.buf[0] = FRAME_START;
                self.index = 1;
                None
            }
            FRAME_END if self.index > 0 && self.buf[0] == FRAME_START => {
                let len = core::mem::replace(&mut self.index, 0);
                if len < 2 {
                    return Some(Frame {
                        opcode: None,
                        payload: &[],
                    });
                }
                Some(Frame {
                    opcode: Some(self.buf[1]),
                    payload: &self.buf[2..len],
                })
            }
            _ => {
                self.store(byte);
                None
            }
        }
    }

    fn store(&mut self, byte: u8) {
        self.buf[self.index] = byte;
        self.index += 1;
        if self.index == N {
            debug!("frame overflow, dropped {} bytes", N);
            self.index = 0;
        }
    }
}
