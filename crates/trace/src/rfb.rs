// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental parser for the client-to-server half of an RFB stream.
//!
//! Handshake: 12-byte version, one-byte security-type selection, a
//! 16-byte response when VNC auth (type 2) was chosen, then the one-byte
//! ClientInit. After that the stream is a sequence of typed messages.
//! Unknown message types advance the buffer by a single byte so a
//! desynchronised stream always makes progress.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfbClientEvent {
    Key { down: bool, key: u32 },
    Pointer { button_mask: u8, x: u16, y: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Version,
    SecuritySelect,
    AuthResponse,
    ClientInit,
    Messages,
}

pub struct RfbParser {
    buf: Vec<u8>,
    stage: Stage,
    security_type: Option<u8>,
}

impl Default for RfbParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RfbParser {
    pub fn new() -> Self {
        Self { buf: Vec::new(), stage: Stage::Version, security_type: None }
    }

    pub fn security_type(&self) -> Option<u8> {
        self.security_type
    }

    /// Feed bytes; returns every event completed by this chunk.
    pub fn push(&mut self, data: &[u8]) -> Vec<RfbClientEvent> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();
        loop {
            match self.stage {
                Stage::Version => {
                    if self.buf.len() < 12 {
                        return events;
                    }
                    self.consume(12);
                    self.stage = Stage::SecuritySelect;
                }
                Stage::SecuritySelect => {
                    if self.buf.is_empty() {
                        return events;
                    }
                    let security = self.buf[0];
                    self.consume(1);
                    self.security_type = Some(security);
                    tracing::debug!(security, "client selected security type");
                    self.stage = if security == 2 {
                        Stage::AuthResponse
                    } else {
                        Stage::ClientInit
                    };
                }
                Stage::AuthResponse => {
                    if self.buf.len() < 16 {
                        return events;
                    }
                    self.consume(16);
                    self.stage = Stage::ClientInit;
                }
                Stage::ClientInit => {
                    if self.buf.is_empty() {
                        return events;
                    }
                    self.consume(1);
                    self.stage = Stage::Messages;
                }
                Stage::Messages => {
                    let Some(event) = self.next_message() else {
                        return events;
                    };
                    if let Some(event) = event {
                        events.push(event);
                    }
                }
            }
        }
    }

    /// One message from the buffer: `None` = need more bytes,
    /// `Some(None)` = consumed a non-input message.
    fn next_message(&mut self) -> Option<Option<RfbClientEvent>> {
        let buf = &self.buf;
        let msg_type = *buf.first()?;
        match msg_type {
            // SetPixelFormat
            0 => {
                if buf.len() < 20 {
                    return None;
                }
                self.consume(20);
                Some(None)
            }
            // SetEncodings
            2 => {
                if buf.len() < 4 {
                    return None;
                }
                let count = u16::from_be_bytes([buf[2], buf[3]]) as usize;
                let total = 4 + count * 4;
                if buf.len() < total {
                    return None;
                }
                self.consume(total);
                Some(None)
            }
            // FramebufferUpdateRequest
            3 => {
                if buf.len() < 10 {
                    return None;
                }
                self.consume(10);
                Some(None)
            }
            // KeyEvent
            4 => {
                if buf.len() < 8 {
                    return None;
                }
                let down = buf[1] == 1;
                let key = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
                self.consume(8);
                Some(Some(RfbClientEvent::Key { down, key }))
            }
            // PointerEvent
            5 => {
                if buf.len() < 6 {
                    return None;
                }
                let button_mask = buf[1];
                let x = u16::from_be_bytes([buf[2], buf[3]]);
                let y = u16::from_be_bytes([buf[4], buf[5]]);
                self.consume(6);
                Some(Some(RfbClientEvent::Pointer { button_mask, x, y }))
            }
            // ClientCutText
            6 => {
                if buf.len() < 8 {
                    return None;
                }
                let len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
                let total = 8 + len;
                if buf.len() < total {
                    return None;
                }
                self.consume(total);
                Some(None)
            }
            other => {
                tracing::debug!(msg_type = other, "unknown client message; discarding one byte");
                self.consume(1);
                Some(None)
            }
        }
    }

    fn consume(&mut self, n: usize) {
        self.buf.drain(..n.min(self.buf.len()));
    }
}

#[cfg(test)]
#[path = "rfb_tests.rs"]
mod tests;
