// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use heapless::Vec;

/// Longest command line accepted, excluding the terminator.
pub const LINE_CAPACITY: usize = 127;

#[derive(Debug, PartialEq, Eq)]
pub enum FrameEvent<'a> {
    /// A complete line without its terminator.
    Line(&'a [u8]),
    /// The line outgrew [`LINE_CAPACITY`]. The rest of it, up to the next `\n`, is dropped.
    Overflow,
}

/// Splits the incoming byte stream into command lines.
pub struct LineFramer {
    buffer: Vec<u8, LINE_CAPACITY>,
    discarding: bool,
    // The previous call handed out the buffer as a line; empty it before taking more bytes.
    line_taken: bool,
}

impl LineFramer {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
            line_taken: false,
        }
    }

    /// Feeds one received byte, returning an event when it completes or overflows a line.
    pub fn push(&mut self, byte: u8) -> Option<FrameEvent<'_>> {
        if self.line_taken {
            self.buffer.clear();
            self.line_taken = false;
        }

        match byte {
            b'\r' => None,
            b'\n' if self.discarding => {
                self.discarding = false;
                None
            }
            _ if self.discarding => None,
            b'\n' => {
                self.line_taken = true;
                Some(FrameEvent::Line(self.buffer.as_slice()))
            }
            _ => {
                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    Some(FrameEvent::Overflow)
                } else {
                    None
                }
            }
        }
    }

    /// Drops any partial line, for example when the host disconnects.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
        self.line_taken = false;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec as StdVec;

    #[derive(Debug, PartialEq)]
    enum Event {
        Line(StdVec<u8>),
        Overflow,
    }

    fn feed(framer: &mut LineFramer, bytes: &[u8]) -> StdVec<Event> {
        let mut events = StdVec::new();
        for &byte in bytes {
            match framer.push(byte) {
                Some(FrameEvent::Line(line)) => events.push(Event::Line(line.to_vec())),
                Some(FrameEvent::Overflow) => events.push(Event::Overflow),
                None => {}
            }
        }
        events
    }

    #[test]
    fn splits_crlf_and_lf_lines() {
        let mut framer = LineFramer::new();
        assert_eq!(
            feed(&mut framer, b"PING\r\nCAL?\nPPR?\r\n"),
            [
                Event::Line(b"PING".to_vec()),
                Event::Line(b"CAL?".to_vec()),
                Event::Line(b"PPR?".to_vec()),
            ]
        );
    }

    #[test]
    fn line_may_arrive_in_pieces() {
        let mut framer = LineFramer::new();
        assert!(feed(&mut framer, b"SETT").is_empty());
        assert!(feed(&mut framer, b"IME 17").is_empty());
        assert_eq!(
            feed(&mut framer, b"00\r\n"),
            [Event::Line(b"SETTIME 1700".to_vec())]
        );
    }

    #[test]
    fn empty_line_is_still_reported() {
        let mut framer = LineFramer::new();
        assert_eq!(feed(&mut framer, b"\r\n"), [Event::Line(StdVec::new())]);
    }

    #[test]
    fn full_length_line_is_accepted() {
        let mut framer = LineFramer::new();
        let mut input = [b'A'; LINE_CAPACITY + 1];
        input[LINE_CAPACITY] = b'\n';
        assert_eq!(
            feed(&mut framer, &input),
            [Event::Line([b'A'; LINE_CAPACITY].to_vec())]
        );
    }

    #[test]
    fn overflow_reported_once_and_tail_discarded() {
        let mut framer = LineFramer::new();
        let long = [b'X'; 300];
        assert!(feed(&mut framer, &long[..LINE_CAPACITY]).is_empty());
        assert_eq!(feed(&mut framer, &long[LINE_CAPACITY..]), [Event::Overflow]);
        assert!(feed(&mut framer, b"PING\r\n").is_empty());
        assert_eq!(
            feed(&mut framer, b"PING\r\n"),
            [Event::Line(b"PING".to_vec())]
        );
    }

    #[test]
    fn reset_drops_partial_line() {
        let mut framer = LineFramer::new();
        feed(&mut framer, b"garbage");
        framer.reset();
        assert_eq!(feed(&mut framer, b"INFO\n"), [Event::Line(b"INFO".to_vec())]);
    }
}
