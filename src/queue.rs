//! Outbound packet queue.
//!
//! Plain FIFO with one exception: handshake frames jump the line. The 200 ms
//! dispatch pacing lives in the bridge runner, not here.

use std::collections::VecDeque;

use crate::frame::Frame;
use crate::packet::MSG_HANDSHAKE;

#[derive(Debug, Default)]
pub struct PacketQueue {
    frames: VecDeque<Frame>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for dispatch. Handshakes go to the front.
    pub fn push(&mut self, frame: Frame) {
        if frame.message_type == MSG_HANDSHAKE {
            self.frames.push_front(frame);
        } else {
            self.frames.push_back(frame);
        }
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::cmd;

    #[test]
    fn fifo_order() {
        let mut q = PacketQueue::new();
        q.push(cmd::set_power(0, 1, true));
        q.push(cmd::set_volume(0, 1, 40));
        q.push(cmd::set_source(0, 1, 2));
        assert_eq!(q.len(), 3);

        assert_eq!(q.pop(), Some(cmd::set_power(0, 1, true)));
        assert_eq!(q.pop(), Some(cmd::set_volume(0, 1, 40)));
        assert_eq!(q.pop(), Some(cmd::set_source(0, 1, 2)));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn handshake_jumps_the_line() {
        let mut q = PacketQueue::new();
        q.push(cmd::set_power(0, 1, true));
        q.push(cmd::set_volume(0, 1, 40));
        q.push(cmd::handshake(0, 0x02));

        assert_eq!(q.pop(), Some(cmd::handshake(0, 0x02)));
        assert_eq!(q.pop(), Some(cmd::set_power(0, 1, true)));
        assert_eq!(q.pop(), Some(cmd::set_volume(0, 1, 40)));
    }

    #[test]
    fn clear_drops_everything() {
        let mut q = PacketQueue::new();
        q.push(cmd::request_zone_info(0, 0));
        q.push(cmd::request_zone_info(0, 1));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }
}
