//! Synchronous report exchange with an opened hiddev handle.
//!
//! One outstanding request at a time: every send commits an output report
//! and then drains pending input events for a bounded window to
//! desynchronize from asynchronous device chatter; every query is a
//! refresh-wait-read sequence against the same window. There is no retry
//! logic — the drain is a timing accommodation, not error recovery.

use std::mem;
use std::os::unix::io::AsRawFd;

use nix::poll::{poll, PollFd, PollFlags};
use tracing::trace;

use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::hiddev::{
    self, ReportInfo, UsageRef, UsageRefMulti, HID_REPORT_TYPE_INPUT, HID_REPORT_TYPE_OUTPUT,
    MAX_USAGES,
};

/// Bounded wait after every send/query, in milliseconds.
pub const SETTLE_TIMEOUT_MS: i32 = 3000;

/// Abstraction over the synchronous report exchange, so the protocol
/// layer can be exercised against a mock in tests.
pub trait ReportChannel {
    /// Write an output report's usage values and commit it.
    fn send(&self, report_id: u32, values: &[u8]) -> Result<()>;

    /// Refresh an input report and read back `len` usage values.
    fn query(&self, report_id: u32, len: usize) -> Result<Vec<u8>>;

    /// Wait up to `timeout_ms` for readability, then discard pending
    /// events. A negative timeout blocks indefinitely.
    fn drain(&self, timeout_ms: i32);
}

/// [`ReportChannel`] over a real hiddev node.
pub struct HiddevChannel<'a> {
    handle: &'a DeviceHandle,
}

impl<'a> HiddevChannel<'a> {
    pub fn new(handle: &'a DeviceHandle) -> Self {
        Self { handle }
    }

    /// Wait for the fd to become readable. False on timeout or error.
    fn wait_readable(&self, timeout_ms: i32) -> bool {
        let mut fds = [PollFd::new(self.handle.as_raw_fd(), PollFlags::POLLIN)];
        matches!(poll(&mut fds, timeout_ms), Ok(n) if n > 0)
    }

    /// Read and discard queued events until the fd runs dry. Relies on
    /// the O_NONBLOCK set at open time.
    fn discard_pending(&self) {
        let mut buf = [0u8; mem::size_of::<UsageRef>()];
        while matches!(
            nix::unistd::read(self.handle.as_raw_fd(), &mut buf),
            Ok(n) if n > 0
        ) {}
    }

    /// Blocking read of the next raw event within `timeout_ms`. Used by
    /// the debug event dump.
    pub fn next_event(&self, timeout_ms: i32) -> Option<UsageRef> {
        if !self.wait_readable(timeout_ms) {
            return None;
        }
        let mut buf = [0u8; mem::size_of::<UsageRef>()];
        match nix::unistd::read(self.handle.as_raw_fd(), &mut buf) {
            Ok(n) if n == buf.len() => UsageRef::from_bytes(&buf),
            _ => None,
        }
    }
}

fn check_len(report_id: u32, len: usize) -> Result<()> {
    if len > MAX_USAGES {
        return Err(Error::Argument(format!(
            "report {report_id:02x}: {len} values exceed the hiddev limit of {MAX_USAGES}"
        )));
    }
    Ok(())
}

impl ReportChannel for HiddevChannel<'_> {
    fn send(&self, report_id: u32, values: &[u8]) -> Result<()> {
        check_len(report_id, values.len())?;

        trace!(
            report_id = format_args!("0x{report_id:02X}"),
            frame = format_args!("{values:02X?}"),
            "TX"
        );

        let mut uref = Box::new(UsageRefMulti::default());
        uref.uref.report_type = HID_REPORT_TYPE_OUTPUT;
        uref.uref.report_id = report_id;
        uref.num_values = values.len() as u32;
        for (i, &b) in values.iter().enumerate() {
            uref.values[i] = i32::from(b);
        }
        unsafe { hiddev::hiddev_susages(self.handle.as_raw_fd(), &*uref) }.map_err(|e| {
            Error::Io {
                action: "send",
                ioctl: "HIDIOCSUSAGES",
                report_id,
                len: values.len(),
                source: e,
            }
        })?;

        let rinfo = ReportInfo {
            report_type: HID_REPORT_TYPE_OUTPUT,
            report_id,
            num_fields: 1,
        };
        unsafe { hiddev::hiddev_sreport(self.handle.as_raw_fd(), &rinfo) }.map_err(|e| {
            Error::Io {
                action: "send",
                ioctl: "HIDIOCSREPORT",
                report_id,
                len: values.len(),
                source: e,
            }
        })?;

        self.drain(SETTLE_TIMEOUT_MS);
        Ok(())
    }

    fn query(&self, report_id: u32, len: usize) -> Result<Vec<u8>> {
        check_len(report_id, len)?;

        let rinfo = ReportInfo {
            report_type: HID_REPORT_TYPE_INPUT,
            report_id,
            num_fields: 1,
        };
        unsafe { hiddev::hiddev_greport(self.handle.as_raw_fd(), &rinfo) }.map_err(|e| {
            Error::Io {
                action: "query",
                ioctl: "HIDIOCGREPORT",
                report_id,
                len,
                source: e,
            }
        })?;

        self.drain(SETTLE_TIMEOUT_MS);

        let mut uref = Box::new(UsageRefMulti::default());
        uref.uref.report_type = HID_REPORT_TYPE_INPUT;
        uref.uref.report_id = report_id;
        uref.num_values = len as u32;
        unsafe { hiddev::hiddev_gusages(self.handle.as_raw_fd(), &mut *uref) }.map_err(|e| {
            Error::Io {
                action: "query",
                ioctl: "HIDIOCGUSAGES",
                report_id,
                len,
                source: e,
            }
        })?;

        let frame: Vec<u8> = uref.values[..len].iter().map(|&v| v as u8).collect();
        trace!(
            report_id = format_args!("0x{report_id:02X}"),
            frame = format_args!("{frame:02X?}"),
            "RX"
        );
        Ok(frame)
    }

    fn drain(&self, timeout_ms: i32) {
        if self.wait_readable(timeout_ms) {
            self.discard_pending();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockChannel;
    use super::*;

    #[test]
    fn mock_records_sends_in_order() {
        let mock = MockChannel::new();
        mock.send(0x10, &[1, 2, 3]).unwrap();
        mock.send(0x11, &[4]).unwrap();
        assert_eq!(
            mock.sent(),
            vec![(0x10, vec![1, 2, 3]), (0x11, vec![4])]
        );
    }

    #[test]
    fn mock_serves_responses_fifo() {
        let mock = MockChannel::new();
        mock.push_response(vec![1, 2, 3, 4, 5, 6]);
        mock.push_response(vec![9, 9]);
        assert_eq!(mock.query(0x10, 6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        // Short responses are zero-padded to the requested length.
        assert_eq!(mock.query(0x10, 4).unwrap(), vec![9, 9, 0, 0]);
    }

    #[test]
    fn mock_query_without_response_errors() {
        let mock = MockChannel::new();
        assert!(mock.query(0x10, 6).is_err());
    }

    #[test]
    fn oversized_frame_is_a_caller_error() {
        let mock = MockChannel::new();
        let big = vec![0u8; MAX_USAGES + 1];
        assert!(matches!(
            mock.send(0x10, &big),
            Err(Error::Argument(_))
        ));
        assert!(mock.query(0x10, MAX_USAGES + 1).is_err());
        assert_eq!(mock.sent_count(), 0);
    }
}
