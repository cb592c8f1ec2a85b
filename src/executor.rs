//! EP1 command execution
//!
//! OUT commands (bit 7 clear) are a single send. IN commands (bit 7 set) are
//! followed by an INSYNC byte from the device, a short settling pause and one
//! packet of response data:
//!
//! ```text
//! Idle -> Sending -> AwaitInsync -> Settling -> Receiving -> Idle
//!                 \-> Idle                        (OUT command)
//! ```
//!
//! Any failure aborts the remaining steps. Nothing here retries.

use crate::buffer::IoBuffer;
use crate::error::{Error, InsyncFault, Result};
use crate::frame::CommandFrame;
use crate::transport::{Transport, EP1_IN, EP1_OUT};
use log::{debug, trace};
use std::time::Duration;

/// Timeout for sending a command and receiving its response
pub const CMD_TIMEOUT: Duration = Duration::from_millis(1000);
/// Timeout for the INSYNC byte; the device may still be busy
pub const INSYNC_TIMEOUT: Duration = Duration::from_millis(3000);
/// Pause between INSYNC and the response read while the device latches its
/// reply. Fixed by the hardware, do not shorten.
pub const POST_INSYNC_SETTLE: Duration = Duration::from_millis(60);
/// Handshake byte sent by the device when the response is ready
pub const INSYNC: u8 = 0xff;
/// Maximum single response packet
pub const MAX_PACKET_SIZE: usize = 64;

/// Data returned by an IN command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    /// Bytes reported by the final transfer
    pub count: usize,
    pub data: Vec<u8>,
}

impl CommandResponse {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Run one command to completion.
///
/// `out` and `incoming` are the session's EP1 buffers. The frame is staged
/// in `out`; the response lands in `incoming`.
pub fn execute<T: Transport>(
    transport: &mut T,
    frame: &CommandFrame<'_>,
    out: &mut IoBuffer,
    incoming: &mut IoBuffer,
) -> Result<CommandResponse> {
    out.reset();
    let capacity = out.capacity();
    let len = frame.write_to(out.window_mut(capacity)?)?;
    out.set_len(len)?;

    trace!(
        "Sending command 0x{:02x} to {} ({} bytes)",
        frame.command,
        frame.destination,
        len
    );
    send(transport, out.as_slice())?;

    if !frame.expects_response() {
        return Ok(CommandResponse::default());
    }

    await_insync(transport, incoming)?;

    trace!("INSYNC ok, settling for {:?}", POST_INSYNC_SETTLE);
    transport.settle(POST_INSYNC_SETTLE);

    let response = receive(transport, incoming)?;
    debug!(
        "Command 0x{:02x} returned {} bytes",
        frame.command, response.count
    );
    Ok(response)
}

fn send<T: Transport>(transport: &mut T, frame: &[u8]) -> Result<()> {
    let written = transport.write(EP1_OUT, frame, CMD_TIMEOUT)?;
    if written != frame.len() {
        return Err(Error::ShortWrite {
            expected: frame.len(),
            actual: written,
        });
    }
    Ok(())
}

fn await_insync<T: Transport>(transport: &mut T, incoming: &mut IoBuffer) -> Result<()> {
    incoming.reset();
    let window = incoming.window_mut(1)?;
    let count = transport
        .read(EP1_IN, window, INSYNC_TIMEOUT)
        .map_err(|e| Error::OutOfSync(InsyncFault::Transport(Box::new(e))))?;
    if count != 1 {
        return Err(Error::OutOfSync(InsyncFault::Count(count)));
    }
    if window[0] != INSYNC {
        return Err(Error::OutOfSync(InsyncFault::Value(window[0])));
    }
    Ok(())
}

fn receive<T: Transport>(transport: &mut T, incoming: &mut IoBuffer) -> Result<CommandResponse> {
    incoming.reset();
    let count = transport.read(EP1_IN, incoming.window_mut(MAX_PACKET_SIZE)?, CMD_TIMEOUT)?;
    incoming.set_len(count.min(MAX_PACKET_SIZE))?;
    Ok(CommandResponse {
        count,
        data: incoming.as_slice().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MAX_BUF_SIZE;
    use crate::frame::DEST_MP4X;
    use crate::transport::mock::{Call, MockTransport, Reply};

    fn run(mock: &mut MockTransport, command: u8, payload: &[u8]) -> Result<CommandResponse> {
        let frame = CommandFrame::new(DEST_MP4X, command, payload).unwrap();
        let mut out = IoBuffer::new(MAX_BUF_SIZE);
        let mut incoming = IoBuffer::new(MAX_BUF_SIZE);
        execute(mock, &frame, &mut out, &mut incoming)
    }

    #[test]
    fn in_command_full_sequence() {
        let mut mock = MockTransport::new([
            Reply::Wrote(3),
            Reply::Read(vec![0xff]),
            Reply::Read(vec![0x01, 0x04]),
        ]);
        let resp = run(&mut mock, 0x93, &[]).unwrap();
        assert_eq!(
            resp,
            CommandResponse {
                count: 2,
                data: vec![0x01, 0x04]
            }
        );
        assert_eq!(
            mock.calls,
            vec![
                Call::Write {
                    endpoint: EP1_OUT,
                    data: vec![0x04, 0x93, 0x00],
                    timeout: CMD_TIMEOUT
                },
                Call::Read {
                    endpoint: EP1_IN,
                    len: 1,
                    timeout: INSYNC_TIMEOUT
                },
                Call::Settle(POST_INSYNC_SETTLE),
                Call::Read {
                    endpoint: EP1_IN,
                    len: MAX_PACKET_SIZE,
                    timeout: CMD_TIMEOUT
                },
            ]
        );
    }

    #[test]
    fn out_command_stops_after_send() {
        let mut mock = MockTransport::new([Reply::Wrote(5)]);
        let resp = run(&mut mock, 0x13, &[0xaa, 0xbb]).unwrap();
        assert_eq!(resp, CommandResponse::default());
        assert!(resp.is_empty());
        assert_eq!(mock.calls.len(), 1);
    }

    #[test]
    fn short_write_skips_handshake() {
        let mut mock = MockTransport::new([Reply::Wrote(2), Reply::Read(vec![0xff])]);
        let err = run(&mut mock, 0x93, &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortWrite {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(mock.transfers(), 1);
    }

    #[test]
    fn send_transport_error_is_passed_through() {
        let mut mock = MockTransport::new([Reply::Fail]);
        let err = run(&mut mock, 0x93, &[]).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(mock.transfers(), 1);
    }

    #[test]
    fn insync_accepts_only_single_ff() {
        let cases: &[(Vec<u8>, bool)] = &[
            (vec![0xff], true),
            (vec![0x00], false),
            (vec![0xfe], false),
            (vec![], false),
            (vec![0xff, 0xff], false),
            (vec![0x00, 0xff], false),
        ];
        for (insync, ok) in cases {
            let mut mock = MockTransport::new([
                Reply::Wrote(3),
                Reply::Read(insync.clone()),
                Reply::Read(vec![0x01]),
            ]);
            let result = run(&mut mock, 0x93, &[]);
            if *ok {
                assert!(result.is_ok(), "{:?} should be accepted", insync);
            } else {
                let err = result.unwrap_err();
                assert!(
                    matches!(err, Error::OutOfSync(_)),
                    "{:?} gave {:?}",
                    insync,
                    err
                );
                // No settle and no final read after a bad handshake
                assert_eq!(mock.calls.len(), 2);
            }
        }
    }

    #[test]
    fn insync_fault_details() {
        let mut mock = MockTransport::new([Reply::Wrote(3), Reply::Read(vec![0x00])]);
        let err = run(&mut mock, 0x93, &[]).unwrap_err();
        assert!(matches!(err, Error::OutOfSync(InsyncFault::Value(0x00))));

        let mut mock = MockTransport::new([Reply::Wrote(3), Reply::Read(vec![0xff, 0xff])]);
        let err = run(&mut mock, 0x93, &[]).unwrap_err();
        assert!(matches!(err, Error::OutOfSync(InsyncFault::Count(2))));
    }

    #[test]
    fn insync_transport_error_is_out_of_sync() {
        let mut mock = MockTransport::new([Reply::Wrote(3), Reply::Fail]);
        let err = run(&mut mock, 0x93, &[]).unwrap_err();
        assert!(matches!(err, Error::OutOfSync(InsyncFault::Transport(_))));
        assert!(!err.is_transport());
    }

    #[test]
    fn receive_transport_error_is_passed_through() {
        let mut mock = MockTransport::new([Reply::Wrote(3), Reply::Read(vec![0xff]), Reply::Fail]);
        let err = run(&mut mock, 0x93, &[]).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(mock.transfers(), 3);
    }

    #[test]
    fn oversized_response_is_capped_to_one_packet() {
        let mut mock = MockTransport::new([
            Reply::Wrote(3),
            Reply::Read(vec![0xff]),
            Reply::Read(vec![0x5a; 80]),
        ]);
        let resp = run(&mut mock, 0x93, &[]).unwrap();
        assert_eq!(resp.count, 80);
        assert_eq!(resp.data.len(), MAX_PACKET_SIZE);
    }
}
