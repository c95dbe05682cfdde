//! Upsilon striped UDP egress.
//!
//! Drives an upsilon LED bus controller over UDP. Arguments:
//! `<host> <port> [buffered] (ws2811|upsilon2)* <strand-length>*` - mode
//! tokens apply to the next strand length; strand table slots advance
//! with every length token, zero lengths reserve a slot.
//!
//! Per frame one command packet carries the strand table (80 × u16
//! big-endian; low 15 bits byte length, MSB marks a UART-encoded
//! strand), followed by the frame body: the round-robin byte-interleave
//! of all strand buffers. The body goes out either as streaming chunks
//! (≤512 bytes behind a `0x52` command byte) or as buffered chunks
//! (`0x42`, flags, 4-byte bus address, last chunk flagged).
//!
//! WS2811 strands use the egress's stream schema encoders. `upsilon2`
//! strands are UART-framed: per byte a start bit 0, 8 data bits
//! LSB-first and a stop bit 1, packed MSB-first with idle-1 padding;
//! per pixel an index frame plus three 16-bit PWM + intensity groups,
//! 20 sync frames up front and a sync frame plus 64 idle bits at the
//! end of the strand.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::color::{Led, clamp01};
use crate::egress::{EgressBehavior, EgressFlush};
use crate::engine::Engine;
use crate::errors::CommandError;
use crate::idl::IdlNode;
use crate::scan::LineScanner;

const COMMAND_HEADER: usize = 8;
const CHUNK: usize = 512;

/// Packs logical UART frames (start/data/stop bits) into bytes, MSB
/// first, padding partial bytes with idle-1 bits.
struct UartEncoder<'a> {
    out: &'a mut Vec<u8>,
    current: u8,
    bits: u8,
}

impl<'a> UartEncoder<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, current: 0, bits: 0 }
    }

    fn add_bit(&mut self, v: u8) {
        self.current = (self.current << 1) | (v & 1);
        self.bits += 1;
        if self.bits == 8 {
            self.out.push(self.current);
            self.current = 0;
            self.bits = 0;
        }
    }

    fn add_frame(&mut self, data: u8) {
        self.add_bit(0);
        for i in 0..8 {
            self.add_bit(data >> i);
        }
        self.add_bit(1);
    }

    fn flush(&mut self) {
        while self.bits != 0 {
            self.add_bit(1);
        }
    }

    fn add_idle(&mut self, bits: usize) {
        for _ in 0..bits {
            self.add_bit(1);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StrandMode {
    Ws2811,
    Upsilon2,
}

struct Strand {
    mode: StrandMode,
    count: u16,
    index: usize,
    buffer: Vec<u8>,
}

struct UpsilonEgress {
    addr: SocketAddr,
    socket: Option<UdpSocket>,
    strands: Vec<Strand>,
    buffered: bool,
    header: Vec<u8>,
    frame_buf: Vec<u8>,
}

pub fn create(
    _engine: &Engine,
    args: &mut LineScanner<'_>,
) -> Result<Box<dyn EgressBehavior>, CommandError> {
    let (Some(host), Some(port)) = (args.next_token(), args.get::<u16>()) else {
        return Err(CommandError::usage(
            "incomplete upsilon egress command: missing host / port",
        ));
    };
    let addr = (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| CommandError::usage(format!("unable to resolve host '{host}'")))?;

    let mut strands = Vec::new();
    let mut buffered = false;
    let mut mode = StrandMode::Ws2811;
    let mut slot = 0usize;
    while let Some(token) = args.next_token() {
        match token {
            "buffered" => buffered = true,
            "upsilon2" => mode = StrandMode::Upsilon2,
            "ws2811" => mode = StrandMode::Ws2811,
            other => {
                if let Ok(length) = other.parse::<u16>() {
                    if length != 0 {
                        strands.push(Strand {
                            mode,
                            count: length,
                            index: slot,
                            buffer: Vec::new(),
                        });
                        mode = StrandMode::Ws2811;
                    }
                    slot += 1;
                }
            }
        }
    }

    let socket = UdpSocket::bind(("0.0.0.0", 0))
        .and_then(|s| s.set_nonblocking(true).map(|()| s))
        .map_err(|e| CommandError::usage(format!("upsilon egress: socket error: {e}")))?;

    let mut header = vec![0u8; COMMAND_HEADER + 80 * 2];
    header[0] = 0x42;
    header[2] = 0x01;

    Ok(Box::new(UpsilonEgress {
        addr,
        socket: Some(socket),
        strands,
        buffered,
        header,
        frame_buf: Vec::new(),
    }))
}

#[must_use]
pub fn describe() -> IdlNode {
    let mut modes = IdlNode::keyword();
    modes.set("buffered", None);
    modes.set("upsilon2", None);
    modes.set("ws2811", None);
    IdlNode::sequence(vec![
        IdlNode::Str,
        IdlNode::integer_range(0, 0xffff),
        IdlNode::repeat(modes),
    ])
}

impl UpsilonEgress {
    /// Encodes all strand buffers and assembles header + striped body.
    /// Returns false when there is nothing to transmit.
    fn build_frame(&mut self, ctx: &EgressFlush<'_>) -> bool {
        if self.strands.is_empty() || ctx.streams.is_empty() {
            return false;
        }

        for strand in &mut self.strands {
            strand.buffer.clear();
        }

        let mut si = 0usize;
        let mut ti = 0usize;
        let mut strand_off = 0u32;
        let mut stream_off = 0u32;
        let mut led_off = ctx.offset as usize;
        let mut u2_index = 0u8;

        while si < self.strands.len() && ti < ctx.streams.len() {
            let strand = &mut self.strands[si];
            let segment = &ctx.streams[ti];
            let count =
                (u32::from(strand.count) - strand_off).min(segment.count - stream_off);

            match strand.mode {
                StrandMode::Ws2811 => {
                    for i in led_off..led_off + count as usize {
                        let led = ctx.leds.get(i).copied().unwrap_or(Led::BLACK);
                        segment.encoding.encode(led, &mut strand.buffer);
                    }
                }
                StrandMode::Upsilon2 => {
                    let mut uart = UartEncoder::new(&mut strand.buffer);
                    for _ in 0..20 {
                        uart.add_frame(0x80);
                    }
                    for i in led_off..led_off + count as usize {
                        let led = ctx.leds.get(i).copied().unwrap_or(Led::BLACK);
                        uart.add_frame(u2_index);
                        u2_index = u2_index.wrapping_add(1);
                        for v in [led.r, led.g, led.b] {
                            let pwm = (65535.0 * clamp01(v)) as u32;
                            uart.add_frame((pwm >> 8) as u8);
                            uart.add_frame(pwm as u8);
                            uart.add_frame(0xff);
                        }
                        uart.flush();
                    }
                    uart.add_frame(0x88);
                    uart.flush();
                    uart.add_idle(64);
                }
            }

            if count + strand_off >= u32::from(strand.count) {
                si += 1;
                strand_off = 0;
                u2_index = 0;
            } else {
                strand_off += count;
            }
            if count + stream_off >= segment.count {
                ti += 1;
                stream_off = 0;
            } else {
                stream_off += count;
            }
            led_off += count as usize;
        }

        // strand table and body size
        let mut total = COMMAND_HEADER;
        for strand in &self.strands {
            total += strand.buffer.len();
            let mut entry = strand.buffer.len() as u16;
            if strand.mode == StrandMode::Upsilon2 {
                entry |= 0x8000;
            }
            let at = 6 + strand.index * 2;
            if at + 1 < self.header.len() {
                self.header[at] = (entry >> 8) as u8;
                self.header[at + 1] = entry as u8;
            }
        }

        // round-robin byte interleave of all strands
        self.frame_buf.clear();
        self.frame_buf.resize(total, 0);
        let mut pos = COMMAND_HEADER;
        let mut round = 0usize;
        while pos < total {
            for strand in &self.strands {
                if let Some(&byte) = strand.buffer.get(round) {
                    self.frame_buf[pos] = byte;
                    pos += 1;
                }
            }
            round += 1;
        }
        true
    }

    fn send(&self, buf: &[u8]) {
        if let Some(socket) = &self.socket {
            if let Err(e) = socket.send_to(buf, self.addr) {
                if e.kind() != std::io::ErrorKind::WouldBlock {
                    log::trace!("upsilon send failed: {e}");
                }
            }
        }
    }
}

impl EgressBehavior for UpsilonEgress {
    fn flush(&mut self, ctx: &EgressFlush<'_>) {
        if !self.build_frame(ctx) {
            return;
        }

        // start the frame
        self.send(&self.header);

        let total = self.frame_buf.len();
        if !self.buffered {
            // streaming: one extra padding byte ahead of the body
            let mut ib = COMMAND_HEADER - 1;
            while ib < total {
                let cb_msg = CHUNK.min(total - ib);
                self.frame_buf[ib - 1] = 0x52;
                self.send(&self.frame_buf[ib - 1..ib + cb_msg]);
                ib += CHUNK;
            }
        } else {
            let mut ib = COMMAND_HEADER;
            while ib < total {
                let cb_msg = CHUNK.min(total - ib);
                let busaddr = 0x2000_0000u32 + (ib - COMMAND_HEADER) as u32;
                self.frame_buf[ib - 6] = 0x42;
                self.frame_buf[ib - 5] = u8::from(ib + CHUNK >= total);
                self.frame_buf[ib - 4..ib].copy_from_slice(&busaddr.to_be_bytes());
                self.send(&self.frame_buf[ib - 6..ib + cb_msg]);
                ib += CHUNK;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Encoding, StreamSegment};

    fn ws_strand(count: u16, index: usize) -> Strand {
        Strand { mode: StrandMode::Ws2811, count, index, buffer: Vec::new() }
    }

    fn egress(strands: Vec<Strand>) -> UpsilonEgress {
        let mut header = vec![0u8; COMMAND_HEADER + 80 * 2];
        header[0] = 0x42;
        header[2] = 0x01;
        UpsilonEgress {
            addr: "127.0.0.1:9".parse().expect("addr"),
            socket: None,
            strands,
            buffered: false,
            header,
            frame_buf: Vec::new(),
        }
    }

    #[test]
    fn uart_encoder_frames_bits_lsb_first() {
        let mut out = Vec::new();
        let mut uart = UartEncoder::new(&mut out);
        uart.add_frame(0x00);
        uart.flush();
        // start 0, eight 0 bits, stop 1 => 0000 0000 0111 1111 (idle padded)
        assert_eq!(out, vec![0x00, 0x7f]);

        let mut out = Vec::new();
        let mut uart = UartEncoder::new(&mut out);
        uart.add_frame(0x01);
        uart.flush();
        // start 0, then LSB-first data 1000 0000, stop 1
        assert_eq!(out, vec![0b0100_0000, 0b0111_1111]);
    }

    #[test]
    fn uart_strand_size_matches_wire_budget() {
        let mut out = Vec::new();
        {
            let mut uart = UartEncoder::new(&mut out);
            for _ in 0..20 {
                uart.add_frame(0x80);
            }
            for _ in 0..3 {
                uart.add_frame(0x00);
                for _ in 0..3 {
                    uart.add_frame(0x00);
                    uart.add_frame(0x00);
                    uart.add_frame(0xff);
                }
                uart.flush();
            }
            uart.add_frame(0x88);
            uart.flush();
            uart.add_idle(64);
        }
        // 13 bytes per pixel plus 33 + 2 bytes of framing
        assert_eq!(out.len(), 13 * 3 + 33 + 2);
    }

    #[test]
    fn striping_interleaves_round_robin() {
        let mut e = egress(vec![ws_strand(2, 0), ws_strand(2, 1)]);
        let rgb8 = Encoding::parse("rgb8").expect("encoding");
        let leds = vec![
            crate::color::Led::new(1.0, 0.0, 0.0),
            crate::color::Led::new(0.0, 1.0, 0.0),
            crate::color::Led::new(0.0, 0.0, 1.0),
            crate::color::Led::new(1.0, 1.0, 1.0),
        ];
        let ctx = EgressFlush {
            leds: &leds,
            offset: 0,
            count: 4,
            streams: &[StreamSegment { encoding: rgb8, count: 4 }],
        };
        assert!(e.build_frame(&ctx));

        // strand 0 carries pixels 0..2, strand 1 pixels 2..4
        assert_eq!(e.strands[0].buffer, vec![255, 0, 0, 0, 255, 0]);
        assert_eq!(e.strands[1].buffer, vec![0, 0, 255, 255, 255, 255]);

        // strand table entries: 6 bytes each, WS2811 mode
        assert_eq!(&e.header[6..8], &[0x00, 0x06]);
        assert_eq!(&e.header[8..10], &[0x00, 0x06]);

        // body: byte-interleave of both strand buffers
        let body = &e.frame_buf[COMMAND_HEADER..];
        assert_eq!(body, &[255, 0, 0, 0, 0, 255, 0, 255, 255, 255, 0, 255]);
    }
}
