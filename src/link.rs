// The cable between two consoles is a TCP connection per exchanged byte. Both ends speak the same two-byte frame:
//
//   byte 0 - the data byte offered by the sender (SB at the time of the exchange)
//   byte 1 - a tag. The master puts the low byte of its clock counter there, the slave echoes it back.
//
// The master dials, writes its frame and reads the reply. The slave accepts, reads the frame and writes its reply.
// There is no handshake and no length prefix; a connection carries exactly one request and one reply.
use super::error::{LinkError, Result};
use super::register::Registers;
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const FRAME_LEN: usize = 2;

// How long the slave task naps when it has nothing to do.
const IDLE: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame {
    pub data: u8,
    pub tag: u8,
}

impl Frame {
    pub fn new(data: u8, tag: u8) -> Self {
        Self { data, tag }
    }

    pub fn encode(self) -> [u8; FRAME_LEN] {
        [self.data, self.tag]
    }

    pub fn decode(buf: [u8; FRAME_LEN]) -> Self {
        Self { data: buf[0], tag: buf[1] }
    }

    // A short read is an aborted exchange, never a frame padded with zeros.
    pub fn read_from(r: &mut impl Read) -> Result<Self> {
        let mut buf = [0x00; FRAME_LEN];
        r.read_exact(&mut buf)?;
        Ok(Self::decode(buf))
    }

    pub fn write_to(self, w: &mut impl Write) -> Result<()> {
        w.write_all(&self.encode())?;
        w.flush()?;
        Ok(())
    }
}

fn deadline(stream: &TcpStream, timeout: Duration) -> Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(())
}

// Open the connection for one exchange. Every later read and write on it shares the same deadline.
pub fn dial(peer: SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&peer, timeout).map_err(|source| LinkError::Connect { peer, source })?;
    deadline(&stream, timeout)?;
    Ok(stream)
}

pub fn exchange_as_master<S: Read + Write>(stream: &mut S, exchange: &Mutex<()>, request: Frame) -> Result<Frame> {
    let _guard = exchange.lock().unwrap_or_else(PoisonError::into_inner);
    request.write_to(stream)?;
    let reply = Frame::read_from(stream)?;
    if reply.tag != request.tag {
        return Err(LinkError::TagMismatch { sent: request.tag, echoed: reply.tag });
    }
    Ok(reply)
}

// The incoming byte is staged only once the reply is out, so an aborted exchange leaves the registers alone.
pub fn serve_as_slave<S: Read + Write>(stream: &mut S, exchange: &Mutex<()>, regs: &Registers) -> Result<Frame> {
    let _guard = exchange.lock().unwrap_or_else(PoisonError::into_inner);
    let request = Frame::read_from(stream)?;
    Frame::new(regs.data(), request.tag).write_to(stream)?;
    regs.stage(request.data);
    Ok(request)
}

// Everything the background task needs to answer a master.
pub struct Slave {
    regs: Arc<Registers>,
    plugged: bool,
    exchange: Arc<Mutex<()>>,
    completed: SyncSender<()>,
    timeout: Duration,
    cancel: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
}

impl Slave {
    pub fn new(
        regs: Arc<Registers>,
        plugged: bool,
        exchange: Arc<Mutex<()>>,
        completed: SyncSender<()>,
        timeout: Duration,
    ) -> Self {
        Self {
            regs,
            plugged,
            exchange,
            completed,
            timeout,
            cancel: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn run(self, listener: TcpListener) {
        while !self.cancelled() {
            // A byte staged by the previous exchange stays put until the CPU latches it.
            if !self.plugged || !self.regs.enabled() || self.regs.fresh() {
                thread::sleep(IDLE);
                continue;
            }
            self.pending.fetch_add(1, Ordering::SeqCst);
            let accepted = listener.accept();
            if self.cancelled() {
                break;
            }
            match accepted {
                Ok((_, from)) if !self.regs.enabled() => {
                    rog::debugln!("Link port disabled, dropping {}", from);
                }
                Ok((stream, from)) => match self.serve(stream) {
                    Ok(request) => {
                        rog::debugln!("Received {:#04x} (tag {:#04x}) from {}", request.data, request.tag, from);
                        self.hand_off();
                    }
                    Err(e) => rog::debugln!("Exchange with {} aborted: {}", from, e),
                },
                Err(e) => {
                    rog::debugln!("Accept failed: {}", e);
                    thread::sleep(IDLE);
                }
            }
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        self.pending.store(0, Ordering::SeqCst);
    }

    fn serve(&self, mut stream: TcpStream) -> Result<Frame> {
        deadline(&stream, self.timeout)?;
        serve_as_slave(&mut stream, &self.exchange, &self.regs)
    }

    // At most one completion waits in the slot.
    fn hand_off(&self) {
        loop {
            match self.completed.try_send(()) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(_)) if self.cancelled() => return,
                Err(TrySendError::Full(_)) => thread::sleep(IDLE),
            }
        }
    }
}

// The listening half of the port. It lives as long as its owner and stops the background task when dropped.
pub struct Listener {
    addr: SocketAddr,
    cancel: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    pub fn bind(local: SocketAddr, slave: Slave) -> Result<Self> {
        let listener = TcpListener::bind(local)?;
        let addr = listener.local_addr()?;
        let cancel = slave.cancel.clone();
        let pending = slave.pending.clone();
        let handle = thread::Builder::new().name(format!("link {}", addr)).spawn(move || slave.run(listener))?;
        rog::debugln!("Link port listening on {}", addr);
        Ok(Self { addr, cancel, pending, handle: Some(handle) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn shutdown(&mut self) {
        let handle = match self.handle.take() {
            Some(h) => h,
            None => return,
        };
        self.cancel.store(true, Ordering::SeqCst);
        // A blocked accept only returns on a new connection.
        let _ = TcpStream::connect_timeout(&wake_addr(self.addr), Duration::from_millis(100));
        if handle.join().is_err() {
            rog::debugln!("Link task on {} panicked", self.addr);
        }
        rog::debugln!("Link port on {} closed", self.addr);
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port()),
        _ => addr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    // One end of a cable: reads come from `input`, writes land in `output`.
    struct Wire {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Wire {
        fn new(input: &[u8]) -> Self {
            Self { input: Cursor::new(input.to_vec()), output: Vec::new() }
        }
    }

    impl Read for Wire {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Wire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn frame_layout() {
        assert_eq!(Frame::new(0x42, 0x07).encode(), [0x42, 0x07]);
        assert_eq!(Frame::decode([0xab, 0xcd]), Frame::new(0xab, 0xcd));
    }

    #[test]
    fn short_frame_is_an_error() {
        let mut wire = Wire::new(&[0x42]);
        assert!(matches!(Frame::read_from(&mut wire), Err(LinkError::Io(_))));
    }

    #[test]
    fn master_sends_then_reads_reply() {
        let lock = Mutex::new(());
        let mut wire = Wire::new(&[0x99, 0x07]);
        let reply = exchange_as_master(&mut wire, &lock, Frame::new(0x42, 0x07)).unwrap();
        assert_eq!(reply, Frame::new(0x99, 0x07));
        assert_eq!(wire.output, vec![0x42, 0x07]);
    }

    #[test]
    fn master_rejects_wrong_echo() {
        let lock = Mutex::new(());
        let mut wire = Wire::new(&[0x99, 0x08]);
        let r = exchange_as_master(&mut wire, &lock, Frame::new(0x42, 0x07));
        assert!(matches!(r, Err(LinkError::TagMismatch { sent: 0x07, echoed: 0x08 })));
    }

    #[test]
    fn slave_replies_with_sb_and_echoes_tag() {
        let lock = Mutex::new(());
        let regs = Registers::power_up(true);
        regs.set_data(0x99);
        let mut wire = Wire::new(&[0x42, 0x2a]);
        let request = serve_as_slave(&mut wire, &lock, &regs).unwrap();
        assert_eq!(request, Frame::new(0x42, 0x2a));
        assert_eq!(wire.output, vec![0x99, 0x2a]);
        assert_eq!(regs.received(), 0x42);
        assert!(regs.fresh());
        assert_eq!(regs.data(), 0x99);
    }

    #[test]
    fn slave_leaves_registers_on_short_frame() {
        let lock = Mutex::new(());
        let regs = Registers::power_up(true);
        regs.set_data(0x99);
        regs.stage(0x11);
        let mut wire = Wire::new(&[0x42]);
        assert!(serve_as_slave(&mut wire, &lock, &regs).is_err());
        assert!(wire.output.is_empty());
        assert_eq!(regs.received(), 0x11);
        assert_eq!(regs.data(), 0x99);
        regs.latch();
        assert!(!regs.fresh());
    }

    #[test]
    fn wake_addr_uses_loopback_for_wildcard() {
        let any: SocketAddr = "0.0.0.0:8888".parse().unwrap();
        assert_eq!(wake_addr(any), "127.0.0.1:8888".parse::<SocketAddr>().unwrap());
        let exact: SocketAddr = "192.168.1.2:8888".parse().unwrap();
        assert_eq!(wake_addr(exact), exact);
    }
}
