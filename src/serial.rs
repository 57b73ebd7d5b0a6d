// Communication between two Gameboys happens one byte at a time. One Gameboy acts as the master, uses its internal
// clock, and thus controls when the exchange happens. The other one uses an external clock (i.e., the one inside the
// other Gameboy) and has no control over when the transfer happens. If it hasn't gotten around to loading up the next
// data byte at the time the transfer begins, the last one will go out again.
//
// Here the cable is a TCP connection. The master side dials its peer from `transfer`, on the caller's thread. The
// slave side is always listening on a background task and reports each completed exchange on the `completed`
// channel. In both roles the incoming byte is staged and only shows up in SB after `latch_received`.
//
// See: http://gbdev.gg8.se/wiki/articles/Serial_Data_Transfer_(Link_Cable)
use super::config::LinkConfig;
use super::error::{LinkError, Result};
use super::link::{self, Frame, Listener, Slave};
use super::memory::Memory;
use super::register::{Registers, DISCONNECTED};
use std::net::SocketAddr;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Serial {
    regs: Arc<Registers>,
    local: Option<SocketAddr>,
    peer: Option<SocketAddr>,
    timeout: Duration,
    // Shared with the rest of the console, both halves of an exchange hold it while bytes are on the wire.
    exchange: Arc<Mutex<()>>,
    listener: Option<Listener>,
}

impl Serial {
    // The listener is bound once here. If binding fails the port still works as a master but never answers one.
    pub fn power_up(config: &LinkConfig, exchange: Arc<Mutex<()>>, completed: SyncSender<()>) -> Self {
        let regs = Arc::new(Registers::power_up(config.enabled));
        let listener = config.local.and_then(|local| {
            let slave = Slave::new(regs.clone(), config.is_plugged(), exchange.clone(), completed, config.timeout);
            match Listener::bind(local, slave) {
                Ok(l) => Some(l),
                Err(e) => {
                    rog::debugln!("Cannot listen on {}: {}", local, e);
                    None
                }
            }
        });
        Self { regs, local: config.local, peer: config.peer, timeout: config.timeout, exchange, listener }
    }

    pub fn data(&self) -> u8 {
        self.regs.data()
    }

    pub fn set_data(&self, v: u8) {
        self.regs.set_data(v)
    }

    pub fn control(&self) -> u8 {
        self.regs.control()
    }

    pub fn set_control(&self, v: u8) {
        self.regs.set_control(v)
    }

    pub fn clear_transfer_flag(&self) {
        self.regs.clear_transfer_flag()
    }

    // Byte staged by the last exchange, not yet visible in SB.
    pub fn received(&self) -> u8 {
        self.regs.received()
    }

    // True between an exchange that staged a byte and the next latch.
    pub fn has_received(&self) -> bool {
        self.regs.fresh()
    }

    pub fn latch_received(&self) {
        self.regs.latch()
    }

    pub fn is_enabled(&self) -> bool {
        self.regs.enabled()
    }

    pub fn set_enabled(&self, v: bool) {
        self.regs.set_enabled(v)
    }

    // Address the slave side really listens on, useful when the configured port was 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(Listener::local_addr)
    }

    pub fn pending_exchanges(&self) -> usize {
        self.listener.as_ref().map_or(0, Listener::pending)
    }

    pub fn shutdown(&mut self) {
        if let Some(mut l) = self.listener.take() {
            l.shutdown();
        }
    }

    // Clock out SB as the master. Always returns true: a missing or unreachable peer shows up as 0xff in SB, and an
    // exchange that breaks half way leaves SB as it was.
    pub fn transfer(&self, clock: u32) -> bool {
        match self.exchange_as_master(clock) {
            Ok(reply) => self.regs.stage(reply.data),
            Err(LinkError::Disabled) | Err(LinkError::Unconfigured) => self.regs.set_data(DISCONNECTED),
            Err(e @ LinkError::Connect { .. }) => {
                rog::debugln!("{}", e);
                self.regs.set_data(DISCONNECTED);
            }
            Err(e) => rog::debugln!("{}", e),
        }
        true
    }

    fn exchange_as_master(&self, clock: u32) -> Result<Frame> {
        if !self.regs.enabled() {
            return Err(LinkError::Disabled);
        }
        let peer = match (self.local, self.peer) {
            (Some(_), Some(peer)) => peer,
            _ => return Err(LinkError::Unconfigured),
        };
        let request = Frame::new(self.regs.data(), clock as u8);
        let mut stream = link::dial(peer, self.timeout)?;
        link::exchange_as_master(&mut stream, &self.exchange, request)
    }
}

impl Memory for Serial {
    fn get(&self, a: u16) -> u8 {
        match a {
            0xff01 => self.data(),
            0xff02 => self.control(),
            _ => panic!("Only supports addresses 0xff01, 0xff02"),
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        match a {
            0xff01 => self.set_data(v),
            0xff02 => self.set_control(v),
            _ => panic!("Only supports addresses 0xff01, 0xff02"),
        }
    }
}
