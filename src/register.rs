// The register file of the link port. It is shared by the CPU, which reads and writes SB/SC through the memory bus,
// and by the background task serving inbound exchanges, so every register is an atomic cell.
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// Value shifted in when nothing is connected to the other end of the cable.
pub const DISCONNECTED: u8 = 0xff;

// SC bit 7 - Transfer Start Flag (0=No transfer is in progress or requested, 1=Transfer in progress, or requested)
pub const TRANSFER_FLAG: u8 = 0x80;

#[derive(Default)]
pub struct Registers {
    enabled: AtomicBool,
    // SB. Before a transfer, it holds the next byte that will go out.
    data: AtomicU8,
    // SC. Bit 1 and bit 0 (clock speed, shift clock) belong to the CPU.
    control: AtomicU8,
    // The byte that arrived with the last exchange. It becomes visible in SB only after a latch.
    received: AtomicU8,
    // Set while `received` holds a byte that has not been latched yet.
    fresh: AtomicBool,
}

impl Registers {
    pub fn power_up(enabled: bool) -> Self {
        Self { enabled: AtomicBool::new(enabled), ..Self::default() }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, v: bool) {
        self.enabled.store(v, Ordering::SeqCst)
    }

    pub fn data(&self) -> u8 {
        self.data.load(Ordering::SeqCst)
    }

    pub fn set_data(&self, v: u8) {
        self.data.store(v, Ordering::SeqCst)
    }

    pub fn control(&self) -> u8 {
        self.control.load(Ordering::SeqCst)
    }

    pub fn set_control(&self, v: u8) {
        self.control.store(v, Ordering::SeqCst)
    }

    pub fn clear_transfer_flag(&self) {
        self.control.fetch_and(!TRANSFER_FLAG, Ordering::SeqCst);
    }

    pub fn received(&self) -> u8 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn stage(&self, v: u8) {
        self.received.store(v, Ordering::SeqCst);
        self.fresh.store(true, Ordering::SeqCst);
    }

    pub fn fresh(&self) -> bool {
        self.fresh.load(Ordering::SeqCst)
    }

    // SB is written before the staged byte is released, so the slave task never stages over an unlatched byte.
    pub fn latch(&self) {
        self.set_data(self.received());
        self.fresh.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_does_not_touch_data() {
        let regs = Registers::power_up(true);
        regs.set_data(0x12);
        assert!(!regs.fresh());
        regs.stage(0x34);
        assert!(regs.fresh());
        assert_eq!(regs.data(), 0x12);
        assert_eq!(regs.received(), 0x34);
        regs.latch();
        assert_eq!(regs.data(), 0x34);
        assert!(!regs.fresh());
    }

    #[test]
    fn clear_transfer_flag_keeps_clock_bits() {
        let regs = Registers::power_up(true);
        regs.set_control(0x83);
        regs.clear_transfer_flag();
        assert_eq!(regs.control(), 0x03);
        regs.clear_transfer_flag();
        assert_eq!(regs.control(), 0x03);
    }

    #[test]
    fn power_up_state() {
        let regs = Registers::power_up(false);
        assert!(!regs.enabled());
        assert_eq!(regs.data(), 0x00);
        assert_eq!(regs.control(), 0x00);
        regs.set_enabled(true);
        assert!(regs.enabled());
    }
}
