// The serial port shifts one bit per pulse of its clock. With the internal clock of a DMG that is 8192Hz, so a whole
// byte goes out every 4096 CPU cycles. A master calls `transfer` once per byte tick counted here.
pub const CPU_FREQUENCY: u32 = 4_194_304;
pub const SERIAL_FREQUENCY: u32 = 8192;
pub const BYTE_PERIOD: u32 = CPU_FREQUENCY / SERIAL_FREQUENCY * 8;

pub struct Clock {
    pub period: u32,
    pub n: u32,
    // Byte ticks seen so far. Its low byte travels as the tag of the master's frame.
    pub ticks: u32,
}

impl Clock {
    pub fn power_up(period: u32) -> Self {
        Self { period, n: 0x00, ticks: 0x00 }
    }

    // Feed elapsed CPU cycles, get the number of byte ticks they complete.
    pub fn next(&mut self, cycles: u32) -> u32 {
        let n = u64::from(self.n) + u64::from(cycles);
        let period = u64::from(self.period);
        let rs = (n / period) as u32;
        self.n = (n % period) as u32;
        self.ticks = self.ticks.wrapping_add(rs);
        rs
    }
}
