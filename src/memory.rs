// I/O Ports (FF00-FF7F) are reached by the CPU through this trait. The link port only owns two of them:
// FF01 - SB - Serial transfer data (R/W)
// FF02 - SC - Serial Transfer Control (R/W)
//
// See: http://bgb.bircd.org/pandocs.htm#serialdatatransferlinkcable
pub trait Memory {
    fn get(&self, a: u16) -> u8;

    fn set(&mut self, a: u16, v: u8);
}
