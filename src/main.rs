// Two emulators wired together with a link cable. Start one side with `-m` (master, internal clock) and the other
// without (slave, external clock), with the local and peer ports crossed:
//
//   $ gblink --local-port 8888 --peer-port 8889
//   $ gblink --local-port 8889 --peer-port 8888 -m
use gblink::clock::{Clock, BYTE_PERIOD, CPU_FREQUENCY};
use gblink::config::LinkConfig;
use gblink::memory::Memory;
use gblink::register::DISCONNECTED;
use gblink::serial::Serial;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn main() {
    rog::reg("gblink::config");
    rog::reg("gblink::link");
    rog::reg("gblink::serial");

    let mut c_local_host = String::from("127.0.0.1");
    let mut c_local_port: u16 = 8888;
    let mut c_peer_host = String::from("127.0.0.1");
    let mut c_peer_port: u16 = 8889;
    let mut c_master = false;
    let mut c_byte: u8 = 0x00;
    let mut c_count: u32 = 16;
    let mut c_timeout: u64 = 1000;
    {
        let mut ap = argparse::ArgumentParser::new();
        ap.set_description("Gameboy link cable over TCP");
        ap.refer(&mut c_local_host)
            .add_option(&["--local-host"], argparse::Store, "Address to listen on");
        ap.refer(&mut c_local_port)
            .add_option(&["--local-port"], argparse::Store, "Port to listen on");
        ap.refer(&mut c_peer_host)
            .add_option(&["--peer-host"], argparse::Store, "Address of the other console");
        ap.refer(&mut c_peer_port)
            .add_option(&["--peer-port"], argparse::Store, "Port of the other console");
        ap.refer(&mut c_master)
            .add_option(&["-m"], argparse::StoreTrue, "Drive the clock (master)");
        ap.refer(&mut c_byte)
            .add_option(&["-b"], argparse::Store, "First byte to send");
        ap.refer(&mut c_count)
            .add_option(&["-n"], argparse::Store, "Number of bytes to exchange");
        ap.refer(&mut c_timeout)
            .add_option(&["-t"], argparse::Store, "Connect and I/O timeout in milliseconds");
        ap.parse_args_or_exit();
    }

    let config = LinkConfig::resolve(&c_local_host, c_local_port, &c_peer_host, c_peer_port)
        .with_timeout(Duration::from_millis(c_timeout.max(1)));
    let (completed, received) = mpsc::sync_channel(1);
    let mut serial = Serial::power_up(&config, Arc::new(Mutex::new(())), completed);
    serial.set(0xff01, c_byte);

    if c_master {
        run_master(&mut serial, c_count);
    } else {
        run_slave(&mut serial, &received, c_count);
    }
    serial.shutdown();
}

fn run_master(serial: &mut Serial, count: u32) {
    let mut clock = Clock::power_up(BYTE_PERIOD);
    let mut done = 0;
    while done < count {
        thread::sleep(Duration::from_millis(1));
        for _ in 0..clock.next(CPU_FREQUENCY / 1000) {
            let sent = serial.get(0xff01);
            serial.set(0xff02, 0x81);
            serial.transfer(clock.ticks);
            if serial.has_received() {
                serial.latch_received();
                rog::println!("{:#04x} -> {:#04x}", sent, serial.get(0xff01));
            } else if serial.get(0xff01) == DISCONNECTED {
                rog::println!("{:#04x} -> no peer", sent);
            } else {
                rog::println!("{:#04x} -> aborted", sent);
            }
            serial.clear_transfer_flag();
            serial.set(0xff01, sent.wrapping_add(1));
            done += 1;
            if done == count {
                break;
            }
        }
    }
}

fn run_slave(serial: &mut Serial, received: &Receiver<()>, count: u32) {
    if serial.local_addr().is_none() {
        rog::println!("Link port is not listening");
        return;
    }
    for _ in 0..count {
        let sent = serial.get(0xff01);
        serial.set(0xff02, 0x80);
        if received.recv().is_err() {
            break;
        }
        serial.latch_received();
        rog::println!("{:#04x} <- {:#04x}", sent, serial.get(0xff01));
        serial.clear_transfer_flag();
        serial.set(0xff01, sent.wrapping_add(1));
    }
}
