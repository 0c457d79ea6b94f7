// Headless launcher: boots the machine from a ROM image and exposes the
// request surface as a tiny line-oriented console. The graphical shell
// lives elsewhere; this binary exists for smoke-testing ROMs and
// debugging over a terminal.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use log::error;

use vector06c::hardware::request::Request;
use vector06c::{Hardware, HardwareConfig, Reply};

fn usage() -> ! {
    eprintln!("usage: vector06c <boot-rom> [--ram-disk <path>] [--keep-ram-disk]");
    std::process::exit(2);
}

fn parse_args() -> HardwareConfig {
    let mut args = std::env::args().skip(1);
    let mut config = HardwareConfig::default();
    let mut boot: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ram-disk" => match args.next() {
                Some(p) => config.ram_disk_data_path = Some(PathBuf::from(p)),
                None => usage(),
            },
            "--keep-ram-disk" => config.ram_disk_clear_after_restart = false,
            "--help" | "-h" => usage(),
            _ if boot.is_none() => boot = Some(PathBuf::from(arg)),
            _ => usage(),
        }
    }

    match boot {
        Some(p) => {
            config.boot_data_path = p;
            config
        }
        None => usage(),
    }
}

fn print_reply(reply: &Reply) {
    match serde_json::to_string(reply) {
        Ok(s) => println!("{s}"),
        Err(e) => println!("<unprintable reply: {e}>"),
    }
}

fn main() {
    env_logger::init();
    let config = parse_args();

    let hardware = match Hardware::new(config) {
        Ok(hw) => hw,
        Err(e) => {
            error!("cannot start hardware: {e}");
            std::process::exit(1);
        }
    };

    print_reply(&hardware.request(Request::Run));
    println!("commands: run stop step frame regs display reset quit, or raw JSON requests");

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();

        let reply = match line {
            "" => continue,
            "quit" | "exit" => {
                hardware.request(Request::Exit);
                break;
            }
            "run" => hardware.request(Request::Run),
            "stop" => hardware.request(Request::Stop),
            "step" => hardware.request(Request::ExecuteInstr { count: None }),
            "frame" => hardware.request(Request::ExecuteFrame),
            "regs" => hardware.request(Request::GetRegs),
            "display" => hardware.request(Request::GetDisplayData),
            "reset" => hardware.request(Request::Reset),
            raw => match serde_json::from_str(raw) {
                Ok(json) => hardware.request_json(&json),
                Err(e) => Reply::error(format!("not a command or JSON request: {e}")),
            },
        };
        print_reply(&reply);
    }
}
