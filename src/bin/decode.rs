//! Decode hex-dumped RNet wire captures.
//!
//! Takes hex on the command line (or stdin, one capture per line), runs it
//! through the frame reassembler, and prints each frame with its
//! classification. Handy for poking at serial captures.
//!
//! ```text
//! cargo run --bin decode -- f000007f0000700500020200dc000100000001437f
//! ```

use std::io::BufRead;

use rnet_bridge::{packet, FrameReassembler};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if !line.trim().is_empty() => decode_capture(&line),
                Ok(_) => {}
                Err(e) => {
                    eprintln!("read error: {e}");
                    std::process::exit(1);
                }
            }
        }
    } else {
        for arg in &args {
            decode_capture(arg);
        }
    }
}

fn decode_capture(input: &str) {
    let bytes = match parse_hex(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("bad hex input: {e}");
            return;
        }
    };

    let mut reassembler = FrameReassembler::new();
    let frames = reassembler.extend(&bytes);
    if frames.is_empty() {
        eprintln!("no complete frames in {} bytes", bytes.len());
        return;
    }
    for frame in frames {
        println!("{frame:#?}");
        match packet::classify(&frame) {
            Some(packet) => println!("=> {packet:?}"),
            None => println!("=> unrecognized"),
        }
    }
}

/// Parse a hex dump, ignoring whitespace, commas, colons and `0x` prefixes.
fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let cleaned: String = input
        .replace("0x", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != ':')
        .collect();
    if cleaned.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", cleaned.len()));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| format!("invalid hex at offset {i}"))
        })
        .collect()
}
