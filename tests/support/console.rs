// Minimal client-side helpers for talking to cachegate's console port the
// way a real console would: write a plain command line, read back the
// 13-byte status header plus body.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

pub fn send_command(stream: &mut TcpStream, line: &str) {
    let full = format!("{}\n", line);
    stream.write_all(full.as_bytes()).expect("writing command");
    stream.flush().expect("flushing command");
}

pub fn read_response(reader: &mut BufReader<TcpStream>) -> (u32, String) {
    let mut header = String::new();
    reader.read_line(&mut header).expect("reading response header");
    let header = header.trim_end();
    let mut parts = header.split_whitespace();
    let status: u32 = parts.next().expect("status code").parse().expect("status code is a number");
    let len: usize = parts.next().expect("body length").parse().expect("body length is a number");

    let mut body = vec![0u8; len];
    std::io::Read::read_exact(reader, &mut body).expect("reading response body");
    let mut trailer = [0u8; 1];
    std::io::Read::read_exact(reader, &mut trailer).expect("reading response trailer newline");

    (status, String::from_utf8_lossy(&body).to_string())
}
