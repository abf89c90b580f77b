use base64::{engine, read};
use std::io::{Cursor, Read};
use time::OffsetDateTime;

/// Identity for a call whose webhook did not carry one.
pub fn synthesize_call_id() -> String {
    format!("call-{}", OffsetDateTime::now_utc().unix_timestamp_nanos())
}

pub fn b64_decode_to_buf(enc: &str, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut cur = Cursor::new(enc.as_bytes());
    let mut decoder = read::DecoderReader::new(&mut cur, &engine::general_purpose::STANDARD);
    decoder.read_to_end(buf)
}
