//! Envelope and hex dump display for the listener

use crate::broker::Envelope;
use std::io::{self, Write};

/// Bytes per dump line.
pub const LINE_LENGTH: usize = 16;

/// Write a delivery header followed by a hex dump of the body.
pub fn print_envelope<W: Write>(envelope: &Envelope, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "Delivery {}, exchange {}, routing key {}",
        envelope.delivery_tag, envelope.exchange, envelope.routing_key
    )?;
    if let Some(content_type) = &envelope.content_type {
        writeln!(out, "Content-type: {content_type}")?;
    }
    writeln!(out, "----")?;
    dump(&envelope.body, out)
}

/// Hex dump, 16 bytes per line, followed by a blank line.
///
/// Each line is `SSSS:EEEE ` (start and end offsets in hex), the bytes as
/// two-digit hex, padding for a short final line, then the printable ASCII
/// rendering with `.` for anything else.
pub fn dump<W: Write>(data: &[u8], out: &mut W) -> io::Result<()> {
    for (line, chunk) in data.chunks(LINE_LENGTH).enumerate() {
        let begin = line * LINE_LENGTH;
        let end = begin + chunk.len() - 1;
        write!(out, "{begin:04x}:{end:04x} ")?;

        let mut printable = [b' '; LINE_LENGTH];
        for (slot, &byte) in printable.iter_mut().zip(chunk) {
            write!(out, "{byte:02x} ")?;
            *slot = if byte == b' ' || byte.is_ascii_graphic() {
                byte
            } else {
                b'.'
            };
        }
        for _ in chunk.len()..LINE_LENGTH {
            out.write_all(b"   ")?;
        }
        out.write_all(&printable)?;
        out.write_all(b"\n")?;
    }
    out.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump_string(data: &[u8]) -> String {
        let mut out = Vec::new();
        dump(data, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_full_line() {
        let data: Vec<u8> = (0x40..0x50).collect();
        assert_eq!(
            dump_string(&data),
            "0000:000f 40 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f @ABCDEFGHIJKLMNO\n\n"
        );
    }

    #[test]
    fn test_partial_line_is_padded() {
        let out = dump_string(b"Hi\x00");
        let expected = format!("0000:0002 48 69 00 {}Hi.{}\n\n", "   ".repeat(13), " ".repeat(13));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_offsets_on_later_lines() {
        let data = vec![0xffu8; 20];
        let out = dump_string(&data);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0000:000f ff "));
        assert!(lines[1].starts_with("0010:0013 ff ff ff ff "));
        let tail = format!("ff {}....", "   ".repeat(12));
        assert!(lines[1].trim_end().ends_with(&tail));
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(dump_string(&[]), "\n");
    }

    #[test]
    fn test_print_envelope() {
        let envelope = Envelope {
            delivery_tag: 7,
            exchange: "amq.direct".to_string(),
            routing_key: "load".to_string(),
            content_type: Some("application/octet-stream".to_string()),
            body: b"ok".to_vec(),
        };
        let mut out = Vec::new();
        print_envelope(&envelope, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(
            "Delivery 7, exchange amq.direct, routing key load\n\
             Content-type: application/octet-stream\n\
             ----\n\
             0000:0001 6f 6b "
        ));
    }
}
