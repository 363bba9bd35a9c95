use std::fmt::Write as _;

/// Render a hex dump of the given data. The `initial_offset` is what the
/// first byte of the data should be considered as, for printing of offsets.
///
/// The output looks like:
///
/// ```text
///        00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
/// 000010 01 23 45 67 89 AB CD EF 01 23 45 67 89 AB CD EF  .#Eg.....#Eg....
/// ```
#[must_use]
pub fn hex_dump(data: &[u8], initial_offset: usize) -> String {
    let mut output = String::new();
    if data.is_empty() {
        return output;
    }
    let max_offset = initial_offset + data.len() - 1;
    let offset_width = std::cmp::max(4, format!("{max_offset:X}").len());

    let _ = writeln!(
        output,
        "{} 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F",
        " ".repeat(offset_width)
    );

    let mut remaining = data;
    let mut line_offset = initial_offset - initial_offset % 16;
    while !remaining.is_empty() {
        let line_start = if line_offset < initial_offset {
            initial_offset - line_offset
        } else {
            0
        };
        let line_length = std::cmp::min(remaining.len(), 16 - line_start);
        let line_end = line_start + line_length;
        let (line, rest) = remaining.split_at(line_length);

        let hex: String = line.iter().map(|b| format!(" {b:02X}")).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if (32..=126).contains(&b) { char::from(b) } else { '.' })
            .collect();
        let _ = writeln!(
            output,
            "{line_offset:0offset_width$X}{}{hex}{}  {}{ascii}",
            "   ".repeat(line_start),
            "   ".repeat(16 - line_end),
            " ".repeat(line_start),
        );

        remaining = rest;
        line_offset += 16;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_data_renders_nothing() {
        assert_eq!(hex_dump(&[], 0), "");
    }

    #[test]
    fn single_line() {
        let dump = hex_dump(b"AB\x00", 0);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], format!("0000 41 42 00{}  AB.", "   ".repeat(13)));
    }

    #[test]
    fn unaligned_offset_pads_first_line() {
        let dump = hex_dump(&[0xFF; 3], 0x1E);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with(&format!("0010{}", "   ".repeat(14))));
        assert!(lines[2].starts_with("0020 FF"));
    }
}
