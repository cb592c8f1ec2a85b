//! Hex dump formatting for command responses

/// Format `memory` as a hex dump, 16 bytes per row.
///
/// Runs of all-zero or all-0xff rows are collapsed into a single `...` line.
pub fn hexdump(memory: &[u8]) -> String {
    let mut out = String::new();
    let mut all_zero = 0;
    let mut all_one = 0;

    for (row, line) in memory.chunks(16).enumerate() {
        if line.iter().all(|&b| b == 0) {
            all_zero += 1;
        } else {
            all_zero = 0;
        }
        if line.iter().all(|&b| b == 0xff) {
            all_one += 1;
        } else {
            all_one = 0;
        }

        if all_zero < 2 && all_one < 2 {
            out.push_str(&format!("{:08x}:", row * 16));
            for j in 0..16 {
                match line.get(j) {
                    Some(b) => out.push_str(&format!(" {:02x}", b)),
                    None => out.push_str("   "),
                }
            }
            out.push_str("  ");
            for &c in line {
                out.push(if c.is_ascii_graphic() || c == b' ' {
                    c as char
                } else {
                    '.'
                });
            }
            out.push('\n');
        } else if all_zero == 2 || all_one == 2 {
            out.push_str("...\n");
        }
    }

    out
}
