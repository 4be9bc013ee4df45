/// Line-shift compensation for inserted or removed lines.
///
/// Every line `>= threshold` becomes `line + shift`; lines below the threshold are kept.
/// Order and duplicates are preserved. Results that would fall below line 1 are dropped.
pub fn compensate(lines: &[u32], threshold: u32, shift: i32) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|&line| {
            if line < threshold {
                return Some(line);
            }
            let shifted = i64::from(line) + i64::from(shift);
            (shifted >= 1).then(|| shifted as u32)
        })
        .collect()
}

/// Shift one line; `None` if it would leave the file.
pub fn compensate_line(line: u32, threshold: u32, shift: i32) -> Option<u32> {
    compensate(&[line], threshold, shift).first().copied()
}
