/// Returns at most `max` bytes of `s`, cut back to a char boundary.
///
/// Used to keep error bodies from remote servers short in logs.
pub fn excerpt(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
