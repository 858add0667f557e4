/// Joins URL parts with exactly one `/` between each.
///
/// Empty parts are skipped and every kept part has its leading and trailing
/// slashes stripped, so `build_url(["https://host/", "/api/", "x"])` gives
/// `https://host/api/x`. The scheme separator survives because only the
/// ends of each part are trimmed.
pub fn build_url<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        let trimmed = part.as_ref().trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(trimmed);
    }
    out
}
