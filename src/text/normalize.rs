/// Separator used by `key_for`. Never survives `normalize`, so two different
/// (app, flow) pairs can't collide once joined.
pub const KEY_SEPARATOR: char = '|';

/// Canonicalize free-form app/flow text into a stable lookup form.
///
/// Lowercases, turns runs of `.`, `_` and `-` into a single space, drops every
/// character outside `[a-z0-9 ]`, collapses whitespace and trims.
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();

    let mut spaced = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            '.' | '_' | '-' => spaced.push(' '),
            c if c.is_whitespace() => spaced.push(' '),
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => spaced.push(c),
            _ => {}
        }
    }

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Alias-table key for an (app, flow) pair.
pub fn key_for(app: &str, flow: &str) -> String {
    format!("{}{}{}", normalize(app), KEY_SEPARATOR, normalize(flow))
}

/// Best-effort split of free text like "duolingo onboarding" into (app, flow).
///
/// Everything up to the last word is the app, the last word is the flow.
/// Multi-word flows get mis-split ("spotify browse music" -> app "spotify browse").
/// Returns `None` when the normalized text has fewer than two words.
pub fn split_free_text(text: &str) -> Option<(String, String)> {
    let normalized = normalize(text);
    let (app, flow) = normalized.rsplit_once(' ')?;
    Some((app.to_string(), flow.to_string()))
}
