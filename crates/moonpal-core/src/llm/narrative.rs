//! Local companion narrative used whenever a text vendor cannot answer.

/// Canned companionship phrases, calmest first.
pub const PRESENCE_PHRASES: [&str; 6] = [
    "我在这里，陪你。",
    "夜深了，我陪着你。",
    "别怕，我在这里。",
    "我一直在。",
    "有我在。",
    "我陪着你呢。",
];

/// Deterministic fallback: phrase `floor(energy * 5)` (clamped to the list), plus an
/// acknowledgement quoting the magic note verbatim when one is given. No I/O.
pub fn fallback_narrative(energy: f64, magic_note: Option<&str>) -> String {
    let last = PRESENCE_PHRASES.len() - 1;
    let raw = (energy * last as f64).floor();
    // NaN casts to 0.
    let index = (raw as i64).clamp(0, last as i64) as usize;
    let base = PRESENCE_PHRASES[index];
    match magic_note.filter(|n| !n.trim().is_empty()) {
        Some(note) => format!("{} 关于「{}」，我记得的。", base, note),
        None => base.to_string(),
    }
}
