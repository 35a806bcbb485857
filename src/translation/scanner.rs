#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Bracketed,
    Backticked,
    LineComment,
    BlockComment(u32),
}

pub(super) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub(super) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// End of the identifier starting at `start`, or `None` if there is none.
pub(super) fn scan_ident(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes.get(start).copied().is_some_and(is_ident_start) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && is_ident_byte(bytes[idx]) {
        idx += 1;
    }
    Some(idx)
}

/// Advance past a quoted region closed by `close`, where a doubled `close` is an escape.
/// Returns the next state and how many extra bytes were consumed.
pub(super) fn quoted(bytes: &[u8], idx: usize, close: u8, current: State) -> (State, usize) {
    if bytes[idx] != close {
        return (current, 0);
    }
    if bytes.get(idx + 1) == Some(&close) {
        (current, 1)
    } else {
        (State::Normal, 0)
    }
}
