//! Text sanitizing for the draw path
//!
//! Embedded and standard fonts are drawn with a single-byte encoding, so
//! anything outside printable ASCII is substituted before it reaches a draw
//! call.

use std::borrow::Cow;

const SUBSTITUTIONS: &[(char, &str)] = &[
    ('\u{2714}', "v"),   // heavy check mark
    ('\u{2713}', "v"),   // check mark
    ('\u{2717}', "x"),   // ballot x
    ('\u{2718}', "x"),   // heavy ballot x
    ('\u{2192}', "->"),
    ('\u{2190}', "<-"),
    ('\u{21D2}', "=>"),
    ('\u{21D0}', "<="),
    ('\u{2194}', "<->"),
    ('\u{2248}', "~"),
    ('\u{2260}', "!="),
    ('\u{2264}', "<="),
    ('\u{2265}', ">="),
    ('\u{00B1}', "+/-"),
    ('\u{00D7}', "x"),
    ('\u{2026}', "..."),
    ('\u{2022}', "*"),
    ('\u{00B7}', "."),
    ('\u{2122}', "(TM)"),
    ('\u{00AE}', "(R)"),
    ('\u{00A9}', "(C)"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{00A0}', " "),
    ('\t', " "),
];

/// Map `text` onto printable ASCII.
///
/// Known symbols get their ASCII spelling, everything else unprintable
/// becomes `?`. Borrows when nothing needs replacing.
pub fn sanitize_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_printable_ascii) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_printable_ascii(c) {
            out.push(c);
        } else if let Some((_, replacement)) = SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            out.push_str(replacement);
        } else {
            out.push('?');
        }
    }
    Cow::Owned(out)
}

fn is_printable_ascii(c: char) -> bool {
    (' '..='~').contains(&c)
}
