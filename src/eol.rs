//! EOL Normalizer (§4.B): applies SVN's `svn:eol-style` semantics to file
//! bytes before they are hashed as a blob. Keyword expansion (`svn:keywords`)
//! is deliberately never applied here — the normalized bytes are what SVN
//! stores, not what a working copy's keyword-substituted view would show.

/// The resolved `svn:eol-style` property value for one file, as collected
/// from that file's own properties (directory properties are never
/// inherited for EOL purposes — see §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EolStyle {
    /// Property absent.
    #[default]
    Absent,
    Binary,
    Native,
    Lf,
    CrLf,
    Cr,
}

impl EolStyle {
    pub fn from_property_value(value: Option<&str>) -> Self {
        match value {
            None => EolStyle::Absent,
            Some("binary") => EolStyle::Binary,
            Some("native") => EolStyle::Native,
            Some("LF") => EolStyle::Lf,
            Some("CRLF") => EolStyle::CrLf,
            Some("CR") => EolStyle::Cr,
            // Unrecognized values are treated like absent/binary: pass
            // through unchanged rather than guessing.
            Some(_) => EolStyle::Binary,
        }
    }
}

/// Normalizes `content` for storage according to `style`. Total: never
/// fails, binary content passes through untouched.
pub fn normalize(content: &[u8], style: EolStyle) -> Vec<u8> {
    match style {
        EolStyle::Absent | EolStyle::Binary => content.to_vec(),
        EolStyle::Native | EolStyle::Lf => to_lf(content),
        EolStyle::CrLf => to_eol(content, b"\r\n"),
        EolStyle::Cr => to_eol(content, b"\r"),
    }
}

/// Converts all line endings (CRLF, lone CR, or LF) to a single LF.
fn to_lf(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'\r' => {
                out.push(b'\n');
                if content.get(i + 1) == Some(&b'\n') {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            b'\n' => {
                out.push(b'\n');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Normalizes to LF first, then re-expands every LF to `eol`.
fn to_eol(content: &[u8], eol: &[u8]) -> Vec<u8> {
    let lf = to_lf(content);
    let mut out = Vec::with_capacity(lf.len() + lf.len() / 8);
    for &b in &lf {
        if b == b'\n' {
            out.extend_from_slice(eol);
        } else {
            out.push(b);
        }
    }
    out
}
