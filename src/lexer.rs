//! Line tokenization for the shell's quoting-free grammar.
//!
//! A line is split into non-empty tokens on a configurable delimiter set.
//! There is no quoting and no escaping, so tokenization is a plain field
//! split; the interesting pre-processing step is [`strip_comment`], which
//! removes a trailing `#` comment before the line reaches the chain scanner.

/// The default delimiter set used for argument splitting.
pub const WHITESPACE: &str = " \t\r\n";

/// Split `line` into owned, non-empty tokens on any character of `delims`.
///
/// A line consisting only of delimiters yields an empty vector. The same
/// routine serves argument splitting (with [`WHITESPACE`]) and any caller
/// that needs an alternate single-character delimiter.
pub fn split_tokens(line: &str, delims: &str) -> Vec<String> {
    line.split(|c: char| delims.contains(c))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip a `#` comment from `line`.
///
/// A `#` starts a comment only at the beginning of the line or when preceded
/// by whitespace, so `make#all` stays intact while `make #all` becomes
/// `make `. Returns the prefix of `line` before the comment.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}
