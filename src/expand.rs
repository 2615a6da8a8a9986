//! Alias and variable substitution, applied to a sub-command before
//! dispatch.
//!
//! The two passes run in a fixed order: alias expansion first (on the first
//! token only, exactly once), then variable expansion inside every token.
//! Neither pass re-scans its own output, so an alias expanding to another
//! alias name is not expanded again and a variable value containing `$` is
//! taken literally.

use crate::alias::AliasStore;
use crate::env::Environment;
use crate::lexer;

/// Expand a leading alias, re-tokenizing the sub-command once.
///
/// If the first token names an alias, it is replaced by the alias value and
/// the whole sub-command is split again, so a multi-word value contributes
/// multiple tokens. The replacement is never applied transitively.
pub fn expand_alias_once(tokens: Vec<String>, aliases: &AliasStore) -> Vec<String> {
    let value = match tokens.first().and_then(|first| aliases.get(first)) {
        Some(value) => value,
        None => return tokens,
    };
    let mut line = value.to_string();
    for arg in &tokens[1..] {
        line.push(' ');
        line.push_str(arg);
    }
    lexer::split_tokens(&line, lexer::WHITESPACE)
}

/// Expand `$?`, `$$` and `$NAME` references inside every token, in place.
pub fn expand_variables(tokens: &mut [String], last_status: i32, env: &Environment) {
    for token in tokens.iter_mut() {
        if token.contains('$') {
            *token = expand_token(token, last_status, env);
        }
    }
}

/// Single left-to-right pass over one token.
///
/// `$?` becomes the last exit status, `$$` the shell's pid, and `$NAME` (the
/// longest `[A-Za-z_][A-Za-z0-9_]*` run after the `$`) the environment value
/// for `NAME`, or nothing when unset. A `$` not followed by any of these
/// stays literal. Expanded text is not re-scanned.
fn expand_token(token: &str, last_status: i32, env: &Environment) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some((_, '?')) => {
                chars.next();
                out.push_str(&last_status.to_string());
            }
            Some((_, '$')) => {
                chars.next();
                out.push_str(&std::process::id().to_string());
            }
            Some((start, c2)) if c2.is_ascii_alphabetic() || c2 == '_' => {
                let mut end = start + c2.len_utf8();
                chars.next();
                while let Some(&(i, c3)) = chars.peek() {
                    if c3.is_ascii_alphanumeric() || c3 == '_' {
                        end = i + c3.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(value) = env.get_var(&token[start..end]) {
                    out.push_str(&value);
                }
            }
            _ => out.push('$'),
        }
    }
    out
}
