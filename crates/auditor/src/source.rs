//! Lexical helpers over handler source text.

/// Replaces comment bodies with spaces, keeping string literals and line breaks.
#[must_use]
pub fn strip_comments(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(character) = chars.next() {
        if let Some(open) = quote {
            output.push(character);
            if character == '\\' {
                if let Some(escaped) = chars.next() {
                    output.push(escaped);
                }
            } else if character == open {
                quote = None;
            }
            continue;
        }

        match character {
            '"' | '\'' | '`' => {
                quote = Some(character);
                output.push(character);
            }
            '/' if chars.peek() == Some(&'/') => {
                output.push(' ');
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    output.push(blank(next));
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                output.push(' ');
                if let Some(star) = chars.next() {
                    output.push(blank(star));
                }
                let mut previous = ' ';
                for next in chars.by_ref() {
                    output.push(blank(next));
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            _ => output.push(character),
        }
    }

    output
}

/// Blanks the contents of string literals, keeping quotes, byte offsets and line breaks.
///
/// Expects comment-free text from [`strip_comments`].
#[must_use]
pub fn mask_strings(code: &str) -> String {
    let mut output = String::with_capacity(code.len());
    let mut chars = code.chars();
    let mut quote: Option<char> = None;

    while let Some(character) = chars.next() {
        match quote {
            Some(open) if character == open => {
                quote = None;
                output.push(character);
            }
            Some(_) => {
                push_blank(&mut output, character);
                if character == '\\'
                    && let Some(escaped) = chars.next()
                {
                    push_blank(&mut output, escaped);
                }
            }
            None => {
                if matches!(character, '"' | '\'' | '`') {
                    quote = Some(character);
                }
                output.push(character);
            }
        }
    }

    output
}

fn push_blank(output: &mut String, character: char) {
    if character == '\n' {
        output.push('\n');
    } else {
        output.extend(std::iter::repeat_n(' ', character.len_utf8()));
    }
}

fn blank(character: char) -> char {
    if character == '\n' { '\n' } else { ' ' }
}

/// Returns the top-level arguments of the call whose `(` sits at `open_paren`.
///
/// Nested brackets and string literals are skipped; returns `None` when the
/// call is not closed.
#[must_use]
pub fn call_arguments(text: &str, open_paren: usize) -> Option<Vec<&str>> {
    let bytes = text.as_bytes();
    if bytes.get(open_paren) != Some(&b'(') {
        return None;
    }

    let mut depth = 0_usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut start = open_paren + 1;
    let mut arguments = Vec::new();

    for (index, &byte) in bytes.iter().enumerate().skip(open_paren) {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == open {
                quote = None;
            }
            continue;
        }

        match byte {
            b'"' | b'\'' | b'`' => quote = Some(byte),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    push_argument(&mut arguments, &text[start..index]);
                    return Some(arguments);
                }
            }
            b',' if depth == 1 => {
                push_argument(&mut arguments, &text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    None
}

fn push_argument<'a>(arguments: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        arguments.push(trimmed);
    }
}

/// Returns the content of a plain string literal argument.
#[must_use]
pub fn string_literal(argument: &str) -> Option<&str> {
    let argument = argument.trim();
    let first = argument.chars().next()?;
    if !matches!(first, '"' | '\'' | '`') || argument.len() < 2 || !argument.ends_with(first) {
        return None;
    }

    let inner = &argument[1..argument.len() - 1];
    if inner.contains(first) || inner.contains("${") {
        return None;
    }

    Some(inner)
}
