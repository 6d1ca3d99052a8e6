use super::CommandError;
use std::fmt;

/// Program plus arguments, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentList {
    parts: Vec<String>,
}

impl ArgumentList {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            parts: vec![program.into()],
        }
    }

    pub fn add(&mut self, arg: impl Into<String>) -> &mut Self {
        self.parts.push(arg.into());
        self
    }

    pub fn add_pair(&mut self, flag: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parts.push(flag.into());
        self.parts.push(value.into());
        self
    }

    pub fn add_all<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parts.extend(args.into_iter().map(Into::into));
        self
    }

    /// Splits a free-form option string the way a shell would and appends the pieces
    pub fn add_tokenized(&mut self, options: &str) -> Result<&mut Self, CommandError> {
        let tokens = tokenize(options)?;
        self.parts.extend(tokens);
        Ok(self)
    }

    pub fn program(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    /// Arguments after the program name
    pub fn args(&self) -> &[String] {
        self.parts.get(1..).unwrap_or(&[])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for ArgumentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&quote(part))?;
        }
        Ok(())
    }
}

fn quote(part: &str) -> String {
    let needs_quotes = part.is_empty()
        || part
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$'));
    if !needs_quotes {
        return part.to_string();
    }
    let escaped = part
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{}\"", escaped)
}

/// Quote-aware whitespace splitting.
///
/// Single quotes are literal, double quotes allow `\"` and `\\`, and a
/// backslash outside quotes escapes the next character.
pub fn tokenize(input: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(CommandError::UnbalancedQuote(input.to_string())),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => {
                                return Err(CommandError::UnbalancedQuote(input.to_string()))
                            }
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(CommandError::UnbalancedQuote(input.to_string())),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
