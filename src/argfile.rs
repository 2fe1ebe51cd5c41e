//! ArgumentFileBuilder: writes `protoc` and JVM argument files with the
//! correct quoting for each consumer.
//!
//! `protoc`'s own argument-file parser takes one literal token per line with
//! no escaping at all (§6: "UTF-8 encoding, LF line terminator... no
//! quoting, no escaping"). The JVM launcher used by [`crate::plugin_resolver`]
//! for JVM-packaged plugins needs the usual `@argfile` quoting rules instead,
//! since a bare token containing whitespace would otherwise be split.

use std::path::Path;

use crate::error::{Error, IoResultExt, Result};

/// Accumulates tokens (flags, paths) in order and writes them to a
/// newline-delimited argument file.
#[derive(Debug, Default, Clone)]
pub struct ArgumentFileBuilder {
    tokens: Vec<String>,
}

impl ArgumentFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: impl Into<String>) -> &mut Self {
        self.tokens.push(token.into());
        self
    }

    pub fn extend(&mut self, tokens: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Writes a `protoc`-compatible argument file: one literal token per
    /// line, UTF-8, LF terminators, no blank lines.
    pub fn write_protoc_argfile(&self, path: &Path) -> Result<()> {
        write_tokens(path, &self.tokens, Quoting::Literal)
    }

    /// Writes a Java-launcher-compatible `@argfile`: tokens containing
    /// whitespace or quotes are double-quoted, with `\` and `"` escaped.
    pub fn write_java_argfile(&self, path: &Path) -> Result<()> {
        write_tokens(path, &self.tokens, Quoting::JavaStyle)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Literal,
    JavaStyle,
}

fn write_tokens(path: &Path, tokens: &[String], quoting: Quoting) -> Result<()> {
    for token in tokens {
        if token.is_empty() {
            return Err(Error::invalid("argument file tokens must not be blank"));
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).path_ctx(parent)?;
    }
    let mut body = String::new();
    for token in tokens {
        match quoting {
            Quoting::Literal => body.push_str(token),
            Quoting::JavaStyle => body.push_str(&java_quote(token)),
        }
        body.push('\n');
    }
    std::fs::write(path, body).path_ctx(path)
}

fn java_quote(token: &str) -> String {
    if token.chars().any(|c| c.is_whitespace() || c == '"') {
        let mut out = String::with_capacity(token.len() + 2);
        out.push('"');
        for c in token.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protoc_argfile_is_literal_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.txt");
        let mut builder = ArgumentFileBuilder::new();
        builder.push("--fatal_warnings").push("--java_out=out").push("src/a.proto");
        builder.write_protoc_argfile(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "--fatal_warnings\n--java_out=out\nsrc/a.proto\n");
    }

    #[test]
    fn blank_tokens_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.txt");
        let mut builder = ArgumentFileBuilder::new();
        builder.push("");
        assert!(builder.write_protoc_argfile(&path).is_err());
    }

    #[test]
    fn java_argfile_quotes_whitespace_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jvm.args");
        let mut builder = ArgumentFileBuilder::new();
        builder.push("-classpath").push("a b/c.jar").push("com.example.Main");
        builder.write_java_argfile(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "-classpath\n\"a b/c.jar\"\ncom.example.Main\n");
    }
}
