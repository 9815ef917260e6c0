//! Docblock (`/** ... */`) parsing.
//!
//! Only the tags that feed type inference and hover text are recognised:
//! `@param`, `@return`, `@var`, `@property(-read|-write)`, `@method`,
//! `@global` and `@deprecated`. Type strings are kept unresolved; callers
//! qualify them against the import table in effect at the comment.

use super::symbols::PropertyAccess;
use super::types::TypeSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocParam {
    pub name: String,
    pub types: TypeSet,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocReturn {
    pub types: TypeSet,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocVar {
    pub name: Option<String>,
    pub types: TypeSet,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocProperty {
    pub name: String,
    pub types: TypeSet,
    pub access: PropertyAccess,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocMethod {
    pub name: String,
    pub is_static: bool,
    pub return_types: TypeSet,
    pub params: Vec<DocParam>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhpDoc {
    pub description: String,
    pub params: Vec<DocParam>,
    pub returns: Option<DocReturn>,
    pub vars: Vec<DocVar>,
    pub properties: Vec<DocProperty>,
    pub methods: Vec<DocMethod>,
    pub globals: Vec<DocParam>,
    pub deprecated: Option<String>,
}

impl PhpDoc {
    /// Parses a docblock comment. Anything not starting with `/**` is not a
    /// docblock and yields `None`.
    pub fn parse(comment: &str) -> Option<PhpDoc> {
        let body = comment.trim().strip_prefix("/**")?;
        let body = body.strip_suffix("*/").unwrap_or(body);

        let mut doc = PhpDoc::default();
        let mut summary: Vec<&str> = Vec::new();
        let mut tags: Vec<String> = Vec::new();

        for line in body.lines() {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line).trim();
            if line.starts_with('@') {
                tags.push(line.to_string());
            } else if let Some(last) = tags.last_mut() {
                if !line.is_empty() {
                    last.push(' ');
                    last.push_str(line);
                }
            } else {
                summary.push(line);
            }
        }

        doc.description = summary.join("\n").trim().to_string();
        for tag in &tags {
            doc.apply_tag(tag);
        }
        Some(doc)
    }

    fn apply_tag(&mut self, tag: &str) {
        let (name, rest) = match tag.find(char::is_whitespace) {
            Some(index) => (&tag[..index], tag[index..].trim()),
            None => (tag, ""),
        };

        match name {
            "@param" => {
                if let Some(param) = parse_typed_variable(rest) {
                    self.params.push(param);
                }
            }
            "@return" | "@returns" => {
                let (types, description) = split_type(rest);
                self.returns = Some(DocReturn {
                    types: TypeSet::parse(types),
                    description: description.to_string(),
                });
            }
            "@var" => self.vars.push(parse_var(rest)),
            "@property" | "@property-read" | "@property-write" => {
                let access = match name {
                    "@property-read" => PropertyAccess::Read,
                    "@property-write" => PropertyAccess::Write,
                    _ => PropertyAccess::ReadWrite,
                };
                if let Some(param) = parse_typed_variable(rest) {
                    self.properties.push(DocProperty {
                        name: param.name,
                        types: param.types,
                        access,
                        description: param.description,
                    });
                }
            }
            "@method" => {
                if let Some(method) = parse_method(rest) {
                    self.methods.push(method);
                }
            }
            "@global" => {
                if let Some(global) = parse_typed_variable(rest) {
                    self.globals.push(global);
                }
            }
            "@deprecated" => self.deprecated = Some(rest.to_string()),
            _ => {}
        }
    }

    pub fn param(&self, name: &str) -> Option<&DocParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// The `@var` tag naming `name`, or the first unnamed one.
    pub fn var_for(&self, name: &str) -> Option<&DocVar> {
        self.vars
            .iter()
            .find(|v| v.name.as_deref() == Some(name))
            .or_else(|| self.vars.iter().find(|v| v.name.is_none()))
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated.is_some()
    }
}

/// Splits a leading type expression (which may contain spaces inside `<>`,
/// `()` or `{}`) from the rest of the tag.
fn split_type(text: &str) -> (&str, &str) {
    let mut depth = 0i32;
    for (index, ch) in text.char_indices() {
        match ch {
            '<' | '(' | '{' => depth += 1,
            '>' | ')' | '}' => depth -= 1,
            c if c.is_whitespace() && depth <= 0 => {
                return (&text[..index], text[index..].trim());
            }
            _ => {}
        }
    }
    (text, "")
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(index) => (&text[..index], text[index..].trim()),
        None => (text, ""),
    }
}

/// `Type $name description` or `$name description`.
fn parse_typed_variable(text: &str) -> Option<DocParam> {
    let untyped = text.starts_with('$') || text.starts_with("...$") || text.starts_with('&');
    let (types, rest) = if untyped {
        ("", text)
    } else {
        split_type(text)
    };
    let (name, description) = split_word(rest);
    let name = name.trim_start_matches("...").trim_start_matches('&');
    if !name.starts_with('$') {
        return None;
    }
    Some(DocParam {
        name: name.to_string(),
        types: TypeSet::parse(types),
        description: description.to_string(),
    })
}

fn parse_var(text: &str) -> DocVar {
    let (types, rest) = split_type(text);
    let (maybe_name, description) = split_word(rest);
    if maybe_name.starts_with('$') {
        DocVar {
            name: Some(maybe_name.to_string()),
            types: TypeSet::parse(types),
            description: description.to_string(),
        }
    } else {
        DocVar {
            name: None,
            types: TypeSet::parse(types),
            description: rest.to_string(),
        }
    }
}

/// `[static] [ReturnType] name(params) description`.
fn parse_method(text: &str) -> Option<DocMethod> {
    let open = text.find('(')?;
    let close = text[open..].find(')').map(|i| open + i)?;
    let head: Vec<&str> = text[..open].split_whitespace().collect();
    let description = text[close + 1..].trim().to_string();

    let (is_static, head) = match head.as_slice() {
        ["static", rest @ ..] if !rest.is_empty() => (true, rest),
        other => (false, other),
    };
    let (return_types, name) = match head {
        [name] => (TypeSet::new(), *name),
        [return_type, name] => (TypeSet::parse(return_type), *name),
        _ => return None,
    };

    let params = text[open + 1..close]
        .split(',')
        .filter_map(|param| {
            let param = param.split('=').next().unwrap_or_default().trim();
            if param.is_empty() {
                return None;
            }
            parse_typed_variable(param)
        })
        .collect();

    Some(DocMethod {
        name: name.to_string(),
        is_static,
        return_types,
        params,
        description,
    })
}
