use std::fmt;

/// A `;name[=value]` parameter on a URI, Via or address header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Param {
            name: name.into(),
            value,
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Param::new("tag", Some(tag.into()))
    }

    pub fn branch(branch: impl Into<String>) -> Self {
        Param::new("branch", Some(branch.into()))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, ";{}={}", self.name, value),
            None => write!(f, ";{}", self.name),
        }
    }
}

/// Value of the first parameter called `name` (case-insensitive).
///
/// Flag parameters yield `Some("")`.
pub fn find<'a>(params: &'a [Param], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| p.value.as_deref().unwrap_or(""))
}

/// Replace the parameter called `name`, or append it.
pub fn set(params: &mut Vec<Param>, name: &str, value: Option<String>) {
    match params.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
        Some(existing) => existing.value = value,
        None => params.push(Param::new(name, value)),
    }
}
