use crate::runtime::Runtime;

/// Status codes the line protocol wraps a response in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok,
    Initiated,
    NotImplemented,
    RuntimeError,
    NotActive,
    Conflict,
    NoSuchDevice,
    ParameterError,
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ResponseCode::Ok => 0,
            ResponseCode::Initiated => 1,
            ResponseCode::NotImplemented => 2,
            ResponseCode::RuntimeError => 4,
            ResponseCode::NotActive => 5,
            ResponseCode::Conflict => 6,
            ResponseCode::NoSuchDevice => 7,
            ResponseCode::ParameterError => 8,
        };
        write!(f, "{code}")
    }
}

/// A line-protocol reply. `is_query` picks the `=` (command) vs `?`
/// (query) separator in the wire form: `! verb = code : field,field ;` or
/// `! verb ? code : field,field ;`.
#[derive(Debug, Clone)]
pub struct Response {
    pub verb: String,
    pub code: ResponseCode,
    pub fields: Vec<String>,
    pub is_query: bool,
}

impl Response {
    pub fn ok(verb: impl Into<String>, is_query: bool) -> Self {
        Self { verb: verb.into(), code: ResponseCode::Ok, fields: Vec::new(), is_query }
    }

    pub fn error(verb: impl Into<String>, is_query: bool, code: ResponseCode, text: impl Into<String>) -> Self {
        Self { verb: verb.into(), code, fields: vec![text.into()], is_query }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.is_query { '?' } else { '=' };
        write!(f, "! {} {} {}", self.verb, sep, self.code)?;
        if !self.fields.is_empty() {
            write!(f, " : {}", self.fields.join(","))?;
        }
        write!(f, " ;")
    }
}

/// Implemented per command verb by a real dispatcher. `vlbi-ctl`'s
/// `LineDispatcher` is a minimal illustrative implementation, not the
/// product dispatch table.
pub trait CommandHandler {
    fn handle(&mut self, runtime: &mut Runtime, args: &[&str]) -> Response;
}
