use std::{
    io::{self, BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
};

use clap::Parser;
use vlbi_transfer::{CommandHandler, Response, ResponseCode, Runtime, TransferMode};

#[derive(Parser, Debug)]
#[command(name = "vlbi-ctl", about = "Line-protocol control server for a VLBI data-movement engine")]
struct Args {
    /// Address to accept control-protocol connections on.
    #[arg(long, default_value = "127.0.0.1:2620")]
    listen: String,
}

/// Minimal illustrative command dispatcher: recognizes just enough verbs
/// (`disk2net`/`in2net`/`net2file`/`net2disk` with `open`/`close`/`?`,
/// plus `error?`) to drive a real connection through the state machine.
/// This is a demonstration harness, not the product dispatch table — a
/// real one would cover every `TransferMode` and own chain construction
/// per mode.
struct LineDispatcher;

impl LineDispatcher {
    fn mode_for(verb: &str) -> Option<TransferMode> {
        match verb {
            "disk2net" => Some(TransferMode::Disk2Net),
            "in2net" => Some(TransferMode::In2Net),
            "net2file" => Some(TransferMode::Net2File),
            "net2disk" => Some(TransferMode::Net2Disk),
            _ => None,
        }
    }
}

impl CommandHandler for LineDispatcher {
    fn handle(&mut self, runtime: &mut Runtime, args: &[&str]) -> Response {
        let Some((verb, rest)) = args.split_first() else {
            return Response::error("", false, ResponseCode::ParameterError, "empty command");
        };
        let verb = *verb;

        if verb == "error?" {
            return match runtime.last_fault() {
                Some(fault) => Response { verb: "error".into(), code: ResponseCode::RuntimeError, fields: vec![fault.message], is_query: true },
                None => Response { verb: "error".into(), code: ResponseCode::Ok, fields: vec![], is_query: true },
            };
        }

        let Some(mode) = Self::mode_for(verb) else {
            return Response::error(verb, false, ResponseCode::NotImplemented, format!("unrecognized verb {verb:?}"));
        };
        let is_query = rest.first() == Some(&"?");

        if is_query {
            return if runtime.mode() == mode {
                Response { verb: verb.into(), code: ResponseCode::Ok, fields: vec![format!("{}", runtime.submode())], is_query: true }
            } else {
                Response { verb: verb.into(), code: ResponseCode::NotActive, fields: vec![], is_query: true }
            };
        }

        match rest.first().copied() {
            Some("open") => match runtime.begin(mode) {
                Ok(()) => Response::ok(verb, false),
                Err(err) => Response::error(verb, false, ResponseCode::Conflict, err.to_string()),
            },
            Some("close") => {
                runtime.finish();
                Response::ok(verb, false)
            }
            Some("on") => match runtime.run() {
                Ok(()) => Response::ok(verb, false),
                Err(err) => Response::error(verb, false, ResponseCode::NotActive, err.to_string()),
            },
            _ => Response::error(verb, false, ResponseCode::ParameterError, "expected open, close, on, or ?"),
        }
    }
}

/// Parses one control-protocol line into a verb token plus an arg list.
/// `"disk2net = open ;"` -> `["disk2net", "open"]`; `"disk2net ? ;"` ->
/// `["disk2net", "?"]`; `"error? ;"` -> `["error?"]`.
fn tokenize(line: &str) -> Vec<&str> {
    let line = line.trim().trim_end_matches(';').trim();
    if line.is_empty() {
        return Vec::new();
    }
    let Some(at) = line.find(['=', '?']) else {
        return vec![line];
    };
    let verb = line[..at].trim();
    let is_query_glued = &line[at..at + 1] == "?";
    let rest = line[at + 1..].trim();

    if is_query_glued && rest.is_empty() {
        return vec![line.trim()];
    }
    let mut tokens = vec![verb];
    if is_query_glued {
        tokens.push("?");
    }
    tokens.extend(rest.split(':').map(str::trim).filter(|s| !s.is_empty()));
    tokens
}

/// Serves one control connection to completion before accepting the next.
/// A real dispatcher would run connections concurrently against a
/// `Mutex<Runtime>` or similar; this harness drives one client at a time.
fn serve_connection(stream: TcpStream, runtime: &mut Runtime, dispatcher: &mut LineDispatcher) -> io::Result<()> {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
    tracing::info!(peer, "control connection opened");
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        let tokens = tokenize(&line);
        if tokens.is_empty() {
            continue;
        }
        let response = dispatcher.handle(runtime, &tokens);
        writeln!(writer, "{response}")?;
    }
    tracing::info!(peer, "control connection closed");
    Ok(())
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut runtime = Runtime::new();
    let mut dispatcher = LineDispatcher;

    let listener = TcpListener::bind(&args.listen)?;
    tracing::info!(addr = %args.listen, "vlbi-ctl listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(err) = serve_connection(stream, &mut runtime, &mut dispatcher) {
                    tracing::warn!(%err, "control connection ended with an error");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to accept connection"),
        }
    }
    Ok(())
}
