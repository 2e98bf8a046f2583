//! Line protocol spoken on stdin/stdout
//!
//! Each input line is either a control word (`ping`, `status`) or transcribed
//! speech, optionally prefixed with `command`. Every line gets exactly one
//! reply line.

use command_parser::CommandParser;
use robot_runtime::RobotHandle;

#[derive(Debug, PartialEq, Eq)]
pub enum Request<'a> {
    Ping,
    Status,
    Speech(&'a str),
}

pub fn parse_request(line: &str) -> Request<'_> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("ping") {
        return Request::Ping;
    }
    if line.eq_ignore_ascii_case("status") {
        return Request::Status;
    }
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) if head.eq_ignore_ascii_case("command") => Request::Speech(rest.trim()),
        _ if line.eq_ignore_ascii_case("command") => Request::Speech(""),
        _ => Request::Speech(line),
    }
}

/// Answer one request, queueing any commands found in speech.
pub fn respond(request: Request<'_>, parser: &CommandParser, robot: &RobotHandle) -> String {
    match request {
        Request::Ping => "pong".to_string(),
        Request::Status => match serde_json::to_string(&robot.status()) {
            Ok(json) => json,
            Err(e) => format!("error: {e}"),
        },
        Request::Speech(text) => {
            let commands = parser.parse(text);
            if commands.is_empty() {
                return "ignored: no commands".to_string();
            }
            let summary = commands
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let count = commands.len();
            robot.submit(commands);
            format!("queued {count}: {summary}")
        }
    }
}
