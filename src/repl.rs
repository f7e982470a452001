use derive_more::Display;
use error_stack::{Report, ResultExt};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::error::ServerError;
use crate::server::Server;

const HELP: &str = "\
Commands:
  help, ?                             show this help
  exit, quit                          leave the shell (EOF works too)
  history                             list previously entered commands
  get_instructions                    print the server instructions
  list_tools                          list tool names
  get_tool_description <name>         print a tool's description and schema
  call_tool <name> [json-arguments]   invoke a tool, e.g.
      call_tool get_rsi {\"ticker\": \"AAPL\", \"source\": \"close\", \"period\": \"3mo\", \"interval\": \"1d\"}";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Exit,
    History,
    Instructions,
    ListTools,
    Describe(String),
    Call { name: String, arguments: Value },
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum CommandError {
    #[display("unknown command: {_0} (type `help` for a list)")]
    Unknown(String),
    #[display("usage: {_0}")]
    Usage(&'static str),
    #[display("arguments are not valid JSON: {_0}")]
    BadJson(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Result<Command, CommandError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head {
        "help" | "?" => Ok(Command::Help),
        "exit" | "quit" => Ok(Command::Exit),
        "history" => Ok(Command::History),
        "get_instructions" => Ok(Command::Instructions),
        "list_tools" => Ok(Command::ListTools),
        "get_tool_description" if rest.is_empty() => {
            Err(CommandError::Usage("get_tool_description <name>"))
        }
        "get_tool_description" => Ok(Command::Describe(rest.to_string())),
        "call_tool" => parse_call(rest),
        other => Err(CommandError::Unknown(other.to_string())),
    };
    Some(command)
}

fn parse_call(rest: &str) -> Result<Command, CommandError> {
    let (name, raw_args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return Err(CommandError::Usage("call_tool <name> [json-arguments]"));
    }
    let arguments = if raw_args.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw_args).map_err(|e| CommandError::BadJson(e.to_string()))?
    };
    Ok(Command::Call {
        name: name.to_string(),
        arguments,
    })
}

/// What the shell should do after a line.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Output(String),
    Error(String),
    Exit,
}

pub struct Repl<'a> {
    server: &'a Server,
    history: Vec<String>,
}

impl<'a> Repl<'a> {
    pub fn new(server: &'a Server) -> Self {
        Self {
            server,
            history: Vec::new(),
        }
    }

    pub async fn execute(&mut self, line: &str) -> Option<Step> {
        let command = match parse_command(line)? {
            Ok(command) => command,
            Err(e) => return Some(Step::Error(e.to_string())),
        };
        if !matches!(command, Command::History) {
            self.history.push(line.trim().to_string());
        }
        debug!(?command, "repl command");

        let step = match command {
            Command::Help => Step::Output(HELP.to_string()),
            Command::Exit => Step::Exit,
            Command::History => Step::Output(
                self.history
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format!("{:>4}  {entry}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Command::Instructions => Step::Output(self.server.instructions().to_string()),
            Command::ListTools => Step::Output(
                self.server
                    .catalog()
                    .descriptors()
                    .iter()
                    .map(|d| d.name)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Command::Describe(name) => match self.server.catalog().describe(&name) {
                Some(descriptor) => pretty(&descriptor),
                None => Step::Error(format!("unknown tool: {name}")),
            },
            Command::Call { name, arguments } => {
                match self.server.catalog().call(&name, arguments).await {
                    Ok(response) if response.is_error => pretty(&response.content).into_error(),
                    Ok(response) => pretty(&response.content),
                    Err(report) => Step::Error(format!("{report:?}")),
                }
            }
        };
        Some(step)
    }

    /// Read commands from stdin until `exit` or EOF.
    pub async fn run(&mut self) -> Result<(), Report<ServerError>> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();

        loop {
            stdout.write_all(b"> ").await.change_context(ServerError::Write)?;
            stdout.flush().await.change_context(ServerError::Write)?;

            let Some(line) = lines.next_line().await.change_context(ServerError::Read)? else {
                stdout.write_all(b"\n").await.change_context(ServerError::Write)?;
                break;
            };

            match self.execute(&line).await {
                None => {}
                Some(Step::Exit) => break,
                Some(Step::Output(text)) => {
                    stdout
                        .write_all(format!("{text}\n").as_bytes())
                        .await
                        .change_context(ServerError::Write)?;
                }
                Some(Step::Error(text)) => {
                    stderr
                        .write_all(format!("error: {text}\n").as_bytes())
                        .await
                        .change_context(ServerError::Write)?;
                }
            }
        }

        stdout.flush().await.change_context(ServerError::Write)
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> Step {
    match serde_json::to_string_pretty(value) {
        Ok(text) => Step::Output(text),
        Err(e) => Step::Error(format!("failed to render result: {e}")),
    }
}

impl Step {
    fn into_error(self) -> Self {
        match self {
            Step::Output(text) => Step::Error(text),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::indicator::tests::candles_from_closes;
    use crate::server::catalog::ToolCatalog;
    use crate::tools::tests::MockProvider;

    fn server() -> Server {
        let provider = MockProvider::Candles(candles_from_closes(&[10.0, 11.0, 12.0, 13.0]));
        Server::new("repl-test".into(), ToolCatalog::new(Arc::new(provider)))
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("help"), Some(Ok(Command::Help)));
        assert_eq!(parse_command(" ? "), Some(Ok(Command::Help)));
        assert_eq!(parse_command("quit"), Some(Ok(Command::Exit)));
        assert_eq!(parse_command("list_tools"), Some(Ok(Command::ListTools)));
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn parses_call_with_and_without_arguments() {
        assert_eq!(
            parse_command(r#"call_tool get_sma {"ticker": "AAPL", "window": 3}"#),
            Some(Ok(Command::Call {
                name: "get_sma".into(),
                arguments: json!({ "ticker": "AAPL", "window": 3 }),
            }))
        );
        assert_eq!(
            parse_command("call_tool get_ticker_information"),
            Some(Ok(Command::Call {
                name: "get_ticker_information".into(),
                arguments: json!({}),
            }))
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!(
            parse_command("call_tool get_sma {oops"),
            Some(Err(CommandError::BadJson(_)))
        ));
        assert!(matches!(
            parse_command("get_tool_description"),
            Some(Err(CommandError::Usage(_)))
        ));
        assert!(matches!(
            parse_command("frobnicate"),
            Some(Err(CommandError::Unknown(_)))
        ));
    }

    #[tokio::test]
    async fn lists_and_describes_tools() {
        let server = server();
        let mut repl = Repl::new(&server);

        let Some(Step::Output(list)) = repl.execute("list_tools").await else {
            panic!("expected output");
        };
        assert!(list.lines().any(|l| l == "get_rsi"));

        let Some(Step::Output(description)) = repl.execute("get_tool_description get_sma").await
        else {
            panic!("expected output");
        };
        assert!(description.contains("inputSchema"));

        assert!(matches!(
            repl.execute("get_tool_description get_macd").await,
            Some(Step::Error(_))
        ));
    }

    #[tokio::test]
    async fn call_tool_prints_result_and_errors_go_to_error_stream() {
        let server = server();
        let mut repl = Repl::new(&server);

        let ok = repl
            .execute(
                r#"call_tool get_sma {"ticker":"AAPL","source":"close","period":"5d","interval":"1d","window":2}"#,
            )
            .await;
        let Some(Step::Output(text)) = ok else {
            panic!("expected output, got {ok:?}");
        };
        assert!(text.contains("10.5"));

        let failed = repl
            .execute(
                r#"call_tool get_sma {"ticker":"AAPL","source":"close","period":"5d","interval":"1d","window":-1}"#,
            )
            .await;
        let Some(Step::Error(text)) = failed else {
            panic!("expected error, got {failed:?}");
        };
        assert!(text.contains("SMA window must be positive, got: -1"));

        assert!(matches!(
            repl.execute("call_tool get_sma {}").await,
            Some(Step::Error(_))
        ));
    }

    #[tokio::test]
    async fn history_and_exit() {
        let server = server();
        let mut repl = Repl::new(&server);
        repl.execute("help").await;
        repl.execute("get_instructions").await;

        assert_eq!(
            repl.execute("history").await,
            Some(Step::Output("   1  help\n   2  get_instructions".into()))
        );
        assert_eq!(repl.execute("exit").await, Some(Step::Exit));
        assert_eq!(repl.execute("").await, None);
    }
}
