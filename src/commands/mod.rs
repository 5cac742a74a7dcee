//! Command handlers and the state they share for one invocation.

pub mod build;
pub mod devices;
pub mod images;
pub mod instances;
pub mod resources;
pub mod version;
pub mod volumes;

use std::io::{self, Write};

use thiserror::Error;

use crate::api::{ApiClient, ApiError, ClientOptions};
use crate::cancel::CancelToken;
use crate::cli::{Cli, Command};
use crate::config::{CliConfig, ConfigError};
use crate::events::{BuildStatus, StreamError};
use crate::output::{
    select_output_sink, show_json, stream_output, ClosedPipeGuard, Document, OutputError,
    OutputFormat, OutputSink, StdoutSink, Table, TerminalSettings,
};
use crate::poll::PollError;
use crate::resolve::ResolveError;
use crate::version::VersionInfo;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    NotFound(ResolveError),

    #[error(transparent)]
    Ambiguous(ResolveError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    RemoteFailure(String),

    #[error("{}", termination_text(*.last))]
    UnexpectedTermination { last: Option<BuildStatus> },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("{0}")]
    Usage(String),
}

fn termination_text(last: Option<BuildStatus>) -> String {
    match last {
        Some(status) => {
            format!("event stream ended before the build finished (last status: {status})")
        }
        None => "event stream ended before the build reported a status".to_string(),
    }
}

impl CliError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CliError::Cancelled)
    }
}

impl From<ResolveError> for CliError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { .. } => CliError::NotFound(err),
            ResolveError::Ambiguous { .. } => CliError::Ambiguous(err),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::Output(OutputError::Io(err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Api(ApiError::Decode(err))
    }
}

impl From<PollError> for CliError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Cancelled => CliError::Cancelled,
            PollError::Failed { message } => CliError::RemoteFailure(match message {
                Some(message) => format!("image build failed: {message}"),
                None => "image build failed".to_string(),
            }),
            PollError::Fetch(source) => match source.downcast::<ApiError>() {
                Ok(api) => CliError::Api(*api),
                Err(other) => {
                    CliError::RemoteFailure(format!("failed to check image status: {other}"))
                }
            },
        }
    }
}

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub api: ApiClient,
    pub config: CliConfig,
    pub version: VersionInfo,
    pub format: OutputFormat,
    pub transform: Option<String>,
    pub terminal: TerminalSettings,
    /// Destination for long listings and `explore`.
    pub pager: Box<dyn OutputSink>,
    /// Destination for everything else on stdout.
    pub direct: Box<dyn OutputSink>,
    /// Progress and status notices (stderr).
    pub notices: ClosedPipeGuard<Box<dyn Write + Send>>,
    pub cancel: CancelToken,
}

impl Context {
    /// Resolve flags against `config` and wire up the real terminal.
    pub fn new(cli: &Cli, config: CliConfig, cancel: CancelToken) -> Result<Self, CliError> {
        let format: OutputFormat = cli
            .format
            .as_deref()
            .unwrap_or(&config.output.format)
            .parse()?;
        let version = VersionInfo::detect();
        let api = ApiClient::new(ClientOptions {
            base_url: config.resolved_base_url(cli.base_url.as_deref()),
            api_key: config.api_key.clone(),
            user_agent: version.user_agent(),
            connect_timeout: config.connect_timeout(),
        })?;
        let terminal = TerminalSettings::from_env(config.output.pager.as_deref());

        Ok(Self {
            api,
            pager: select_output_sink(&terminal),
            direct: Box::new(StdoutSink {
                colors: terminal.colors_for(terminal.stdout_is_tty),
            }),
            notices: ClosedPipeGuard::new(Box::new(io::stderr())),
            config,
            version,
            format,
            transform: cli.transform.clone().filter(|t| !t.is_empty()),
            terminal,
            cancel,
        })
    }

    /// Swap the output destinations, e.g. for capturing output.
    pub fn with_output(
        mut self,
        pager: Box<dyn OutputSink>,
        direct: Box<dyn OutputSink>,
        notices: Box<dyn Write + Send>,
    ) -> Self {
        self.pager = pager;
        self.direct = direct;
        self.notices = ClosedPipeGuard::new(notices);
        self
    }

    /// Render a document in the selected format. `paged` documents (and
    /// everything in `explore`) go through the pager sink.
    pub fn emit_document(&self, label: &str, doc: &Document, paged: bool) -> Result<(), CliError> {
        let sink = if paged || self.format == OutputFormat::Explore {
            self.pager.as_ref()
        } else {
            self.direct.as_ref()
        };
        let transform = self.transform.as_deref();
        stream_output(sink, label, |out| {
            let colors = out.colors();
            show_json(out, label, doc, self.format, transform, colors)
        })?;
        Ok(())
    }

    pub fn emit_table(&self, label: &str, table: &Table) -> Result<(), CliError> {
        let width = self.terminal.terminal_width();
        stream_output(self.direct.as_ref(), label, |out| {
            table.render(out, width)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Plain lines on stdout (IDs, names).
    pub fn emit_lines<I, S>(&self, label: &str, lines: I) -> Result<(), CliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        stream_output(self.direct.as_ref(), label, |out| {
            for line in lines {
                writeln!(out, "{}", line.as_ref())?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// One line on the notice stream. A closed stderr is not an error.
    pub fn notice(&mut self, message: impl AsRef<str>) {
        let _ = writeln!(self.notices, "{}", message.as_ref());
        let _ = self.notices.flush();
    }
}

/// Run one parsed command line.
///
/// The whole command races the cancel token, so a request stuck on a silent
/// server still ends on Ctrl-C. Commands that watch the token themselves
/// are polled first and get to finish their own output.
pub async fn dispatch(cli: Cli, ctx: &mut Context) -> Result<(), CliError> {
    let cancel = ctx.cancel.clone();
    tokio::select! {
        biased;
        result = execute(cli, ctx) => result,
        _ = cancel.cancelled() => {
            tracing::debug!("command interrupted");
            Err(CliError::Cancelled)
        }
    }
}

async fn execute(cli: Cli, ctx: &mut Context) -> Result<(), CliError> {
    match cli.command {
        Command::Ps { all, quiet } => instances::ps(ctx, all, quiet).await,
        Command::Logs {
            instance,
            follow,
            tail,
        } => instances::logs(ctx, &instance, tail, follow).await,
        Command::Run(args) => instances::run(ctx, args).await,
        Command::Build(cmd) => build::handle(ctx, cmd).await,
        Command::Image(cmd) => images::handle(ctx, cmd).await,
        Command::Volume(cmd) => volumes::handle(ctx, cmd).await,
        Command::Device(cmd) => devices::handle(ctx, cmd).await,
        Command::Resources => resources::show(ctx).await,
        Command::Version => version::show(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_errors_map_to_taxonomy() {
        let not_found = ResolveError::NotFound {
            kind: "instance",
            identifier: "zzz".into(),
        };
        assert!(matches!(CliError::from(not_found), CliError::NotFound(_)));

        let ambiguous = ResolveError::Ambiguous {
            kind: "instance",
            identifier: "abc".into(),
            matches: vec!["abc123".into(), "abc999".into()],
        };
        let err = CliError::from(ambiguous);
        assert!(matches!(err, CliError::Ambiguous(_)));
        assert_eq!(
            err.to_string(),
            "ambiguous instance identifier \"abc\" matches: abc123, abc999"
        );
    }

    #[test]
    fn poll_errors_map_to_taxonomy() {
        assert!(CliError::from(PollError::Cancelled).is_cancelled());
        assert_eq!(
            CliError::from(PollError::Failed {
                message: Some("manifest unknown".into())
            })
            .to_string(),
            "image build failed: manifest unknown"
        );
        assert_eq!(
            CliError::from(PollError::Failed { message: None }).to_string(),
            "image build failed"
        );
        let fetch = PollError::Fetch(Box::new(ApiError::Status {
            status: 500,
            body: "boom".into(),
        }));
        assert!(matches!(CliError::from(fetch), CliError::Api(_)));
    }

    #[test]
    fn unexpected_termination_names_last_status() {
        let err = CliError::UnexpectedTermination {
            last: Some(BuildStatus::Building),
        };
        assert_eq!(
            err.to_string(),
            "event stream ended before the build finished (last status: building)"
        );
    }
}
