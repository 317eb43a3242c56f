mod api;
mod session;


use std::collections::HashSet;
use std::time::Duration;

use canvas::engine::Action;
use canvas::input::Tool;
use clap::{Parser, Subcommand};
use reqwest::Url;
use wire::{Envelope, Point, ShapeMessage};

use crate::api::ApiClient;
use crate::session::{LiveSession, gesture};

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("missing access token; pass --token or set DRAWSYNC_TOKEN")]
    MissingToken,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("{0} does not draw shapes")]
    NotADrawingTool(Tool),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("envelope encode failed: {0}")]
    Codec(#[from] wire::CodecError),
    #[error("timed out waiting for the relay")]
    Timeout,
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("health check failed with HTTP {0}")]
    Unhealthy(u16),
}

#[derive(Parser, Debug)]
#[command(name = "drawsync-cli", about = "drawsync relay and storage CLI")]
struct Cli {
    #[arg(long, env = "DRAWSYNC_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "DRAWSYNC_TOKEN")]
    token: Option<String>,

    #[arg(long, default_value_t = 5, help = "Seconds to wait for echoes and storage calls")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the relay is up.
    Ping,
    /// Print room traffic until the relay hangs up.
    Watch { room: String },
    /// Drag out a new shape with a drawing tool.
    #[command(allow_negative_numbers = true)]
    Draw { room: String, tool: Tool, x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Erase every shape under a point.
    #[command(allow_negative_numbers = true)]
    Erase { room: String, x: f64, y: f64 },
    /// Drag the top-most shape under the first point to the second.
    #[command(allow_negative_numbers = true)]
    Move { room: String, x1: f64, y1: f64, x2: f64, y2: f64 },
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl CliContext {
    fn token(&self) -> Result<&str, CliError> {
        self.token.as_deref().filter(|t| !t.is_empty()).ok_or(CliError::MissingToken)
    }

    async fn connect(&self, room: &str) -> Result<LiveSession, CliError> {
        let token = self.token()?;
        let api = ApiClient::new(self.base_url.clone(), token);
        let url = ws_url(&self.base_url, token)?;
        LiveSession::connect(api, &url, room).await
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext {
        base_url: cli.base_url,
        token: cli.token,
        timeout: Duration::from_secs(cli.timeout_secs),
    };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Watch { room } => run_watch(&ctx, &room).await,
        Command::Draw { room, tool, x1, y1, x2, y2 } => {
            run_draw(&ctx, &room, tool, Point::new(x1, y1), Point::new(x2, y2)).await
        }
        Command::Erase { room, x, y } => run_erase(&ctx, &room, Point::new(x, y)).await,
        Command::Move { room, x1, y1, x2, y2 } => run_move(&ctx, &room, Point::new(x1, y1), Point::new(x2, y2)).await,
    }
}

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    let url = format!("{}/healthz", ctx.base_url.trim_end_matches('/'));
    let status = reqwest::get(url).await?.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_watch(ctx: &CliContext, room: &str) -> Result<(), CliError> {
    let mut live = ctx.connect(room).await?;
    eprintln!("watching {room} ({} shapes)", live.session().engine().shapes().len());
    loop {
        match live.step().await {
            Ok(Some(envelope)) => {
                let count = live.session().engine().shapes().len();
                println!("{} [{count} shapes]", describe(&envelope));
            }
            Ok(None) => {}
            Err(CliError::WsClosed) => {
                eprintln!("relay closed the connection");
                return Ok(());
            }
            Err(error) => return Err(error),
        }
    }
}

async fn run_draw(ctx: &CliContext, room: &str, tool: Tool, from: Point, to: Point) -> Result<(), CliError> {
    if !tool.creates_shape() {
        return Err(CliError::NotADrawingTool(tool));
    }
    let mut live = ctx.connect(room).await?;
    let before: HashSet<i64> = live.session().engine().shapes().iter().map(|r| r.id).collect();

    let actions = gesture(live.session_mut().engine_mut(), tool, from, to);
    if actions.is_empty() {
        eprintln!("drag from {} to {} is too small to draw", fmt_point(from), fmt_point(to));
    }
    live.session_mut().execute(actions)?;
    live.settle(ctx.timeout).await?;

    for record in live.session().engine().shapes() {
        if record.id > 0 && !before.contains(&record.id) {
            println!("created shape {} ({})", record.id, record.shape.kind());
        }
    }
    live.finish().await
}

async fn run_erase(ctx: &CliContext, room: &str, at: Point) -> Result<(), CliError> {
    let mut live = ctx.connect(room).await?;
    let actions = gesture(live.session_mut().engine_mut(), Tool::Eraser, at, at);
    let erased = count_persists(&actions);
    live.session_mut().execute(actions)?;
    live.settle(ctx.timeout).await?;
    println!("erased {erased} shape(s) at {}", fmt_point(at));
    live.finish().await
}

async fn run_move(ctx: &CliContext, room: &str, from: Point, to: Point) -> Result<(), CliError> {
    let mut live = ctx.connect(room).await?;
    let actions = gesture(live.session_mut().engine_mut(), Tool::Select, from, to);
    let picked = live.session().engine().selection();
    live.session_mut().execute(actions)?;
    live.settle(ctx.timeout).await?;
    match picked {
        Some(id) => println!("moved shape {id}"),
        None => eprintln!("no shape at {}", fmt_point(from)),
    }
    live.finish().await
}

/// Relay socket URL for `base_url`, with the token form-encoded.
fn ws_url(base_url: &str, token: &str) -> Result<String, CliError> {
    let invalid = || CliError::InvalidBaseUrl(base_url.to_owned());
    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|()| invalid())?;
    url.path_segments_mut().map_err(|()| invalid())?.pop_if_empty().push("ws");
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url.into())
}

fn count_persists(actions: &[Action]) -> usize {
    actions
        .iter()
        .filter(|a| matches!(a, Action::PersistDelete { .. } | Action::PersistUpdate { .. }))
        .count()
}

/// One line of `watch` output.
fn describe(envelope: &Envelope) -> String {
    match envelope {
        Envelope::Chat { id, message, .. } => {
            let id = id.map_or_else(|| "?".to_owned(), |id| id.to_string());
            match ShapeMessage::decode(message) {
                Ok(msg) => format!("created #{id} {}", msg.shape.kind()),
                Err(_) => format!("created #{id} (not a shape)"),
            }
        }
        Envelope::Update { shape_id, shape, .. } => format!("updated #{shape_id} {}", shape.kind()),
        Envelope::Delete { shape_id, .. } => format!("deleted #{shape_id}"),
        Envelope::RoomUsers { users } => {
            let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
            format!("present: {}", names.join(", "))
        }
        Envelope::JoinRoom { room_id } | Envelope::LeaveRoom { room_id } => {
            format!("{} {room_id}", envelope.kind())
        }
    }
}

fn fmt_point(pt: Point) -> String {
    format!("({}, {})", pt.x, pt.y)
}
