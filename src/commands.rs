//! Line commands for the interactive `compose` loop.
//!
//! Each input line parses into a [`Command`]; [`execute`] applies it to the
//! draft session and returns the text to print.

use crate::campaign::{Campaign, MessageOption};
use crate::clipboard::{copy_to_clipboard, Clipboard};
use crate::directory::{group_name, Directory};
use crate::model::{SaveStatus, Step, CUSTOM_OPTION};
use crate::render::render;
use crate::session::DraftSession;
use crate::wizard;
use chrono::Utc;
use std::fmt::Write as _;
use std::future::Future;
use std::io::{self, Write};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("not a number: {0}")]
    InvalidNumber(String),
    #[error("copy what? use `copy to`, `copy subject` or `copy body`")]
    InvalidCopyTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    To,
    Subject,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Options,
    Preview,
    Find(String),
    Select(i64),
    Greeting(String),
    Opening(String),
    CustomOpening(String),
    Concern(String),
    CustomConcern(String),
    Ask(String),
    CustomAsk(String),
    Closing(String),
    CustomClosing(String),
    Message(String),
    Name(String),
    Next,
    Back,
    Step(i64),
    Copy(CopyTarget),
    Continue,
    Discard,
    Clear,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    Some(parse_verb(&verb.to_ascii_lowercase(), arg))
}

fn parse_verb(verb: &str, arg: &str) -> Result<Command, CommandError> {
    let text = |name: &'static str| {
        if arg.is_empty() {
            Err(CommandError::MissingArgument(name))
        } else {
            Ok(arg.to_string())
        }
    };
    let number = |name: &'static str| -> Result<i64, CommandError> {
        if arg.is_empty() {
            return Err(CommandError::MissingArgument(name));
        }
        arg.parse()
            .map_err(|_| CommandError::InvalidNumber(arg.to_string()))
    };
    let cmd = match verb {
        "help" | "?" => Command::Help,
        "status" => Command::Status,
        "options" | "opts" => Command::Options,
        "preview" => Command::Preview,
        // empty search lists everyone
        "find" => Command::Find(arg.to_string()),
        "select" => Command::Select(number("select")?),
        "greeting" => Command::Greeting(text("greeting")?),
        "opening" => Command::Opening(text("opening")?),
        "custom-opening" => Command::CustomOpening(arg.to_string()),
        "concern" => Command::Concern(text("concern")?),
        "custom-concern" => Command::CustomConcern(arg.to_string()),
        "ask" => Command::Ask(text("ask")?),
        "custom-ask" => Command::CustomAsk(arg.to_string()),
        "closing" => Command::Closing(text("closing")?),
        "custom-closing" => Command::CustomClosing(arg.to_string()),
        "message" => Command::Message(arg.to_string()),
        "name" => Command::Name(arg.to_string()),
        "next" => Command::Next,
        "back" => Command::Back,
        "step" => Command::Step(number("step")?),
        "copy" => Command::Copy(match arg.to_ascii_lowercase().as_str() {
            "to" | "email" => CopyTarget::To,
            "subject" => CopyTarget::Subject,
            "body" => CopyTarget::Body,
            _ => return Err(CommandError::InvalidCopyTarget),
        }),
        "continue" => Command::Continue,
        "discard" | "start-fresh" => Command::Discard,
        "clear" => Command::Clear,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(cmd)
}

pub const HELP: &str = "\
Step 1  find <text> | select <id>
Step 2  greeting <id> | opening <id> | custom-opening <text>
        concern <id> | custom-concern <text> | ask <id> | custom-ask <text>
        closing <id> | custom-closing <text>
Step 3  message <text> | name <text>
Step 4  preview | copy to|subject|body
Flow    next | back | step <n> | options | status
Draft   continue | discard | clear | quit";

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Reply(String),
    Quit,
}

pub struct ComposeContext<'a> {
    pub session: &'a DraftSession,
    pub campaign: &'a Campaign,
    pub directory: &'a Directory,
    pub clipboard: &'a mut dyn Clipboard,
}

pub async fn execute(ctx: &mut ComposeContext<'_>, cmd: Command) -> Flow {
    let campaign = ctx.campaign;
    let reply = match cmd {
        Command::Quit => return Flow::Quit,
        Command::Help => HELP.to_string(),
        Command::Status => status_line(ctx.session).await,
        Command::Options => {
            let step = ctx.session.draft().await.current_step;
            options_for(campaign, step)
        }
        Command::Preview => {
            let email = render(&ctx.session.draft().await, campaign);
            if email.body.is_empty() {
                "Select an MEP first.".to_string()
            } else {
                format!("Subject: {}\n\n{}", email.subject, email.body)
            }
        }
        Command::Find(search) => find(ctx.directory, &search),
        Command::Select(id) => match ctx.directory.find(id) {
            Some(rep) => {
                ctx.session
                    .update(|d| wizard::select_representative(d, rep))
                    .await;
                format!("Selected {} ({}, {})", rep.name, rep.country, rep.group)
            }
            None => format!("No MEP with id {}", id),
        },
        Command::Greeting(id) => match campaign.greeting(&id) {
            Some(g) => {
                let template = g.template.clone();
                ctx.session.update(|d| d.greeting = id).await;
                format!("Greeting: {}", template)
            }
            None => unknown_option("greeting", &id),
        },
        Command::Opening(id) => {
            if id != CUSTOM_OPTION && campaign.opening(&id).is_none() {
                unknown_option("opening", &id)
            } else {
                ctx.session.update(|d| d.opening = id.clone()).await;
                format!("Opening: {}", id)
            }
        }
        Command::CustomOpening(text) => {
            ctx.session
                .update(|d| wizard::set_custom_opening(d, &text))
                .await;
            "Custom opening set.".to_string()
        }
        Command::Closing(id) => {
            if id != CUSTOM_OPTION && campaign.closing(&id).is_none() {
                unknown_option("closing", &id)
            } else {
                ctx.session.update(|d| d.closing = id.clone()).await;
                format!("Closing: {}", id)
            }
        }
        Command::CustomClosing(text) => {
            ctx.session
                .update(|d| wizard::set_custom_closing(d, &text))
                .await;
            "Custom closing set.".to_string()
        }
        Command::Concern(id) => match campaign.concern(&id) {
            Some(_) => {
                let on = ctx
                    .session
                    .update(|d| wizard::toggle(&mut d.concerns, &id))
                    .await;
                toggled("Concern", &id, on)
            }
            None => unknown_option("concern", &id),
        },
        Command::CustomConcern(text) => {
            ctx.session.update(|d| d.custom_concern = text).await;
            "Custom concern set.".to_string()
        }
        Command::Ask(id) => match campaign.ask(&id) {
            Some(_) => {
                let on = ctx
                    .session
                    .update(|d| wizard::toggle(&mut d.asks, &id))
                    .await;
                toggled("Ask", &id, on)
            }
            None => unknown_option("ask", &id),
        },
        Command::CustomAsk(text) => {
            ctx.session.update(|d| d.custom_ask = text).await;
            "Custom ask set.".to_string()
        }
        Command::Message(text) => {
            ctx.session.update(|d| d.personal_message = text).await;
            "Personal message set.".to_string()
        }
        Command::Name(text) => {
            ctx.session.update(|d| d.sender_name = text).await;
            "Name set.".to_string()
        }
        Command::Next => match ctx.session.update(wizard::advance).await {
            Ok(step) => step_banner(step),
            Err(err) => err.to_string(),
        },
        Command::Back => step_banner(ctx.session.update(wizard::back).await),
        Command::Step(n) => step_banner(ctx.session.update(|d| wizard::jump(d, n)).await),
        Command::Copy(target) => copy(ctx, target).await,
        Command::Continue => {
            ctx.session.continue_draft().await;
            "Continuing your draft.".to_string()
        }
        Command::Discard => {
            ctx.session.discard().await;
            "Draft discarded. Starting fresh.".to_string()
        }
        Command::Clear => {
            ctx.session.clear().await;
            "Saved draft cleared.".to_string()
        }
    };
    Flow::Reply(reply)
}

async fn copy(ctx: &mut ComposeContext<'_>, target: CopyTarget) -> String {
    let draft = ctx.session.draft().await;
    let email = render(&draft, ctx.campaign);
    let (what, text) = match target {
        CopyTarget::To => match draft.selected_mep.as_ref() {
            Some(rep) if !rep.email.is_empty() => ("address", rep.email.clone()),
            Some(rep) => return format!("{} has no email address on file.", rep.name),
            None => return "Select an MEP first.".to_string(),
        },
        CopyTarget::Subject => ("subject", email.subject),
        CopyTarget::Body if email.body.is_empty() => return "Select an MEP first.".to_string(),
        CopyTarget::Body => ("body", email.body),
    };
    if copy_to_clipboard(ctx.clipboard, &text) {
        format!("Copied {} to clipboard.", what)
    } else {
        format!("Could not copy the {}; here it is:\n{}", what, text)
    }
}

/// Drive a compose session from `input` until end of input, `quit`, a read
/// error or `shutdown` resolving. The session is closed (and a non-empty draft
/// saved) on every one of those paths.
pub async fn run_compose<R, S, W>(
    session: DraftSession,
    campaign: &Campaign,
    directory: &Directory,
    clipboard: &mut dyn Clipboard,
    input: R,
    shutdown: S,
    out: &mut W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
    W: Write,
{
    let result = {
        let mut ctx = ComposeContext {
            session: &session,
            campaign,
            directory,
            clipboard,
        };
        compose_loop(&mut ctx, input, shutdown, out).await
    };
    session.close().await;
    result
}

async fn compose_loop<R, S, W>(
    ctx: &mut ComposeContext<'_>,
    input: R,
    shutdown: S,
    out: &mut W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
    W: Write,
{
    tokio::pin!(shutdown);
    let mut inactive = ctx.session.subscribe_inactive();
    let mut status = ctx.session.subscribe_status();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("compose interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(?err, "failed to read input");
                        break;
                    }
                };
                match parse(&line) {
                    None => continue,
                    Some(Err(err)) => writeln!(out, "{}", err)?,
                    Some(Ok(cmd)) => match execute(ctx, cmd).await {
                        Flow::Reply(reply) => writeln!(out, "{}", reply)?,
                        Flow::Quit => break,
                    },
                }
            }
            Ok(()) = inactive.changed() => {
                if *inactive.borrow_and_update() {
                    writeln!(
                        out,
                        "Still there? `continue` to keep your draft or `discard` to start fresh."
                    )?;
                }
            }
            Ok(()) = status.changed() => {
                if *status.borrow_and_update() == SaveStatus::Saved {
                    writeln!(out, "(draft saved)")?;
                }
            }
        }
        out.flush()?;
    }
    Ok(())
}

async fn status_line(session: &DraftSession) -> String {
    let draft = session.draft().await;
    let mut out = format!(
        "Step {}/4 {} | status: {}",
        draft.current_step.number(),
        draft.current_step.label(),
        session.status().as_str()
    );
    let ago = session.last_saved_ago(Utc::now()).await;
    if !ago.is_empty() {
        let _ = write!(out, " | saved {}", ago);
    }
    if let Some(rep) = draft.selected_mep.as_ref() {
        let _ = write!(out, " | to: {}", rep.name);
    }
    if session.is_inactive() {
        out.push_str(" | inactive");
    }
    out
}

fn step_banner(step: Step) -> String {
    format!("Step {}/4: {}", step.number(), step.label())
}

fn toggled(kind: &str, id: &str, on: bool) -> String {
    format!("{} {} {}", kind, id, if on { "added" } else { "removed" })
}

fn unknown_option(kind: &str, id: &str) -> String {
    format!("Unknown {} `{}` (see `options`)", kind, id)
}

fn find(directory: &Directory, search: &str) -> String {
    let state = crate::model::FilterState {
        search: search.to_string(),
        ..Default::default()
    };
    let found = crate::filter::filter(directory.meps(), &state);
    if found.is_empty() {
        return "No MEPs match.".to_string();
    }
    found
        .iter()
        .map(|m| {
            format!(
                "{:>4}  {}  {}  {}",
                m.id,
                m.name,
                m.country,
                group_name(&m.group).unwrap_or(m.group.as_str())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_options(out: &mut String, title: &str, options: &[MessageOption]) {
    let _ = writeln!(out, "{}:", title);
    for o in options {
        let _ = writeln!(out, "  {:<24} {}", o.id, o.text);
    }
}

fn options_for(campaign: &Campaign, step: Step) -> String {
    let mut out = String::new();
    match step {
        Step::SelectRepresentative => out.push_str("Use `find <text>` then `select <id>`."),
        Step::ComposeMessage => {
            let _ = writeln!(out, "greetings:");
            for g in &campaign.greetings {
                let _ = writeln!(out, "  {:<24} {}", g.id, g.template);
            }
            list_options(&mut out, "openings", &campaign.openings);
            list_options(&mut out, "concerns", &campaign.concerns);
            list_options(&mut out, "asks", &campaign.asks);
            list_options(&mut out, "closings", &campaign.closings);
        }
        Step::Personalize => {
            let _ = write!(
                out,
                "message <text>  e.g. {}\nname <text>",
                campaign.personal_message_placeholder
            );
        }
        Step::CopyAndSend => out.push_str("preview | copy to | copy subject | copy body"),
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::Catalog;
    use crate::clipboard::tests::RecordingClipboard;
    use crate::config::DraftTimings;
    use crate::directory::{parse_dataset, BUNDLED_DATASET};
    use crate::model::Draft;
    use crate::store::{KvStore, MemoryStore};
    use std::sync::Arc;

    const KEY: &str = "mep-campaign-iran";

    #[test]
    fn parses_verbs_and_arguments() {
        assert_eq!(parse("   "), None);
        assert_eq!(parse("select 3"), Some(Ok(Command::Select(3))));
        assert_eq!(
            parse("Name  Jane Doe "),
            Some(Ok(Command::Name("Jane Doe".into())))
        );
        assert_eq!(parse("copy BODY"), Some(Ok(Command::Copy(CopyTarget::Body))));
        assert_eq!(parse("find"), Some(Ok(Command::Find(String::new()))));
        assert_eq!(
            parse("select x"),
            Some(Err(CommandError::InvalidNumber("x".into())))
        );
        assert_eq!(
            parse("greeting"),
            Some(Err(CommandError::MissingArgument("greeting")))
        );
        assert_eq!(parse("copy"), Some(Err(CommandError::InvalidCopyTarget)));
        assert_eq!(
            parse("frobnicate"),
            Some(Err(CommandError::Unknown("frobnicate".into())))
        );
    }

    async fn run(ctx: &mut ComposeContext<'_>, line: &str) -> String {
        let cmd = parse(line).unwrap().unwrap();
        match execute(ctx, cmd).await {
            Flow::Reply(s) => s,
            Flow::Quit => "<quit>".into(),
        }
    }

    #[tokio::test]
    async fn walks_the_four_steps() {
        let catalog = Catalog::builtin().unwrap();
        let campaign = catalog.get("iran").unwrap();
        let directory = Directory::new(parse_dataset(BUNDLED_DATASET).unwrap().meps);
        let store = Arc::new(MemoryStore::new());
        let session =
            DraftSession::open(store.clone(), campaign, DraftTimings::default()).await;
        let mut clipboard = RecordingClipboard::default();
        let mut ctx = ComposeContext {
            session: &session,
            campaign,
            directory: &directory,
            clipboard: &mut clipboard,
        };

        assert!(run(&mut ctx, "next").await.contains("select an MEP"));
        assert!(run(&mut ctx, "find neumann").await.contains("Hannah Neumann"));
        assert_eq!(run(&mut ctx, "select 999").await, "No MEP with id 999");
        assert!(run(&mut ctx, "select 2").await.starts_with("Selected Hannah Neumann"));
        assert_eq!(run(&mut ctx, "next").await, "Step 2/4: Build Message");

        assert!(run(&mut ctx, "greeting nope").await.starts_with("Unknown greeting"));
        run(&mut ctx, "greeting formal-name").await;
        assert_eq!(
            run(&mut ctx, "concern too-conditional").await,
            "Concern too-conditional added"
        );
        run(&mut ctx, "custom-opening I write about Iran.").await;
        run(&mut ctx, "next").await;
        run(&mut ctx, "name Jane").await;
        assert_eq!(run(&mut ctx, "next").await, "Step 4/4: Copy & Send");

        let preview = run(&mut ctx, "preview").await;
        assert!(preview.starts_with("Subject: "));
        assert!(preview.contains("Dear Ms. Neumann,"));
        assert!(preview.contains("I write about Iran."));

        assert_eq!(run(&mut ctx, "copy to").await, "Copied address to clipboard.");
        run(&mut ctx, "copy body").await;
        drop(ctx);
        assert!(clipboard.last.as_deref().unwrap().ends_with("Jane"));

        assert!(session.save_now().await);
        assert!(store.get("mep-campaign-iran").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn copy_without_email_prints_fallback() {
        let catalog = Catalog::builtin().unwrap();
        let campaign = catalog.get("iran").unwrap();
        let directory = Directory::new(parse_dataset(BUNDLED_DATASET).unwrap().meps);
        let session = DraftSession::open(
            Arc::new(MemoryStore::new()),
            campaign,
            DraftTimings::default(),
        )
        .await;
        let mut clipboard = RecordingClipboard {
            fail: true,
            ..Default::default()
        };
        let mut ctx = ComposeContext {
            session: &session,
            campaign,
            directory: &directory,
            clipboard: &mut clipboard,
        };
        assert_eq!(run(&mut ctx, "copy to").await, "Select an MEP first.");
        run(&mut ctx, "select 7").await;
        assert!(run(&mut ctx, "copy to").await.contains("no email address"));
        assert!(run(&mut ctx, "copy subject")
            .await
            .starts_with("Could not copy the subject"));
        assert_eq!(run(&mut ctx, "quit").await, "<quit>");
    }

    async fn compose_with<R>(store: &Arc<MemoryStore>, input: R, shutdown: bool) -> String
    where
        R: AsyncBufRead + Unpin,
    {
        let catalog = Catalog::builtin().unwrap();
        let campaign = catalog.get("iran").unwrap();
        let directory = Directory::new(parse_dataset(BUNDLED_DATASET).unwrap().meps);
        let session =
            DraftSession::open(store.clone(), campaign, DraftTimings::default()).await;
        let mut clipboard = RecordingClipboard::default();
        let mut out = Vec::new();
        let stop = async move {
            if !shutdown {
                std::future::pending::<()>().await;
            }
        };
        run_compose(
            session,
            campaign,
            &directory,
            &mut clipboard,
            input,
            stop,
            &mut out,
        )
        .await
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    fn saved_name(store: &MemoryStore) -> Option<String> {
        let raw = store.raw(KEY)?;
        let draft: Draft = serde_json::from_str(&raw).unwrap();
        Some(draft.sender_name)
    }

    #[tokio::test]
    async fn end_of_input_saves_the_draft() {
        let store = Arc::new(MemoryStore::new());
        let out = compose_with(&store, &b"name Jane\nbogus\n"[..], false).await;
        assert!(out.contains("Name set."));
        assert!(out.contains("unknown command: bogus"));
        assert_eq!(saved_name(&store).as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn quit_stops_reading_and_saves() {
        let store = Arc::new(MemoryStore::new());
        compose_with(&store, &b"name Jane\nquit\nname Bob\n"[..], false).await;
        assert_eq!(saved_name(&store).as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn read_error_still_saves() {
        let store = Arc::new(MemoryStore::new());
        // invalid UTF-8 makes the line reader fail
        compose_with(&store, &b"name Jane\n\xff\xfe\nname Bob\n"[..], false).await;
        assert_eq!(saved_name(&store).as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn shutdown_while_waiting_for_input_saves() {
        let store = Arc::new(MemoryStore::with_entry(KEY, r#"{"senderName":"Ann"}"#));
        let (_keep_open, rx) = tokio::io::duplex(64);
        let input = tokio::io::BufReader::new(rx);
        compose_with(&store, input, true).await;
        let saved: Draft = serde_json::from_str(&store.raw(KEY).unwrap()).unwrap();
        assert_eq!(saved.sender_name, "Ann");
        assert!(saved.last_saved.is_some());
    }

    #[tokio::test]
    async fn empty_session_leaves_nothing_behind() {
        let store = Arc::new(MemoryStore::new());
        compose_with(&store, &b"status\n"[..], false).await;
        assert!(!store.contains(KEY));
    }
}
